//! Element-wise stream kernels and their host-side wrappers.

use tm_device::{Accelerator, DeviceElem, Dim2, Result, StreamKernel, View1D};

/// Multiplication with device semantics: integers wrap on overflow.
pub trait DeviceProduct: DeviceElem {
    fn product(self, other: Self) -> Self;
}

impl DeviceProduct for f32 {
    fn product(self, other: Self) -> Self {
        self * other
    }
}

impl DeviceProduct for i32 {
    fn product(self, other: Self) -> Self {
        self.wrapping_mul(other)
    }
}

impl DeviceProduct for u32 {
    fn product(self, other: Self) -> Self {
        self.wrapping_mul(other)
    }
}

/// `c[i] = a[i] * b[i]` over the launched range.
pub struct ArrayMultiply<'a, T: DeviceProduct> {
    a: View1D<'a, T>,
    b: View1D<'a, T>,
    c: View1D<'a, T>,
}

impl<'a, T: DeviceProduct> ArrayMultiply<'a, T> {
    pub fn new(a: View1D<'a, T>, b: View1D<'a, T>, c: View1D<'a, T>) -> Self {
        ArrayMultiply { a, b, c }
    }
}

impl<T: DeviceProduct> StreamKernel for ArrayMultiply<'_, T> {
    fn name(&self) -> &str {
        "array_multiply"
    }

    fn validate(&self, extent: Dim2) -> std::result::Result<(), String> {
        let len = extent.num_elems();
        if extent.y != 1 {
            return Err(format!("expected a 1-D range, got {}", extent));
        }
        if len > self.c.len() || len > self.a.len() || len > self.b.len() {
            return Err(format!(
                "range of {} exceeds buffers (a={}, b={}, c={})",
                len,
                self.a.len(),
                self.b.len(),
                self.c.len()
            ));
        }
        Ok(())
    }

    fn execute(&self, index: Dim2) {
        let i = index.x;
        self.c.set(i, self.a.get(i).product(self.b.get(i)));
    }
}

/// `out[i] = data[i % data.len()]` over the launched range.
pub struct Replicate<'a, T: DeviceElem> {
    data: View1D<'a, T>,
    out: View1D<'a, T>,
}

impl<'a, T: DeviceElem> Replicate<'a, T> {
    pub fn new(data: View1D<'a, T>, out: View1D<'a, T>) -> Self {
        Replicate { data, out }
    }
}

impl<T: DeviceElem> StreamKernel for Replicate<'_, T> {
    fn name(&self) -> &str {
        "replicate"
    }

    fn validate(&self, extent: Dim2) -> std::result::Result<(), String> {
        if self.data.is_empty() {
            return Err("source buffer is empty".to_string());
        }
        if extent.y != 1 || extent.x > self.out.len() {
            return Err(format!(
                "range {} does not fit output of {} elements",
                extent,
                self.out.len()
            ));
        }
        Ok(())
    }

    fn execute(&self, index: Dim2) {
        let i = index.x;
        self.out.set(i, self.data.get(i % self.data.len()));
    }
}

/// Multiply two host arrays element-wise on the accelerator.
///
/// The result has `a.len()` elements; `b` must be at least as long.
pub fn array_multiply<T: DeviceProduct>(acc: &Accelerator, a: &[T], b: &[T]) -> Result<Vec<T>> {
    let a_buf = acc.upload_1d(a)?;
    let b_buf = acc.upload_1d(b)?;
    let c_buf = acc.allocate_1d::<T>(a.len())?;

    let kernel = ArrayMultiply::new(a_buf.view_1d(), b_buf.view_1d(), c_buf.view_1d());
    acc.launch_stream(&kernel, Dim2::new(c_buf.len(), 1))?;
    acc.synchronize();
    Ok(c_buf.to_host())
}

/// Fill `len` elements by repeating `data` on the accelerator.
pub fn replicate<T: DeviceElem>(acc: &Accelerator, data: &[T], len: usize) -> Result<Vec<T>> {
    let data_buf = acc.upload_1d(data)?;
    let out_buf = acc.allocate_1d::<T>(len)?;

    let kernel = Replicate::new(data_buf.view_1d(), out_buf.view_1d());
    acc.launch_stream(&kernel, Dim2::new(len, 1))?;
    acc.synchronize();
    Ok(out_buf.to_host())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tm_device::{Context, DeviceError};

    fn accelerator() -> Accelerator {
        let ctx = Context::create_default().unwrap();
        ctx.create_accelerator(ctx.preferred_device(true)).unwrap()
    }

    #[test]
    fn test_array_multiply_ints() {
        let acc = accelerator();
        let a: Vec<i32> = (1..=1000).collect();
        let b: Vec<i32> = a.iter().map(|v| v * 10).collect();
        let c = array_multiply(&acc, &a, &b).unwrap();
        let expected: Vec<i32> = a.iter().zip(&b).map(|(x, y)| x * y).collect();
        assert_eq!(c, expected);
        assert_eq!(acc.allocated_bytes(), 0);
    }

    #[test]
    fn test_array_multiply_wraps() {
        let acc = accelerator();
        let c = array_multiply(&acc, &[i32::MAX], &[2]).unwrap();
        assert_eq!(c, vec![i32::MAX.wrapping_mul(2)]);
    }

    #[test]
    fn test_array_multiply_short_operand() {
        let acc = accelerator();
        let err = array_multiply(&acc, &[1.0f32, 2.0], &[1.0]).unwrap_err();
        assert!(matches!(err, DeviceError::InvalidLaunch { .. }));
    }

    #[test]
    fn test_replicate() {
        let acc = accelerator();
        let data: Vec<u32> = (0..10).collect();
        let out = replicate(&acc, &data, 10_000).unwrap();
        assert_eq!(out.len(), 10_000);
        assert!(out.iter().enumerate().all(|(i, v)| *v == (i % 10) as u32));
    }

    #[test]
    fn test_replicate_empty_source() {
        let acc = accelerator();
        let err = replicate::<i32>(&acc, &[], 4).unwrap_err();
        assert!(matches!(err, DeviceError::InvalidLaunch { .. }));
    }
}
