use tm_device::{Dim2, StreamKernel, View2D};

/// One lane per output element, reading operands straight from device memory.
///
/// Launched as a stream kernel whose index range is exactly C's extent, so
/// every `(x, y)` it sees addresses a real output element.
pub struct NaiveMatmul<'a> {
    a: View2D<'a, f32>,
    b: View2D<'a, f32>,
    c: View2D<'a, f32>,
}

impl<'a> NaiveMatmul<'a> {
    pub fn new(a: View2D<'a, f32>, b: View2D<'a, f32>, c: View2D<'a, f32>) -> Self {
        NaiveMatmul { a, b, c }
    }
}

impl StreamKernel for NaiveMatmul<'_> {
    fn name(&self) -> &str {
        "naive_matmul"
    }

    fn validate(&self, extent: Dim2) -> Result<(), String> {
        if self.a.cols() != self.b.rows()
            || self.a.rows() != self.c.rows()
            || self.b.cols() != self.c.cols()
        {
            return Err(format!(
                "operands {} @ {} do not produce {}",
                self.a.extent(),
                self.b.extent(),
                self.c.extent()
            ));
        }
        if extent != Dim2::from(self.c.extent()) {
            return Err(format!(
                "index range {} must equal output extent {}",
                extent,
                self.c.extent()
            ));
        }
        Ok(())
    }

    fn execute(&self, index: Dim2) {
        let (x, y) = (index.x, index.y);
        let mut sum = 0.0f32;
        for i in 0..self.a.cols() {
            sum += self.a.get(x, i) * self.b.get(i, y);
        }
        self.c.set(x, y, sum);
    }
}
