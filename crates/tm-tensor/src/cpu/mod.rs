pub mod matmul;

use crate::backend::ComputeBackend;
use crate::error::{Result, TensorError};

/// Pure-Rust host compute backend.
///
/// With no block size the backend runs the straightforward triple loop and is
/// the reference every other backend is checked against. `CpuBackend::blocked`
/// switches matmul to the cache-blocked variant.
#[derive(Debug, Clone)]
pub struct CpuBackend {
    block: Option<usize>,
}

impl CpuBackend {
    pub fn new() -> Self {
        CpuBackend { block: None }
    }

    /// A backend whose matmul stages `block x block` operand blocks.
    pub fn blocked(block: usize) -> Self {
        CpuBackend { block: Some(block) }
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn matmul(&self, a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Result<Vec<f32>> {
        if a.len() != m * k {
            return Err(TensorError::Other(format!(
                "matmul: a.len()={} but expected m*k={}",
                a.len(),
                m * k
            )));
        }
        if b.len() != k * n {
            return Err(TensorError::Other(format!(
                "matmul: b.len()={} but expected k*n={}",
                b.len(),
                k * n
            )));
        }

        match self.block {
            Some(0) => Err(TensorError::Other(
                "matmul: block size must be > 0".to_string(),
            )),
            Some(block) => Ok(matmul::matmul_blocked(a, b, m, k, n, block)),
            None => Ok(matmul::matmul_reference(a, b, m, k, n)),
        }
    }

    fn mul(&self, a: &[f32], b: &[f32]) -> Result<Vec<f32>> {
        if a.len() != b.len() {
            return Err(TensorError::ShapeMismatch {
                expected: vec![a.len()],
                got: vec![b.len()],
            });
        }
        Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).collect())
    }

    fn replicate(&self, data: &[f32], len: usize) -> Result<Vec<f32>> {
        if data.is_empty() {
            return Err(TensorError::Other(
                "replicate: source must not be empty".to_string(),
            ));
        }
        Ok((0..len).map(|i| data[i % data.len()]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> CpuBackend {
        CpuBackend::new()
    }

    #[test]
    fn test_matmul_identity() {
        let b = backend();
        // 2x2 identity @ [1,2;3,4]
        let a = vec![1.0, 0.0, 0.0, 1.0];
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let c = b.matmul(&a, &x, 2, 2, 2).unwrap();
        assert_eq!(c, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_matmul_basic() {
        let b = backend();
        // [1,2;3,4] @ [5,6;7,8] = [19,22;43,50]
        let a = vec![1.0, 2.0, 3.0, 4.0];
        let x = vec![5.0, 6.0, 7.0, 8.0];
        let c = b.matmul(&a, &x, 2, 2, 2).unwrap();
        assert_eq!(c, vec![19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_matmul_blocked_backend() {
        let b = CpuBackend::blocked(2);
        let a = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let x = vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0];
        let c = b.matmul(&a, &x, 2, 3, 2).unwrap();
        assert_eq!(c, vec![58.0, 64.0, 139.0, 154.0]);
    }

    #[test]
    fn test_matmul_zero_block_rejected() {
        let b = CpuBackend::blocked(0);
        assert!(b.matmul(&[1.0], &[1.0], 1, 1, 1).is_err());
    }

    #[test]
    fn test_matmul_length_mismatch() {
        let b = backend();
        assert!(b.matmul(&[1.0, 2.0], &[1.0], 1, 2, 1).is_err());
    }

    #[test]
    fn test_mul() {
        let b = backend();
        let r = b.mul(&[2.0, 3.0], &[4.0, 5.0]).unwrap();
        assert_eq!(r, vec![8.0, 15.0]);
        assert!(b.mul(&[1.0], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_replicate() {
        let b = backend();
        let r = b.replicate(&[0.0, 1.0, 2.0], 7).unwrap();
        assert_eq!(r, vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0, 0.0]);
        assert!(b.replicate(&[], 3).is_err());
    }
}
