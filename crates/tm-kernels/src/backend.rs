use std::sync::Arc;

use tm_device::Accelerator;
use tm_tensor::{ComputeBackend, Matrix, Result, TensorError};

use crate::config::MatmulConfig;
use crate::elementwise;
use crate::error::MatmulError;
use crate::launch::Multiplier;

/// A `ComputeBackend` that runs every operation on an accelerator.
#[derive(Debug, Clone)]
pub struct AcceleratorBackend {
    accelerator: Arc<Accelerator>,
    config: MatmulConfig,
}

impl AcceleratorBackend {
    pub fn new(accelerator: Arc<Accelerator>, config: MatmulConfig) -> Self {
        AcceleratorBackend {
            accelerator,
            config,
        }
    }

    pub fn accelerator(&self) -> &Accelerator {
        &self.accelerator
    }

    fn backend_error(&self, err: impl std::fmt::Display) -> TensorError {
        TensorError::Backend {
            backend: self.name().to_string(),
            message: err.to_string(),
        }
    }
}

impl ComputeBackend for AcceleratorBackend {
    fn name(&self) -> &str {
        "accelerator"
    }

    fn matmul(&self, a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Result<Vec<f32>> {
        let a = Matrix::new(m, k, a.to_vec())?;
        let b = Matrix::new(k, n, b.to_vec())?;
        match Multiplier::new(&self.accelerator, self.config).multiply(&a, &b) {
            Ok(c) => Ok(c.into_data()),
            Err(MatmulError::Tensor(e)) => Err(e),
            Err(e) => Err(self.backend_error(e)),
        }
    }

    fn mul(&self, a: &[f32], b: &[f32]) -> Result<Vec<f32>> {
        if a.len() != b.len() {
            return Err(TensorError::ShapeMismatch {
                expected: vec![a.len()],
                got: vec![b.len()],
            });
        }
        elementwise::array_multiply(&self.accelerator, a, b).map_err(|e| self.backend_error(e))
    }

    fn replicate(&self, data: &[f32], len: usize) -> Result<Vec<f32>> {
        elementwise::replicate(&self.accelerator, data, len).map_err(|e| self.backend_error(e))
    }
}
