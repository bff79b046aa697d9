use std::fmt::Debug;

use crate::error::Result;

/// Trait for pluggable compute backends (host CPU, simulated accelerator, etc.).
///
/// Data is passed in as row-major slices and returned as owned vectors. The
/// backend is responsible for performing the computation and returning the
/// result.
pub trait ComputeBackend: Send + Sync + Debug {
    /// Returns the name of this backend (e.g., "cpu", "accelerator").
    fn name(&self) -> &str;

    /// Matrix multiplication: C = A @ B.
    ///
    /// - `a`: row-major data of shape [m, k]
    /// - `b`: row-major data of shape [k, n]
    /// - Returns: row-major data of shape [m, n]
    fn matmul(&self, a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Result<Vec<f32>>;

    /// Element-wise multiplication: result[i] = a[i] * b[i].
    fn mul(&self, a: &[f32], b: &[f32]) -> Result<Vec<f32>>;

    /// Replication: result[i] = data[i % data.len()] for `i` in `0..len`.
    fn replicate(&self, data: &[f32], len: usize) -> Result<Vec<f32>>;
}
