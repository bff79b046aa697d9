//! `tm-tensor` - Host-side matrices and reference compute backends for tilemul.
//!
//! This crate provides:
//! - A dense `Matrix` type with row- or column-major storage
//! - A `ComputeBackend` trait for pluggable compute (host, accelerator)
//! - A reference `CpuBackend` implementation, including a cache-blocked matmul
//! - Extent and layout utilities
//! - Element type definitions

pub mod backend;
pub mod cpu;
pub mod dtype;
pub mod error;
pub mod layout;
pub mod matrix;

// Re-export primary types at the crate root for convenience.
pub use backend::ComputeBackend;
pub use cpu::CpuBackend;
pub use dtype::DType;
pub use error::{Result, TensorError};
pub use layout::{Extent, Layout};
pub use matrix::Matrix;
