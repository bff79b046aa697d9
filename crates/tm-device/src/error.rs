use thiserror::Error;

use crate::geometry::Dim2;

/// A launch that asks for more than the device can provide.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceLimitError {
    #[error("group dim {requested} exceeds device maximum {max}")]
    GroupDim { requested: Dim2, max: Dim2 },
    #[error("{requested} threads per group exceeds device maximum {max}")]
    Units { requested: usize, max: usize },
    #[error("{requested} bytes of scratch memory per group exceeds device budget of {available} bytes")]
    Scratch { requested: usize, available: usize },
}

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("no accelerator available")]
    NoDevice,
    #[error("device index {index} out of range ({count} devices)")]
    UnknownDevice { index: usize, count: usize },
    #[error("out of device memory: requested {requested} bytes, {available} available")]
    OutOfMemory { requested: usize, available: usize },
    #[error(transparent)]
    ResourceLimit(#[from] ResourceLimitError),
    #[error("buffer length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },
    #[error("invalid launch of '{kernel}': {reason}")]
    InvalidLaunch { kernel: String, reason: String },
    #[error("kernel '{kernel}' failed in group {group}: {message}")]
    Execution {
        kernel: String,
        group: Dim2,
        message: String,
    },
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("tensor error: {0}")]
    Tensor(#[from] tm_tensor::TensorError),
}

pub type Result<T> = std::result::Result<T, DeviceError>;
