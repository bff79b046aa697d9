use thiserror::Error;

use tm_device::{DeviceError, Dim2};
use tm_tensor::TensorError;

/// The three ways a multiplication can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operand extents are incompatible.
    Shape,
    /// The launch configuration does not fit the device.
    Configuration,
    /// The device failed while running the kernel.
    Device,
}

#[derive(Error, Debug)]
pub enum MatmulError {
    #[error("shape mismatch: [{a_rows}x{a_cols}] @ [{b_rows}x{b_cols}] requires A.cols == B.rows")]
    Shape {
        a_rows: usize,
        a_cols: usize,
        b_rows: usize,
        b_cols: usize,
    },
    #[error("invalid tile size {tile}: must be at least 1")]
    InvalidTile { tile: usize },
    #[error("tile size {tile} needs {threads} threads per group, device maximum is {max_threads}")]
    GroupTooLarge {
        tile: usize,
        threads: usize,
        max_threads: usize,
    },
    #[error("tile size {tile} exceeds device maximum group dim {max}")]
    GroupDimExceeded { tile: usize, max: Dim2 },
    #[error("tile size {tile} needs {required} bytes of scratch memory per group, device budget is {available} bytes")]
    ScratchBudget {
        tile: usize,
        required: usize,
        available: usize,
    },
    #[error("device error: {0}")]
    Device(#[from] DeviceError),
    #[error("tensor error: {0}")]
    Tensor(#[from] TensorError),
}

impl MatmulError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MatmulError::Shape { .. } | MatmulError::Tensor(_) => ErrorKind::Shape,
            MatmulError::InvalidTile { .. }
            | MatmulError::GroupTooLarge { .. }
            | MatmulError::GroupDimExceeded { .. }
            | MatmulError::ScratchBudget { .. }
            | MatmulError::Device(DeviceError::ResourceLimit(_)) => ErrorKind::Configuration,
            MatmulError::Device(_) => ErrorKind::Device,
        }
    }
}

pub type Result<T> = std::result::Result<T, MatmulError>;
