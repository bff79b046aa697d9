use thiserror::Error;

#[derive(Error, Debug)]
pub enum TensorError {
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },
    #[error("matmul dimension mismatch: [{m}x{k}] @ [{k2}x{n}]")]
    MatmulMismatch {
        m: usize,
        k: usize,
        k2: usize,
        n: usize,
    },
    #[error("matrix extents must be non-zero, got [{rows}x{cols}]")]
    EmptyMatrix { rows: usize, cols: usize },
    #[error("data length {got} does not match extent [{rows}x{cols}] (expected {expected})")]
    DataLength {
        rows: usize,
        cols: usize,
        expected: usize,
        got: usize,
    },
    #[error("index ({row}, {col}) out of bounds for [{rows}x{cols}]")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
    #[error("{backend} backend failed: {message}")]
    Backend { backend: String, message: String },
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TensorError>;
