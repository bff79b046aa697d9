use crate::error::{Result, TensorError};
use std::fmt;

/// The 2-D extent of a matrix: number of rows and columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent {
    pub rows: usize,
    pub cols: usize,
}

impl Extent {
    pub fn new(rows: usize, cols: usize) -> Self {
        Extent { rows, cols }
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.rows * self.cols
    }

    /// Returns an error if either dimension is zero.
    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.cols == 0 {
            return Err(TensorError::EmptyMatrix {
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(())
    }

    /// Returns true if `(row, col)` addresses an element inside this extent.
    pub fn contains(&self, row: usize, col: usize) -> bool {
        row < self.rows && col < self.cols
    }

    /// The extent with rows and columns swapped.
    pub fn transposed(&self) -> Extent {
        Extent::new(self.cols, self.rows)
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}x{}]", self.rows, self.cols)
    }
}

impl From<(usize, usize)> for Extent {
    fn from((rows, cols): (usize, usize)) -> Self {
        Extent::new(rows, cols)
    }
}

/// Memory order of a dense 2-D buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Layout {
    /// Elements of a row are contiguous.
    #[default]
    RowMajor,
    /// Elements of a column are contiguous.
    ColMajor,
}

impl Layout {
    /// Computes `(row_stride, col_stride)` for a dense buffer of the given extent.
    ///
    /// For a row-major [r, c] buffer the strides are (c, 1); for column-major
    /// they are (1, r).
    pub fn strides(&self, extent: Extent) -> (usize, usize) {
        match self {
            Layout::RowMajor => (extent.cols, 1),
            Layout::ColMajor => (1, extent.rows),
        }
    }

    /// Linear offset of `(row, col)` in a dense buffer of the given extent.
    #[inline]
    pub fn offset(&self, extent: Extent, row: usize, col: usize) -> usize {
        match self {
            Layout::RowMajor => row * extent.cols + col,
            Layout::ColMajor => col * extent.rows + row,
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::RowMajor => write!(f, "row-major"),
            Layout::ColMajor => write!(f, "col-major"),
        }
    }
}
