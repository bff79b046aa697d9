use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::backend::ComputeBackend;
use crate::error::{Result, TensorError};
use crate::layout::{Extent, Layout};

/// A dense, host-resident 2-D matrix of f32 values.
///
/// The backing store holds exactly `rows * cols` elements in either row-major
/// or column-major order. Computation is dispatched to a `ComputeBackend`.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    data: Vec<f32>,
    extent: Extent,
    layout: Layout,
}

impl Matrix {
    /// Create a row-major matrix from data.
    pub fn new(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self> {
        Self::with_layout(rows, cols, data, Layout::RowMajor)
    }

    /// Create a matrix whose data is stored in the given layout.
    pub fn with_layout(rows: usize, cols: usize, data: Vec<f32>, layout: Layout) -> Result<Self> {
        let extent = Extent::new(rows, cols);
        extent.validate()?;
        if data.len() != extent.numel() {
            return Err(TensorError::DataLength {
                rows,
                cols,
                expected: extent.numel(),
                got: data.len(),
            });
        }
        Ok(Matrix {
            data,
            extent,
            layout,
        })
    }

    /// Build a row-major matrix from a list of equally sized rows.
    pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> Result<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        let mut data = Vec::with_capacity(n_rows * n_cols);
        for row in rows {
            let row = row.as_ref();
            if row.len() != n_cols {
                return Err(TensorError::ShapeMismatch {
                    expected: vec![n_cols],
                    got: vec![row.len()],
                });
            }
            data.extend_from_slice(row);
        }
        Self::new(n_rows, n_cols, data)
    }

    /// Create a zero-filled row-major matrix.
    pub fn zeros(rows: usize, cols: usize) -> Result<Self> {
        Self::filled(rows, cols, 0.0)
    }

    /// Create a row-major matrix with every element set to `value`.
    pub fn filled(rows: usize, cols: usize, value: f32) -> Result<Self> {
        Self::new(rows, cols, vec![value; rows * cols])
    }

    /// Create an n×n identity matrix.
    pub fn identity(n: usize) -> Result<Self> {
        let mut m = Self::zeros(n, n)?;
        for i in 0..n {
            m.set(i, i, 1.0)?;
        }
        Ok(m)
    }

    /// Create a row-major matrix of values drawn uniformly from [-1, 1)
    /// using a seeded RNG, so runs are reproducible.
    pub fn random(rows: usize, cols: usize, seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let data = (0..rows * cols).map(|_| rng.gen_range(-1.0f32..1.0)).collect();
        Self::new(rows, cols, data)
    }

    pub fn rows(&self) -> usize {
        self.extent.rows
    }

    pub fn cols(&self) -> usize {
        self.extent.cols
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Returns the backing store in this matrix's layout.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Consumes the matrix and returns its backing store.
    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    /// Returns the element at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> Result<f32> {
        self.check_index(row, col)?;
        Ok(self.data[self.layout.offset(self.extent, row, col)])
    }

    /// Sets the element at `(row, col)`.
    pub fn set(&mut self, row: usize, col: usize, value: f32) -> Result<()> {
        self.check_index(row, col)?;
        let idx = self.layout.offset(self.extent, row, col);
        self.data[idx] = value;
        Ok(())
    }

    fn check_index(&self, row: usize, col: usize) -> Result<()> {
        if !self.extent.contains(row, col) {
            return Err(TensorError::IndexOutOfBounds {
                row,
                col,
                rows: self.extent.rows,
                cols: self.extent.cols,
            });
        }
        Ok(())
    }

    /// Returns a copy of this matrix stored in `layout`.
    pub fn to_layout(&self, layout: Layout) -> Matrix {
        if layout == self.layout {
            return self.clone();
        }
        let mut data = vec![0.0f32; self.data.len()];
        for r in 0..self.extent.rows {
            for c in 0..self.extent.cols {
                data[layout.offset(self.extent, r, c)] =
                    self.data[self.layout.offset(self.extent, r, c)];
            }
        }
        Matrix {
            data,
            extent: self.extent,
            layout,
        }
    }

    /// Returns the transpose, keeping this matrix's layout.
    pub fn transpose(&self) -> Matrix {
        let t_extent = self.extent.transposed();
        let mut data = vec![0.0f32; self.data.len()];
        for r in 0..self.extent.rows {
            for c in 0..self.extent.cols {
                data[self.layout.offset(t_extent, c, r)] =
                    self.data[self.layout.offset(self.extent, r, c)];
            }
        }
        Matrix {
            data,
            extent: t_extent,
            layout: self.layout,
        }
    }

    /// Largest elementwise relative difference `|a - b| / max(|a|, |b|, 1)`.
    ///
    /// Layouts may differ; elements are compared by logical coordinate.
    pub fn max_relative_diff(&self, other: &Matrix) -> Result<f32> {
        if self.extent != other.extent {
            return Err(TensorError::ShapeMismatch {
                expected: vec![self.extent.rows, self.extent.cols],
                got: vec![other.extent.rows, other.extent.cols],
            });
        }
        let mut worst = 0.0f32;
        for r in 0..self.extent.rows {
            for c in 0..self.extent.cols {
                let a = self.data[self.layout.offset(self.extent, r, c)];
                let b = other.data[other.layout.offset(other.extent, r, c)];
                let scale = a.abs().max(b.abs()).max(1.0);
                worst = worst.max((a - b).abs() / scale);
            }
        }
        Ok(worst)
    }

    /// True if both matrices have the same extent and agree within `rel_tol`.
    pub fn approx_eq(&self, other: &Matrix, rel_tol: f32) -> bool {
        matches!(self.max_relative_diff(other), Ok(d) if d <= rel_tol)
    }

    /// Matrix multiplication using the given backend.
    ///
    /// self is [m, k], other is [k, n], result is [m, n] in self's layout.
    pub fn matmul(&self, other: &Matrix, backend: &dyn ComputeBackend) -> Result<Matrix> {
        let (m, k) = (self.rows(), self.cols());
        let (k2, n) = (other.rows(), other.cols());
        if k != k2 {
            return Err(TensorError::MatmulMismatch { m, k, k2, n });
        }

        let a = self.to_layout(Layout::RowMajor);
        let b = other.to_layout(Layout::RowMajor);
        let result = backend.matmul(a.data(), b.data(), m, k, n)?;
        Ok(Matrix::new(m, n, result)?.to_layout(self.layout))
    }
}
