use crate::buffer::DeviceElem;
use crate::error::{ResourceLimitError, Result};
use crate::geometry::Dim2;

/// One lane (logical thread) of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lane {
    /// Linear id inside the group, `local.x * group.y + local.y`.
    pub id: usize,
    /// Coordinate inside the group.
    pub local: Dim2,
    /// Coordinate in the launched index space.
    pub global: Dim2,
}

/// Execution state of one thread group.
///
/// Lanes run in lockstep: `for_each_lane` runs one phase for every lane
/// before returning, so a phase followed by `barrier` completes all of its
/// writes before any lane starts the next phase. Scratch memory is charged
/// against the device's per-group budget and lives as long as the group.
#[derive(Debug)]
pub struct GroupContext {
    index: Dim2,
    dim: Dim2,
    scratch_budget: usize,
    scratch_used: usize,
    barriers: usize,
}

impl GroupContext {
    pub(crate) fn new(index: Dim2, dim: Dim2, scratch_budget: usize) -> Self {
        GroupContext {
            index,
            dim,
            scratch_budget,
            scratch_used: 0,
            barriers: 0,
        }
    }

    /// Index of this group in the grid.
    pub fn index(&self) -> Dim2 {
        self.index
    }

    /// Group dimensions.
    pub fn dim(&self) -> Dim2 {
        self.dim
    }

    pub fn num_lanes(&self) -> usize {
        self.dim.num_elems()
    }

    /// Run one phase of the kernel for every lane of the group.
    pub fn for_each_lane<F: FnMut(Lane)>(&self, mut f: F) {
        let base = Dim2::new(self.index.x * self.dim.x, self.index.y * self.dim.y);
        for lx in 0..self.dim.x {
            for ly in 0..self.dim.y {
                f(Lane {
                    id: lx * self.dim.y + ly,
                    local: Dim2::new(lx, ly),
                    global: Dim2::new(base.x + lx, base.y + ly),
                });
            }
        }
    }

    /// Group-wide barrier.
    pub fn barrier(&mut self) {
        self.barriers += 1;
    }

    /// Number of barriers this group has passed.
    pub fn barriers(&self) -> usize {
        self.barriers
    }

    /// Scratch bytes allocated so far.
    pub fn scratch_used(&self) -> usize {
        self.scratch_used
    }

    /// Allocate a zeroed `rows x cols` tile in group scratch memory.
    pub fn alloc_tile<T: DeviceElem>(&mut self, rows: usize, cols: usize) -> Result<SharedTile<T>> {
        let bytes = rows * cols * T::DTYPE.size_in_bytes();
        let requested = self.scratch_used + bytes;
        if requested > self.scratch_budget {
            return Err(ResourceLimitError::Scratch {
                requested,
                available: self.scratch_budget,
            }
            .into());
        }
        self.scratch_used = requested;
        Ok(SharedTile {
            data: vec![T::default(); rows * cols],
            cols,
        })
    }
}

/// A row-major tile in group scratch memory.
#[derive(Debug, Clone)]
pub struct SharedTile<T: DeviceElem> {
    data: Vec<T>,
    cols: usize,
}

impl<T: DeviceElem> SharedTile<T> {
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: T) {
        self.data[row * self.cols + col] = value;
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
