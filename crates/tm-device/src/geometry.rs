use std::fmt;

use tm_tensor::Extent;

/// A 2-D size or index. `x` is the row axis, `y` the column axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dim2 {
    pub x: usize,
    pub y: usize,
}

impl Dim2 {
    pub const fn new(x: usize, y: usize) -> Self {
        Dim2 { x, y }
    }

    pub const fn square(side: usize) -> Self {
        Dim2 { x: side, y: side }
    }

    pub fn num_elems(&self) -> usize {
        self.x * self.y
    }

    /// True if `other` fits inside `self` on both axes.
    pub fn can_contain(&self, other: Dim2) -> bool {
        other.x <= self.x && other.y <= self.y
    }
}

impl fmt::Display for Dim2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl From<Extent> for Dim2 {
    fn from(extent: Extent) -> Self {
        Dim2::new(extent.rows, extent.cols)
    }
}

/// Grid and group dimensions of a grouped launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchGeometry {
    pub grid: Dim2,
    pub group: Dim2,
}

impl LaunchGeometry {
    pub fn new(grid: Dim2, group: Dim2) -> Self {
        LaunchGeometry { grid, group }
    }

    /// The smallest grid of `group`-sized groups covering `extent`.
    ///
    /// `group` must be non-zero on both axes.
    pub fn covering(extent: Dim2, group: Dim2) -> Self {
        LaunchGeometry {
            grid: Dim2::new(extent.x.div_ceil(group.x), extent.y.div_ceil(group.y)),
            group,
        }
    }

    pub fn num_groups(&self) -> usize {
        self.grid.num_elems()
    }

    pub fn threads_per_group(&self) -> usize {
        self.group.num_elems()
    }

    /// The index space actually launched, which may exceed the covered extent.
    pub fn launched(&self) -> Dim2 {
        Dim2::new(self.grid.x * self.group.x, self.grid.y * self.group.y)
    }
}

impl fmt::Display for LaunchGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "grid={} group={}", self.grid, self.group)
    }
}
