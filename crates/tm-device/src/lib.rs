//! `tm-device` - A simulated accelerator runtime for tilemul.
//!
//! Kernels run on the host but see the execution model of a GPU:
//! - a 2-D grid of 2-D thread groups, executed in parallel
//! - lanes inside a group that advance in lockstep between barriers
//! - a per-group scratch memory with a byte budget
//! - device buffers distinct from host memory, with allocation accounting
//! - capability figures used to validate launches before they run

pub mod accelerator;
pub mod buffer;
pub mod context;
pub mod error;
pub mod geometry;
pub mod group;
pub mod kernel;
pub mod properties;

pub use accelerator::{Accelerator, LaunchReport};
pub use buffer::{DeviceBuffer, DeviceElem, View1D, View2D};
pub use context::{Context, ContextBuilder, DeviceInfo};
pub use error::{DeviceError, ResourceLimitError, Result};
pub use geometry::{Dim2, LaunchGeometry};
pub use group::{GroupContext, Lane, SharedTile};
pub use kernel::{GroupKernel, StreamKernel};
pub use properties::{DeviceKind, DeviceProperties};
