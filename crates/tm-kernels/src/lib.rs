//! `tm-kernels` - Matrix multiplication kernels for the tilemul accelerator.
//!
//! - `naive`: one lane per output element
//! - `tiled`: operand tiles staged in group scratch memory between barriers
//! - `elementwise`: array multiply and replicate stream kernels
//! - `launch`: shape checks, tile planning and the `Multiplier` orchestrator
//! - `backend`: `AcceleratorBackend`, the accelerator behind `ComputeBackend`

pub mod backend;
pub mod config;
pub mod elementwise;
pub mod error;
pub mod launch;
pub mod naive;
pub mod tiled;

pub use backend::AcceleratorBackend;
pub use config::{MatmulConfig, MatmulStrategy, TilePolicy};
pub use error::{ErrorKind, MatmulError, Result};
pub use launch::{auto_tile, plan_tiled, Multiplier, TiledPlan};
pub use naive::NaiveMatmul;
pub use tiled::TiledMatmul;
