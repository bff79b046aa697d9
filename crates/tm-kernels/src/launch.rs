//! Launch orchestration for the matmul kernels.
//!
//! The orchestrator checks operand shapes, derives the launch geometry and
//! validates it against the device before any memory is allocated, then runs
//! upload, launch, synchronize and download for one multiplication. Device
//! buffers live only for the duration of the call.

use tm_device::{Accelerator, DeviceProperties, Dim2, LaunchGeometry};
use tm_tensor::Matrix;

use crate::config::{MatmulConfig, MatmulStrategy, TilePolicy};
use crate::error::{MatmulError, Result};
use crate::naive::NaiveMatmul;
use crate::tiled::{tile_scratch_bytes, TiledMatmul};

/// Largest tile the auto policy will choose.
pub const MAX_AUTO_TILE: usize = 32;

/// A validated tiled launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiledPlan {
    pub tile: usize,
    pub geometry: LaunchGeometry,
    /// Scratch bytes each group allocates.
    pub scratch_bytes: usize,
}

/// Plan a tiled launch of `[m x k] @ [k x n]` with `tile x tile` groups.
///
/// Fails with a configuration error if the tile is zero, needs more threads
/// or a larger group than the device allows, or its two scratch tiles do not
/// fit the device's per-group scratch budget.
pub fn plan_tiled(
    m: usize,
    k: usize,
    n: usize,
    tile: usize,
    properties: &DeviceProperties,
) -> Result<TiledPlan> {
    if tile == 0 {
        return Err(MatmulError::InvalidTile { tile });
    }
    let threads = tile.saturating_mul(tile);
    if threads > properties.max_threads_per_group {
        return Err(MatmulError::GroupTooLarge {
            tile,
            threads,
            max_threads: properties.max_threads_per_group,
        });
    }
    if !properties.max_group_dim.can_contain(Dim2::square(tile)) {
        return Err(MatmulError::GroupDimExceeded {
            tile,
            max: properties.max_group_dim,
        });
    }
    let required = tile_scratch_bytes(tile);
    let available = properties.scratch_budget();
    if required > available {
        return Err(MatmulError::ScratchBudget {
            tile,
            required,
            available,
        });
    }

    let geometry = LaunchGeometry::covering(Dim2::new(m, n), Dim2::square(tile));
    log::debug!(
        "tiled plan for [{}x{}] @ [{}x{}]: tile={} {} ({} scratch bytes per group)",
        m,
        k,
        k,
        n,
        tile,
        geometry,
        required
    );
    Ok(TiledPlan {
        tile,
        geometry,
        scratch_bytes: required,
    })
}

/// Pick a tile size for an `m x n` output on this device.
///
/// Starts from the largest power of two up to `MAX_AUTO_TILE` that fits the
/// thread limit, the group dim limit and the scratch budget, then shrinks it
/// to the smallest power of two covering `max(m, n)`.
pub fn auto_tile(m: usize, n: usize, properties: &DeviceProperties) -> usize {
    let fits = |t: usize| {
        t * t <= properties.max_threads_per_group
            && properties.max_group_dim.can_contain(Dim2::square(t))
            && tile_scratch_bytes(t) <= properties.scratch_budget()
    };
    let mut tile = MAX_AUTO_TILE;
    while tile > 1 && !fits(tile) {
        tile /= 2;
    }
    tile.min(m.max(n).max(1).next_power_of_two())
}

/// Rejects operands whose inner dimensions disagree.
pub fn check_shapes(a: &Matrix, b: &Matrix) -> Result<()> {
    if a.cols() != b.rows() {
        return Err(MatmulError::Shape {
            a_rows: a.rows(),
            a_cols: a.cols(),
            b_rows: b.rows(),
            b_cols: b.cols(),
        });
    }
    Ok(())
}

/// Runs matrix multiplications on one accelerator.
#[derive(Debug, Clone, Copy)]
pub struct Multiplier<'acc> {
    accelerator: &'acc Accelerator,
    config: MatmulConfig,
}

impl<'acc> Multiplier<'acc> {
    pub fn new(accelerator: &'acc Accelerator, config: MatmulConfig) -> Self {
        Multiplier {
            accelerator,
            config,
        }
    }

    pub fn config(&self) -> &MatmulConfig {
        &self.config
    }

    pub fn accelerator(&self) -> &'acc Accelerator {
        self.accelerator
    }

    /// The tile size the configured policy yields for an `m x n` output.
    pub fn resolve_tile(&self, m: usize, n: usize) -> usize {
        match self.config.tile {
            TilePolicy::Fixed(tile) => tile,
            TilePolicy::Auto => auto_tile(m, n, self.accelerator.properties()),
        }
    }

    /// C = A @ B with the configured strategy. C has A's layout.
    pub fn multiply(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        match self.config.strategy {
            MatmulStrategy::Naive => self.multiply_naive(a, b),
            MatmulStrategy::Tiled => {
                check_shapes(a, b)?;
                let tile = self.resolve_tile(a.rows(), b.cols());
                self.multiply_tiled(a, b, tile)
            }
        }
    }

    /// C = A @ B with the naive kernel.
    pub fn multiply_naive(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        check_shapes(a, b)?;
        let acc = self.accelerator;
        let (m, n) = (a.rows(), b.cols());

        let a_buf = acc.upload_matrix(a)?;
        let b_buf = acc.upload_matrix(b)?;
        let c_buf = acc.allocate_2d::<f32>((m, n).into(), a.layout())?;

        let kernel = NaiveMatmul::new(a_buf.view_2d(), b_buf.view_2d(), c_buf.view_2d());
        let report = acc.launch_stream(&kernel, Dim2::new(m, n))?;
        acc.synchronize();
        log::debug!("naive matmul {} finished in {:?}", c_buf.extent(), report.elapsed);

        Ok(acc.download_matrix(&c_buf)?)
    }

    /// C = A @ B with the tiled kernel and `tile x tile` groups.
    pub fn multiply_tiled(&self, a: &Matrix, b: &Matrix, tile: usize) -> Result<Matrix> {
        check_shapes(a, b)?;
        let acc = self.accelerator;
        let (m, k, n) = (a.rows(), a.cols(), b.cols());
        let plan = plan_tiled(m, k, n, tile, acc.properties())?;

        let a_buf = acc.upload_matrix(a)?;
        let b_buf = acc.upload_matrix(b)?;
        let c_buf = acc.allocate_2d::<f32>((m, n).into(), a.layout())?;

        let kernel = TiledMatmul::new(a_buf.view_2d(), b_buf.view_2d(), c_buf.view_2d(), plan.tile);
        let report = acc.launch_grouped(&kernel, plan.geometry)?;
        acc.synchronize();
        log::debug!(
            "tiled matmul {} (tile {}) finished in {:?}, {} barriers per group",
            c_buf.extent(),
            plan.tile,
            report.elapsed,
            report.barriers_per_group
        );

        Ok(acc.download_matrix(&c_buf)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tm_device::Context;

    #[test]
    fn test_plan_geometry() {
        let props = DeviceProperties::discrete_gpu();
        let plan = plan_tiled(100, 7, 33, 16, &props).unwrap();
        assert_eq!(plan.geometry.group, Dim2::square(16));
        assert_eq!(plan.geometry.grid, Dim2::new(7, 3));
        assert_eq!(plan.scratch_bytes, 2 * 16 * 16 * 4);
    }

    #[test]
    fn test_plan_rejections() {
        let props = DeviceProperties::cpu().with_shared_memory(1024);
        assert!(matches!(
            plan_tiled(4, 4, 4, 0, &props),
            Err(MatmulError::InvalidTile { tile: 0 })
        ));
        assert!(matches!(
            plan_tiled(4, 4, 4, 64, &props),
            Err(MatmulError::GroupTooLarge { tile: 64, threads: 4096, max_threads: 1024 })
        ));
        let err = plan_tiled(4, 4, 4, 16, &props).unwrap_err();
        assert!(matches!(
            err,
            MatmulError::ScratchBudget { tile: 16, required: 2048, available: 1024 }
        ));
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let narrow = DeviceProperties::cpu().with_max_group_dim(Dim2::new(8, 64));
        assert!(matches!(
            plan_tiled(4, 4, 4, 16, &narrow),
            Err(MatmulError::GroupDimExceeded { tile: 16, .. })
        ));
    }

    #[test]
    fn test_plan_with_huge_bus_width() {
        let props = DeviceProperties::integrated_gpu().with_memory_bus_width(usize::MAX);
        let plan = plan_tiled(4, 4, 4, 4, &props).unwrap();
        assert_eq!(plan.scratch_bytes, 128);
        assert_eq!(auto_tile(1000, 1000, &props), 16);
    }

    #[test]
    fn test_auto_tile() {
        let big = DeviceProperties::discrete_gpu();
        assert_eq!(auto_tile(1000, 1000, &big), 32);
        assert_eq!(auto_tile(4, 5, &big), 8);
        assert_eq!(auto_tile(1, 1, &big), 1);

        // 256 threads per group caps the tile at 16.
        let small = DeviceProperties::integrated_gpu();
        assert_eq!(auto_tile(1000, 1000, &small), 16);

        // 2 KiB of scratch fits 2 * 16 * 16 * 4 bytes.
        let tight = DeviceProperties::cpu().with_shared_memory(2048);
        assert_eq!(auto_tile(1000, 1000, &tight), 16);
    }

    #[test]
    fn test_config_error_launches_nothing() {
        let ctx = Context::builder()
            .device(DeviceProperties::cpu().with_shared_memory(64))
            .build()
            .unwrap();
        let acc = ctx.create_accelerator(ctx.preferred_device(true)).unwrap();
        let a = Matrix::filled(4, 4, 1.0).unwrap();
        let err = Multiplier::new(&acc, MatmulConfig::tiled(8))
            .multiply(&a, &a)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(acc.launch_count(), 0);
        assert_eq!(acc.allocated_bytes(), 0);
    }

    #[test]
    fn test_multiply_small() {
        let ctx = Context::create_default().unwrap();
        let acc = ctx.create_accelerator(ctx.preferred_device(true)).unwrap();
        let a = Matrix::new(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let b = Matrix::new(2, 2, vec![5.0, 6.0, 7.0, 8.0]).unwrap();
        for config in [MatmulConfig::naive(), MatmulConfig::tiled(2), MatmulConfig::default()] {
            let c = Multiplier::new(&acc, config).multiply(&a, &b).unwrap();
            assert_eq!(c.data(), &[19.0, 22.0, 43.0, 50.0]);
        }
        assert_eq!(acc.allocated_bytes(), 0);
    }
}
