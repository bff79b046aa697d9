use tm_device::{DeviceError, DeviceElem, Dim2, GroupContext, GroupKernel, Result, View2D};

/// Scratch tiles each group stages: one for A, one for B.
pub const TILES_PER_GROUP: usize = 2;

/// Scratch bytes one group of a `tile x tile` launch needs.
pub fn tile_scratch_bytes(tile: usize) -> usize {
    TILES_PER_GROUP
        .saturating_mul(tile)
        .saturating_mul(tile)
        .saturating_mul(<f32 as DeviceElem>::DTYPE.size_in_bytes())
}

/// Shared-memory tiled matrix multiplication.
///
/// Each `T x T` group computes one `T x T` block of C. For every step along
/// the reduction axis the group stages a block of A and a block of B into
/// scratch tiles, waits at a barrier, accumulates from the tiles, and waits
/// again before the tiles are overwritten.
///
/// Coordinates follow a single `(row, col)` convention: a lane at local
/// `(lx, ly)` of group `(bx, by)` owns `C[bx*T + lx, by*T + ly]`. Loads that
/// fall outside A or B stage a zero, and lanes outside C never write, so the
/// grid may be rounded up to whole tiles.
pub struct TiledMatmul<'a> {
    a: View2D<'a, f32>,
    b: View2D<'a, f32>,
    c: View2D<'a, f32>,
    tile: usize,
}

impl<'a> TiledMatmul<'a> {
    pub fn new(a: View2D<'a, f32>, b: View2D<'a, f32>, c: View2D<'a, f32>, tile: usize) -> Self {
        TiledMatmul { a, b, c, tile }
    }

    pub fn tile(&self) -> usize {
        self.tile
    }
}

impl GroupKernel for TiledMatmul<'_> {
    fn name(&self) -> &str {
        "tiled_matmul"
    }

    fn scratch_bytes(&self, _group: Dim2) -> usize {
        tile_scratch_bytes(self.tile)
    }

    fn execute_group(&self, group: &mut GroupContext) -> Result<()> {
        let t = self.tile;
        if group.dim() != Dim2::square(t) {
            return Err(DeviceError::InvalidLaunch {
                kernel: self.name().to_string(),
                reason: format!("group dim {} does not match tile size {}", group.dim(), t),
            });
        }

        let (m, k, n) = (self.a.rows(), self.a.cols(), self.b.cols());
        let (a, b, c) = (self.a, self.b, self.c);

        let mut a_tile = group.alloc_tile::<f32>(t, t)?;
        let mut b_tile = group.alloc_tile::<f32>(t, t)?;
        let mut sums = vec![0.0f32; group.num_lanes()];

        for k0 in (0..k).step_by(t) {
            group.for_each_lane(|lane| {
                let (lx, ly) = (lane.local.x, lane.local.y);
                let (gx, gy) = (lane.global.x, lane.global.y);
                let a_val = if gx < m && k0 + ly < k {
                    a.get(gx, k0 + ly)
                } else {
                    0.0
                };
                let b_val = if k0 + lx < k && gy < n {
                    b.get(k0 + lx, gy)
                } else {
                    0.0
                };
                a_tile.set(lx, ly, a_val);
                b_tile.set(lx, ly, b_val);
            });
            group.barrier();

            group.for_each_lane(|lane| {
                let (lx, ly) = (lane.local.x, lane.local.y);
                let mut sum = sums[lane.id];
                for p in 0..t {
                    sum += a_tile.get(lx, p) * b_tile.get(p, ly);
                }
                sums[lane.id] = sum;
            });
            group.barrier();
        }

        group.for_each_lane(|lane| {
            let (gx, gy) = (lane.global.x, lane.global.y);
            if gx < m && gy < n {
                c.set(gx, gy, sums[lane.id]);
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tm_device::{Context, LaunchGeometry};
    use tm_tensor::{Extent, Layout, Matrix};

    #[test]
    fn test_scratch_bytes() {
        assert_eq!(tile_scratch_bytes(1), 8);
        assert_eq!(tile_scratch_bytes(32), 8192);
        assert_eq!(tile_scratch_bytes(usize::MAX), usize::MAX);
    }

    #[test]
    fn test_tiled_kernel_barrier_count() {
        let ctx = Context::create_default().unwrap();
        let acc = ctx.create_accelerator(ctx.preferred_device(true)).unwrap();
        // K = 5 with T = 2 takes three reduction steps.
        let a = acc.upload_matrix(&Matrix::filled(3, 5, 1.0).unwrap()).unwrap();
        let b = acc.upload_matrix(&Matrix::filled(5, 3, 2.0).unwrap()).unwrap();
        let c = acc
            .allocate_2d::<f32>(Extent::new(3, 3), Layout::RowMajor)
            .unwrap();
        let kernel = TiledMatmul::new(a.view_2d(), b.view_2d(), c.view_2d(), 2);
        let geometry = LaunchGeometry::covering(Dim2::new(3, 3), Dim2::square(2));
        let report = acc.launch_grouped(&kernel, geometry).unwrap();
        assert_eq!(report.barriers_per_group, 6);
        assert_eq!(report.geometry.grid, Dim2::new(2, 2));
        assert!(c.to_host().iter().all(|v| *v == 10.0));
    }

    #[test]
    fn test_mismatched_group_dim_rejected() {
        let ctx = Context::create_default().unwrap();
        let acc = ctx.create_accelerator(ctx.preferred_device(true)).unwrap();
        let a = acc.upload_matrix(&Matrix::filled(2, 2, 1.0).unwrap()).unwrap();
        let c = acc
            .allocate_2d::<f32>(Extent::new(2, 2), Layout::RowMajor)
            .unwrap();
        let kernel = TiledMatmul::new(a.view_2d(), a.view_2d(), c.view_2d(), 2);
        let geometry = LaunchGeometry::new(Dim2::square(1), Dim2::new(2, 1));
        assert!(matches!(
            acc.launch_grouped(&kernel, geometry),
            Err(DeviceError::InvalidLaunch { .. })
        ));
    }
}
