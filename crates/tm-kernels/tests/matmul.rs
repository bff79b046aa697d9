use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tm_device::{Accelerator, Context, DeviceProperties};
use tm_kernels::{ErrorKind, MatmulConfig, MatmulError, Multiplier};
use tm_tensor::{CpuBackend, Layout, Matrix};

fn cpu_accelerator() -> Accelerator {
    let ctx = Context::create_default().unwrap();
    ctx.create_accelerator(ctx.preferred_device(true)).unwrap()
}

fn gpu_accelerator() -> Accelerator {
    let ctx = Context::all_accelerators().unwrap();
    ctx.create_accelerator(ctx.preferred_device(false)).unwrap()
}

fn scenario() -> (Matrix, Matrix, Matrix) {
    let a = Matrix::from_rows(&[
        [1.0, 2.0, 3.0],
        [4.0, 5.0, 6.0],
        [7.0, 8.0, 9.0],
        [10.0, 11.0, 12.0],
    ])
    .unwrap();
    let b = Matrix::from_rows(&[
        [13.0, 14.0, 15.0, 16.0, 17.0],
        [18.0, 19.0, 20.0, 21.0, 22.0],
        [23.0, 24.0, 25.0, 26.0, 27.0],
    ])
    .unwrap();
    let c = Matrix::from_rows(&[
        [118.0, 124.0, 130.0, 136.0, 142.0],
        [280.0, 295.0, 310.0, 325.0, 340.0],
        [442.0, 466.0, 490.0, 514.0, 538.0],
        [604.0, 637.0, 670.0, 703.0, 736.0],
    ])
    .unwrap();
    (a, b, c)
}

#[test]
fn test_scenario_naive_and_tiled() {
    let acc = cpu_accelerator();
    let (a, b, expected) = scenario();

    let naive = Multiplier::new(&acc, MatmulConfig::naive())
        .multiply(&a, &b)
        .unwrap();
    assert_eq!(naive, expected);

    for tile in [1, 2, 4, 32] {
        let tiled = Multiplier::new(&acc, MatmulConfig::tiled(tile))
            .multiply(&a, &b)
            .unwrap();
        assert_eq!(tiled, expected, "tile size {}", tile);
    }
}

#[test]
fn test_naive_equals_host_product() {
    let acc = cpu_accelerator();
    let host = CpuBackend::new();
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..8 {
        let (m, k, n) = (rng.gen_range(1..20), rng.gen_range(1..20), rng.gen_range(1..20));
        let a = Matrix::random(m, k, rng.gen()).unwrap();
        let b = Matrix::random(k, n, rng.gen()).unwrap();
        let naive = Multiplier::new(&acc, MatmulConfig::naive())
            .multiply(&a, &b)
            .unwrap();
        // Same summation order as the host reference, so results are identical.
        assert_eq!(naive, a.matmul(&b, &host).unwrap());
    }
}

#[test]
fn test_tiled_agrees_with_naive() {
    let acc = gpu_accelerator();
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..10 {
        let (m, k, n) = (rng.gen_range(1..70), rng.gen_range(1..70), rng.gen_range(1..70));
        let a = Matrix::random(m, k, rng.gen()).unwrap();
        let b = Matrix::random(k, n, rng.gen()).unwrap();
        let naive = Multiplier::new(&acc, MatmulConfig::naive())
            .multiply(&a, &b)
            .unwrap();
        for config in [MatmulConfig::tiled(8), MatmulConfig::tiled(16), MatmulConfig::default()] {
            let tiled = Multiplier::new(&acc, config).multiply(&a, &b).unwrap();
            let diff = tiled.max_relative_diff(&naive).unwrap();
            assert!(diff <= 1e-4, "[{}x{}]@[{}x{}] {:?}: diff {}", m, k, k, n, config, diff);
        }
    }
}

#[test]
fn test_tiled_matches_blocked_host() {
    let acc = cpu_accelerator();
    let a = Matrix::random(37, 23, 5).unwrap();
    let b = Matrix::random(23, 41, 6).unwrap();
    for tile in [3, 8, 16] {
        let tiled = Multiplier::new(&acc, MatmulConfig::tiled(tile))
            .multiply(&a, &b)
            .unwrap();
        let blocked = a.matmul(&b, &CpuBackend::blocked(tile)).unwrap();
        approx::assert_relative_eq!(
            tiled.max_relative_diff(&blocked).unwrap(),
            0.0,
            epsilon = 1e-6
        );
    }
}

#[test]
fn test_shape_mismatch_for_both_kernels() {
    let acc = cpu_accelerator();
    for (m, k, k2, n) in [(1, 1, 2, 1), (4, 3, 5, 2), (2, 7, 6, 9)] {
        let a = Matrix::filled(m, k, 1.0).unwrap();
        let b = Matrix::filled(k2, n, 1.0).unwrap();
        for config in [MatmulConfig::naive(), MatmulConfig::tiled(4), MatmulConfig::default()] {
            let err = Multiplier::new(&acc, config).multiply(&a, &b).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Shape);
            assert!(matches!(
                err,
                MatmulError::Shape { a_rows, a_cols, b_rows, b_cols }
                    if (a_rows, a_cols, b_rows, b_cols) == (m, k, k2, n)
            ));
        }
    }
    assert_eq!(acc.launch_count(), 0);
    assert_eq!(acc.allocated_bytes(), 0);
}

#[test]
fn test_edge_tiles_match_padded_problem() {
    let acc = cpu_accelerator();
    let tile = 8;
    let (m, k, n) = (13, 10, 19);
    let a = Matrix::random(m, k, 21).unwrap();
    let b = Matrix::random(k, n, 22).unwrap();

    // Zero-pad every dimension up to a multiple of the tile.
    let pad = |x: usize| x.div_ceil(tile) * tile;
    let mut a_pad = Matrix::zeros(pad(m), pad(k)).unwrap();
    let mut b_pad = Matrix::zeros(pad(k), pad(n)).unwrap();
    for r in 0..m {
        for c in 0..k {
            a_pad.set(r, c, a.get(r, c).unwrap()).unwrap();
        }
    }
    for r in 0..k {
        for c in 0..n {
            b_pad.set(r, c, b.get(r, c).unwrap()).unwrap();
        }
    }

    let multiplier = Multiplier::new(&acc, MatmulConfig::tiled(tile));
    let c = multiplier.multiply(&a, &b).unwrap();
    let c_pad = multiplier.multiply(&a_pad, &b_pad).unwrap();
    for r in 0..m {
        for col in 0..n {
            assert_eq!(c.get(r, col).unwrap(), c_pad.get(r, col).unwrap());
        }
    }
}

#[test]
fn test_repeated_runs_are_identical() {
    let acc = gpu_accelerator();
    let a = Matrix::random(50, 31, 3).unwrap();
    let b = Matrix::random(31, 45, 4).unwrap();
    for config in [MatmulConfig::naive(), MatmulConfig::tiled(16)] {
        let multiplier = Multiplier::new(&acc, config);
        let first = multiplier.multiply(&a, &b).unwrap();
        let second = multiplier.multiply(&a, &b).unwrap();
        assert_eq!(first, second);
    }
}

#[test]
fn test_column_major_operands() {
    let acc = cpu_accelerator();
    let (a, b, expected) = scenario();
    let a_col = a.to_layout(Layout::ColMajor);
    for config in [MatmulConfig::naive(), MatmulConfig::tiled(2)] {
        let multiplier = Multiplier::new(&acc, config);
        let c = multiplier.multiply(&a_col, &b).unwrap();
        assert_eq!(c.layout(), Layout::ColMajor);
        assert_eq!(c.to_layout(Layout::RowMajor), expected);
        let c = multiplier
            .multiply(&a, &b.to_layout(Layout::ColMajor))
            .unwrap();
        assert_eq!(c, expected);
    }
}

#[test]
fn test_scratch_budget_rejected_before_launch() {
    // 4 KiB of scratch fits two 16x16 f32 tiles (2 KiB) but not two 32x32 tiles (8 KiB).
    let ctx = Context::builder()
        .device(DeviceProperties::discrete_gpu().with_shared_memory(4096))
        .build()
        .unwrap();
    let acc = ctx.create_accelerator(ctx.preferred_device(false)).unwrap();
    let (a, b, expected) = scenario();

    let err = Multiplier::new(&acc, MatmulConfig::tiled(32))
        .multiply(&a, &b)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(matches!(
        err,
        MatmulError::ScratchBudget { tile: 32, required: 8192, available: 4096 }
    ));
    assert_eq!(acc.launch_count(), 0);
    assert_eq!(acc.allocated_bytes(), 0);

    let c = Multiplier::new(&acc, MatmulConfig::tiled(16))
        .multiply(&a, &b)
        .unwrap();
    assert_eq!(c, expected);
    assert_eq!(acc.launch_count(), 1);
}

#[test]
fn test_thread_limit_rejected() {
    let acc = {
        let ctx = Context::builder()
            .device(DeviceProperties::integrated_gpu())
            .build()
            .unwrap();
        ctx.create_accelerator(ctx.preferred_device(false)).unwrap()
    };
    let (a, b, _) = scenario();
    let err = Multiplier::new(&acc, MatmulConfig::tiled(32))
        .multiply(&a, &b)
        .unwrap_err();
    assert!(matches!(
        err,
        MatmulError::GroupTooLarge { tile: 32, threads: 1024, max_threads: 256 }
    ));
    assert_eq!(acc.launch_count(), 0);
}

#[test]
fn test_buffers_released_after_multiply() {
    let acc = cpu_accelerator();
    let a = Matrix::random(20, 20, 9).unwrap();
    let b = Matrix::random(20, 20, 10).unwrap();
    Multiplier::new(&acc, MatmulConfig::default())
        .multiply(&a, &b)
        .unwrap();
    assert_eq!(acc.allocated_bytes(), 0);
}
