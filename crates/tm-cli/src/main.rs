use std::error::Error;
use std::num::TryFromIntError;
use std::time::Instant;

use clap::Parser;

use tm_device::{Accelerator, Context};
use tm_kernels::elementwise;
use tm_kernels::{MatmulConfig, MatmulStrategy, Multiplier, TilePolicy};
use tm_tensor::{CpuBackend, Matrix};

type CliResult = Result<(), Box<dyn Error>>;

/// Largest relative difference from the host result that still counts as correct.
const TOLERANCE: f32 = 1e-4;

#[derive(Parser)]
#[command(
    name = "tilemul",
    about = "Parallel kernel experiments on a simulated accelerator",
    long_about = "Runs element-wise and matrix multiplication kernels on a simulated\naccelerator and checks them against the host. Set RUST_LOG=debug to see\nlaunch geometry and timings.",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct DeviceArgs {
    /// Device index from `tilemul devices` (default: the CPU accelerator)
    #[arg(long)]
    device: Option<usize>,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum StrategyArg {
    Naive,
    Tiled,
    Both,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// List every available accelerator and its capabilities
    Devices,
    /// Multiply two integer arrays element-wise on the device and on the host
    ArrayMul {
        /// Number of elements
        #[arg(long, default_value = "1000000")]
        count: usize,
        #[command(flatten)]
        device: DeviceArgs,
    },
    /// Fill an output array by repeating a short source array
    Replicate {
        /// Length of the source array (values 0..source)
        #[arg(long, default_value = "10")]
        source: u32,
        /// Length of the output array
        #[arg(long, default_value = "10000")]
        len: usize,
        #[command(flatten)]
        device: DeviceArgs,
    },
    /// Multiply random matrices and compare against the host result
    Matmul {
        #[arg(long, default_value = "256")]
        m: usize,
        #[arg(long, default_value = "256")]
        k: usize,
        #[arg(long, default_value = "256")]
        n: usize,
        /// Tile size for the tiled kernel, or "auto"
        #[arg(long, default_value = "auto")]
        tile: TilePolicy,
        #[arg(long, value_enum, default_value = "both")]
        strategy: StrategyArg,
        /// Seed for the random operands
        #[arg(long, default_value = "0")]
        seed: u64,
        #[command(flatten)]
        device: DeviceArgs,
    },
    /// Multiply the 4x3 and 3x5 sample matrices with every kernel
    Demo {
        #[command(flatten)]
        device: DeviceArgs,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Devices => cmd_devices(),
        Commands::ArrayMul { count, device } => cmd_array_mul(count, &device),
        Commands::Replicate {
            source,
            len,
            device,
        } => cmd_replicate(source, len, &device),
        Commands::Matmul {
            m,
            k,
            n,
            tile,
            strategy,
            seed,
            device,
        } => cmd_matmul(m, k, n, tile, strategy, seed, &device),
        Commands::Demo { device } => cmd_demo(&device),
    };

    if let Err(err) = result {
        log::error!("{}", err);
        std::process::exit(1);
    }
}

impl DeviceArgs {
    fn open(&self) -> Result<Accelerator, Box<dyn Error>> {
        let ctx = Context::all_accelerators()?;
        let info = match self.device {
            Some(index) => ctx.device(index)?,
            None => ctx.preferred_device(true),
        };
        log::info!("using device {}: {}", info.index(), info.name());
        Ok(ctx.create_accelerator(info)?)
    }
}

fn cmd_devices() -> CliResult {
    let ctx = Context::all_accelerators()?;
    for device in &ctx {
        println!("{}", device);
        println!();
    }
    Ok(())
}

fn cmd_array_mul(count: usize, device: &DeviceArgs) -> CliResult {
    let (a, b) = array_mul_inputs(count)?;
    let acc = device.open()?;
    log::info!("data created ({} elements)", count);

    let timer = Instant::now();
    let c = elementwise::array_multiply(&acc, &a, &b)?;
    let elapsed_device = timer.elapsed();

    let timer = Instant::now();
    let expected: Vec<i32> = a.iter().zip(&b).map(|(x, y)| x.wrapping_mul(*y)).collect();
    let elapsed_host = timer.elapsed();

    log::info!("elapsed device: {:?}", elapsed_device);
    log::info!("elapsed host:   {:?}", elapsed_host);

    if c != expected {
        let first = c.iter().zip(&expected).position(|(x, y)| x != y).unwrap_or(0);
        return Err(format!(
            "device result differs from host at index {}: {} != {}",
            first, c[first], expected[first]
        )
        .into());
    }
    log::info!("device result matches host");
    Ok(())
}

/// `a = 1..=count` and `b = 10 * a`. Fails if `count` does not fit an `i32`.
fn array_mul_inputs(count: usize) -> Result<(Vec<i32>, Vec<i32>), TryFromIntError> {
    let last = i32::try_from(count)?;
    let a: Vec<i32> = (1..=last).collect();
    let b = a.iter().map(|v| v.wrapping_mul(10)).collect();
    Ok((a, b))
}

fn cmd_replicate(source: u32, len: usize, device: &DeviceArgs) -> CliResult {
    let acc = device.open()?;
    let data: Vec<u32> = (0..source).collect();

    let timer = Instant::now();
    let out = elementwise::replicate(&acc, &data, len)?;
    log::info!("replicated {} values into {} slots in {:?}", source, len, timer.elapsed());

    let mismatch = out
        .iter()
        .enumerate()
        .find(|(i, v)| **v != data[i % data.len()]);
    if let Some((i, v)) = mismatch {
        return Err(format!("unexpected value {} at index {}", v, i).into());
    }
    let preview: Vec<String> = out.iter().take(12).map(|v| v.to_string()).collect();
    println!("[{}{}]", preview.join(", "), if out.len() > 12 { ", ..." } else { "" });
    Ok(())
}

fn cmd_matmul(
    m: usize,
    k: usize,
    n: usize,
    tile: TilePolicy,
    strategy: StrategyArg,
    seed: u64,
    device: &DeviceArgs,
) -> CliResult {
    let acc = device.open()?;
    let a = Matrix::random(m, k, seed)?;
    let b = Matrix::random(k, n, seed.wrapping_add(1))?;

    let timer = Instant::now();
    let expected = a.matmul(&b, &CpuBackend::new())?;
    log::info!("host  [{}x{}] @ [{}x{}]: {:?}", m, k, k, n, timer.elapsed());

    let strategies: &[MatmulStrategy] = match strategy {
        StrategyArg::Naive => &[MatmulStrategy::Naive],
        StrategyArg::Tiled => &[MatmulStrategy::Tiled],
        StrategyArg::Both => &[MatmulStrategy::Naive, MatmulStrategy::Tiled],
    };

    for &strategy in strategies {
        let config = MatmulConfig::new().with_strategy(strategy).with_tile(tile);
        let multiplier = Multiplier::new(&acc, config);

        let timer = Instant::now();
        let c = multiplier.multiply(&a, &b)?;
        let elapsed = timer.elapsed();

        let diff = c.max_relative_diff(&expected)?;
        match strategy {
            MatmulStrategy::Naive => log::info!("naive: {:?}, max relative diff {:e}", elapsed, diff),
            MatmulStrategy::Tiled => log::info!(
                "tiled (tile {}): {:?}, max relative diff {:e}",
                multiplier.resolve_tile(m, n),
                elapsed,
                diff
            ),
        }
        if diff > TOLERANCE {
            return Err(format!("{} result exceeds tolerance: {:e}", strategy, diff).into());
        }
    }
    Ok(())
}

fn cmd_demo(device: &DeviceArgs) -> CliResult {
    let acc = device.open()?;
    let a = Matrix::from_rows(&[
        [1.0, 2.0, 3.0],
        [4.0, 5.0, 6.0],
        [7.0, 8.0, 9.0],
        [10.0, 11.0, 12.0],
    ])?;
    let b = Matrix::from_rows(&[
        [13.0, 14.0, 15.0, 16.0, 17.0],
        [18.0, 19.0, 20.0, 21.0, 22.0],
        [23.0, 24.0, 25.0, 26.0, 27.0],
    ])?;
    let expected = Matrix::from_rows(&[
        [118.0, 124.0, 130.0, 136.0, 142.0],
        [280.0, 295.0, 310.0, 325.0, 340.0],
        [442.0, 466.0, 490.0, 514.0, 538.0],
        [604.0, 637.0, 670.0, 703.0, 736.0],
    ])?;

    let mut runs = vec![("naive".to_string(), MatmulConfig::naive())];
    for tile in [1, 2, 4, 32] {
        runs.push((format!("tiled T={}", tile), MatmulConfig::tiled(tile)));
    }

    let mut failures = 0;
    for (label, config) in runs {
        match Multiplier::new(&acc, config).multiply(&a, &b) {
            Ok(c) if c == expected => {
                println!("{}:", label);
                print!("{}", format_matrix(&c));
            }
            Ok(c) => {
                failures += 1;
                log::error!("{}: wrong result", label);
                print!("{}", format_matrix(&c));
            }
            Err(err) => {
                failures += 1;
                log::error!("{}: {:?} error: {}", label, err.kind(), err);
            }
        }
    }

    if failures > 0 {
        return Err(format!("{} demo runs failed", failures).into());
    }
    Ok(())
}

fn format_matrix(m: &Matrix) -> String {
    let mut out = String::new();
    for r in 0..m.rows() {
        let row: Vec<String> = (0..m.cols())
            .map(|c| format!("{:>6}", m.get(r, c).unwrap_or(f32::NAN)))
            .collect();
        out.push_str(&format!("  [{}]\n", row.join(" ")));
    }
    out
}
