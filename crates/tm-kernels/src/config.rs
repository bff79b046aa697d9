use std::fmt;
use std::str::FromStr;

/// Which kernel computes the product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatmulStrategy {
    /// One lane per output element, operands read from device memory.
    Naive,
    /// Operand tiles staged in group scratch memory.
    #[default]
    Tiled,
}

impl fmt::Display for MatmulStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatmulStrategy::Naive => write!(f, "naive"),
            MatmulStrategy::Tiled => write!(f, "tiled"),
        }
    }
}

impl FromStr for MatmulStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "naive" => Ok(MatmulStrategy::Naive),
            "tiled" => Ok(MatmulStrategy::Tiled),
            other => Err(format!("unknown strategy '{}' (expected naive or tiled)", other)),
        }
    }
}

/// How the tiled kernel picks its tile size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TilePolicy {
    /// Derive from device limits and the output extent.
    #[default]
    Auto,
    /// Use exactly this tile size; rejected if the device cannot fit it.
    Fixed(usize),
}

impl fmt::Display for TilePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TilePolicy::Auto => write!(f, "auto"),
            TilePolicy::Fixed(t) => write!(f, "{}", t),
        }
    }
}

impl FromStr for TilePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("auto") {
            return Ok(TilePolicy::Auto);
        }
        s.parse::<usize>()
            .map(TilePolicy::Fixed)
            .map_err(|e| format!("invalid tile size '{}': {}", s, e))
    }
}

/// Configuration of a `Multiplier`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatmulConfig {
    pub strategy: MatmulStrategy,
    pub tile: TilePolicy,
}

impl MatmulConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(mut self, strategy: MatmulStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_tile(mut self, tile: TilePolicy) -> Self {
        self.tile = tile;
        self
    }

    /// Tiled strategy with a fixed tile size.
    pub fn tiled(tile: usize) -> Self {
        Self::new()
            .with_strategy(MatmulStrategy::Tiled)
            .with_tile(TilePolicy::Fixed(tile))
    }

    pub fn naive() -> Self {
        Self::new().with_strategy(MatmulStrategy::Naive)
    }
}
