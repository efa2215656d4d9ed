//! Configuration for the tile pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use cube_common::{CompressionType, PipelineError, PipelineResult};
use intensity_cache::IntensityCache;

use crate::codec::{MAX_PRECISION, MIN_PRECISION};
use crate::compress::{CompressionSettings, MAX_SUBSETS};
use crate::raster::DEFAULT_HISTOGRAM_BINS;
use crate::stats::{calculator_for, CalculatorKind, StatisticsEngine};

/// Configuration for the tile pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Bins in histograms embedded in tiles and returned for regions.
    pub histogram_bins: usize,

    /// Parallel subsets per compressed tile (at most 8).
    pub max_subsets: usize,

    /// Bit planes kept when a client does not choose a precision.
    pub default_precision: u32,

    /// Percentile strategy of the statistics engine.
    pub calculator: CalculatorKind,

    /// Bin count of the binned percentile calculator.
    pub calculator_bins: usize,

    /// Where computed intensities are memoized.
    pub cache_backend: CacheBackend,

    /// Directory of the file cache backend.
    pub cache_dir: PathBuf,

    /// Entry capacity of the memory cache backend.
    pub cache_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            histogram_bins: DEFAULT_HISTOGRAM_BINS,
            max_subsets: MAX_SUBSETS,
            default_precision: 16,
            calculator: CalculatorKind::Exact,
            calculator_bins: 10_000,
            cache_backend: CacheBackend::Memory,
            cache_dir: PathBuf::from("./intensity-cache"),
            cache_capacity: 100_000,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("CUBE_HISTOGRAM_BINS") {
            if let Ok(bins) = val.parse() {
                config.histogram_bins = bins;
            }
        }

        if let Ok(val) = std::env::var("CUBE_MAX_SUBSETS") {
            if let Ok(n) = val.parse() {
                config.max_subsets = n;
            }
        }

        if let Ok(val) = std::env::var("CUBE_DEFAULT_PRECISION") {
            if let Ok(p) = val.parse() {
                config.default_precision = p;
            }
        }

        if let Ok(val) = std::env::var("CUBE_PERCENTILE_CALCULATOR") {
            config.calculator = CalculatorKind::from_str(&val);
        }

        if let Ok(val) = std::env::var("CUBE_CALCULATOR_BINS") {
            if let Ok(bins) = val.parse() {
                config.calculator_bins = bins;
            }
        }

        if let Ok(val) = std::env::var("CUBE_CACHE_BACKEND") {
            config.cache_backend = CacheBackend::from_str(&val);
        }

        if let Ok(val) = std::env::var("CUBE_CACHE_DIR") {
            config.cache_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("CUBE_CACHE_CAPACITY") {
            if let Ok(cap) = val.parse() {
                config.cache_capacity = cap;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.histogram_bins == 0 {
            return Err("histogram_bins must be > 0".to_string());
        }

        if self.max_subsets == 0 || self.max_subsets > MAX_SUBSETS {
            return Err(format!("max_subsets must be 1-{MAX_SUBSETS}"));
        }

        if !(MIN_PRECISION..=MAX_PRECISION).contains(&self.default_precision) {
            return Err(format!(
                "default_precision must be {MIN_PRECISION}-{MAX_PRECISION}"
            ));
        }

        if self.calculator_bins == 0 {
            return Err("calculator_bins must be > 0".to_string());
        }

        if self.cache_backend == CacheBackend::Memory && self.cache_capacity == 0 {
            return Err("cache_capacity must be > 0 for the memory cache".to_string());
        }

        Ok(())
    }

    /// Compression settings a new view starts with.
    pub fn default_compression(&self) -> CompressionSettings {
        CompressionSettings {
            compression: CompressionType::Zfp,
            precision: self.default_precision,
            subsets: self.max_subsets,
        }
    }

    /// Open the configured intensity cache.
    pub fn build_cache(&self) -> PipelineResult<IntensityCache> {
        let cache = match self.cache_backend {
            CacheBackend::None => IntensityCache::disabled(),
            CacheBackend::Memory => IntensityCache::in_memory(self.cache_capacity),
            CacheBackend::File => IntensityCache::on_disk(&self.cache_dir).map_err(|e| {
                PipelineError::data_unavailable(format!(
                    "cannot open intensity cache at {}: {e}",
                    self.cache_dir.display()
                ))
            })?,
        };
        info!(
            backend = %self.cache_backend,
            calculator = %self.calculator,
            "Intensity cache ready"
        );
        Ok(cache)
    }

    /// Statistics engine with the configured calculator and cache.
    pub fn build_engine(&self) -> PipelineResult<StatisticsEngine> {
        let calculator = calculator_for(self.calculator, self.calculator_bins);
        Ok(StatisticsEngine::new(Arc::from(calculator), self.build_cache()?))
    }
}

/// Backing store of the intensity cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Caching disabled; every lookup misses.
    None,
    /// Bounded in-process LRU.
    #[default]
    Memory,
    /// One file per entry under `cache_dir`; survives restarts.
    File,
}

impl CacheBackend {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "none" | "off" | "disabled" => Self::None,
            "file" | "disk" => Self::File,
            _ => Self::Memory,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Memory => "memory",
            Self::File => "file",
        }
    }
}

impl std::fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
