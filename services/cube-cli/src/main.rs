//! Cube pipeline command-line driver.
//!
//! Builds a synthetic sky cube, loads it into a viewer configured from the
//! environment and prints the payloads the pipeline produces as JSON.

mod synthetic;

use std::sync::Arc;

use anyhow::{anyhow, ensure, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use cube_common::{CompressionType, ImageBounds, RasterTileMessage};
use tile_pipeline::{CompressionSettings, CubeViewer, PipelineConfig, UnitConversion};

use synthetic::{build_cube, SyntheticSpec};

const FILE_ID: i32 = 0;

#[derive(Parser, Debug)]
#[command(name = "cube-cli")]
#[command(about = "Run tile, histogram, statistics and profile requests against a synthetic cube")]
struct Args {
    /// Image width in pixels
    #[arg(long, default_value = "256")]
    width: usize,

    /// Image height in pixels
    #[arg(long, default_value = "256")]
    height: usize,

    /// Spectral channels
    #[arg(long, default_value = "16")]
    channels: usize,

    /// Polarization planes
    #[arg(long, default_value = "1")]
    polarizations: usize,

    /// Number of synthetic sources
    #[arg(long, default_value = "12")]
    sources: usize,

    /// Uniform noise amplitude
    #[arg(long, default_value = "0.02")]
    noise: f32,

    /// Blank pixels beyond this fraction of the half-diagonal (0 disables)
    #[arg(long, default_value = "0.95")]
    mask_radius: f32,

    /// Random seed for the synthetic cube
    #[arg(long, env = "CUBE_SEED", default_value = "1")]
    seed: u64,

    /// Source identifier used in intensity cache keys
    #[arg(long, default_value = "synthetic.fits")]
    source_id: String,

    /// Multiply intensities by this factor (reported under --unit-label)
    #[arg(long)]
    scale: Option<f64>,

    /// Unit label of --scale
    #[arg(long, default_value = "scaled")]
    unit_label: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a down-sampled raster tile
    Tile {
        /// Bounds as x_min,x_max,y_min,y_max (default: whole image)
        #[arg(long, value_delimiter = ',', num_args = 4)]
        bounds: Option<Vec<i64>>,

        #[arg(long, default_value = "1")]
        mip: i64,

        #[arg(long, default_value = "0")]
        channel: i64,

        #[arg(long, default_value = "0")]
        polarization: i64,

        /// none | zfp
        #[arg(long, default_value = "zfp")]
        compression: String,

        /// Bit planes kept (default: CUBE_DEFAULT_PRECISION)
        #[arg(long)]
        precision: Option<u32>,

        /// Parallel subsets (default: CUBE_MAX_SUBSETS)
        #[arg(long)]
        subsets: Option<usize>,

        /// Print sizes instead of the encoded bytes
        #[arg(long)]
        summary: bool,
    },

    /// Histogram of one channel
    Histogram {
        #[arg(long, default_value = "0")]
        channel: i64,

        #[arg(long, default_value = "0")]
        polarization: i64,
    },

    /// Percentile intensities over a channel range
    Stats {
        #[arg(long, value_delimiter = ',', default_value = "0,0.005,0.5,0.995,1")]
        percentiles: Vec<f64>,

        #[arg(long, default_value = "0")]
        channel_low: i64,

        /// Defaults to --channel-low
        #[arg(long)]
        channel_high: Option<i64>,

        #[arg(long, default_value = "0")]
        polarization: i64,

        /// Repeat the request to show cache behaviour
        #[arg(long, default_value = "1")]
        repeat: usize,
    },

    /// Spatial and spectral profiles through a cursor
    Profile {
        #[arg(long)]
        x: i64,

        #[arg(long)]
        y: i64,

        #[arg(long, default_value = "0")]
        channel: i64,

        #[arg(long, default_value = "0")]
        polarization: i64,
    },
}

#[derive(Serialize)]
struct SubsetSummary {
    rows: usize,
    bytes: usize,
    nan_runs: usize,
    status: i32,
}

#[derive(Serialize)]
struct TileSummary {
    width: usize,
    height: usize,
    mip: usize,
    compression: CompressionType,
    precision: u32,
    raw_bytes: usize,
    encoded_bytes: usize,
    subsets: Vec<SubsetSummary>,
    histogram_bins: Option<usize>,
}

impl From<&RasterTileMessage> for TileSummary {
    fn from(tile: &RasterTileMessage) -> Self {
        let subsets: Vec<SubsetSummary> = tile
            .subsets
            .iter()
            .map(|s| SubsetSummary {
                rows: s.rows,
                bytes: s.compressed.len(),
                nan_runs: s.nan_runs.len(),
                status: s.status,
            })
            .collect();
        Self {
            width: tile.width,
            height: tile.height,
            mip: tile.mip,
            compression: tile.compression_type,
            precision: tile.precision,
            raw_bytes: tile.width * tile.height * 4,
            encoded_bytes: subsets.iter().map(|s| s.bytes).sum(),
            subsets,
            histogram_bins: tile.histogram.as_ref().map(|h| h.bin_count),
        }
    }
}

fn init_tracing(args: &Args) -> Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr);

    if args.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(&args)?;

    ensure!(args.width > 0 && args.height > 0, "image must be at least 1x1");

    let config = PipelineConfig::from_env();
    config.validate().map_err(|e| anyhow!("invalid configuration: {e}"))?;
    info!(
        calculator = %config.calculator,
        cache = %config.cache_backend,
        histogram_bins = config.histogram_bins,
        "Loaded configuration"
    );

    let spec = SyntheticSpec {
        width: args.width,
        height: args.height,
        channels: args.channels,
        polarizations: args.polarizations,
        sources: args.sources,
        noise: args.noise,
        mask_radius: args.mask_radius,
        seed: args.seed,
    };
    let cube = build_cube(&args.source_id, &spec).context("building synthetic cube")?;

    let mut viewer = CubeViewer::new(&config)?;
    viewer.open_image(FILE_ID, Arc::new(cube))?;
    if let Some(scale) = args.scale {
        viewer.set_unit_conversion(FILE_ID, Some(UnitConversion::constant(&args.unit_label, scale)))?;
    }

    match args.command {
        Command::Tile {
            bounds,
            mip,
            channel,
            polarization,
            compression,
            precision,
            subsets,
            summary,
        } => {
            let bounds = match bounds.as_deref() {
                Some([x_min, x_max, y_min, y_max]) => ImageBounds::new(*x_min, *x_max, *y_min, *y_max),
                Some(other) => return Err(anyhow!("--bounds needs 4 values, got {}", other.len())),
                None => ImageBounds::full(args.width, args.height),
            };
            let defaults = config.default_compression();
            viewer.set_compression(
                FILE_ID,
                CompressionSettings {
                    compression: CompressionType::from_str(&compression),
                    precision: precision.unwrap_or(defaults.precision),
                    subsets: subsets.unwrap_or(defaults.subsets),
                },
            )?;
            viewer.set_channel(FILE_ID, channel, polarization)?;

            let tile = viewer
                .set_image_view(FILE_ID, bounds, mip)?
                .ok_or_else(|| anyhow!("no tile produced"))?;
            info!(
                subsets = tile.subsets.len(),
                failed = tile.failed_subsets(),
                "Tile ready"
            );
            if summary {
                print_json(&TileSummary::from(&tile))?;
            } else {
                print_json(&tile)?;
            }
        }
        Command::Histogram {
            channel,
            polarization,
        } => {
            viewer.set_channel(FILE_ID, channel, polarization)?;
            print_json(&viewer.region_histogram(FILE_ID)?)?;
        }
        Command::Stats {
            percentiles,
            channel_low,
            channel_high,
            polarization,
            repeat,
        } => {
            viewer.set_channel(FILE_ID, channel_low, polarization)?;
            let channel_high = channel_high.unwrap_or(channel_low);
            let mut values = Vec::new();
            for _ in 0..repeat.max(1) {
                values = viewer.percentiles_over(FILE_ID, channel_low, channel_high, &percentiles)?;
            }
            let stats = viewer.engine().cache().stats();
            info!(hit_rate = stats.hit_rate(), "Intensity cache");

            let pairs: Vec<serde_json::Value> = percentiles
                .iter()
                .zip(&values)
                .map(|(p, v)| serde_json::json!({ "percentile": p, "intensity": v }))
                .collect();
            print_json(&pairs)?;
        }
        Command::Profile {
            x,
            y,
            channel,
            polarization,
        } => {
            viewer.set_channel(FILE_ID, channel, polarization)?;
            let (spatial, spectral) = viewer.set_cursor(FILE_ID, x, y)?;
            print_json(&spatial)?;
            if let Some(spectral) = spectral {
                print_json(&spectral)?;
            }
        }
    }

    Ok(())
}
