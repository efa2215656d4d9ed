//! Tile and statistics pipeline for N-dimensional data cubes.
//!
//! Turns an immutable cube into small, precision-bounded payloads:
//!
//! ```text
//! FrameRequest ──► slice ──► Hyperslab ──► DataCube::read ──► RawView
//!                                                               │
//!        ┌───────────────────────┬──────────────────────────────┼──────────────┐
//!        ▼                       ▼                              ▼              ▼
//!  StatisticsEngine ◄──► IntensityCache             downsample (mip)      profile
//!        │                                                  │
//!        ▼                                                  ▼
//!   histogram ─────────────────────────────────► nan_encoding + codec
//!                                                  (compress, rayon)
//!                                                           │
//!                                                           ▼
//!                                                  RasterTileMessage
//! ```
//!
//! [`CubeViewer`] holds the loaded cubes and per-file view state of one
//! client and calls the stages directly. Embedders serving a single cube can
//! use [`RasterTileBuilder`], [`StatisticsEngine`] and the free functions.

pub mod codec;
pub mod compress;
pub mod config;
pub mod downsample;
pub mod histogram;
pub mod nan_encoding;
pub mod profile;
pub mod raster;
pub mod slice;
pub mod stats;
pub mod units;
pub mod viewer;

pub use codec::{BlockCodec, CodecError, ZfpCodec};
pub use compress::{subset_rows, CompressionSettings, TileCompressor, MAX_SUBSETS};
pub use config::{CacheBackend, PipelineConfig};
pub use downsample::{downsample, downsample_streaming};
pub use histogram::{build_histogram, region_histogram, HistogramTarget};
pub use nan_encoding::{decode_mask, encode_and_fill, nan_runs};
pub use profile::{spatial_profiles, spectral_profile, Cursor};
pub use raster::{RasterRequest, RasterTileBuilder};
pub use slice::{
    default_display_axes, resolve_axis, resolve_hyperslab, validate_display_axes, FrameRequest,
};
pub use stats::{
    BinnedPercentiles, CalculatorKind, ExactPercentiles, PercentileCalculator, StatisticsEngine,
};
pub use units::UnitConversion;
pub use viewer::{CubeViewer, ViewState};
