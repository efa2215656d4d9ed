//! Common types for the cube tile/statistics pipeline.

pub mod axis;
pub mod bounds;
pub mod cube;
pub mod error;
pub mod messages;

pub use axis::{find_axis, AxisRole, AxisSlice, FrameSelection, Hyperslab};
pub use bounds::ImageBounds;
pub use cube::{ArrayCube, DataCube, RawView};
pub use error::{ErrorKind, PipelineError, PipelineResult};
pub use messages::{
    CompressionType, Profile, RasterTileMessage, RegionHistogramMessage, SpatialProfileMessage,
    SpectralProfileMessage, TileSubset, IMAGE_REGION_ID,
};
