//! Raster tile assembly: validate, down-sample, compress, and on a frame
//! change embed a fresh histogram.

use tracing::{debug, error, warn};

use cube_common::{
    DataCube, ErrorKind, ImageBounds, PipelineError, PipelineResult, RasterTileMessage,
    RegionHistogramMessage, IMAGE_REGION_ID,
};

use crate::compress::{CompressionSettings, TileCompressor};
use crate::downsample::downsample_streaming;
use crate::histogram::{region_histogram, HistogramTarget};
use crate::slice::{resolve_hyperslab, FrameRequest};
use crate::stats::StatisticsEngine;
use crate::units::UnitConversion;

/// Default number of bins for histograms embedded in tiles.
pub const DEFAULT_HISTOGRAM_BINS: usize = 1000;

/// Parameters of one tile request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterRequest {
    pub file_id: i32,
    pub bounds: ImageBounds,
    pub mip: i64,
    pub channel: i64,
    pub polarization: i64,
    pub settings: CompressionSettings,
}

/// Builds raster tiles for one engine/compressor pair.
#[derive(Debug, Clone)]
pub struct RasterTileBuilder {
    engine: StatisticsEngine,
    compressor: TileCompressor,
    histogram_bins: usize,
}

impl RasterTileBuilder {
    pub fn new(engine: StatisticsEngine, compressor: TileCompressor, histogram_bins: usize) -> Self {
        Self {
            engine,
            compressor,
            histogram_bins,
        }
    }

    pub fn engine(&self) -> &StatisticsEngine {
        &self.engine
    }

    pub fn histogram_bins(&self) -> usize {
        self.histogram_bins
    }

    /// Build a tile.
    ///
    /// When `frame_changed` is set, the tile also carries a histogram of the
    /// whole channel and the flag is cleared, whether or not the histogram
    /// could be built. A rejected request leaves the flag untouched.
    pub fn build(
        &self,
        cube: &dyn DataCube,
        display_axes: (usize, usize),
        request: &RasterRequest,
        conversion: Option<&UnitConversion>,
        frame_changed: &mut bool,
    ) -> PipelineResult<RasterTileMessage> {
        let frames = FrameRequest::channel(request.channel, request.polarization);
        let plane = resolve_hyperslab(
            cube.shape(),
            display_axes,
            &frames.plane_selections(cube.axis_roles()),
        )?;
        let width = cube.shape()[display_axes.0];
        let height = cube.shape()[display_axes.1];

        let limit = width.min(height);
        if request.mip <= 0 || request.mip > limit as i64 {
            warn!(file_id = request.file_id, mip = request.mip, limit, "Invalid mip");
            return Err(PipelineError::InvalidMip {
                mip: request.mip,
                limit,
            });
        }
        if let Err(e) = request.bounds.validate(width, height) {
            warn!(file_id = request.file_id, error = %e, "Invalid tile bounds");
            return Err(e);
        }
        let mip = request.mip as usize;

        let (mut data, out_width, out_height) =
            downsample_streaming(cube, &plane, &request.bounds, mip)?;
        let subsets = self
            .compressor
            .compress(&mut data, out_width, out_height, &request.settings)?;

        let histogram = if *frame_changed {
            let histogram = self.frame_histogram(cube, display_axes, &frames, conversion, request);
            *frame_changed = false;
            histogram
        } else {
            None
        };

        debug!(
            file_id = request.file_id,
            mip,
            width = out_width,
            height = out_height,
            compression = %request.settings.compression,
            histogram = histogram.is_some(),
            "Built raster tile"
        );

        Ok(RasterTileMessage {
            file_id: request.file_id,
            bounds: request.bounds,
            channel: request.channel as i32,
            polarization: request.polarization as i32,
            mip,
            width: out_width,
            height: out_height,
            compression_type: request.settings.compression,
            precision: request.settings.precision,
            subsets,
            histogram,
        })
    }

    fn frame_histogram(
        &self,
        cube: &dyn DataCube,
        display_axes: (usize, usize),
        frames: &FrameRequest,
        conversion: Option<&UnitConversion>,
        request: &RasterRequest,
    ) -> Option<RegionHistogramMessage> {
        let target = HistogramTarget {
            file_id: request.file_id,
            region_id: IMAGE_REGION_ID,
            polarization: request.polarization as i32,
            channel: request.channel as i32,
        };
        match region_histogram(
            &self.engine,
            cube,
            display_axes,
            frames,
            conversion,
            self.histogram_bins,
            target,
        ) {
            Ok(histogram) => Some(histogram),
            Err(e) if e.kind() == ErrorKind::ComputeInconsistency => {
                error!(file_id = request.file_id, error = %e, "Frame histogram failed");
                None
            }
            Err(e) => {
                warn!(file_id = request.file_id, error = %e, "Frame histogram unavailable");
                None
            }
        }
    }
}

impl Default for RasterTileBuilder {
    fn default() -> Self {
        Self::new(
            StatisticsEngine::default(),
            TileCompressor::default(),
            DEFAULT_HISTOGRAM_BINS,
        )
    }
}
