//! Loaded cubes and the per-file view state of one client.
//!
//! Files live in a flat list addressed by file id, with one active entry.
//! Each file remembers the last view it served so that repeated identical
//! requests from a client produce nothing, and carries the one-shot
//! "frame changed" flag that makes the next tile embed a histogram.
//! Requests go straight from here to the stage functions.

use std::sync::Arc;
use tracing::{debug, info};

use cube_common::{
    DataCube, ImageBounds, PipelineError, PipelineResult, RasterTileMessage,
    RegionHistogramMessage, SpatialProfileMessage, SpectralProfileMessage, IMAGE_REGION_ID,
};

use crate::compress::{CompressionSettings, TileCompressor};
use crate::config::PipelineConfig;
use crate::histogram::{region_histogram, HistogramTarget};
use crate::profile::{spatial_profiles, spectral_profile, Cursor};
use crate::raster::{RasterRequest, RasterTileBuilder};
use crate::slice::{default_display_axes, validate_display_axes, FrameRequest};
use crate::stats::StatisticsEngine;
use crate::units::UnitConversion;

/// What a file is currently showing.
#[derive(Debug, Clone)]
pub struct ViewState {
    /// Last bounds and mip a tile was served for.
    pub view: Option<(ImageBounds, i64)>,
    pub channel: i64,
    pub polarization: i64,
    pub compression: CompressionSettings,
    pub conversion: Option<UnitConversion>,
    /// Set on open and on channel change; cleared by the next tile.
    pub frame_changed: bool,
}

impl ViewState {
    fn new(compression: CompressionSettings) -> Self {
        Self {
            view: None,
            channel: 0,
            polarization: 0,
            compression,
            conversion: None,
            frame_changed: true,
        }
    }

    fn frames(&self) -> FrameRequest {
        FrameRequest::channel(self.channel, self.polarization)
    }
}

struct LoadedCube {
    file_id: i32,
    cube: Arc<dyn DataCube>,
    /// Axis positions of the displayed plane: (x, y).
    display_axes: (usize, usize),
    state: ViewState,
}

impl LoadedCube {
    fn image_size(&self) -> (usize, usize) {
        let shape = self.cube.shape();
        (shape[self.display_axes.0], shape[self.display_axes.1])
    }
}

/// Flat collection of loaded cubes with one active file.
pub struct CubeViewer {
    files: Vec<LoadedCube>,
    active: Option<usize>,
    raster: RasterTileBuilder,
    default_compression: CompressionSettings,
}

impl CubeViewer {
    /// Viewer with the engine, cache and defaults described by `config`.
    pub fn new(config: &PipelineConfig) -> PipelineResult<Self> {
        config.validate().map_err(PipelineError::invalid_request)?;
        Ok(Self::with_parts(
            config.build_engine()?,
            TileCompressor::default(),
            config.histogram_bins,
            config.default_compression(),
        ))
    }

    pub fn with_parts(
        engine: StatisticsEngine,
        compressor: TileCompressor,
        histogram_bins: usize,
        default_compression: CompressionSettings,
    ) -> Self {
        Self {
            files: Vec::new(),
            active: None,
            raster: RasterTileBuilder::new(engine, compressor, histogram_bins),
            default_compression,
        }
    }

    pub fn engine(&self) -> &StatisticsEngine {
        self.raster.engine()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn file_ids(&self) -> Vec<i32> {
        self.files.iter().map(|f| f.file_id).collect()
    }

    /// Load `cube` under `file_id`, replacing any file already there, and
    /// make it active. The spatial axes are displayed.
    pub fn open_image(&mut self, file_id: i32, cube: Arc<dyn DataCube>) -> PipelineResult<()> {
        let display_axes = default_display_axes(cube.axis_roles());
        validate_display_axes(cube.ndim(), display_axes)?;
        let loaded = LoadedCube {
            file_id,
            cube,
            display_axes,
            state: ViewState::new(self.default_compression),
        };
        let (width, height) = loaded.image_size();
        let source = loaded.cube.source_id().to_string();

        let index = match self.position(file_id) {
            Some(index) => {
                self.files[index] = loaded;
                index
            }
            None => {
                self.files.push(loaded);
                self.files.len() - 1
            }
        };
        self.active = Some(index);
        info!(file_id, source = %source, width, height, "Opened image");
        Ok(())
    }

    /// Drop a file. Returns whether it was loaded.
    pub fn close_image(&mut self, file_id: i32) -> bool {
        let Some(index) = self.position(file_id) else {
            return false;
        };
        self.files.remove(index);
        self.active = match self.active {
            Some(a) if a == index => None,
            Some(a) if a > index => Some(a - 1),
            other => other,
        };
        info!(file_id, "Closed image");
        true
    }

    pub fn set_active(&mut self, file_id: i32) -> PipelineResult<()> {
        let index = self.position(file_id).ok_or(PipelineError::UnknownFile(file_id))?;
        self.active = Some(index);
        Ok(())
    }

    pub fn active_file(&self) -> Option<i32> {
        self.active.map(|i| self.files[i].file_id)
    }

    pub fn view_state(&self, file_id: i32) -> Option<&ViewState> {
        self.position(file_id).map(|i| &self.files[i].state)
    }

    pub fn cube(&self, file_id: i32) -> Option<&Arc<dyn DataCube>> {
        self.position(file_id).map(|i| &self.files[i].cube)
    }

    pub fn display_axes(&self, file_id: i32) -> Option<(usize, usize)> {
        self.position(file_id).map(|i| self.files[i].display_axes)
    }

    /// `(width, height)` of the displayed plane.
    pub fn image_size(&self, file_id: i32) -> Option<(usize, usize)> {
        self.position(file_id).map(|i| self.files[i].image_size())
    }

    /// Display another pair of axes. The last view is forgotten and the next
    /// tile carries a histogram.
    pub fn set_display_axes(&mut self, file_id: i32, display_axes: (usize, usize)) -> PipelineResult<()> {
        let entry = self.entry_mut(file_id)?;
        validate_display_axes(entry.cube.ndim(), display_axes)?;
        entry.display_axes = display_axes;
        entry.state.view = None;
        entry.state.frame_changed = true;
        Ok(())
    }

    pub fn set_compression(&mut self, file_id: i32, settings: CompressionSettings) -> PipelineResult<()> {
        self.entry_mut(file_id)?.state.compression = settings;
        Ok(())
    }

    pub fn set_unit_conversion(
        &mut self,
        file_id: i32,
        conversion: Option<UnitConversion>,
    ) -> PipelineResult<()> {
        self.entry_mut(file_id)?.state.conversion = conversion;
        Ok(())
    }

    /// Request a tile for new bounds and mip.
    ///
    /// Returns `None` when the request repeats the last served view.
    pub fn set_image_view(
        &mut self,
        file_id: i32,
        bounds: ImageBounds,
        mip: i64,
    ) -> PipelineResult<Option<RasterTileMessage>> {
        let index = self.position(file_id).ok_or(PipelineError::UnknownFile(file_id))?;
        let entry = &mut self.files[index];
        if entry.state.view == Some((bounds, mip)) {
            debug!(file_id, mip, "Repeated view request ignored");
            return Ok(None);
        }
        let tile = tile_for(&self.raster, entry, bounds, mip)?;
        entry.state.view = Some((bounds, mip));
        Ok(Some(tile))
    }

    /// Move to another channel/polarization.
    ///
    /// Returns a tile of the last view, with a fresh histogram, when a view
    /// has been served before; `None` when nothing changed or no view exists
    /// yet (the histogram then comes with the first tile).
    pub fn set_channel(
        &mut self,
        file_id: i32,
        channel: i64,
        polarization: i64,
    ) -> PipelineResult<Option<RasterTileMessage>> {
        let index = self.position(file_id).ok_or(PipelineError::UnknownFile(file_id))?;
        let entry = &mut self.files[index];
        if entry.state.channel == channel && entry.state.polarization == polarization {
            debug!(file_id, channel, polarization, "Repeated channel request ignored");
            return Ok(None);
        }
        entry.state.channel = channel;
        entry.state.polarization = polarization;
        entry.state.frame_changed = true;

        match entry.state.view {
            Some((bounds, mip)) => tile_for(&self.raster, entry, bounds, mip).map(Some),
            None => Ok(None),
        }
    }

    /// Spatial profiles, plus the spectral profile when the cube has more
    /// than one channel.
    pub fn set_cursor(
        &self,
        file_id: i32,
        x: i64,
        y: i64,
    ) -> PipelineResult<(SpatialProfileMessage, Option<SpectralProfileMessage>)> {
        let entry = self.entry(file_id)?;
        let cursor = Cursor { file_id, x, y };
        let frames = entry.state.frames();
        let spatial = spatial_profiles(entry.cube.as_ref(), entry.display_axes, &frames, &cursor)?;
        let spectral = spectral_profile(entry.cube.as_ref(), entry.display_axes, &frames, &cursor)?;
        Ok((spatial, spectral))
    }

    /// Histogram of the current channel over the whole displayed plane.
    pub fn region_histogram(&self, file_id: i32) -> PipelineResult<RegionHistogramMessage> {
        let entry = self.entry(file_id)?;
        let frames = entry.state.frames();
        let target = HistogramTarget {
            file_id,
            region_id: IMAGE_REGION_ID,
            polarization: frames.polarization as i32,
            channel: frames.channel_low as i32,
        };
        region_histogram(
            self.raster.engine(),
            entry.cube.as_ref(),
            entry.display_axes,
            &frames,
            entry.state.conversion.as_ref(),
            self.raster.histogram_bins(),
            target,
        )
    }

    /// Intensities at `percentiles` over the current channel.
    pub fn percentiles(&self, file_id: i32, percentiles: &[f64]) -> PipelineResult<Vec<f64>> {
        let entry = self.entry(file_id)?;
        self.raster.engine().percentile_intensities(
            entry.cube.as_ref(),
            entry.display_axes,
            &entry.state.frames(),
            entry.state.conversion.as_ref(),
            percentiles,
        )
    }

    /// Intensities over an explicit channel range at the current polarization.
    pub fn percentiles_over(
        &self,
        file_id: i32,
        channel_low: i64,
        channel_high: i64,
        percentiles: &[f64],
    ) -> PipelineResult<Vec<f64>> {
        let entry = self.entry(file_id)?;
        let frames = FrameRequest {
            channel_low,
            channel_high,
            polarization: entry.state.polarization,
        };
        self.raster.engine().percentile_intensities(
            entry.cube.as_ref(),
            entry.display_axes,
            &frames,
            entry.state.conversion.as_ref(),
            percentiles,
        )
    }

    /// Exact min and max of the current channel.
    pub fn min_max(&self, file_id: i32) -> PipelineResult<(f64, f64)> {
        let entry = self.entry(file_id)?;
        self.raster.engine().min_max(
            entry.cube.as_ref(),
            entry.display_axes,
            &entry.state.frames(),
            entry.state.conversion.as_ref(),
        )
    }

    fn position(&self, file_id: i32) -> Option<usize> {
        self.files.iter().position(|f| f.file_id == file_id)
    }

    fn entry(&self, file_id: i32) -> PipelineResult<&LoadedCube> {
        self.position(file_id)
            .map(|i| &self.files[i])
            .ok_or(PipelineError::UnknownFile(file_id))
    }

    fn entry_mut(&mut self, file_id: i32) -> PipelineResult<&mut LoadedCube> {
        match self.position(file_id) {
            Some(i) => Ok(&mut self.files[i]),
            None => Err(PipelineError::UnknownFile(file_id)),
        }
    }
}

fn tile_for(
    raster: &RasterTileBuilder,
    entry: &mut LoadedCube,
    bounds: ImageBounds,
    mip: i64,
) -> PipelineResult<RasterTileMessage> {
    let request = RasterRequest {
        file_id: entry.file_id,
        bounds,
        mip,
        channel: entry.state.channel,
        polarization: entry.state.polarization,
        settings: entry.state.compression,
    };
    raster.build(
        entry.cube.as_ref(),
        entry.display_axes,
        &request,
        entry.state.conversion.as_ref(),
        &mut entry.state.frame_changed,
    )
}

impl std::fmt::Debug for CubeViewer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CubeViewer")
            .field("files", &self.file_ids())
            .field("active", &self.active_file())
            .finish()
    }
}
