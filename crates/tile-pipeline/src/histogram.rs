//! Fixed-bin histograms.

use tracing::{debug, error};

use cube_common::{
    DataCube, PipelineError, PipelineResult, RegionHistogramMessage,
};

use crate::slice::{resolve_hyperslab, FrameRequest};
use crate::stats::engine::read_view;
use crate::stats::StatisticsEngine;
use crate::units::{conversion_factor, UnitConversion};

/// Identity fields copied into the histogram message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistogramTarget {
    pub file_id: i32,
    pub region_id: i32,
    pub polarization: i32,
    pub channel: i32,
}

/// Count finite `values` into `bin_count` equal bins over `[min, max]`.
///
/// Values outside the bounds clip into the first or last bin. With
/// `min == max` every value lands in bin 0.
pub fn build_histogram(
    values: impl IntoIterator<Item = f64>,
    min: f64,
    max: f64,
    bin_count: usize,
    target: HistogramTarget,
) -> PipelineResult<RegionHistogramMessage> {
    if bin_count == 0 {
        return Err(PipelineError::invalid_request("histogram needs at least one bin"));
    }
    if min.is_nan() || max.is_nan() || min > max {
        error!(file_id = target.file_id, min, max, "Histogram bounds inconsistent");
        return Err(PipelineError::inconsistency(format!(
            "histogram min {min} exceeds max {max}"
        )));
    }

    let bin_width = (max - min) / bin_count as f64;
    let last = bin_count - 1;
    let mut bins = vec![0u64; bin_count];

    for v in values.into_iter().filter(|v| v.is_finite()) {
        let bin = if bin_width > 0.0 {
            let raw = ((v - min) / bin_width).floor();
            if raw < 0.0 {
                0
            } else {
                (raw as usize).min(last)
            }
        } else {
            0
        };
        bins[bin] += 1;
    }

    Ok(RegionHistogramMessage {
        file_id: target.file_id,
        region_id: target.region_id,
        polarization: target.polarization,
        channel: target.channel,
        bin_count,
        bin_width,
        first_bin_center: min + bin_width / 2.0,
        bins,
    })
}

/// Histogram of the view selected by `frames`, bounded by its (converted)
/// min and max.
pub fn region_histogram(
    engine: &StatisticsEngine,
    cube: &dyn DataCube,
    display_axes: (usize, usize),
    frames: &FrameRequest,
    conversion: Option<&UnitConversion>,
    bin_count: usize,
    target: HistogramTarget,
) -> PipelineResult<RegionHistogramMessage> {
    if bin_count == 0 {
        return Err(PipelineError::invalid_request("histogram needs at least one bin"));
    }
    let (min, max) = engine.min_max(cube, display_axes, frames, conversion)?;

    let slab = resolve_hyperslab(
        cube.shape(),
        display_axes,
        &frames.range_selections(cube.axis_roles()),
    )?;
    let view = read_view(cube, &slab)?;
    let factor = conversion_factor(conversion, frames.channel_low);

    let histogram = build_histogram(
        view.iter().map(|v| f64::from(v) * factor),
        min,
        max,
        bin_count,
        target,
    )?;
    debug!(
        file_id = target.file_id,
        region_id = target.region_id,
        bins = bin_count,
        samples = histogram.total(),
        "Built histogram"
    );
    Ok(histogram)
}
