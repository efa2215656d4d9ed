//! Percentile and min/max statistics over a cube view.

use std::sync::Arc;
use tracing::{debug, error};

use cube_common::{DataCube, Hyperslab, PipelineError, PipelineResult, RawView};
use intensity_cache::{IntensityCache, IntensityKey, IntensityValue};

use super::calculator::{ExactPercentiles, PercentileCalculator};
use crate::slice::{resolve_hyperslab, FrameRequest};
use crate::units::{conversion_factor, conversion_label, UnitConversion};

/// Percentile → intensity engine with a persistent memo.
///
/// Cached values are always stored before unit conversion. The conversion
/// factor (including any frame-dependent part) is applied to every result on
/// the way out.
#[derive(Clone)]
pub struct StatisticsEngine {
    calculator: Arc<dyn PercentileCalculator>,
    cache: IntensityCache,
}

impl StatisticsEngine {
    pub fn new(calculator: Arc<dyn PercentileCalculator>, cache: IntensityCache) -> Self {
        Self { calculator, cache }
    }

    /// Exact calculator, no cache.
    pub fn uncached() -> Self {
        Self::new(Arc::new(ExactPercentiles), IntensityCache::disabled())
    }

    pub fn calculator(&self) -> &dyn PercentileCalculator {
        self.calculator.as_ref()
    }

    pub fn cache(&self) -> &IntensityCache {
        &self.cache
    }

    /// Intensities at `percentiles` for the view selected by `frames`.
    ///
    /// The view is only read when at least one percentile misses the cache.
    pub fn percentile_intensities(
        &self,
        cube: &dyn DataCube,
        display_axes: (usize, usize),
        frames: &FrameRequest,
        conversion: Option<&UnitConversion>,
        percentiles: &[f64],
    ) -> PipelineResult<Vec<f64>> {
        validate_percentiles(percentiles)?;
        let slab = resolve_hyperslab(
            cube.shape(),
            display_axes,
            &frames.range_selections(cube.axis_roles()),
        )?;

        let label = conversion_label(conversion);
        let keys: Vec<IntensityKey> = percentiles
            .iter()
            .map(|&p| {
                IntensityKey::new(
                    cube.source_id(),
                    frames.channel_low,
                    frames.channel_high,
                    p,
                    frames.polarization,
                    label,
                )
            })
            .collect();

        let bound = self.calculator.error_bound();
        let mut raw: Vec<Option<f64>> = keys
            .iter()
            .map(|key| {
                self.cache
                    .get(key)
                    .filter(|cached| cached.error <= bound)
                    .map(|cached| cached.value)
            })
            .collect();

        let missing: Vec<usize> = (0..raw.len()).filter(|&i| raw[i].is_none()).collect();
        if missing.is_empty() {
            debug!(source = cube.source_id(), count = percentiles.len(), "Intensities served from cache");
        } else {
            let view = read_view(cube, &slab)?;
            let wanted: Vec<f64> = missing.iter().map(|&i| percentiles[i]).collect();
            let computed = self.compute_from_view(&view, &wanted)?;

            for (&i, value) in missing.iter().zip(computed) {
                self.cache.set(
                    &keys[i],
                    &IntensityValue::new(value, bound, self.calculator.label()),
                );
                raw[i] = Some(value);
            }
            debug!(
                source = cube.source_id(),
                computed = missing.len(),
                cached = percentiles.len() - missing.len(),
                calculator = self.calculator.label(),
                "Computed intensities"
            );
        }

        let factor = conversion_factor(conversion, frames.channel_low);
        Ok(raw.into_iter().flatten().map(|v| v * factor).collect())
    }

    /// Exact minimum and maximum finite intensity (percentiles 0 and 1).
    pub fn min_max(
        &self,
        cube: &dyn DataCube,
        display_axes: (usize, usize),
        frames: &FrameRequest,
        conversion: Option<&UnitConversion>,
    ) -> PipelineResult<(f64, f64)> {
        let values =
            self.percentile_intensities(cube, display_axes, frames, conversion, &[0.0, 1.0])?;
        Ok((values[0], values[1]))
    }

    /// Resolve percentiles over an already materialized view, bypassing the
    /// cache.
    pub fn compute_from_view(&self, view: &RawView, percentiles: &[f64]) -> PipelineResult<Vec<f64>> {
        validate_percentiles(percentiles)?;
        let mut values = finite_values(view);
        if values.is_empty() {
            return Err(PipelineError::data_unavailable(
                "view contains no finite values",
            ));
        }
        Ok(self.calculator.compute(&mut values, percentiles))
    }
}

impl Default for StatisticsEngine {
    fn default() -> Self {
        Self::uncached()
    }
}

impl std::fmt::Debug for StatisticsEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatisticsEngine")
            .field("calculator", &self.calculator.label())
            .field("cache", &self.cache)
            .finish()
    }
}

/// Read a hyperslab, reporting any failure as unavailable data.
pub(crate) fn read_view(cube: &dyn DataCube, slab: &Hyperslab) -> PipelineResult<RawView> {
    cube.read(slab).map_err(|e| {
        error!(source = cube.source_id(), error = %e, "Raw view unavailable");
        match e {
            PipelineError::DataUnavailable(_) => e,
            other => PipelineError::data_unavailable(other.to_string()),
        }
    })
}

fn finite_values(view: &RawView) -> Vec<f64> {
    view.iter()
        .filter(|v| v.is_finite())
        .map(f64::from)
        .collect()
}

fn validate_percentiles(percentiles: &[f64]) -> PipelineResult<()> {
    match percentiles.iter().find(|p| !(0.0..=1.0).contains(*p)) {
        Some(p) => Err(PipelineError::invalid_request(format!(
            "percentile {p} outside [0, 1]"
        ))),
        None => Ok(()),
    }
}
