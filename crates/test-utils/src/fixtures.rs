//! Common test fixtures for cube pipeline tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use cube_common::{AxisRole, DataCube, Hyperslab, PipelineError, PipelineResult, RawView};

/// Common percentile sets.
pub mod percentiles {
    /// Extremes only (min/max).
    pub const MIN_MAX: [f64; 2] = [0.0, 1.0];

    /// Clip levels offered by typical viewers.
    pub const CLIP_LEVELS: [f64; 6] = [0.9, 0.95, 0.99, 0.995, 0.999, 1.0];

    /// Symmetric pairs around the median.
    pub const SYMMETRIC: [f64; 5] = [0.005, 0.25, 0.5, 0.75, 0.995];
}

/// Common cube shapes as `(width, height, channels, polarizations)`.
pub mod shapes {
    /// Single small plane.
    pub const TINY: (usize, usize, usize, usize) = (8, 8, 1, 1);

    /// Non-square plane with a few channels.
    pub const SMALL: (usize, usize, usize, usize) = (37, 23, 5, 1);

    /// Full-Stokes cube.
    pub const STOKES: (usize, usize, usize, usize) = (16, 16, 4, 4);
}

/// A cube whose reads always fail with `DataUnavailable`.
///
/// Counts read attempts so tests can assert that cached paths never touch
/// the data.
#[derive(Debug)]
pub struct FailingCube {
    source_id: String,
    shape: Vec<usize>,
    roles: Vec<AxisRole>,
    reads: AtomicUsize,
}

impl FailingCube {
    /// A `(spectral, y, x)` cube of the given size.
    pub fn new(source_id: &str, width: usize, height: usize, channels: usize) -> Self {
        Self {
            source_id: source_id.to_string(),
            shape: vec![channels, height, width],
            roles: vec![AxisRole::Spectral, AxisRole::SpatialY, AxisRole::SpatialX],
            reads: AtomicUsize::new(0),
        }
    }

    /// Number of `read` calls so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

impl DataCube for FailingCube {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn axis_roles(&self) -> &[AxisRole] {
        &self.roles
    }

    fn read(&self, _slab: &Hyperslab) -> PipelineResult<RawView> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Err(PipelineError::data_unavailable(format!(
            "{} is offline",
            self.source_id
        )))
    }
}
