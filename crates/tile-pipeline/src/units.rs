//! Intensity unit conversions.
//!
//! A conversion is always a multiplication applied after the intensity cache,
//! so one cached statistic serves every unit display of the same data. The
//! frame-dependent part is evaluated for the requested frame each time and
//! never stored.

use std::sync::Arc;

/// Label used in cache keys when no conversion is requested.
pub const NO_CONVERSION_LABEL: &str = "NONE";

type FrameFactor = Arc<dyn Fn(i64) -> f64 + Send + Sync>;

/// Multiplicative unit conversion.
#[derive(Clone)]
pub struct UnitConversion {
    label: String,
    multiplier: f64,
    frame_factor: Option<FrameFactor>,
}

impl UnitConversion {
    /// Conversion by a constant factor.
    pub fn constant(label: impl Into<String>, multiplier: f64) -> Self {
        Self {
            label: label.into(),
            multiplier,
            frame_factor: None,
        }
    }

    /// Conversion whose factor also depends on the spectral frame
    /// (e.g. a frequency-dependent brightness temperature).
    pub fn frame_dependent(
        label: impl Into<String>,
        multiplier: f64,
        factor: impl Fn(i64) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            multiplier,
            frame_factor: Some(Arc::new(factor)),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn is_frame_dependent(&self) -> bool {
        self.frame_factor.is_some()
    }

    /// Total factor for `frame`.
    pub fn factor_for(&self, frame: i64) -> f64 {
        match &self.frame_factor {
            Some(f) => self.multiplier * f(frame),
            None => self.multiplier,
        }
    }
}

impl std::fmt::Debug for UnitConversion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitConversion")
            .field("label", &self.label)
            .field("multiplier", &self.multiplier)
            .field("frame_dependent", &self.is_frame_dependent())
            .finish()
    }
}

/// Cache label for an optional conversion.
pub fn conversion_label(conversion: Option<&UnitConversion>) -> &str {
    conversion.map_or(NO_CONVERSION_LABEL, |c| c.label())
}

/// Factor for an optional conversion at `frame` (1 when absent).
pub fn conversion_factor(conversion: Option<&UnitConversion>, frame: i64) -> f64 {
    conversion.map_or(1.0, |c| c.factor_for(frame))
}
