//! Percentile-to-intensity calculators.
//!
//! Each calculator declares an error bound, expressed as a fraction of the
//! (max - min) intensity span of the view. The statistics engine only reuses
//! a cached value when its recorded bound is at least as tight as the bound
//! of the calculator it was built with.

use serde::{Deserialize, Serialize};

/// Strategy mapping percentile ranks to intensities.
pub trait PercentileCalculator: Send + Sync {
    /// Short name recorded alongside cached values.
    fn label(&self) -> &'static str;

    /// Guaranteed error bound, as a fraction of (max - min).
    fn error_bound(&self) -> f64;

    /// Resolve every percentile in one pass over `values`.
    ///
    /// `values` holds only finite samples and is non-empty; the calculator may
    /// reorder it. Percentiles are in `[0, 1]`. The result has one entry per
    /// percentile, in the same order.
    fn compute(&self, values: &mut [f64], percentiles: &[f64]) -> Vec<f64>;
}

/// Which calculator the engine is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CalculatorKind {
    #[default]
    Exact,
    Binned,
}

impl CalculatorKind {
    /// Parse from string (case-insensitive), defaulting to `Exact`.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "binned" | "histogram" | "approximate" => Self::Binned,
            _ => Self::Exact,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Binned => "binned",
        }
    }
}

impl std::fmt::Display for CalculatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Zero-based nearest-rank index of percentile `p` among `n` sorted values.
#[inline]
pub fn nearest_rank(p: f64, n: usize) -> usize {
    let rank = (p * n as f64).ceil() as usize;
    rank.max(1).min(n) - 1
}

/// Exact nearest-rank percentiles from a full sort.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactPercentiles;

impl PercentileCalculator for ExactPercentiles {
    fn label(&self) -> &'static str {
        "exact"
    }

    fn error_bound(&self) -> f64 {
        0.0
    }

    fn compute(&self, values: &mut [f64], percentiles: &[f64]) -> Vec<f64> {
        values.sort_unstable_by(f64::total_cmp);
        let n = values.len();
        percentiles
            .iter()
            .map(|&p| values[nearest_rank(p, n)])
            .collect()
    }
}

/// Approximate percentiles from a fixed-bin histogram over `[min, max]`.
///
/// Percentiles 0 and 1 still return the exact extremes; everything else
/// resolves to the upper edge of the bin holding the nearest-rank sample, so
/// the error is at most one bin width.
#[derive(Debug, Clone, Copy)]
pub struct BinnedPercentiles {
    bins: usize,
}

impl BinnedPercentiles {
    pub fn new(bins: usize) -> Self {
        Self { bins: bins.max(1) }
    }

    pub fn bins(&self) -> usize {
        self.bins
    }
}

impl Default for BinnedPercentiles {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl PercentileCalculator for BinnedPercentiles {
    fn label(&self) -> &'static str {
        "binned"
    }

    fn error_bound(&self) -> f64 {
        1.0 / self.bins as f64
    }

    fn compute(&self, values: &mut [f64], percentiles: &[f64]) -> Vec<f64> {
        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let n = values.len();

        if max <= min {
            return vec![min; percentiles.len()];
        }

        let width = (max - min) / self.bins as f64;
        let mut counts = vec![0usize; self.bins];
        for &v in values.iter() {
            let bin = (((v - min) / width) as usize).min(self.bins - 1);
            counts[bin] += 1;
        }

        percentiles
            .iter()
            .map(|&p| {
                if p <= 0.0 {
                    return min;
                }
                if p >= 1.0 {
                    return max;
                }
                let target = nearest_rank(p, n) + 1;
                let mut seen = 0usize;
                let mut bin = self.bins - 1;
                for (i, &count) in counts.iter().enumerate() {
                    seen += count;
                    if seen >= target {
                        bin = i;
                        break;
                    }
                }
                (min + (bin + 1) as f64 * width).min(max)
            })
            .collect()
    }
}

/// Build the calculator for a kind.
pub fn calculator_for(kind: CalculatorKind, bins: usize) -> Box<dyn PercentileCalculator> {
    match kind {
        CalculatorKind::Exact => Box::new(ExactPercentiles),
        CalculatorKind::Binned => Box::new(BinnedPercentiles::new(bins)),
    }
}
