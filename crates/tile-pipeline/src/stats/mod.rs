//! Percentile statistics.

pub mod calculator;
pub mod engine;

pub use calculator::{
    calculator_for, nearest_rank, BinnedPercentiles, CalculatorKind, ExactPercentiles,
    PercentileCalculator,
};
pub use engine::StatisticsEngine;
