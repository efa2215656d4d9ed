//! Shared test utilities for the cube-tiles workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Synthetic plane and cube generators
//! - A cube whose reads fail, for unavailable-data paths
//! - Float assertion macros that understand NaN
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{create_test_cube, FailingCube};
//! ```

pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;

/// Macro for approximate floating-point equality assertions.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(1.0001_f64, 1.0_f64, 0.001_f64); // passes
/// assert_approx_eq!(1.1_f32, 1.0_f32, 0.001_f32);    // fails
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: f64 = $left as f64;
        let right: f64 = $right as f64;
        let epsilon: f64 = $epsilon as f64;
        let diff = (left - right).abs();
        if diff > epsilon {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`,\n right: `{:?}`,\n  diff: `{:?}` > epsilon `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Element-wise approximate equality of two float sequences where NaN
/// only matches NaN.
///
/// # Usage
///
/// ```ignore
/// use test_utils::assert_float_slice_eq;
///
/// assert_float_slice_eq!(decoded, original, 1e-3);
/// ```
#[macro_export]
macro_rules! assert_float_slice_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: Vec<f64> = $left.iter().map(|v| *v as f64).collect();
        let right: Vec<f64> = $right.iter().map(|v| *v as f64).collect();
        let epsilon: f64 = $epsilon as f64;
        assert_eq!(left.len(), right.len(), "length mismatch");
        for (i, (l, r)) in left.iter().zip(&right).enumerate() {
            if l.is_nan() || r.is_nan() {
                if l.is_nan() != r.is_nan() {
                    panic!("NaN mismatch at index {}: left `{:?}`, right `{:?}`", i, l, r);
                }
            } else if (l - r).abs() > epsilon {
                panic!(
                    "assertion failed at index {}: `{:?}` vs `{:?}`, diff > epsilon `{:?}`",
                    i, l, r, epsilon
                );
            }
        }
    }};
}
