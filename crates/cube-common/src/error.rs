//! Error types for the tile/statistics pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using PipelineError.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Coarse classification of a pipeline failure.
///
/// The session layer uses this to decide whether a request simply produced
/// no result or whether something inside the computation went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed bounds, mip, bin count, axis choice, percentile, ...
    InvalidRequest,
    /// The raw view could not be obtained.
    DataUnavailable,
    /// Internally inconsistent intermediate result (e.g. min > max).
    ComputeInconsistency,
    /// The block codec reported a failure.
    CompressionFailure,
}

/// Primary error type for pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    // === Request Errors ===
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid mip {mip}: must be in 1..={limit}")]
    InvalidMip { mip: i64, limit: usize },

    #[error("Invalid bounds [{x_min}, {x_max}) x [{y_min}, {y_max}) for image {width}x{height}")]
    InvalidBounds {
        x_min: i64,
        x_max: i64,
        y_min: i64,
        y_max: i64,
        width: usize,
        height: usize,
    },

    #[error("Unknown file id: {0}")]
    UnknownFile(i32),

    // === Data Errors ===
    #[error("Data not available: {0}")]
    DataUnavailable(String),

    // === Computation Errors ===
    #[error("Inconsistent computation: {0}")]
    ComputeInconsistency(String),

    #[error("Compression failed: {0}")]
    CompressionFailure(String),
}

impl PipelineError {
    /// Create an InvalidRequest error.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a DataUnavailable error.
    pub fn data_unavailable(msg: impl Into<String>) -> Self {
        Self::DataUnavailable(msg.into())
    }

    /// Create a ComputeInconsistency error.
    pub fn inconsistency(msg: impl Into<String>) -> Self {
        Self::ComputeInconsistency(msg.into())
    }

    /// Create a CompressionFailure error.
    pub fn compression(msg: impl Into<String>) -> Self {
        Self::CompressionFailure(msg.into())
    }

    /// Map the error onto the four-way taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_)
            | Self::InvalidMip { .. }
            | Self::InvalidBounds { .. }
            | Self::UnknownFile(_) => ErrorKind::InvalidRequest,
            Self::DataUnavailable(_) => ErrorKind::DataUnavailable,
            Self::ComputeInconsistency(_) => ErrorKind::ComputeInconsistency,
            Self::CompressionFailure(_) => ErrorKind::CompressionFailure,
        }
    }

    /// Whether this error means "the request produced nothing" rather than a
    /// fault inside the computation.
    pub fn is_no_result(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidRequest | ErrorKind::DataUnavailable
        )
    }
}
