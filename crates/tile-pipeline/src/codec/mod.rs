//! Lossy fixed-precision block codecs.

pub mod zfp;

use thiserror::Error;

use cube_common::PipelineError;

pub use zfp::ZfpCodec;

/// Smallest and largest accepted precision (bit planes kept per block).
pub const MIN_PRECISION: u32 = 1;
pub const MAX_PRECISION: u32 = 32;

/// Errors from a block codec.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Precision {0} outside 1..=32")]
    InvalidPrecision(u32),

    #[error("Buffer of {actual} values too small for {width}x{height}")]
    ShapeMismatch {
        width: usize,
        height: usize,
        actual: usize,
    },

    #[error("Corrupt stream: {0}")]
    Corrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }
}

impl From<CodecError> for PipelineError {
    fn from(err: CodecError) -> Self {
        PipelineError::compression(err.to_string())
    }
}

/// Result type alias using CodecError.
pub type CodecResult<T> = Result<T, CodecError>;

/// Fixed-precision compressor for a row-major 2D float plane.
///
/// Implementations must accept any finite input; NaN positions are carried
/// separately by the caller, so their encoded value does not matter.
pub trait BlockCodec: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    fn compress(&self, data: &[f32], width: usize, height: usize, precision: u32)
        -> CodecResult<Vec<u8>>;

    /// Decode a stream produced by `compress`, returning
    /// `(values, width, height)`.
    fn decompress(&self, bytes: &[u8]) -> CodecResult<(Vec<f32>, usize, usize)>;
}

/// Check a precision against the accepted range.
pub fn check_precision(precision: u32) -> CodecResult<()> {
    if (MIN_PRECISION..=MAX_PRECISION).contains(&precision) {
        Ok(())
    } else {
        Err(CodecError::InvalidPrecision(precision))
    }
}
