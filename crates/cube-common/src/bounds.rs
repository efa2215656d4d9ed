//! Pixel bounds of a tile request.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};

/// Rectangular pixel region `[x_min, x_max) x [y_min, y_max)`.
///
/// Bounds arrive from the client as signed integers and are validated
/// against the image before any data is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ImageBounds {
    pub x_min: i64,
    pub x_max: i64,
    pub y_min: i64,
    pub y_max: i64,
}

impl ImageBounds {
    pub fn new(x_min: i64, x_max: i64, y_min: i64, y_max: i64) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    /// Bounds covering a whole `width x height` image.
    pub fn full(width: usize, height: usize) -> Self {
        Self::new(0, width as i64, 0, height as i64)
    }

    pub fn width(&self) -> i64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> i64 {
        self.y_max - self.y_min
    }

    /// Check the bounds against an image of the given size.
    pub fn validate(&self, width: usize, height: usize) -> PipelineResult<()> {
        let ok = self.x_min >= 0
            && self.y_min >= 0
            && self.x_min <= self.x_max
            && self.y_min <= self.y_max
            && self.x_max <= width as i64
            && self.y_max <= height as i64;
        if ok {
            Ok(())
        } else {
            Err(PipelineError::InvalidBounds {
                x_min: self.x_min,
                x_max: self.x_max,
                y_min: self.y_min,
                y_max: self.y_max,
                width,
                height,
            })
        }
    }

    /// Output dimensions `(columns, rows)` after down-sampling by `mip`.
    /// Trailing partial blocks are dropped.
    pub fn downsampled_size(&self, mip: usize) -> (usize, usize) {
        if mip == 0 {
            return (0, 0);
        }
        let w = self.width().max(0) as usize;
        let h = self.height().max(0) as usize;
        (w / mip, h / mip)
    }
}
