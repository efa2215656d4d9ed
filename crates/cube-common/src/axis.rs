//! Axis roles, frame selections and hyperslabs.

use serde::{Deserialize, Serialize};

/// Semantic role of a cube axis, supplied by the metadata collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisRole {
    SpatialX,
    SpatialY,
    Spectral,
    Polarization,
    Other,
}

impl AxisRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SpatialX => "spatial_x",
            Self::SpatialY => "spatial_y",
            Self::Spectral => "spectral",
            Self::Polarization => "polarization",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for AxisRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Find the first axis position carrying `role`.
pub fn find_axis(roles: &[AxisRole], role: AxisRole) -> Option<usize> {
    roles.iter().position(|r| *r == role)
}

/// Frame request for one non-display axis.
///
/// Indices are signed: a negative value is how callers ask for
/// "whole axis" on a range, and gets clamped on a single index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameSelection {
    /// A single frame index.
    Index(i64),
    /// An inclusive `[low, high]` frame range.
    Range { low: i64, high: i64 },
}

/// One axis of a hyperslab: `count` elements from `start`, every `step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisSlice {
    pub start: usize,
    pub count: usize,
    pub step: usize,
}

impl AxisSlice {
    pub fn new(start: usize, count: usize) -> Self {
        Self {
            start,
            count,
            step: 1,
        }
    }

    /// Whole extent of an axis of length `size`.
    pub fn full(size: usize) -> Self {
        Self::new(0, size)
    }

    /// Exclusive end index in source coordinates.
    pub fn end(&self) -> usize {
        if self.count == 0 {
            self.start
        } else {
            self.start + (self.count - 1) * self.step + 1
        }
    }

    /// Whether the slice stays inside an axis of length `size`.
    pub fn fits(&self, size: usize) -> bool {
        self.step > 0 && self.end() <= size
    }
}

/// Axis-aligned sub-region of the cube plus the two free (display) axes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hyperslab {
    pub slices: Vec<AxisSlice>,
    /// Axis positions of the display plane: (x, y).
    pub display_axes: (usize, usize),
}

impl Hyperslab {
    pub fn new(slices: Vec<AxisSlice>, display_axes: (usize, usize)) -> Self {
        Self {
            slices,
            display_axes,
        }
    }

    pub fn ndim(&self) -> usize {
        self.slices.len()
    }

    /// Element counts per axis.
    pub fn counts(&self) -> Vec<usize> {
        self.slices.iter().map(|s| s.count).collect()
    }

    /// Total number of elements selected.
    pub fn len(&self) -> usize {
        self.slices.iter().map(|s| s.count).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of this hyperslab with one axis replaced.
    pub fn with_axis(&self, axis: usize, slice: AxisSlice) -> Self {
        let mut slices = self.slices.clone();
        slices[axis] = slice;
        Self {
            slices,
            display_axes: self.display_axes,
        }
    }
}
