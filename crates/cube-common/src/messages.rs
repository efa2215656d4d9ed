//! Payloads produced by the pipeline.
//!
//! The wire encoding belongs to the protocol layer; these types only fix the
//! shape of what gets sent. All of them serialize with serde.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::bounds::ImageBounds;

/// Region id used for histograms that cover the whole current 2D image.
pub const IMAGE_REGION_ID: i32 = -1;

/// Fixed-bin histogram of one view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionHistogramMessage {
    pub file_id: i32,
    pub region_id: i32,
    pub polarization: i32,
    pub channel: i32,
    pub bin_count: usize,
    pub bin_width: f64,
    pub first_bin_center: f64,
    pub bins: Vec<u64>,
}

impl RegionHistogramMessage {
    /// Total number of samples counted.
    pub fn total(&self) -> u64 {
        self.bins.iter().sum()
    }
}

/// How the subsets of a raster tile are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    /// Raw little-endian f32 samples.
    #[default]
    None,
    /// Fixed-precision block-transform codec.
    Zfp,
}

impl CompressionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Zfp => "zfp",
        }
    }

    /// Parse from string (case-insensitive), defaulting to `None`.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "zfp" => Self::Zfp,
            _ => Self::None,
        }
    }
}

impl std::fmt::Display for CompressionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row-band of a raster tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileSubset {
    /// Encoded sample bytes.
    pub compressed: Bytes,
    /// Alternating finite/NaN run lengths, starting with a finite run.
    pub nan_runs: Vec<u32>,
    /// Rows covered by this subset.
    pub rows: usize,
    /// 0 on success, nonzero when the codec failed for this subset.
    pub status: i32,
}

impl TileSubset {
    pub fn is_ok(&self) -> bool {
        self.status == 0
    }
}

/// Down-sampled, encoded raster tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterTileMessage {
    pub file_id: i32,
    pub bounds: ImageBounds,
    pub channel: i32,
    pub polarization: i32,
    pub mip: usize,
    /// Output columns after down-sampling.
    pub width: usize,
    /// Output rows after down-sampling.
    pub height: usize,
    pub compression_type: CompressionType,
    pub precision: u32,
    pub subsets: Vec<TileSubset>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub histogram: Option<RegionHistogramMessage>,
}

impl RasterTileMessage {
    /// Number of subsets whose codec status is nonzero.
    ///
    /// The tile itself carries no overall failure flag; clients that care
    /// must inspect the per-subset status.
    pub fn failed_subsets(&self) -> usize {
        self.subsets.iter().filter(|s| !s.is_ok()).count()
    }
}

/// 1D profile along one axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub coordinate: String,
    pub start: usize,
    pub end: usize,
    pub values: Vec<f32>,
}

impl Profile {
    /// Profile over a whole axis: `start = 0`, `end = len - 1`.
    pub fn full(coordinate: impl Into<String>, values: Vec<f32>) -> Self {
        Self {
            coordinate: coordinate.into(),
            start: 0,
            end: values.len().saturating_sub(1),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// X/Y profiles through a cursor position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialProfileMessage {
    pub file_id: i32,
    pub x: usize,
    pub y: usize,
    pub channel: i32,
    pub polarization: i32,
    /// Sample under the cursor (NaN when non-finite).
    pub value: f32,
    pub profiles: Vec<Profile>,
}

/// Profile along the spectral axis at a cursor position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralProfileMessage {
    pub file_id: i32,
    pub region_id: i32,
    pub polarization: i32,
    pub profiles: Vec<Profile>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_type_from_str() {
        assert_eq!(CompressionType::from_str("ZFP"), CompressionType::Zfp);
        assert_eq!(CompressionType::from_str("none"), CompressionType::None);
        assert_eq!(CompressionType::from_str("bogus"), CompressionType::None);
    }

    #[test]
    fn test_profile_full() {
        let p = Profile::full("x", vec![1.0, 2.0, 3.0]);
        assert_eq!((p.start, p.end), (0, 2));
        let empty = Profile::full("y", vec![]);
        assert_eq!((empty.start, empty.end), (0, 0));
    }

    #[test]
    fn test_tile_serializes_without_histogram() {
        let tile = RasterTileMessage {
            file_id: 0,
            bounds: ImageBounds::new(0, 4, 0, 4),
            channel: 0,
            polarization: 0,
            mip: 1,
            width: 4,
            height: 4,
            compression_type: CompressionType::None,
            precision: 0,
            subsets: vec![],
            histogram: None,
        };
        let json = serde_json::to_value(&tile).unwrap();
        assert!(json.get("histogram").is_none());
        assert_eq!(json["compression_type"], "none");
    }

    #[test]
    fn test_failed_subsets() {
        let subset = |status| TileSubset {
            compressed: Bytes::new(),
            nan_runs: vec![4],
            rows: 1,
            status,
        };
        let tile = RasterTileMessage {
            file_id: 1,
            bounds: ImageBounds::new(0, 4, 0, 3),
            channel: 0,
            polarization: 0,
            mip: 1,
            width: 4,
            height: 3,
            compression_type: CompressionType::Zfp,
            precision: 12,
            subsets: vec![subset(0), subset(1), subset(0)],
            histogram: None,
        };
        assert_eq!(tile.failed_subsets(), 1);
    }
}
