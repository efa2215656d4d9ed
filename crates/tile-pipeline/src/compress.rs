//! Multi-subset tile compression.
//!
//! A down-sampled plane is cut into up to [`MAX_SUBSETS`] horizontal bands.
//! Each band is NaN-encoded and compressed on its own, in parallel, into its
//! own output slot. A codec failure only marks its own band.

use bytes::{BufMut, Bytes, BytesMut};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use cube_common::{CompressionType, PipelineError, PipelineResult, TileSubset};

use crate::codec::{BlockCodec, ZfpCodec};
use crate::nan_encoding::{encode_and_fill, nan_runs};

/// Upper bound on parallel subsets per tile.
pub const MAX_SUBSETS: usize = 8;

/// Status recorded on a subset the codec could not encode.
pub const SUBSET_FAILED: i32 = 1;

/// How a tile is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionSettings {
    pub compression: CompressionType,
    /// Bit planes kept by the codec.
    pub precision: u32,
    /// Requested subset count; clamped to `1..=MAX_SUBSETS`.
    pub subsets: usize,
}

impl CompressionSettings {
    pub fn uncompressed() -> Self {
        Self {
            compression: CompressionType::None,
            precision: 0,
            subsets: 1,
        }
    }

    pub fn zfp(precision: u32, subsets: usize) -> Self {
        Self {
            compression: CompressionType::Zfp,
            precision,
            subsets,
        }
    }

    /// Subset count actually used.
    pub fn effective_subsets(&self) -> usize {
        self.subsets.clamp(1, MAX_SUBSETS)
    }
}

impl Default for CompressionSettings {
    fn default() -> Self {
        Self::uncompressed()
    }
}

/// Row count of each of `n` contiguous bands over `height` rows:
/// `height / n` each, the remainder going to the last band.
///
/// `n` is reduced so that no band is empty.
pub fn subset_rows(height: usize, n: usize) -> Vec<usize> {
    let n = n.clamp(1, height.max(1));
    let base = height / n;
    let mut rows = vec![base; n];
    rows[n - 1] = height - base * (n - 1);
    rows
}

/// Encodes down-sampled planes into tile subsets.
#[derive(Clone)]
pub struct TileCompressor {
    codec: Arc<dyn BlockCodec>,
}

impl TileCompressor {
    pub fn new(codec: Arc<dyn BlockCodec>) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &dyn BlockCodec {
        self.codec.as_ref()
    }

    /// Encode a row-major `width x height` plane.
    ///
    /// The buffer is modified in place by NaN fill when compressing.
    pub fn compress(
        &self,
        data: &mut [f32],
        width: usize,
        height: usize,
        settings: &CompressionSettings,
    ) -> PipelineResult<Vec<TileSubset>> {
        if data.len() != width * height {
            return Err(PipelineError::invalid_request(format!(
                "buffer of {} values for a {width}x{height} plane",
                data.len()
            )));
        }

        match settings.compression {
            CompressionType::None => Ok(vec![raw_subset(data, height)]),
            CompressionType::Zfp => Ok(self.compress_subsets(data, width, height, settings)),
        }
    }

    fn compress_subsets(
        &self,
        data: &mut [f32],
        width: usize,
        height: usize,
        settings: &CompressionSettings,
    ) -> Vec<TileSubset> {
        let rows = subset_rows(height, settings.effective_subsets());

        let mut bands = Vec::with_capacity(rows.len());
        let mut rest = data;
        for &count in &rows {
            let (band, tail) = std::mem::take(&mut rest).split_at_mut(count * width);
            bands.push((band, count));
            rest = tail;
        }

        let precision = settings.precision;
        let codec = self.codec.as_ref();
        let subsets: Vec<TileSubset> = bands
            .into_par_iter()
            .enumerate()
            .map(|(index, (band, count))| {
                let runs = encode_and_fill(band, width, count);
                match codec.compress(band, width, count, precision) {
                    Ok(bytes) => TileSubset {
                        compressed: Bytes::from(bytes),
                        nan_runs: runs,
                        rows: count,
                        status: 0,
                    },
                    Err(e) => {
                        warn!(subset = index, rows = count, precision, error = %e, "Subset compression failed");
                        TileSubset {
                            compressed: Bytes::new(),
                            nan_runs: runs,
                            rows: count,
                            status: SUBSET_FAILED,
                        }
                    }
                }
            })
            .collect();

        debug!(
            codec = codec.name(),
            subsets = subsets.len(),
            bytes = subsets.iter().map(|s| s.compressed.len()).sum::<usize>(),
            "Compressed tile"
        );
        subsets
    }
}

impl Default for TileCompressor {
    fn default() -> Self {
        Self::new(Arc::new(ZfpCodec))
    }
}

impl std::fmt::Debug for TileCompressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileCompressor")
            .field("codec", &self.codec.name())
            .finish()
    }
}

fn raw_subset(data: &[f32], height: usize) -> TileSubset {
    let mut buf = BytesMut::with_capacity(data.len() * 4);
    for &v in data {
        buf.put_f32_le(v);
    }
    TileSubset {
        compressed: buf.freeze(),
        nan_runs: nan_runs(data),
        rows: height,
        status: 0,
    }
}

/// Decode raw little-endian samples from an uncompressed subset.
pub fn decode_raw(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
