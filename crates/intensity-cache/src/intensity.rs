//! Percentile → intensity memoization.
//!
//! Entries are keyed by (source, frame range, percentile, polarization,
//! unit-transform label). Writes always overwrite: the most recent write wins
//! even when it carries a larger error bound than the value it replaces.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{Result, StoreError};
use crate::store::{CacheStore, FileStore, MemoryStore};

/// Key of one cached intensity.
///
/// Equality is exact on every field, including the bit pattern of
/// `percentile`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntensityKey {
    pub source_id: String,
    pub frame_low: i64,
    pub frame_high: i64,
    pub percentile: f64,
    pub polarization: i64,
    pub transform_label: String,
}

impl IntensityKey {
    pub fn new(
        source_id: impl Into<String>,
        frame_low: i64,
        frame_high: i64,
        percentile: f64,
        polarization: i64,
        transform_label: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            frame_low,
            frame_high,
            percentile,
            polarization,
            transform_label: transform_label.into(),
        }
    }

    /// Stable string form used as the store key.
    ///
    /// The percentile is written as the hex of its IEEE-754 bits so that two
    /// keys are equal exactly when their percentiles are bit-identical.
    pub fn encode(&self) -> String {
        let fields = (
            self.source_id.as_str(),
            self.frame_low,
            self.frame_high,
            format!("{:016x}", self.percentile.to_bits()),
            self.polarization,
            self.transform_label.as_str(),
        );
        // a tuple of strings and integers always serializes
        serde_json::to_string(&fields).unwrap_or_default()
    }
}

/// Cached intensity with the error bound of the calculator that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntensityValue {
    pub value: f64,
    /// Error bound in units of (max - min) of the view.
    pub error: f64,
    /// Label of the calculator that produced the value.
    pub calculator: String,
}

impl IntensityValue {
    pub fn new(value: f64, error: f64, calculator: impl Into<String>) -> Self {
        Self {
            value,
            error,
            calculator: calculator.into(),
        }
    }
}

/// Statistics for the intensity cache.
///
/// All fields are atomic so they can be read without touching the store.
#[derive(Debug, Default)]
pub struct IntensityCacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub writes: AtomicU64,
    pub store_errors: AtomicU64,
}

impl IntensityCacheStats {
    /// Cache hit rate as a percentage (0-100).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }
}

/// Handle to the persistent intensity cache.
///
/// Cheap to clone; clones share the backing store and statistics. A cache
/// without a store is valid and always misses.
#[derive(Clone, Default)]
pub struct IntensityCache {
    store: Option<Arc<dyn CacheStore>>,
    stats: Arc<IntensityCacheStats>,
}

impl IntensityCache {
    /// Cache over an arbitrary store.
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store: Some(store),
            stats: Arc::new(IntensityCacheStats::default()),
        }
    }

    /// Cache with no backing store: every lookup misses, writes are dropped.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Cache over a bounded in-memory LRU store.
    pub fn in_memory(capacity: usize) -> Self {
        Self::new(Arc::new(MemoryStore::new(capacity)))
    }

    /// Cache over a directory-backed store.
    pub fn on_disk(root: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Arc::new(FileStore::open(root)?)))
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn stats(&self) -> &IntensityCacheStats {
        &self.stats
    }

    /// Look up an intensity. Store failures and undecodable entries count as
    /// misses.
    pub fn get(&self, key: &IntensityKey) -> Option<IntensityValue> {
        let store = self.store.as_ref()?;
        let encoded = key.encode();

        let found = store.get(&encoded).and_then(|bytes| match bytes {
            Some(bytes) => serde_json::from_slice::<IntensityValue>(&bytes)
                .map(Some)
                .map_err(|e| StoreError::corrupt(&encoded, e.to_string())),
            None => Ok(None),
        });

        match found {
            Ok(Some(value)) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Ok(None) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                warn!(backend = store.name(), error = %e, "Intensity cache read failed");
                self.stats.store_errors.fetch_add(1, Ordering::Relaxed);
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store an intensity, overwriting any existing entry.
    pub fn set(&self, key: &IntensityKey, value: &IntensityValue) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        let encoded = key.encode();
        // serde_json writes NaN as null, which would never read back
        if !value.value.is_finite() || !value.error.is_finite() {
            warn!(key = %encoded, value = value.value, "Non-finite intensity not cached");
            return;
        }
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key = %encoded, error = %e, "Intensity value not serializable");
                return;
            }
        };

        match store.set(&encoded, &bytes) {
            Ok(()) => {
                self.stats.writes.fetch_add(1, Ordering::Relaxed);
                debug!(key = %encoded, value = value.value, error = value.error, "Cached intensity");
            }
            Err(e) => {
                warn!(backend = store.name(), error = %e, "Intensity cache write failed");
                self.stats.store_errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl std::fmt::Debug for IntensityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntensityCache")
            .field("backend", &self.store.as_ref().map(|s| s.name()))
            .finish()
    }
}
