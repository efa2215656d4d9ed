//! Persistent intensity cache for percentile statistics.
//!
//! The statistics engine memoizes percentile → intensity results here so a
//! second request for the same view, percentile and unit label is answered
//! without touching pixel data.
//!
//! ```text
//! IntensityCache::get(key)
//!      │
//!      ├─► no store configured ──► miss
//!      │
//!      └─► CacheStore::get(encoded key)
//!               ├─► bytes  ──► decode IntensityValue ──► hit
//!               ├─► none   ──► miss
//!               └─► error  ──► log, miss
//! ```

pub mod error;
pub mod intensity;
pub mod store;

pub use error::{Result, StoreError};
pub use intensity::{IntensityCache, IntensityCacheStats, IntensityKey, IntensityValue};
pub use store::{CacheStore, FileStore, MemoryStore};
