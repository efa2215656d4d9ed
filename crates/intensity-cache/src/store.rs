//! Key/value stores behind the intensity cache.
//!
//! The statistics pipeline only relies on the `get`/`set` contract. Two
//! backends ship with the crate:
//!
//! - [`MemoryStore`]: bounded LRU map, lost on restart
//! - [`FileStore`]: one file per key under a directory, survives restarts
//!
//! Both guard each call internally so independent requests can share a store
//! without any caller-side locking.

use lru::LruCache;
use parking_lot::Mutex;
use std::fs;
use std::io::{ErrorKind, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Result, StoreError};

/// Persistent key/value contract consumed by the intensity cache.
pub trait CacheStore: Send + Sync {
    /// Fetch the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// In-memory LRU store.
pub struct MemoryStore {
    entries: Mutex<LruCache<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create a store holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entries.lock().put(key.to_string(), value.to_vec());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Directory-backed store.
///
/// Each key maps to one file named by the CRC-32 of the key and its length,
/// sharded by the top checksum byte: `root/ab/ab12cd34-5f.json`. Names stay
/// short whatever the source id. The file starts with the full key
/// (`u32` LE length, then the bytes) so two keys sharing a name never read
/// each other's value; the later write replaces the earlier one.
///
/// Writes go to a temporary file in the store root and are renamed into
/// place, so a reader never observes a partially written value.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .map_err(|e| StoreError::OpenFailed(format!("{}: {e}", root.display())))?;
        debug!(root = %root.display(), "Opened intensity file store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let crc = crc32fast::hash(key.as_bytes());
        self.root
            .join(format!("{:02x}", crc >> 24))
            .join(entry_file_name(crc, key.len()))
    }
}

impl CacheStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let bytes = match fs::read(self.path_for(key)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let (stored_key, value) = split_entry(&bytes)
            .ok_or_else(|| StoreError::corrupt(key, "truncated entry header"))?;
        if stored_key != key.as_bytes() {
            debug!(key, "File store name shared with another key");
            return Ok(None);
        }
        Ok(Some(value.to_vec()))
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        if let Some(shard) = path.parent() {
            fs::create_dir_all(shard)?;
        }
        let key_len = u32::try_from(key.len())
            .map_err(|_| StoreError::corrupt(key, "key longer than 4 GiB"))?;

        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(&key_len.to_le_bytes())?;
        tmp.write_all(key.as_bytes())?;
        tmp.write_all(value)?;
        tmp.as_file().sync_data()?;
        tmp.persist(path)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

fn entry_file_name(crc: u32, key_len: usize) -> String {
    format!("{crc:08x}-{key_len:x}.json")
}

/// Split a stored entry into its key and value.
fn split_entry(bytes: &[u8]) -> Option<(&[u8], &[u8])> {
    let len_bytes: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
    let key_len = u32::from_le_bytes(len_bytes) as usize;
    let rest = &bytes[4..];
    if rest.len() < key_len {
        return None;
    }
    Some(rest.split_at(key_len))
}
