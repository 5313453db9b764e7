//! Raw sorted key-value storage seam
//!
//! The write path hands fully encoded keys to a `RawKvStore`. The real engine
//! behind it is an external collaborator; `MemKvStore` is the in-process
//! implementation used by tests and embedded deployments:
//! - `BTreeMap<Vec<u8>, Vec<u8>>` for byte-lexicographic ordering
//! - `parking_lot::RwLock` for thread-safe access

use std::collections::BTreeMap;
use std::ops::Bound;

use parking_lot::RwLock;
use tabula_core::Result;
use tracing::debug;

/// Sorted byte-range storage consumed by the write path
pub trait RawKvStore: Send + Sync {
    /// Insert or overwrite one entry
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Point lookup
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// All entries whose key starts with `prefix`, in key order
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Remove every entry
    fn truncate(&self) -> Result<()>;
}

/// In-memory `RawKvStore`
#[derive(Debug, Default)]
pub struct MemKvStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemKvStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// True if the store holds no entries
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Snapshot of every key in order
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.data.read().keys().cloned().collect()
    }
}

impl RawKvStore for MemKvStore {
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let data = self.data.read();
        Ok(data
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn truncate(&self) -> Result<()> {
        let mut data = self.data.write();
        let removed = data.len();
        data.clear();
        debug!(removed, "Truncated in-memory store");
        Ok(())
    }
}
