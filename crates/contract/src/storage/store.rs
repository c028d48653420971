//! Backing key-value store and the invocation-scoped write cache.
//!
//! The backing store is exclusively owned by this layer. Each invocation
//! works against a [`StoreCache`], a copy-on-write pending layer over a
//! shared base, so concurrent read-only verification of other invocations
//! never observes uncommitted writes. Committing the pending set is a
//! single atomic step; dropping the cache discards it.

use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// An ordered key-value store.
///
/// `seek_prefix` must return entries in ascending key order; the contract
/// layer relies on this for deterministic scan results.
pub trait Store: Send + Sync {
    /// Gets the value stored under a key.
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Returns all entries whose key starts with `prefix`, ascending.
    fn seek_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)>;

    /// Stores a value under a key.
    fn put(&mut self, key: Vec<u8>, value: Vec<u8>);

    /// Removes a key.
    fn delete(&mut self, key: &[u8]);
}

/// A shared handle to a backing store.
pub type SharedStore = Arc<RwLock<dyn Store>>;

/// In-process ordered store backed by a BTree map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a shared handle around a fresh store.
    pub fn shared() -> SharedStore {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Returns the number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.get(key).cloned()
    }

    fn seek_prefix(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.entries
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.entries.insert(key, value);
    }

    fn delete(&mut self, key: &[u8]) {
        self.entries.remove(key);
    }
}

/// Copy-on-write pending layer over a shared base store.
///
/// Reads consult the pending set first and fall through to the base;
/// deletions are recorded as tombstones so they shadow base entries.
pub struct StoreCache {
    base: SharedStore,
    pending: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl StoreCache {
    /// Creates a cache over the given base store.
    pub fn new(base: SharedStore) -> Self {
        Self {
            base,
            pending: BTreeMap::new(),
        }
    }

    /// Gets a value, observing pending changes before the base.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.pending.get(key) {
            return Ok(entry.clone());
        }
        let base = self
            .base
            .read()
            .map_err(|e| Error::StorageError(format!("store lock poisoned: {}", e)))?;
        Ok(base.get(key))
    }

    /// Records a pending write.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.pending.insert(key, Some(value));
    }

    /// Records a pending deletion.
    pub fn delete(&mut self, key: Vec<u8>) {
        self.pending.insert(key, None);
    }

    /// Returns all visible entries under a prefix in ascending key order,
    /// merging pending changes over the base snapshot.
    pub fn seek_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut merged: BTreeMap<Vec<u8>, Option<Vec<u8>>> = BTreeMap::new();
        {
            let base = self
                .base
                .read()
                .map_err(|e| Error::StorageError(format!("store lock poisoned: {}", e)))?;
            for (key, value) in base.seek_prefix(prefix) {
                merged.insert(key, Some(value));
            }
        }
        for (key, entry) in self.pending.range(prefix.to_vec()..) {
            if !key.starts_with(prefix) {
                break;
            }
            merged.insert(key.clone(), entry.clone());
        }
        Ok(merged
            .into_iter()
            .filter_map(|(k, v)| v.map(|value| (k, value)))
            .collect())
    }

    /// Returns the number of pending changes.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Atomically applies the pending change set to the base store,
    /// consuming the cache.
    pub fn commit(self) -> Result<()> {
        let mut base = self
            .base
            .write()
            .map_err(|e| Error::StorageError(format!("store lock poisoned: {}", e)))?;
        for (key, entry) in self.pending {
            match entry {
                Some(value) => base.put(key, value),
                None => base.delete(&key),
            }
        }
        Ok(())
    }
}
