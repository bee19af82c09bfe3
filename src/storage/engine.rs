//! Thread-Safe Storage Engine
//!
//! This module implements the in-memory key-value map shared by every
//! client connection.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │            StorageEngine            │
//! │  ┌───────────────────────────────┐  │
//! │  │ RwLock<HashMap<Bytes, Bytes>> │  │
//! │  └───────────────────────────────┘  │
//! └─────────────────────────────────────┘
//! ```
//!
//! Any number of GETs hold the read lock together; a SET takes the write
//! lock and excludes every other GET and SET. Concurrent SETs of one key
//! leave whichever value acquired the lock last.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// The main storage engine for EmberKV.
///
/// This struct is designed to be wrapped in an `Arc` and shared across
/// all client handler tasks. All operations are thread-safe.
///
/// # Example
///
/// ```
/// use emberkv::storage::StorageEngine;
/// use bytes::Bytes;
///
/// let engine = StorageEngine::new();
///
/// engine.set(Bytes::from("name"), Bytes::from("Ariz"));
/// assert_eq!(engine.get(&Bytes::from("name")), Some(Bytes::from("Ariz")));
/// assert_eq!(engine.get(&Bytes::from("missing")), None);
/// ```
pub struct StorageEngine {
    data: RwLock<HashMap<Bytes, Bytes>>,

    /// Statistics: total GET operations
    get_count: AtomicU64,

    /// Statistics: total SET operations
    set_count: AtomicU64,
}

/// Snapshot of storage statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageStats {
    pub keys: u64,
    pub get_ops: u64,
    pub set_ops: u64,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("keys", &self.len())
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .field("set_count", &self.set_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    /// Creates a new, empty storage engine.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
        }
    }

    // A writer can only panic between map operations, never halfway through
    // one, so a poisoned map is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<Bytes, Bytes>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Bytes, Bytes>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets a key-value pair.
    ///
    /// If the key already exists, its value is overwritten.
    ///
    /// # Returns
    ///
    /// Returns `true` if a new key was created, `false` if an existing key was updated.
    pub fn set(&self, key: Bytes, value: Bytes) -> bool {
        self.set_count.fetch_add(1, Ordering::Relaxed);
        self.write().insert(key, value).is_none()
    }

    /// Gets the value for a key, or `None` if the key was never set.
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.get_count.fetch_add(1, Ordering::Relaxed);
        self.read().get(key).cloned()
    }

    /// Returns the number of keys.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns true if no key has been set.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Returns a snapshot of storage statistics.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.len() as u64,
            get_ops: self.get_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
        }
    }
}
