//! Storage Engine Module
//!
//! This module provides the shared key-value store for EmberKV: a single
//! `RwLock`-protected map from key bytes to value bytes. There is no expiry
//! and no persistence; the store lives exactly as long as the server process.
//!
//! ## Example
//!
//! ```
//! use emberkv::storage::StorageEngine;
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! // Create the storage engine, shared by all connections
//! let engine = Arc::new(StorageEngine::new());
//!
//! engine.set(Bytes::from("name"), Bytes::from("Ariz"));
//! assert_eq!(engine.get(b"name"), Some(Bytes::from("Ariz")));
//! ```

pub mod engine;

// Re-export commonly used types
pub use engine::{StorageEngine, StorageStats};
