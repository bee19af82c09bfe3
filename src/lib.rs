//! # EmberKV - A Minimal Redis-Compatible Key-Value Server
//!
//! EmberKV speaks a subset of the Redis wire protocol (RESP2). It accepts
//! concurrent client connections, decodes requests, runs a small command set
//! against a shared in-memory map, and encodes replies in the same protocol.
//! Any Redis client, including `redis-cli`, can talk to it.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                             EmberKV                              │
//! │                                                                  │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐           │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │           │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │           │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘           │
//! │                            │                  │                  │
//! │                            ▼                  ▼                  │
//! │                     ┌─────────────┐    ┌───────────────────────┐ │
//! │                     │ RESP Codec  │    │    StorageEngine      │ │
//! │                     │             │    │ RwLock<HashMap<..>>   │ │
//! │                     └─────────────┘    └───────────────────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use emberkv::connection::ConnectionStats;
//! use emberkv::storage::StorageEngine;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let storage = Arc::new(StorageEngine::new());
//!     let stats = Arc::new(ConnectionStats::new());
//!     let listener = TcpListener::bind("127.0.0.1:6379").await.unwrap();
//!
//!     emberkv::server::run(listener, storage, stats, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await;
//! }
//! ```
//!
//! ## Supported Commands
//!
//! - `PING`
//! - `ECHO message`
//! - `SET key value`
//! - `GET key`
//! - `INFO`
//! - `QUIT`
//!
//! ## Module Overview
//!
//! - [`protocol`]: RESP value type, encoder and streaming decoder
//! - [`storage`]: Thread-safe key-value map
//! - [`commands`]: Request validation and command dispatch
//! - [`connection`]: Per-client request/reply loop
//! - [`server`]: Accept loop
//! - [`config`]: Command-line parsing

pub mod commands;
pub mod config;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use config::Config;
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{ParseError, RespParser, RespValue};
pub use storage::StorageEngine;

/// The default port EmberKV listens on (same as Redis)
pub const DEFAULT_PORT: u16 = 6379;

/// The default host EmberKV binds to
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of EmberKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
