//! Command Handler Module
//!
//! This module implements the command processing layer for EmberKV.
//! It receives decoded RESP requests, executes them against the storage engine,
//! and returns the reply value.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  RESP Decoder   │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Validate     │
//! │  - Dispatch     │
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ StorageEngine   │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! `PING`, `ECHO`, `SET`, `GET`, `INFO`, `QUIT`

pub mod handler;

// Re-export the main command handler
pub use handler::{is_quit, CommandHandler};
