//! RESP Protocol Implementation
//!
//! This module implements the RESP2 subset spoken by EmberKV.
//!
//! ## Modules
//!
//! - `types`: Defines the `RespValue` enum and serialization
//! - `parser`: Streaming decoder reading values from an async byte source
//!
//! ## Example
//!
//! ```
//! use emberkv::protocol::{decode, RespValue};
//!
//! # tokio_test::block_on(async {
//! // Decoding a request
//! let mut data: &[u8] = b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n";
//! let request = decode(&mut data).await.unwrap();
//! assert_eq!(request.as_array().map(|args| args.len()), Some(2));
//!
//! // Creating responses
//! let response = RespValue::bulk_string("Ariz");
//! assert_eq!(response.serialize(), b"$4\r\nAriz\r\n");
//! # });
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{decode, ParseError, ParseResult, RespParser};
pub use types::RespValue;
