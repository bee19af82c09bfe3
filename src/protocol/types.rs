//! RESP (Redis Serialization Protocol) Data Types
//!
//! This module defines the values that travel over the wire and how they
//! are serialized. Only the five RESP2 types are supported.
//!
//! ## Protocol Format
//!
//! Each RESP type starts with a type prefix byte:
//! - `+` Simple String
//! - `-` Error
//! - `:` Integer
//! - `$` Bulk String
//! - `*` Array
//!
//! Every header line is terminated with CRLF (`\r\n`).
//!
//! ## Examples
//!
//! Simple String: `+OK\r\n`
//! Error: `-ERR unknown command 'FOO'\r\n`
//! Integer: `:1000\r\n`
//! Bulk String: `$5\r\nhello\r\n`
//! Null Bulk String: `$-1\r\n`
//! Array: `*2\r\n$3\r\nGET\r\n$4\r\nname\r\n`
//! Null Array: `*-1\r\n`

use bytes::Bytes;
use std::fmt;

/// The CRLF terminator used in RESP protocol
pub const CRLF: &[u8] = b"\r\n";

/// RESP protocol type prefixes
pub mod prefix {
    pub const SIMPLE_STRING: u8 = b'+';
    pub const ERROR: u8 = b'-';
    pub const INTEGER: u8 = b':';
    pub const BULK_STRING: u8 = b'$';
    pub const ARRAY: u8 = b'*';
}

/// Length written in place of a size for null bulk strings and null arrays.
const NULL_LENGTH: &[u8] = b"-1";

/// Represents a value in the RESP protocol.
///
/// Bulk strings and arrays carry their null marker in an `Option`, so a
/// null bulk string (`$-1`) never compares equal to an empty one (`$0`),
/// and a null array (`*-1`) never compares equal to an empty one (`*0`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// Simple strings are used for short, non-binary-safe status replies.
    /// Format: `+<string>\r\n`
    SimpleString(String),

    /// Errors are similar to simple strings but indicate an error condition.
    /// Format: `-<error message>\r\n`
    Error(String),

    /// 64-bit signed integers.
    /// Format: `:<integer>\r\n`
    Integer(i64),

    /// Binary-safe strings. `None` is the null bulk string.
    /// Format: `$<length>\r\n<data>\r\n`, null: `$-1\r\n`
    BulkString(Option<Bytes>),

    /// Ordered sequence of values, possibly nested. `None` is the null array.
    /// Format: `*<count>\r\n<element1><element2>...`, null: `*-1\r\n`
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    /// Creates a new simple string value.
    ///
    /// # Example
    /// ```
    /// use emberkv::protocol::types::RespValue;
    /// let ok = RespValue::simple_string("OK");
    /// assert_eq!(ok.serialize(), b"+OK\r\n");
    /// ```
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    /// Creates a new error value.
    ///
    /// # Example
    /// ```
    /// use emberkv::protocol::types::RespValue;
    /// let err = RespValue::error("ERR empty command");
    /// assert!(err.is_error());
    /// ```
    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    /// Creates a new integer value.
    pub fn integer(n: i64) -> Self {
        RespValue::Integer(n)
    }

    /// Creates a new (non-null) bulk string.
    ///
    /// # Example
    /// ```
    /// use emberkv::protocol::types::RespValue;
    /// use bytes::Bytes;
    /// let bulk = RespValue::bulk_string(Bytes::from("hello"));
    /// assert_eq!(bulk.serialize(), b"$5\r\nhello\r\n");
    /// ```
    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(Some(data.into()))
    }

    /// Creates the null bulk string (`$-1`).
    pub fn null_bulk_string() -> Self {
        RespValue::BulkString(None)
    }

    /// Creates a (non-null) array.
    pub fn array(values: Vec<RespValue>) -> Self {
        RespValue::Array(Some(values))
    }

    /// Creates the null array (`*-1`).
    pub fn null_array() -> Self {
        RespValue::Array(None)
    }

    /// Common response for successful operations
    pub fn ok() -> Self {
        RespValue::SimpleString("OK".to_string())
    }

    /// Common response for PONG
    pub fn pong() -> Self {
        RespValue::SimpleString("PONG".to_string())
    }

    /// Serializes the RESP value to bytes for sending over the wire.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the RESP value into an existing buffer.
    ///
    /// This is more efficient than `serialize()` when you want to reuse a buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        match self {
            RespValue::SimpleString(s) => {
                buf.push(prefix::SIMPLE_STRING);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            RespValue::Error(s) => {
                buf.push(prefix::ERROR);
                buf.extend_from_slice(s.as_bytes());
                buf.extend_from_slice(CRLF);
            }
            RespValue::Integer(n) => {
                buf.push(prefix::INTEGER);
                buf.extend_from_slice(n.to_string().as_bytes());
                buf.extend_from_slice(CRLF);
            }
            RespValue::BulkString(None) => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(NULL_LENGTH);
                buf.extend_from_slice(CRLF);
            }
            RespValue::BulkString(Some(data)) => {
                buf.push(prefix::BULK_STRING);
                buf.extend_from_slice(data.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                buf.extend_from_slice(data);
                buf.extend_from_slice(CRLF);
            }
            RespValue::Array(None) => {
                buf.push(prefix::ARRAY);
                buf.extend_from_slice(NULL_LENGTH);
                buf.extend_from_slice(CRLF);
            }
            RespValue::Array(Some(values)) => {
                buf.push(prefix::ARRAY);
                buf.extend_from_slice(values.len().to_string().as_bytes());
                buf.extend_from_slice(CRLF);
                for value in values {
                    value.serialize_into(buf);
                }
            }
        }
    }

    /// Returns true for the null bulk string and the null array.
    pub fn is_null(&self) -> bool {
        matches!(self, RespValue::BulkString(None) | RespValue::Array(None))
    }

    /// Returns true if this value is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    /// Returns the payload of a non-null bulk string.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            RespValue::BulkString(Some(b)) => Some(b),
            _ => None,
        }
    }

    /// Returns the elements of a non-null array.
    pub fn as_array(&self) -> Option<&[RespValue]> {
        match self {
            RespValue::Array(Some(values)) => Some(values),
            _ => None,
        }
    }
}

/// Renders values the way `redis-cli` prints replies; used in trace logs.
impl fmt::Display for RespValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespValue::SimpleString(s) => write!(f, "\"{}\"", s),
            RespValue::Error(s) => write!(f, "(error) {}", s),
            RespValue::Integer(n) => write!(f, "(integer) {}", n),
            RespValue::BulkString(Some(data)) => {
                if let Ok(s) = std::str::from_utf8(data) {
                    write!(f, "\"{}\"", s.escape_debug())
                } else {
                    write!(f, "(binary data, {} bytes)", data.len())
                }
            }
            RespValue::BulkString(None) | RespValue::Array(None) => write!(f, "(nil)"),
            RespValue::Array(Some(values)) => {
                if values.is_empty() {
                    return write!(f, "(empty array)");
                }
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}) {}", i + 1, v)?;
                }
                Ok(())
            }
        }
    }
}
