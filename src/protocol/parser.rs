//! Streaming RESP Decoder
//!
//! This module decodes RESP values directly from an async byte source.
//! The decoder pulls one header line at a time, so it only ever consumes the
//! bytes that belong to the value being decoded. Whatever follows (the next
//! request on the same connection) stays in the reader's buffer untouched.
//!
//! ## How the Decoder Works
//!
//! 1. Read a header line up to `\n` and drop a trailing `\r`.
//! 2. The first byte selects the type; the rest of the line is its header.
//! 3. Bulk strings then read exactly `<length>` payload bytes plus a line terminator.
//! 4. Arrays push a pending frame onto an explicit stack; each completed value
//!    is folded into the innermost pending array until the outermost one completes.
//!
//! Using a stack instead of recursion keeps the decoder a plain state machine.
//! Nesting is still capped at [`MAX_NESTING_DEPTH`], because dropping,
//! printing and encoding a value all recurse once per level.
//!
//! ## End of Stream
//!
//! End of stream before the first byte of a value is [`ParseError::ConnectionClosed`]
//! (an orderly disconnect). End of stream anywhere inside a value is
//! [`ParseError::UnexpectedEof`].

use crate::protocol::types::{prefix, RespValue};
use bytes::Bytes;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Errors that can occur while decoding RESP data.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The stream ended cleanly between values
    #[error("connection closed")]
    ConnectionClosed,

    /// The stream ended in the middle of a value
    #[error("unexpected end of stream")]
    UnexpectedEof,

    /// A header line had no type prefix
    #[error("empty line")]
    EmptyLine,

    /// Unknown type prefix byte
    #[error("unknown RESP type: '{0}'")]
    UnknownPrefix(char),

    /// Invalid integer format
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Invalid UTF-8 in a simple string or error message
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// Bulk string length is not a number, or is negative but not -1
    #[error("invalid bulk string length: {0}")]
    InvalidBulkLength(String),

    /// Array count is not a number, or is negative but not -1
    #[error("invalid array length: {0}")]
    InvalidArrayLength(String),

    /// Bulk string payload was not followed by a line terminator
    #[error("bulk string missing trailing CRLF")]
    MissingTerminator,

    /// A header line exceeded the maximum length
    #[error("line too long (max: {max} bytes)")]
    LineTooLong { max: usize },

    /// The bulk string exceeds maximum allowed size
    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// Arrays nested deeper than the maximum
    #[error("nesting too deep (max: {max} levels)")]
    NestingTooDeep { max: usize },

    /// An element of an array failed to decode
    #[error("failed to parse array element {index}: {source}")]
    ArrayElement {
        index: usize,
        source: Box<ParseError>,
    },

    /// The underlying reader failed
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

impl ParseError {
    /// Returns true if the byte stream is gone, so no reply can be delivered.
    pub fn is_disconnect(&self) -> bool {
        match self {
            ParseError::ConnectionClosed | ParseError::UnexpectedEof | ParseError::Io(_) => true,
            ParseError::ArrayElement { source, .. } => source.is_disconnect(),
            _ => false,
        }
    }

    /// Returns true if the connection cannot be resynchronized after this error.
    pub fn is_fatal(&self) -> bool {
        match self {
            ParseError::LineTooLong { .. }
            | ParseError::MessageTooLarge { .. }
            | ParseError::NestingTooDeep { .. } => true,
            ParseError::ArrayElement { source, .. } => source.is_fatal(),
            other => other.is_disconnect(),
        }
    }
}

impl From<io::Error> for ParseError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            ParseError::UnexpectedEof
        } else {
            ParseError::Io(err)
        }
    }
}

/// Result type for decoding operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Maximum size for a single bulk string (512 MB, same as Redis)
pub const MAX_BULK_SIZE: usize = 512 * 1024 * 1024;

/// Maximum length of a header line, excluding the terminator
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Maximum number of arrays open at once while decoding one value
pub const MAX_NESTING_DEPTH: usize = 512;

/// Upper bound on capacity reserved up front from a declared length.
const MAX_PREALLOC: usize = 1024;

/// An array whose elements are still being decoded.
#[derive(Debug)]
struct PendingArray {
    len: usize,
    items: Vec<RespValue>,
}

impl PendingArray {
    fn with_len(len: usize) -> Self {
        Self {
            len,
            items: Vec::with_capacity(len.min(MAX_PREALLOC)),
        }
    }
}

/// What a header line turned out to be.
enum Header {
    /// A complete value (scalars, bulk strings, null and empty arrays)
    Value(RespValue),
    /// A non-empty array whose elements follow
    Array(usize),
}

/// A streaming RESP decoder.
///
/// The decoder keeps its line buffer and array stack between calls so a
/// long-lived connection reuses the allocations.
///
/// # Example
///
/// ```
/// use emberkv::protocol::{RespParser, RespValue};
///
/// # tokio_test::block_on(async {
/// let mut src: &[u8] = b"*1\r\n$4\r\nPING\r\n+rest\r\n";
/// let mut parser = RespParser::new();
///
/// let value = parser.decode(&mut src).await.unwrap();
/// assert_eq!(value, RespValue::array(vec![RespValue::bulk_string("PING")]));
/// assert_eq!(src, &b"+rest\r\n"[..]);
/// # });
/// ```
#[derive(Debug, Default)]
pub struct RespParser {
    /// Scratch buffer for the current header line
    line: Vec<u8>,
    /// Arrays still collecting elements, outermost first
    stack: Vec<PendingArray>,
}

impl RespParser {
    /// Creates a new decoder instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes exactly one RESP value from `src`.
    ///
    /// Errors inside arrays are wrapped in [`ParseError::ArrayElement`], once per
    /// nesting level, innermost index first.
    pub async fn decode<R>(&mut self, src: &mut R) -> ParseResult<RespValue>
    where
        R: AsyncBufRead + Unpin + ?Sized,
    {
        self.stack.clear();

        match self.decode_frames(src).await {
            Ok(value) => Ok(value),
            Err(err) => Err(self
                .stack
                .drain(..)
                .rev()
                .fold(err, |source, pending| ParseError::ArrayElement {
                    index: pending.items.len(),
                    source: Box::new(source),
                })),
        }
    }

    async fn decode_frames<R>(&mut self, src: &mut R) -> ParseResult<RespValue>
    where
        R: AsyncBufRead + Unpin + ?Sized,
    {
        'frames: loop {
            let at_boundary = self.stack.is_empty();
            let mut value = match read_header(src, &mut self.line, at_boundary).await? {
                Header::Value(value) => value,
                Header::Array(len) => {
                    if self.stack.len() >= MAX_NESTING_DEPTH {
                        return Err(ParseError::NestingTooDeep {
                            max: MAX_NESTING_DEPTH,
                        });
                    }
                    self.stack.push(PendingArray::with_len(len));
                    continue;
                }
            };

            // Fold the finished value into its parents
            while let Some(pending) = self.stack.last_mut() {
                pending.items.push(value);
                if pending.items.len() < pending.len {
                    continue 'frames;
                }
                value = RespValue::Array(Some(std::mem::take(&mut pending.items)));
                self.stack.pop();
            }

            return Ok(value);
        }
    }
}

/// Helper function to decode a single RESP value with a fresh decoder.
pub async fn decode<R>(src: &mut R) -> ParseResult<RespValue>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    RespParser::new().decode(src).await
}

/// Reads one header line and, for bulk strings, its payload.
async fn read_header<R>(src: &mut R, line: &mut Vec<u8>, at_boundary: bool) -> ParseResult<Header>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    if !read_line(src, line).await? {
        return Err(if at_boundary {
            ParseError::ConnectionClosed
        } else {
            ParseError::UnexpectedEof
        });
    }

    let (&tag, rest) = line.split_first().ok_or(ParseError::EmptyLine)?;

    match tag {
        prefix::SIMPLE_STRING => Ok(Header::Value(RespValue::SimpleString(
            utf8(rest)?.to_string(),
        ))),
        prefix::ERROR => Ok(Header::Value(RespValue::Error(utf8(rest)?.to_string()))),
        prefix::INTEGER => {
            let s = utf8(rest)?;
            let n: i64 = s
                .parse()
                .map_err(|_| ParseError::InvalidInteger(s.to_string()))?;
            Ok(Header::Value(RespValue::Integer(n)))
        }
        prefix::BULK_STRING => {
            let length = match parse_length(rest) {
                Some(-1) => return Ok(Header::Value(RespValue::BulkString(None))),
                Some(n) => usize::try_from(n).ok(),
                None => None,
            }
            .ok_or_else(|| ParseError::InvalidBulkLength(lossy(rest)))?;

            if length > MAX_BULK_SIZE {
                return Err(ParseError::MessageTooLarge {
                    size: length,
                    max: MAX_BULK_SIZE,
                });
            }

            let data = read_payload(src, length).await?;
            Ok(Header::Value(RespValue::BulkString(Some(data))))
        }
        prefix::ARRAY => {
            let count = match parse_length(rest) {
                Some(-1) => return Ok(Header::Value(RespValue::Array(None))),
                Some(n) => usize::try_from(n).ok(),
                None => None,
            }
            .ok_or_else(|| ParseError::InvalidArrayLength(lossy(rest)))?;

            if count == 0 {
                return Ok(Header::Value(RespValue::Array(Some(Vec::new()))));
            }
            Ok(Header::Array(count))
        }
        other => Err(ParseError::UnknownPrefix(char::from(other))),
    }
}

/// Reads a line into `line` without its `\n` / `\r\n` terminator.
///
/// Returns `Ok(false)` if the stream was already at its end.
async fn read_line<R>(src: &mut R, line: &mut Vec<u8>) -> ParseResult<bool>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    line.clear();

    // Room for the longest allowed line plus "\r\n"
    let limit = (MAX_LINE_LENGTH + 2) as u64;
    let mut limited = (&mut *src).take(limit);
    let n = limited.read_until(b'\n', line).await?;

    if n == 0 {
        return Ok(false);
    }
    if line.last() != Some(&b'\n') {
        if n as u64 == limit {
            return Err(ParseError::LineTooLong {
                max: MAX_LINE_LENGTH,
            });
        }
        return Err(ParseError::UnexpectedEof);
    }

    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    // The limit above leaves room for "\r\n", so a bare "\n" line can be one byte over
    if line.len() > MAX_LINE_LENGTH {
        return Err(ParseError::LineTooLong {
            max: MAX_LINE_LENGTH,
        });
    }
    Ok(true)
}

/// Reads exactly `length` payload bytes followed by a line terminator.
async fn read_payload<R>(src: &mut R, length: usize) -> ParseResult<Bytes>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    // Grow with the data actually received rather than trusting the header
    let mut data = Vec::with_capacity(length.min(MAX_PREALLOC * 64));
    (&mut *src).take(length as u64).read_to_end(&mut data).await?;
    if data.len() < length {
        return Err(ParseError::UnexpectedEof);
    }

    let mut byte = src.read_u8().await?;
    if byte == b'\r' {
        byte = src.read_u8().await?;
    }
    if byte != b'\n' {
        return Err(ParseError::MissingTerminator);
    }

    Ok(Bytes::from(data))
}

fn parse_length(text: &[u8]) -> Option<i64> {
    std::str::from_utf8(text).ok()?.parse().ok()
}

fn utf8(bytes: &[u8]) -> ParseResult<&str> {
    std::str::from_utf8(bytes).map_err(|e| ParseError::InvalidUtf8(e.to_string()))
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    async fn decode_all(mut input: &[u8]) -> ParseResult<RespValue> {
        decode(&mut input).await
    }

    #[tokio::test]
    async fn test_decode_simple_string() {
        let value = decode_all(b"+OK\r\n").await.unwrap();
        assert_eq!(value, RespValue::SimpleString("OK".to_string()));
    }

    #[tokio::test]
    async fn test_decode_error() {
        let value = decode_all(b"-ERR unknown command\r\n").await.unwrap();
        assert_eq!(value, RespValue::Error("ERR unknown command".to_string()));
    }

    #[tokio::test]
    async fn test_decode_integer() {
        assert_eq!(decode_all(b":1000\r\n").await.unwrap(), RespValue::Integer(1000));
        assert_eq!(decode_all(b":-42\r\n").await.unwrap(), RespValue::Integer(-42));
    }

    #[tokio::test]
    async fn test_decode_invalid_integer() {
        let result = decode_all(b":not_a_number\r\n").await;
        assert!(matches!(result, Err(ParseError::InvalidInteger(ref s)) if s == "not_a_number"));
    }

    #[tokio::test]
    async fn test_decode_bulk_string() {
        let value = decode_all(b"$5\r\nhello\r\n").await.unwrap();
        assert_eq!(value, RespValue::bulk_string(Bytes::from("hello")));
    }

    #[tokio::test]
    async fn test_decode_null_and_empty_bulk_string() {
        let null = decode_all(b"$-1\r\n").await.unwrap();
        assert_eq!(null, RespValue::BulkString(None));
        assert!(null.is_null());

        let empty = decode_all(b"$0\r\n\r\n").await.unwrap();
        assert_eq!(empty, RespValue::BulkString(Some(Bytes::new())));
        assert!(!empty.is_null());
    }

    #[tokio::test]
    async fn test_binary_safe_bulk_string() {
        let value = decode_all(b"$7\r\nhe\r\nl\x00o\r\n").await.unwrap();
        assert_eq!(
            value,
            RespValue::bulk_string(Bytes::from(&b"he\r\nl\x00o"[..]))
        );
    }

    #[tokio::test]
    async fn test_truncated_bulk_string() {
        let result = decode_all(b"$5\r\nabc").await;
        assert!(matches!(result, Err(ParseError::UnexpectedEof)));
    }

    #[tokio::test]
    async fn test_bulk_string_missing_terminator() {
        let result = decode_all(b"$3\r\nabcX\r\n").await;
        assert!(matches!(result, Err(ParseError::MissingTerminator)));
    }

    #[tokio::test]
    async fn test_invalid_bulk_length() {
        let result = decode_all(b"$abc\r\n").await;
        assert!(matches!(result, Err(ParseError::InvalidBulkLength(ref s)) if s == "abc"));

        let result = decode_all(b"$-2\r\n").await;
        assert!(matches!(result, Err(ParseError::InvalidBulkLength(_))));
    }

    #[tokio::test]
    async fn test_bulk_string_too_large() {
        let result = decode_all(b"$999999999999\r\n").await;
        assert!(matches!(result, Err(ParseError::MessageTooLarge { .. })));
        assert!(result.unwrap_err().is_fatal());
    }

    #[tokio::test]
    async fn test_decode_array() {
        let value = decode_all(b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n").await.unwrap();
        assert_eq!(
            value,
            RespValue::array(vec![
                RespValue::bulk_string(Bytes::from("GET")),
                RespValue::bulk_string(Bytes::from("name")),
            ])
        );
    }

    #[tokio::test]
    async fn test_decode_null_and_empty_array() {
        assert_eq!(decode_all(b"*-1\r\n").await.unwrap(), RespValue::Array(None));
        assert_eq!(
            decode_all(b"*0\r\n").await.unwrap(),
            RespValue::Array(Some(vec![]))
        );
    }

    #[tokio::test]
    async fn test_decode_nested_array() {
        let value = decode_all(b"*3\r\n:1\r\n*2\r\n:2\r\n*0\r\n$-1\r\n").await.unwrap();
        assert_eq!(
            value,
            RespValue::array(vec![
                RespValue::Integer(1),
                RespValue::array(vec![RespValue::Integer(2), RespValue::array(vec![])]),
                RespValue::null_bulk_string(),
            ])
        );
    }

    /// Follows `ArrayElement` wrappers down to the error that caused them.
    fn root_cause(mut err: &ParseError) -> &ParseError {
        while let ParseError::ArrayElement { source, .. } = err {
            err = &**source;
        }
        err
    }

    #[tokio::test]
    async fn test_nesting_at_limit() {
        let depth = MAX_NESTING_DEPTH;
        let mut input = b"*1\r\n".repeat(depth);
        input.extend_from_slice(b":7\r\n");

        let mut value = decode_all(&input).await.unwrap();
        for _ in 0..depth {
            value = match value {
                RespValue::Array(Some(mut items)) if items.len() == 1 => items.remove(0),
                other => panic!("unexpected value: {:?}", other),
            };
        }
        assert_eq!(value, RespValue::Integer(7));
    }

    #[tokio::test]
    async fn test_nesting_past_limit() {
        let mut input = b"*1\r\n".repeat(MAX_NESTING_DEPTH + 1);
        input.extend_from_slice(b":7\r\n");

        let err = decode_all(&input).await.unwrap_err();
        assert!(matches!(
            root_cause(&err),
            ParseError::NestingTooDeep { max: MAX_NESTING_DEPTH }
        ));
        assert!(err.is_fatal());
        assert!(!err.is_disconnect());
    }

    #[tokio::test]
    async fn test_hostile_nesting_is_rejected_early() {
        let mut input = b"*1\r\n".repeat(200_000);
        input.extend_from_slice(b":x\r\n");
        let mut src: &[u8] = &input;

        let err = decode(&mut src).await.unwrap_err();
        assert!(matches!(root_cause(&err), ParseError::NestingTooDeep { .. }));

        // Only the headers up to the limit were consumed
        assert_eq!(src.len(), input.len() - 4 * (MAX_NESTING_DEPTH + 1));

        // Rendering the reply text must not exhaust the stack
        let message = format!("ERR Protocol error: {}", err);
        assert!(message.ends_with("nesting too deep (max: 512 levels)"));
        drop(err);
    }

    #[tokio::test]
    async fn test_bare_newline_terminators() {
        let value = decode_all(b"*2\n$4\nECHO\n$2\nhi\n").await.unwrap();
        assert_eq!(
            value,
            RespValue::array(vec![RespValue::bulk_string("ECHO"), RespValue::bulk_string("hi")])
        );
    }

    #[tokio::test]
    async fn test_unknown_prefix_and_empty_line() {
        assert!(matches!(
            decode_all(b"@invalid\r\n").await,
            Err(ParseError::UnknownPrefix('@'))
        ));
        assert!(matches!(decode_all(b"\r\n").await, Err(ParseError::EmptyLine)));
    }

    #[tokio::test]
    async fn test_end_of_stream_classification() {
        let closed = decode_all(b"").await.unwrap_err();
        assert!(matches!(closed, ParseError::ConnectionClosed));

        let partial_line = decode_all(b"+OK").await.unwrap_err();
        assert!(matches!(partial_line, ParseError::UnexpectedEof));

        // EOF before the second element is mid-frame, not a clean close
        let mid_array = decode_all(b"*2\r\n$1\r\na\r\n").await.unwrap_err();
        assert!(matches!(
            mid_array,
            ParseError::ArrayElement { index: 1, ref source } if matches!(**source, ParseError::UnexpectedEof)
        ));
        assert!(mid_array.is_disconnect());
    }

    #[tokio::test]
    async fn test_array_element_error_is_annotated() {
        let err = decode_all(b"*2\r\n:1\r\n*2\r\n:2\r\n:x\r\n").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to parse array element 1: failed to parse array element 1: invalid integer: x"
        );
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn test_line_too_long() {
        let mut input = vec![b'+'; MAX_LINE_LENGTH + 10];
        input.extend_from_slice(b"\r\n");
        let err = decode_all(&input).await.unwrap_err();
        assert!(matches!(err, ParseError::LineTooLong { .. }));
        assert!(err.is_fatal());
        assert!(!err.is_disconnect());
    }

    #[tokio::test]
    async fn test_line_length_limit_is_exact() {
        // One byte over the limit, terminated by a bare "\n"
        let mut input = vec![b'+'];
        input.extend(std::iter::repeat(b'a').take(MAX_LINE_LENGTH));
        input.push(b'\n');
        let err = decode_all(&input).await.unwrap_err();
        assert!(matches!(err, ParseError::LineTooLong { max: MAX_LINE_LENGTH }));

        // Exactly at the limit with either terminator
        let mut input = vec![b'+'];
        input.extend(std::iter::repeat(b'a').take(MAX_LINE_LENGTH - 1));
        let mut crlf = input.clone();
        crlf.extend_from_slice(b"\r\n");
        input.push(b'\n');
        assert!(decode_all(&input).await.is_ok());
        assert!(decode_all(&crlf).await.is_ok());
    }

    #[tokio::test]
    async fn test_back_to_back_values() {
        let mut src: &[u8] = b"*1\r\n$4\r\nPING\r\n$3\r\nfoo\r\n:5\r\n";
        let mut parser = RespParser::new();

        assert_eq!(
            parser.decode(&mut src).await.unwrap(),
            RespValue::array(vec![RespValue::bulk_string("PING")])
        );
        assert_eq!(
            parser.decode(&mut src).await.unwrap(),
            RespValue::bulk_string("foo")
        );
        assert_eq!(parser.decode(&mut src).await.unwrap(), RespValue::Integer(5));
        assert!(matches!(
            parser.decode(&mut src).await,
            Err(ParseError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_decoder_recovers_after_error() {
        let mut src: &[u8] = b"*1\r\n:oops\r\n+OK\r\n";
        let mut parser = RespParser::new();

        assert!(parser.decode(&mut src).await.is_err());
        assert_eq!(
            parser.decode(&mut src).await.unwrap(),
            RespValue::simple_string("OK")
        );
    }

    #[tokio::test]
    async fn test_decode_across_partial_reads() {
        let mock = tokio_test::io::Builder::new()
            .read(b"*3\r\n$3\r\nSE")
            .read(b"T\r\n$4\r\nuser\r\n$")
            .read(b"4\r\nAriz\r\n")
            .build();
        let mut reader = BufReader::new(mock);

        let value = decode(&mut reader).await.unwrap();
        assert_eq!(
            value,
            RespValue::array(vec![
                RespValue::bulk_string("SET"),
                RespValue::bulk_string("user"),
                RespValue::bulk_string("Ariz"),
            ])
        );
    }

    #[tokio::test]
    async fn test_roundtrip() {
        let values = vec![
            RespValue::simple_string("OK"),
            RespValue::error("ERR something"),
            RespValue::integer(i64::MIN),
            RespValue::bulk_string(Bytes::new()),
            RespValue::null_bulk_string(),
            RespValue::array(vec![]),
            RespValue::null_array(),
            RespValue::array(vec![
                RespValue::bulk_string(Bytes::from_static(b"\r\n\x00")),
                RespValue::array(vec![RespValue::null_array(), RespValue::array(vec![])]),
                RespValue::null_bulk_string(),
                RespValue::integer(-1),
            ]),
        ];

        for original in values {
            let serialized = original.serialize();
            let parsed = decode_all(&serialized).await.unwrap();
            assert_eq!(original, parsed);
        }
    }
}
