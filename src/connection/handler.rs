//! Connection Handler Module
//!
//! This module handles individual client connections to EmberKV.
//! Each client gets its own handler task that runs in a loop,
//! reading commands and sending responses.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Decode one request      │ │
//!    │  └───────────┬─────────────┘ │
//!    │              │               │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Execute command         │ │
//!    │  └───────────┬─────────────┘ │
//!    │              │               │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Send and flush response │ │
//!    │  └───────────┬─────────────┘ │
//!    │              │               │
//!    │              ▼               │
//!    │     [Loop back / QUIT]       │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. Client disconnects / QUIT / fatal error
//!        │
//!        ▼
//! 5. Handler task ends, socket dropped
//! ```
//!
//! Requests are served strictly one at a time: a reply is flushed before the
//! next request is decoded, so replies can never be reordered.
//!
//! ## Errors
//!
//! - A malformed frame gets a `-ERR Protocol error: ...` reply and the loop continues.
//! - A frame that cannot be resynchronized (oversized line or bulk, or arrays nested
//!   too deeply) gets the same reply, then the connection closes.
//! - End of stream and I/O failures close the connection without a reply.

use crate::commands::{is_quit, CommandHandler};
use crate::protocol::{ParseError, RespParser, RespValue};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info, trace, warn};

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Total malformed frames received
    pub protocol_errors: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Handler over the two halves of an accepted TCP socket.
pub type TcpConnectionHandler = ConnectionHandler<BufReader<OwnedReadHalf>, BufWriter<OwnedWriteHalf>>;

/// Handles a single client connection.
///
/// This struct owns the buffered read and write halves of one client's
/// stream, plus the decoder state for that stream.
pub struct ConnectionHandler<R, W> {
    /// Buffered source of request bytes
    reader: R,

    /// Buffered sink for reply bytes
    writer: W,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// The command handler (shares the storage engine)
    command_handler: CommandHandler,

    /// RESP decoder
    parser: RespParser,

    /// Reply serialization buffer
    out: Vec<u8>,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl TcpConnectionHandler {
    /// Creates a new connection handler for an accepted socket.
    ///
    /// # Arguments
    ///
    /// * `stream` - The TCP stream for this connection
    /// * `addr` - The client's socket address
    /// * `command_handler` - The command handler for executing commands
    /// * `stats` - Shared connection statistics
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        let (read_half, write_half) = stream.into_split();
        Self::from_parts(
            BufReader::new(read_half),
            BufWriter::new(write_half),
            addr,
            command_handler,
            stats,
        )
    }
}

impl<R, W> ConnectionHandler<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Creates a handler over an arbitrary buffered reader and writer.
    pub fn from_parts(
        reader: R,
        writer: W,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            reader,
            writer,
            addr,
            command_handler,
            parser: RespParser::new(),
            out: Vec::with_capacity(256),
            stats,
        }
    }

    /// Runs the main connection loop.
    ///
    /// Returns `Ok(())` when the client disconnects between requests or sends
    /// QUIT, and an error when the connection ends any other way.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected"),
            Err(ConnectionError::ParseError(e)) if e.is_disconnect() => {
                warn!(client = %self.addr, error = %e, "Client disconnected mid-request")
            }
            Err(ConnectionError::IoError(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection error"),
        }

        self.stats.connection_closed();
        result
    }

    /// The main decode-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            let request = match self.parser.decode(&mut self.reader).await {
                Ok(request) => request,
                Err(ParseError::ConnectionClosed) => return Ok(()),
                Err(e) if e.is_disconnect() => return Err(e.into()),
                Err(e) => {
                    warn!(client = %self.addr, error = %e, "Protocol error");
                    self.stats.protocol_error();

                    let reply = RespValue::error(format!("ERR Protocol error: {}", e));
                    self.send_response(&reply).await?;

                    if e.is_fatal() {
                        return Err(e.into());
                    }
                    continue;
                }
            };

            debug!(client = %self.addr, command = %request, "Received command");

            let response = self.command_handler.execute(&request);
            self.stats.command_processed();

            self.send_response(&response).await?;

            if is_quit(&request) {
                return Ok(());
            }
        }
    }

    /// Sends a response to the client.
    async fn send_response(&mut self, response: &RespValue) -> Result<(), ConnectionError> {
        self.out.clear();
        response.serialize_into(&mut self.out);

        self.writer.write_all(&self.out).await?;
        self.writer.flush().await?;

        self.stats.bytes_written(self.out.len());
        trace!(
            client = %self.addr,
            bytes = self.out.len(),
            "Sent response"
        );
        Ok(())
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error while writing a reply
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Truncated or unrecoverable RESP input
    #[error("Parse error: {0}")]
    ParseError(#[from] ParseError),
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion. The socket is released when it returns.
///
/// # Arguments
///
/// * `stream` - The TCP stream for this connection
/// * `addr` - The client's socket address
/// * `command_handler` - The command handler for executing commands
/// * `stats` - Shared connection statistics
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
) {
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats);
    // Outcome is already logged by `run`
    let _ = handler.run().await;
}
