//! Command Handler Module
//!
//! This module implements the commands EmberKV understands.
//! It validates decoded RESP arrays and dispatches them to the appropriate handlers.
//!
//! ## Supported Commands
//!
//! - `PING` - Test connection, replies `PONG`
//! - `ECHO message` - Echo message
//! - `SET key value` - Set a key
//! - `GET key` - Get a key's value
//! - `INFO` - Server information
//! - `QUIT` - Close the connection after replying `OK`
//!
//! ## Validation Order
//!
//! Each failed check produces an error reply; the connection stays open.
//!
//! 1. The request must be a non-null array
//! 2. The array must not be empty
//! 3. The first element must be a bulk string (the command name)
//! 4. The command name must be known (matched case-insensitively)
//! 5. The arguments must match the command's arity and be bulk strings

use crate::protocol::RespValue;
use crate::storage::StorageEngine;
use bytes::Bytes;
use std::sync::Arc;

/// Handles commands by dispatching them to the appropriate handlers.
#[derive(Clone, Debug)]
pub struct CommandHandler {
    /// The storage engine
    storage: Arc<StorageEngine>,
}

impl CommandHandler {
    /// Creates a new command handler with the given storage engine.
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self { storage }
    }

    /// Executes a command and returns the response.
    ///
    /// # Arguments
    ///
    /// * `command` - The decoded RESP value (should be an array of bulk strings)
    ///
    /// # Returns
    ///
    /// The RESP response to send back to the client. Invalid requests produce
    /// an error value, never a panic.
    pub fn execute(&self, command: &RespValue) -> RespValue {
        // Commands should be arrays
        let args = match command {
            RespValue::Array(Some(args)) => args,
            _ => return RespValue::error("ERR Protocol error: expected array"),
        };

        let Some((name, args)) = args.split_first() else {
            return RespValue::error("ERR empty command");
        };

        let cmd_name = match bulk_arg(name) {
            Some(name) => String::from_utf8_lossy(&name).to_uppercase(),
            None => return RespValue::error("ERR Protocol error: expected bulk string for command"),
        };

        // Dispatch to appropriate handler
        self.dispatch(&cmd_name, args)
    }

    /// Dispatches a command to its handler.
    fn dispatch(&self, cmd: &str, args: &[RespValue]) -> RespValue {
        match cmd {
            "PING" => RespValue::pong(),
            "ECHO" => self.cmd_echo(args),
            "SET" => self.cmd_set(args),
            "GET" => self.cmd_get(args),
            "INFO" => self.cmd_info(),
            "QUIT" => RespValue::ok(),

            // Unknown command
            _ => RespValue::error(format!("ERR unknown command '{}'", cmd)),
        }
    }

    /// ECHO message
    fn cmd_echo(&self, args: &[RespValue]) -> RespValue {
        let [message] = args else {
            return wrong_arity("echo");
        };

        match bulk_arg(message) {
            Some(msg) => RespValue::bulk_string(msg),
            None => RespValue::error("ERR Protocol error: expected bulk string for echo argument"),
        }
    }

    /// SET key value
    fn cmd_set(&self, args: &[RespValue]) -> RespValue {
        let [key, value] = args else {
            return wrong_arity("set");
        };

        let (Some(key), Some(value)) = (bulk_arg(key), bulk_arg(value)) else {
            return RespValue::error("ERR Protocol error: expected bulk string for key and value");
        };

        self.storage.set(key, value);
        RespValue::ok()
    }

    /// GET key
    fn cmd_get(&self, args: &[RespValue]) -> RespValue {
        let [key] = args else {
            return wrong_arity("get");
        };

        let Some(key) = bulk_arg(key) else {
            return RespValue::error("ERR Protocol error: expected bulk string for key");
        };

        match self.storage.get(&key) {
            Some(value) => RespValue::bulk_string(value),
            None => RespValue::null_bulk_string(),
        }
    }

    /// INFO
    fn cmd_info(&self) -> RespValue {
        let info = format!("# Server\r\nredis_version:{}\r\n", crate::VERSION);
        RespValue::bulk_string(Bytes::from(info))
    }
}

/// Returns true if `command` invokes QUIT, after which the connection closes.
pub fn is_quit(command: &RespValue) -> bool {
    command
        .as_array()
        .and_then(|args| args.first())
        .and_then(bulk_arg)
        .is_some_and(|name| name.eq_ignore_ascii_case(b"QUIT"))
}

/// Extracts the payload of a bulk string argument.
///
/// A null bulk string counts as an empty argument.
fn bulk_arg(value: &RespValue) -> Option<Bytes> {
    match value {
        RespValue::BulkString(data) => Some(data.clone().unwrap_or_default()),
        _ => None,
    }
}

fn wrong_arity(cmd: &str) -> RespValue {
    RespValue::error(format!(
        "ERR wrong number of arguments for '{}' command",
        cmd
    ))
}
