//! TCP Server
//!
//! Accepts client connections and spawns one [`handle_connection`] task per
//! socket. Every task shares the same [`StorageEngine`] and [`ConnectionStats`].
//!
//! The accept loop runs until the supplied shutdown future resolves. Tasks
//! already spawned are not waited for; they end with the runtime.

use crate::commands::CommandHandler;
use crate::connection::{handle_connection, ConnectionStats};
use crate::storage::StorageEngine;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Serves clients from `listener` until `shutdown` completes.
pub async fn run(
    listener: TcpListener,
    storage: Arc<StorageEngine>,
    stats: Arc<ConnectionStats>,
    shutdown: impl Future<Output = ()>,
) {
    tokio::select! {
        _ = accept_loop(listener, storage, stats) => {}
        _ = shutdown => {
            info!("Shutdown signal received, stopping server...");
        }
    }
}

/// Main loop that accepts incoming connections
async fn accept_loop(
    listener: TcpListener,
    storage: Arc<StorageEngine>,
    stats: Arc<ConnectionStats>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                // Create a command handler for this connection
                let handler = CommandHandler::new(Arc::clone(&storage));
                let stats = Arc::clone(&stats);

                tokio::spawn(handle_connection(stream, addr, handler, stats));
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
