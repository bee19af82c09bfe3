//! EmberKV - A Minimal Redis-Compatible Key-Value Server
//!
//! This is the main entry point for the EmberKV server.
//! It parses the command line, sets up logging, binds the listener and
//! serves clients until Ctrl+C.

use anyhow::Context;
use emberkv::config::{parse_args, Config, Invocation};
use emberkv::connection::ConnectionStats;
use emberkv::storage::StorageEngine;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn print_help() {
    println!(
        r#"
EmberKV - A Minimal Redis-Compatible Key-Value Server

USAGE:
    emberkv [OPTIONS] [HOST] [PORT]

OPTIONS:
    -h, --host <HOST>    Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>    Port to listen on (default: 6379)
    -v, --version        Print version information
        --help           Print this help message

EXAMPLES:
    emberkv                        # Start on 127.0.0.1:6379
    emberkv --port 6380            # Start on port 6380
    emberkv 0.0.0.0 7000           # Listen on all interfaces, port 7000

CONNECTING:
    $ redis-cli -p 6379
    127.0.0.1:6379> PING
    PONG
    127.0.0.1:6379> SET name "Ariz"
    OK
    127.0.0.1:6379> GET name
    "Ariz"
"#
    );
}

fn print_banner(config: &Config) {
    println!(
        r#"
EmberKV v{} - Minimal Redis-Compatible Key-Value Server
──────────────────────────────────────────────────────────────
Server started on {}
Commands: PING, ECHO, SET, GET, INFO, QUIT

Use Ctrl+C to shutdown gracefully.
"#,
        emberkv::VERSION,
        config.bind_address()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = match parse_args(std::env::args().skip(1)) {
        Ok(Invocation::Serve(config)) => config,
        Ok(Invocation::Help) => {
            print_help();
            return Ok(());
        }
        Ok(Invocation::Version) => {
            println!("EmberKV version {}", emberkv::VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    // Set up logging, RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    print_banner(&config);

    // Create the storage engine (shared across all connections)
    let storage = Arc::new(StorageEngine::new());
    let stats = Arc::new(ConnectionStats::new());

    // Bind the TCP listener
    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;
    info!("Listening on {}", listener.local_addr()?);

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            // Never resolves, the server keeps running
            std::future::pending::<()>().await;
        }
    };

    emberkv::server::run(listener, Arc::clone(&storage), Arc::clone(&stats), shutdown).await;

    let store = storage.stats();
    info!(
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        commands = stats.commands_processed.load(Ordering::Relaxed),
        keys = store.keys,
        "Server shutdown complete"
    );
    Ok(())
}
