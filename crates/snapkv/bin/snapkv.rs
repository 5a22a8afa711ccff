//! snapkv server binary entry point.
//!
//! This is a thin wrapper around the snapkv library that:
//! 1. Initializes logging
//! 2. Parses and validates configuration
//! 3. Loads the snapshot and runs the server until shutdown
//!
//! Any error, including a failed shutdown drain, is returned from `main`
//! and the process exits with a non-zero status.

use anyhow::Result;
use snapkv::{Server, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_args();

    tracing::info!(
        "Configuration loaded: HTTP={}, control={}, data={:?}, interval={}s, grace={}s",
        config.http_bind,
        config.control_bind,
        config.data_file,
        config.sync_interval_secs,
        config.shutdown_grace_secs
    );

    config.validate()?;

    let server = Server::new(config)?;
    server.run().await?;

    tracing::info!("Server exiting");
    Ok(())
}
