//! Simple snapkv server example.
//!
//! Runs a server on localhost with its snapshot in a temporary directory and
//! a one second flush interval.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example simple_server
//! ```
//!
//! Then test with:
//! ```bash
//! curl -X POST -d '{"key":"a","value":"1"}' http://localhost:8080/set
//! curl 'http://localhost:8080/get?key=a'
//! curl http://localhost:8080/count
//!
//! # Stop the server (final flush, then drain)
//! nc -z localhost 8081
//! ```

use anyhow::Result;
use snapkv::{Server, ServerConfig};
use tempfile::TempDir;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug")),
        )
        .init();

    let data_dir = TempDir::new()?;

    let config = ServerConfig {
        http_bind: "127.0.0.1:8080".parse()?,
        control_bind: "127.0.0.1:8081".parse()?,
        data_file: data_dir.path().join("kvstore.json"),
        sync_interval_secs: 1,
        shutdown_grace_secs: 5,
    };
    config.validate()?;

    let server = Server::new(config)?;

    tracing::info!("HTTP endpoints: http://127.0.0.1:8080/{{set,get,count}}");
    tracing::info!("Snapshot: {}", data_dir.path().join("kvstore.json").display());
    tracing::info!("Press Ctrl+C or connect to 127.0.0.1:8081 to stop");

    server.run().await?;

    Ok(())
}
