//! In-memory key-value store served over HTTP.
//!
//! Records live in memory and are written to a single JSON snapshot file by a
//! background task. Snapshots are replaced atomically (temporary file, fsync,
//! rename), so the file on disk is always a complete snapshot.
//!
//! # Architecture
//!
//! - `store`: the record set behind a reader/writer lock, with a dirty flag
//! - `persistence`: snapshot loading and crash-safe flushing
//! - `scheduler`: periodic flush loop with a final flush on shutdown
//! - `shutdown`: signal and control-listener triggers, ordered shutdown
//! - `http`: `/set`, `/get` and `/count` endpoints
//! - `server`: wiring and lifecycle
//! - `config`: CLI / environment configuration
//!
//! # Example
//!
//! ```no_run
//! use snapkv::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     tracing_subscriber::fmt::init();
//!
//!     let config = ServerConfig::from_args();
//!     config.validate()?;
//!
//!     // Runs until SIGINT/SIGTERM or a connection to the control port.
//!     Server::new(config)?.run().await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod error;
pub mod http;
pub mod persistence;
pub mod scheduler;
pub mod server;
pub mod shutdown;
pub mod store;

pub use config::ServerConfig;
pub use error::{ConfigError, PersistenceError, ServerError};
pub use persistence::{FlushOutcome, Persister, SnapshotFile};
pub use scheduler::SyncScheduler;
pub use server::{AppState, Server};
pub use shutdown::{Phase, Shutdown, ShutdownSignal, Trigger};
pub use store::Store;
