//! Server configuration management.
//!
//! Configuration can be provided via:
//! - CLI arguments (`--http-bind`, `--control-bind`, etc.)
//! - Environment variables (`SNAPKV_HTTP_BIND`, etc.)
//! - Default values
//!
//! The defaults reproduce the fixed deployment: HTTP on 8080, the shutdown
//! control listener on 8081, `kvstore.json` in the working directory, a flush
//! every five seconds and a five second drain window.
//!
//! # Example
//!
//! ```no_run
//! use snapkv::ServerConfig;
//!
//! let config = ServerConfig::from_args();
//! config.validate().expect("Invalid configuration");
//!
//! println!("HTTP server will bind to: {}", config.http_bind);
//! println!("Snapshot file: {}", config.data_file.display());
//! ```

use crate::error::ConfigError;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration loaded from CLI args and environment variables.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "snapkv",
    about = "In-memory key-value store over HTTP with snapshot persistence",
    version
)]
pub struct ServerConfig {
    /// HTTP bind address
    #[arg(long, env = "SNAPKV_HTTP_BIND", default_value = "0.0.0.0:8080")]
    pub http_bind: SocketAddr,

    /// Control listener bind address; any connection triggers shutdown
    #[arg(long, env = "SNAPKV_CONTROL_BIND", default_value = "0.0.0.0:8081")]
    pub control_bind: SocketAddr,

    /// Snapshot file path
    #[arg(long, env = "SNAPKV_DATA_FILE", default_value = "kvstore.json")]
    pub data_file: PathBuf,

    /// Seconds between background flushes
    #[arg(long, env = "SNAPKV_SYNC_INTERVAL_SECS", default_value_t = 5)]
    pub sync_interval_secs: u64,

    /// Seconds to wait for in-flight requests during shutdown
    #[arg(long, env = "SNAPKV_SHUTDOWN_GRACE_SECS", default_value_t = 5)]
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            control_bind: SocketAddr::from(([0, 0, 0, 0], 8081)),
            data_file: PathBuf::from("kvstore.json"),
            sync_interval_secs: 5,
            shutdown_grace_secs: 5,
        }
    }
}

impl ServerConfig {
    /// Parse configuration from command-line arguments.
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Interval between background flushes.
    #[must_use]
    pub const fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    /// Grace period for draining HTTP connections on shutdown.
    #[must_use]
    pub const fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - the sync interval or grace period is zero
    /// - HTTP and control listeners use the same address
    /// - the snapshot's parent directory does not exist
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync_interval_secs == 0 {
            return Err(ConfigError::ZeroDuration {
                name: "sync interval",
            });
        }
        if self.shutdown_grace_secs == 0 {
            return Err(ConfigError::ZeroDuration {
                name: "shutdown grace period",
            });
        }

        // Port 0 asks the OS for a free port, so two such binds never collide.
        if self.http_bind == self.control_bind && self.http_bind.port() != 0 {
            return Err(ConfigError::AddressConflict(self.http_bind));
        }

        if let Some(parent) = self.data_file.parent()
            && !parent.as_os_str().is_empty()
            && !parent.is_dir()
        {
            return Err(ConfigError::MissingDataDir(parent.to_path_buf()));
        }

        Ok(())
    }
}
