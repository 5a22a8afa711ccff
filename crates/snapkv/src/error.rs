//! Error types for the key-value server.
//!
//! All errors use thiserror for consistent error handling across the codebase.
//! Store operations themselves are infallible; failures only arise at the
//! persistence, configuration and server-lifecycle boundaries.

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Snapshot persistence errors.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Existing snapshot could not be read
    #[error("Failed to read snapshot {path}: {source}")]
    ReadFailed {
        /// Path to the snapshot file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Existing snapshot is not a flat JSON object of strings
    #[error("Snapshot {path} is corrupt: {source}")]
    Corrupt {
        /// Path to the snapshot file
        path: PathBuf,
        /// Underlying decode error
        #[source]
        source: serde_json::Error,
    },

    /// Record set could not be encoded
    #[error("Failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),

    /// Writing or syncing the temporary file failed
    #[error("Failed to write temporary snapshot {path}: {source}")]
    WriteFailed {
        /// Path to the temporary file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Replacing the snapshot with the temporary file failed
    #[error("Failed to rename {from} to {to}: {source}")]
    RenameFailed {
        /// Temporary file path
        from: PathBuf,
        /// Snapshot file path
        to: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Blocking flush task panicked or was cancelled
    #[error("Flush task failed: {0}")]
    TaskFailed(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A duration setting was zero
    #[error("Invalid {name}: must be at least one second")]
    ZeroDuration {
        /// Name of the offending setting
        name: &'static str,
    },

    /// HTTP and control listeners would share an address
    #[error("HTTP and control listeners cannot share address {0}")]
    AddressConflict(SocketAddr),

    /// Directory holding the snapshot file does not exist
    #[error("Snapshot directory not found: {}", .0.display())]
    MissingDataDir(PathBuf),
}

/// Server runtime errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind HTTP server
    #[error("Failed to bind HTTP server to {addr}: {source}")]
    HttpBindFailed {
        /// Address that failed to bind
        addr: SocketAddr,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Failed to bind the shutdown control listener
    #[error("Failed to bind control listener to {addr}: {source}")]
    ControlBindFailed {
        /// Address that failed to bind
        addr: SocketAddr,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Persistence error (startup load)
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// HTTP server stopped with an error
    #[error("HTTP server error: {0}")]
    Http(String),

    /// In-flight requests did not finish within the grace period
    #[error("HTTP connections still open after {seconds}s grace period; forced close")]
    DrainTimeout {
        /// Grace period in seconds
        seconds: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_messages() {
        let err = ConfigError::ZeroDuration {
            name: "sync interval",
        };
        assert_eq!(
            err.to_string(),
            "Invalid sync interval: must be at least one second"
        );

        let err = ConfigError::MissingDataDir(PathBuf::from("/nope"));
        assert_eq!(err.to_string(), "Snapshot directory not found: /nope");
    }

    #[test]
    fn test_server_error_conversion() {
        let err = PersistenceError::TaskFailed("panicked".to_string());
        let server_err: ServerError = err.into();
        assert!(server_err.to_string().contains("Flush task failed"));
    }

    #[test]
    fn test_drain_timeout_message() {
        let err = ServerError::DrainTimeout { seconds: 5 };
        assert!(err.to_string().contains("5s grace period"));
    }
}
