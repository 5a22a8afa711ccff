//! Server state management and orchestration.
//!
//! Wires the store, persistence, sync scheduler, HTTP server and shutdown
//! triggers together and runs them until shutdown completes.

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::persistence::Persister;
use crate::scheduler::SyncScheduler;
use crate::shutdown::{Coordinator, Shutdown, listen_for_signals, watch_control_listener};
use crate::store::Store;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Shared application state for HTTP handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Key-value store
    store: Arc<Store>,
}

impl AppState {
    /// Create state around `store`.
    #[must_use]
    pub const fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Get reference to the store.
    #[must_use]
    pub const fn store(&self) -> &Arc<Store> {
        &self.store
    }
}

/// Server orchestration.
pub struct Server {
    config: ServerConfig,
    persister: Arc<Persister>,
    shutdown: Arc<Shutdown>,
}

impl Server {
    /// Create new server with configuration.
    ///
    /// Loads the snapshot into a fresh store.
    ///
    /// # Errors
    ///
    /// Returns `ServerError` if an existing snapshot cannot be read or decoded.
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        tracing::info!("Loading snapshot from {}", config.data_file.display());

        let persister = Persister::open(&config.data_file)?;

        tracing::info!(
            "Server initialized with {} records",
            persister.store().count()
        );

        Ok(Self {
            config,
            persister: Arc::new(persister),
            shutdown: Arc::new(Shutdown::new()),
        })
    }

    /// The store served by this server.
    #[must_use]
    pub fn store(&self) -> &Arc<Store> {
        self.persister.store()
    }

    /// The persister flushing the store.
    #[must_use]
    pub const fn persister(&self) -> &Arc<Persister> {
        &self.persister
    }

    /// Shutdown gate; triggering it stops the server like a signal would.
    #[must_use]
    pub fn shutdown_handle(&self) -> Arc<Shutdown> {
        Arc::clone(&self.shutdown)
    }

    /// Bind the configured addresses and run until shutdown.
    ///
    /// # Errors
    ///
    /// Returns `ServerError` if binding fails or shutdown cannot complete
    /// cleanly.
    pub async fn run(self) -> Result<(), ServerError> {
        let http_bind = self.config.http_bind;
        let control_bind = self.config.control_bind;

        let http = TcpListener::bind(http_bind)
            .await
            .map_err(|source| ServerError::HttpBindFailed {
                addr: http_bind,
                source,
            })?;

        let control = TcpListener::bind(control_bind).await.map_err(|source| {
            ServerError::ControlBindFailed {
                addr: control_bind,
                source,
            }
        })?;

        self.run_with_listeners(http, control).await
    }

    /// Run on already-bound listeners until shutdown.
    ///
    /// Starts the sync scheduler, the HTTP server, the control listener and
    /// the signal listener, then hands over to the shutdown coordinator.
    ///
    /// # Errors
    ///
    /// Returns `ServerError` if the HTTP server fails or does not drain within
    /// the grace period.
    pub async fn run_with_listeners(
        self,
        http: TcpListener,
        control: TcpListener,
    ) -> Result<(), ServerError> {
        tracing::info!("Starting snapkv server");
        if let Ok(addr) = control.local_addr() {
            tracing::info!("Control listener on {addr}; connect to shut down");
        }

        let scheduler =
            SyncScheduler::new(Arc::clone(&self.persister), self.config.sync_interval())
                .spawn(self.shutdown.subscribe());

        let (drain_tx, drain_rx) = oneshot::channel::<()>();
        let state = Arc::new(AppState::new(Arc::clone(self.persister.store())));
        let http_server = tokio::spawn(crate::http::serve(http, state, async move {
            let _ = drain_rx.await;
        }));

        let control_task = tokio::spawn(watch_control_listener(
            control,
            Arc::clone(&self.shutdown),
        ));

        let signals = Arc::clone(&self.shutdown);
        let signal_task = tokio::spawn(async move {
            if let Err(e) = listen_for_signals(signals).await {
                tracing::error!("Failed to install signal handlers: {e}");
            }
        });

        let result = Coordinator::new(Arc::clone(&self.shutdown), self.config.shutdown_grace())
            .run(scheduler, http_server, drain_tx)
            .await;

        control_task.abort();
        signal_task.abort();

        result
    }
}
