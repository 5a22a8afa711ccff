//! Periodic background flushing.

use crate::error::PersistenceError;
use crate::persistence::{FlushOutcome, Persister};
use crate::shutdown::ShutdownSignal;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Background task flushing the store every `interval` and once on shutdown.
#[derive(Debug, Clone)]
pub struct SyncScheduler {
    persister: Arc<Persister>,
    interval: Duration,
}

impl SyncScheduler {
    /// Create a scheduler for `persister`.
    #[must_use]
    pub fn new(persister: Arc<Persister>, interval: Duration) -> Self {
        Self {
            persister,
            interval,
        }
    }

    /// Spawn the loop onto the current runtime.
    pub fn spawn(self, shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Flush on every tick until `shutdown` fires, then flush one last time.
    ///
    /// Cancellation is only observed between flushes; a flush that has
    /// started always runs to completion.
    pub async fn run(self, mut shutdown: ShutdownSignal) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!("Sync scheduler started (interval {:?})", self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.flush().await {
                        tracing::warn!("Periodic flush failed, will retry: {e}");
                    }
                }
                () = shutdown.recv() => {
                    match self.flush().await {
                        Ok(FlushOutcome::Written { records }) => {
                            tracing::info!("Final flush wrote {records} records");
                        }
                        Ok(FlushOutcome::Clean) => {
                            tracing::info!("Final flush skipped, store already clean");
                        }
                        Err(e) => tracing::error!("Final flush failed: {e}"),
                    }
                    break;
                }
            }
        }

        tracing::info!("Sync scheduler stopped");
    }

    /// Run one flush on the blocking pool.
    async fn flush(&self) -> Result<FlushOutcome, PersistenceError> {
        let persister = Arc::clone(&self.persister);
        tokio::task::spawn_blocking(move || persister.flush())
            .await
            .map_err(|e| PersistenceError::TaskFailed(e.to_string()))?
    }
}
