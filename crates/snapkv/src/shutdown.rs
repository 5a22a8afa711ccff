//! Shutdown triggers and coordination.
//!
//! Two independent sources can stop the server: a process signal (SIGINT or
//! SIGTERM) and any connection to the control listener. Both feed a single
//! one-shot gate, [`Shutdown`]. The first trigger moves the phase from
//! `Running` to `Stopping` and is broadcast to every [`ShutdownSignal`];
//! later triggers are ignored.
//!
//! [`Coordinator`] then drives the ordered stop: wait for the sync scheduler's
//! final flush, drain HTTP connections within the grace period, mark the
//! server `Stopped`.

use crate::error::ServerError;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;

/// What initiated the shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// SIGINT / Ctrl-C
    Interrupt,
    /// SIGTERM
    Terminate,
    /// Connection accepted on the control listener
    ControlConnection(SocketAddr),
    /// HTTP server task ended on its own
    HttpServerExited,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt => write!(f, "interrupt signal"),
            Self::Terminate => write!(f, "termination signal"),
            Self::ControlConnection(peer) => write!(f, "control connection from {peer}"),
            Self::HttpServerExited => write!(f, "HTTP server exit"),
        }
    }
}

/// Server lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Serving requests
    Running,
    /// Shutdown in progress
    Stopping(Trigger),
    /// Shutdown complete
    Stopped,
}

/// One-shot shutdown gate shared by all triggers.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<Phase>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    /// Create a gate in the `Running` phase.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Phase::Running);
        Self { tx }
    }

    /// Fire the gate.
    ///
    /// Returns `true` if this call moved the phase to `Stopping`, `false` if
    /// shutdown had already begun.
    pub fn trigger(&self, trigger: Trigger) -> bool {
        self.tx.send_if_modified(|phase| {
            if *phase == Phase::Running {
                *phase = Phase::Stopping(trigger);
                true
            } else {
                false
            }
        })
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        *self.tx.borrow()
    }

    /// New receiver for the shutdown broadcast.
    #[must_use]
    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    pub(crate) fn mark_stopped(&self) {
        self.tx.send_replace(Phase::Stopped);
    }
}

/// Receiving half of the shutdown broadcast.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<Phase>,
}

impl ShutdownSignal {
    /// Wait until shutdown has begun. Returns immediately if it already has.
    pub async fn recv(&mut self) {
        // A dropped gate can never fire again, so treat it as shutdown.
        let _ = self.rx.wait_for(|phase| *phase != Phase::Running).await;
    }

    /// Whether shutdown has begun.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow() != Phase::Running
    }
}

/// Fire `shutdown` on SIGINT or SIGTERM.
///
/// Returns once shutdown has begun, by a signal or any other trigger.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
pub async fn listen_for_signals(shutdown: Arc<Shutdown>) -> std::io::Result<()> {
    let mut watcher = shutdown.subscribe();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                fire(&shutdown, Trigger::Interrupt);
            }
            _ = terminate.recv() => fire(&shutdown, Trigger::Terminate),
            () = watcher.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                fire(&shutdown, Trigger::Interrupt);
            }
            () = watcher.recv() => {}
        }
    }

    Ok(())
}

/// Accept a single connection on `listener` and treat it as a shutdown request.
///
/// The connection payload is ignored and the listener is closed after the
/// first accept, or as soon as shutdown begins through another trigger.
pub async fn watch_control_listener(listener: TcpListener, shutdown: Arc<Shutdown>) {
    let mut watcher = shutdown.subscribe();

    tokio::select! {
        accepted = listener.accept() => match accepted {
            Ok((_stream, peer)) => fire(&shutdown, Trigger::ControlConnection(peer)),
            Err(e) => tracing::error!("Control listener accept failed, trigger disabled: {e}"),
        },
        () = watcher.recv() => {}
    }

    drop(listener);
    tracing::debug!("Control listener closed");
}

fn fire(shutdown: &Shutdown, trigger: Trigger) {
    if shutdown.trigger(trigger) {
        tracing::info!("Shutdown requested by {trigger}");
    } else {
        tracing::debug!("Ignoring {trigger}, shutdown already in progress");
    }
}

/// Drives the ordered shutdown once the gate fires.
#[derive(Debug)]
pub struct Coordinator {
    shutdown: Arc<Shutdown>,
    grace: Duration,
}

impl Coordinator {
    /// Create a coordinator for `shutdown` with the given drain grace period.
    #[must_use]
    pub fn new(shutdown: Arc<Shutdown>, grace: Duration) -> Self {
        Self { shutdown, grace }
    }

    /// Wait for shutdown and stop everything in order.
    ///
    /// 1. Wait for the scheduler, which performs the final flush.
    /// 2. Tell the HTTP server to stop accepting connections.
    /// 3. Wait up to the grace period for in-flight requests, then abort.
    ///
    /// # Errors
    ///
    /// Returns `ServerError::DrainTimeout` when connections outlive the grace
    /// period, or `ServerError::Http` when the HTTP server fails.
    pub async fn run(
        self,
        scheduler: JoinHandle<()>,
        mut http: JoinHandle<Result<(), ServerError>>,
        drain: oneshot::Sender<()>,
    ) -> Result<(), ServerError> {
        let mut signal = self.shutdown.subscribe();

        let early_exit = tokio::select! {
            () = signal.recv() => None,
            result = &mut http => {
                fire(&self.shutdown, Trigger::HttpServerExited);
                Some(flatten(result))
            }
        };

        if let Phase::Stopping(trigger) = self.shutdown.phase() {
            tracing::info!("Shutting down ({trigger})");
        }

        if let Err(e) = scheduler.await {
            tracing::error!("Sync scheduler task failed: {e}");
        }

        let result = match early_exit {
            Some(result) => result.and(Err(ServerError::Http(
                "HTTP server stopped unexpectedly".to_string(),
            ))),
            None => self.drain(http, drain).await,
        };

        self.shutdown.mark_stopped();
        tracing::info!("Server stopped");
        result
    }

    async fn drain(
        &self,
        mut http: JoinHandle<Result<(), ServerError>>,
        drain: oneshot::Sender<()>,
    ) -> Result<(), ServerError> {
        tracing::info!(
            "Draining HTTP connections (grace period {:?})",
            self.grace
        );
        // The server may already be gone; nothing left to drain then.
        let _ = drain.send(());

        match tokio::time::timeout(self.grace, &mut http).await {
            Ok(result) => flatten(result),
            Err(_) => {
                tracing::warn!("Grace period elapsed with requests in flight; forcing close");
                http.abort();
                Err(ServerError::DrainTimeout {
                    seconds: self.grace.as_secs(),
                })
            }
        }
    }
}

fn flatten(
    result: Result<Result<(), ServerError>, tokio::task::JoinError>,
) -> Result<(), ServerError> {
    result.map_err(|e| ServerError::Http(format!("HTTP server task failed: {e}")))?
}
