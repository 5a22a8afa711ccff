//! SIGTERM-triggered shutdown.
//!
//! Kept in its own test binary: a signal reaches every server in the process.

#![cfg(unix)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use snapkv::{Phase, Server, ServerConfig, Trigger};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::signal::unix::{SignalKind, signal};

#[tokio::test]
async fn test_sigterm_flushes_and_stops() {
    // Registering a handler first replaces the default action, so the kill
    // below can never terminate the test process.
    let mut guard = signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");

    let dir = TempDir::new().unwrap();
    let server = Server::new(ServerConfig {
        http_bind: "127.0.0.1:0".parse().unwrap(),
        control_bind: "127.0.0.1:0".parse().unwrap(),
        data_file: dir.path().join("kvstore.json"),
        sync_interval_secs: 3600,
        shutdown_grace_secs: 1,
    })
    .unwrap();
    let shutdown = server.shutdown_handle();
    let persister = Arc::clone(server.persister());
    server.store().set("signal", "term");

    let run = tokio::spawn(server.run());
    // Give the server's signal task time to subscribe.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let status = Command::new("kill")
        .args(["-TERM", &std::process::id().to_string()])
        .status()
        .expect("Failed to run kill");
    assert!(status.success());
    guard.recv().await;

    tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("Server should stop after SIGTERM")
        .unwrap()
        .unwrap();

    assert_eq!(shutdown.phase(), Phase::Stopped);
    assert_eq!(persister.snapshots_written(), 1);
    assert!(dir.path().join("kvstore.json").exists());

    // A second trigger after the fact is a no-op.
    assert!(!shutdown.trigger(Trigger::Interrupt));
}
