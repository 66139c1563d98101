//! Delivers real signals to the test process.
//!
//! Kept to a single test so that no other test in this binary can observe the
//! signals it sends.
#![cfg(unix)]

use axum::Router;
use graceful::{HttpServer, Logger, SigDown, Termination};
use std::fmt;
use std::process::Command;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::Level;

#[derive(Default)]
struct Recorder(Mutex<Vec<String>>);

impl Logger for Recorder {
    fn log(&self, _level: Level, args: fmt::Arguments<'_>) {
        self.0.lock().unwrap().push(args.to_string());
    }
}

fn send(signal: &str) {
    let status = Command::new("kill")
        .arg(format!("-{signal}"))
        .arg(std::process::id().to_string())
        .status()
        .unwrap();
    assert!(status.success());
}

#[tokio::test]
async fn termination_signals_gate_shutdown() {
    // The combined operation waits for SIGTERM, then drains the server.
    let server = HttpServer::bind("127.0.0.1:0", Router::new()).await.unwrap();
    let recorder = Arc::new(Recorder::default());
    let logger = Arc::clone(&recorder);
    let handle = tokio::spawn(async move {
        graceful::server(Some(&server), Some(&*logger), Duration::from_secs(5)).await
    });

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(recorder.0.lock().unwrap().is_empty());
    assert!(!handle.is_finished());

    send("TERM");
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(
        *recorder.0.lock().unwrap(),
        vec!["Shutdown with timeout: 5s", "Server stopped"]
    );

    // SIGINT is recognised as well, and only the first signal counts.
    let sig_down = SigDown::try_new().unwrap();
    let token = sig_down.cancellation_token();
    send("INT");
    let received = tokio::time::timeout(Duration::from_secs(5), sig_down.recv())
        .await
        .unwrap();
    assert_eq!(received, Some(Termination::Interrupt));
    assert!(token.is_cancelled());

    send("TERM");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sig_down.recv().await, Some(Termination::Interrupt));
    assert_eq!(sig_down.received(), Some(Termination::Interrupt));

    // Two signals back to back before anyone waits still yield one value.
    let sig_down = SigDown::try_new().unwrap();
    send("INT");
    send("TERM");
    let first = tokio::time::timeout(Duration::from_secs(5), sig_down.recv())
        .await
        .unwrap();
    assert!(matches!(
        first,
        Some(Termination::Interrupt | Termination::Terminate)
    ));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sig_down.recv().await, first);
    assert_eq!(sig_down.received(), first);
}
