//! Demo HTTP server with graceful shutdown.
//!
//! Serves two endpoints and drains them on SIGINT/SIGTERM:
//! - `GET /` – Returns `OK`
//! - `GET /sleep/{millis}` – Responds after the given delay, to watch draining
//!
//! Environment:
//! - `.env` values loaded at startup
//! - `HOST`, `PORT` control binding address
//! - `SHUTDOWN_TIMEOUT` sets the grace period (default `15s`)
//! - `OTEL_*` variables enable trace and metric export

use axum::Router;
use axum::extract::Path;
use axum::routing::get;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::process;
use std::time::Duration;

use graceful::util::Telemetry;
use graceful::{HttpServer, TracingLogger};

use crate::config::Config;

mod config;

async fn health() -> &'static str {
    "OK"
}

async fn sleep(Path(millis): Path<u64>) -> String {
    tokio::time::sleep(Duration::from_millis(millis)).await;
    format!("slept {millis}ms")
}

/// Starts the server, waits for a termination signal, then drains it.
async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let telemetry = Telemetry::new()
        .with_name(env!("CARGO_PKG_NAME"))
        .with_version(env!("CARGO_PKG_VERSION"))
        .register();

    let config = Config::load()?;

    let http_endpoints = Router::new()
        .route("/", get(health))
        .route("/sleep/{millis}", get(sleep))
        .layer(telemetry.http_tracing());

    let addr = SocketAddr::new(config.host(), config.port());
    let server = HttpServer::bind(addr, http_endpoints)
        .await
        .inspect_err(|e| tracing::error!("Failed to bind to {}: {}", addr, e))?;
    tracing::info!("Starting server at http://{}", server.local_addr());

    graceful::server_with(
        Some(&server),
        Some(&TracingLogger),
        config.shutdown().timeout(),
        config.shutdown().templates(),
    )
    .await?;

    Ok(())
}

#[tokio::main]
async fn main() {
    let result = run().await;
    if let Err(e) = result {
        println!("{e}");
        process::exit(1)
    }
}
