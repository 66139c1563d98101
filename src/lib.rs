//! Graceful shutdown for network servers.
//!
//! Block until the process receives SIGINT or SIGTERM, then stop an already
//! running server within a bounded grace period, so in-flight requests can
//! finish while termination is still guaranteed within a fixed time budget.
//!
//! # Overview
//!
//! Two pieces run one after the other:
//!
//! - **Signal waiting**: [`util::SigDown`] subscribes to termination signals and
//!   resolves on the first one.
//! - **Shutdown orchestration**: [`shutdown()`] creates a [`Deadline`], asks the
//!   server to stop within it through [`GracefulShutdown`], and reports the
//!   outcome to a [`Logger`]. Failures are logged, never returned.
//!
//! [`server()`] combines both.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`deadline`] | Time-bounded cancellation handle |
//! | [`logger`] | Status line sinks, including the no-op sink |
//! | [`server`](mod@server) | An axum server handle implementing [`GracefulShutdown`] |
//! | [`shutdown`](mod@shutdown) | The orchestrator and its message templates |
//! | [`util`] | Signal handling, plus telemetry setup behind the `telemetry` feature |
//!
//! # Features
//!
//! | Feature | Enables |
//! |---------|---------|
//! | `telemetry` | `util::Telemetry`: tracing subscriber, OTLP export, HTTP trace layer |
//! | `cli` | The `graceful` demo binary (implies `telemetry`) |
//!
//! # Example
//!
//! ```ignore
//! use graceful::{DEFAULT_TIMEOUT, HttpServer, TracingLogger};
//!
//! let router = axum::Router::new().route("/", axum::routing::get(|| async { "OK" }));
//! let server = HttpServer::bind("0.0.0.0:8080", router).await?;
//! graceful::server(Some(&server), Some(&TracingLogger), DEFAULT_TIMEOUT).await?;
//! ```

pub mod deadline;
pub mod logger;
pub mod server;
pub mod shutdown;
pub mod util;

pub use deadline::{Deadline, DeadlineExceeded};
pub use logger::{Logger, NoopLogger, TracingLogger, WriterLogger};
pub use server::HttpServer;
pub use shutdown::{
    DEFAULT_TIMEOUT, GracefulShutdown, ShutdownError, Templates, server, server_with, shutdown,
    shutdown_with,
};
pub use util::{SigDown, Termination, wait};
