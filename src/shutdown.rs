//! Timeout-bounded shutdown of a running server.
//!
//! [`shutdown`] takes a server handle, a logger and a timeout, creates a
//! [`Deadline`], asks the server to stop within it and reports the outcome
//! through the logger. It never returns an error and never panics on the
//! caller's behalf: a shutdown is a best-effort courtesy on the way to process
//! exit.
//!
//! [`server`] puts a signal wait in front of that.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::time::Duration;
use tracing::Level;

use crate::deadline::{Deadline, DeadlineExceeded};
use crate::logger::{Logger, NoopLogger};
use crate::util::{SigDown, Termination};

/// Default grace period for [`server`] and [`shutdown`] callers.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Announce template; `{timeout}` is replaced with the timeout.
pub const SHUTDOWN_TEMPLATE: &str = "Shutdown with timeout: {timeout}";
/// Failure template; `{error}` is replaced with the failure detail.
pub const ERROR_TEMPLATE: &str = "Error: {error}";
pub const STOPPED_TEMPLATE: &str = "Server stopped";

/// Failure reported by a server's own shutdown.
#[derive(Debug, thiserror::Error)]
pub enum ShutdownError {
    #[error(transparent)]
    DeadlineExceeded(#[from] DeadlineExceeded),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Server task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("{0}")]
    Server(Box<dyn std::error::Error + Send + Sync>),
}

/// A running server that can stop itself gracefully.
///
/// Implementations stop accepting new work and wait for in-flight work to
/// finish, or for the deadline to pass, whichever comes first. Reaching the
/// deadline should be reported as [`ShutdownError::DeadlineExceeded`].
#[async_trait]
pub trait GracefulShutdown: Send + Sync {
    async fn shutdown(&self, deadline: &Deadline) -> Result<(), ShutdownError>;
}

/// The three status lines emitted during a shutdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Templates {
    pub shutdown: String,
    pub error: String,
    pub stopped: String,
}

impl Default for Templates {
    fn default() -> Self {
        Self {
            shutdown: SHUTDOWN_TEMPLATE.to_string(),
            error: ERROR_TEMPLATE.to_string(),
            stopped: STOPPED_TEMPLATE.to_string(),
        }
    }
}

impl Templates {
    /// The announce line, e.g. `Shutdown with timeout: 15s`.
    ///
    /// The timeout is written by `humantime`, so compound values read
    /// `1m 30s` and `1s 500ms`.
    pub fn shutdown_line(&self, timeout: Duration) -> impl fmt::Display + '_ {
        Fill {
            template: &self.shutdown,
            placeholder: "{timeout}",
            value: humantime::format_duration(timeout),
        }
    }

    pub fn error_line<'a>(&'a self, error: &'a ShutdownError) -> impl fmt::Display + 'a {
        Fill {
            template: &self.error,
            placeholder: "{error}",
            value: error,
        }
    }

    pub fn stopped_line(&self) -> &str {
        &self.stopped
    }
}

/// A template with every occurrence of `placeholder` replaced by `value`,
/// substituted only when displayed.
struct Fill<'a, V> {
    template: &'a str,
    placeholder: &'static str,
    value: V,
}

impl<V: fmt::Display> fmt::Display for Fill<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = self.template.split(self.placeholder);
        if let Some(first) = parts.next() {
            f.write_str(first)?;
        }
        for part in parts {
            write!(f, "{}", self.value)?;
            f.write_str(part)?;
        }
        Ok(())
    }
}

/// Waits for SIGINT or SIGTERM, then shuts `server` down within `timeout`.
///
/// The only error returned is a failure to subscribe to termination signals,
/// which happens before any waiting. Shutdown failures go to the logger.
/// If the signal driver closes before a signal arrives, the shutdown runs
/// anyway.
pub async fn server(
    server: Option<&dyn GracefulShutdown>,
    logger: Option<&dyn Logger>,
    timeout: Duration,
) -> Result<(), io::Error> {
    server_with(server, logger, timeout, &Templates::default()).await
}

/// Same as [`server`], with custom status line templates.
pub async fn server_with(
    server: Option<&dyn GracefulShutdown>,
    logger: Option<&dyn Logger>,
    timeout: Duration,
    templates: &Templates,
) -> Result<(), io::Error> {
    let sig_down = SigDown::try_new()?;
    after_signal(sig_down.recv(), server, logger, timeout, templates).await;
    Ok(())
}

/// Runs the shutdown once `signal` resolves.
///
/// A signal driver that closes without delivering a signal is logged as a
/// warning and still leads to a shutdown.
async fn after_signal(
    signal: impl Future<Output = Option<Termination>>,
    server: Option<&dyn GracefulShutdown>,
    logger: Option<&dyn Logger>,
    timeout: Duration,
    templates: &Templates,
) {
    if signal.await.is_none() {
        tracing::warn!("Signal driver closed before a termination signal arrived");
    }
    shutdown_with(server, logger, timeout, templates).await;
}

/// Shuts `server` down within `timeout`, reporting through `logger`.
///
/// - No server: returns immediately without logging.
/// - No logger: output is discarded.
/// - Otherwise exactly two lines are logged: the announce line, then either
///   the stopped line or the error line.
///
/// Returns within `timeout` even if the server never finishes; the server is
/// not forcibly stopped in that case.
pub async fn shutdown(
    server: Option<&dyn GracefulShutdown>,
    logger: Option<&dyn Logger>,
    timeout: Duration,
) {
    shutdown_with(server, logger, timeout, &Templates::default()).await
}

/// Same as [`shutdown`], with custom status line templates.
pub async fn shutdown_with(
    server: Option<&dyn GracefulShutdown>,
    logger: Option<&dyn Logger>,
    timeout: Duration,
    templates: &Templates,
) {
    let Some(server) = server else {
        return;
    };
    let logger = logger.unwrap_or(&NoopLogger);

    let deadline = Deadline::after(timeout);

    logger.log(Level::INFO, format_args!("{}", templates.shutdown_line(timeout)));

    let outcome = match deadline.run(server.shutdown(&deadline)).await {
        Ok(outcome) => outcome,
        Err(exceeded) => Err(exceeded.into()),
    };
    match outcome {
        Ok(()) => logger.log(Level::INFO, format_args!("{}", templates.stopped_line())),
        Err(error) => logger.log(
            Level::ERROR,
            format_args!("{}", templates.error_line(&error)),
        ),
    }
}
