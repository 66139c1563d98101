//! Termination signal handling.
//!
//! This module provides [`SigDown`], which subscribes to the interactive
//! interrupt (SIGINT, Ctrl-C) and the polite terminate request (SIGTERM, or
//! Ctrl-Shutdown on Windows), and lets callers wait for the first of them.
//!
//! # Example
//!
//! ```ignore
//! use graceful::util::SigDown;
//!
//! let sig_down = SigDown::try_new()?;
//! let token = sig_down.cancellation_token();
//!
//! // Pass token to subsystems
//! tokio::spawn(async move {
//!     token.cancelled().await;
//!     println!("Shutting down...");
//! });
//!
//! // Wait for the first termination signal
//! let termination = sig_down.recv().await;
//! ```

use std::fmt;
use std::io;
use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Which termination request the process received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Termination {
    /// Interactive interrupt, e.g. Ctrl-C in a terminal.
    Interrupt,
    /// Polite terminate request from a process manager or orchestrator.
    Terminate,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Interrupt => f.write_str("SIGINT"),
            Termination::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// Waits for the first of SIGTERM and SIGINT.
///
/// Registration happens in [`SigDown::try_new`], so a platform without signal
/// support fails there, at startup. A background task listens for both signals
/// and records the first one, then cancels the cancellation token.
pub struct SigDown {
    task_tracker: TaskTracker,
    cancellation_token: CancellationToken,
    received: Arc<OnceLock<Termination>>,
}

impl SigDown {
    /// Subscribes to termination signals.
    ///
    /// Returns an error if signal registration fails. Must be called from within
    /// a Tokio runtime.
    pub fn try_new() -> Result<Self, io::Error> {
        let mut listener = Listener::try_new()?;
        let inner = CancellationToken::new();
        let outer = inner.clone();
        let received = Arc::new(OnceLock::new());
        let slot = Arc::clone(&received);
        let task_tracker = TaskTracker::new();
        task_tracker.spawn(async move {
            if let Some(termination) = listener.recv().await {
                tracing::info!(signal = %termination, "Received termination signal");
                let _ = slot.set(termination);
                inner.cancel();
            }
        });
        task_tracker.close();
        Ok(Self {
            task_tracker,
            cancellation_token: outer,
            received,
        })
    }

    /// Returns a token cancelled on the first termination signal.
    ///
    /// The token is a child, so cancelling it does not affect [`SigDown::recv`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.child_token()
    }

    /// Waits for the first termination signal and returns it.
    ///
    /// Later signals are not consumed. Calling this again after a signal arrived
    /// returns the same value immediately. Returns `None` only if the signal
    /// driver shut down before any signal was delivered.
    pub async fn recv(&self) -> Option<Termination> {
        self.task_tracker.wait().await;
        self.received.get().copied()
    }

    /// Returns the signal received so far, if any, without waiting.
    pub fn received(&self) -> Option<Termination> {
        self.received.get().copied()
    }
}

/// Subscribes to termination signals and waits for exactly one.
pub async fn wait() -> Result<Termination, io::Error> {
    SigDown::try_new()?.recv().await.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::BrokenPipe,
            "signal driver shut down before a termination signal arrived",
        )
    })
}

/// Resolves to whichever of the two notifications completes first.
///
/// A source resolving to `None` has closed and is ignored; if both close,
/// the result is `None`.
async fn first_of<I, T>(interrupt: I, terminate: T) -> Option<Termination>
where
    I: Future<Output = Option<()>>,
    T: Future<Output = Option<()>>,
{
    tokio::select! {
        Some(()) = interrupt => Some(Termination::Interrupt),
        Some(()) = terminate => Some(Termination::Terminate),
        else => None,
    }
}

#[cfg(unix)]
struct Listener {
    sigint: tokio::signal::unix::Signal,
    sigterm: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Listener {
    fn try_new() -> Result<Self, io::Error> {
        use tokio::signal::unix::{SignalKind, signal};
        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
        })
    }

    async fn recv(&mut self) -> Option<Termination> {
        first_of(self.sigint.recv(), self.sigterm.recv()).await
    }
}

#[cfg(windows)]
struct Listener {
    ctrl_c: tokio::signal::windows::CtrlC,
    ctrl_shutdown: tokio::signal::windows::CtrlShutdown,
}

#[cfg(windows)]
impl Listener {
    fn try_new() -> Result<Self, io::Error> {
        use tokio::signal::windows::{ctrl_c, ctrl_shutdown};
        Ok(Self {
            ctrl_c: ctrl_c()?,
            ctrl_shutdown: ctrl_shutdown()?,
        })
    }

    async fn recv(&mut self) -> Option<Termination> {
        first_of(self.ctrl_c.recv(), self.ctrl_shutdown.recv()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::{pending, ready};

    #[tokio::test]
    async fn test_first_of_interrupt() {
        let termination = first_of(ready(Some(())), pending()).await;
        assert_eq!(termination, Some(Termination::Interrupt));
    }

    #[tokio::test]
    async fn test_first_of_terminate() {
        let termination = first_of(pending(), ready(Some(()))).await;
        assert_eq!(termination, Some(Termination::Terminate));
    }

    #[tokio::test]
    async fn test_first_of_skips_closed_source() {
        let termination = first_of(ready(None), ready(Some(()))).await;
        assert_eq!(termination, Some(Termination::Terminate));
    }

    #[tokio::test]
    async fn test_first_of_all_closed() {
        let termination = first_of(ready(None), ready(None)).await;
        assert_eq!(termination, None);
    }

    #[test]
    fn test_termination_display() {
        assert_eq!(Termination::Interrupt.to_string(), "SIGINT");
        assert_eq!(Termination::Terminate.to_string(), "SIGTERM");
    }

    #[tokio::test]
    async fn test_nothing_received_before_signal() {
        let sig_down = SigDown::try_new().unwrap();
        assert_eq!(sig_down.received(), None);
        assert!(!sig_down.cancellation_token().is_cancelled());
    }
}
