//! An axum server handle that can be shut down gracefully.
//!
//! [`HttpServer`] runs `axum::serve` on a tracked background task with graceful
//! shutdown wired to a cancellation token. Shutting it down stops the accept
//! loop, lets in-flight requests finish and closes idle connections, bounded by
//! the caller's [`Deadline`].

use async_trait::async_trait;
use axum::Router;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::deadline::Deadline;
use crate::shutdown::{GracefulShutdown, ShutdownError};

/// A running axum server.
#[derive(Debug)]
pub struct HttpServer {
    local_addr: SocketAddr,
    stop: CancellationToken,
    task_tracker: TaskTracker,
    failure: Arc<Mutex<Option<io::Error>>>,
}

impl HttpServer {
    /// Binds `addr` and starts serving `router`.
    pub async fn bind<A: ToSocketAddrs>(addr: A, router: Router) -> Result<Self, io::Error> {
        let listener = TcpListener::bind(addr).await?;
        Self::serve(listener, router)
    }

    /// Starts serving `router` on an already bound listener.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn serve(listener: TcpListener, router: Router) -> Result<Self, io::Error> {
        let local_addr = listener.local_addr()?;
        let stop = CancellationToken::new();
        let failure = Arc::new(Mutex::new(None));
        let task_tracker = TaskTracker::new();

        let graceful_shutdown = stop.clone().cancelled_owned();
        let slot = Arc::clone(&failure);
        task_tracker.spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(graceful_shutdown)
                .await;
            if let Err(e) = served {
                tracing::error!(addr = %local_addr, error = %e, "HTTP server failed");
                *slot.lock().await = Some(e);
            }
        });
        task_tracker.close();

        Ok(Self {
            local_addr,
            stop,
            task_tracker,
            failure,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Whether the serve loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task_tracker.is_closed() && self.task_tracker.is_empty()
    }
}

#[async_trait]
impl GracefulShutdown for HttpServer {
    async fn shutdown(&self, deadline: &Deadline) -> Result<(), ShutdownError> {
        tracing::debug!(addr = %self.local_addr, "Stopping HTTP server");
        self.stop.cancel();
        deadline.run(self.task_tracker.wait()).await?;
        match self.failure.lock().await.take() {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use std::time::Duration;

    #[tokio::test]
    async fn test_idle_server_stops_immediately() {
        let router = Router::new().route("/", get(|| async { "OK" }));
        let server = HttpServer::bind("127.0.0.1:0", router).await.unwrap();
        assert!(server.local_addr().port() > 0);
        assert!(!server.is_finished());

        let deadline = Deadline::after(Duration::from_secs(5));
        server.shutdown(&deadline).await.unwrap();
        assert!(server.is_finished());
    }

    #[tokio::test]
    async fn test_repeated_shutdown_is_ok() {
        let server = HttpServer::bind("127.0.0.1:0", Router::new()).await.unwrap();
        let deadline = Deadline::after(Duration::from_secs(5));
        let (first, second) = tokio::join!(server.shutdown(&deadline), server.shutdown(&deadline));
        assert!(first.is_ok());
        assert!(second.is_ok());
        assert!(server.shutdown(&deadline).await.is_ok());
    }
}
