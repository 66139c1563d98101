//! Time-bounded cancellation handle for a single shutdown attempt.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Used when `now + timeout` does not fit into an [`Instant`].
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Returned when an operation did not finish before its [`Deadline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("context deadline exceeded")]
pub struct DeadlineExceeded;

/// A deadline derived from the current time plus a timeout.
///
/// The deadline owns a cancellation token that is cancelled when the deadline
/// passes, and a timer task that does the cancelling. Dropping the deadline
/// cancels the token as well, which stops the timer task; nothing outlives the
/// call that created it.
///
/// [`Deadline::token`] is for aborting a drain that is already running once
/// time is up. It is not a trigger for starting one.
#[derive(Debug)]
pub struct Deadline {
    expires_at: Instant,
    timeout: Duration,
    token: CancellationToken,
}

impl Deadline {
    /// Creates a deadline `timeout` from now.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn after(timeout: Duration) -> Self {
        let now = Instant::now();
        let expires_at = now
            .checked_add(timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);
        let token = CancellationToken::new();
        let timer = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => {}
                _ = tokio::time::sleep_until(expires_at) => timer.cancel(),
            }
        });
        Self {
            expires_at,
            timeout,
            token,
        }
    }

    /// The timeout this deadline was created with.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Time left until the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.token.is_cancelled() || Instant::now() >= self.expires_at
    }

    /// A token cancelled when the deadline passes or is released.
    pub fn token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Resolves once the deadline has passed.
    pub async fn expired(&self) {
        tokio::select! {
            _ = self.token.cancelled() => {}
            _ = tokio::time::sleep_until(self.expires_at) => {}
        }
    }

    /// Drives `future` until it completes or the deadline passes.
    ///
    /// The future is polled before the deadline is checked, so a future that is
    /// already complete wins even against a zero timeout. On expiry the future
    /// is dropped.
    pub async fn run<F>(&self, future: F) -> Result<F::Output, DeadlineExceeded>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            output = future => Ok(output),
            _ = self.expired() => Err(DeadlineExceeded),
        }
    }
}

impl Drop for Deadline {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_completes_before_deadline() {
        let deadline = Deadline::after(Duration::from_secs(5));
        let result = deadline.run(async { 42 }).await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn test_run_ready_future_wins_zero_timeout() {
        let deadline = Deadline::after(Duration::ZERO);
        let result = deadline.run(std::future::ready("done")).await;
        assert_eq!(result, Ok("done"));
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let deadline = Deadline::after(Duration::from_millis(10));
        let start = Instant::now();
        let result = deadline.run(std::future::pending::<()>()).await;
        assert_eq!(result, Err(DeadlineExceeded));
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(deadline.is_expired());
        assert_eq!(deadline.remaining(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_token_cancelled_at_expiry() {
        let deadline = Deadline::after(Duration::from_millis(10));
        let token = deadline.token();
        tokio::time::timeout(Duration::from_secs(1), token.cancelled())
            .await
            .expect("token should be cancelled at the deadline");
    }

    #[tokio::test]
    async fn test_token_aborts_running_drain() {
        let deadline = Deadline::after(Duration::from_millis(20));
        let token = deadline.token();
        let drain = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => "aborted",
                _ = tokio::time::sleep(Duration::from_secs(10)) => "drained",
            }
        });
        let start = Instant::now();
        assert_eq!(drain.await.unwrap(), "aborted");
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_drop_releases_token() {
        let deadline = Deadline::after(Duration::from_secs(60));
        let token = deadline.token();
        assert!(!token.is_cancelled());
        assert!(!deadline.is_expired());
        drop(deadline);
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_overflowing_timeout_saturates() {
        let deadline = Deadline::after(Duration::MAX);
        assert_eq!(deadline.timeout(), Duration::MAX);
        assert!(deadline.remaining() > Duration::from_secs(86400));
        assert!(!deadline.is_expired());
    }

    #[test]
    fn test_deadline_exceeded_display() {
        assert_eq!(DeadlineExceeded.to_string(), "context deadline exceeded");
    }
}
