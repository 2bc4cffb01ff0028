//! Retry policy implementation.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Retry policy configuration.
///
/// Attempts are repeated with a constant delay until one succeeds or the
/// caller's token fires; there is no attempt budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay between a failed attempt and the next one.
    pub delay: Duration,
}

/// Result of a cancellable retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    /// An attempt succeeded.
    Succeeded(T),
    /// The token fired before an attempt succeeded.
    Cancelled,
}

impl<T> RetryOutcome<T> {
    /// Returns true when the loop stopped because of cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl RetryPolicy {
    /// Retries forever with the same delay between attempts.
    #[must_use]
    pub const fn fixed(delay: Duration) -> Self {
        Self { delay }
    }

    /// Executes a function until it succeeds or `cancel` fires.
    ///
    /// Cancellation is observed before each attempt and during the wait
    /// between attempts; an attempt already running is allowed to finish.
    pub async fn run_until_cancelled<F, Fut, T, E>(
        &self,
        cancel: &CancellationToken,
        mut f: F,
    ) -> RetryOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt: u32 = 0;
        loop {
            if attempt > 0 {
                debug!("Retry attempt {} after {:?}", attempt, self.delay);
                if !sleep_or_cancelled(self.delay, cancel).await {
                    return RetryOutcome::Cancelled;
                }
            }
            if cancel.is_cancelled() {
                return RetryOutcome::Cancelled;
            }

            match f().await {
                Ok(result) => return RetryOutcome::Succeeded(result),
                Err(e) => {
                    attempt = attempt.saturating_add(1);
                    debug!("Attempt {} failed: {}", attempt, e);
                }
            }
        }
    }
}

/// Sleeps for `duration` unless `cancel` fires first.
///
/// Returns `true` when the full duration elapsed and `false` on
/// cancellation.
pub async fn sleep_or_cancelled(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}
