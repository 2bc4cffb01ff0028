//! Timeout wrapper for async operations.

use orders_core::OrdersError;
use std::time::Duration;

/// Wraps an async operation with a timeout.
///
/// An elapsed deadline becomes `OrdersError::Timeout`; the inner future is
/// dropped.
pub async fn with_timeout<F, Fut, T>(duration: Duration, f: F) -> Result<T, OrdersError>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, OrdersError>>,
{
    tokio::time::timeout(duration, f())
        .await
        .map_err(|_| OrdersError::Timeout(format!("Operation timed out after {:?}", duration)))?
}
