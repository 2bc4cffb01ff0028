//! Core traits shared across layers.

use crate::OrdersResult;
use async_trait::async_trait;
use bytes::Bytes;

/// The write path the ingestion consumer drives.
///
/// Implementations must be idempotent under redelivery: applying the same
/// `(key, payload)` twice leaves the same state as applying it once.
#[async_trait]
pub trait OrderWriter: Send + Sync {
    /// Durably stores `payload` under `key`, replacing any previous value.
    async fn upsert(&self, key: &str, payload: Bytes) -> OrdersResult<()>;
}
