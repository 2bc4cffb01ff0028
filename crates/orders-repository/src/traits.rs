//! Repository trait definitions.

use async_trait::async_trait;
use bytes::Bytes;
use orders_core::{Interface, OrdersResult};
use std::collections::HashMap;

/// Durable key-value store of order payloads.
///
/// Payloads are opaque to the store; they are returned exactly as written.
#[async_trait]
pub trait OrderStore: Interface + Send + Sync {
    /// Reads one payload.
    ///
    /// Returns `OrdersError::NotFound` when the key is absent; any other
    /// error is a transient backend failure.
    async fn get_by_key(&self, key: &str) -> OrdersResult<Bytes>;

    /// Inserts or replaces the payload stored under `key`.
    async fn upsert(&self, key: &str, payload: Bytes) -> OrdersResult<()>;

    /// Returns up to `limit` of the most recently written entries.
    async fn list_recent(&self, limit: u32) -> OrdersResult<HashMap<String, Bytes>>;
}
