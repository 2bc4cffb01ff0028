//! Cache interface trait for the order read path.

use async_trait::async_trait;
use bytes::Bytes;
use orders_core::{Interface, OrdersResult};
use std::collections::HashMap;

/// Read-through, write-through cache of order payloads.
///
/// This is the seam the HTTP layer depends on; tests substitute it freely.
#[async_trait]
pub trait OrderCache: Interface + Send + Sync {
    /// Returns the payload for `key`.
    ///
    /// Serves live entries from memory. On a miss, loads from the backing
    /// store exactly once per key no matter how many callers are waiting.
    /// Returns `OrdersError::NotFound` when the store has no such key.
    async fn get(&self, key: &str) -> OrdersResult<Bytes>;

    /// Writes `payload` to the backing store, then caches it.
    ///
    /// The cache is only updated after the store accepted the write.
    async fn upsert(&self, key: &str, payload: Bytes) -> OrdersResult<()>;

    /// Drops any cached entry for `key`, positive or negative.
    fn invalidate(&self, key: &str);

    /// Installs every entry as live without contacting the store.
    fn bulk_preload(&self, entries: HashMap<String, Bytes>);
}
