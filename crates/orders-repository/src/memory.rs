//! In-process order store.
//!
//! Keeps payloads in a map and tracks write order so `list_recent`
//! behaves like the PostgreSQL query. Used by tests across the workspace
//! and for running the service without a database.

use crate::traits::OrderStore;
use async_trait::async_trait;
use bytes::Bytes;
use orders_core::{OrdersError, OrdersResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Inner {
    rows: HashMap<String, (u64, Bytes)>,
    clock: u64,
}

/// In-memory [`OrderStore`].
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    inner: Mutex<Inner>,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl InMemoryOrderStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with `entries`, written in iteration order.
    #[must_use]
    pub fn with_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Bytes)>,
        K: Into<String>,
    {
        let store = Self::new();
        {
            let mut inner = store.lock();
            for (key, payload) in entries {
                inner.clock += 1;
                let stamp = inner.clock;
                inner.rows.insert(key.into(), (stamp, payload));
            }
        }
        store
    }

    /// Number of `get_by_key` calls served so far.
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of `upsert` calls served so far.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Returns the stored payload without counting it as a read.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<Bytes> {
        self.lock().rows.get(key).map(|(_, payload)| payload.clone())
    }

    /// Number of stored rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    /// Returns true when the store holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means a panicking test thread; the map is still usable.
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn get_by_key(&self, key: &str) -> OrdersResult<Bytes> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.lock()
            .rows
            .get(key)
            .map(|(_, payload)| payload.clone())
            .ok_or_else(|| OrdersError::order_not_found(key))
    }

    async fn upsert(&self, key: &str, payload: Bytes) -> OrdersResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.lock();
        inner.clock += 1;
        let stamp = inner.clock;
        inner.rows.insert(key.to_string(), (stamp, payload));
        Ok(())
    }

    async fn list_recent(&self, limit: u32) -> OrdersResult<HashMap<String, Bytes>> {
        let inner = self.lock();
        let mut rows: Vec<(&String, &(u64, Bytes))> = inner.rows.iter().collect();
        rows.sort_by(|a, b| b.1 .0.cmp(&a.1 .0));
        Ok(rows
            .into_iter()
            .take(limit as usize)
            .map(|(key, (_, payload))| (key.clone(), payload.clone()))
            .collect())
    }
}
