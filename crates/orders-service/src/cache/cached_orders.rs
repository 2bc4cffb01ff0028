//! Read-through, write-through order cache over an [`OrderStore`].

use super::entry::{CacheConfig, CacheEntry};
use super::single_flight::{Flight, SingleFlight};
use super::sweeper::Sweeper;
use super::OrderCache;
use crate::metrics::CacheMetrics;
use async_trait::async_trait;
use bytes::Bytes;
use orders_core::{OrderWriter, OrdersError, OrdersResult};
use orders_repository::OrderStore;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Point-in-time counts of the cache state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries in the table, including expired ones not yet swept.
    pub entries: usize,
    /// Entries recording a not-found result.
    pub negative_entries: usize,
    /// Keys with a backing-store fetch in progress.
    pub inflight: usize,
}

/// State shared between the engine, its fetch tasks and the sweep task.
pub(crate) struct CacheInner {
    table: RwLock<HashMap<String, CacheEntry>>,
    flights: Arc<SingleFlight>,
    store: Arc<dyn OrderStore>,
    config: CacheConfig,
}

impl CacheInner {
    /// Answers from a live entry, if there is one.
    fn lookup(&self, key: &str, now: Instant) -> Option<OrdersResult<Bytes>> {
        let table = self.table.read();
        let entry = table.get(key)?;
        if !entry.is_live(now) {
            return None;
        }
        Some(match &entry.payload {
            Some(payload) => Ok(payload.clone()),
            None => Err(OrdersError::order_not_found(key)),
        })
    }

    fn install(&self, key: &str, entry: CacheEntry) {
        let mut table = self.table.write();
        table.insert(key.to_owned(), entry);
        CacheMetrics::set_entries(table.len());
    }

    /// Installs a fetch result unless a write for the same key landed after
    /// the fetch started.
    fn install_fetched(&self, key: &str, started: Instant, entry: CacheEntry) {
        let mut table = self.table.write();
        if let Some(existing) = table.get(key) {
            if existing.stored_at >= started && existing.is_live(entry.stored_at) {
                debug!(key, "Newer entry written during fetch; keeping it");
                return;
            }
        }
        table.insert(key.to_owned(), entry);
        CacheMetrics::set_entries(table.len());
    }

    /// Loads one key from the store and fills the table with the outcome.
    async fn fetch_and_fill(self: Arc<Self>, key: String, started: Instant) -> OrdersResult<Bytes> {
        CacheMetrics::store_fetch();
        debug!(key = %key, "Loading order from backing store");

        match self.store.get_by_key(&key).await {
            Ok(payload) => {
                let entry = CacheEntry::positive(payload.clone(), self.config.ttl, Instant::now());
                self.install_fetched(&key, started, entry);
                Ok(payload)
            }
            Err(e) if e.is_not_found() => {
                if !self.config.negative_ttl.is_zero() {
                    let entry = CacheEntry::negative(self.config.negative_ttl, Instant::now());
                    self.install_fetched(&key, started, entry);
                }
                Err(OrdersError::order_not_found(&key))
            }
            Err(e) => {
                CacheMetrics::fetch_error(e.error_code());
                warn!(key = %key, error = %e, "Backing store fetch failed");
                Err(e)
            }
        }
    }

    /// Removes every entry that is no longer live. Returns the number removed.
    pub(crate) fn sweep_expired(&self, now: Instant) -> usize {
        let mut table = self.table.write();
        let before = table.len();
        table.retain(|_, entry| entry.is_live(now));
        let removed = before - table.len();
        if removed > 0 {
            CacheMetrics::evicted(removed);
        }
        CacheMetrics::set_entries(table.len());
        removed
    }
}

/// In-memory order cache in front of a durable [`OrderStore`].
///
/// Reads are served from a table of entries with per-entry expiry. A miss
/// loads from the store once per key however many callers are waiting, and
/// "not found" answers are remembered for the negative TTL. Writes go to the
/// store first and reach the table only after the store accepted them.
///
/// Construction spawns the sweep task, so it must happen inside a Tokio
/// runtime. Call [`shutdown`](Self::shutdown) to stop the sweep and wait for
/// it; dropping the cache only signals it.
pub struct CachedOrders {
    inner: Arc<CacheInner>,
    sweeper: Sweeper,
}

impl CachedOrders {
    /// Creates an empty cache over `store` and starts the sweep.
    #[must_use]
    pub fn new(store: Arc<dyn OrderStore>, config: CacheConfig) -> Self {
        let inner = Arc::new(CacheInner {
            table: RwLock::new(HashMap::new()),
            flights: SingleFlight::new(),
            store,
            config,
        });
        let sweeper = Sweeper::spawn(Arc::clone(&inner), config.sweep_interval);

        debug!(
            ttl_secs = config.ttl.as_secs(),
            negative_ttl_secs = config.negative_ttl.as_secs(),
            sweep_interval_secs = config.sweep_interval.as_secs(),
            "Order cache created"
        );

        Self { inner, sweeper }
    }

    /// Returns the cache configuration.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Looks up `key`, loading it from the store on a miss.
    ///
    /// When `cancel` fires first, returns `OrdersError::Cancelled`. A fetch
    /// already started keeps running and still fills the cache.
    pub async fn get_with_cancel(&self, key: &str, cancel: &CancellationToken) -> OrdersResult<Bytes> {
        let now = Instant::now();
        if let Some(result) = self.inner.lookup(key, now) {
            match &result {
                Ok(_) => CacheMetrics::hit(),
                Err(_) => CacheMetrics::negative_hit(),
            }
            return result;
        }

        CacheMetrics::miss();

        let inner = Arc::clone(&self.inner);
        let owned_key = key.to_owned();
        let flight = self.inner.flights.join_or_start(
            key,
            || self.inner.lookup(key, Instant::now()),
            move || inner.fetch_and_fill(owned_key, now),
        );

        let fetch = match flight {
            Flight::Ready(result) => return result,
            Flight::Pending { fetch, leader } => {
                if !leader {
                    debug!(key, "Joining in-flight fetch");
                }
                fetch
            }
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(OrdersError::Cancelled),
            result = fetch => result,
        }
    }

    /// Writes `payload` through to the store, then caches it.
    ///
    /// When `cancel` fires first, returns `OrdersError::Cancelled` and the
    /// table is left untouched; the store write may or may not have landed.
    pub async fn upsert_with_cancel(
        &self,
        key: &str,
        payload: Bytes,
        cancel: &CancellationToken,
    ) -> OrdersResult<()> {
        let write = self.inner.store.upsert(key, payload.clone());
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(OrdersError::Cancelled),
            result = write => result,
        };

        if let Err(e) = result {
            warn!(key, error = %e, "Write-through to backing store failed");
            return Err(e);
        }

        self.inner
            .install(key, CacheEntry::positive(payload, self.inner.config.ttl, Instant::now()));
        debug!(key, "Order written through");
        Ok(())
    }

    /// Removes any entry for `key`.
    pub fn invalidate(&self, key: &str) {
        let mut table = self.inner.table.write();
        if table.remove(key).is_some() {
            debug!(key, "Cache entry invalidated");
        }
        CacheMetrics::set_entries(table.len());
    }

    /// Installs every pair as a live entry, replacing existing entries.
    pub fn bulk_preload(&self, entries: HashMap<String, Bytes>) {
        let now = Instant::now();
        let ttl = self.inner.config.ttl;
        let count = entries.len();

        let mut table = self.inner.table.write();
        for (key, payload) in entries {
            table.insert(key, CacheEntry::positive(payload, ttl, now));
        }
        CacheMetrics::set_entries(table.len());
        drop(table);

        debug!(count, "Cache preloaded");
    }

    /// Stops the background sweep and waits for it to finish.
    ///
    /// Idempotent. The cache keeps serving reads and writes afterwards; only
    /// sweeping stops.
    pub async fn shutdown(&self) {
        self.sweeper.shutdown().await;
    }

    /// Returns true while the sweep task is running.
    #[must_use]
    pub fn is_sweeping(&self) -> bool {
        self.sweeper.is_running()
    }

    /// Number of entries in the table, including expired ones not yet swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.table.read().len()
    }

    /// Returns true when the table holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns point-in-time counts.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let (entries, negative_entries) = {
            let table = self.inner.table.read();
            let negative = table.values().filter(|e| e.is_negative()).count();
            (table.len(), negative)
        };
        CacheStats {
            entries,
            negative_entries,
            inflight: self.inner.flights.len(),
        }
    }

    /// Removes expired entries now instead of waiting for the next sweep.
    pub fn sweep_now(&self) -> usize {
        self.inner.sweep_expired(Instant::now())
    }
}

impl std::fmt::Debug for CachedOrders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedOrders")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}

#[async_trait]
impl OrderCache for CachedOrders {
    async fn get(&self, key: &str) -> OrdersResult<Bytes> {
        self.get_with_cancel(key, &CancellationToken::new()).await
    }

    async fn upsert(&self, key: &str, payload: Bytes) -> OrdersResult<()> {
        self.upsert_with_cancel(key, payload, &CancellationToken::new())
            .await
    }

    fn invalidate(&self, key: &str) {
        CachedOrders::invalidate(self, key);
    }

    fn bulk_preload(&self, entries: HashMap<String, Bytes>) {
        CachedOrders::bulk_preload(self, entries);
    }
}

#[async_trait]
impl OrderWriter for CachedOrders {
    async fn upsert(&self, key: &str, payload: Bytes) -> OrdersResult<()> {
        self.upsert_with_cancel(key, payload, &CancellationToken::new())
            .await
    }
}
