//! Per-key registry of in-flight backing-store fetches.
//!
//! The first caller that misses on a key spawns the fetch as its own task
//! and publishes a shared handle to its result; later callers for the same
//! key join that handle instead of issuing another fetch. The registry entry
//! is removed by the task itself once the result is settled, so a fetch runs
//! to completion even when every waiter has gone away.

use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt, Shared};
use orders_core::{OrdersError, OrdersResult};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::error;

/// A fetch result every waiter can clone.
pub(crate) type SharedFetch = Shared<BoxFuture<'static, OrdersResult<Bytes>>>;

/// Outcome of [`SingleFlight::join_or_start`].
pub(crate) enum Flight {
    /// The table answered on the re-check; no fetch is needed.
    Ready(OrdersResult<Bytes>),
    /// A fetch for the key is in progress.
    Pending {
        fetch: SharedFetch,
        /// True when this call started the fetch.
        leader: bool,
    },
}

#[derive(Default)]
pub(crate) struct SingleFlight {
    flights: Mutex<HashMap<String, SharedFetch>>,
}

impl SingleFlight {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Joins the in-flight fetch for `key`, or starts one.
    ///
    /// `recheck` runs under the registry lock before a new fetch is started;
    /// it closes the gap between a caller's table miss and a fetch that
    /// completed (and left the registry) in the meantime. `start` builds the
    /// fetch future, which is spawned onto the runtime.
    pub(crate) fn join_or_start<C, S, Fut>(self: &Arc<Self>, key: &str, recheck: C, start: S) -> Flight
    where
        C: FnOnce() -> Option<OrdersResult<Bytes>>,
        S: FnOnce() -> Fut,
        Fut: Future<Output = OrdersResult<Bytes>> + Send + 'static,
    {
        let mut flights = self.flights.lock();

        if let Some(fetch) = flights.get(key) {
            return Flight::Pending {
                fetch: fetch.clone(),
                leader: false,
            };
        }

        if let Some(result) = recheck() {
            return Flight::Ready(result);
        }

        let guard = FlightGuard {
            registry: Arc::clone(self),
            key: key.to_owned(),
        };
        let fetch = start();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            fetch.await
        });

        let owned_key = key.to_owned();
        let shared = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!(key = %owned_key, error = %e, "Order fetch task did not complete");
                    Err(OrdersError::internal(format!("order fetch task failed: {}", e)))
                }
            }
        }
        .boxed()
        .shared();

        flights.insert(key.to_owned(), shared.clone());
        Flight::Pending {
            fetch: shared,
            leader: true,
        }
    }

    /// Number of keys with a fetch in progress.
    pub(crate) fn len(&self) -> usize {
        self.flights.lock().len()
    }
}

/// Removes the registry entry when the fetch task ends, including by panic.
struct FlightGuard {
    registry: Arc<SingleFlight>,
    key: String,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.registry.flights.lock().remove(&self.key);
    }
}
