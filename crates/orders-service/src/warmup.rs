//! Startup preload of recently written orders.

use crate::OrderCache;
use orders_repository::OrderStore;
use orders_resilience::with_timeout;
use std::time::Duration;
use tracing::{info, warn};

/// Loads up to `limit` recent orders from `store` into `cache`.
///
/// Returns the number of entries preloaded. A store failure or an elapsed
/// `timeout` is logged and leaves the cache empty; startup carries on and
/// entries are filled on demand instead.
pub async fn warm_up(
    store: &dyn OrderStore,
    cache: &dyn OrderCache,
    limit: u32,
    timeout: Duration,
) -> usize {
    if limit == 0 {
        info!("Cache warm-up disabled");
        return 0;
    }

    match with_timeout(timeout, || store.list_recent(limit)).await {
        Ok(entries) => {
            let count = entries.len();
            cache.bulk_preload(entries);
            info!(count, limit, "Cache warmed up");
            count
        }
        Err(e) => {
            warn!(error = %e, "Cache warm-up failed; starting with an empty cache");
            0
        }
    }
}
