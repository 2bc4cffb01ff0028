//! Background removal of expired cache entries.

use super::cached_orders::CacheInner;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Handle to the periodic sweep task.
///
/// Dropping the handle cancels the task without waiting for it.
pub(crate) struct Sweeper {
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Sweeper {
    /// Spawns the sweep loop. A zero `period` disables sweeping; expired
    /// entries are then only hidden by lookups, never removed.
    pub(crate) fn spawn(inner: Arc<CacheInner>, period: Duration) -> Self {
        let cancel = CancellationToken::new();

        let handle = if period.is_zero() {
            info!("Cache sweep disabled");
            None
        } else {
            let token = cancel.clone();
            Some(tokio::spawn(async move {
                run_sweep_loop(inner, period, token).await;
            }))
        };

        Self {
            cancel,
            handle: Mutex::new(handle),
        }
    }

    /// Cancels the sweep and waits for the task to exit.
    ///
    /// Safe to call more than once; later calls return immediately.
    pub(crate) async fn shutdown(&self) {
        self.cancel.cancel();

        let handle = self.handle.lock().take();
        match handle {
            Some(handle) => {
                if let Err(e) = handle.await {
                    debug!(error = %e, "Cache sweep task ended abnormally");
                }
            }
            None => debug!("Cache sweep already stopped"),
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run_sweep_loop(inner: Arc<CacheInner>, period: Duration, cancel: CancellationToken) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    debug!(interval_ms = period.as_millis() as u64, "Cache sweep started");

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!("Cache sweep shutting down");
                break;
            }
            _ = ticker.tick() => {
                let removed = inner.sweep_expired(Instant::now());
                if removed > 0 {
                    debug!(removed, "Swept expired cache entries");
                }
            }
        }
    }
}
