//! Application state for Axum handlers.

use metrics_exporter_prometheus::PrometheusHandle;
use orders_repository::DatabasePool;
use orders_service::OrderCache;
use std::sync::Arc;
use std::time::Duration;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<dyn OrderCache>,
    /// Upper bound on serving one order lookup.
    pub request_timeout: Duration,
    /// Checked by the readiness probe when present.
    pub database: Option<Arc<DatabasePool>>,
    /// Rendered at the metrics endpoint when present.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(cache: Arc<dyn OrderCache>, request_timeout: Duration) -> Self {
        Self {
            cache,
            request_timeout,
            database: None,
            metrics: None,
        }
    }

    /// Sets the database pool probed by `/ready`.
    #[must_use]
    pub fn with_database(mut self, database: Arc<DatabasePool>) -> Self {
        self.database = Some(database);
        self
    }

    /// Sets the Prometheus handle rendered at the metrics endpoint.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
