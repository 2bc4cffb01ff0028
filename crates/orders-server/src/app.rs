//! Application builder.

use crate::startup::{print_startup_info, shutdown_signal};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use orders_config::{AppConfig, ConfigLoader, StreamConfig};
use orders_core::{OrderWriter, OrdersError, OrdersResult};
use orders_ingest::{ConsumerConfig, IngestionConsumer, RedisEventStream};
use orders_repository::{create_pool, OrderStore, PgOrderStore};
use orders_rest::{create_router, AppState};
use orders_service::{warm_up, CacheConfig, CachedOrders};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Application builder for constructing the server.
pub struct AppBuilder {
    config: Option<AppConfig>,
}

impl AppBuilder {
    /// Creates a new application builder.
    pub fn new() -> Self {
        Self { config: None }
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds and runs the application until a shutdown signal arrives.
    ///
    /// Startup order: metrics recorder, database and migrations, cache,
    /// warm-up, stream consumers, HTTP listener. Shutdown runs the other
    /// way: stop accepting requests, cancel the consumers and wait for them,
    /// stop the cache sweeper, close the database pool.
    pub async fn run(self) -> OrdersResult<()> {
        let config = self.config.unwrap_or_default();
        ConfigLoader::validate_config(&config)?;

        let metrics = install_metrics(config.observability.metrics_enabled)?;

        // Database
        let db_pool = create_pool(&config.database).await?;
        if config.database.run_migrations {
            db_pool.run_migrations().await?;
        }

        // Cache over the store
        let store: Arc<dyn OrderStore> = Arc::new(PgOrderStore::new(
            Arc::clone(&db_pool),
            config.database.query_timeout(),
        ));
        let cache = Arc::new(CachedOrders::new(
            Arc::clone(&store),
            CacheConfig::from(&config.cache),
        ));

        warm_up(
            store.as_ref(),
            cache.as_ref(),
            config.cache.warmup_limit,
            config.cache.warmup_timeout(),
        )
        .await;

        // Ingestion
        let cancel = CancellationToken::new();
        let consumers = start_consumers(&config.stream, cache.clone(), &cancel).await?;

        // HTTP
        let mut state = AppState::new(cache.clone(), config.server.request_timeout())
            .with_database(Arc::clone(&db_pool));
        if let Some(handle) = metrics {
            state = state.with_metrics(handle);
        }
        let router = create_router(state, &config.observability.metrics_path);

        let addr = config.server.addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| OrdersError::Internal(format!("Failed to bind {}: {}", addr, e)))?;

        print_startup_info(&config);
        info!("Starting REST server on http://{}", addr);

        let served = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| OrdersError::Internal(format!("REST server error: {}", e)));

        // Teardown runs even when the server failed.
        cancel.cancel();
        stop_consumers(consumers, config.server.shutdown_grace()).await;
        cache.shutdown().await;
        db_pool.close().await;

        info!("Server shutdown complete");
        served
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs the global Prometheus recorder and describes every metric.
///
/// Returns `None` when metrics are disabled.
pub fn install_metrics(enabled: bool) -> OrdersResult<Option<PrometheusHandle>> {
    if !enabled {
        info!("Metrics disabled");
        return Ok(None);
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| OrdersError::Configuration(format!("Failed to install metrics recorder: {}", e)))?;

    orders_service::metrics::register_metrics();
    orders_ingest::register_metrics();

    Ok(Some(handle))
}

/// Spawns one consumer per configured stream key.
///
/// Returns no tasks when ingestion is disabled.
pub async fn start_consumers(
    config: &StreamConfig,
    writer: Arc<dyn OrderWriter>,
    cancel: &CancellationToken,
) -> OrdersResult<Vec<JoinHandle<()>>> {
    if !config.enabled {
        info!("Stream ingestion disabled");
        return Ok(Vec::new());
    }

    let pool = orders_ingest::redis::create_pool(config).await?;
    let consumer_config = ConsumerConfig::from(config);

    let mut handles = Vec::with_capacity(config.streams.len());
    for key in &config.streams {
        let stream = RedisEventStream::connect(
            pool.clone(),
            key.clone(),
            config.group.clone(),
            config.consumer.clone(),
            config.block(),
        )
        .await?;

        let consumer = IngestionConsumer::new(Arc::new(stream), Arc::clone(&writer), consumer_config);
        let token = cancel.clone();
        handles.push(tokio::spawn(async move { consumer.run(token).await }));
        info!(stream = %key, group = %config.group, "Stream consumer started");
    }

    Ok(handles)
}

/// Waits for cancelled consumers to return, giving up after `grace`.
pub async fn stop_consumers(handles: Vec<JoinHandle<()>>, grace: Duration) {
    if handles.is_empty() {
        return;
    }

    let count = handles.len();
    let drain = async {
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Consumer task failed: {}", e);
            }
        }
    };

    if tokio::time::timeout(grace, drain).await.is_err() {
        warn!(count, ?grace, "Consumers did not stop within the grace period");
    } else {
        info!(count, "Stream consumers stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_app_builder_new() {
        let builder = AppBuilder::new();
        assert!(builder.config.is_none());
    }

    #[test]
    fn test_app_builder_with_config() {
        let builder = AppBuilder::default().with_config(AppConfig::default());
        assert!(builder.config.is_some());
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_config() {
        let mut config = AppConfig::default();
        config.database.url = String::new();

        let result = AppBuilder::new().with_config(config).run().await;
        assert!(matches!(result, Err(OrdersError::Configuration(_))));
    }

    #[test]
    fn test_metrics_disabled() {
        assert!(install_metrics(false).unwrap().is_none());
    }

    struct NoopWriter;

    #[async_trait::async_trait]
    impl OrderWriter for NoopWriter {
        async fn upsert(&self, _key: &str, _payload: bytes::Bytes) -> OrdersResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_disabled_stream_starts_no_consumers() {
        let config = StreamConfig {
            enabled: false,
            ..StreamConfig::default()
        };
        let handles = start_consumers(&config, Arc::new(NoopWriter), &CancellationToken::new())
            .await
            .unwrap();
        assert!(handles.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_consumers_waits_for_cancelled_tasks() {
        let cancel = CancellationToken::new();
        let finished = Arc::new(AtomicBool::new(false));

        let token = cancel.clone();
        let flag = finished.clone();
        let handle = tokio::spawn(async move {
            token.cancelled().await;
            tokio::time::sleep(Duration::from_millis(50)).await;
            flag.store(true, Ordering::SeqCst);
        });

        cancel.cancel();
        stop_consumers(vec![handle], Duration::from_secs(5)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_consumers_gives_up_after_grace() {
        let handle = tokio::spawn(std::future::pending::<()>());
        let started = tokio::time::Instant::now();

        stop_consumers(vec![handle], Duration::from_millis(100)).await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
