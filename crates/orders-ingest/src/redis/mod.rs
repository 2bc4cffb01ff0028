//! Redis Streams transport for ingestion.

mod stream;

pub use stream::RedisEventStream;

use deadpool_redis::{Config, Pool, Runtime};
use orders_config::StreamConfig;
use orders_core::{OrdersError, OrdersResult};
use tracing::info;

/// Create a Redis connection pool.
///
/// Every consumer holds a connection while blocked in a read, so the pool
/// gets one connection per stream key plus one spare.
pub async fn create_pool(config: &StreamConfig) -> OrdersResult<Pool> {
    info!("Creating Redis connection pool for ingestion...");

    let cfg = Config::from_url(&config.url);

    let pool = cfg
        .builder()
        .map_err(|e| OrdersError::Configuration(format!("Invalid Redis config: {}", e)))?
        .max_size(config.streams.len().max(1) + 1)
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| OrdersError::Configuration(format!("Failed to create pool: {}", e)))?;

    // Test connection
    let mut conn = pool
        .get()
        .await
        .map_err(|e| OrdersError::Stream(format!("Failed to get Redis connection: {}", e)))?;
    redis::cmd("PING").query_async::<String>(&mut *conn).await?;

    info!("Redis connection pool created successfully");

    Ok(pool)
}
