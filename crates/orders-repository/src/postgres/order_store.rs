//! PostgreSQL order store implementation.

use crate::{traits::OrderStore, DatabasePool};
use async_trait::async_trait;
use bytes::Bytes;
use orders_core::{OrdersError, OrdersResult};
use sqlx::FromRow;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// PostgreSQL order store.
///
/// Every query is bounded by `query_timeout`; an elapsed deadline surfaces
/// as `OrdersError::Timeout`.
#[derive(Clone)]
pub struct PgOrderStore {
    pool: Arc<DatabasePool>,
    query_timeout: Duration,
}

impl PgOrderStore {
    /// Creates a new store over `pool`.
    #[must_use]
    pub fn new(pool: Arc<DatabasePool>, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    async fn bounded<T, F>(&self, op: &str, fut: F) -> OrdersResult<T>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.query_timeout, fut).await {
            Ok(result) => result.map_err(OrdersError::from),
            Err(_) => Err(OrdersError::Timeout(format!(
                "{} exceeded {:?}",
                op, self.query_timeout
            ))),
        }
    }
}

/// Database row representation of an order.
#[derive(Debug, FromRow)]
struct OrderRow {
    order_uid: String,
    data: String,
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn get_by_key(&self, key: &str) -> OrdersResult<Bytes> {
        debug!("Loading order: {}", key);

        let data: Option<String> = self
            .bounded(
                "get_by_key",
                sqlx::query_scalar::<_, String>(
                    "SELECT data::text FROM orders WHERE order_uid = $1",
                )
                .bind(key)
                .fetch_optional(self.pool.inner()),
            )
            .await?;

        data.map(Bytes::from)
            .ok_or_else(|| OrdersError::order_not_found(key))
    }

    async fn upsert(&self, key: &str, payload: Bytes) -> OrdersResult<()> {
        debug!("Upserting order: {}", key);

        let json = std::str::from_utf8(&payload)
            .map_err(|e| OrdersError::invalid_message(format!("payload is not utf-8: {}", e)))?;

        self.bounded(
            "upsert",
            sqlx::query(
                r#"
                INSERT INTO orders (order_uid, data, updated_at)
                VALUES ($1, $2::jsonb, NOW())
                ON CONFLICT (order_uid)
                DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()
                "#,
            )
            .bind(key)
            .bind(json)
            .execute(self.pool.inner()),
        )
        .await?;

        Ok(())
    }

    async fn list_recent(&self, limit: u32) -> OrdersResult<HashMap<String, Bytes>> {
        debug!("Listing {} most recent orders", limit);

        let rows = self
            .bounded(
                "list_recent",
                sqlx::query_as::<_, OrderRow>(
                    r#"
                    SELECT order_uid, data::text AS data
                    FROM orders
                    ORDER BY updated_at DESC
                    LIMIT $1
                    "#,
                )
                .bind(i64::from(limit))
                .fetch_all(self.pool.inner()),
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.order_uid, Bytes::from(row.data)))
            .collect())
    }
}

impl std::fmt::Debug for PgOrderStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgOrderStore")
            .field("pool", &self.pool)
            .field("query_timeout", &self.query_timeout)
            .finish()
    }
}
