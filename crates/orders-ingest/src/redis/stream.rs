//! Consumer-group reader over one Redis stream.

use crate::stream::{EventStream, StreamMessage};
use async_trait::async_trait;
use bytes::Bytes;
use deadpool_redis::Pool;
use orders_core::{OrdersError, OrdersResult};
use parking_lot::Mutex;
use redis::streams::{StreamId, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, RedisError};
use std::time::Duration;
use tracing::{debug, info};

/// Field holding the order document.
pub const PAYLOAD_FIELD: &str = "payload";
/// Optional field holding the producer's key.
pub const KEY_FIELD: &str = "key";

/// Where the next read starts.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ReadCursor {
    /// Re-reading entries delivered to this consumer but never acknowledged,
    /// starting after the given id.
    Backlog(String),
    /// Reading entries never delivered to any consumer of the group.
    Live,
}

/// [`EventStream`] over a Redis stream read through a consumer group.
///
/// On start the group is created if missing. The first reads drain this
/// consumer's pending entries, which covers messages fetched but not
/// acknowledged before a restart; after that only new entries are read.
/// `commit` acknowledges the entry.
pub struct RedisEventStream {
    pool: Pool,
    stream_key: String,
    group: String,
    consumer: String,
    block: Duration,
    cursor: Mutex<ReadCursor>,
}

impl RedisEventStream {
    /// Connects to `stream_key` as `consumer` within `group`.
    pub async fn connect(
        pool: Pool,
        stream_key: impl Into<String>,
        group: impl Into<String>,
        consumer: impl Into<String>,
        block: Duration,
    ) -> OrdersResult<Self> {
        let stream = Self {
            pool,
            stream_key: stream_key.into(),
            group: group.into(),
            consumer: consumer.into(),
            block,
            cursor: Mutex::new(ReadCursor::Backlog("0".to_string())),
        };
        stream.ensure_group().await?;
        Ok(stream)
    }

    async fn conn(&self) -> OrdersResult<deadpool_redis::Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| OrdersError::Stream(format!("Failed to get Redis connection: {}", e)))
    }

    async fn ensure_group(&self) -> OrdersResult<()> {
        let mut conn = self.conn().await?;
        let created: Result<(), RedisError> = conn
            .xgroup_create_mkstream(&self.stream_key, &self.group, "0")
            .await;

        match created {
            Ok(()) => {
                info!(stream = %self.stream_key, group = %self.group, "Created consumer group");
                Ok(())
            }
            Err(e) if is_busy_group(&e) => {
                debug!(stream = %self.stream_key, group = %self.group, "Consumer group exists");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Issues one read from the current cursor. `None` means nothing arrived
    /// within the block time, or the backlog just ran dry.
    async fn read_once(&self) -> OrdersResult<Option<StreamMessage>> {
        let cursor = self.cursor.lock().clone();
        let (start_id, block) = match &cursor {
            ReadCursor::Backlog(after) => (after.clone(), None),
            ReadCursor::Live => (">".to_string(), Some(self.block)),
        };

        let mut options = StreamReadOptions::default()
            .group(&self.group, &self.consumer)
            .count(1);
        if let Some(block) = block {
            options = options.block(usize::try_from(block.as_millis()).unwrap_or(usize::MAX));
        }

        let mut conn = self.conn().await?;
        let reply: Option<StreamReadReply> = conn
            .xread_options(&[&self.stream_key], &[&start_id], &options)
            .await?;

        let entry = reply
            .and_then(|reply| reply.keys.into_iter().next())
            .and_then(|key| key.ids.into_iter().next());

        match (entry, cursor) {
            (Some(entry), ReadCursor::Backlog(_)) => {
                *self.cursor.lock() = ReadCursor::Backlog(entry.id.clone());
                debug!(stream = %self.stream_key, id = %entry.id, "Redelivering pending entry");
                Ok(Some(message_from_entry(&self.stream_key, &entry)))
            }
            (Some(entry), ReadCursor::Live) => Ok(Some(message_from_entry(&self.stream_key, &entry))),
            (None, ReadCursor::Backlog(_)) => {
                *self.cursor.lock() = ReadCursor::Live;
                debug!(stream = %self.stream_key, "Pending backlog drained");
                Ok(None)
            }
            (None, ReadCursor::Live) => Ok(None),
        }
    }
}

#[async_trait]
impl EventStream for RedisEventStream {
    fn partition(&self) -> &str {
        &self.stream_key
    }

    async fn fetch_next(&self) -> OrdersResult<StreamMessage> {
        loop {
            if let Some(message) = self.read_once().await? {
                return Ok(message);
            }
        }
    }

    async fn commit(&self, message: &StreamMessage) -> OrdersResult<()> {
        let mut conn = self.conn().await?;
        let _acked: i64 = conn
            .xack(&self.stream_key, &self.group, &[&message.offset])
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for RedisEventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisEventStream")
            .field("stream_key", &self.stream_key)
            .field("group", &self.group)
            .field("consumer", &self.consumer)
            .field("cursor", &*self.cursor.lock())
            .finish()
    }
}

fn is_busy_group(err: &RedisError) -> bool {
    err.code() == Some("BUSYGROUP") || err.to_string().contains("BUSYGROUP")
}

/// Converts a stream entry into a message.
///
/// An entry without a payload field (for example one deleted while pending)
/// becomes an empty payload, which the consumer rejects and acknowledges.
fn message_from_entry(stream_key: &str, entry: &StreamId) -> StreamMessage {
    let payload: Option<Vec<u8>> = entry.get(PAYLOAD_FIELD);
    let key_hint: Option<String> = entry.get(KEY_FIELD);

    StreamMessage {
        key_hint,
        payload: payload.map(Bytes::from).unwrap_or_default(),
        partition: stream_key.to_string(),
        offset: entry.id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use redis::Value;
    use std::collections::HashMap;

    fn entry(id: &str, fields: &[(&str, &str)]) -> StreamId {
        StreamId {
            id: id.to_string(),
            map: fields
                .iter()
                .map(|(k, v)| ((*k).to_string(), Value::BulkString(v.as_bytes().to_vec())))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn test_message_from_entry() {
        let message = message_from_entry(
            "orders",
            &entry("1700000000000-0", &[("payload", r#"{"order_uid":"a"}"#), ("key", "a")]),
        );

        assert_eq!(message.partition, "orders");
        assert_eq!(message.offset, "1700000000000-0");
        assert_eq!(message.key_hint.as_deref(), Some("a"));
        assert_eq!(message.payload, Bytes::from_static(br#"{"order_uid":"a"}"#));
    }

    #[test]
    fn test_entry_without_payload_is_empty() {
        let message = message_from_entry("orders", &entry("1-0", &[]));
        assert!(message.payload.is_empty());
        assert!(message.key_hint.is_none());
    }

    #[test]
    fn test_busy_group_detection() {
        let err = RedisError::from((
            redis::ErrorKind::ExtensionError,
            "BUSYGROUP",
            "Consumer Group name already exists".to_string(),
        ));
        assert!(is_busy_group(&err));

        let other = RedisError::from((redis::ErrorKind::IoError, "connection reset"));
        assert!(!is_busy_group(&other));
    }
}
