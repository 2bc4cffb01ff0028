//! Event stream abstraction consumed by the ingestion loop.

use async_trait::async_trait;
use bytes::Bytes;
use orders_core::OrdersResult;

/// One message read from a partition of the event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
    /// Key the producer attached, if any. Informational only.
    pub key_hint: Option<String>,
    /// Raw order document.
    pub payload: Bytes,
    /// Partition the message was read from.
    pub partition: String,
    /// Position within the partition, as the transport reports it.
    pub offset: String,
}

/// A partitioned, at-least-once message source with explicit commits.
///
/// Messages of one partition are delivered in order. A message that is
/// fetched but never committed is delivered again, at the latest after the
/// consumer restarts.
#[async_trait]
pub trait EventStream: Send + Sync {
    /// Name of the partition this stream reads.
    fn partition(&self) -> &str;

    /// Waits for the next message.
    ///
    /// May block indefinitely; callers stop waiting by dropping the future.
    async fn fetch_next(&self) -> OrdersResult<StreamMessage>;

    /// Marks `message` as processed so it is not delivered again.
    async fn commit(&self, message: &StreamMessage) -> OrdersResult<()>;
}
