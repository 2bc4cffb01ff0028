//! Orders Ingest - Event Stream Consumers
//!
//! Feeds order documents from an event stream into the cache write path:
//! - One consumer per partition, processing messages strictly in order
//! - Malformed messages are committed without being applied
//! - Failed writes are retried on the same message until they succeed
//! - A message is committed only after its write succeeded
//! - Redis Streams transport with consumer groups
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  Redis stream "orders"                                    │
//! │      │  XREADGROUP (pending backlog first, then ">")      │
//! │      ▼                                                    │
//! │  IngestionConsumer                                        │
//! │      │  parse_and_validate ── malformed ──► XACK (skip)   │
//! │      ▼                                                    │
//! │  OrderWriter::upsert ── error ──► wait 300ms, retry       │
//! │      │                                                    │
//! │      ▼                                                    │
//! │  XACK                                                     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use orders_ingest::{IngestionConsumer, ConsumerConfig, RedisEventStream};
//!
//! let pool = orders_ingest::redis::create_pool(&config.stream).await?;
//! let stream = RedisEventStream::connect(pool, "orders", "group", "consumer-1", block).await?;
//! let consumer = IngestionConsumer::new(Arc::new(stream), cache, ConsumerConfig::default());
//!
//! tokio::spawn(async move { consumer.run(cancel).await });
//! ```

pub mod consumer;
pub mod memory;
pub mod metrics;
pub mod redis;
pub mod stream;

pub use consumer::{ConsumerConfig, ConsumerStats, ConsumerStatsSnapshot, IngestionConsumer, Outcome};
pub use memory::MemoryEventStream;
pub use metrics::{register_metrics, IngestMetrics};
pub use redis::RedisEventStream;
pub use stream::{EventStream, StreamMessage};
