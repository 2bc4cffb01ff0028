//! The ingestion loop: fetch, validate, apply, commit.

use crate::metrics::IngestMetrics;
use crate::stream::{EventStream, StreamMessage};
use orders_config::StreamConfig;
use orders_core::{parse_and_validate, OrderWriter};
use orders_resilience::{sleep_or_cancelled, RetryOutcome, RetryPolicy};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

/// Consumer timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumerConfig {
    /// Wait after a failed fetch.
    pub fetch_backoff: Duration,
    /// Wait after a failed apply before retrying the same message.
    pub apply_backoff: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            fetch_backoff: Duration::from_millis(200),
            apply_backoff: Duration::from_millis(300),
        }
    }
}

impl From<&StreamConfig> for ConsumerConfig {
    fn from(config: &StreamConfig) -> Self {
        Self {
            fetch_backoff: config.fetch_backoff(),
            apply_backoff: config.apply_backoff(),
        }
    }
}

/// What happened to one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Written through and committed.
    Applied,
    /// Malformed; committed without being applied.
    Skipped,
    /// Cancelled before the write succeeded; left uncommitted.
    Cancelled,
}

/// Running counters of one consumer.
#[derive(Debug, Default)]
pub struct ConsumerStats {
    fetched: AtomicU64,
    applied: AtomicU64,
    skipped: AtomicU64,
    fetch_failures: AtomicU64,
    apply_failures: AtomicU64,
    commit_failures: AtomicU64,
}

/// Copy of [`ConsumerStats`] at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConsumerStatsSnapshot {
    /// Messages handed to the consumer, redeliveries included.
    pub fetched: u64,
    /// Messages written through and committed.
    pub applied: u64,
    /// Malformed messages committed without being applied.
    pub skipped: u64,
    /// Failed fetch calls.
    pub fetch_failures: u64,
    /// Failed write attempts; one message can fail several times.
    pub apply_failures: u64,
    /// Failed commits.
    pub commit_failures: u64,
}

impl ConsumerStats {
    /// Returns the current counter values.
    #[must_use]
    pub fn snapshot(&self) -> ConsumerStatsSnapshot {
        ConsumerStatsSnapshot {
            fetched: self.fetched.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            apply_failures: self.apply_failures.load(Ordering::Relaxed),
            commit_failures: self.commit_failures.load(Ordering::Relaxed),
        }
    }
}

/// Drives one partition of the event stream into the order write path.
///
/// Each message is validated, written through `writer` and committed only
/// after the write succeeded. Malformed messages are committed without being
/// applied so they cannot stall the partition. Failed writes are retried on
/// the same message with a fixed backoff until they succeed or the consumer
/// is cancelled.
pub struct IngestionConsumer {
    stream: Arc<dyn EventStream>,
    writer: Arc<dyn OrderWriter>,
    config: ConsumerConfig,
    stats: Arc<ConsumerStats>,
}

impl IngestionConsumer {
    /// Creates a consumer over one partition.
    #[must_use]
    pub fn new(
        stream: Arc<dyn EventStream>,
        writer: Arc<dyn OrderWriter>,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            stream,
            writer,
            config,
            stats: Arc::new(ConsumerStats::default()),
        }
    }

    /// Returns the consumer's counters.
    #[must_use]
    pub fn stats(&self) -> Arc<ConsumerStats> {
        Arc::clone(&self.stats)
    }

    /// Runs until `cancel` fires.
    ///
    /// A message whose write is still failing when the token fires is left
    /// uncommitted and will be delivered again.
    pub async fn run(&self, cancel: CancellationToken) {
        let partition = self.stream.partition().to_owned();
        let span = tracing::info_span!("consumer", partition = %partition);

        async {
            info!("Ingestion consumer started");

            loop {
                let fetched = tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    fetched = self.stream.fetch_next() => fetched,
                };

                let message = match fetched {
                    Ok(message) => message,
                    Err(e) => {
                        self.stats.fetch_failures.fetch_add(1, Ordering::Relaxed);
                        IngestMetrics::fetch_failed(&partition);
                        warn!(error = %e, "Fetch failed; backing off");
                        if sleep_or_cancelled(self.config.fetch_backoff, &cancel).await {
                            continue;
                        }
                        break;
                    }
                };

                if self.process(&message, &cancel).await == Outcome::Cancelled {
                    break;
                }
            }

            let stats = self.stats.snapshot();
            info!(
                applied = stats.applied,
                skipped = stats.skipped,
                "Ingestion consumer stopped"
            );
        }
        .instrument(span)
        .await;
    }

    /// Handles one fetched message to completion.
    pub async fn process(&self, message: &StreamMessage, cancel: &CancellationToken) -> Outcome {
        self.stats.fetched.fetch_add(1, Ordering::Relaxed);
        IngestMetrics::fetched(&message.partition);

        let order = match parse_and_validate(&message.payload) {
            Ok(order) => order,
            Err(e) => {
                warn!(
                    partition = %message.partition,
                    offset = %message.offset,
                    error = %e,
                    "Skipping malformed message"
                );
                self.stats.skipped.fetch_add(1, Ordering::Relaxed);
                IngestMetrics::skipped(&message.partition);
                self.commit(message).await;
                return Outcome::Skipped;
            }
        };

        let key = order.order_uid.as_str();
        if let Some(hint) = message.key_hint.as_deref() {
            if hint != key {
                debug!(
                    offset = %message.offset,
                    key_hint = hint,
                    order_uid = key,
                    "Message key differs from order_uid; using order_uid"
                );
            }
        }

        let writer = &self.writer;
        let stats = &self.stats;
        let policy = RetryPolicy::fixed(self.config.apply_backoff);
        let outcome = policy
            .run_until_cancelled(cancel, move || {
                let payload = message.payload.clone();
                async move {
                    let result = writer.upsert(key, payload).await;
                    if let Err(e) = &result {
                        stats.apply_failures.fetch_add(1, Ordering::Relaxed);
                        IngestMetrics::apply_failed(&message.partition, e.error_code());
                        warn!(
                            key,
                            partition = %message.partition,
                            offset = %message.offset,
                            error = %e,
                            retriable = e.is_retriable(),
                            "Apply failed; retrying"
                        );
                    }
                    result
                }
            })
            .await;

        match outcome {
            RetryOutcome::Succeeded(()) => {
                self.commit(message).await;
                self.stats.applied.fetch_add(1, Ordering::Relaxed);
                IngestMetrics::applied(&message.partition);
                debug!(key, offset = %message.offset, "Message applied");
                Outcome::Applied
            }
            RetryOutcome::Cancelled => {
                info!(
                    key,
                    offset = %message.offset,
                    "Cancelled before apply succeeded; message left uncommitted"
                );
                Outcome::Cancelled
            }
        }
    }

    async fn commit(&self, message: &StreamMessage) {
        if let Err(e) = self.stream.commit(message).await {
            self.stats.commit_failures.fetch_add(1, Ordering::Relaxed);
            IngestMetrics::commit_failed(&message.partition);
            warn!(
                partition = %message.partition,
                offset = %message.offset,
                error = %e,
                "Commit failed; message may be redelivered"
            );
        }
    }
}
