//! Consumer behaviour against the in-memory stream and store.

use async_trait::async_trait;
use bytes::Bytes;
use orders_core::{OrderWriter, OrdersError, OrdersResult};
use orders_ingest::{ConsumerConfig, EventStream, IngestionConsumer, MemoryEventStream, Outcome};
use orders_repository::InMemoryOrderStore;
use orders_service::{CacheConfig, CachedOrders, OrderCache};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn order(uid: &str, track: &str) -> Bytes {
    Bytes::from(format!(
        r#"{{"order_uid":"{uid}","track_number":"{track}","items":[{{"chrt_id":1,"price":100}}]}}"#
    ))
}

/// Writer that fails a configured number of times, then delegates.
struct FlakyWriter {
    failures_left: AtomicU32,
    attempts: Mutex<Vec<(String, Instant)>>,
    inner: Arc<dyn OrderWriter>,
}

impl FlakyWriter {
    fn new(failures: u32, inner: Arc<dyn OrderWriter>) -> Self {
        Self {
            failures_left: AtomicU32::new(failures),
            attempts: Mutex::new(Vec::new()),
            inner,
        }
    }

    fn attempt_times(&self) -> Vec<Instant> {
        self.attempts.lock().iter().map(|(_, at)| *at).collect()
    }

    fn attempt_keys(&self) -> Vec<String> {
        self.attempts.lock().iter().map(|(key, _)| key.clone()).collect()
    }
}

#[async_trait]
impl OrderWriter for FlakyWriter {
    async fn upsert(&self, key: &str, payload: Bytes) -> OrdersResult<()> {
        self.attempts.lock().push((key.to_string(), Instant::now()));
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(OrdersError::Database("connection refused".to_string()));
        }
        self.inner.upsert(key, payload).await
    }
}

struct Harness {
    stream: Arc<MemoryEventStream>,
    store: Arc<InMemoryOrderStore>,
    cache: Arc<CachedOrders>,
    writer: Arc<FlakyWriter>,
    consumer: Arc<IngestionConsumer>,
}

fn harness(failures: u32) -> Harness {
    let stream = Arc::new(MemoryEventStream::new("orders"));
    let store = Arc::new(InMemoryOrderStore::new());
    let cache = Arc::new(CachedOrders::new(store.clone(), CacheConfig::default()));
    let writer = Arc::new(FlakyWriter::new(failures, cache.clone()));
    let consumer = Arc::new(IngestionConsumer::new(
        stream.clone(),
        writer.clone(),
        ConsumerConfig::default(),
    ));
    Harness {
        stream,
        store,
        cache,
        writer,
        consumer,
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test(start_paused = true)]
async fn test_valid_message_is_applied_then_committed() {
    let h = harness(0);
    let payload = order("A", "T1");
    h.stream.push(Some("A"), payload.clone());

    let message = h.stream.fetch_next().await.unwrap();
    let outcome = h.consumer.process(&message, &CancellationToken::new()).await;

    assert_eq!(outcome, Outcome::Applied);
    assert_eq!(h.store.peek("A"), Some(payload.clone()));
    assert_eq!(h.stream.committed(), vec!["1".to_string()]);
    assert_eq!(h.stream.pending_count(), 0);

    // Write-through: the read is served without touching the store.
    let reads = h.store.read_count();
    assert_eq!(h.cache.get("A").await.unwrap(), payload);
    assert_eq!(h.store.read_count(), reads);
}

#[tokio::test(start_paused = true)]
async fn test_redelivered_message_is_idempotent() {
    let h = harness(0);
    let payload = order("A", "T1");
    h.stream.push(None, payload.clone());
    let cancel = CancellationToken::new();

    let message = h.stream.fetch_next().await.unwrap();
    assert_eq!(h.consumer.process(&message, &cancel).await, Outcome::Applied);
    assert_eq!(h.consumer.process(&message, &cancel).await, Outcome::Applied);

    assert_eq!(h.store.len(), 1);
    assert_eq!(h.store.peek("A"), Some(payload.clone()));
    assert_eq!(h.cache.get("A").await.unwrap(), payload);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_messages_are_committed_without_apply() {
    let h = harness(0);
    let cancel = CancellationToken::new();
    let poison = [
        r#"{"track_number":"T","items":[{}]}"#,
        r#"{"order_uid":"A","items":[{}]}"#,
        r#"{"order_uid":"A","track_number":"T","items":[]}"#,
        "not json",
        "",
    ];
    for raw in poison {
        h.stream.push(None, raw);
    }

    for _ in 0..poison.len() {
        let message = h.stream.fetch_next().await.unwrap();
        assert_eq!(h.consumer.process(&message, &cancel).await, Outcome::Skipped);
    }

    assert!(h.writer.attempt_keys().is_empty());
    assert!(h.store.is_empty());
    assert_eq!(h.stream.committed().len(), poison.len());
    assert_eq!(h.consumer.stats().snapshot().skipped, poison.len() as u64);
}

#[tokio::test(start_paused = true)]
async fn test_failed_apply_is_retried_with_fixed_backoff() {
    let h = harness(3);
    let payload = order("A", "T1");
    h.stream.push(None, payload.clone());

    let message = h.stream.fetch_next().await.unwrap();
    let outcome = h.consumer.process(&message, &CancellationToken::new()).await;

    assert_eq!(outcome, Outcome::Applied);
    let times = h.writer.attempt_times();
    assert_eq!(times.len(), 4);
    for pair in times.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_millis(300));
    }
    assert_eq!(h.store.peek("A"), Some(payload));
    assert_eq!(h.stream.committed(), vec!["1".to_string()]);

    let stats = h.consumer.stats().snapshot();
    assert_eq!(stats.apply_failures, 3);
    assert_eq!(stats.applied, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_apply_retry_leaves_message_uncommitted() {
    let h = harness(u32::MAX);
    h.stream.push(None, order("A", "T1"));
    let message = h.stream.fetch_next().await.unwrap();

    let cancel = CancellationToken::new();
    let consumer = h.consumer.clone();
    let token = cancel.clone();
    let task = tokio::spawn(async move { consumer.process(&message, &token).await });

    tokio::time::sleep(Duration::from_millis(1_000)).await;
    cancel.cancel();

    assert_eq!(task.await.unwrap(), Outcome::Cancelled);
    assert!(h.writer.attempt_times().len() >= 2);
    assert!(h.stream.committed().is_empty());
    assert_eq!(h.stream.pending_count(), 1);
    assert!(h.store.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_fetch_failures_back_off_then_recover() {
    let h = harness(0);
    h.stream.fail_next_fetches(2);
    h.stream.push(None, order("A", "T1"));

    let cancel = CancellationToken::new();
    let started = Instant::now();
    let consumer = h.consumer.clone();
    let token = cancel.clone();
    let task = tokio::spawn(async move { consumer.run(token).await });

    let stream = h.stream.clone();
    wait_until(|| !stream.committed().is_empty()).await;
    let elapsed = started.elapsed();
    cancel.cancel();
    task.await.unwrap();

    assert_eq!(h.stream.fetch_failures(), 2);
    assert!(elapsed >= Duration::from_millis(400));
    assert_eq!(h.consumer.stats().snapshot().fetch_failures, 2);
    assert!(h.store.peek("A").is_some());
}

#[tokio::test(start_paused = true)]
async fn test_commit_failure_does_not_stop_consumer() {
    let h = harness(0);
    h.stream.fail_next_commits(1);
    h.stream.push(None, order("A", "T1"));
    h.stream.push(None, order("B", "T2"));

    let cancel = CancellationToken::new();
    let consumer = h.consumer.clone();
    let token = cancel.clone();
    let task = tokio::spawn(async move { consumer.run(token).await });

    let stats = h.consumer.stats();
    wait_until(|| stats.snapshot().applied == 2).await;
    cancel.cancel();
    task.await.unwrap();

    assert_eq!(h.stream.committed(), vec!["2".to_string()]);
    assert_eq!(h.stream.pending_count(), 1);
    assert_eq!(stats.snapshot().commit_failures, 1);
    assert!(h.store.peek("A").is_some());
    assert!(h.store.peek("B").is_some());
}

#[tokio::test(start_paused = true)]
async fn test_malformed_message_does_not_stall_partition() {
    let h = harness(0);
    h.stream.push(None, "garbage");
    h.stream.push(None, order("A", "T1"));

    let cancel = CancellationToken::new();
    let consumer = h.consumer.clone();
    let token = cancel.clone();
    let task = tokio::spawn(async move { consumer.run(token).await });

    let stream = h.stream.clone();
    wait_until(|| stream.committed().len() == 2).await;
    cancel.cancel();
    task.await.unwrap();

    assert_eq!(h.stream.committed(), vec!["1".to_string(), "2".to_string()]);
    assert_eq!(h.writer.attempt_keys(), vec!["A".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_messages_apply_in_partition_order() {
    let h = harness(0);
    h.stream.push(None, order("A", "T1"));
    h.stream.push(None, order("B", "T1"));
    h.stream.push(None, order("A", "T2"));

    let cancel = CancellationToken::new();
    let consumer = h.consumer.clone();
    let token = cancel.clone();
    let task = tokio::spawn(async move { consumer.run(token).await });

    let stats = h.consumer.stats();
    wait_until(|| stats.snapshot().applied == 3).await;
    cancel.cancel();
    task.await.unwrap();

    assert_eq!(
        h.writer.attempt_keys(),
        vec!["A".to_string(), "B".to_string(), "A".to_string()]
    );
    assert_eq!(h.store.peek("A"), Some(order("A", "T2")));
    assert_eq!(h.cache.get("A").await.unwrap(), order("A", "T2"));
    assert_eq!(
        h.stream.committed(),
        vec!["1".to_string(), "2".to_string(), "3".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_run_returns_when_cancelled_while_idle() {
    let h = harness(0);
    let cancel = CancellationToken::new();
    let consumer = h.consumer.clone();
    let token = cancel.clone();
    let task = tokio::spawn(async move { consumer.run(token).await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("consumer did not stop")
        .unwrap();
    assert_eq!(h.consumer.stats().snapshot(), Default::default());
}
