//! In-process event stream.
//!
//! Mirrors the delivery contract of a real partition: messages come out in
//! push order, fetched-but-uncommitted messages stay pending and can be
//! redelivered. Fetch and commit failures can be injected.

use crate::stream::{EventStream, StreamMessage};
use async_trait::async_trait;
use bytes::Bytes;
use orders_core::{OrdersError, OrdersResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct State {
    queue: VecDeque<StreamMessage>,
    pending: Vec<StreamMessage>,
    committed: Vec<String>,
    next_offset: u64,
    failing_fetches: u32,
    failing_commits: u32,
    fetch_failures: u32,
}

/// In-memory [`EventStream`] for a single partition.
#[derive(Debug)]
pub struct MemoryEventStream {
    partition: String,
    state: Mutex<State>,
    notify: Notify,
}

impl MemoryEventStream {
    /// Creates an empty partition.
    #[must_use]
    pub fn new(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            state: Mutex::new(State::default()),
            notify: Notify::new(),
        }
    }

    /// Appends a message and returns its offset.
    pub fn push(&self, key_hint: Option<&str>, payload: impl Into<Bytes>) -> String {
        let offset = {
            let mut state = self.state.lock();
            state.next_offset += 1;
            let offset = state.next_offset.to_string();
            state.queue.push_back(StreamMessage {
                key_hint: key_hint.map(str::to_owned),
                payload: payload.into(),
                partition: self.partition.clone(),
                offset: offset.clone(),
            });
            offset
        };
        self.notify.notify_one();
        offset
    }

    /// Makes the next `count` fetches fail with a stream error.
    pub fn fail_next_fetches(&self, count: u32) {
        self.state.lock().failing_fetches = count;
    }

    /// Makes the next `count` commits fail with a stream error.
    pub fn fail_next_commits(&self, count: u32) {
        self.state.lock().failing_commits = count;
    }

    /// Puts every fetched but uncommitted message back at the head of the
    /// partition, as a consumer restart would.
    pub fn redeliver_pending(&self) {
        {
            let mut state = self.state.lock();
            let pending = std::mem::take(&mut state.pending);
            for message in pending.into_iter().rev() {
                state.queue.push_front(message);
            }
        }
        self.notify.notify_one();
    }

    /// Offsets committed so far, in commit order.
    #[must_use]
    pub fn committed(&self) -> Vec<String> {
        self.state.lock().committed.clone()
    }

    /// Number of fetched messages not yet committed.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Number of fetches that failed by injection.
    #[must_use]
    pub fn fetch_failures(&self) -> u32 {
        self.state.lock().fetch_failures
    }
}

#[async_trait]
impl EventStream for MemoryEventStream {
    fn partition(&self) -> &str {
        &self.partition
    }

    async fn fetch_next(&self) -> OrdersResult<StreamMessage> {
        loop {
            {
                let mut state = self.state.lock();
                if state.failing_fetches > 0 {
                    state.failing_fetches -= 1;
                    state.fetch_failures += 1;
                    return Err(OrdersError::Stream("broker unavailable".to_string()));
                }
                if let Some(message) = state.queue.pop_front() {
                    state.pending.push(message.clone());
                    return Ok(message);
                }
            }
            self.notify.notified().await;
        }
    }

    async fn commit(&self, message: &StreamMessage) -> OrdersResult<()> {
        let mut state = self.state.lock();
        if state.failing_commits > 0 {
            state.failing_commits -= 1;
            return Err(OrdersError::Stream("commit rejected".to_string()));
        }
        state.pending.retain(|m| m.offset != message.offset);
        state.committed.push(message.offset.clone());
        Ok(())
    }
}
