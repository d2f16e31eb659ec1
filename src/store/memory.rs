use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time;

use crate::store::{
    error::{Result, StoreError},
    types::{BlockMode, ClaimRequest, GroupStatus, MessageId, StreamBatch, StreamMessage},
    StreamStore,
};

#[derive(Default)]
struct GroupState {
    /// Index of the first entry not yet delivered to any consumer
    next_index: usize,
    /// Delivered but unacknowledged entries and the consumer holding them
    pending: BTreeMap<MessageId, String>,
}

#[derive(Default)]
struct StreamState {
    entries: Vec<StreamMessage>,
    groups: HashMap<String, GroupState>,
}

#[derive(Default)]
struct State {
    streams: HashMap<String, StreamState>,
    acknowledged: Vec<(String, MessageId)>,
    broken_streams: HashSet<String>,
}

/// In-process stream store with consumer group semantics
///
/// Mirrors the store behaviour the bridge relies on: groups created at the
/// end of the stream, claims that only return undelivered entries, per-group
/// pending sets and blocking reads that wake on append. With the `test-util`
/// feature, failures can be injected to exercise error paths.
#[derive(Clone, Default)]
pub struct MemoryStreamStore {
    state: Arc<Mutex<State>>,
    appended: Arc<Notify>,
    clock: Arc<AtomicU64>,
    failing_claims: Arc<AtomicUsize>,
    failing_acks: Arc<AtomicUsize>,
    claim_calls: Arc<AtomicUsize>,
}

impl MemoryStreamStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A poisoned lock only means a test panicked mid-operation
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append an entry to a stream, creating the stream if needed
    pub fn append<I, K, V>(&self, stream: &str, fields: I) -> MessageId
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Bytes>,
    {
        let id = MessageId::new(self.clock.fetch_add(1, Ordering::SeqCst) + 1, 0);
        let message = StreamMessage {
            stream: stream.to_string(),
            id,
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        };

        self.lock()
            .streams
            .entry(stream.to_string())
            .or_default()
            .entries
            .push(message);
        self.appended.notify_waiters();
        id
    }

    /// Make the next `n` claim calls fail with a connection error
    #[cfg(any(test, feature = "test-util"))]
    pub fn fail_next_claims(&self, n: usize) {
        self.failing_claims.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` acknowledge calls fail with a connection error
    #[cfg(any(test, feature = "test-util"))]
    pub fn fail_next_acks(&self, n: usize) {
        self.failing_acks.store(n, Ordering::SeqCst);
    }

    /// Make group creation on `stream` fail with a command error
    #[cfg(any(test, feature = "test-util"))]
    pub fn reject_groups_on(&self, stream: &str) {
        self.lock().broken_streams.insert(stream.to_string());
    }

    /// Whether the stream exists
    pub fn stream_exists(&self, stream: &str) -> bool {
        self.lock().streams.contains_key(stream)
    }

    /// Whether the group exists on the stream
    pub fn group_exists(&self, stream: &str, group: &str) -> bool {
        self.lock()
            .streams
            .get(stream)
            .is_some_and(|s| s.groups.contains_key(group))
    }

    /// Pending entries of a group with the consumer holding each
    pub fn pending(&self, stream: &str, group: &str) -> Vec<(MessageId, String)> {
        self.lock()
            .streams
            .get(stream)
            .and_then(|s| s.groups.get(group))
            .map(|g| g.pending.iter().map(|(id, c)| (*id, c.clone())).collect())
            .unwrap_or_default()
    }

    /// Every successful acknowledgement, in call order
    pub fn acknowledged(&self) -> Vec<(String, MessageId)> {
        self.lock().acknowledged.clone()
    }

    /// Number of claim calls made, including failed ones
    pub fn claim_calls(&self) -> usize {
        self.claim_calls.load(Ordering::SeqCst)
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn claim_available(&self, request: &ClaimRequest) -> Result<Vec<StreamBatch>> {
        let mut state = self.lock();
        let mut batches = Vec::new();

        for name in &request.streams {
            let stream = state.streams.get_mut(name).ok_or_else(|| StoreError::Command {
                code: "NOGROUP".to_string(),
                message: format!("No such key '{}' or consumer group '{}'", name, request.group),
            })?;
            let group = stream.groups.get_mut(&request.group).ok_or_else(|| {
                StoreError::Command {
                    code: "NOGROUP".to_string(),
                    message: format!(
                        "No such key '{}' or consumer group '{}'",
                        name, request.group
                    ),
                }
            })?;

            let end = stream.entries.len().min(group.next_index + request.count);
            let messages: Vec<StreamMessage> = stream.entries[group.next_index..end].to_vec();
            group.next_index = end;
            for message in &messages {
                group.pending.insert(message.id, request.consumer.clone());
            }

            if !messages.is_empty() {
                batches.push(StreamBatch {
                    stream: name.clone(),
                    messages,
                });
            }
        }

        Ok(batches)
    }
}

#[async_trait]
impl StreamStore for MemoryStreamStore {
    async fn ensure_group(&self, stream: &str, group: &str) -> Result<GroupStatus> {
        let mut state = self.lock();
        if state.broken_streams.contains(stream) {
            return Err(StoreError::Command {
                code: "WRONGTYPE".to_string(),
                message: format!("Key '{}' holds the wrong kind of value", stream),
            });
        }

        let stream_state = state.streams.entry(stream.to_string()).or_default();
        if stream_state.groups.contains_key(group) {
            return Ok(GroupStatus::AlreadyExists);
        }

        let next_index = stream_state.entries.len();
        stream_state.groups.insert(
            group.to_string(),
            GroupState {
                next_index,
                pending: BTreeMap::new(),
            },
        );
        Ok(GroupStatus::Created)
    }

    async fn claim_batch(&self, request: &ClaimRequest) -> Result<Vec<StreamBatch>> {
        self.claim_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.failing_claims) {
            return Err(StoreError::Connection("injected claim failure".to_string()));
        }
        if request.streams.is_empty() {
            return Err(StoreError::Validation(
                "Claim requires at least one stream".to_string(),
            ));
        }

        let deadline = match request.block {
            BlockMode::Indefinite => None,
            BlockMode::Millis(ms) => Some(time::Instant::now() + Duration::from_millis(ms)),
        };

        loop {
            let notified = self.appended.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let batches = self.claim_available(request)?;
            if !batches.is_empty() {
                return Ok(batches);
            }

            match deadline {
                None => notified.await,
                Some(deadline) => {
                    if time::timeout_at(deadline, notified).await.is_err() {
                        return Ok(Vec::new());
                    }
                }
            }
        }
    }

    async fn acknowledge(&self, stream: &str, group: &str, id: MessageId) -> Result<bool> {
        if Self::take_failure(&self.failing_acks) {
            return Err(StoreError::Connection("injected ack failure".to_string()));
        }

        let mut state = self.lock();
        let removed = state
            .streams
            .get_mut(stream)
            .and_then(|s| s.groups.get_mut(group))
            .and_then(|g| g.pending.remove(&id))
            .is_some();
        if removed {
            state.acknowledged.push((stream.to_string(), id));
        }
        Ok(removed)
    }

    async fn pending_count(&self, stream: &str, group: &str) -> Result<usize> {
        let state = self.lock();
        state
            .streams
            .get(stream)
            .and_then(|s| s.groups.get(group))
            .map(|g| g.pending.len())
            .ok_or_else(|| StoreError::Command {
                code: "NOGROUP".to_string(),
                message: format!("No such key '{}' or consumer group '{}'", stream, group),
            })
    }
}
