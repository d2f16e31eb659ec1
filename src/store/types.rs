use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::store::error::StoreError;

/// Identifier of an entry in a stream: `<milliseconds>-<sequence>`
///
/// Identifiers are unique within their stream and totally ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId {
    pub millis: u64,
    pub seq: u64,
}

impl MessageId {
    pub fn new(millis: u64, seq: u64) -> Self {
        Self { millis, seq }
    }
}

impl Ord for MessageId {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.millis, self.seq).cmp(&(other.millis, other.seq))
    }
}

impl PartialOrd for MessageId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.millis, self.seq)
    }
}

impl FromStr for MessageId {
    type Err = StoreError;

    /// Parse `<ms>-<seq>`; a bare `<ms>` means sequence 0
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StoreError::Validation(format!("Invalid message id '{}'", s));

        let (millis, seq) = match s.split_once('-') {
            Some((millis, seq)) => (millis, seq),
            None => (s, "0"),
        };

        Ok(Self {
            millis: millis.parse().map_err(|_| invalid())?,
            seq: seq.parse().map_err(|_| invalid())?,
        })
    }
}

/// A message read from a stream
///
/// Immutable from the bridge's point of view. Fields are kept sorted by key so
/// rendering a payload is deterministic. Values are binary safe, as in the
/// store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
    /// Stream the message was read from
    pub stream: String,

    /// Identifier within the stream
    pub id: MessageId,

    /// Field/value payload
    pub fields: BTreeMap<String, Bytes>,
}

impl StreamMessage {
    pub fn new(stream: impl Into<String>, id: MessageId) -> Self {
        Self {
            stream: stream.into(),
            id,
            fields: BTreeMap::new(),
        }
    }

    /// Add a field (builder pattern)
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// A field value as text; `None` if absent or not valid UTF-8
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(|v| std::str::from_utf8(v).ok())
    }
}

/// Messages claimed from one stream by a single claim call, in store order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamBatch {
    pub stream: String,
    pub messages: Vec<StreamMessage>,
}

/// Outcome of ensuring a consumer group exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStatus {
    /// The group (and the stream, if absent) was created by this call
    Created,
    /// The group already existed; nothing changed
    AlreadyExists,
}

/// How long a claim call may block waiting for new messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockMode {
    /// Block until at least one message is available
    Indefinite,
    /// Block for at most this many milliseconds, then return an empty batch
    Millis(u64),
}

impl BlockMode {
    /// Build from a configured millisecond value where 0 means indefinite
    pub fn from_millis(ms: u64) -> Self {
        if ms == 0 {
            BlockMode::Indefinite
        } else {
            BlockMode::Millis(ms)
        }
    }

    /// Value passed to the store's `BLOCK` argument
    pub fn as_millis(&self) -> u64 {
        match self {
            BlockMode::Indefinite => 0,
            BlockMode::Millis(ms) => *ms,
        }
    }
}

/// Parameters of a claim call
///
/// Claims only messages never delivered to any consumer of the group.
#[derive(Debug, Clone)]
pub struct ClaimRequest {
    /// Streams to read, all under the same group
    pub streams: Vec<String>,

    /// Consumer group name
    pub group: String,

    /// Identity the claimed messages are recorded against
    pub consumer: String,

    /// Maximum messages per stream per call
    pub count: usize,

    /// Blocking behaviour when nothing is available
    pub block: BlockMode,
}

impl ClaimRequest {
    pub fn new(
        streams: Vec<String>,
        group: impl Into<String>,
        consumer: impl Into<String>,
    ) -> Self {
        Self {
            streams,
            group: group.into(),
            consumer: consumer.into(),
            count: 10,
            block: BlockMode::Indefinite,
        }
    }

    /// Set the batch size (builder pattern)
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Set the blocking behaviour (builder pattern)
    pub fn with_block(mut self, block: BlockMode) -> Self {
        self.block = block;
        self
    }
}
