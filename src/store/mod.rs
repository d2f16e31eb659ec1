//! Stream store client
//!
//! The store owns all durable state: streams, consumer groups and their
//! pending lists. The bridge only needs four capabilities from it, captured by
//! [`StreamStore`]:
//!
//! 1. **Ensure group**: create a consumer group positioned at "new messages
//!    only", creating the stream if absent. An existing group is not an error.
//! 2. **Claim batch**: blocking read of messages never delivered to the
//!    group, recorded as pending against one consumer identity.
//! 3. **Acknowledge**: remove one message from the group's pending set.
//! 4. **Pending count**: size of the group's pending set, for observability.
//!
//! [`RedisStreamStore`] implements these over Redis Streams
//! (`XGROUP CREATE ... MKSTREAM`, `XREADGROUP`, `XACK`, `XPENDING`).
//! [`MemoryStreamStore`] implements them in process.
//!
//! # Example
//!
//! ```no_run
//! use stream_bridge::store::{ClaimRequest, RedisStreamStore, StoreConfig, StreamStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = StoreConfig::from_connection_string("redis://localhost:6379")?;
//!     let store = RedisStreamStore::connect(&config).await?;
//!
//!     store.ensure_group("orders", "g1").await?;
//!
//!     let request = ClaimRequest::new(vec!["orders".to_string()], "g1", "worker-1");
//!     for batch in store.claim_batch(&request).await? {
//!         for message in batch.messages {
//!             store.acknowledge(&batch.stream, "g1", message.id).await?;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod connection;
pub mod error;
pub mod memory;
pub mod types;

use async_trait::async_trait;

pub use client::RedisStreamStore;
pub use connection::StoreConfig;
pub use error::{Result, StoreError};
pub use memory::MemoryStreamStore;
pub use types::{BlockMode, ClaimRequest, GroupStatus, MessageId, StreamBatch, StreamMessage};

/// Capabilities the bridge consumes from a stream store
#[async_trait]
pub trait StreamStore: Send + Sync {
    /// Ensure `group` exists on `stream`, positioned at new messages only
    ///
    /// Creates the stream empty if it does not exist. Returns
    /// [`GroupStatus::AlreadyExists`] rather than an error when the group is
    /// already there.
    async fn ensure_group(&self, stream: &str, group: &str) -> Result<GroupStatus>;

    /// Claim up to `request.count` undelivered messages per stream
    ///
    /// Blocks according to `request.block`. Batches and the messages in them
    /// are returned in store order. Every returned message is pending against
    /// `request.consumer` until acknowledged.
    async fn claim_batch(&self, request: &ClaimRequest) -> Result<Vec<StreamBatch>>;

    /// Acknowledge one message
    ///
    /// Returns false if the message was not pending (already acknowledged).
    async fn acknowledge(&self, stream: &str, group: &str, id: MessageId) -> Result<bool>;

    /// Number of delivered but unacknowledged messages in the group
    async fn pending_count(&self, stream: &str, group: &str) -> Result<usize>;
}
