use async_trait::async_trait;
use redis::aio::ConnectionManager;
use bytes::Bytes;
use redis::streams::{StreamId, StreamPendingReply, StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use tracing::{debug, warn};

use crate::store::{
    connection::StoreConfig,
    error::{Result, StoreError},
    types::{ClaimRequest, GroupStatus, MessageId, StreamBatch, StreamMessage},
    StreamStore,
};

/// Cursor meaning "messages never delivered to any consumer of the group"
const UNDELIVERED: &str = ">";

/// Group start position meaning "only entries appended after creation"
const NEW_ONLY: &str = "$";

/// Stream store backed by Redis Streams
///
/// Holds a reconnecting connection; a dropped connection surfaces as
/// [`StoreError::Connection`] on the failing call and is re-established on a
/// later one.
#[derive(Clone)]
pub struct RedisStreamStore {
    conn: ConnectionManager,
}

impl RedisStreamStore {
    /// Connect to Redis and verify the connection with `PING`
    ///
    /// # Example
    ///
    /// ```no_run
    /// use stream_bridge::store::{RedisStreamStore, StoreConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let config = StoreConfig::from_connection_string("redis://localhost:6379")?;
    ///     let store = RedisStreamStore::connect(&config).await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let client = config.build_client()?;
        let mut conn = ConnectionManager::new(client).await?;

        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        debug!(url = %config.redacted_url(), reply = %pong, "Connected to stream store");

        Ok(Self { conn })
    }
}

#[async_trait]
impl StreamStore for RedisStreamStore {
    async fn ensure_group(&self, stream: &str, group: &str) -> Result<GroupStatus> {
        let mut conn = self.conn.clone();
        let created: redis::RedisResult<()> =
            conn.xgroup_create_mkstream(stream, group, NEW_ONLY).await;

        match created {
            Ok(()) => Ok(GroupStatus::Created),
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(GroupStatus::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    async fn claim_batch(&self, request: &ClaimRequest) -> Result<Vec<StreamBatch>> {
        if request.streams.is_empty() {
            return Err(StoreError::Validation(
                "Claim requires at least one stream".to_string(),
            ));
        }

        let ids = vec![UNDELIVERED; request.streams.len()];
        let options = StreamReadOptions::default()
            .group(&request.group, &request.consumer)
            .count(request.count)
            .block(request.block.as_millis() as usize);

        let mut conn = self.conn.clone();
        let reply: StreamReadReply = conn
            .xread_options(request.streams.as_slice(), ids.as_slice(), &options)
            .await?;

        // Every returned entry is already pending against this consumer, so
        // one undecodable entry must not cost the rest of the batch
        let batches: Vec<StreamBatch> = reply
            .keys
            .into_iter()
            .map(|key| {
                let messages = key
                    .ids
                    .into_iter()
                    .filter_map(|entry| match decode_entry(&key.key, entry) {
                        Ok(message) => Some(message),
                        Err(e) => {
                            warn!(
                                stream = %key.key,
                                error = %e,
                                "Skipping undecodable entry, it stays pending"
                            );
                            None
                        }
                    })
                    .collect();

                StreamBatch {
                    stream: key.key,
                    messages,
                }
            })
            .collect();

        Ok(batches)
    }

    async fn acknowledge(&self, stream: &str, group: &str, id: MessageId) -> Result<bool> {
        let mut conn = self.conn.clone();
        let ids = [id.to_string()];
        let acked: i64 = conn.xack(stream, group, &ids[..]).await?;
        Ok(acked > 0)
    }

    async fn pending_count(&self, stream: &str, group: &str) -> Result<usize> {
        let mut conn = self.conn.clone();
        let reply: StreamPendingReply = conn.xpending(stream, group).await?;
        Ok(reply.count())
    }
}

/// Convert one raw entry; values are kept as the bytes the store holds
fn decode_entry(stream: &str, entry: StreamId) -> Result<StreamMessage> {
    let id: MessageId = entry.id.parse()?;
    let fields = entry
        .map
        .into_iter()
        .map(|(field, value)| -> Result<(String, Bytes)> {
            let value: Vec<u8> = redis::from_redis_value(&value).map_err(|e| {
                StoreError::Response(format!(
                    "Field '{}' of {} is not a bulk string: {}",
                    field, id, e
                ))
            })?;
            Ok((field, Bytes::from(value)))
        })
        .collect::<Result<_>>()?;

    Ok(StreamMessage {
        stream: stream.to_string(),
        id,
        fields,
    })
}
