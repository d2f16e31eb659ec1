use tracing::{debug, error, info, warn};

use crate::dispatch::{
    error::DispatchError, identity::ConsumerIdentity, retry::RetryPolicy,
    shutdown::ShutdownSignal,
};
use crate::invoke::{payload, ComputeTarget, InvokeError};
use crate::store::{BlockMode, ClaimRequest, MessageId, StreamBatch, StreamMessage, StreamStore};

/// Configuration for a dispatcher
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Streams consumed together in every claim
    pub streams: Vec<String>,

    /// Consumer group shared by all streams
    pub group: String,

    /// Identity claims are recorded against
    pub consumer: ConsumerIdentity,

    /// Function invoked once per message
    pub function: String,

    /// Maximum messages per stream per claim
    pub batch_size: usize,

    /// How long a claim blocks when nothing is available
    pub block: BlockMode,

    /// Backoff between failed claims
    pub retry: RetryPolicy,
}

impl DispatchConfig {
    /// Create a new dispatcher configuration
    ///
    /// # Example
    ///
    /// ```
    /// use stream_bridge::dispatch::{ConsumerIdentity, DispatchConfig};
    ///
    /// let config = DispatchConfig::new(
    ///     vec!["orders".to_string()],
    ///     "g1",
    ///     ConsumerIdentity::new("worker-1"),
    ///     "https://fn.example.com/",
    /// )
    /// .with_batch_size(25);
    /// ```
    pub fn new(
        streams: Vec<String>,
        group: impl Into<String>,
        consumer: ConsumerIdentity,
        function: impl Into<String>,
    ) -> Self {
        Self {
            streams,
            group: group.into(),
            consumer,
            function: function.into(),
            batch_size: 10,
            block: BlockMode::Indefinite,
            retry: RetryPolicy::default(),
        }
    }

    /// Set the batch size (builder pattern)
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the claim blocking behaviour (builder pattern)
    pub fn with_block(mut self, block: BlockMode) -> Self {
        self.block = block;
        self
    }

    /// Set the claim retry policy (builder pattern)
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn claim_request(&self) -> ClaimRequest {
        ClaimRequest::new(
            self.streams.clone(),
            self.group.clone(),
            self.consumer.as_str(),
        )
        .with_count(self.batch_size)
        .with_block(self.block)
    }
}

/// What happened to one claimed message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Invocation succeeded and the message was acknowledged
    Acknowledged,
    /// Invocation failed; the message stays pending
    InvocationFailed,
    /// Invocation succeeded but the acknowledgement failed; the message
    /// stays pending and may be delivered again
    AckFailed,
}

/// Outcome of one message within a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRecord {
    pub stream: String,
    pub id: MessageId,
    pub outcome: MessageOutcome,
}

/// Outcomes of one poll, in dispatch order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub records: Vec<DispatchRecord>,
}

impl BatchReport {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Number of messages with the given outcome
    pub fn count(&self, outcome: MessageOutcome) -> usize {
        self.records.iter().filter(|r| r.outcome == outcome).count()
    }
}

/// The dispatch loop
///
/// Claims batches of undelivered messages, invokes the compute function once
/// per message in store order, and acknowledges each message only after its
/// invocation succeeded. Failed messages are left pending.
///
/// # Example
///
/// ```no_run
/// use stream_bridge::dispatch::{shutdown, ConsumerIdentity, DispatchConfig, Dispatcher};
/// use stream_bridge::invoke::{HttpInvoker, HttpInvokerConfig};
/// use stream_bridge::store::{RedisStreamStore, StoreConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = RedisStreamStore::connect(
///         &StoreConfig::from_connection_string("redis://localhost:6379")?,
///     )
///     .await?;
///     let invoker = HttpInvoker::new(HttpInvokerConfig::default())?;
///
///     let config = DispatchConfig::new(
///         vec!["orders".to_string()],
///         "g1",
///         ConsumerIdentity::new("worker-1"),
///         "https://fn.example.com/",
///     );
///     let dispatcher = Dispatcher::new(store, invoker, config);
///
///     let (_trigger, signal) = shutdown::channel();
///     dispatcher.run(signal).await;
///     Ok(())
/// }
/// ```
pub struct Dispatcher<S, T> {
    store: S,
    target: T,
    config: DispatchConfig,
}

impl<S, T> Dispatcher<S, T>
where
    S: StreamStore,
    T: ComputeTarget,
{
    pub fn new(store: S, target: T, config: DispatchConfig) -> Self {
        Self {
            store,
            target,
            config,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Run until `shutdown` fires
    ///
    /// A failed claim is logged and retried after the policy's backoff. Shutdown
    /// interrupts a blocked claim or a backoff wait; a batch already claimed is
    /// dispatched to the end first.
    pub async fn run(&self, shutdown: ShutdownSignal) {
        let mut backoff = self.config.retry.backoff();
        info!(
            streams = ?self.config.streams,
            group = %self.config.group,
            consumer = %self.config.consumer,
            "Dispatch loop started"
        );

        loop {
            if shutdown.is_triggered() {
                break;
            }

            let claimed = tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                claimed = self.claim() => claimed,
            };

            match claimed {
                Ok(batches) => {
                    backoff.reset();
                    self.dispatch_batches(batches).await;
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    error!(
                        error = %e,
                        attempt = backoff.attempts(),
                        backoff_ms = delay.as_millis() as u64,
                        "Error reading from stream store"
                    );
                    if delay.is_zero() {
                        tokio::task::yield_now().await;
                    } else {
                        tokio::select! {
                            biased;
                            _ = shutdown.wait() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }

        info!(consumer = %self.config.consumer, "Dispatch loop stopped");
    }

    /// Claim one batch and dispatch it
    ///
    /// Returns an error only when the claim itself fails, in which case nothing
    /// was claimed and nothing is acknowledged.
    pub async fn poll_once(&self) -> Result<BatchReport, DispatchError> {
        let batches = self.claim().await?;
        Ok(self.dispatch_batches(batches).await)
    }

    async fn claim(&self) -> Result<Vec<StreamBatch>, DispatchError> {
        self.store
            .claim_batch(&self.config.claim_request())
            .await
            .map_err(DispatchError::Claim)
    }

    async fn dispatch_batches(&self, batches: Vec<StreamBatch>) -> BatchReport {
        let mut report = BatchReport::default();

        for batch in batches {
            debug!(stream = %batch.stream, count = batch.messages.len(), "Claimed batch");
            for message in batch.messages {
                let outcome = self.dispatch_message(&message).await;
                report.records.push(DispatchRecord {
                    stream: message.stream,
                    id: message.id,
                    outcome,
                });
            }
        }

        report
    }

    /// Invoke the function for one message and acknowledge it on success
    pub async fn dispatch_message(&self, message: &StreamMessage) -> MessageOutcome {
        info!(stream = %message.stream, id = %message.id, "Processing message");

        if let Err(e) = self.invoke(message).await {
            error!(
                stream = %message.stream,
                id = %message.id,
                function = %self.config.function,
                error = %e,
                "Error invoking function, message left pending"
            );
            return MessageOutcome::InvocationFailed;
        }

        match self
            .store
            .acknowledge(&message.stream, &self.config.group, message.id)
            .await
        {
            Ok(true) => {
                info!(
                    stream = %message.stream,
                    id = %message.id,
                    group = %self.config.group,
                    "Message acknowledged"
                );
                MessageOutcome::Acknowledged
            }
            Ok(false) => {
                warn!(
                    stream = %message.stream,
                    id = %message.id,
                    group = %self.config.group,
                    "Message was no longer pending when acknowledged"
                );
                MessageOutcome::Acknowledged
            }
            Err(e) => {
                error!(
                    stream = %message.stream,
                    id = %message.id,
                    group = %self.config.group,
                    error = %e,
                    "Error acknowledging message, it may be delivered again"
                );
                MessageOutcome::AckFailed
            }
        }
    }

    async fn invoke(&self, message: &StreamMessage) -> Result<(), InvokeError> {
        let body = payload::render(message)?;
        let result = self.target.invoke(&self.config.function, body).await?;

        if !result.is_success() {
            return Err(InvokeError::Status {
                status: result.status,
                body: result.body_text(),
            });
        }

        info!(
            id = %message.id,
            status = result.status,
            response = %result.body_text(),
            "Function invoked successfully"
        );
        Ok(())
    }
}
