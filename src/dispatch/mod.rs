//! Group initialization and the dispatch loop
//!
//! # Lifecycle
//!
//! 1. **Initialize**: [`initialize_groups`] ensures the consumer group exists
//!    on every configured stream. Any failure other than "already exists"
//!    aborts startup.
//! 2. **Claim**: block until undelivered messages are available on any
//!    stream, up to `batch_size` per stream.
//! 3. **Dispatch**: invoke the function once per message, sequentially, in
//!    the order the store returned them.
//! 4. **Acknowledge**: only after a successful invocation. A failed message
//!    stays pending in the store.
//! 5. **Repeat** until the [`ShutdownSignal`] fires.
//!
//! A failed claim never stops the loop: it is logged and retried after the
//! [`RetryPolicy`] backoff.
//!
//! # Delivery guarantees
//!
//! At least once. A crash between invocation and acknowledgement leaves the
//! message pending; it is redelivered only by mechanisms outside this crate.

pub mod dispatcher;
pub mod error;
pub mod identity;
pub mod initializer;
pub mod retry;
pub mod shutdown;

pub use dispatcher::{BatchReport, DispatchConfig, DispatchRecord, Dispatcher, MessageOutcome};
pub use error::DispatchError;
pub use identity::ConsumerIdentity;
pub use initializer::initialize_groups;
pub use retry::{Backoff, RetryPolicy};
pub use shutdown::{ShutdownSignal, ShutdownTrigger};
