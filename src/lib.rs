//! Bridge from stream consumer groups to function invocations
//!
//! Claims messages from one or more streams through a consumer group, invokes
//! a compute function once per message and acknowledges each message only
//! after its invocation succeeded.

// Process configuration
pub mod config;

// Group initialization and dispatch loop
pub mod dispatch;

// Compute target client
pub mod invoke;

// Stream store client
pub mod store;
