//! Error types for the dispatch loop

use thiserror::Error;

use crate::store::StoreError;

/// Errors that stop startup or a single poll
///
/// Invocation and acknowledgement failures are not errors at this level; they
/// are logged and reported as a [`MessageOutcome`](super::MessageOutcome).
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Group creation failed for a reason other than "already exists"
    #[error("Failed to initialize consumer group '{group}' on stream '{stream}': {source}")]
    GroupInit {
        stream: String,
        group: String,
        #[source]
        source: StoreError,
    },

    /// The claim call failed; nothing was claimed
    #[error("Failed to claim messages: {0}")]
    Claim(#[source] StoreError),
}
