//! Error types for stream store operations

use thiserror::Error;

/// Result type for stream store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors returned by a [`StreamStore`](super::StreamStore)
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store unreachable, connection dropped, authentication failure
    #[error("Connection error: {0}")]
    Connection(String),

    /// The store rejected a command
    #[error("Command error ({code}): {message}")]
    Command { code: String, message: String },

    /// The store replied with something we could not interpret
    #[error("Unexpected response: {0}")]
    Response(String),

    /// Invalid input (bad URL, bad message id, empty stream list)
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Convert Redis errors to store errors
impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error()
            || err.is_connection_dropped()
            || err.is_connection_refusal()
            || err.is_timeout()
        {
            return StoreError::Connection(err.to_string());
        }

        match err.code() {
            Some(code) => StoreError::Command {
                code: code.to_string(),
                message: err.detail().unwrap_or_default().to_string(),
            },
            None => StoreError::Response(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_display() {
        let err = StoreError::Command {
            code: "NOGROUP".to_string(),
            message: "No such key".to_string(),
        };
        assert_eq!(err.to_string(), "Command error (NOGROUP): No such key");
    }

    #[test]
    fn test_from_redis_server_error() {
        let redis_err = redis::RedisError::from((
            redis::ErrorKind::ResponseError,
            "An error was signalled by the server",
            "unknown command".to_string(),
        ));
        let err: StoreError = redis_err.into();
        match err {
            StoreError::Command { code, message } => {
                assert_eq!(code, "ERR");
                assert_eq!(message, "unknown command");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_from_redis_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: StoreError = redis::RedisError::from(io).into();
        assert!(matches!(err, StoreError::Connection(_)));
    }
}
