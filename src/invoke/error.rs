//! Error types for compute invocations

use thiserror::Error;

/// Errors that can occur when invoking a compute function
#[derive(Debug, Error)]
pub enum InvokeError {
    /// The request never produced a response (DNS, connect, reset, timeout)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a non-success status
    #[error("HTTP error (status {status}): {body}")]
    Status { status: u16, body: String },

    /// The function itself raised; the endpoint reported it in-band
    #[error("Function error ({kind}): {body}")]
    FunctionError { kind: String, body: String },

    /// The payload could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The target could not be set up (bad endpoint, client build failure)
    #[error("Invalid target: {0}")]
    InvalidTarget(String),
}

impl From<serde_json::Error> for InvokeError {
    fn from(err: serde_json::Error) -> Self {
        InvokeError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for InvokeError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => InvokeError::Status {
                status: status.as_u16(),
                body: err.to_string(),
            },
            None => InvokeError::Transport(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error() {
        let err = InvokeError::Status {
            status: 502,
            body: "Bad gateway".to_string(),
        };
        assert!(err.to_string().contains("502"));
        assert!(err.to_string().contains("Bad gateway"));
    }

    #[test]
    fn test_function_error() {
        let err = InvokeError::FunctionError {
            kind: "Unhandled".to_string(),
            body: r#"{"errorMessage":"boom"}"#.to_string(),
        };
        assert!(err.to_string().contains("Unhandled"));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_from_serde_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: InvokeError = json_err.into();
        assert!(matches!(err, InvokeError::Serialization(_)));
    }
}
