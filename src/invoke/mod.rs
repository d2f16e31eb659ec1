//! Compute target client
//!
//! A compute target is a black-box request/response function. The bridge calls
//! it once per claimed message with the rendered payload and only looks at
//! whether the call succeeded.
//!
//! - [`ComputeTarget`]: the invocation seam
//! - [`HttpInvoker`]: POSTs to an HTTP function endpoint
//! - [`payload::render`]: message to JSON body

pub mod error;
pub mod http;
pub mod payload;

use async_trait::async_trait;
use bytes::Bytes;

pub use error::InvokeError;
pub use http::{HttpInvoker, HttpInvokerConfig};

/// Response of a successful invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResult {
    /// Status code reported by the target
    pub status: u16,

    /// Response payload
    pub body: Bytes,
}

impl InvocationResult {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Response body as text, replacing invalid UTF-8
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Invokes an external function with a payload
#[async_trait]
pub trait ComputeTarget: Send + Sync {
    /// Invoke `function` with `payload` and wait for its response
    ///
    /// No timeout is imposed here; that is the target's concern.
    async fn invoke(&self, function: &str, payload: Bytes) -> Result<InvocationResult, InvokeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_result_success_range() {
        assert!(InvocationResult::new(200, "ok").is_success());
        assert!(InvocationResult::new(204, "").is_success());
        assert!(!InvocationResult::new(302, "").is_success());
        assert!(!InvocationResult::new(500, "").is_success());
    }

    #[test]
    fn test_body_text() {
        let result = InvocationResult::new(200, Bytes::from_static(b"{\"ok\":true}"));
        assert_eq!(result.body_text(), "{\"ok\":true}");
    }
}
