//! HTTP compute target

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::invoke::{error::InvokeError, ComputeTarget, InvocationResult};

/// Header a Lambda endpoint sets when the function itself failed
pub const FUNCTION_ERROR_HEADER: &str = "X-Amz-Function-Error";

/// Settings for the HTTP invoker
#[derive(Debug, Clone)]
pub struct HttpInvokerConfig {
    /// Time allowed to establish a connection
    pub connect_timeout: Duration,

    /// Overall request timeout; `None` waits as long as the function runs
    pub request_timeout: Option<Duration>,
}

impl Default for HttpInvokerConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: None,
        }
    }
}

impl HttpInvokerConfig {
    /// Set the connect timeout (builder pattern)
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the overall request timeout (builder pattern)
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

/// Invokes functions exposed over HTTP (for example Lambda function URLs)
///
/// The function name passed to [`ComputeTarget::invoke`] is the endpoint URL.
/// The payload is POSTed as `application/json`.
#[derive(Clone)]
pub struct HttpInvoker {
    http_client: Client,
}

impl HttpInvoker {
    /// Create a new invoker
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: HttpInvokerConfig) -> Result<Self, InvokeError> {
        let mut builder = Client::builder().connect_timeout(config.connect_timeout);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        let http_client = builder.build().map_err(|e| {
            InvokeError::InvalidTarget(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self { http_client })
    }
}

/// Check that a function endpoint is an absolute http(s) URL
pub fn validate_endpoint(endpoint: &str) -> Result<(), InvokeError> {
    let rest = endpoint
        .strip_prefix("https://")
        .or_else(|| endpoint.strip_prefix("http://"))
        .ok_or_else(|| {
            InvokeError::InvalidTarget(format!(
                "Function endpoint '{}' must start with http:// or https://",
                endpoint
            ))
        })?;

    if rest.is_empty() || rest.starts_with('/') {
        return Err(InvokeError::InvalidTarget(format!(
            "Function endpoint '{}' has no host",
            endpoint
        )));
    }
    Ok(())
}

#[async_trait]
impl ComputeTarget for HttpInvoker {
    async fn invoke(&self, function: &str, payload: Bytes) -> Result<InvocationResult, InvokeError> {
        validate_endpoint(function)?;

        let response = self
            .http_client
            .post(function)
            .header("Content-Type", "application/json")
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        let function_error = response
            .headers()
            .get(FUNCTION_ERROR_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        debug!(status = status.as_u16(), bytes = body.len(), "Function responded");

        if !status.is_success() {
            return Err(InvokeError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        if let Some(kind) = function_error {
            return Err(InvokeError::FunctionError {
                kind,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(InvocationResult {
            status: status.as_u16(),
            body,
        })
    }
}
