use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stream_bridge::invoke::{ComputeTarget, InvocationResult, InvokeError};
use testcontainers::{core::WaitFor, GenericImage, RunnableImage};
use warp::http::StatusCode;
use warp::Filter;

/// The Redis Docker image to use for testing
pub const REDIS_IMAGE: &str = "redis";
pub const REDIS_TAG: &str = "7-alpine";

/// Default Redis port
pub const REDIS_PORT: u16 = 6379;

/// Create a runnable Redis container
pub fn create_redis_container() -> RunnableImage<GenericImage> {
    let image = GenericImage::new(REDIS_IMAGE, REDIS_TAG)
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"));

    RunnableImage::from(image).with_tag(REDIS_TAG)
}

/// Build a connection string for the running Redis container
pub fn build_connection_string(host: &str, port: u16) -> String {
    format!("redis://{}:{}/0", host, port)
}

/// Compute target that records every payload and answers from a script
///
/// The script sees the decoded payload and decides the response.
#[derive(Clone)]
pub struct RecordingTarget {
    calls: Arc<Mutex<Vec<(String, Value)>>>,
    script: Arc<dyn Fn(&Value) -> Result<InvocationResult, InvokeError> + Send + Sync>,
}

impl RecordingTarget {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&Value) -> Result<InvocationResult, InvokeError> + Send + Sync + 'static,
    {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            script: Arc::new(script),
        }
    }

    /// Always answers 200
    pub fn succeeding() -> Self {
        Self::new(|_| Ok(InvocationResult::new(200, Bytes::from_static(b"{\"ok\":true}"))))
    }

    /// Always fails with a transport error
    pub fn failing() -> Self {
        Self::new(|_| Err(InvokeError::Transport("function unreachable".to_string())))
    }

    /// Every (function, payload) pair seen, in call order
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    /// The `message` field map of every payload seen
    pub fn messages(&self) -> Vec<Value> {
        self.calls()
            .into_iter()
            .map(|(_, payload)| payload["message"].clone())
            .collect()
    }
}

#[async_trait]
impl ComputeTarget for RecordingTarget {
    async fn invoke(&self, function: &str, payload: Bytes) -> Result<InvocationResult, InvokeError> {
        let value: Value = serde_json::from_slice(&payload)?;
        self.calls
            .lock()
            .unwrap()
            .push((function.to_string(), value.clone()));
        (self.script)(&value)
    }
}

/// A local HTTP function endpoint
///
/// Routes:
/// - `POST /ok`: echoes the payload with status 200
/// - `POST /fail`: status 500
/// - `POST /raise`: status 200 with `X-Amz-Function-Error: Unhandled`
pub struct FunctionStub {
    pub base_url: String,
    received: Arc<Mutex<Vec<Bytes>>>,
}

impl FunctionStub {
    pub async fn start() -> Self {
        let received = Arc::new(Mutex::new(Vec::new()));

        let record = {
            let received = Arc::clone(&received);
            warp::any().map(move || Arc::clone(&received))
        };

        let ok = warp::post()
            .and(warp::path("ok"))
            .and(warp::body::bytes())
            .and(record.clone())
            .map(|body: Bytes, received: Arc<Mutex<Vec<Bytes>>>| {
                received.lock().unwrap().push(body.clone());
                warp::reply::with_status(body.to_vec(), StatusCode::OK)
            });

        let fail = warp::post()
            .and(warp::path("fail"))
            .and(warp::body::bytes())
            .and(record.clone())
            .map(|body: Bytes, received: Arc<Mutex<Vec<Bytes>>>| {
                received.lock().unwrap().push(body);
                warp::reply::with_status(b"internal error".to_vec(), StatusCode::INTERNAL_SERVER_ERROR)
            });

        let raise = warp::post()
            .and(warp::path("raise"))
            .and(warp::body::bytes())
            .and(record)
            .map(|body: Bytes, received: Arc<Mutex<Vec<Bytes>>>| {
                received.lock().unwrap().push(body);
                warp::reply::with_header(
                    warp::reply::with_status(
                        br#"{"errorMessage":"boom"}"#.to_vec(),
                        StatusCode::OK,
                    ),
                    "X-Amz-Function-Error",
                    "Unhandled",
                )
            });

        let routes = ok.or(fail).or(raise);

        // Find a free port, then serve on it
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        tokio::spawn(warp::serve(routes).run(([127, 0, 0, 1], port)));

        for _ in 0..50 {
            if tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            received,
        }
    }

    pub fn url(&self, route: &str) -> String {
        format!("{}/{}", self.base_url, route)
    }

    /// Bodies received on any route, in arrival order
    pub fn received(&self) -> Vec<Bytes> {
        self.received.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_connection_string() {
        let conn_str = build_connection_string("localhost", 6380);
        assert_eq!(conn_str, "redis://localhost:6380/0");
    }
}
