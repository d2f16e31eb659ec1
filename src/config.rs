//! Process configuration from environment variables

use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::dispatch::{ConsumerIdentity, DispatchConfig, RetryPolicy};
use crate::invoke::{http::validate_endpoint, HttpInvokerConfig};
use crate::store::{BlockMode, StoreConfig};

/// Errors raised while reading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is unset or empty
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    /// A variable is set but its value is unusable
    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Everything the bridge process needs to start
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Stream store connection
    pub store: StoreConfig,

    /// Streams to consume, in configured order
    pub streams: Vec<String>,

    /// Consumer group shared by all streams
    pub group: String,

    /// Function endpoint invoked per message
    pub function: String,

    /// Identity of this process within the group
    pub consumer: ConsumerIdentity,

    /// Maximum messages per stream per claim
    pub batch_size: usize,

    /// Claim blocking behaviour
    pub block: BlockMode,

    /// Backoff between failed claims
    pub retry: RetryPolicy,

    /// HTTP client settings for invocations
    pub invoker: HttpInvokerConfig,
}

impl BridgeConfig {
    /// Read configuration from the process environment
    ///
    /// Recognized variables:
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `REDIS_URL` | required |
    /// | `REDIS_STREAMS` | required, comma separated |
    /// | `CONSUMER_GROUP` | required |
    /// | `FUNCTION_URL` (or `LAMBDA_NAME`, also a URL) | required |
    /// | `CONSUMER_NAME` | `<HOSTNAME>-<pid>` or `bridge-<uuid>` |
    /// | `BATCH_SIZE` | 10 |
    /// | `BLOCK_MS` | 0 (block indefinitely) |
    /// | `RETRY_INITIAL_MS` | 100 |
    /// | `RETRY_MAX_MS` | 30000 |
    /// | `RETRY_MULTIPLIER` | 2.0 |
    /// | `INVOKE_CONNECT_TIMEOUT_MS` | 5000 |
    /// | `INVOKE_TIMEOUT_MS` | none |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary lookup function
    ///
    /// # Example
    ///
    /// ```
    /// use std::collections::HashMap;
    /// use stream_bridge::config::BridgeConfig;
    ///
    /// let vars = HashMap::from([
    ///     ("REDIS_URL", "redis://localhost:6379"),
    ///     ("REDIS_STREAMS", "orders,payments"),
    ///     ("CONSUMER_GROUP", "g1"),
    ///     ("FUNCTION_URL", "https://fn.example.com/"),
    ///     ("CONSUMER_NAME", "worker-1"),
    /// ]);
    /// let config = BridgeConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
    /// assert_eq!(config.streams, vec!["orders", "payments"]);
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let url = required("REDIS_URL")?;
        let store = StoreConfig::from_connection_string(&url).map_err(|e| ConfigError::Invalid {
            var: "REDIS_URL",
            reason: e.to_string(),
        })?;

        let streams = split_streams(&required("REDIS_STREAMS")?);
        if streams.is_empty() {
            return Err(ConfigError::Invalid {
                var: "REDIS_STREAMS",
                reason: "no stream names given".to_string(),
            });
        }

        let group = required("CONSUMER_GROUP")?.trim().to_string();

        let (function_var, function) = match get("FUNCTION_URL") {
            Some(url) => ("FUNCTION_URL", url),
            None => (
                "LAMBDA_NAME",
                get("LAMBDA_NAME").ok_or(ConfigError::Missing("FUNCTION_URL"))?,
            ),
        };
        let function = function.trim().to_string();
        validate_endpoint(&function).map_err(|e| ConfigError::Invalid {
            var: function_var,
            reason: format!(
                "{}; a function URL is required, bare function names are not supported",
                e
            ),
        })?;

        let consumer = ConsumerIdentity::resolve(
            get("CONSUMER_NAME").as_deref(),
            get("HOSTNAME").as_deref(),
        );

        let batch_size: usize = parse_or(&get, "BATCH_SIZE", 10)?;
        if batch_size == 0 {
            return Err(ConfigError::Invalid {
                var: "BATCH_SIZE",
                reason: "must be at least 1".to_string(),
            });
        }

        let block = BlockMode::from_millis(parse_or(&get, "BLOCK_MS", 0)?);

        let retry = RetryPolicy::new(
            Duration::from_millis(parse_or(&get, "RETRY_INITIAL_MS", 100)?),
            Duration::from_millis(parse_or(&get, "RETRY_MAX_MS", 30_000)?),
            parse_or(&get, "RETRY_MULTIPLIER", 2.0)?,
        );
        if !(retry.multiplier.is_finite() && retry.multiplier >= 1.0) {
            return Err(ConfigError::Invalid {
                var: "RETRY_MULTIPLIER",
                reason: "must be a finite number >= 1.0".to_string(),
            });
        }

        let mut invoker = HttpInvokerConfig::default().with_connect_timeout(Duration::from_millis(
            parse_or(&get, "INVOKE_CONNECT_TIMEOUT_MS", 5_000)?,
        ));
        if let Some(ms) = parse_opt::<u64, _>(&get, "INVOKE_TIMEOUT_MS")? {
            invoker = invoker.with_request_timeout(Duration::from_millis(ms));
        }

        Ok(Self {
            store,
            streams,
            group,
            function,
            consumer,
            batch_size,
            block,
            retry,
            invoker,
        })
    }

    /// Dispatcher settings derived from this configuration
    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig::new(
            self.streams.clone(),
            self.group.clone(),
            self.consumer.clone(),
            self.function.clone(),
        )
        .with_batch_size(self.batch_size)
        .with_block(self.block)
        .with_retry(self.retry.clone())
    }
}

/// Split a comma separated stream list, dropping blanks
pub fn split_streams(streams: &str) -> Vec<String> {
    streams
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_opt<T, G>(get: &G, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(var)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                var,
                reason: format!("'{}': {}", raw, e),
            })
        })
        .transpose()
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    Ok(parse_opt(get, var)?.unwrap_or(default))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("REDIS_URL", "redis://localhost:6379"),
            ("REDIS_STREAMS", "orders"),
            ("CONSUMER_GROUP", "g1"),
            ("FUNCTION_URL", "https://fn.example.com/"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<BridgeConfig, ConfigError> {
        BridgeConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults() {
        let config = load(&base_vars()).unwrap();

        assert_eq!(config.store.host(), Some("localhost"));
        assert_eq!(config.streams, vec!["orders"]);
        assert_eq!(config.group, "g1");
        assert_eq!(config.function, "https://fn.example.com/");
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.block, BlockMode::Indefinite);
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.invoker.connect_timeout, Duration::from_secs(5));
        assert!(config.invoker.request_timeout.is_none());
    }

    #[test]
    fn test_overrides() {
        let mut vars = base_vars();
        vars.insert("REDIS_STREAMS", " orders, payments ,,refunds ");
        vars.insert("CONSUMER_NAME", "worker-3");
        vars.insert("BATCH_SIZE", "25");
        vars.insert("BLOCK_MS", "1500");
        vars.insert("RETRY_INITIAL_MS", "50");
        vars.insert("RETRY_MAX_MS", "2000");
        vars.insert("RETRY_MULTIPLIER", "1.5");
        vars.insert("INVOKE_TIMEOUT_MS", "60000");

        let config = load(&vars).unwrap();

        assert_eq!(config.streams, vec!["orders", "payments", "refunds"]);
        assert_eq!(config.consumer.as_str(), "worker-3");
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.block, BlockMode::Millis(1500));
        assert_eq!(
            config.retry,
            RetryPolicy::new(Duration::from_millis(50), Duration::from_secs(2), 1.5)
        );
        assert_eq!(config.invoker.request_timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_lambda_name_alias() {
        let mut vars = base_vars();
        vars.remove("FUNCTION_URL");
        vars.insert("LAMBDA_NAME", "https://abc.lambda-url.us-east-1.on.aws/");

        let config = load(&vars).unwrap();
        assert_eq!(config.function, "https://abc.lambda-url.us-east-1.on.aws/");
    }

    #[test]
    fn test_lambda_name_must_be_a_url() {
        let mut vars = base_vars();
        vars.remove("FUNCTION_URL");
        vars.insert("LAMBDA_NAME", "my-function");

        match load(&vars) {
            Err(err @ ConfigError::Invalid { var: "LAMBDA_NAME", .. }) => {
                assert!(err.to_string().contains("function URL is required"));
            }
            other => panic!("expected invalid LAMBDA_NAME, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_required() {
        for var in ["REDIS_URL", "REDIS_STREAMS", "CONSUMER_GROUP", "FUNCTION_URL"] {
            let mut vars = base_vars();
            vars.remove(var);
            match load(&vars) {
                Err(ConfigError::Missing(missing)) => assert_eq!(missing, var),
                other => panic!("expected missing {var}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_invalid_values() {
        let cases = [
            ("REDIS_URL", "postgres://nope"),
            ("REDIS_STREAMS", " , ,"),
            ("FUNCTION_URL", "process-orders"),
            ("BATCH_SIZE", "0"),
            ("BATCH_SIZE", "ten"),
            ("BLOCK_MS", "-1"),
            ("RETRY_MULTIPLIER", "0.5"),
        ];

        for (var, value) in cases {
            let mut vars = base_vars();
            vars.insert(var, value);
            match load(&vars) {
                Err(ConfigError::Invalid { var: bad, .. }) => assert_eq!(bad, var),
                other => panic!("expected invalid {var}={value}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_split_streams() {
        assert_eq!(split_streams("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(split_streams(" a , b "), vec!["a", "b"]);
        assert!(split_streams(",,").is_empty());
    }

    #[test]
    fn test_dispatch_config() {
        let mut vars = base_vars();
        vars.insert("CONSUMER_NAME", "worker-1");
        vars.insert("BATCH_SIZE", "5");

        let dispatch = load(&vars).unwrap().dispatch_config();
        assert_eq!(dispatch.streams, vec!["orders"]);
        assert_eq!(dispatch.group, "g1");
        assert_eq!(dispatch.consumer.as_str(), "worker-1");
        assert_eq!(dispatch.function, "https://fn.example.com/");
        assert_eq!(dispatch.batch_size, 5);
    }
}
