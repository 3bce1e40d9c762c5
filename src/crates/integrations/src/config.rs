//! Per-client configuration.

use crate::retry::RetryPolicy;
use domain::{ClientError, ClientResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_health_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Configuration for one integration client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the provider, without a trailing slash.
    pub base_url: String,

    /// Bearer/API key sent on every call.
    pub api_key: String,

    /// Per-call timeout for feature requests.
    #[serde(default = "default_timeout")]
    pub timeout: Duration,

    /// Shorter timeout applied to `GET /health` probes.
    #[serde(default = "default_health_timeout")]
    pub health_timeout: Duration,

    /// Retry discipline for retryable failures.
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Application name sent as referer/title headers, when the provider
    /// tracks per-app usage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            api_key: api_key.into(),
            timeout: default_timeout(),
            health_timeout: default_health_timeout(),
            retry: RetryPolicy::default(),
            app_name: None,
        }
    }

    /// Read the API key from an environment variable.
    pub fn from_env(env_var: &str, base_url: impl Into<String>) -> ClientResult<Self> {
        let api_key = std::env::var(env_var).map_err(|_| {
            ClientError::Authentication(format!("environment variable {env_var} is not set"))
        })?;
        Ok(Self::new(base_url, api_key))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_health_timeout(mut self, health_timeout: Duration) -> Self {
        self.health_timeout = health_timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_stripped() {
        let config = ClientConfig::new("https://api.example.com/v1/", "key");
        assert_eq!(config.base_url, "https://api.example.com/v1");
    }

    #[test]
    fn test_builder() {
        let config = ClientConfig::new("https://api.example.com", "key")
            .with_timeout(Duration::from_secs(10))
            .with_health_timeout(Duration::from_secs(2))
            .with_app_name("tribe");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.health_timeout, Duration::from_secs(2));
        assert_eq!(config.app_name.as_deref(), Some("tribe"));
    }

    #[test]
    fn test_from_env_missing_key() {
        let result = ClientConfig::from_env("TRIBE_AI_TEST_UNSET_KEY", "https://api.example.com");
        assert!(matches!(result, Err(ClientError::Authentication(_))));
    }
}
