//! Shared HTTP transport for the integration clients.
//!
//! Owns the reqwest client, attaches the correlation id and auth headers,
//! maps transport and status failures into the `ClientError` taxonomy, and
//! feeds the error counters and request-duration histograms.

use crate::config::ClientConfig;
use domain::{ClientError, ClientResult, MetricsSink};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

pub(crate) struct HttpTransport {
    client: reqwest::Client,
    config: ClientConfig,
    metrics: Arc<dyn MetricsSink>,
    /// Provider label attached to every metric event.
    provider: &'static str,
}

impl HttpTransport {
    pub(crate) fn new(
        config: ClientConfig,
        metrics: Arc<dyn MetricsSink>,
        provider: &'static str,
    ) -> ClientResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ClientError::Unknown(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            config,
            metrics,
            provider,
        })
    }

    pub(crate) fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// POST a JSON body with the feature-call timeout.
    pub(crate) async fn post_json<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<Value> {
        let request = self
            .client
            .post(format!("{}{path}", self.config.base_url))
            .timeout(self.config.timeout)
            .json(body);
        self.execute(path, request).await
    }

    /// GET a JSON body with an explicit timeout (health probes pass the
    /// shorter one).
    pub(crate) async fn get_json(&self, path: &str, timeout: Duration) -> ClientResult<Value> {
        let request = self
            .client
            .get(format!("{}{path}", self.config.base_url))
            .timeout(timeout);
        self.execute(path, request).await
    }

    async fn execute(&self, path: &str, request: reqwest::RequestBuilder) -> ClientResult<Value> {
        let correlation_id = Uuid::new_v4();
        let mut request = request
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("X-Request-Id", correlation_id.to_string());
        if let Some(app_name) = &self.config.app_name {
            request = request
                .header("HTTP-Referer", app_name)
                .header("X-Title", app_name);
        }

        debug!(
            provider = self.provider,
            path,
            correlation_id = %correlation_id,
            "dispatching request"
        );
        let started = Instant::now();
        let outcome = self.send(path, request).await;
        let elapsed = started.elapsed();

        self.metrics.observe_duration(
            "client_request_seconds",
            &[("provider", self.provider), ("endpoint", path)],
            elapsed,
        );

        match &outcome {
            Ok(_) => {
                debug!(
                    provider = self.provider,
                    path,
                    correlation_id = %correlation_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "request completed"
                );
            }
            Err(err) => {
                warn!(
                    provider = self.provider,
                    path,
                    correlation_id = %correlation_id,
                    classification = err.classification(),
                    error = %err,
                    "request failed"
                );
                self.metrics.incr_counter(
                    "client_errors",
                    &[
                        ("provider", self.provider),
                        ("classification", err.classification()),
                    ],
                );
            }
        }
        outcome
    }

    async fn send(&self, path: &str, request: reqwest::RequestBuilder) -> ClientResult<Value> {
        let response = request.send().await.map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_error(status.as_u16(), &body, path));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| ClientError::Server(format!("malformed response body from {path}: {e}")))
    }
}

fn map_transport_error(err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout(err.to_string())
    } else if err.is_connect() || err.is_request() {
        ClientError::Network(err.to_string())
    } else {
        ClientError::Unknown(err.to_string())
    }
}

fn map_status_error(status: u16, body: &str, path: &str) -> ClientError {
    let detail = if body.is_empty() {
        format!("HTTP {status} from {path}")
    } else {
        format!("HTTP {status} from {path}: {body}")
    };
    match status {
        401 | 403 => ClientError::Authentication(detail),
        429 => ClientError::RateLimit(detail),
        400 | 422 => {
            if is_content_filter_body(body) {
                ClientError::ContentFiltered(detail)
            } else {
                ClientError::Validation(detail)
            }
        }
        500..=599 => ClientError::Server(detail),
        _ => ClientError::Unknown(detail),
    }
}

/// A 400 whose error body declares a content-filter type is a filtering
/// rejection, not a malformed request.
fn is_content_filter_body(body: &str) -> bool {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("type"))
                .and_then(|t| t.as_str())
                .map(|t| t == "content_filter")
        })
        .unwrap_or(false)
}

/// Fail-closed field access: a success body missing the expected top-level
/// field is a server error, never an empty success.
pub(crate) fn require_field<'a>(body: &'a Value, field: &str, path: &str) -> ClientResult<&'a Value> {
    body.get(field).ok_or_else(|| {
        ClientError::Server(format!("response from {path} is missing `{field}`"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            map_status_error(401, "", "/x"),
            ClientError::Authentication(_)
        ));
        assert!(matches!(
            map_status_error(429, "", "/x"),
            ClientError::RateLimit(_)
        ));
        assert!(matches!(
            map_status_error(422, "", "/x"),
            ClientError::Validation(_)
        ));
        assert!(matches!(
            map_status_error(503, "", "/x"),
            ClientError::Server(_)
        ));
        assert!(matches!(
            map_status_error(302, "", "/x"),
            ClientError::Unknown(_)
        ));
    }

    #[test]
    fn test_content_filter_detection() {
        let body = r#"{"error": {"type": "content_filter", "message": "refused"}}"#;
        assert!(matches!(
            map_status_error(400, body, "/completions"),
            ClientError::ContentFiltered(_)
        ));

        let plain = r#"{"error": {"type": "invalid_request", "message": "bad"}}"#;
        assert!(matches!(
            map_status_error(400, plain, "/completions"),
            ClientError::Validation(_)
        ));
    }

    #[test]
    fn test_require_field_fails_closed() {
        let body = serde_json::json!({"unexpected": true});
        let err = require_field(&body, "choices", "/completions").unwrap_err();
        assert!(matches!(err, ClientError::Server(_)));
        assert!(err.to_string().contains("choices"));
    }
}
