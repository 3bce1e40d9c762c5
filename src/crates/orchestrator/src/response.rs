//! Orchestration responses.

use chrono::{DateTime, Utc};
use domain::{Feature, FeatureOutput};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

/// Terminal outcome recorded on a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStatus {
    Completed,
    Failed,
}

/// The terminal result of one orchestration request. Created exactly once,
/// when the request leaves `Processing`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationResponse {
    pub id: Uuid,
    /// Owning request; 1:1.
    pub request_id: Uuid,
    pub feature: Feature,
    /// Normalized result payload; absent on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<FeatureOutput>,
    /// Raw provider payload; absent on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
    /// Model that served the request, when one was resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    pub status: ResponseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Best-effort trace of where the failure originated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_trace: Option<String>,
    /// Wall-clock processing duration in milliseconds.
    pub processing_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl OrchestrationResponse {
    /// Record a successful completion.
    pub fn success(
        request_id: Uuid,
        feature: Feature,
        output: FeatureOutput,
        raw: Value,
        model_id: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id,
            feature,
            output: Some(output),
            raw: Some(raw),
            model_id: Some(model_id.into()),
            status: ResponseStatus::Completed,
            error: None,
            error_trace: None,
            processing_ms: elapsed.as_millis() as u64,
            created_at: Utc::now(),
        }
    }

    /// Record a processing failure so it stays observable and queryable.
    pub fn failure(
        request_id: Uuid,
        feature: Feature,
        model_id: Option<String>,
        error: impl Into<String>,
        error_trace: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            request_id,
            feature,
            output: None,
            raw: None,
            model_id,
            status: ResponseStatus::Failed,
            error: Some(error.into()),
            error_trace: Some(error_trace.into()),
            processing_ms: elapsed.as_millis() as u64,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::payload::MatchingOutput;
    use serde_json::json;

    #[test]
    fn test_success_response() {
        let request_id = Uuid::new_v4();
        let response = OrchestrationResponse::success(
            request_id,
            Feature::Matching,
            FeatureOutput::Matching(MatchingOutput {
                matches: vec![json!({"tribeId": "t1", "compatibilityScore": 85})],
            }),
            json!({"matches": []}),
            "openai/gpt-4",
            Duration::from_millis(42),
        );
        assert_eq!(response.status, ResponseStatus::Completed);
        assert_eq!(response.request_id, request_id);
        assert!(response.error.is_none());
        assert_eq!(response.processing_ms, 42);
    }

    #[test]
    fn test_failure_response_keeps_error() {
        let response = OrchestrationResponse::failure(
            Uuid::new_v4(),
            Feature::Matching,
            Some("openai/gpt-4".into()),
            "service unavailable: HTTP 503",
            "integration call: provider.matching",
            Duration::from_millis(10),
        );
        assert_eq!(response.status, ResponseStatus::Failed);
        assert!(response.output.is_none());
        assert!(response.error.as_deref().unwrap().contains("503"));
        assert!(response.error_trace.is_some());
    }
}
