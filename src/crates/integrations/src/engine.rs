//! Internal AI Engine client.
//!
//! The AI Engine consumes structured, operation-tagged payloads rather than
//! raw prompts; the rendered prompt travels alongside the data as an
//! `instructions` field.

use crate::config::ClientConfig;
use crate::http::{require_field, HttpTransport};
use crate::retry::retry_with_backoff;
use domain::api::{AiEngineApi, ApiResponse, EngineCallOptions, HealthStatus};
use domain::payload::{EngagementInput, MatchingInput, MatchingOutput, PersonalityInput, RecommendationInput};
use domain::{ClientError, ClientResult, GenerationParams, MetricsSink};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Client for the internal AI Engine's REST endpoints.
pub struct AiEngineClient {
    transport: HttpTransport,
}

impl AiEngineClient {
    pub fn new(config: ClientConfig, metrics: Arc<dyn MetricsSink>) -> ClientResult<Self> {
        Ok(Self {
            transport: HttpTransport::new(config, metrics, "ai_engine")?,
        })
    }

    async fn call(&self, operation: &str, path: &str, body: &Value) -> ClientResult<Value> {
        let retry = self.transport.config().retry.clone();
        retry_with_backoff(&retry, operation, || self.transport.post_json(path, body)).await
    }
}

#[derive(Serialize)]
struct EngineOptions<'a> {
    #[serde(flatten)]
    params: &'a GenerationParams,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
}

impl<'a> EngineOptions<'a> {
    fn from_call(call: &'a EngineCallOptions) -> Self {
        Self {
            params: &call.params,
            instructions: call.instructions.as_deref(),
        }
    }
}

/// Serialize an operation-tagged input, splitting the tag out of the data
/// object the engine expects.
fn split_tagged_input<T: Serialize>(input: &T) -> ClientResult<(String, Value)> {
    let mut value = serde_json::to_value(input)
        .map_err(|e| ClientError::Unknown(format!("failed to encode payload: {e}")))?;
    let object = value
        .as_object_mut()
        .ok_or_else(|| ClientError::Unknown("payload did not encode to an object".into()))?;
    let tag = object
        .remove("operation")
        .and_then(|t| t.as_str().map(str::to_lowercase))
        .unwrap_or_default();
    Ok((tag, Value::Object(std::mem::take(object))))
}

fn extract_array(raw: &Value, field: &str, path: &str) -> ClientResult<Vec<Value>> {
    let value = require_field(raw, field, path)?;
    value
        .as_array()
        .cloned()
        .ok_or_else(|| ClientError::Server(format!("`{field}` from {path} is not an array")))
}

#[async_trait]
impl AiEngineApi for AiEngineClient {
    async fn matching(
        &self,
        input: &MatchingInput,
        call: &EngineCallOptions,
    ) -> ClientResult<ApiResponse<MatchingOutput>> {
        let (matching_type, data) = split_tagged_input(input)?;
        let body = serde_json::json!({
            "matching_type": matching_type,
            "data": data,
            "options": EngineOptions::from_call(call),
            "model_name": call.model_id,
        });
        let raw = self.call("engine.matching", "/matching", &body).await?;
        let matches = extract_array(&raw, "matches", "/matching")?;
        Ok(ApiResponse::new(MatchingOutput { matches }, raw))
    }

    async fn personality(
        &self,
        input: &PersonalityInput,
        call: &EngineCallOptions,
    ) -> ClientResult<ApiResponse<Value>> {
        let (analysis_type, data) = split_tagged_input(input)?;
        let body = serde_json::json!({
            "analysis_type": analysis_type,
            "assessment_data": data,
            "options": EngineOptions::from_call(call),
            "model_name": call.model_id,
        });
        let raw = self.call("engine.personality", "/personality", &body).await?;
        let profile = require_field(&raw, "profile", "/personality")?.clone();
        Ok(ApiResponse::new(profile, raw))
    }

    async fn engagement(
        &self,
        input: &EngagementInput,
        call: &EngineCallOptions,
    ) -> ClientResult<ApiResponse<Vec<Value>>> {
        let body = serde_json::json!({
            "engagement_type": input.kind.tag(),
            "context": input.tribe_data,
            "count": input.count,
            "variant": input.variant,
            "options": EngineOptions::from_call(call),
            "model_name": call.model_id,
        });
        let raw = self.call("engine.engagement", "/engagement", &body).await?;
        let items = extract_array(&raw, "items", "/engagement")?;
        Ok(ApiResponse::new(items, raw))
    }

    async fn recommendations(
        &self,
        input: &RecommendationInput,
        call: &EngineCallOptions,
    ) -> ClientResult<ApiResponse<Vec<Value>>> {
        let body = serde_json::json!({
            "recommendation_type": input.kind.tag(),
            "context": {
                "tribe_data": input.tribe_data,
                "location": input.location,
                "date_range": input.date_range,
                "weather_data": input.weather_data,
                "budget": input.budget,
            },
            "count": input.count,
            "options": EngineOptions::from_call(call),
            "model_name": call.model_id,
        });
        let raw = self
            .call("engine.recommendations", "/recommendations", &body)
            .await?;
        let recommendations = extract_array(&raw, "recommendations", "/recommendations")?;
        Ok(ApiResponse::new(recommendations, raw))
    }

    async fn health(&self) -> ClientResult<HealthStatus> {
        let timeout = self.transport.config().health_timeout;
        match self.transport.get_json("/health", timeout).await {
            Ok(_) => Ok(HealthStatus::healthy()),
            Err(err @ (ClientError::Timeout(_) | ClientError::Network(_))) => {
                warn!(error = %err, "AI engine unreachable");
                Ok(HealthStatus::unreachable(err.to_string()))
            }
            Err(err) => Ok(HealthStatus::degraded(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_split_tagged_input() {
        let input = MatchingInput::UserToTribes {
            user_profile: json!({"id": "u1"}),
            tribes: vec![json!({"id": "t1"})],
        };
        let (tag, data) = split_tagged_input(&input).unwrap();
        assert_eq!(tag, "user_to_tribes");
        assert_eq!(data["user_profile"]["id"], "u1");
        assert!(data.get("operation").is_none());
    }

    #[test]
    fn test_extract_array_fails_closed() {
        let raw = json!({"status": "ok"});
        let err = extract_array(&raw, "matches", "/matching").unwrap_err();
        assert!(matches!(err, ClientError::Server(_)));

        let raw = json!({"matches": "not-an-array"});
        assert!(extract_array(&raw, "matches", "/matching").is_err());

        let raw = json!({"matches": [{"tribeId": "t1"}]});
        assert_eq!(extract_array(&raw, "matches", "/matching").unwrap().len(), 1);
    }

    #[test]
    fn test_engine_options_wire_shape() {
        let call = EngineCallOptions {
            model_id: "openai/gpt-4".into(),
            params: GenerationParams::new().with_temperature(0.3),
            instructions: Some("Score each tribe".into()),
        };
        let wire = serde_json::to_value(EngineOptions::from_call(&call)).unwrap();
        assert_eq!(wire["temperature"], 0.3);
        assert_eq!(wire["instructions"], "Score each tribe");
        assert!(wire.get("max_tokens").is_none());
    }
}
