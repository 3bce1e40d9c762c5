//! Model provider client (OpenRouter-style REST API).

use crate::config::ClientConfig;
use crate::http::{require_field, HttpTransport};
use crate::retry::retry_with_backoff;
use domain::api::{ApiResponse, HealthStatus, ModelProviderApi};
use domain::{
    Capability, ChatCompletion, ChatMessage, ChatRole, ClientError, ClientResult, Completion,
    Embedding, GenerationParams, MetricsSink, ModelConfig, UsageMetadata,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Client for the model provider's REST endpoints.
pub struct ModelProviderClient {
    transport: HttpTransport,
}

impl ModelProviderClient {
    pub fn new(config: ClientConfig, metrics: Arc<dyn MetricsSink>) -> ClientResult<Self> {
        Ok(Self {
            transport: HttpTransport::new(config, metrics, "model_provider")?,
        })
    }

    async fn call(&self, operation: &str, path: &str, body: &Value) -> ClientResult<Value> {
        let retry = self.transport.config().retry.clone();
        retry_with_backoff(&retry, operation, || self.transport.post_json(path, body)).await
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(flatten)]
    params: &'a GenerationParams,
    stream: bool,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(flatten)]
    params: &'a GenerationParams,
    stream: bool,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

/// Catalog entry as the provider reports it.
#[derive(Debug, Deserialize)]
struct CatalogEntry {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    capabilities: Vec<String>,
    #[serde(default)]
    context_length: Option<u32>,
    #[serde(default)]
    max_output_tokens: Option<u32>,
    #[serde(default)]
    default_parameters: Option<GenerationParams>,
    #[serde(default = "CatalogEntry::default_active")]
    active: bool,
}

impl CatalogEntry {
    fn default_active() -> bool {
        true
    }

    fn into_model(self) -> ModelConfig {
        let capabilities = self
            .capabilities
            .iter()
            .filter_map(|raw| parse_capability(raw))
            .collect::<Vec<_>>();

        let mut model = ModelConfig::new(self.id).with_capabilities(capabilities);
        if let Some(name) = self.name {
            model = model.with_name(name);
        }
        if let Some(window) = self.context_length {
            model = model.with_context_window(window);
        }
        if let Some(max_out) = self.max_output_tokens {
            model = model.with_max_output_tokens(max_out);
        }
        if let Some(params) = self.default_parameters {
            model = model.with_default_params(params);
        }
        if !self.active {
            model = model.inactive();
        }
        model
    }
}

fn parse_capability(raw: &str) -> Option<Capability> {
    match raw {
        "text-generation" => Some(Capability::TextGeneration),
        "chat-completion" => Some(Capability::ChatCompletion),
        "embedding" => Some(Capability::Embedding),
        "function-calling" => Some(Capability::FunctionCalling),
        "image-understanding" => Some(Capability::ImageUnderstanding),
        other => {
            debug!(capability = other, "ignoring undeclared capability");
            None
        }
    }
}

fn parse_usage(body: &Value) -> Option<UsageMetadata> {
    let usage = body.get("usage")?;
    Some(UsageMetadata::new(
        usage.get("prompt_tokens")?.as_u64()? as u32,
        usage.get("completion_tokens").and_then(Value::as_u64).unwrap_or(0) as u32,
    ))
}

fn response_metadata(body: &Value) -> HashMap<String, Value> {
    let mut metadata = HashMap::new();
    for key in ["model", "provider"] {
        if let Some(value) = body.get(key) {
            metadata.insert(key.to_string(), value.clone());
        }
    }
    if let Some(reason) = body
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("finish_reason"))
    {
        metadata.insert("finish_reason".to_string(), reason.clone());
    }
    metadata
}

#[async_trait]
impl ModelProviderApi for ModelProviderClient {
    async fn complete(
        &self,
        prompt: &str,
        model_id: &str,
        params: &GenerationParams,
    ) -> ClientResult<ApiResponse<Completion>> {
        let request = CompletionRequest {
            model: model_id,
            prompt,
            params,
            stream: false,
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| ClientError::Unknown(format!("failed to encode request: {e}")))?;
        let raw = self.call("provider.complete", "/completions", &body).await?;

        let choices = require_field(&raw, "choices", "/completions")?;
        let text = choices
            .get(0)
            .and_then(|c| c.get("text"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ClientError::Server("response from /completions has no choice text".into())
            })?
            .to_string();

        let completion = Completion {
            text,
            usage: parse_usage(&raw),
            metadata: response_metadata(&raw),
        };
        Ok(ApiResponse::new(completion, raw))
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        model_id: &str,
        params: &GenerationParams,
    ) -> ClientResult<ApiResponse<ChatCompletion>> {
        let request = ChatCompletionRequest {
            model: model_id,
            messages,
            params,
            stream: false,
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| ClientError::Unknown(format!("failed to encode request: {e}")))?;
        let raw = self.call("provider.chat", "/chat/completions", &body).await?;

        let choices = require_field(&raw, "choices", "/chat/completions")?;
        let content = choices
            .get(0)
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ClientError::Server("response from /chat/completions has no message content".into())
            })?
            .to_string();

        let completion = ChatCompletion {
            message: ChatMessage {
                role: ChatRole::Assistant,
                content,
            },
            usage: parse_usage(&raw),
            metadata: response_metadata(&raw),
        };
        Ok(ApiResponse::new(completion, raw))
    }

    async fn embed(&self, input: &str, model_id: &str) -> ClientResult<ApiResponse<Embedding>> {
        let request = EmbeddingRequest {
            model: model_id,
            input,
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| ClientError::Unknown(format!("failed to encode request: {e}")))?;
        let raw = self.call("provider.embed", "/embeddings", &body).await?;

        let data = require_field(&raw, "data", "/embeddings")?;
        let vector = data
            .get(0)
            .and_then(|d| d.get("embedding"))
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ClientError::Server("response from /embeddings has no embedding vector".into())
            })?
            .iter()
            .filter_map(Value::as_f64)
            .map(|f| f as f32)
            .collect::<Vec<_>>();

        let embedding = Embedding {
            vector,
            usage: parse_usage(&raw),
        };
        Ok(ApiResponse::new(embedding, raw))
    }

    async fn list_models(&self) -> ClientResult<Vec<ModelConfig>> {
        let retry = self.transport.config().retry.clone();
        let timeout = self.transport.config().timeout;
        let raw = retry_with_backoff(&retry, "provider.list_models", || {
            self.transport.get_json("/models", timeout)
        })
        .await?;

        let data = require_field(&raw, "data", "/models")?;
        let entries: Vec<CatalogEntry> = serde_json::from_value(data.clone())
            .map_err(|e| ClientError::Server(format!("malformed model catalog: {e}")))?;

        Ok(entries.into_iter().map(CatalogEntry::into_model).collect())
    }

    async fn health(&self) -> ClientResult<HealthStatus> {
        let timeout = self.transport.config().health_timeout;
        match self.transport.get_json("/health", timeout).await {
            Ok(_) => Ok(HealthStatus::healthy()),
            Err(err @ (ClientError::Timeout(_) | ClientError::Network(_))) => {
                warn!(error = %err, "model provider unreachable");
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
    fn test_chat_request_wire_shape() {
        let params = GenerationParams::new().with_temperature(0.7).with_max_tokens(256);
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("hi")];
        let request = ChatCompletionRequest {
            model: "openai/gpt-4",
            messages: &messages,
            params: &params,
            stream: false,
        };
        let wire = serde_json::to_value(&request).unwrap();
        assert_eq!(wire["model"], "openai/gpt-4");
        assert_eq!(wire["messages"][0]["role"], "system");
        assert_eq!(wire["temperature"], 0.7);
        assert_eq!(wire["max_tokens"], 256);
        assert!(wire.get("top_p").is_none());
    }

    #[test]
    fn test_catalog_entry_conversion() {
        let entry: CatalogEntry = serde_json::from_value(json!({
            "id": "openai/gpt-4",
            "name": "GPT-4",
            "capabilities": ["text-generation", "chat-completion", "function-calling", "experimental"],
            "context_length": 8192,
            "max_output_tokens": 4096
        }))
        .unwrap();

        let model = entry.into_model();
        assert_eq!(model.name, "GPT-4");
        assert_eq!(model.context_window, 8192);
        assert!(model.active);
        // Undeclared capability strings are dropped, not errors.
        assert_eq!(model.capabilities.len(), 3);
        assert!(model.satisfies(&[Capability::FunctionCalling]));
    }

    #[test]
    fn test_catalog_entry_inactive() {
        let entry: CatalogEntry =
            serde_json::from_value(json!({"id": "legacy/model", "active": false})).unwrap();
        assert!(!entry.into_model().active);
    }

    #[test]
    fn test_usage_parsing() {
        let body = json!({"usage": {"prompt_tokens": 10, "completion_tokens": 5}});
        let usage = parse_usage(&body).unwrap();
        assert_eq!(usage.total_tokens, 15);

        assert!(parse_usage(&json!({})).is_none());
    }

    #[test]
    fn test_response_metadata_extraction() {
        let body = json!({
            "model": "openai/gpt-4",
            "provider": "openai",
            "choices": [{"finish_reason": "stop"}]
        });
        let metadata = response_metadata(&body);
        assert_eq!(metadata["model"], json!("openai/gpt-4"));
        assert_eq!(metadata["finish_reason"], json!("stop"));
    }
}
