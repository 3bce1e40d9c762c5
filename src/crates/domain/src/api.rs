//! Client traits implemented by the integration crate.
//!
//! The orchestration engine depends only on these traits and receives
//! concrete clients as `Arc<dyn …>` constructor parameters, so tests can
//! substitute in-process fakes without any network.

use crate::chat::{ChatCompletion, ChatMessage, Completion, Embedding};
use crate::error::ClientResult;
use crate::model::ModelConfig;
use crate::params::GenerationParams;
use crate::payload::{EngagementInput, MatchingInput, MatchingOutput, PersonalityInput, RecommendationInput};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A parsed provider result together with the raw body it came from.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub output: T,
    pub raw: Value,
}

impl<T> ApiResponse<T> {
    pub fn new(output: T, raw: Value) -> Self {
        Self { output, raw }
    }
}

/// Per-call options forwarded to the AI Engine.
#[derive(Debug, Clone, Default)]
pub struct EngineCallOptions {
    /// Model id resolved by the registry.
    pub model_id: String,
    /// Merged generation parameters.
    pub params: GenerationParams,
    /// Rendered prompt text sent alongside the structured payload.
    pub instructions: Option<String>,
}

/// Outcome of a provider health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unreachable,
}

/// Health probe result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub state: HealthState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl HealthStatus {
    pub fn healthy() -> Self {
        Self {
            state: HealthState::Healthy,
            detail: None,
        }
    }

    pub fn degraded(detail: impl Into<String>) -> Self {
        Self {
            state: HealthState::Degraded,
            detail: Some(detail.into()),
        }
    }

    pub fn unreachable(detail: impl Into<String>) -> Self {
        Self {
            state: HealthState::Unreachable,
            detail: Some(detail.into()),
        }
    }
}

/// Model provider (OpenRouter-style REST API).
#[async_trait]
pub trait ModelProviderApi: Send + Sync {
    /// `POST /completions` — plain text completion.
    async fn complete(
        &self,
        prompt: &str,
        model_id: &str,
        params: &GenerationParams,
    ) -> ClientResult<ApiResponse<Completion>>;

    /// `POST /chat/completions` — chat completion.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        model_id: &str,
        params: &GenerationParams,
    ) -> ClientResult<ApiResponse<ChatCompletion>>;

    /// `POST /embeddings` — embed a single input.
    async fn embed(&self, input: &str, model_id: &str) -> ClientResult<ApiResponse<Embedding>>;

    /// `GET /models` — fetch the provider catalog.
    async fn list_models(&self) -> ClientResult<Vec<ModelConfig>>;

    /// `GET /health` with the short health timeout.
    async fn health(&self) -> ClientResult<HealthStatus>;
}

/// Internal AI Engine REST API.
#[async_trait]
pub trait AiEngineApi: Send + Sync {
    /// `POST /matching`.
    async fn matching(
        &self,
        input: &MatchingInput,
        call: &EngineCallOptions,
    ) -> ClientResult<ApiResponse<MatchingOutput>>;

    /// `POST /personality` — returns the personality profile object.
    async fn personality(
        &self,
        input: &PersonalityInput,
        call: &EngineCallOptions,
    ) -> ClientResult<ApiResponse<Value>>;

    /// `POST /engagement` — returns generated engagement items.
    async fn engagement(
        &self,
        input: &EngagementInput,
        call: &EngineCallOptions,
    ) -> ClientResult<ApiResponse<Vec<Value>>>;

    /// `POST /recommendations` — returns recommendation items.
    async fn recommendations(
        &self,
        input: &RecommendationInput,
        call: &EngineCallOptions,
    ) -> ClientResult<ApiResponse<Vec<Value>>>;

    /// `GET /health` with the short health timeout.
    async fn health(&self) -> ClientResult<HealthStatus>;
}
