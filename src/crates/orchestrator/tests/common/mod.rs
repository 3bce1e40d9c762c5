//! Shared fixtures: in-process mock clients and engine wiring.
#![allow(dead_code)]

use async_trait::async_trait;
use domain::api::{
    AiEngineApi, ApiResponse, EngineCallOptions, HealthStatus, ModelProviderApi,
};
use domain::payload::{
    EngagementInput, MatchingInput, MatchingOutput, PersonalityInput, RecommendationInput,
};
use domain::{
    Capability, ChatCompletion, ChatMessage, ChatRole, ClientError, ClientResult, Completion,
    Embedding, GenerationParams, ModelConfig, RecordingMetrics,
};
use orchestrator::{MemoryStore, ModelRegistry, OrchestrationEngine, OrchestratorConfig};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Opt-in tracing for debugging a test run: `RUST_LOG=debug cargo test`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn full_capabilities() -> Vec<Capability> {
    vec![
        Capability::TextGeneration,
        Capability::ChatCompletion,
        Capability::FunctionCalling,
    ]
}

/// Catalog used by most tests: one big qualified model, one chat-only.
pub fn test_catalog() -> Vec<ModelConfig> {
    vec![
        ModelConfig::new("test/omni")
            .with_capabilities(full_capabilities())
            .with_context_window(32_768)
            .with_max_output_tokens(4_096),
        ModelConfig::new("test/chat-only")
            .with_capabilities(vec![
                Capability::TextGeneration,
                Capability::ChatCompletion,
            ])
            .with_context_window(8_192)
            .with_max_output_tokens(2_048),
    ]
}

/// Mock model provider: canned catalog, scripted chat replies.
pub struct MockProvider {
    pub catalog: Vec<ModelConfig>,
    pub chat_calls: Mutex<Vec<Vec<ChatMessage>>>,
    pub fail_chat_with: Mutex<Option<ClientError>>,
}

impl MockProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            catalog: test_catalog(),
            chat_calls: Mutex::new(Vec::new()),
            fail_chat_with: Mutex::new(None),
        })
    }
}

#[async_trait]
impl ModelProviderApi for MockProvider {
    async fn complete(
        &self,
        prompt: &str,
        _model_id: &str,
        _params: &GenerationParams,
    ) -> ClientResult<ApiResponse<Completion>> {
        Ok(ApiResponse::new(
            Completion {
                text: format!("echo: {prompt}"),
                usage: None,
                metadata: Default::default(),
            },
            json!({"choices": [{"text": "echo"}]}),
        ))
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        model_id: &str,
        _params: &GenerationParams,
    ) -> ClientResult<ApiResponse<ChatCompletion>> {
        if let Some(err) = self.fail_chat_with.lock().clone() {
            return Err(err);
        }
        self.chat_calls.lock().push(messages.to_vec());
        Ok(ApiResponse::new(
            ChatCompletion {
                message: ChatMessage {
                    role: ChatRole::Assistant,
                    content: "mock reply".to_string(),
                },
                usage: None,
                metadata: Default::default(),
            },
            json!({"choices": [{"message": {"role": "assistant", "content": "mock reply"}}], "model": model_id}),
        ))
    }

    async fn embed(&self, _input: &str, _model_id: &str) -> ClientResult<ApiResponse<Embedding>> {
        Ok(ApiResponse::new(
            Embedding {
                vector: vec![0.0; 4],
                usage: None,
            },
            json!({"data": [{"embedding": [0.0, 0.0, 0.0, 0.0]}]}),
        ))
    }

    async fn list_models(&self) -> ClientResult<Vec<ModelConfig>> {
        Ok(self.catalog.clone())
    }

    async fn health(&self) -> ClientResult<HealthStatus> {
        Ok(HealthStatus::healthy())
    }
}

/// One recorded AI Engine invocation.
#[derive(Debug, Clone)]
pub struct EngineCall {
    pub endpoint: &'static str,
    pub operation: String,
    pub instructions: Option<String>,
    pub model_id: String,
}

/// Mock AI Engine: records calls, supports scripted failures, an optional
/// per-call delay, and tracks peak concurrency.
pub struct MockAiEngine {
    pub calls: Mutex<Vec<EngineCall>>,
    pub fail_with: Mutex<Option<ClientError>>,
    pub delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
}

impl MockAiEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            fail_with: Mutex::new(None),
            delay: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn operations(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.operation.clone()).collect()
    }

    async fn record(
        &self,
        endpoint: &'static str,
        operation: String,
        call: &EngineCallOptions,
    ) -> ClientResult<()> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.calls.lock().push(EngineCall {
            endpoint,
            operation,
            instructions: call.instructions.clone(),
            model_id: call.model_id.clone(),
        });
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.fail_with.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AiEngineApi for MockAiEngine {
    async fn matching(
        &self,
        input: &MatchingInput,
        call: &EngineCallOptions,
    ) -> ClientResult<ApiResponse<MatchingOutput>> {
        self.record("matching", input.operation().tag().to_string(), call)
            .await?;
        let matches = vec![json!({
            "tribeId": "tribe-1",
            "compatibilityScore": 87,
            "compatibilityReasoning": "shared interests"
        })];
        Ok(ApiResponse::new(
            MatchingOutput {
                matches: matches.clone(),
            },
            json!({"matches": matches}),
        ))
    }

    async fn personality(
        &self,
        input: &PersonalityInput,
        call: &EngineCallOptions,
    ) -> ClientResult<ApiResponse<Value>> {
        self.record("personality", input.operation().tag().to_string(), call)
            .await?;
        let profile = json!({"traits": {"openness": 72}});
        Ok(ApiResponse::new(profile.clone(), json!({"profile": profile})))
    }

    async fn engagement(
        &self,
        input: &EngagementInput,
        call: &EngineCallOptions,
    ) -> ClientResult<ApiResponse<Vec<Value>>> {
        self.record("engagement", input.kind.tag().to_string(), call)
            .await?;
        let items = vec![json!({"text": "What is one place you all want to visit?"})];
        Ok(ApiResponse::new(items.clone(), json!({"items": items})))
    }

    async fn recommendations(
        &self,
        input: &RecommendationInput,
        call: &EngineCallOptions,
    ) -> ClientResult<ApiResponse<Vec<Value>>> {
        self.record("recommendations", input.kind.tag().to_string(), call)
            .await?;
        let recommendations = vec![json!({"title": "Trivia night", "matchReason": "games"})];
        Ok(ApiResponse::new(
            recommendations.clone(),
            json!({"recommendations": recommendations}),
        ))
    }

    async fn health(&self) -> ClientResult<HealthStatus> {
        Ok(HealthStatus::healthy())
    }
}

/// Fully wired engine over `MemoryStore` and the mock clients.
pub struct Harness {
    pub engine: Arc<OrchestrationEngine>,
    pub store: Arc<MemoryStore>,
    pub provider: Arc<MockProvider>,
    pub ai_engine: Arc<MockAiEngine>,
    pub registry: Arc<ModelRegistry>,
    pub metrics: Arc<RecordingMetrics>,
}

pub async fn harness() -> Harness {
    harness_with_config(OrchestratorConfig::default()).await
}

pub async fn harness_with_config(config: OrchestratorConfig) -> Harness {
    init_tracing();
    let config = Arc::new(config);
    let store = Arc::new(MemoryStore::new());
    let provider = MockProvider::new();
    let ai_engine = MockAiEngine::new();
    let metrics = RecordingMetrics::new();

    let registry = Arc::new(ModelRegistry::new(
        provider.clone(),
        config.clone(),
        metrics.clone(),
    ));
    registry.refresh().await.expect("mock catalog refresh");

    let engine = Arc::new(OrchestrationEngine::new(
        config,
        store.clone(),
        provider.clone(),
        ai_engine.clone(),
        registry.clone(),
        metrics.clone(),
    ));

    Harness {
        engine,
        store,
        provider,
        ai_engine,
        registry,
        metrics,
    }
}

/// A valid user-to-tribes matching input.
pub fn matching_input() -> domain::FeatureInput {
    domain::FeatureInput::Matching(MatchingInput::UserToTribes {
        user_profile: json!({"id": "user-1", "interests": ["hiking", "games"]}),
        tribes: vec![json!({"id": "tribe-1"}), json!({"id": "tribe-2"})],
    })
}
