//! The orchestration engine.
//!
//! Owns the request lifecycle: validate → persist (`Pending`) → process
//! (`Processing`) → persist/cache the response (`Completed`) or record the
//! failure (`Failed`) and re-raise. Feature dispatch is a pure switch on
//! the payload variant; each branch invokes exactly one integration call.

use crate::config::OrchestratorConfig;
use crate::prompt::defaults::ensure_feature_defaults;
use crate::prompt::renderer::{PromptRenderer, RenderOptions, RenderedConfig};
use crate::prompt::template::{PromptConfig, PromptTemplate};
use crate::registry::ModelRegistry;
use crate::request::{OrchestrationRequest, Priority, RequestStatus};
use crate::response::OrchestrationResponse;
use crate::store::{
    OrchestratorStore, PromptConfigStore, RequestStore, ResponseStore, TemplateStore,
};
use crate::{OrchestratorError, Result};
use dashmap::DashSet;
use domain::api::{AiEngineApi, EngineCallOptions, HealthStatus, ModelProviderApi};
use domain::{
    ChatMessage, Feature, FeatureInput, FeatureOutput, GenerationParams, MetricsSink, ModelConfig,
    TtlCache,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Aggregated health of the engine and its collaborators.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub engine: HealthStatus,
    pub model_registry: HealthStatus,
    pub provider_clients: HashMap<String, HealthStatus>,
}

/// A processing failure, tagged with the stage it originated from so the
/// persisted response carries a best-effort trace.
struct StageFailure {
    stage: &'static str,
    error: OrchestratorError,
}

impl StageFailure {
    fn at(stage: &'static str) -> impl FnOnce(OrchestratorError) -> StageFailure {
        move |error| StageFailure { stage, error }
    }
}

struct Dispatched {
    output: FeatureOutput,
    raw: Value,
}

/// Coordinates requests end to end. All collaborators are injected.
pub struct OrchestrationEngine {
    config: Arc<OrchestratorConfig>,
    requests: Arc<dyn RequestStore>,
    responses: Arc<dyn ResponseStore>,
    templates: Arc<dyn TemplateStore>,
    prompt_configs: Arc<dyn PromptConfigStore>,
    provider: Arc<dyn ModelProviderApi>,
    ai_engine: Arc<dyn AiEngineApi>,
    registry: Arc<ModelRegistry>,
    renderer: PromptRenderer,
    metrics: Arc<dyn MetricsSink>,
    /// Ids currently inside `process`; the single-writer guard against
    /// concurrent re-entry.
    active: DashSet<Uuid>,
    response_cache: TtlCache<Uuid, OrchestrationResponse>,
    template_cache: TtlCache<Uuid, PromptTemplate>,
    config_cache: TtlCache<Feature, PromptConfig>,
}

impl OrchestrationEngine {
    pub fn new<S>(
        config: Arc<OrchestratorConfig>,
        store: Arc<S>,
        provider: Arc<dyn ModelProviderApi>,
        ai_engine: Arc<dyn AiEngineApi>,
        registry: Arc<ModelRegistry>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self
    where
        S: OrchestratorStore + 'static,
    {
        Self {
            requests: store.clone(),
            responses: store.clone(),
            templates: store.clone(),
            prompt_configs: store,
            provider,
            ai_engine,
            registry,
            renderer: PromptRenderer::new(),
            metrics,
            active: DashSet::new(),
            response_cache: TtlCache::new(config.cache.response_ttl()),
            template_cache: TtlCache::new(config.cache.prompt_ttl()),
            config_cache: TtlCache::new(config.cache.prompt_ttl()),
            config,
        }
    }

    /// Vocabulary checks that need configuration, applied after the
    /// structural payload validation.
    fn validate_vocabulary(&self, input: &FeatureInput) -> Result<()> {
        if let FeatureInput::Engagement(engagement) = input {
            if let Some(variant) = &engagement.variant {
                let allowed = match engagement.kind {
                    domain::EngagementKind::ConversationPrompts => {
                        &self.config.engagement.prompt_types
                    }
                    domain::EngagementKind::Challenges => &self.config.engagement.challenge_types,
                    domain::EngagementKind::Activities => {
                        &self.config.engagement.activity_categories
                    }
                };
                if !allowed.contains(variant) {
                    return Err(OrchestratorError::Validation(format!(
                        "unknown engagement variant `{variant}`; expected one of {}",
                        allowed.join(", ")
                    )));
                }
            }
        }
        Ok(())
    }

    /// Validate and persist a new request. Validation failures surface
    /// immediately; nothing is persisted for them.
    pub async fn create_request(
        &self,
        input: FeatureInput,
        requester_id: impl Into<String>,
        preferred_model: Option<String>,
        params: Option<GenerationParams>,
        priority: Option<Priority>,
    ) -> Result<OrchestrationRequest> {
        input.validate()?;
        self.validate_vocabulary(&input)?;

        let mut request = OrchestrationRequest::new(input, requester_id);
        if let Some(model_id) = preferred_model {
            request = request.with_preferred_model(model_id);
        }
        if let Some(params) = params {
            request = request.with_params(params);
        }
        if let Some(priority) = priority {
            request = request.with_priority(priority);
        }

        self.requests.insert_request(&request).await?;
        self.metrics.incr_counter(
            "requests_created",
            &[("feature", request.feature().tag())],
        );
        info!(
            request_id = %request.id,
            feature = %request.feature(),
            priority = %request.priority,
            "request created"
        );
        Ok(request)
    }

    pub async fn get_request(&self, id: Uuid) -> Result<OrchestrationRequest> {
        self.requests
            .get_request(id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("request {id}")))
    }

    /// Fetch the response for a request, read-through cached.
    pub async fn get_response(&self, request_id: Uuid) -> Result<OrchestrationResponse> {
        if let Some(response) = self.response_cache.get(&request_id) {
            return Ok(response);
        }
        let response = self
            .responses
            .response_for_request(request_id)
            .await?
            .ok_or_else(|| {
                OrchestratorError::NotFound(format!("response for request {request_id}"))
            })?;
        self.response_cache.insert(request_id, response.clone());
        Ok(response)
    }

    /// Cancel a pending request. Cancelling a processing or terminal
    /// request is a conflict.
    pub async fn cancel(&self, id: Uuid) -> Result<bool> {
        let mut request = self.get_request(id).await?;
        request.cancel()?;
        self.requests.update_request(&request).await?;
        self.metrics
            .incr_counter("requests_cancelled", &[("feature", request.feature().tag())]);
        info!(request_id = %id, "request cancelled");
        Ok(true)
    }

    /// Drive one request to a terminal state.
    ///
    /// On success the response is persisted and cached and returned. On
    /// failure the error is recorded into a persisted `Failed` response,
    /// then re-raised to the caller.
    pub async fn process(&self, id: Uuid) -> Result<OrchestrationResponse> {
        let mut request = self.get_request(id).await?;

        // Re-entry guard: one processor per request id.
        if !self.active.insert(id) {
            return Err(OrchestratorError::Conflict(format!(
                "request {id} is already being processed"
            )));
        }

        let outcome = self.process_guarded(&mut request).await;
        self.active.remove(&id);
        outcome
    }

    async fn process_guarded(
        &self,
        request: &mut OrchestrationRequest,
    ) -> Result<OrchestrationResponse> {
        request.begin_processing()?;
        self.requests.update_request(request).await?;

        let feature = request.feature();
        let started = Instant::now();
        info!(request_id = %request.id, feature = %feature, "processing request");

        match self.execute(request).await {
            Ok((dispatched, model_id)) => {
                let elapsed = started.elapsed();
                request.complete()?;
                self.requests.update_request(request).await?;

                let response = OrchestrationResponse::success(
                    request.id,
                    feature,
                    dispatched.output,
                    dispatched.raw,
                    model_id,
                    elapsed,
                );
                self.responses.insert_response(&response).await?;
                self.response_cache.insert(request.id, response.clone());

                self.metrics
                    .incr_counter("requests_completed", &[("feature", feature.tag())]);
                self.metrics.observe_duration(
                    "request_processing_seconds",
                    &[("feature", feature.tag())],
                    elapsed,
                );
                info!(
                    request_id = %request.id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "request completed"
                );
                Ok(response)
            }
            Err(failure) => {
                let elapsed = started.elapsed();
                request.fail()?;
                self.requests.update_request(request).await?;

                let response = OrchestrationResponse::failure(
                    request.id,
                    feature,
                    None,
                    failure.error.to_string(),
                    format!("stage: {}; {}", failure.stage, failure.error),
                    elapsed,
                );
                self.responses.insert_response(&response).await?;

                self.metrics.incr_counter(
                    "requests_failed",
                    &[("feature", feature.tag()), ("error", failure.error.kind())],
                );
                error!(
                    request_id = %request.id,
                    stage = failure.stage,
                    error = %failure.error,
                    "request failed"
                );
                Err(failure.error)
            }
        }
    }

    /// Resolve model, render prompts, dispatch to the feature's client.
    async fn execute(
        &self,
        request: &OrchestrationRequest,
    ) -> std::result::Result<(Dispatched, String), StageFailure> {
        let feature = request.feature();

        let model = self
            .registry
            .model_for_feature(feature, request.preferred_model.as_deref())
            .await
            .map_err(StageFailure::at("model_selection"))?;

        let params = request.params.merged_with(&model.default_params);

        let rendered = self
            .render_prompts(request, &model)
            .await
            .map_err(StageFailure::at("prompt_rendering"))?;

        let dispatched = self
            .dispatch(&request.input, &model, &params, &rendered)
            .await
            .map_err(StageFailure::at("integration_call"))?;

        Ok((dispatched, model.id))
    }

    /// Render the feature's default prompt configuration against the
    /// request's variables, budgeted to the model's context window.
    async fn render_prompts(
        &self,
        request: &OrchestrationRequest,
        model: &ModelConfig,
    ) -> Result<RenderedConfig> {
        let feature = request.feature();
        let config = self.resolve_prompt_config(feature).await?;

        let system = self.resolve_template(config.system_template).await?;
        let user = self.resolve_template(config.user_template).await?;
        let assistant = match config.assistant_template {
            Some(id) => Some(self.resolve_template(id).await?),
            None => None,
        };

        let prompt_budget = model
            .context_window
            .saturating_sub(model.max_output_tokens) as usize;
        let options = RenderOptions::new()
            .with_model(model.id.clone())
            .with_max_tokens(prompt_budget);

        self.renderer.render_config(
            &system,
            &user,
            assistant.as_ref(),
            &request.input.prompt_variables(),
            &options,
        )
    }

    /// Default prompt config for a feature, read-through cached and created
    /// lazily when absent.
    async fn resolve_prompt_config(&self, feature: Feature) -> Result<PromptConfig> {
        if let Some(config) = self.config_cache.get(&feature) {
            return Ok(config);
        }
        let config =
            ensure_feature_defaults(
                feature,
                self.templates.as_ref(),
                self.prompt_configs.as_ref(),
            )
            .await?;
        self.config_cache.insert(feature, config.clone());
        Ok(config)
    }

    async fn resolve_template(&self, id: Uuid) -> Result<PromptTemplate> {
        if let Some(template) = self.template_cache.get(&id) {
            return Ok(template);
        }
        let template = self
            .templates
            .get_template(id)
            .await?
            .ok_or_else(|| OrchestratorError::NotFound(format!("template {id}")))?;
        self.template_cache.insert(id, template.clone());
        Ok(template)
    }

    /// Pure switch on the feature payload; each branch makes exactly one
    /// integration call.
    async fn dispatch(
        &self,
        input: &FeatureInput,
        model: &ModelConfig,
        params: &GenerationParams,
        rendered: &RenderedConfig,
    ) -> Result<Dispatched> {
        let call = EngineCallOptions {
            model_id: model.id.clone(),
            params: params.clone(),
            instructions: Some(rendered.user.text.clone()),
        };

        match input {
            FeatureInput::Matching(matching) => {
                let result = self.ai_engine.matching(matching, &call).await?;
                Ok(Dispatched {
                    output: FeatureOutput::Matching(result.output),
                    raw: result.raw,
                })
            }
            FeatureInput::Personality(personality) => {
                let result = self.ai_engine.personality(personality, &call).await?;
                Ok(Dispatched {
                    output: FeatureOutput::Personality {
                        profile: result.output,
                    },
                    raw: result.raw,
                })
            }
            FeatureInput::Engagement(engagement) => {
                let result = self.ai_engine.engagement(engagement, &call).await?;
                Ok(Dispatched {
                    output: FeatureOutput::Engagement {
                        items: result.output,
                    },
                    raw: result.raw,
                })
            }
            FeatureInput::Recommendation(recommendation) => {
                let result = self
                    .ai_engine
                    .recommendations(recommendation, &call)
                    .await?;
                Ok(Dispatched {
                    output: FeatureOutput::Recommendation {
                        recommendations: result.output,
                    },
                    raw: result.raw,
                })
            }
            FeatureInput::Conversation(conversation) => {
                let mut messages =
                    Vec::with_capacity(conversation.messages.len() + 2);
                messages.push(ChatMessage::system(rendered.system.text.clone()));
                if let Some(assistant) = &rendered.assistant {
                    messages.push(ChatMessage::assistant(assistant.text.clone()));
                }
                messages.extend(conversation.messages.iter().cloned());

                let result = self.provider.chat(&messages, &model.id, params).await?;
                Ok(Dispatched {
                    output: FeatureOutput::Conversation(result.output),
                    raw: result.raw,
                })
            }
        }
    }

    /// Number of requests currently being processed.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Aggregate engine, registry and provider health.
    pub async fn health(&self) -> HealthReport {
        let mut provider_clients = HashMap::new();
        provider_clients.insert(
            "model_provider".to_string(),
            self.provider
                .health()
                .await
                .unwrap_or_else(|e| HealthStatus::unreachable(e.to_string())),
        );
        provider_clients.insert(
            "ai_engine".to_string(),
            self.ai_engine
                .health()
                .await
                .unwrap_or_else(|e| HealthStatus::unreachable(e.to_string())),
        );

        if provider_clients
            .values()
            .any(|s| s.state != domain::HealthState::Healthy)
        {
            warn!("one or more provider clients are unhealthy");
        }

        HealthReport {
            engine: HealthStatus::healthy(),
            model_registry: self.registry.health(),
            provider_clients,
        }
    }

    /// Whether a request is pending; used by the queue to skip work that
    /// was cancelled while enqueued.
    pub async fn is_pending(&self, id: Uuid) -> Result<bool> {
        Ok(self.get_request(id).await?.status == RequestStatus::Pending)
    }
}
