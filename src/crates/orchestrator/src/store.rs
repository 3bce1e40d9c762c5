//! Store-of-record traits and the in-memory implementation.
//!
//! Persistence is an external collaborator: the engine only depends on
//! these traits. `MemoryStore` backs tests and single-process deployments;
//! a database-backed implementation can be injected without touching the
//! engine.

use crate::prompt::template::{PromptConfig, PromptTemplate, TemplateCategory};
use crate::request::OrchestrationRequest;
use crate::response::OrchestrationResponse;
use crate::{OrchestratorError, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use domain::Feature;
use tracing::debug;
use uuid::Uuid;

/// Requests keyed by id.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn insert_request(&self, request: &OrchestrationRequest) -> Result<()>;
    async fn get_request(&self, id: Uuid) -> Result<Option<OrchestrationRequest>>;
    async fn update_request(&self, request: &OrchestrationRequest) -> Result<()>;
}

/// Responses keyed by id, with a 1:1 index by owning request.
#[async_trait]
pub trait ResponseStore: Send + Sync {
    async fn insert_response(&self, response: &OrchestrationResponse) -> Result<()>;
    async fn get_response(&self, id: Uuid) -> Result<Option<OrchestrationResponse>>;
    async fn response_for_request(&self, request_id: Uuid)
        -> Result<Option<OrchestrationResponse>>;
}

/// Prompt templates with feature/category/active filtering.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn insert_template(&self, template: &PromptTemplate) -> Result<()>;
    async fn get_template(&self, id: Uuid) -> Result<Option<PromptTemplate>>;
    async fn update_template(&self, template: &PromptTemplate) -> Result<()>;
    async fn list_templates(
        &self,
        feature: Feature,
        category: Option<TemplateCategory>,
    ) -> Result<Vec<PromptTemplate>>;
}

/// Prompt configurations with the single-default invariant.
#[async_trait]
pub trait PromptConfigStore: Send + Sync {
    async fn insert_config(&self, config: &PromptConfig) -> Result<()>;
    async fn get_config(&self, id: Uuid) -> Result<Option<PromptConfig>>;
    async fn list_configs(&self, feature: Feature) -> Result<Vec<PromptConfig>>;

    /// Mark `id` as its feature's default, clearing any previous default so
    /// exactly one active default remains.
    async fn set_default_config(&self, id: Uuid) -> Result<()>;

    /// The active default configuration for a feature, if one exists.
    async fn default_config_for(&self, feature: Feature) -> Result<Option<PromptConfig>>;
}

/// Everything the engine needs from its store of record.
pub trait OrchestratorStore:
    RequestStore + ResponseStore + TemplateStore + PromptConfigStore
{
}

impl<T: RequestStore + ResponseStore + TemplateStore + PromptConfigStore> OrchestratorStore for T {}

/// In-memory store of record.
#[derive(Debug, Default)]
pub struct MemoryStore {
    requests: DashMap<Uuid, OrchestrationRequest>,
    responses: DashMap<Uuid, OrchestrationResponse>,
    responses_by_request: DashMap<Uuid, Uuid>,
    templates: DashMap<Uuid, PromptTemplate>,
    configs: DashMap<Uuid, PromptConfig>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn insert_request(&self, request: &OrchestrationRequest) -> Result<()> {
        self.requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn get_request(&self, id: Uuid) -> Result<Option<OrchestrationRequest>> {
        Ok(self.requests.get(&id).map(|r| r.clone()))
    }

    async fn update_request(&self, request: &OrchestrationRequest) -> Result<()> {
        if !self.requests.contains_key(&request.id) {
            return Err(OrchestratorError::NotFound(format!(
                "request {}",
                request.id
            )));
        }
        self.requests.insert(request.id, request.clone());
        Ok(())
    }
}

#[async_trait]
impl ResponseStore for MemoryStore {
    async fn insert_response(&self, response: &OrchestrationResponse) -> Result<()> {
        self.responses.insert(response.id, response.clone());
        self.responses_by_request
            .insert(response.request_id, response.id);
        Ok(())
    }

    async fn get_response(&self, id: Uuid) -> Result<Option<OrchestrationResponse>> {
        Ok(self.responses.get(&id).map(|r| r.clone()))
    }

    async fn response_for_request(
        &self,
        request_id: Uuid,
    ) -> Result<Option<OrchestrationResponse>> {
        let Some(response_id) = self.responses_by_request.get(&request_id).map(|r| *r) else {
            return Ok(None);
        };
        self.get_response(response_id).await
    }
}

#[async_trait]
impl TemplateStore for MemoryStore {
    async fn insert_template(&self, template: &PromptTemplate) -> Result<()> {
        self.templates.insert(template.id, template.clone());
        Ok(())
    }

    async fn get_template(&self, id: Uuid) -> Result<Option<PromptTemplate>> {
        Ok(self.templates.get(&id).map(|t| t.clone()))
    }

    async fn update_template(&self, template: &PromptTemplate) -> Result<()> {
        if !self.templates.contains_key(&template.id) {
            return Err(OrchestratorError::NotFound(format!(
                "template {}",
                template.id
            )));
        }
        self.templates.insert(template.id, template.clone());
        Ok(())
    }

    async fn list_templates(
        &self,
        feature: Feature,
        category: Option<TemplateCategory>,
    ) -> Result<Vec<PromptTemplate>> {
        Ok(self
            .templates
            .iter()
            .filter(|entry| {
                entry.feature == feature
                    && entry.active
                    && category.map_or(true, |c| entry.category == c)
            })
            .map(|entry| entry.clone())
            .collect())
    }
}

#[async_trait]
impl PromptConfigStore for MemoryStore {
    async fn insert_config(&self, config: &PromptConfig) -> Result<()> {
        if config.is_default {
            // Inserting a new default demotes the previous one.
            self.clear_default(config.feature, config.id);
        }
        self.configs.insert(config.id, config.clone());
        Ok(())
    }

    async fn get_config(&self, id: Uuid) -> Result<Option<PromptConfig>> {
        Ok(self.configs.get(&id).map(|c| c.clone()))
    }

    async fn list_configs(&self, feature: Feature) -> Result<Vec<PromptConfig>> {
        Ok(self
            .configs
            .iter()
            .filter(|entry| entry.feature == feature && entry.active)
            .map(|entry| entry.clone())
            .collect())
    }

    async fn set_default_config(&self, id: Uuid) -> Result<()> {
        let feature = self
            .configs
            .get(&id)
            .map(|c| c.feature)
            .ok_or_else(|| OrchestratorError::NotFound(format!("prompt config {id}")))?;

        self.clear_default(feature, id);
        if let Some(mut config) = self.configs.get_mut(&id) {
            config.is_default = true;
        }
        debug!(config_id = %id, feature = %feature, "default prompt config updated");
        Ok(())
    }

    async fn default_config_for(&self, feature: Feature) -> Result<Option<PromptConfig>> {
        Ok(self
            .configs
            .iter()
            .find(|entry| entry.feature == feature && entry.active && entry.is_default)
            .map(|entry| entry.clone()))
    }
}

impl MemoryStore {
    /// Clear the default flag on every config of `feature` except `keep`.
    fn clear_default(&self, feature: Feature, keep: Uuid) {
        let demoted: Vec<Uuid> = self
            .configs
            .iter()
            .filter(|entry| entry.feature == feature && entry.is_default && entry.id != keep)
            .map(|entry| entry.id)
            .collect();
        for id in demoted {
            if let Some(mut config) = self.configs.get_mut(&id) {
                config.is_default = false;
            }
        }
    }
}
