//! Model registry: catalog cache and deterministic model selection.

use crate::config::{seed_models, OrchestratorConfig};
use crate::{OrchestratorError, Result};
use domain::api::{HealthStatus, ModelProviderApi};
use domain::{Feature, MetricsSink, ModelConfig};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

struct Catalog {
    models: HashMap<String, ModelConfig>,
    refreshed_at: Option<Instant>,
}

/// Caches the provider catalog and selects the best model for a feature.
pub struct ModelRegistry {
    provider: Arc<dyn ModelProviderApi>,
    config: Arc<OrchestratorConfig>,
    metrics: Arc<dyn MetricsSink>,
    catalog: RwLock<Catalog>,
    catalog_ttl: Duration,
}

impl ModelRegistry {
    /// Create a registry pre-populated with the static seed catalog.
    pub fn new(
        provider: Arc<dyn ModelProviderApi>,
        config: Arc<OrchestratorConfig>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        let seeded: HashMap<String, ModelConfig> = seed_models()
            .into_iter()
            .map(|m| (m.id.clone(), m))
            .collect();
        let catalog_ttl = config.cache.catalog_ttl();
        Self {
            provider,
            config,
            metrics,
            catalog: RwLock::new(Catalog {
                models: seeded,
                refreshed_at: None,
            }),
            catalog_ttl,
        }
    }

    /// Refresh the catalog from the provider, replacing the in-memory set
    /// atomically. Idempotent; inactive models are retained for audit in
    /// the refresh log only and never become selectable.
    pub async fn refresh(&self) -> Result<usize> {
        let fetched = self.provider.list_models().await?;

        let mut active = HashMap::with_capacity(fetched.len());
        for model in fetched {
            if model.active {
                active.insert(model.id.clone(), model);
            } else {
                info!(model_id = model.id, "catalog refresh skipped inactive model");
            }
        }
        let count = active.len();

        let mut catalog = self.catalog.write();
        catalog.models.clear();
        catalog.models.extend(active);
        catalog.refreshed_at = Some(Instant::now());
        drop(catalog);

        info!(models = count, "model catalog refreshed");
        self.metrics.incr_counter("catalog_refreshes", &[]);
        Ok(count)
    }

    /// Refresh when the catalog TTL has lapsed. A failed refresh keeps
    /// serving the previous catalog; selection never depends on provider
    /// availability.
    async fn ensure_fresh(&self) {
        let stale = {
            let catalog = self.catalog.read();
            catalog
                .refreshed_at
                .map_or(true, |at| at.elapsed() >= self.catalog_ttl)
        };
        if !stale {
            return;
        }
        if let Err(err) = self.refresh().await {
            warn!(error = %err, "catalog refresh failed, serving cached models");
        }
    }

    /// Look up one model by id.
    pub fn model(&self, id: &str) -> Option<ModelConfig> {
        self.catalog.read().models.get(id).cloned()
    }

    /// Select the model that will serve `feature`.
    ///
    /// A resolvable, active preferred model satisfying the feature's
    /// required capabilities wins outright; otherwise qualifying catalog
    /// models are ranked deterministically, and an empty field falls back
    /// to the configured default model.
    pub async fn model_for_feature(
        &self,
        feature: Feature,
        preferred: Option<&str>,
    ) -> Result<ModelConfig> {
        self.ensure_fresh().await;
        let required = feature.required_capabilities();

        if let Some(preferred_id) = preferred {
            match self.model(preferred_id) {
                Some(model) if model.active && model.satisfies(required) => {
                    debug!(model_id = model.id, feature = %feature, "using preferred model");
                    return Ok(model);
                }
                resolved => {
                    warn!(
                        preferred = preferred_id,
                        feature = %feature,
                        resolvable = resolved.is_some(),
                        "preferred model unsuitable, falling back to ranked selection"
                    );
                    self.metrics.incr_counter(
                        "model_selection_fallbacks",
                        &[("feature", feature.tag())],
                    );
                }
            }
        }

        let mut qualifying: Vec<ModelConfig> = {
            let catalog = self.catalog.read();
            catalog
                .models
                .values()
                .filter(|m| m.active && m.satisfies(required))
                .cloned()
                .collect()
        };

        if qualifying.is_empty() {
            return self.configured_default(feature);
        }

        qualifying.sort_by(|a, b| {
            let matched_a = required.iter().filter(|c| a.capabilities.contains(c)).count();
            let matched_b = required.iter().filter(|c| b.capabilities.contains(c)).count();
            matched_b
                .cmp(&matched_a)
                .then(b.context_window.cmp(&a.context_window))
                .then(b.max_output_tokens.cmp(&a.max_output_tokens))
                .then(a.name.cmp(&b.name))
        });

        let selected = qualifying.remove(0);
        debug!(model_id = selected.id, feature = %feature, "model selected");
        Ok(selected)
    }

    /// Resolve the statically configured default for a feature.
    fn configured_default(&self, feature: Feature) -> Result<ModelConfig> {
        let Some(default_id) = self.config.default_model_for(feature) else {
            return Err(OrchestratorError::Validation(format!(
                "no suitable model for feature {feature}"
            )));
        };
        match self.model(default_id) {
            Some(model) if model.active => {
                warn!(
                    model_id = model.id,
                    feature = %feature,
                    "no qualifying model, using configured default"
                );
                Ok(model)
            }
            _ => Err(OrchestratorError::Validation(format!(
                "no suitable model for feature {feature}"
            ))),
        }
    }

    /// Registry health: healthy while the catalog is within TTL, degraded
    /// when serving seed or stale data.
    pub fn health(&self) -> HealthStatus {
        let catalog = self.catalog.read();
        match catalog.refreshed_at {
            Some(at) if at.elapsed() < self.catalog_ttl => HealthStatus::healthy(),
            Some(_) => HealthStatus::degraded("catalog past TTL, serving stale models"),
            None => HealthStatus::degraded("catalog never refreshed, serving seed models"),
        }
    }
}
