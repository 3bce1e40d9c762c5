//! Composition root: build a fully wired pipeline from configuration.

use crate::config::OrchestratorConfig;
use crate::engine::OrchestrationEngine;
use crate::queue::PriorityQueue;
use crate::registry::ModelRegistry;
use crate::store::MemoryStore;
use crate::Result;
use domain::MetricsSink;
use integrations::{AiEngineClient, ClientConfig, ModelProviderClient};
use std::sync::Arc;
use tracing::info;

/// A wired pipeline: engine plus its scheduling queue.
pub struct Pipeline {
    pub engine: Arc<OrchestrationEngine>,
    pub registry: Arc<ModelRegistry>,
    pub queue: PriorityQueue,
}

fn client_config(settings: &crate::config::EndpointSettings) -> ClientConfig {
    ClientConfig::new(&settings.base_url, &settings.api_key)
        .with_timeout(settings.timeout())
        .with_health_timeout(settings.health_timeout())
}

/// Build the engine, registry and queue over real HTTP clients and the
/// in-memory store. Must run inside a tokio runtime (the queue spawns its
/// dispatcher).
pub fn build_pipeline(
    config: OrchestratorConfig,
    metrics: Arc<dyn MetricsSink>,
) -> Result<Pipeline> {
    let config = Arc::new(config);
    let store = Arc::new(MemoryStore::new());

    let provider = Arc::new(ModelProviderClient::new(
        client_config(&config.model_provider),
        metrics.clone(),
    )?);
    let ai_engine = Arc::new(AiEngineClient::new(
        client_config(&config.ai_engine),
        metrics.clone(),
    )?);

    let registry = Arc::new(ModelRegistry::new(
        provider.clone(),
        config.clone(),
        metrics.clone(),
    ));

    let engine = Arc::new(OrchestrationEngine::new(
        config.clone(),
        store,
        provider,
        ai_engine,
        registry.clone(),
        metrics.clone(),
    ));

    let queue = PriorityQueue::start(engine.clone(), config.queue.concurrency, metrics);

    info!(
        concurrency = config.queue.concurrency,
        provider_url = config.model_provider.base_url,
        engine_url = config.ai_engine.base_url,
        "orchestration pipeline ready"
    );
    Ok(Pipeline {
        engine,
        registry,
        queue,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::NoopMetrics;

    #[tokio::test]
    async fn test_pipeline_wires_up_from_defaults() {
        let pipeline =
            build_pipeline(OrchestratorConfig::default(), Arc::new(NoopMetrics)).unwrap();
        assert_eq!(pipeline.engine.active_count(), 0);
        assert_eq!(pipeline.queue.pending_len(), 0);
        // Seed catalog is in place before any provider refresh.
        assert!(pipeline.registry.model("openai/gpt-4").is_some());
        pipeline.queue.shutdown();
    }
}
