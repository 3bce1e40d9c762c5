//! Orchestrator configuration.
//!
//! Loaded from YAML with environment-variable overrides for secrets.
//! Everything here is a tunable constant, not an invariant.

use crate::{OrchestratorError, Result};
use domain::{Capability, Feature, GenerationParams, ModelConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Queue scheduling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSettings {
    /// Maximum concurrent in-flight `process` calls.
    pub concurrency: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self { concurrency: 5 }
    }
}

/// Cache TTLs, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    pub catalog_ttl_secs: u64,
    pub response_ttl_secs: u64,
    pub prompt_ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            catalog_ttl_secs: 3_600,
            response_ttl_secs: 1_800,
            prompt_ttl_secs: 300,
        }
    }
}

impl CacheSettings {
    pub fn catalog_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_ttl_secs)
    }

    pub fn response_ttl(&self) -> Duration {
        Duration::from_secs(self.response_ttl_secs)
    }

    pub fn prompt_ttl(&self) -> Duration {
        Duration::from_secs(self.prompt_ttl_secs)
    }
}

/// One provider endpoint as configured on disk; the API key is overridden
/// from the named environment variable when set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointSettings {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    /// Environment variable consulted for the API key.
    pub api_key_env: String,
    #[serde(default = "EndpointSettings::default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "EndpointSettings::default_health_timeout_secs")]
    pub health_timeout_secs: u64,
}

impl EndpointSettings {
    fn default_timeout_secs() -> u64 {
        30
    }

    fn default_health_timeout_secs() -> u64 {
        5
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            api_key: String::new(),
            api_key_env: "TRIBE_AI_API_KEY".to_string(),
            timeout_secs: Self::default_timeout_secs(),
            health_timeout_secs: Self::default_health_timeout_secs(),
        }
    }
}

/// Matching vocabulary and bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingSettings {
    pub min_tribe_size: u32,
    pub max_tribe_size: u32,
    pub compatibility_threshold: f64,
    pub max_tribes_per_user: u32,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            min_tribe_size: 4,
            max_tribe_size: 8,
            compatibility_threshold: 0.7,
            max_tribes_per_user: 3,
        }
    }
}

/// Engagement vocabularies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementSettings {
    pub prompt_types: Vec<String>,
    pub challenge_types: Vec<String>,
    pub activity_categories: Vec<String>,
}

impl Default for EngagementSettings {
    fn default() -> Self {
        Self {
            prompt_types: ["conversation", "activity", "challenge", "reflection"]
                .map(String::from)
                .to_vec(),
            challenge_types: ["social", "creative", "intellectual", "physical"]
                .map(String::from)
                .to_vec(),
            activity_categories: ["indoor", "outdoor", "virtual", "local"]
                .map(String::from)
                .to_vec(),
        }
    }
}

/// Recommendation vocabularies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationSettings {
    pub event_types: Vec<String>,
    pub max_distance_miles: u32,
}

impl Default for RecommendationSettings {
    fn default() -> Self {
        Self {
            event_types: ["social", "educational", "recreational", "cultural"]
                .map(String::from)
                .to_vec(),
            max_distance_miles: 15,
        }
    }
}

/// Top-level orchestrator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub queue: QueueSettings,
    pub cache: CacheSettings,
    pub model_provider: EndpointSettings,
    pub ai_engine: EndpointSettings,
    /// Per-feature default model ids, consulted when ranked selection finds
    /// no qualifying model.
    pub default_models: HashMap<Feature, String>,
    /// General chat-completion fallback when a feature has no entry above.
    pub default_chat_model: Option<String>,
    pub matching: MatchingSettings,
    pub engagement: EngagementSettings,
    pub recommendation: RecommendationSettings,
}

impl OrchestratorConfig {
    /// Load from a YAML file, then apply environment overrides.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            OrchestratorError::Internal(format!("failed to read config {path:?}: {e}"))
        })?;
        let mut config: OrchestratorConfig = serde_yaml::from_str(&content).map_err(|e| {
            OrchestratorError::Validation(format!("failed to parse config {path:?}: {e}"))
        })?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Pull API keys from the configured environment variables when set.
    pub fn apply_env_overrides(&mut self) {
        for endpoint in [&mut self.model_provider, &mut self.ai_engine] {
            if let Ok(key) = std::env::var(&endpoint.api_key_env) {
                if !key.is_empty() {
                    debug!(env = endpoint.api_key_env, "API key taken from environment");
                    endpoint.api_key = key;
                }
            }
        }
    }

    /// The configured fallback model for a feature, if any: the per-feature
    /// entry first, then the general chat default.
    pub fn default_model_for(&self, feature: Feature) -> Option<&str> {
        self.default_models
            .get(&feature)
            .or(self.default_chat_model.as_ref())
            .map(String::as_str)
    }
}

/// Static catalog seed used until the first successful provider refresh.
pub fn seed_models() -> Vec<ModelConfig> {
    let full = vec![
        Capability::TextGeneration,
        Capability::ChatCompletion,
        Capability::FunctionCalling,
    ];
    let chat = vec![Capability::TextGeneration, Capability::ChatCompletion];
    let default_params = GenerationParams::new()
        .with_temperature(0.7)
        .with_max_tokens(1_000)
        .with_top_p(1.0);

    vec![
        ModelConfig::new("openai/gpt-4")
            .with_name("GPT-4")
            .with_capabilities(full.clone())
            .with_context_window(8_192)
            .with_max_output_tokens(4_096)
            .with_default_params(default_params.clone()),
        ModelConfig::new("openai/gpt-3.5-turbo")
            .with_name("GPT-3.5 Turbo")
            .with_capabilities(full)
            .with_context_window(4_096)
            .with_max_output_tokens(2_048)
            .with_default_params(default_params.clone()),
        ModelConfig::new("anthropic/claude-2")
            .with_name("Claude 2")
            .with_capabilities(chat.clone())
            .with_context_window(100_000)
            .with_max_output_tokens(4_096)
            .with_default_params(default_params.clone()),
        ModelConfig::new("anthropic/claude-instant-1")
            .with_name("Claude Instant")
            .with_capabilities(chat)
            .with_context_window(100_000)
            .with_max_output_tokens(2_048)
            .with_default_params(default_params),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.queue.concurrency, 5);
        assert_eq!(config.cache.catalog_ttl(), Duration::from_secs(3_600));
        assert_eq!(config.cache.response_ttl(), Duration::from_secs(1_800));
        assert_eq!(config.matching.min_tribe_size, 4);
    }

    #[test]
    fn test_default_model_fallback_chain() {
        let mut config = OrchestratorConfig::default();
        assert!(config.default_model_for(Feature::Matching).is_none());

        config.default_chat_model = Some("openai/gpt-4".into());
        assert_eq!(
            config.default_model_for(Feature::Matching),
            Some("openai/gpt-4")
        );

        config
            .default_models
            .insert(Feature::Matching, "anthropic/claude-2".into());
        assert_eq!(
            config.default_model_for(Feature::Matching),
            Some("anthropic/claude-2")
        );
        assert_eq!(
            config.default_model_for(Feature::Engagement),
            Some("openai/gpt-4")
        );
    }

    #[test]
    fn test_yaml_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "queue:\n  concurrency: 2\ncache:\n  catalog_ttl_secs: 60\n  response_ttl_secs: 30\n  prompt_ttl_secs: 10\ndefault_chat_model: openai/gpt-4\n"
        )
        .unwrap();

        let config = OrchestratorConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.queue.concurrency, 2);
        assert_eq!(config.cache.catalog_ttl_secs, 60);
        assert_eq!(config.default_chat_model.as_deref(), Some("openai/gpt-4"));
        // Unspecified sections fall back to defaults.
        assert_eq!(config.matching.max_tribe_size, 8);
    }

    #[test]
    fn test_seed_models_are_selectable() {
        let models = seed_models();
        assert_eq!(models.len(), 4);
        assert!(models.iter().all(|m| m.active));
        assert!(models
            .iter()
            .any(|m| m.satisfies(Feature::Matching.required_capabilities())));
    }
}
