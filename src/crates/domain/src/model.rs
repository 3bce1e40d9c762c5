//! Model catalog entries.

use crate::feature::Capability;
use crate::params::GenerationParams;
use serde::{Deserialize, Serialize};

/// A model as known to the registry.
///
/// Populated from the provider catalog (`GET /models`) or from the static
/// seed; immutable between refreshes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider-scoped identifier, e.g. `"openai/gpt-4"`.
    pub id: String,

    /// Human-readable display name.
    pub name: String,

    /// Upstream provider name, e.g. `"openai"`.
    pub provider: String,

    /// Declared abilities.
    pub capabilities: Vec<Capability>,

    /// Context window size in tokens.
    pub context_window: u32,

    /// Maximum output tokens per call.
    pub max_output_tokens: u32,

    /// Generation parameters applied when the caller supplies none.
    #[serde(default)]
    pub default_params: GenerationParams,

    /// Only active models are selectable.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl ModelConfig {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        let provider = id.split('/').next().unwrap_or("unknown").to_string();
        Self {
            name: id.clone(),
            id,
            provider,
            capabilities: Vec::new(),
            context_window: 4096,
            max_output_tokens: 1024,
            default_params: GenerationParams::default(),
            active: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_capabilities(mut self, capabilities: Vec<Capability>) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_context_window(mut self, context_window: u32) -> Self {
        self.context_window = context_window;
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn with_default_params(mut self, params: GenerationParams) -> Self {
        self.default_params = params;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Whether this model declares every capability in `required`.
    pub fn satisfies(&self, required: &[Capability]) -> bool {
        required.iter().all(|c| self.capabilities.contains(c))
    }
}
