//! Shared vocabulary for the tribe-ai orchestration pipeline.
//!
//! This crate defines the types that every other crate in the workspace
//! speaks: feature tags and their sub-operations, the tagged-union request
//! payloads, model catalog entries, chat/completion value objects, the
//! provider-failure taxonomy, and the small abstractions (TTL cache,
//! metrics sink, client traits) that the orchestrator and the integration
//! clients share.
//!
//! It deliberately contains no I/O. Concrete HTTP clients live in the
//! `integrations` crate; the engine, registry, renderer and queue live in
//! the `orchestrator` crate.
//!
//! # Example
//!
//! ```rust,ignore
//! use domain::{Feature, FeatureInput, MatchingInput};
//! use serde_json::json;
//!
//! let input = FeatureInput::Matching(MatchingInput::UserToTribes {
//!     user_profile: json!({"id": "user-1"}),
//!     tribes: vec![json!({"id": "tribe-1"})],
//! });
//! assert_eq!(input.feature(), Feature::Matching);
//! input.validate().expect("payload is well-formed");
//! ```

pub mod api;
pub mod cache;
pub mod chat;
pub mod error;
pub mod feature;
pub mod metrics;
pub mod model;
pub mod params;
pub mod payload;

// Re-export the types used at nearly every call site.
pub use api::{AiEngineApi, HealthState, HealthStatus, ModelProviderApi};
pub use cache::TtlCache;
pub use chat::{ChatCompletion, ChatMessage, ChatRole, Completion, Embedding, UsageMetadata};
pub use error::{ClientError, ClientResult};
pub use feature::{
    Capability, EngagementKind, Feature, MatchingOperation, PersonalityOperation,
    RecommendationKind,
};
pub use metrics::{MetricsSink, NoopMetrics, RecordingMetrics};
pub use model::ModelConfig;
pub use params::GenerationParams;
pub use payload::{
    ConversationInput, EngagementInput, FeatureInput, FeatureOutput, MatchingInput,
    MatchingOutput, PersonalityInput, RecommendationInput,
};
