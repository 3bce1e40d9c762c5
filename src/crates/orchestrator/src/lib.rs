//! AI orchestration engine for the tribe-ai pipeline.
//!
//! This crate owns the request state machine, the model registry and
//! selection algorithm, the prompt template store/renderer, the
//! priority-ordered bounded-concurrency queue, and the response cache.
//! External collaborators — the persistent store, the metrics sink and the
//! provider clients — are injected as trait objects.
//!
//! The life of a request:
//!
//! 1. [`engine::OrchestrationEngine::create_request`] validates the payload
//!    and persists it as `Pending`.
//! 2. The caller either drives [`engine::OrchestrationEngine::process`]
//!    directly or hands the id to the [`queue::PriorityQueue`].
//! 3. Processing resolves a model through the [`registry::ModelRegistry`],
//!    renders the feature's prompt configuration, dispatches exactly one
//!    integration call, and persists/caches the response.

pub mod bootstrap;
pub mod config;
pub mod engine;
pub mod prompt;
pub mod queue;
pub mod registry;
pub mod request;
pub mod response;
pub mod store;

use domain::payload::InvalidPayload;
use domain::ClientError;
use thiserror::Error;

pub use bootstrap::{build_pipeline, Pipeline};
pub use config::OrchestratorConfig;
pub use engine::{HealthReport, OrchestrationEngine};
pub use queue::PriorityQueue;
pub use registry::ModelRegistry;
pub use request::{OrchestrationRequest, Priority, RequestStatus};
pub use response::{OrchestrationResponse, ResponseStatus};
pub use store::{
    MemoryStore, OrchestratorStore, PromptConfigStore, RequestStore, ResponseStore, TemplateStore,
};

/// Errors surfaced to callers of the orchestration engine.
#[derive(Debug, Clone, Error)]
pub enum OrchestratorError {
    /// Malformed or missing input; never retried, never persisted.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown request, response, template or config id.
    #[error("not found: {0}")]
    NotFound(String),

    /// Illegal state transition, e.g. processing a non-pending request.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Provider rejected our credentials.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Provider throttling survived the retry policy.
    #[error("rate limited: {0}")]
    RateLimit(String),

    /// Provider timeout or 5xx after retries were exhausted.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Unexpected or unclassified failure.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

impl From<ClientError> for OrchestratorError {
    fn from(err: ClientError) -> Self {
        let detail = err.to_string();
        match err {
            ClientError::Timeout(_) | ClientError::Server(_) | ClientError::Network(_) => {
                OrchestratorError::ServiceUnavailable(detail)
            }
            ClientError::Authentication(_) => OrchestratorError::Authentication(detail),
            ClientError::RateLimit(_) => OrchestratorError::RateLimit(detail),
            ClientError::Validation(_) | ClientError::ContentFiltered(_) => {
                OrchestratorError::Validation(detail)
            }
            ClientError::Unknown(_) => OrchestratorError::Internal(detail),
        }
    }
}

impl From<InvalidPayload> for OrchestratorError {
    fn from(err: InvalidPayload) -> Self {
        OrchestratorError::Validation(err.0)
    }
}

impl OrchestratorError {
    /// Stable label for error counters.
    pub fn kind(&self) -> &'static str {
        match self {
            OrchestratorError::Validation(_) => "validation",
            OrchestratorError::NotFound(_) => "not_found",
            OrchestratorError::Conflict(_) => "conflict",
            OrchestratorError::Authentication(_) => "authentication",
            OrchestratorError::RateLimit(_) => "rate_limit",
            OrchestratorError::ServiceUnavailable(_) => "service_unavailable",
            OrchestratorError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_mapping() {
        let err: OrchestratorError = ClientError::Server("503".into()).into();
        assert!(matches!(err, OrchestratorError::ServiceUnavailable(_)));

        let err: OrchestratorError = ClientError::RateLimit("429".into()).into();
        assert!(matches!(err, OrchestratorError::RateLimit(_)));

        let err: OrchestratorError = ClientError::ContentFiltered("filtered".into()).into();
        assert!(matches!(err, OrchestratorError::Validation(_)));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(OrchestratorError::Conflict("x".into()).kind(), "conflict");
        assert_eq!(
            OrchestratorError::ServiceUnavailable("x".into()).kind(),
            "service_unavailable"
        );
    }
}
