//! Orchestration requests and their state machine.

use crate::{OrchestratorError, Result};
use chrono::{DateTime, Utc};
use domain::{Feature, FeatureInput, GenerationParams};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Scheduling priority; unspecified requests default to `Medium`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Critical => write!(f, "critical"),
        }
    }
}

/// Request lifecycle states.
///
/// ```text
/// Pending ──→ Processing ──→ Completed
///    │             └───────→ Failed
///    └───→ Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl RequestStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Completed | RequestStatus::Failed | RequestStatus::Cancelled
        )
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "PENDING"),
            RequestStatus::Processing => write!(f, "PROCESSING"),
            RequestStatus::Completed => write!(f, "COMPLETED"),
            RequestStatus::Failed => write!(f, "FAILED"),
            RequestStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// A unit of work submitted to the pipeline.
///
/// Mutated only through the transition methods below; never mutated after
/// reaching a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationRequest {
    pub id: Uuid,
    pub input: FeatureInput,
    pub requester_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_model: Option<String>,
    #[serde(default)]
    pub params: GenerationParams,
    pub status: RequestStatus,
    #[serde(default)]
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrchestrationRequest {
    /// Build a new `Pending` request. Input validation happens in the
    /// engine before this is persisted.
    pub fn new(input: FeatureInput, requester_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            input,
            requester_id: requester_id.into(),
            preferred_model: None,
            params: GenerationParams::default(),
            status: RequestStatus::Pending,
            priority: Priority::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_preferred_model(mut self, model_id: impl Into<String>) -> Self {
        self.preferred_model = Some(model_id.into());
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn feature(&self) -> Feature {
        self.input.feature()
    }

    /// `Pending → Processing`. Legal exactly once.
    pub fn begin_processing(&mut self) -> Result<()> {
        self.transition(RequestStatus::Pending, RequestStatus::Processing)
    }

    /// `Processing → Completed`.
    pub fn complete(&mut self) -> Result<()> {
        self.transition(RequestStatus::Processing, RequestStatus::Completed)
    }

    /// `Processing → Failed`.
    pub fn fail(&mut self) -> Result<()> {
        self.transition(RequestStatus::Processing, RequestStatus::Failed)
    }

    /// `Pending → Cancelled`. Cancellation is cooperative and honored only
    /// while the request is still pending.
    pub fn cancel(&mut self) -> Result<()> {
        self.transition(RequestStatus::Pending, RequestStatus::Cancelled)
    }

    fn transition(&mut self, from: RequestStatus, to: RequestStatus) -> Result<()> {
        if self.status != from {
            return Err(OrchestratorError::Conflict(format!(
                "request {} is {}, cannot transition to {to}",
                self.id, self.status
            )));
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}
