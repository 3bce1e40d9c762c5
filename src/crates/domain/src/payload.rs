//! Tagged-union feature payloads.
//!
//! Every orchestration request carries exactly one `FeatureInput` variant,
//! validated at the boundary before any state is persisted. Outputs are the
//! normalized result payloads the engine persists and caches; the raw
//! provider body is kept alongside them on the response record.

use crate::chat::{ChatCompletion, ChatMessage};
use crate::feature::{
    EngagementKind, Feature, MatchingOperation, PersonalityOperation, RecommendationKind,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Boundary validation failure: the payload does not satisfy the declared
/// feature's required-field schema.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct InvalidPayload(pub String);

fn require_object(value: &Value, field: &str) -> Result<(), InvalidPayload> {
    match value {
        Value::Object(map) if !map.is_empty() => Ok(()),
        Value::Object(_) => Err(InvalidPayload(format!("{field} must not be empty"))),
        _ => Err(InvalidPayload(format!("{field} must be an object"))),
    }
}

/// Compatibility target kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    User,
    Tribe,
}

/// Matching inputs, one variant per sub-operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchingInput {
    UserToTribes {
        user_profile: Value,
        tribes: Vec<Value>,
    },
    TribeFormation {
        user_profiles: Vec<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        min_tribe_size: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        max_tribe_size: Option<u32>,
    },
    Compatibility {
        user_profile: Value,
        target: Value,
        target_type: TargetType,
    },
}

impl MatchingInput {
    pub fn operation(&self) -> MatchingOperation {
        match self {
            MatchingInput::UserToTribes { .. } => MatchingOperation::UserToTribes,
            MatchingInput::TribeFormation { .. } => MatchingOperation::TribeFormation,
            MatchingInput::Compatibility { .. } => MatchingOperation::Compatibility,
        }
    }

    fn validate(&self) -> Result<(), InvalidPayload> {
        match self {
            MatchingInput::UserToTribes {
                user_profile,
                tribes,
            } => {
                require_object(user_profile, "userProfile")?;
                if tribes.is_empty() {
                    return Err(InvalidPayload("tribes must not be empty".into()));
                }
                Ok(())
            }
            MatchingInput::TribeFormation {
                user_profiles,
                min_tribe_size,
                max_tribe_size,
            } => {
                if user_profiles.is_empty() {
                    return Err(InvalidPayload("userProfiles must not be empty".into()));
                }
                if let (Some(min), Some(max)) = (min_tribe_size, max_tribe_size) {
                    if min > max {
                        return Err(InvalidPayload(
                            "minTribeSize must not exceed maxTribeSize".into(),
                        ));
                    }
                }
                Ok(())
            }
            MatchingInput::Compatibility {
                user_profile,
                target,
                ..
            } => {
                require_object(user_profile, "userProfile")?;
                require_object(target, "target")
            }
        }
    }
}

/// Personality analysis inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PersonalityInput {
    Assessment { assessment_data: Value },
    CommunicationStyle { interaction_data: Value },
    Interests { profile_data: Value },
}

impl PersonalityInput {
    pub fn operation(&self) -> PersonalityOperation {
        match self {
            PersonalityInput::Assessment { .. } => PersonalityOperation::Assessment,
            PersonalityInput::CommunicationStyle { .. } => PersonalityOperation::CommunicationStyle,
            PersonalityInput::Interests { .. } => PersonalityOperation::Interests,
        }
    }

    fn validate(&self) -> Result<(), InvalidPayload> {
        match self {
            PersonalityInput::Assessment { assessment_data } => {
                require_object(assessment_data, "assessmentData")
            }
            PersonalityInput::CommunicationStyle { interaction_data } => {
                require_object(interaction_data, "interactionData")
            }
            PersonalityInput::Interests { profile_data } => {
                require_object(profile_data, "profileData")
            }
        }
    }
}

fn default_count() -> u32 {
    3
}

/// Engagement generation input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementInput {
    pub kind: EngagementKind,
    pub tribe_data: Value,
    /// How many prompts/activities to generate; challenges ignore this.
    #[serde(default = "default_count")]
    pub count: u32,
    /// Kind-specific selector, e.g. a prompt type of `"reflection"` or a
    /// challenge type of `"creative"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl EngagementInput {
    fn validate(&self) -> Result<(), InvalidPayload> {
        require_object(&self.tribe_data, "tribeData")?;
        if self.count == 0 {
            return Err(InvalidPayload("count must be at least 1".into()));
        }
        if let Some(variant) = &self.variant {
            if variant.trim().is_empty() {
                return Err(InvalidPayload("variant must not be blank".into()));
            }
        }
        Ok(())
    }
}

/// Recommendation input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationInput {
    pub kind: RecommendationKind,
    pub tribe_data: Value,
    pub location: String,
    #[serde(default = "default_count")]
    pub count: u32,
    /// Required for `Events` when a window matters; ignored otherwise.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range: Option<String>,
    /// Required for `WeatherActivities`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather_data: Option<Value>,
    /// Required for `BudgetOptions`; total budget in whole currency units.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
}

impl RecommendationInput {
    fn validate(&self) -> Result<(), InvalidPayload> {
        require_object(&self.tribe_data, "tribeData")?;
        if self.location.trim().is_empty() {
            return Err(InvalidPayload("location is required".into()));
        }
        if self.count == 0 {
            return Err(InvalidPayload("count must be at least 1".into()));
        }
        match self.kind {
            RecommendationKind::WeatherActivities if self.weather_data.is_none() => {
                Err(InvalidPayload("weatherData is required".into()))
            }
            RecommendationKind::BudgetOptions => match self.budget {
                Some(budget) if budget > 0.0 => Ok(()),
                Some(_) => Err(InvalidPayload("budget must be positive".into())),
                None => Err(InvalidPayload("budget is required".into())),
            },
            _ => Ok(()),
        }
    }
}

/// Conversation assistance input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationInput {
    pub messages: Vec<ChatMessage>,
}

impl ConversationInput {
    fn validate(&self) -> Result<(), InvalidPayload> {
        if self.messages.is_empty() {
            return Err(InvalidPayload("messages must not be empty".into()));
        }
        Ok(())
    }
}

/// The feature-specific input payload of an orchestration request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "feature", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureInput {
    Matching(MatchingInput),
    Personality(PersonalityInput),
    Engagement(EngagementInput),
    Recommendation(RecommendationInput),
    Conversation(ConversationInput),
}

impl FeatureInput {
    pub fn feature(&self) -> Feature {
        match self {
            FeatureInput::Matching(_) => Feature::Matching,
            FeatureInput::Personality(_) => Feature::Personality,
            FeatureInput::Engagement(_) => Feature::Engagement,
            FeatureInput::Recommendation(_) => Feature::Recommendation,
            FeatureInput::Conversation(_) => Feature::Conversation,
        }
    }

    /// Stable sub-operation tag, used in prompts and metric labels.
    pub fn operation_tag(&self) -> &'static str {
        match self {
            FeatureInput::Matching(input) => input.operation().tag(),
            FeatureInput::Personality(input) => input.operation().tag(),
            FeatureInput::Engagement(input) => input.kind.tag(),
            FeatureInput::Recommendation(input) => input.kind.tag(),
            FeatureInput::Conversation(_) => "chat",
        }
    }

    /// Validate the payload against the feature's required-field schema.
    pub fn validate(&self) -> Result<(), InvalidPayload> {
        match self {
            FeatureInput::Matching(input) => input.validate(),
            FeatureInput::Personality(input) => input.validate(),
            FeatureInput::Engagement(input) => input.validate(),
            FeatureInput::Recommendation(input) => input.validate(),
            FeatureInput::Conversation(input) => input.validate(),
        }
    }

    /// Variables handed to the prompt renderer: the sub-operation tag and
    /// the full payload object.
    pub fn prompt_variables(&self) -> HashMap<String, Value> {
        let mut vars = HashMap::new();
        vars.insert(
            "operation".to_string(),
            Value::String(self.operation_tag().to_string()),
        );
        vars.insert(
            "payload".to_string(),
            serde_json::to_value(self).unwrap_or(Value::Null),
        );
        vars
    }
}

/// Normalized matching result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingOutput {
    /// Per-candidate match objects with compatibility scores and reasoning.
    pub matches: Vec<Value>,
}

/// The normalized result payload of a completed request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "feature", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureOutput {
    Matching(MatchingOutput),
    Personality { profile: Value },
    Engagement { items: Vec<Value> },
    Recommendation { recommendations: Vec<Value> },
    Conversation(ChatCompletion),
}

impl FeatureOutput {
    pub fn feature(&self) -> Feature {
        match self {
            FeatureOutput::Matching(_) => Feature::Matching,
            FeatureOutput::Personality { .. } => Feature::Personality,
            FeatureOutput::Engagement { .. } => Feature::Engagement,
            FeatureOutput::Recommendation { .. } => Feature::Recommendation,
            FeatureOutput::Conversation(_) => Feature::Conversation,
        }
    }
}
