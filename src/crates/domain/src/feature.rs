//! Feature tags, sub-operations and model capabilities.
//!
//! A `Feature` is a top-level orchestration capability; each feature carries
//! a static set of capabilities any serving model must declare.

use serde::{Deserialize, Serialize};

/// Top-level orchestration features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Feature {
    /// User-to-tribe matching, tribe formation and compatibility analysis.
    Matching,
    /// Personality profiling from assessments and interaction history.
    Personality,
    /// Conversation prompts, challenges and activity suggestions for tribes.
    Engagement,
    /// Event, weather-aware and budget-aware recommendations.
    Recommendation,
    /// Direct conversation assistance through a chat model.
    Conversation,
}

impl Feature {
    /// All features, in a stable order.
    pub const ALL: [Feature; 5] = [
        Feature::Matching,
        Feature::Personality,
        Feature::Engagement,
        Feature::Recommendation,
        Feature::Conversation,
    ];

    /// Capabilities a model must declare to serve this feature.
    pub fn required_capabilities(&self) -> &'static [Capability] {
        match self {
            Feature::Matching => &[
                Capability::TextGeneration,
                Capability::ChatCompletion,
                Capability::FunctionCalling,
            ],
            Feature::Personality | Feature::Engagement | Feature::Recommendation => {
                &[Capability::TextGeneration, Capability::ChatCompletion]
            }
            Feature::Conversation => &[Capability::ChatCompletion],
        }
    }

    /// Stable lowercase tag used in metric labels and cache keys.
    pub fn tag(&self) -> &'static str {
        match self {
            Feature::Matching => "matching",
            Feature::Personality => "personality",
            Feature::Engagement => "engagement",
            Feature::Recommendation => "recommendation",
            Feature::Conversation => "conversation",
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Declared abilities of a model in the provider catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    TextGeneration,
    ChatCompletion,
    Embedding,
    FunctionCalling,
    ImageUnderstanding,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Capability::TextGeneration => "text-generation",
            Capability::ChatCompletion => "chat-completion",
            Capability::Embedding => "embedding",
            Capability::FunctionCalling => "function-calling",
            Capability::ImageUnderstanding => "image-understanding",
        };
        f.write_str(s)
    }
}

/// Matching sub-operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchingOperation {
    /// Score one user against a set of candidate tribes.
    UserToTribes,
    /// Form balanced tribes from a pool of user profiles.
    TribeFormation,
    /// Pairwise compatibility between a user and a user or tribe.
    Compatibility,
}

impl MatchingOperation {
    pub fn tag(&self) -> &'static str {
        match self {
            MatchingOperation::UserToTribes => "user_to_tribes",
            MatchingOperation::TribeFormation => "tribe_formation",
            MatchingOperation::Compatibility => "compatibility",
        }
    }
}

/// Personality analysis sub-operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PersonalityOperation {
    /// Full trait profile from assessment responses.
    Assessment,
    /// Communication-style analysis from interaction history.
    CommunicationStyle,
    /// Interest categorization from profile data.
    Interests,
}

impl PersonalityOperation {
    pub fn tag(&self) -> &'static str {
        match self {
            PersonalityOperation::Assessment => "assessment",
            PersonalityOperation::CommunicationStyle => "communication_style",
            PersonalityOperation::Interests => "interests",
        }
    }
}

/// Engagement content kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngagementKind {
    ConversationPrompts,
    Challenges,
    Activities,
}

impl EngagementKind {
    pub fn tag(&self) -> &'static str {
        match self {
            EngagementKind::ConversationPrompts => "prompts",
            EngagementKind::Challenges => "challenges",
            EngagementKind::Activities => "activities",
        }
    }
}

/// Recommendation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecommendationKind {
    Events,
    WeatherActivities,
    BudgetOptions,
}

impl RecommendationKind {
    pub fn tag(&self) -> &'static str {
        match self {
            RecommendationKind::Events => "events",
            RecommendationKind::WeatherActivities => "weather_activities",
            RecommendationKind::BudgetOptions => "budget_options",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching_requires_function_calling() {
        assert!(Feature::Matching
            .required_capabilities()
            .contains(&Capability::FunctionCalling));
    }

    #[test]
    fn test_conversation_requires_only_chat() {
        assert_eq!(
            Feature::Conversation.required_capabilities(),
            &[Capability::ChatCompletion]
        );
    }

    #[test]
    fn test_feature_serde_round_trip() {
        let json = serde_json::to_string(&Feature::Matching).unwrap();
        assert_eq!(json, "\"MATCHING\"");
        let back: Feature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Feature::Matching);
    }

    #[test]
    fn test_capability_display() {
        assert_eq!(Capability::FunctionCalling.to_string(), "function-calling");
    }
}
