//! Canonical default templates and configurations.
//!
//! Every (feature × category) pair has a canonical template and every
//! feature has a default configuration. Both are created lazily on first
//! access with idempotent ensure semantics, and satisfy the same
//! placeholder/variable invariant as user-authored templates.
//!
//! Default user templates all declare the same two variables — `operation`
//! (the sub-operation tag) and `payload` (the full input object) — so one
//! canonical default renders for every sub-operation of its feature.

use crate::prompt::template::{
    PromptConfig, PromptTemplate, TemplateCategory, VariableSpec, VariableType,
};
use crate::store::{PromptConfigStore, TemplateStore};
use crate::Result;
use domain::Feature;
use tracing::info;

const MATCHING_SYSTEM: &str = "You are an AI assistant for the Tribe platform, producing structured matchmaking decisions for social groups. Always respond in the exact JSON format requested.";

const MATCHING_USER: &str = "You are an AI matchmaker for the Tribe platform. Perform the {{operation}} operation on the data below.\n\nData:\n{{payload}}\n\nAnalyze compatibility across personality balance, shared interests and communication style. Tribes work best with complementary personality traits, some shared interests, and compatible communication styles. Provide a compatibility score (0-100) and concise reasoning for every candidate or formed tribe.\n\nFormat your response as a JSON array of objects with tribeId, compatibilityScore and compatibilityReasoning fields.";

const PERSONALITY_SYSTEM: &str = "You are an AI personality analyst for the Tribe platform. Produce structured, evidence-based profiles. Always respond in the exact JSON format requested.";

const PERSONALITY_USER: &str = "Perform the {{operation}} analysis on the data below.\n\nData:\n{{payload}}\n\nIdentify Big Five personality traits with scores (0-100), communication style (direct, analytical, intuitive or functional), social preferences, and key strengths in social settings, as applicable to the requested analysis.\n\nFormat your response as a JSON object with traits, communicationStyle, socialPreferences and insights sections.";

const ENGAGEMENT_SYSTEM: &str = "You are an AI engagement specialist for the Tribe platform. Generate content that deepens connections within a specific tribe. Always respond in the exact JSON format requested.";

const ENGAGEMENT_USER: &str = "Generate {{operation}} content for the tribe described below.\n\nTribe data:\n{{payload}}\n\nEverything you generate must be specific to this tribe's composition and shared interests, not generic, and should encourage participation from all members, including the more reserved ones.\n\nFormat your response as a JSON array of objects, each with a text field and a reasoning field explaining why it suits this tribe.";

const RECOMMENDATION_SYSTEM: &str = "You are an AI recommendation specialist for the Tribe platform. Recommend concrete options a tribe can act on. Always respond in the exact JSON format requested.";

const RECOMMENDATION_USER: &str = "Produce {{operation}} recommendations for the tribe described below.\n\nContext:\n{{payload}}\n\nEach recommendation must fit the tribe's shared interests and group composition, respect the stated location, date, weather or budget constraints, and include a matchReason explaining the personalized fit.\n\nFormat your response as a JSON array of recommendation objects with appropriate fields and a matchReason.";

const CONVERSATION_SYSTEM: &str = "You are a helpful AI assistant for the Tribe platform. Keep replies concise, warm and practical.";

const CONVERSATION_USER: &str = "Continue the {{operation}} conversation using the context below.\n\nContext:\n{{payload}}";

const ASSISTANT_ACK: &str = "Understood. I will analyze the provided data and respond with the exact structure requested.";

fn standard_variables() -> Vec<VariableSpec> {
    vec![
        VariableSpec::required("operation", VariableType::String),
        VariableSpec::required("payload", VariableType::Object),
    ]
}

/// Canonical body and variable declarations for a (feature, category).
fn default_template_parts(
    feature: Feature,
    category: TemplateCategory,
) -> (&'static str, Vec<VariableSpec>) {
    match category {
        TemplateCategory::System => {
            let body = match feature {
                Feature::Matching => MATCHING_SYSTEM,
                Feature::Personality => PERSONALITY_SYSTEM,
                Feature::Engagement => ENGAGEMENT_SYSTEM,
                Feature::Recommendation => RECOMMENDATION_SYSTEM,
                Feature::Conversation => CONVERSATION_SYSTEM,
            };
            (body, Vec::new())
        }
        TemplateCategory::User => {
            let body = match feature {
                Feature::Matching => MATCHING_USER,
                Feature::Personality => PERSONALITY_USER,
                Feature::Engagement => ENGAGEMENT_USER,
                Feature::Recommendation => RECOMMENDATION_USER,
                Feature::Conversation => CONVERSATION_USER,
            };
            (body, standard_variables())
        }
        TemplateCategory::Assistant => (ASSISTANT_ACK, Vec::new()),
    }
}

/// Build (without persisting) the canonical template for a pair.
pub fn default_template(feature: Feature, category: TemplateCategory) -> Result<PromptTemplate> {
    let (body, variables) = default_template_parts(feature, category);
    PromptTemplate::new(feature, category, body, variables)
}

async fn ensure_template(
    templates: &dyn TemplateStore,
    feature: Feature,
    category: TemplateCategory,
) -> Result<PromptTemplate> {
    let mut existing = templates.list_templates(feature, Some(category)).await?;
    // Oldest active template is the canonical one.
    existing.sort_by_key(|t| t.created_at);
    if let Some(template) = existing.into_iter().next() {
        return Ok(template);
    }

    let template = default_template(feature, category)?;
    templates.insert_template(&template).await?;
    info!(
        feature = %feature,
        category = %category,
        template_id = %template.id,
        "created default prompt template"
    );
    Ok(template)
}

/// Ensure the canonical templates and default configuration exist for one
/// feature, returning the feature's default configuration.
pub async fn ensure_feature_defaults(
    feature: Feature,
    templates: &dyn TemplateStore,
    configs: &dyn PromptConfigStore,
) -> Result<PromptConfig> {
    if let Some(config) = configs.default_config_for(feature).await? {
        return Ok(config);
    }

    let system = ensure_template(templates, feature, TemplateCategory::System).await?;
    let user = ensure_template(templates, feature, TemplateCategory::User).await?;
    let assistant = ensure_template(templates, feature, TemplateCategory::Assistant).await?;

    let mut config = PromptConfig::new(feature, system.id, user.id).as_default();
    // Conversation primes the assistant turn; other features only bind the
    // system/user pair.
    if feature == Feature::Conversation {
        config = config.with_assistant_template(assistant.id);
    }
    configs.insert_config(&config).await?;
    info!(feature = %feature, config_id = %config.id, "created default prompt config");
    Ok(config)
}

/// Ensure defaults for every feature. Idempotent.
pub async fn ensure_all_defaults(
    templates: &dyn TemplateStore,
    configs: &dyn PromptConfigStore,
) -> Result<()> {
    for feature in Feature::ALL {
        ensure_feature_defaults(feature, templates, configs).await?;
    }
    Ok(())
}
