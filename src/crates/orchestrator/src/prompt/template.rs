//! Prompt templates, configurations and the placeholder invariant.
//!
//! A template body uses `{{var}}` placeholders plus the helper forms
//! `{{#if var}} … {{else}} … {{/if}}` and `{{#each var}} … {{/each}}`.
//! For extraction purposes every helper resolves to the bare variable it
//! opens with. The set of placeholders in a body and the set of declared
//! variable names must be identical; both directions are enforced whenever
//! a template is created or updated.

use crate::{OrchestratorError, Result};
use chrono::{DateTime, Utc};
use domain::Feature;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::OnceLock;
use uuid::Uuid;

/// Position of a template within a prompt configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateCategory {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for TemplateCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateCategory::System => write!(f, "system"),
            TemplateCategory::User => write!(f, "user"),
            TemplateCategory::Assistant => write!(f, "assistant"),
        }
    }
}

/// Declared runtime type of a template variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl VariableType {
    /// Whether a runtime JSON value satisfies this declared type.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            VariableType::String => value.is_string(),
            VariableType::Number => value.is_number(),
            VariableType::Boolean => value.is_boolean(),
            VariableType::Array => value.is_array(),
            VariableType::Object => value.is_object(),
        }
    }
}

impl std::fmt::Display for VariableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VariableType::String => write!(f, "string"),
            VariableType::Number => write!(f, "number"),
            VariableType::Boolean => write!(f, "boolean"),
            VariableType::Array => write!(f, "array"),
            VariableType::Object => write!(f, "object"),
        }
    }
}

/// One declared template variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub var_type: VariableType,
    #[serde(default = "VariableSpec::default_required")]
    pub required: bool,
    /// Used when an optional variable is absent at render time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl VariableSpec {
    fn default_required() -> bool {
        true
    }

    pub fn required(name: impl Into<String>, var_type: VariableType) -> Self {
        Self {
            name: name.into(),
            var_type,
            required: true,
            default: None,
        }
    }

    pub fn optional(name: impl Into<String>, var_type: VariableType, default: Value) -> Self {
        Self {
            name: name.into(),
            var_type,
            required: false,
            default: Some(default),
        }
    }
}

/// A parameterized prompt blueprint with typed named variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub id: Uuid,
    pub category: TemplateCategory,
    pub feature: Feature,
    pub body: String,
    pub variables: Vec<VariableSpec>,
    pub version: u32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PromptTemplate {
    /// Create a template, enforcing the placeholder/variable bijection.
    pub fn new(
        feature: Feature,
        category: TemplateCategory,
        body: impl Into<String>,
        variables: Vec<VariableSpec>,
    ) -> Result<Self> {
        let body = body.into();
        validate_placeholders(&body, &variables)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            category,
            feature,
            body,
            variables,
            version: 1,
            active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replace body and variables, re-validating the invariant and bumping
    /// the version.
    pub fn update(&mut self, body: impl Into<String>, variables: Vec<VariableSpec>) -> Result<()> {
        let body = body.into();
        validate_placeholders(&body, &variables)?;
        self.body = body;
        self.variables = variables;
        self.version += 1;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn variable(&self, name: &str) -> Option<&VariableSpec> {
        self.variables.iter().find(|v| v.name == name)
    }
}

/// A named binding of system/user/assistant templates to a feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    pub id: Uuid,
    pub feature: Feature,
    pub system_template: Uuid,
    pub user_template: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistant_template: Option<Uuid>,
    pub is_default: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl PromptConfig {
    pub fn new(feature: Feature, system_template: Uuid, user_template: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            feature,
            system_template,
            user_template,
            assistant_template: None,
            is_default: false,
            active: true,
            created_at: Utc::now(),
        }
    }

    pub fn with_assistant_template(mut self, template_id: Uuid) -> Self {
        self.assistant_template = Some(template_id);
        self
    }

    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }
}

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("placeholder regex"))
}

fn bare_ident(token: &str) -> bool {
    let mut chars = token.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Extract the set of variable names referenced by a template body.
///
/// Helper open tags (`{{#if var}}`, `{{#each var}}`) contribute the
/// variable they reference; closing tags, `{{else}}` and `{{this}}`
/// contribute nothing. Any other non-bare token is a validation error.
pub fn extract_placeholders(body: &str) -> Result<BTreeSet<String>> {
    let mut names = BTreeSet::new();
    for capture in placeholder_regex().captures_iter(body) {
        let token = capture[1].trim();

        if token.starts_with('/') || token == "else" || token == "this" {
            continue;
        }

        let name = if let Some(helper) = token.strip_prefix('#') {
            let mut parts = helper.split_whitespace();
            let keyword = parts.next().unwrap_or_default();
            let argument = parts.next();
            if !matches!(keyword, "if" | "each") || parts.next().is_some() {
                return Err(OrchestratorError::Validation(format!(
                    "unsupported helper placeholder `{{{{{token}}}}}`"
                )));
            }
            match argument {
                Some(arg) if bare_ident(arg) => arg,
                _ => {
                    return Err(OrchestratorError::Validation(format!(
                        "helper `{{{{{token}}}}}` must reference a bare variable"
                    )))
                }
            }
        } else if bare_ident(token) {
            token
        } else {
            return Err(OrchestratorError::Validation(format!(
                "placeholder `{{{{{token}}}}}` is not a bare variable reference"
            )));
        };

        names.insert(name.to_string());
    }
    Ok(names)
}

/// Enforce the bijection between body placeholders and declared variables.
pub fn validate_placeholders(body: &str, variables: &[VariableSpec]) -> Result<()> {
    let placeholders = extract_placeholders(body)?;
    let declared: BTreeSet<String> = variables.iter().map(|v| v.name.clone()).collect();

    if declared.len() != variables.len() {
        return Err(OrchestratorError::Validation(
            "duplicate variable declaration".into(),
        ));
    }

    let undeclared: Vec<&String> = placeholders.difference(&declared).collect();
    if !undeclared.is_empty() {
        return Err(OrchestratorError::Validation(format!(
            "placeholders without a declared variable: {}",
            undeclared
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }

    let unused: Vec<&String> = declared.difference(&placeholders).collect();
    if !unused.is_empty() {
        return Err(OrchestratorError::Validation(format!(
            "declared variables never referenced: {}",
            unused
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bare_placeholders() {
        let names = extract_placeholders("Hello {{name}}, you are {{ age }} years old").unwrap();
        assert_eq!(names.len(), 2);
        assert!(names.contains("name"));
        assert!(names.contains("age"));
    }

    #[test]
    fn test_extract_helper_placeholders() {
        let body = "{{#if premium}}Welcome back!{{else}}Hello.{{/if}}\n{{#each tribes}}- {{this}}\n{{/each}}";
        let names = extract_placeholders(body).unwrap();
        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            vec!["premium".to_string(), "tribes".to_string()]
        );
    }

    #[test]
    fn test_extract_rejects_non_bare_tokens() {
        assert!(extract_placeholders("{{user.name}}").is_err());
        assert!(extract_placeholders("{{#unless x}}{{/unless}}").is_err());
        assert!(extract_placeholders("{{#if a b}}{{/if}}").is_err());
    }

    #[test]
    fn test_template_bijection_enforced() {
        // Placeholder without declaration.
        let err = PromptTemplate::new(
            Feature::Matching,
            TemplateCategory::User,
            "Profile: {{user_profile}}",
            vec![],
        )
        .unwrap_err();
        assert!(err.to_string().contains("user_profile"));

        // Declaration without placeholder.
        let err = PromptTemplate::new(
            Feature::Matching,
            TemplateCategory::User,
            "Static body",
            vec![VariableSpec::required("unused", VariableType::String)],
        )
        .unwrap_err();
        assert!(err.to_string().contains("unused"));
    }

    #[test]
    fn test_template_update_bumps_version() {
        let mut template = PromptTemplate::new(
            Feature::Engagement,
            TemplateCategory::User,
            "{{operation}}: {{payload}}",
            vec![
                VariableSpec::required("operation", VariableType::String),
                VariableSpec::required("payload", VariableType::Object),
            ],
        )
        .unwrap();
        assert_eq!(template.version, 1);

        template
            .update(
                "Run {{operation}} over {{payload}}",
                template.variables.clone(),
            )
            .unwrap();
        assert_eq!(template.version, 2);

        // Updates re-check the invariant.
        let result = template.update("No placeholders", template.variables.clone());
        assert!(result.is_err());
    }

    #[test]
    fn test_duplicate_declarations_rejected() {
        let result = PromptTemplate::new(
            Feature::Matching,
            TemplateCategory::User,
            "{{a}}",
            vec![
                VariableSpec::required("a", VariableType::String),
                VariableSpec::required("a", VariableType::Number),
            ],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_variable_type_matching() {
        use serde_json::json;
        assert!(VariableType::String.matches(&json!("x")));
        assert!(VariableType::Number.matches(&json!(3.5)));
        assert!(VariableType::Array.matches(&json!([1])));
        assert!(!VariableType::Object.matches(&json!([1])));
        assert!(VariableType::Boolean.matches(&json!(false)));
    }
}
