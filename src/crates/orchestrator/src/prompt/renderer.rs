//! Prompt rendering: validation, substitution, optimization, budgeting.

use crate::prompt::optimize::{apply_model_emphasis, optimize_for_feature};
use crate::prompt::template::{PromptTemplate, TemplateCategory};
use crate::prompt::tokens::{estimate_tokens, truncate_to_max_tokens};
use crate::{OrchestratorError, Result};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::debug;
use uuid::Uuid;

/// Ephemeral result of rendering one template. Lives only within a single
/// render→dispatch cycle; never persisted.
#[derive(Debug, Clone)]
pub struct RenderedPrompt {
    pub template_id: Uuid,
    pub category: TemplateCategory,
    pub text: String,
    pub estimated_tokens: usize,
    pub variables_used: Vec<String>,
}

/// System/user/assistant renders of one prompt configuration.
#[derive(Debug, Clone)]
pub struct RenderedConfig {
    pub system: RenderedPrompt,
    pub user: RenderedPrompt,
    pub assistant: Option<RenderedPrompt>,
}

impl RenderedConfig {
    pub fn total_tokens(&self) -> usize {
        self.system.estimated_tokens
            + self.user.estimated_tokens
            + self
                .assistant
                .as_ref()
                .map_or(0, |a| a.estimated_tokens)
    }
}

/// Knobs applied after substitution.
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Apply the feature phrase table and normalization.
    pub feature_optimization: bool,
    /// Apply model-specific instruction emphasis.
    pub model_id: Option<String>,
    /// Truncate the rendered text to this estimated-token budget.
    pub max_tokens: Option<usize>,
}

impl RenderOptions {
    pub fn new() -> Self {
        Self {
            feature_optimization: true,
            model_id: None,
            max_tokens: None,
        }
    }

    pub fn without_optimization(mut self) -> Self {
        self.feature_optimization = false;
        self
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Stateless template renderer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptRenderer;

impl PromptRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Render a template against a variable set.
    ///
    /// Every required declared variable must be present and every present
    /// variable must match its declared runtime type; optional variables
    /// fall back to their declared default.
    pub fn render(
        &self,
        template: &PromptTemplate,
        variables: &HashMap<String, Value>,
        options: &RenderOptions,
    ) -> Result<RenderedPrompt> {
        let mut resolved: HashMap<&str, Value> = HashMap::new();
        let mut variables_used = Vec::new();

        for spec in &template.variables {
            match variables.get(&spec.name) {
                Some(value) => {
                    if !spec.var_type.matches(value) {
                        return Err(OrchestratorError::Validation(format!(
                            "invalid type for variable `{}`: expected {}",
                            spec.name, spec.var_type
                        )));
                    }
                    resolved.insert(spec.name.as_str(), value.clone());
                    variables_used.push(spec.name.clone());
                }
                None if spec.required => {
                    return Err(OrchestratorError::Validation(format!(
                        "required field `{}` is missing",
                        spec.name
                    )));
                }
                None => {
                    if let Some(default) = &spec.default {
                        resolved.insert(spec.name.as_str(), default.clone());
                        variables_used.push(spec.name.clone());
                    }
                }
            }
        }

        let mut text = substitute(&template.body, &resolved);

        if options.feature_optimization {
            text = optimize_for_feature(&text, template.feature);
        }
        if let Some(model_id) = &options.model_id {
            text = apply_model_emphasis(&text, model_id);
        }
        if let Some(max_tokens) = options.max_tokens {
            if estimate_tokens(&text) > max_tokens {
                debug!(
                    template_id = %template.id,
                    max_tokens,
                    "rendered prompt over budget, truncating"
                );
                text = truncate_to_max_tokens(&text, max_tokens);
            }
        }

        let estimated_tokens = estimate_tokens(&text);
        Ok(RenderedPrompt {
            template_id: template.id,
            category: template.category,
            text,
            estimated_tokens,
            variables_used,
        })
    }

    /// Render the templates of a configuration against one variable set.
    /// Each sub-render validates independently.
    pub fn render_config(
        &self,
        system: &PromptTemplate,
        user: &PromptTemplate,
        assistant: Option<&PromptTemplate>,
        variables: &HashMap<String, Value>,
        options: &RenderOptions,
    ) -> Result<RenderedConfig> {
        let rendered_system = self.render(system, variables, options)?;
        let rendered_user = self.render(user, variables, options)?;
        let rendered_assistant = assistant
            .map(|template| self.render(template, variables, options))
            .transpose()?;

        Ok(RenderedConfig {
            system: rendered_system,
            user: rendered_user,
            assistant: rendered_assistant,
        })
    }
}

fn if_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?s)\{\{#if\s+([A-Za-z_][A-Za-z0-9_]*)\s*\}\}(.*?)(?:\{\{else\}\}(.*?))?\{\{/if\}\}",
        )
        .expect("if-block regex")
    })
}

fn each_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)\{\{#each\s+([A-Za-z_][A-Za-z0-9_]*)\s*\}\}(.*?)\{\{/each\}\}")
            .expect("each-block regex")
    })
}

fn bare_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("bare placeholder regex")
    })
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => serde_json::to_string_pretty(other).unwrap_or_default(),
    }
}

/// Plain placeholder replacement; no arbitrary code execution. Conditional
/// and loop helpers are expanded first, then bare placeholders.
fn substitute(body: &str, variables: &HashMap<&str, Value>) -> String {
    let with_ifs = if_block_regex().replace_all(body, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        if truthy(variables.get(name)) {
            caps[2].to_string()
        } else {
            caps.get(3).map_or(String::new(), |m| m.as_str().to_string())
        }
    });

    let with_eaches = each_block_regex().replace_all(&with_ifs, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        let item_body = &caps[2];
        match variables.get(name) {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| item_body.replace("{{this}}", &value_text(item)))
                .collect::<Vec<_>>()
                .join(""),
            _ => String::new(),
        }
    });

    bare_regex()
        .replace_all(&with_eaches, |caps: &regex::Captures<'_>| {
            variables
                .get(&caps[1])
                .map(value_text)
                .unwrap_or_default()
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::template::{VariableSpec, VariableType};
    use domain::Feature;
    use serde_json::json;

    fn vars(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn simple_template() -> PromptTemplate {
        PromptTemplate::new(
            Feature::Conversation,
            TemplateCategory::User,
            "Hello {{name}}, you have {{count}} new prompts.",
            vec![
                VariableSpec::required("name", VariableType::String),
                VariableSpec::required("count", VariableType::Number),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_literal_substitution() {
        let renderer = PromptRenderer::new();
        let rendered = renderer
            .render(
                &simple_template(),
                &vars(&[("name", json!("Ada")), ("count", json!(4))]),
                &RenderOptions::new(),
            )
            .unwrap();
        assert_eq!(rendered.text, "Hello Ada, you have 4 new prompts.");
        assert!(!rendered.text.contains("{{"));
        assert_eq!(rendered.variables_used, vec!["name", "count"]);
        assert!(rendered.estimated_tokens > 0);
    }

    #[test]
    fn test_missing_required_variable() {
        let renderer = PromptRenderer::new();
        let err = renderer
            .render(
                &simple_template(),
                &vars(&[("name", json!("Ada"))]),
                &RenderOptions::new(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("required field `count`"));
    }

    #[test]
    fn test_wrong_variable_type() {
        let renderer = PromptRenderer::new();
        let err = renderer
            .render(
                &simple_template(),
                &vars(&[("name", json!("Ada")), ("count", json!("four"))]),
                &RenderOptions::new(),
            )
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("invalid type"));
        assert!(message.contains("count"));
    }

    #[test]
    fn test_optional_variable_default() {
        let template = PromptTemplate::new(
            Feature::Conversation,
            TemplateCategory::User,
            "Tone: {{tone}}",
            vec![VariableSpec::optional(
                "tone",
                VariableType::String,
                json!("friendly"),
            )],
        )
        .unwrap();
        let rendered = PromptRenderer::new()
            .render(&template, &HashMap::new(), &RenderOptions::new())
            .unwrap();
        assert_eq!(rendered.text, "Tone: friendly");
    }

    #[test]
    fn test_conditional_blocks() {
        let template = PromptTemplate::new(
            Feature::Conversation,
            TemplateCategory::User,
            "{{#if premium}}Welcome back!{{else}}Hello.{{/if}}",
            vec![VariableSpec::required("premium", VariableType::Boolean)],
        )
        .unwrap();
        let renderer = PromptRenderer::new();

        let rendered = renderer
            .render(
                &template,
                &vars(&[("premium", json!(true))]),
                &RenderOptions::new(),
            )
            .unwrap();
        assert_eq!(rendered.text, "Welcome back!");

        let rendered = renderer
            .render(
                &template,
                &vars(&[("premium", json!(false))]),
                &RenderOptions::new(),
            )
            .unwrap();
        assert_eq!(rendered.text, "Hello.");
    }

    #[test]
    fn test_each_blocks() {
        let template = PromptTemplate::new(
            Feature::Conversation,
            TemplateCategory::User,
            "Tribes:\n{{#each tribes}}- {{this}}\n{{/each}}",
            vec![VariableSpec::required("tribes", VariableType::Array)],
        )
        .unwrap();
        let rendered = PromptRenderer::new()
            .render(
                &template,
                &vars(&[("tribes", json!(["alpha", "beta"]))]),
                &RenderOptions::new().without_optimization(),
            )
            .unwrap();
        assert_eq!(rendered.text, "Tribes:\n- alpha\n- beta\n");
    }

    #[test]
    fn test_object_variables_render_as_json() {
        let template = PromptTemplate::new(
            Feature::Matching,
            TemplateCategory::User,
            "Profile:\n{{profile}}",
            vec![VariableSpec::required("profile", VariableType::Object)],
        )
        .unwrap();
        let rendered = PromptRenderer::new()
            .render(
                &template,
                &vars(&[("profile", json!({"id": "u1"}))]),
                &RenderOptions::new().without_optimization(),
            )
            .unwrap();
        assert!(rendered.text.contains("\"id\": \"u1\""));
    }

    #[test]
    fn test_no_placeholders_survive_rendering() {
        let rendered = PromptRenderer::new()
            .render(
                &simple_template(),
                &vars(&[("name", json!("Ada")), ("count", json!(1))]),
                &RenderOptions::new(),
            )
            .unwrap();
        let leftovers = crate::prompt::template::extract_placeholders(&rendered.text).unwrap();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_truncation_budget_applied() {
        let template = PromptTemplate::new(
            Feature::Conversation,
            TemplateCategory::User,
            "{{story}}",
            vec![VariableSpec::required("story", VariableType::String)],
        )
        .unwrap();
        let long_story = "One sentence here. ".repeat(50);
        let rendered = PromptRenderer::new()
            .render(
                &template,
                &vars(&[("story", json!(long_story))]),
                &RenderOptions::new().with_max_tokens(20),
            )
            .unwrap();
        assert!(rendered.estimated_tokens <= 20);
        assert!(rendered.text.ends_with("..."));
    }

    #[test]
    fn test_render_config_renders_all_categories() {
        let system = PromptTemplate::new(
            Feature::Conversation,
            TemplateCategory::System,
            "You assist {{name}}.",
            vec![VariableSpec::required("name", VariableType::String)],
        )
        .unwrap();
        let user = PromptTemplate::new(
            Feature::Conversation,
            TemplateCategory::User,
            "{{name}} asks for help.",
            vec![VariableSpec::required("name", VariableType::String)],
        )
        .unwrap();

        let rendered = PromptRenderer::new()
            .render_config(
                &system,
                &user,
                None,
                &vars(&[("name", json!("Ada"))]),
                &RenderOptions::new(),
            )
            .unwrap();
        assert_eq!(rendered.system.text, "You assist Ada.");
        assert_eq!(rendered.user.text, "Ada asks for help.");
        assert!(rendered.assistant.is_none());
        assert_eq!(
            rendered.total_tokens(),
            rendered.system.estimated_tokens + rendered.user.estimated_tokens
        );
    }
}
