//! Prompt templating: records, rendering, token budgeting, optimization
//! and canonical defaults.

pub mod defaults;
pub mod optimize;
pub mod renderer;
pub mod template;
pub mod tokens;

pub use defaults::{ensure_all_defaults, ensure_feature_defaults};
pub use renderer::{PromptRenderer, RenderOptions, RenderedConfig, RenderedPrompt};
pub use template::{
    extract_placeholders, PromptConfig, PromptTemplate, TemplateCategory, VariableSpec,
    VariableType,
};
pub use tokens::{estimate_tokens, truncate_to_max_tokens};
