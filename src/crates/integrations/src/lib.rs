//! Provider clients for the tribe-ai orchestration pipeline.
//!
//! Two clients, one per external provider:
//!
//! - [`ModelProviderClient`] — an OpenRouter-style REST endpoint exposing
//!   `POST /completions`, `POST /chat/completions`, `POST /embeddings`,
//!   `GET /models` and `GET /health`.
//! - [`AiEngineClient`] — the internal AI Engine exposing `POST /matching`,
//!   `POST /personality`, `POST /engagement`, `POST /recommendations` and
//!   `GET /health`.
//!
//! Both wrap outbound HTTP with a per-request correlation id, error
//! classification into the [`domain::ClientError`] taxonomy, error counters
//! labeled by classification, and an explicit [`RetryPolicy`] applying
//! exponential backoff with jitter to retryable failures.
//!
//! # Example
//!
//! ```rust,ignore
//! use integrations::{ClientConfig, ModelProviderClient, RetryPolicy};
//! use domain::{ChatMessage, GenerationParams, NoopMetrics};
//! use std::sync::Arc;
//!
//! let config = ClientConfig::new("https://openrouter.example/api/v1", "sk-key")
//!     .with_retry(RetryPolicy::new(3));
//! let client = ModelProviderClient::new(config, Arc::new(NoopMetrics))?;
//!
//! let messages = [ChatMessage::user("Hello!")];
//! let reply = client
//!     .chat(&messages, "openai/gpt-4", &GenerationParams::new())
//!     .await?;
//! ```

pub mod config;
pub mod engine;
mod http;
pub mod provider;
pub mod retry;

pub use config::ClientConfig;
pub use engine::AiEngineClient;
pub use provider::ModelProviderClient;
pub use retry::{retry_with_backoff, RetryPolicy};
