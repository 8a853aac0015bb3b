//! Model backend seam
//!
//! Groq, Ollama and the scripted test provider all sit behind [`LlmProvider`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::Message;

/// Default model identifier when none is given
pub const DEFAULT_MODEL: &str = "llama3-70b-8192";

/// Sampling settings sent with every completion
///
/// Defaults are deterministic (`temperature = 0`) so identical transcripts
/// produce identical answers on backends that honor it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default)]
    pub stop_sequences: Vec<String>,
}

const fn default_temperature() -> f32 { 0.0 }
const fn default_max_tokens() -> u32 { 2048 }
const fn default_top_p() -> f32 { 1.0 }

impl Default for GenerationOptions {
    fn default() -> Self {
        Self::for_model(DEFAULT_MODEL)
    }
}

impl GenerationOptions {
    /// Default options bound to a specific model
    pub fn for_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            stop_sequences: Vec::new(),
        }
    }
}

/// Text produced by one model call
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Completion {
    pub content: String,

    /// Model that actually answered, as reported by the backend
    pub model: String,

    pub usage: Option<TokenUsage>,
    pub finish_reason: Option<FinishReason>,
}

impl Completion {
    /// A plain stop completion with no usage data
    pub fn text(content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            usage: None,
            finish_reason: Some(FinishReason::Stop),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolUse,
    ContentFilter,
    Error,
}

impl FinishReason {
    /// Map a provider's wire value (OpenAI/Ollama style)
    pub fn from_wire(value: &str) -> Self {
        match value {
            "stop" => FinishReason::Stop,
            "length" => FinishReason::Length,
            "tool_calls" | "function_call" => FinishReason::ToolUse,
            "content_filter" => FinishReason::ContentFilter,
            _ => FinishReason::Error,
        }
    }
}

/// Model advertised by a backend
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub context_length: Option<u32>,
}

/// A model backend
///
/// The reasoning loop talks to models only through this trait. One instance
/// serves many concurrent runs, so implementations hold no per-run state.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logs and health output
    fn name(&self) -> &str;

    /// Whether the backend answers at all; errors are reported as `false`
    async fn health_check(&self) -> Result<bool>;

    /// One non-streaming completion over the full transcript
    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion>;

    async fn list_models(&self) -> Result<Vec<ModelInfo>>;
}
