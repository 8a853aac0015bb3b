//! Request/response contract and request validation.
//!
//! Field names are part of the wire contract and must not change.

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};

/// Incoming conversation request
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    /// Must be a member of the allowed model set
    pub model_name: String,

    #[serde(default)]
    pub system_prompt: String,

    /// Conversation so far, oldest first; must be non-empty
    pub messages: Vec<String>,

    #[serde(default)]
    pub allow_search: bool,
}

impl ChatRequest {
    pub fn new(model_name: impl Into<String>, messages: Vec<String>) -> Self {
        Self {
            model_name: model_name.into(),
            system_prompt: String::new(),
            messages,
            allow_search: false,
        }
    }

    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    #[must_use]
    pub const fn with_search(mut self, allow: bool) -> Self {
        self.allow_search = allow;
        self
    }
}

/// Successful answer
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatResponse {
    pub response: String,
}

/// Externally configured model allow-list
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct AllowedModels(Vec<String>);

impl AllowedModels {
    pub fn new<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list: Vec<String> = Vec::new();
        for model in models {
            let model = model.into();
            let model = model.trim();
            if !model.is_empty() && !list.iter().any(|m| m == model) {
                list.push(model.to_string());
            }
        }
        Self(list)
    }

    pub fn contains(&self, model: &str) -> bool {
        self.0.iter().any(|m| m == model)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Reject requests before any backend work. Pure.
pub fn validate(request: &ChatRequest, allowed: &AllowedModels) -> Result<()> {
    if !allowed.contains(&request.model_name) {
        return Err(AgentError::invalid_model(&request.model_name, allowed.as_slice()));
    }

    if request.messages.iter().all(|m| m.trim().is_empty()) {
        return Err(AgentError::Validation {
            field: "messages",
            message: "at least one non-empty message is required".into(),
            allowed: Vec::new(),
        });
    }

    Ok(())
}
