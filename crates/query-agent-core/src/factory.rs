//! Agent assembly
//!
//! Turns a validated [`ChatRequest`] into an [`Agent`]: resolves the model
//! backend, picks the tool set and binds the instruction. Nothing built here
//! outlives the request.

use std::sync::Arc;

use crate::config::CoreConfig;
use crate::error::{AgentError, Result};
use crate::provider::LlmProvider;
use crate::reasoning::{Agent, AgentBuilder, DEFAULT_SYSTEM_PROMPT};
use crate::request::ChatRequest;
use crate::tool::Tool;

/// Maps a model identifier to a backend handle
///
/// Handles may be shared across requests; implementations must only hand out
/// clients that are safe for concurrent use.
pub trait ModelResolver: Send + Sync {
    /// Fails with `BackendUnavailable` when the backend cannot be initialized
    fn resolve(&self, model_name: &str) -> Result<Arc<dyn LlmProvider>>;

    /// Backend name, for health output
    fn backend_name(&self) -> &str;
}

/// Always resolves to the same provider
pub struct FixedResolver {
    provider: Arc<dyn LlmProvider>,
}

impl FixedResolver {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }
}

impl ModelResolver for FixedResolver {
    fn resolve(&self, _model_name: &str) -> Result<Arc<dyn LlmProvider>> {
        Ok(self.provider.clone())
    }

    fn backend_name(&self) -> &str {
        self.provider.name()
    }
}

/// Builds one [`Agent`] per request
pub struct AgentFactory {
    resolver: Arc<dyn ModelResolver>,
    search: Option<Arc<dyn Tool>>,
    config: CoreConfig,
}

impl AgentFactory {
    pub fn new(resolver: Arc<dyn ModelResolver>, config: CoreConfig) -> Self {
        Self {
            resolver,
            search: None,
            config,
        }
    }

    /// Make the search capability available to requests that ask for it
    #[must_use]
    pub fn with_search(mut self, tool: Arc<dyn Tool>) -> Self {
        self.search = Some(tool);
        self
    }

    pub const fn search_configured(&self) -> bool {
        self.search.is_some()
    }

    pub fn backend_name(&self) -> &str {
        self.resolver.backend_name()
    }

    pub const fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Assemble the agent for a validated request
    pub fn build(&self, request: &ChatRequest) -> Result<Agent> {
        // Tool availability is settled before any backend handle is acquired.
        let search = if request.allow_search {
            let tool = self.search.clone().ok_or_else(|| {
                AgentError::ToolUnavailable("search was requested but no search credential is configured".into())
            })?;
            Some(tool)
        } else {
            None
        };

        let provider = self.resolver.resolve(&request.model_name)?;

        let instruction = if request.system_prompt.trim().is_empty() {
            DEFAULT_SYSTEM_PROMPT.to_string()
        } else {
            request.system_prompt.clone()
        };

        let mut builder = AgentBuilder::new()
            .provider(provider)
            .system_prompt(instruction)
            .model(request.model_name.as_str())
            .max_iterations(self.config.max_iterations)
            .model_timeout(self.config.model_timeout());

        if let Some(tool) = search {
            builder = builder.tool_arc(tool);
        }

        builder.build()
    }
}
