//! Web Search Tool
//!
//! Queries the Tavily search API and renders the hits as plain text for the
//! model to read as an observation.

use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use query_agent_core::{
    error::{AgentError, Result},
    tool::ParameterSchema,
    CoreConfig, Tool, ToolCall, ToolResult, ToolSchema,
};

use crate::config::RuntimeConfig;

pub const SEARCH_TOOL_NAME: &str = "web_search";

/// Observation returned when the backend finds nothing
pub const NO_RESULTS: &str = "No results found.";

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: u32,
    search_depth: &'static str,
    include_answer: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
}

/// Render search hits as an observation
pub fn format_results(response: &SearchResponse) -> String {
    let answer = response.answer.as_deref().map(str::trim).filter(|a| !a.is_empty());
    if response.results.is_empty() && answer.is_none() {
        return NO_RESULTS.to_string();
    }

    let mut output = String::new();
    if let Some(answer) = answer {
        let _ = writeln!(output, "Summary: {}\n", answer);
    }
    for (i, hit) in response.results.iter().enumerate() {
        let _ = writeln!(output, "{}. {}\n   {}\n   {}", i + 1, hit.title.trim(), hit.url, hit.content.trim());
    }
    output.trim_end().to_string()
}

/// Tavily-backed web search
pub struct WebSearchTool {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    max_results: u32,
    timeout: Duration,
}

impl WebSearchTool {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, max_results: u32, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
            max_results,
            timeout,
        }
    }

    /// Build from configuration; `None` when no search credential is set
    pub fn from_config(runtime: &RuntimeConfig, core: &CoreConfig) -> Option<Self> {
        runtime.tavily_api_key.as_ref().map(|key| {
            Self::new(
                key.clone(),
                runtime.tavily_base_url.clone(),
                core.search_max_results,
                core.tool_timeout(),
            )
        })
    }

    async fn search(&self, query: &str) -> Result<SearchResponse> {
        let request = SearchRequest {
            api_key: &self.api_key,
            query,
            max_results: self.max_results,
            search_depth: "basic",
            include_answer: true,
        };

        let response = self
            .client
            .post(format!("{}/search", self.base_url.trim_end_matches('/')))
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::ToolExecution(format!("search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::ToolExecution(format!("search backend returned {}", status)));
        }

        response
            .json()
            .await
            .map_err(|e| AgentError::ToolExecution(format!("malformed search response: {}", e)))
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: SEARCH_TOOL_NAME.into(),
            description: "Search the web for current information. Returns titles, links and snippets.".into(),
            parameters: vec![ParameterSchema {
                name: "query".into(),
                param_type: "string".into(),
                description: "Search query".into(),
                required: true,
            }],
        }
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn validate(&self, call: &ToolCall) -> Result<()> {
        match call.str_arg("query") {
            Some(q) if !q.trim().is_empty() => Ok(()),
            _ => Err(AgentError::ToolValidation("query must be a non-empty string".into())),
        }
    }

    async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let query = call.str_arg("query").unwrap_or_default().trim();
        tracing::debug!(query, "web search");

        let response = self.search(query).await?;
        tracing::debug!(hits = response.results.len(), "web search complete");

        Ok(ToolResult::success(SEARCH_TOOL_NAME, format_results(&response)))
    }
}
