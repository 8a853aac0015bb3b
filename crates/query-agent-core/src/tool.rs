//! Tool System
//!
//! Capabilities an agent may invoke mid-reasoning. Each agent owns its own
//! [`ToolRegistry`]; the reasoning loop dispatches purely on the tool name
//! the model asks for, checked against that registry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AgentError, Result};

/// Time bound applied to a tool call unless the tool says otherwise
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// A tool invocation requested by the model
///
/// Wire form is `{"tool": "<name>", "arguments": {...}}`; `id` is assigned by
/// the loop, never by the model.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    #[serde(alias = "tool")]
    pub name: String,

    #[serde(default)]
    pub arguments: HashMap<String, serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: HashMap::new(),
            id: None,
        }
    }

    #[must_use]
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.arguments.insert(key.into(), value.into());
        self
    }

    /// `None` when absent or not a string
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments.get(key).and_then(serde_json::Value::as_str)
    }
}

/// Outcome of one invocation, success or not
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolResult {
    pub name: String,
    pub id: Option<String>,
    pub success: bool,

    /// Payload on success, reason on failure
    pub output: String,
}

impl ToolResult {
    pub fn success(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            success: true,
            output: output.into(),
        }
    }

    pub fn failure(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::success(name, reason)
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: Option<String>) -> Self {
        self.id = id;
        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    pub name: String,

    /// JSON Schema type name
    #[serde(rename = "type")]
    pub param_type: String,

    pub description: String,

    #[serde(default)]
    pub required: bool,
}

/// What the model is told about a tool
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,

    /// The model decides when to call based on this text
    pub description: String,

    pub parameters: Vec<ParameterSchema>,
}

/// A capability exposed to the model
#[async_trait]
pub trait Tool: Send + Sync {
    fn schema(&self) -> ToolSchema;

    /// Run once. Failures are returned as errors; the registry turns them
    /// into observations.
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult>;

    /// Upper bound for a single invocation
    fn timeout(&self) -> Duration {
        DEFAULT_TOOL_TIMEOUT
    }

    /// Reject calls missing required parameters
    fn validate(&self, call: &ToolCall) -> Result<()> {
        let missing = self
            .schema()
            .parameters
            .into_iter()
            .find(|p| p.required && !call.arguments.contains_key(&p.name));

        match missing {
            Some(param) => Err(AgentError::ToolValidation(format!(
                "Missing required parameter: {}",
                param.name
            ))),
            None => Ok(()),
        }
    }
}

/// Named set of tools exposed to one agent
///
/// Ordered by name so prompt generation is stable across runs.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.tools.keys()).finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    /// Register a tool shared with other registries
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let schema = tool.schema();
        self.tools.insert(schema.name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Dispatch a call under the tool's time bound.
    ///
    /// Only a name outside this registry is an error (`UnknownTool`).
    /// Validation failures, execution errors and timeouts come back as a
    /// failed [`ToolResult`] so the loop can report them to the model.
    pub async fn invoke(&self, call: &ToolCall) -> Result<ToolResult> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| AgentError::UnknownTool(call.name.clone()))?;

        let name = call.name.as_str();
        let result = match tool.validate(call) {
            Err(e) => ToolResult::failure(name, failure_reason(&e)),
            Ok(()) => match tokio::time::timeout(tool.timeout(), tool.execute(call)).await {
                Ok(Ok(result)) => result,
                Ok(Err(e)) => ToolResult::failure(name, failure_reason(&e)),
                Err(_) => ToolResult::failure(name, format!("timed out after {:?}", tool.timeout())),
            },
        };

        Ok(result.with_id(call.id.clone()))
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// System prompt section describing the tools and the call format
    pub fn generate_prompt_section(&self) -> String {
        let mut prompt = String::from("## Available Tools\n\n");
        prompt.push_str("You can use the following tools by responding with a JSON block:\n\n");
        prompt.push_str("```tool\n{\"tool\": \"tool_name\", \"arguments\": {\"arg\": \"value\"}}\n```\n\n");
        prompt.push_str("Request at most one tool per reply. When you have enough information, answer directly without a tool block.\n\n");

        for schema in self.schemas() {
            let _ = writeln!(prompt, "### {}\n{}", schema.name, schema.description);

            if !schema.parameters.is_empty() {
                prompt.push_str("**Parameters:**\n");
                for param in &schema.parameters {
                    let required = if param.required { " (required)" } else { "" };
                    let _ = writeln!(
                        prompt,
                        "- `{}` ({}){}: {}",
                        param.name, param.param_type, required, param.description
                    );
                }
            }
            prompt.push('\n');
        }

        prompt
    }
}

fn failure_reason(err: &AgentError) -> String {
    match err {
        AgentError::ToolExecution(msg) | AgentError::ToolValidation(msg) => msg.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::StubTool;

    fn registry_with(tool: StubTool) -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(tool);
        registry
    }

    #[test]
    fn test_tool_call_accepts_tool_key() {
        let call: ToolCall =
            serde_json::from_str(r#"{"tool": "web_search", "arguments": {"query": "rust"}}"#).unwrap();
        assert_eq!(call.name, "web_search");
        assert_eq!(call.str_arg("query"), Some("rust"));
        assert!(call.id.is_none());
    }

    #[test]
    fn test_registry_is_ordered() {
        let mut registry = registry_with(StubTool::new("web_search", "result"));
        registry.register(StubTool::new("calendar", "today"));

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("web_search"));
        assert!(registry.get("unknown").is_none());
        assert_eq!(registry.names(), vec!["calendar", "web_search"]);
        assert_eq!(format!("{registry:?}"), r#"["calendar", "web_search"]"#);
    }

    #[test]
    fn test_prompt_section_lists_parameters() {
        let registry = registry_with(StubTool::new("web_search", "result"));

        let section = registry.generate_prompt_section();
        assert!(section.contains("### web_search"));
        assert!(section.contains("`query` (string) (required)"));
    }

    #[tokio::test]
    async fn test_invoke_unknown_tool() {
        let err = ToolRegistry::new().invoke(&ToolCall::new("nope")).await.unwrap_err();
        assert!(matches!(err, AgentError::UnknownTool(name) if name == "nope"));
    }

    #[tokio::test]
    async fn test_invalid_arguments_become_failed_result() {
        let stub = StubTool::new("web_search", "result");
        let registry = registry_with(stub.clone());

        let result = registry.invoke(&ToolCall::new("web_search")).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.output, "Missing required parameter: query");
        assert_eq!(stub.calls(), 0);
    }

    #[tokio::test]
    async fn test_invoke_carries_call_id() {
        let registry = registry_with(StubTool::new("web_search", "result"));
        let mut call = ToolCall::new("web_search").with_arg("query", "x");
        call.id = Some("call_1".into());

        let result = registry.invoke(&call).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output, "result");
        assert_eq!(result.id.as_deref(), Some("call_1"));
    }

    #[tokio::test]
    async fn test_execution_error_becomes_failed_result() {
        let registry = registry_with(StubTool::failing("web_search", "HTTP 502"));
        let call = ToolCall::new("web_search").with_arg("query", "x");

        let result = registry.invoke(&call).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.output, "HTTP 502");
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_tool_times_out() {
        let registry = registry_with(StubTool::hanging("web_search").with_timeout(Duration::from_secs(3)));
        let call = ToolCall::new("web_search").with_arg("query", "x");

        let result = registry.invoke(&call).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.output, "timed out after 3s");
    }
}
