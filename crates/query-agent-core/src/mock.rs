//! Deterministic stand-ins for model backends and tools.
//!
//! Used by the test suites and for running the service without credentials.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::provider::{Completion, GenerationOptions, LlmProvider, ModelInfo};
use crate::tool::{ParameterSchema, Tool, ToolCall, ToolResult, ToolSchema, DEFAULT_TOOL_TIMEOUT};

/// Provider that replays a fixed script of replies.
///
/// Reply `n` answers the `n`th completion; once exhausted the last reply repeats.
pub struct ScriptedProvider {
    replies: Vec<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedProvider {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: replies.into_iter().map(Into::into).collect(),
            delay: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Sleep before every reply
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of completions requested so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Conversations passed to each completion, in order
    pub fn seen(&self) -> Vec<Vec<Message>> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// A fenced tool call block the reasoning loop understands
    pub fn tool_call(name: &str, query: &str) -> String {
        format!(
            "I should look this up.\n```tool\n{}\n```",
            serde_json::json!({"tool": name, "arguments": {"query": query}})
        )
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "Scripted"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(messages.to_vec());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = self
            .replies
            .get(index)
            .or_else(|| self.replies.last())
            .ok_or_else(|| AgentError::Provider("script is empty".into()))?;

        Ok(Completion::text(reply.clone(), options.model.clone()))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(Vec::new())
    }
}

/// How a [`StubTool`] responds
#[derive(Clone, Debug)]
pub enum StubBehavior {
    /// Succeed with this output
    Reply(String),
    /// Fail with a tool execution error
    Fail(String),
    /// Never complete
    Hang,
}

/// Tool with a fixed behavior and an invocation counter
#[derive(Clone)]
pub struct StubTool {
    name: String,
    behavior: StubBehavior,
    timeout: Duration,
    calls: Arc<AtomicUsize>,
    cancel: Option<CancellationToken>,
}

impl StubTool {
    pub fn new(name: impl Into<String>, output: impl Into<String>) -> Self {
        Self::with_behavior(name, StubBehavior::Reply(output.into()))
    }

    pub fn failing(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::with_behavior(name, StubBehavior::Fail(reason.into()))
    }

    pub fn hanging(name: impl Into<String>) -> Self {
        Self::with_behavior(name, StubBehavior::Hang)
    }

    pub fn with_behavior(name: impl Into<String>, behavior: StubBehavior) -> Self {
        Self {
            name: name.into(),
            behavior,
            timeout: DEFAULT_TOOL_TIMEOUT,
            calls: Arc::new(AtomicUsize::new(0)),
            cancel: None,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Cancel `token` from inside each execution, before responding
    #[must_use]
    pub fn cancelling(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Invocations across every clone of this tool
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for StubTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name.clone(),
            description: format!("Stub capability '{}'", self.name),
            parameters: vec![ParameterSchema {
                name: "query".into(),
                param_type: "string".into(),
                description: "Free-text query".into(),
                required: true,
            }],
        }
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn execute(&self, _call: &ToolCall) -> Result<ToolResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = &self.cancel {
            token.cancel();
        }
        match &self.behavior {
            StubBehavior::Reply(output) => Ok(ToolResult::success(self.name.clone(), output.clone())),
            StubBehavior::Fail(reason) => Err(AgentError::ToolExecution(reason.clone())),
            StubBehavior::Hang => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_repeats_last_reply() {
        let provider = ScriptedProvider::new(["one", "two"]);
        let opts = GenerationOptions::default();

        let replies = [
            provider.complete(&[], &opts).await.unwrap().content,
            provider.complete(&[], &opts).await.unwrap().content,
            provider.complete(&[], &opts).await.unwrap().content,
        ];
        assert_eq!(replies, ["one", "two", "two"]);
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_empty_script_is_provider_error() {
        let provider = ScriptedProvider::new(Vec::<String>::new());
        let err = provider.complete(&[], &GenerationOptions::default()).await.unwrap_err();
        assert!(matches!(err, AgentError::Provider(_)));
    }

    #[tokio::test]
    async fn test_stub_tool_counts_across_clones() {
        let tool = StubTool::failing("web_search", "offline");
        let clone = tool.clone();

        assert!(clone.execute(&ToolCall::new("web_search")).await.is_err());
        assert_eq!(tool.calls(), 1);
    }
}
