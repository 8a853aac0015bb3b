//! Reasoning Loop
//!
//! Implements the ReAct (Reason + Act) pattern as an explicit state machine:
//!
//! ```text
//!   THINKING ──answer──▶ DONE
//!      │  ▲
//!  tool│  │
//!      ▼  │
//!   ACTING ──▶ OBSERVING
//!
//!   any state ──fatal──▶ FAILED
//! ```
//!
//! A run is strictly sequential. Tool failures become observations for the
//! model; only an unknown tool, a model failure, cancellation or the
//! iteration bound end a run in `FAILED`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::context::RunContext;
use crate::error::{AgentError, Result, RunFailure, Stage};
use crate::message::{Conversation, Message};
use crate::provider::{Completion, GenerationOptions, LlmProvider};
use crate::response::extract_response;
use crate::tool::{Tool, ToolCall, ToolRegistry, ToolResult};

/// Default think-act-observe cycle bound
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Default bound on a single model call
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(120);

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Instruction shaping the model's behavior
    pub system_prompt: String,

    /// Maximum tool cycles before giving up
    pub max_iterations: usize,

    /// Upper bound on each model call
    pub model_timeout: Duration,

    /// Generation options
    pub generation: GenerationOptions,

    /// Whether to append tool descriptions to system prompt
    pub inject_tool_descriptions: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            model_timeout: DEFAULT_MODEL_TIMEOUT,
            generation: GenerationOptions::default(),
            inject_tool_descriptions: true,
        }
    }
}

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant. Be concise and accurate.";

/// State of one reasoning run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Thinking,
    Acting,
    Observing,
    Done,
    Failed,
}

impl RunState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Thinking => write!(f, "thinking"),
            RunState::Acting => write!(f, "acting"),
            RunState::Observing => write!(f, "observing"),
            RunState::Done => write!(f, "done"),
            RunState::Failed => write!(f, "failed"),
        }
    }
}

/// What the model decided in one THINKING step
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    ToolCall(ToolCall),
    FinalAnswer(String),
}

/// Record of one loop iteration
#[derive(Clone, Debug)]
pub struct ReasoningStep {
    /// 1-based THINKING step number
    pub iteration: usize,
    /// Text the model produced alongside a tool call
    pub thought: Option<String>,
    pub action: Action,
    /// Present only after a tool action
    pub observation: Option<String>,
}

/// Everything one run accumulates; owned by that run alone
#[derive(Clone, Debug)]
pub struct ConversationState {
    conversation: Conversation,
    steps: Vec<ReasoningStep>,
    state: RunState,
    answer: Option<String>,
    cycles: usize,
}

impl ConversationState {
    pub const fn new(conversation: Conversation) -> Self {
        Self {
            conversation,
            steps: Vec::new(),
            state: RunState::Thinking,
            answer: None,
            cycles: 0,
        }
    }

    pub const fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn steps(&self) -> &[ReasoningStep] {
        &self.steps
    }

    pub const fn state(&self) -> RunState {
        self.state
    }

    /// Final answer recorded at the DONE transition
    pub fn answer(&self) -> Option<&str> {
        self.answer.as_deref()
    }

    /// Completed THINKING→ACTING→OBSERVING cycles
    pub const fn cycles(&self) -> usize {
        self.cycles
    }

    fn enter(&mut self, next: RunState) {
        tracing::trace!(from = %self.state, to = %next, "State transition");
        self.state = next;
    }

    fn finish(&mut self, answer: String) {
        self.steps.push(ReasoningStep {
            iteration: self.steps.len() + 1,
            thought: None,
            action: Action::FinalAnswer(answer.clone()),
            observation: None,
        });
        self.answer = Some(answer);
        self.enter(RunState::Done);
    }

    fn observe(&mut self, call: ToolCall, thought: Option<String>, observation: String) {
        self.conversation
            .push(Message::observation(observation.clone(), call.id.clone()));
        self.steps.push(ReasoningStep {
            iteration: self.steps.len() + 1,
            thought,
            action: Action::ToolCall(call),
            observation: Some(observation),
        });
        self.cycles += 1;
    }
}

/// A model handle, an instruction and a tool set, bound for one request
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            config,
        }
    }

    /// Create with default configuration
    pub fn with_defaults(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self::new(provider, tools, AgentConfig::default())
    }

    /// Build the full system prompt including tool descriptions
    pub fn build_system_prompt(&self) -> String {
        let mut prompt = self.config.system_prompt.clone();

        if self.config.inject_tool_descriptions && !self.tools.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&self.tools.generate_prompt_section());
        }

        prompt
    }

    /// Initial THINKING state for a transcript
    pub fn start(&self, transcript: &[String]) -> ConversationState {
        ConversationState::new(Conversation::from_transcript(
            self.build_system_prompt(),
            transcript,
        ))
    }

    /// Drive the loop to DONE, or fail with a wrapped [`RunFailure`]
    pub async fn run(&self, transcript: &[String], ctx: &RunContext) -> Result<ConversationState> {
        let mut state = self.start(transcript);

        loop {
            self.checkpoint(&mut state, ctx)?;

            let completion = match self.think(&state).await {
                Ok(completion) => completion,
                Err(e) => return Err(self.fail(&mut state, e, ctx)),
            };
            let content = completion.content;
            if content.trim().is_empty() {
                let cause = AgentError::Provider("empty completion".into());
                return Err(self.fail(&mut state, cause, ctx));
            }
            state.conversation.push(Message::assistant(content.as_str()));

            let Some(mut call) = self.requested_call(&content) else {
                tracing::debug!(request_id = %ctx.request_id, cycles = state.cycles, "Final answer produced");
                state.finish(content.trim().to_string());
                return Ok(state);
            };

            if state.cycles >= self.config.max_iterations {
                tracing::warn!(
                    request_id = %ctx.request_id,
                    max = self.config.max_iterations,
                    tool = %call.name,
                    "Iteration bound reached with a pending tool call"
                );
                let cause = AgentError::MaxIterations(self.config.max_iterations);
                return Err(self.fail(&mut state, cause, ctx));
            }

            call.id = Some(format!("call_{}", state.cycles + 1));
            let thought = thought_before_call(&content);

            state.enter(RunState::Acting);
            self.checkpoint(&mut state, ctx)?;

            tracing::debug!(request_id = %ctx.request_id, tool = %call.name, id = ?call.id, "Executing tool");
            let result = match self.tools.invoke(&call).await {
                Ok(result) => result,
                Err(cause) => return Err(self.fail(&mut state, cause, ctx)),
            };
            if !result.success {
                tracing::warn!(request_id = %ctx.request_id, tool = %call.name, reason = %result.output, "Tool call failed");
            }

            state.enter(RunState::Observing);
            let observation = format_observation(&result);
            state.observe(call, thought, observation);
            state.enter(RunState::Thinking);
        }
    }

    /// Run with a single question and return the answer text
    pub async fn ask(&self, question: &str) -> Result<String> {
        let state = self.run(&[question.to_string()], &RunContext::new()).await?;
        Ok(extract_response(&state)?.response)
    }

    async fn think(&self, state: &ConversationState) -> Result<Completion> {
        let call = self
            .provider
            .complete(state.conversation.messages(), &self.config.generation);

        tokio::time::timeout(self.config.model_timeout, call)
            .await
            .map_err(|_| AgentError::ModelTimeout(self.config.model_timeout.as_secs()))?
    }

    /// Fenced calls are always honored; a bare JSON object only when it
    /// names a tool this agent has.
    fn requested_call(&self, content: &str) -> Option<ToolCall> {
        parse_tool_call(content).or_else(|| {
            parse_inline_tool_call(content).filter(|call| self.tools.contains(&call.name))
        })
    }

    fn checkpoint(&self, state: &mut ConversationState, ctx: &RunContext) -> Result<()> {
        if ctx.is_cancelled() {
            return Err(self.fail(state, AgentError::Cancelled, ctx));
        }
        Ok(())
    }

    fn fail(&self, state: &mut ConversationState, cause: AgentError, ctx: &RunContext) -> AgentError {
        let at = state.state;
        state.enter(RunState::Failed);
        RunFailure {
            stage: Stage::ExecutionEngine,
            state: Some(at),
            iteration: state.cycles,
            request_id: ctx.request_id,
            cause,
        }
        .into()
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get configuration
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Backend name, for logs
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }
}

/// Format tool result as the observation fed back to the model
pub fn format_observation(result: &ToolResult) -> String {
    if result.success {
        format!("[Tool '{}' returned]\n{}", result.name, result.output)
    } else {
        format!("{} failed: {}", result.name, result.output)
    }
}

/// Parse the fenced ```` ```tool ```` block from a model reply, if any
pub fn parse_tool_call(content: &str) -> Option<ToolCall> {
    const TOOL_START: &str = "```tool";
    const TOOL_END: &str = "```";

    if let Some(start_idx) = content.find(TOOL_START) {
        let after_marker = &content[start_idx + TOOL_START.len()..];
        if let Some(end_idx) = after_marker.find(TOOL_END) {
            let json_str = after_marker[..end_idx].trim();
            if let Ok(call) = serde_json::from_str::<ToolCall>(json_str) {
                return (!call.name.is_empty()).then_some(call);
            }
        }
    }

    None
}

/// A bare JSON object carrying a `"tool"` key
pub fn parse_inline_tool_call(content: &str) -> Option<ToolCall> {
    if !content.contains(r#""tool""#) {
        return None;
    }

    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end <= start {
        return None;
    }

    serde_json::from_str::<ToolCall>(&content[start..=end])
        .ok()
        .filter(|call| !call.name.is_empty())
}

fn thought_before_call(content: &str) -> Option<String> {
    let cut = content.find("```tool").or_else(|| content.find('{'))?;
    let thought = content[..cut].trim();
    (!thought.is_empty()).then(|| thought.to_string())
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: ToolRegistry,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: ToolRegistry::new(),
            config: AgentConfig::default(),
        }
    }

    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    #[must_use]
    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.register(tool);
        self
    }

    #[must_use]
    pub fn tool_arc(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.register_arc(tool);
        self
    }

    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    #[must_use]
    pub const fn temperature(mut self, temp: f32) -> Self {
        self.config.generation.temperature = temp;
        self
    }

    #[must_use]
    pub const fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    #[must_use]
    pub const fn model_timeout(mut self, timeout: Duration) -> Self {
        self.config.model_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self.provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;

        Ok(Agent::new(provider, Arc::new(self.tools), self.config))
    }
}
