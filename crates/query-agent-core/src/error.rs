//! Error Types

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::reasoning::RunState;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// Request rejected before any backend work
    #[error("Validation error on `{field}`: {message}")]
    Validation {
        field: &'static str,
        message: String,
        /// Allowed model identifiers, populated when `field == "model_name"`
        allowed: Vec<String>,
    },

    /// Model backend cannot be reached or initialized
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Search requested but no search capability is configured
    #[error("Tool unavailable: {0}")]
    ToolUnavailable(String),

    /// LLM provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Model call exceeded its time bound
    #[error("Model call timed out after {0}s")]
    ModelTimeout(u64),

    /// Model requested a tool outside the agent's configured set
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Tool validation failed
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Tool execution failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Maximum iterations reached in reasoning loop
    #[error("Maximum iterations ({0}) reached")]
    MaxIterations(usize),

    /// Run aborted at a transition boundary
    #[error("Run cancelled")]
    Cancelled,

    /// Extraction attempted on a state that is not `Done`
    #[error("Conversation state is not terminal: {0}")]
    NotTerminal(RunState),

    /// Parse error (e.g., provider payload)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A failure wrapped with the stage and state it happened in
    #[error(transparent)]
    Run(Box<RunFailure>),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Build a model-name rejection carrying the allowed set
    pub fn invalid_model(model: &str, allowed: &[String]) -> Self {
        AgentError::Validation {
            field: "model_name",
            message: format!(
                "model '{}' is not allowed; choose one of: {}",
                model,
                allowed.join(", ")
            ),
            allowed: allowed.to_vec(),
        }
    }

    /// Wrap this error with its originating stage and state
    pub fn at(self, stage: Stage, state: Option<RunState>, request_id: Uuid) -> Self {
        AgentError::Run(Box::new(RunFailure {
            stage,
            state,
            iteration: 0,
            request_id,
            cause: self,
        }))
    }

    /// The originating error, with any `Run` wrapping removed
    pub fn root(&self) -> &AgentError {
        match self {
            AgentError::Run(failure) => failure.cause.root(),
            other => other,
        }
    }

    /// Stage/state context, if the error was wrapped
    pub fn failure(&self) -> Option<&RunFailure> {
        match self {
            AgentError::Run(failure) => Some(failure),
            _ => None,
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.root(),
            AgentError::BackendUnavailable(_)
                | AgentError::ModelTimeout(_)
                | AgentError::Io(_)
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self.root() {
            AgentError::Validation { message, .. } => format!("Invalid request: {}", message),
            AgentError::BackendUnavailable(_) => "The AI service is currently unavailable. Please try again.".into(),
            AgentError::ToolUnavailable(_) => "Web search is not available on this server.".into(),
            AgentError::Provider(msg) => format!("The AI service encountered an error: {}", msg),
            AgentError::ModelTimeout(_) => "The AI service took too long to respond. Please try again.".into(),
            AgentError::UnknownTool(name) => format!("The tool '{}' is not available.", name),
            AgentError::MaxIterations(_) => "The request took too long to process. Please try a simpler query.".into(),
            AgentError::Cancelled => "The request was cancelled.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Other(err.to_string())
    }
}

impl From<RunFailure> for AgentError {
    fn from(failure: RunFailure) -> Self {
        AgentError::Run(Box::new(failure))
    }
}

/// Pipeline component an error originated in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validator,
    AgentFactory,
    ExecutionEngine,
    ResponseExtractor,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Validator => write!(f, "validator"),
            Stage::AgentFactory => write!(f, "agent_factory"),
            Stage::ExecutionEngine => write!(f, "execution_engine"),
            Stage::ResponseExtractor => write!(f, "response_extractor"),
        }
    }
}

/// Fatal failure of one request, with where and when it happened
#[derive(Error, Debug)]
pub struct RunFailure {
    pub stage: Stage,
    /// Engine state at failure; `None` before the loop started
    pub state: Option<RunState>,
    /// Completed think-act-observe cycles
    pub iteration: usize,
    pub request_id: Uuid,
    #[source]
    pub cause: AgentError,
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state {
            Some(state) => write!(
                f,
                "{} failed in {} after {} iteration(s): {}",
                self.stage, state, self.iteration, self.cause
            ),
            None => write!(f, "{} failed: {}", self.stage, self.cause),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_model_lists_allowed() {
        let allowed = vec!["llama3-70b-8192".to_string(), "mixtral-8x7b-32768".to_string()];
        let err = AgentError::invalid_model("gpt-x", &allowed);

        assert!(err.to_string().contains("llama3-70b-8192"));
        match err {
            AgentError::Validation { field, allowed: listed, .. } => {
                assert_eq!(field, "model_name");
                assert_eq!(listed, allowed);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_wrapped_error_keeps_root() {
        let id = Uuid::new_v4();
        let err = AgentError::MaxIterations(3).at(Stage::ExecutionEngine, Some(RunState::Thinking), id);

        assert!(matches!(err.root(), AgentError::MaxIterations(3)));
        let failure = err.failure().unwrap();
        assert_eq!(failure.stage, Stage::ExecutionEngine);
        assert_eq!(failure.request_id, id);
        assert!(err.to_string().contains("execution_engine failed in thinking"));
        assert!(err.user_message().contains("simpler query"));
    }

    #[test]
    fn test_retryable() {
        assert!(AgentError::BackendUnavailable("down".into()).is_retryable());
        assert!(!AgentError::UnknownTool("x".into()).is_retryable());
    }
}
