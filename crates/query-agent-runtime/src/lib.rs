//! # query-agent-runtime
//!
//! Concrete backends for query-agent.
//!
//! ## Providers
//!
//! - **Groq** (default): OpenAI-compatible chat completions over HTTPS
//! - **Ollama**: Local inference via Ollama's `/api/chat`
//!
//! ## Tools
//!
//! - **web_search**: Tavily search, offered only when `TAVILY_API_KEY` is set
//!
//! ## Usage
//!
//! ```rust,ignore
//! use query_agent_runtime::{BackendRouter, RuntimeConfig, WebSearchTool};
//!
//! let runtime = RuntimeConfig::from_env()?;
//! let router = BackendRouter::from_config(&runtime, core.model_timeout());
//! let mut factory = AgentFactory::new(Arc::new(router), core.clone());
//! if let Some(search) = WebSearchTool::from_config(&runtime, &core) {
//!     factory = factory.with_search(Arc::new(search));
//! }
//! ```

pub mod config;
pub mod groq;
#[cfg(feature = "ollama")]
pub mod ollama;
pub mod router;
pub mod search;

pub use config::{BackendKind, RuntimeConfig};
pub use groq::GroqProvider;
#[cfg(feature = "ollama")]
pub use ollama::OllamaProvider;
pub use router::BackendRouter;
pub use search::{format_results, WebSearchTool, SEARCH_TOOL_NAME};

// Re-export core types for convenience
pub use query_agent_core::{AgentError, LlmProvider, ModelResolver, Result, Tool};
