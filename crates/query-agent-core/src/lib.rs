//! # query-agent-core
//!
//! Orchestration core for answering queries with a ReAct agent.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                           ChatService                                │
//! │  ┌───────────┐   ┌──────────────┐   ┌─────────────┐   ┌───────────┐  │
//! │  │ Validator │──▶│ AgentFactory │──▶│  Reasoning  │──▶│ Extractor │  │
//! │  └───────────┘   └──────────────┘   │    Loop     │   └───────────┘  │
//! │                     │        │      └─────────────┘                  │
//! │            ModelResolver  ToolRegistry                               │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every request is independent: the agent, its tool registry and the
//! conversation state are built for one run and dropped with it. The
//! `LlmProvider` trait keeps the loop independent of the model backend.

pub mod config;
pub mod context;
pub mod error;
pub mod factory;
pub mod message;
pub mod mock;
pub mod provider;
pub mod reasoning;
pub mod request;
pub mod response;
pub mod service;
pub mod tool;

pub use config::CoreConfig;
pub use context::RunContext;
pub use error::{AgentError, Result, RunFailure, Stage};
pub use factory::{AgentFactory, FixedResolver, ModelResolver};
pub use message::{Conversation, Message, Role};
pub use provider::{Completion, GenerationOptions, LlmProvider};
pub use reasoning::{Agent, AgentBuilder, AgentConfig, ConversationState, RunState};
pub use request::{AllowedModels, ChatRequest, ChatResponse};
pub use response::extract_response;
pub use service::ChatService;
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult, ToolSchema};
