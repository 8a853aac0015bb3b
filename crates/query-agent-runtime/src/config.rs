//! Backend and search credentials
//!
//! Presence of `TAVILY_API_KEY` decides whether search is offered at all.

use query_agent_core::{AgentError, Result};

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const TAVILY_BASE_URL: &str = "https://api.tavily.com";

/// Which model backend serves requests
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Groq,
    Ollama,
}

impl std::str::FromStr for BackendKind {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "ollama" => Ok(Self::Ollama),
            other => Err(AgentError::Config(format!(
                "unknown LLM_BACKEND '{}' (expected 'groq' or 'ollama')",
                other
            ))),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Groq => write!(f, "groq"),
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub backend: BackendKind,
    pub groq_api_key: Option<String>,
    pub groq_base_url: String,
    pub ollama_host: String,
    pub ollama_port: u16,
    pub tavily_api_key: Option<String>,
    pub tavily_base_url: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Groq,
            groq_api_key: None,
            groq_base_url: GROQ_BASE_URL.into(),
            ollama_host: "http://localhost".into(),
            ollama_port: 11434,
            tavily_api_key: None,
            tavily_base_url: TAVILY_BASE_URL.into(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(backend) = non_empty("LLM_BACKEND") {
            config.backend = backend.parse()?;
        }
        config.groq_api_key = non_empty("GROQ_API_KEY");
        if let Some(url) = non_empty("GROQ_BASE_URL") {
            config.groq_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(host) = non_empty("OLLAMA_HOST") {
            config.ollama_host = host.trim_end_matches('/').to_string();
        }
        if let Some(port) = non_empty("OLLAMA_PORT") {
            config.ollama_port = port
                .trim()
                .parse()
                .map_err(|_| AgentError::Config(format!("OLLAMA_PORT must be a port number, got '{}'", port)))?;
        }
        config.tavily_api_key = non_empty("TAVILY_API_KEY");
        if let Some(url) = non_empty("TAVILY_BASE_URL") {
            config.tavily_base_url = url.trim_end_matches('/').to_string();
        }

        Ok(config)
    }

    pub const fn search_configured(&self) -> bool {
        self.tavily_api_key.is_some()
    }
}
