//! Backend selection
//!
//! The configured backend is initialized once at startup. A backend that
//! cannot be initialized (missing credentials, bad client setup) does not
//! stop the process; every request for it fails with `BackendUnavailable`
//! instead.

use std::sync::Arc;
use std::time::Duration;

use query_agent_core::{AgentError, LlmProvider, ModelResolver, Result};

use crate::config::{BackendKind, RuntimeConfig};
use crate::groq::{GroqConfig, GroqProvider};
#[cfg(feature = "ollama")]
use crate::ollama::{OllamaConfig, OllamaProvider};

enum Backend {
    Ready(Arc<dyn LlmProvider>),
    Unavailable(String),
}

/// Resolves every allowed model to the configured backend
pub struct BackendRouter {
    kind: BackendKind,
    backend: Backend,
}

impl BackendRouter {
    pub fn from_config(config: &RuntimeConfig, model_timeout: Duration) -> Self {
        let timeout_secs = model_timeout.as_secs().max(1);
        let backend = match Self::connect(config, timeout_secs) {
            Ok(provider) => {
                tracing::info!(backend = %config.backend, provider = provider.name(), "model backend ready");
                Backend::Ready(provider)
            }
            Err(e) => {
                tracing::warn!(backend = %config.backend, error = %e, "model backend unavailable");
                Backend::Unavailable(e.to_string())
            }
        };

        Self {
            kind: config.backend,
            backend,
        }
    }

    /// Wrap an already constructed provider
    pub fn with_provider(kind: BackendKind, provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            kind,
            backend: Backend::Ready(provider),
        }
    }

    fn connect(config: &RuntimeConfig, timeout_secs: u64) -> Result<Arc<dyn LlmProvider>> {
        match config.backend {
            BackendKind::Groq => {
                let api_key = config
                    .groq_api_key
                    .clone()
                    .ok_or_else(|| AgentError::BackendUnavailable("GROQ_API_KEY is not set".into()))?;
                let provider = GroqProvider::from_config(GroqConfig {
                    api_key,
                    base_url: config.groq_base_url.clone(),
                    timeout_secs,
                })?;
                Ok(Arc::new(provider))
            }
            #[cfg(feature = "ollama")]
            BackendKind::Ollama => {
                let provider = OllamaProvider::from_config(OllamaConfig {
                    host: config.ollama_host.clone(),
                    port: config.ollama_port,
                    timeout_secs,
                })?;
                Ok(Arc::new(provider))
            }
            #[cfg(not(feature = "ollama"))]
            BackendKind::Ollama => Err(AgentError::BackendUnavailable(
                "built without the 'ollama' feature".into(),
            )),
        }
    }

    pub const fn kind(&self) -> BackendKind {
        self.kind
    }

    pub const fn is_available(&self) -> bool {
        matches!(self.backend, Backend::Ready(_))
    }

    /// The initialized provider, if any
    pub const fn provider(&self) -> Option<&Arc<dyn LlmProvider>> {
        match &self.backend {
            Backend::Ready(provider) => Some(provider),
            Backend::Unavailable(_) => None,
        }
    }
}

impl ModelResolver for BackendRouter {
    fn resolve(&self, model_name: &str) -> Result<Arc<dyn LlmProvider>> {
        match &self.backend {
            Backend::Ready(provider) => Ok(provider.clone()),
            Backend::Unavailable(reason) => Err(AgentError::BackendUnavailable(format!(
                "{} backend cannot serve '{}': {}",
                self.kind, model_name, reason
            ))),
        }
    }

    fn backend_name(&self) -> &str {
        match self.kind {
            BackendKind::Groq => "groq",
            BackendKind::Ollama => "ollama",
        }
    }
}
