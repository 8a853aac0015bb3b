//! Core configuration
//!
//! Read-only inputs for request validation, agent assembly and the
//! reasoning loop. Loaded once at startup by the embedding process.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, Result};
use crate::request::AllowedModels;

/// Models accepted when `ALLOWED_MODELS` is unset
pub const DEFAULT_ALLOWED_MODELS: &[&str] = &["llama3-70b-8192", "mixtral-8x7b-32768"];

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default = "default_allowed_models")]
    pub allowed_models: AllowedModels,

    /// Think-act-observe cycle bound per run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    #[serde(default = "default_model_timeout_secs")]
    pub model_timeout_secs: u64,

    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    /// Results requested from the search backend per call
    #[serde(default = "default_search_max_results")]
    pub search_max_results: u32,
}

fn default_allowed_models() -> AllowedModels {
    AllowedModels::new(DEFAULT_ALLOWED_MODELS.iter().copied())
}
const fn default_max_iterations() -> usize { 10 }
const fn default_model_timeout_secs() -> u64 { 120 }
const fn default_tool_timeout_secs() -> u64 { 30 }
const fn default_search_max_results() -> u32 { 5 }

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            allowed_models: default_allowed_models(),
            max_iterations: default_max_iterations(),
            model_timeout_secs: default_model_timeout_secs(),
            tool_timeout_secs: default_tool_timeout_secs(),
            search_max_results: default_search_max_results(),
        }
    }
}

impl CoreConfig {
    /// Load from process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from any key lookup; unset keys keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(models) = lookup("ALLOWED_MODELS") {
            config.allowed_models = AllowedModels::new(models.split(','));
        }
        if let Some(value) = lookup("MAX_ITERATIONS") {
            config.max_iterations = parse_number("MAX_ITERATIONS", &value)?;
        }
        if let Some(value) = lookup("MODEL_TIMEOUT_SECS") {
            config.model_timeout_secs = parse_number("MODEL_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = lookup("TOOL_TIMEOUT_SECS") {
            config.tool_timeout_secs = parse_number("TOOL_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = lookup("SEARCH_MAX_RESULTS") {
            config.search_max_results = parse_number("SEARCH_MAX_RESULTS", &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make every request fail
    pub fn validate(&self) -> Result<()> {
        if self.allowed_models.is_empty() {
            return Err(AgentError::Config("allowed model list is empty".into()));
        }
        if self.model_timeout_secs == 0 || self.tool_timeout_secs == 0 {
            return Err(AgentError::Config("timeouts must be at least one second".into()));
        }
        Ok(())
    }

    pub const fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub const fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AgentError::Config(format!("{} must be a non-negative integer, got '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = CoreConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.model_timeout(), Duration::from_secs(120));
        assert_eq!(config.tool_timeout(), Duration::from_secs(30));
        assert!(config.allowed_models.contains("llama3-70b-8192"));
    }

    #[test]
    fn test_overrides() {
        let config = CoreConfig::from_lookup(lookup(&[
            ("ALLOWED_MODELS", "llama3-8b-8192, gemma-7b-it"),
            ("MAX_ITERATIONS", "4"),
            ("TOOL_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.allowed_models.as_slice(), ["llama3-8b-8192", "gemma-7b-it"]);
        assert_eq!(config.max_iterations, 4);
        assert_eq!(config.tool_timeout_secs, 5);
    }

    #[test]
    fn test_invalid_number() {
        let err = CoreConfig::from_lookup(lookup(&[("MAX_ITERATIONS", "lots")])).unwrap_err();
        assert!(matches!(err, AgentError::Config(msg) if msg.contains("MAX_ITERATIONS")));
    }

    #[test]
    fn test_empty_allow_list_rejected() {
        let err = CoreConfig::from_lookup(lookup(&[("ALLOWED_MODELS", " , ")])).unwrap_err();
        assert!(matches!(err, AgentError::Config(_)));
    }
}
