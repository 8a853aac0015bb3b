//! Server configuration, read once at startup

use query_agent_core::{CoreConfig, Result};
use query_agent_runtime::RuntimeConfig;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub core: CoreConfig,
    pub runtime: RuntimeConfig,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("BIND_ADDR")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.into());

        Ok(Self {
            bind_addr,
            core: CoreConfig::from_lookup(&lookup)?,
            runtime: RuntimeConfig::from_lookup(&lookup)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.core.max_iterations, 10);
        assert!(!config.runtime.search_configured());
    }

    #[test]
    fn test_bad_number_fails_startup() {
        let lookup = |key: &str| (key == "MAX_ITERATIONS").then(|| "many".to_string());
        assert!(ServerConfig::from_lookup(lookup).is_err());
    }
}
