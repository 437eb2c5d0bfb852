//! Runtime settings.
//!
//! Settings come from the process environment (a `.env` file is honoured) or
//! from a camelCase JSON document, and are validated before any client is
//! built from them.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::agents::errors::{AgentError, AgentResult};
use crate::llm::{DEFAULT_BASE_URL, DEFAULT_MODEL};

pub const DEFAULT_MAX_TOKENS: u32 = 256;
pub const DEFAULT_PLAN_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
pub const DEFAULT_PREAMBLE: &str = "You are part of a team of cooperating AI agents. \
    Answer precisely and stay within the scope of the task you are given.";

/// Environment variable naming a JSON settings file
pub const CONFIG_PATH_VAR: &str = "AGENT_SWARM_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    /// Token budget for worker calls
    pub max_tokens: u32,
    /// Token budget for the plan-determination call
    pub plan_max_tokens: u32,
    pub preamble: String,
    pub request_timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    /// Deadline for a whole delegation round; unset means none
    pub round_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            plan_max_tokens: DEFAULT_PLAN_MAX_TOKENS,
            preamble: DEFAULT_PREAMBLE.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            round_timeout_secs: None,
        }
    }
}

impl Config {
    /// Load from the JSON file named by `AGENT_SWARM_CONFIG`, else from the environment
    pub fn load() -> AgentResult<Self> {
        match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) if !path.is_empty() => Self::from_json_file(path),
            _ => Self::from_env(),
        }
    }

    pub fn from_env() -> AgentResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup using the environment variable names
    pub fn from_lookup<F>(lookup: F) -> AgentResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_key = lookup("LLM_API_KEY")
            .ok_or_else(|| AgentError::ConfigError("LLM_API_KEY must be set".to_string()))?;

        let config = Self {
            api_key,
            base_url: lookup("LLM_BASE_URL").unwrap_or(defaults.base_url),
            model: lookup("LLM_MODEL").unwrap_or(defaults.model),
            max_tokens: parse_or(&lookup, "LLM_MAX_TOKENS", defaults.max_tokens)?,
            plan_max_tokens: parse_or(&lookup, "PLAN_MAX_TOKENS", defaults.plan_max_tokens)?,
            preamble: lookup("AGENT_PREAMBLE").unwrap_or(defaults.preamble),
            request_timeout_secs: parse_or(
                &lookup,
                "LLM_TIMEOUT_SECS",
                defaults.request_timeout_secs,
            )?,
            max_attempts: parse_or(&lookup, "LLM_MAX_ATTEMPTS", defaults.max_attempts)?,
            retry_delay_ms: parse_or(&lookup, "LLM_RETRY_DELAY_MS", defaults.retry_delay_ms)?,
            round_timeout_secs: lookup("ROUND_TIMEOUT_SECS")
                .map(|raw| parse_value("ROUND_TIMEOUT_SECS", &raw))
                .transpose()?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> AgentResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AgentError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> AgentResult<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| AgentError::ConfigError(format!("invalid JSON settings: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AgentResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(AgentError::ConfigError("API key cannot be empty".to_string()));
        }
        if self.base_url.trim().is_empty() {
            return Err(AgentError::ConfigError("base URL cannot be empty".to_string()));
        }
        if self.model.trim().is_empty() {
            return Err(AgentError::ConfigError("model cannot be empty".to_string()));
        }
        if self.max_tokens == 0 || self.plan_max_tokens == 0 {
            return Err(AgentError::ConfigError(
                "token budgets must be positive".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(AgentError::ConfigError(
                "request timeout must be positive".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(AgentError::ConfigError(
                "max attempts must be at least 1".to_string(),
            ));
        }
        if self.round_timeout_secs == Some(0) {
            return Err(AgentError::ConfigError(
                "round timeout must be positive when set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn round_timeout(&self) -> Option<Duration> {
        self.round_timeout_secs.map(Duration::from_secs)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> AgentResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> AgentResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| AgentError::ConfigError(format!("{} must be a valid number, got '{}'", key, raw)))
}
