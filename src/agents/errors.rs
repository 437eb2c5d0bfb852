use thiserror::Error;

use crate::llm::LlmError;

/// Errors that can occur in the agent system
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("LLM API error: {0}")]
    LlmError(#[from] LlmError),

    #[error("Model returned no output")]
    EmptyOutput,

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Reasons a model response could not be turned into an execution plan
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("no braced JSON object found in response")]
    NoStructuredData,

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("plan is not a JSON object")]
    NotAnObject,

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
}
