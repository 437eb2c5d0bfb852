//! Failure taxonomy for a single completion attempt.

use std::time::Duration;

use thiserror::Error;

/// Why one attempt against the text-generation backend produced no text.
///
/// Every variant counts as a failed attempt for retry purposes.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("prompt is empty")]
    EmptyPrompt,

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response body: {0}")]
    MalformedBody(String),

    #[error("response has no `{0}` field")]
    MissingField(&'static str),
}

impl LlmError {
    /// HTTP status code, if the backend answered at all
    pub fn status_code(&self) -> Option<u16> {
        match self {
            LlmError::Status { status, .. } => Some(*status),
            LlmError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
