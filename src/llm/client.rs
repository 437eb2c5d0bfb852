use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::error::LlmError;
use crate::agents::events::{AgentEvent, EventSink};
use crate::config::{
    Config, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_TOKENS, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_RETRY_DELAY_MS,
};

/// A single generation request as seen by a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
}

/// One attempt against a text-generation service.
///
/// Implementations perform no retries of their own.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

/// Per-call overrides of the client's defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallOptions {
    /// Token budget; `None` uses the client's configured default
    pub max_tokens: Option<u32>,
    /// Bound on each individual attempt
    pub timeout: Duration,
    /// Total attempts, including the first one. Zero is treated as one.
    pub max_attempts: u32,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            max_tokens: None,
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl CallOptions {
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Retrying front for a [`CompletionBackend`].
///
/// Immutable after construction and shared between workers behind an `Arc`.
pub struct ModelClient {
    backend: Arc<dyn CompletionBackend>,
    events: Arc<dyn EventSink>,
    default_max_tokens: u32,
    defaults: CallOptions,
    retry_delay: Duration,
}

impl ModelClient {
    pub fn new(backend: Arc<dyn CompletionBackend>, events: Arc<dyn EventSink>) -> Self {
        Self {
            backend,
            events,
            default_max_tokens: DEFAULT_MAX_TOKENS,
            defaults: CallOptions::default(),
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }

    /// Create a client whose defaults come from validated settings
    pub fn from_config(
        backend: Arc<dyn CompletionBackend>,
        config: &Config,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self::new(backend, events)
            .with_default_max_tokens(config.max_tokens)
            .with_timeout(config.request_timeout())
            .with_max_attempts(config.max_attempts)
            .with_retry_delay(config.retry_delay())
    }

    pub fn with_default_max_tokens(mut self, max_tokens: u32) -> Self {
        self.default_max_tokens = max_tokens;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.defaults.timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.defaults.max_attempts = max_attempts;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// The options used by [`ModelClient::call`]
    pub fn options(&self) -> CallOptions {
        self.defaults
    }

    /// Generate text with the client's default options.
    pub async fn call(&self, prompt: &str) -> String {
        self.call_with(prompt, &self.defaults).await
    }

    /// Generate text, degrading to an empty string when every attempt fails.
    ///
    /// Never returns an error: an unreachable backend must not abort a
    /// delegation round.
    pub async fn call_with(&self, prompt: &str, options: &CallOptions) -> String {
        self.try_call_with(prompt, options).await.unwrap_or_default()
    }

    /// Generate text, returning the last attempt's error once attempts run out.
    ///
    /// Retries on every [`LlmError`], including a 2xx body without the output
    /// field, with a fixed delay between attempts.
    pub async fn try_call_with(
        &self,
        prompt: &str,
        options: &CallOptions,
    ) -> Result<String, LlmError> {
        if prompt.trim().is_empty() {
            let error = LlmError::EmptyPrompt;
            self.events.emit(&AgentEvent::CallFailed {
                attempts: 0,
                error: error.to_string(),
            });
            return Err(error);
        }

        let max_attempts = options.max_attempts.max(1);
        let request = CompletionRequest {
            prompt: prompt.to_string(),
            max_tokens: options.max_tokens.unwrap_or(self.default_max_tokens),
        };

        let mut attempt = 1;
        loop {
            let outcome =
                match tokio::time::timeout(options.timeout, self.backend.complete(&request)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(LlmError::Timeout(options.timeout)),
                };

            let error = match outcome {
                Ok(text) => {
                    if attempt > 1 {
                        tracing::debug!(attempt, "Completion succeeded after retry");
                    }
                    return Ok(text);
                }
                Err(error) => error,
            };

            self.events.emit(&AgentEvent::AttemptFailed {
                attempt,
                max_attempts,
                status: error.status_code(),
                error: error.to_string(),
            });

            if attempt >= max_attempts {
                self.events.emit(&AgentEvent::CallFailed {
                    attempts: attempt,
                    error: error.to_string(),
                });
                return Err(error);
            }

            tokio::time::sleep(self.retry_delay).await;
            attempt += 1;
        }
    }
}
