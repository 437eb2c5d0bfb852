use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};

use super::client::{CompletionBackend, CompletionRequest};
use super::error::LlmError;
use crate::agents::errors::{AgentError, AgentResult};
use crate::config::Config;

pub const DEFAULT_BASE_URL: &str = "https://api.mistral.ai";
pub const DEFAULT_MODEL: &str = "codestral-22b";

const GENERATE_PATH: &str = "/v1/generate";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    generated_text: Option<String>,
}

/// Text-generation backend speaking the `/v1/generate` JSON protocol
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    endpoint: String,
    model: String,
}

impl HttpBackend {
    /// `connect_timeout` only bounds connection setup; the overall deadline of
    /// a call belongs to [`crate::llm::ModelClient`].
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: &str,
        connect_timeout: Duration,
    ) -> AgentResult<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let auth_value = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| AgentError::ConfigError(format!("Invalid API key format: {}", e)))?;
        headers.insert(header::AUTHORIZATION, auth_value);

        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| AgentError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), GENERATE_PATH),
            model: model.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> AgentResult<Self> {
        Self::new(
            &config.api_key,
            &config.base_url,
            &config.model,
            config.request_timeout(),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionBackend for HttpBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt: &request.prompt,
            max_tokens: request.max_tokens,
        };

        let response = self.client.post(&self.endpoint).json(&body).send().await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| LlmError::MalformedBody(format!("{}, body: {}", e, text)))?;

        parsed
            .generated_text
            .ok_or(LlmError::MissingField("generated_text"))
    }
}
