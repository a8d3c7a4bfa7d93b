use crate::config::ExtractionConfig;
use crate::provider::{Completion, ExtractionError, ExtractionProvider, ExtractionResult};
use crate::types::{ChatMessage, ChatRequest, ChatResponse};
use async_trait::async_trait;
use tracing::{debug, warn};

/// Extraction provider backed by any OpenAI-compatible chat completion
/// endpoint.
pub struct OpenAiProvider {
    client: reqwest::Client,
    config: ExtractionConfig,
}

impl OpenAiProvider {
    pub fn new(config: ExtractionConfig) -> ExtractionResult<Self> {
        config
            .validate()
            .map_err(|msg| ExtractionError::InvalidConfig { message: msg })?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ExtractionError::Unknown {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }

    pub fn with_default_config() -> ExtractionResult<Self> {
        Self::new(ExtractionConfig::default())
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    fn handle_http_error(err: reqwest::Error) -> ExtractionError {
        if err.is_timeout() {
            ExtractionError::ServiceUnavailable {
                message: "Request timeout".to_string(),
            }
        } else if err.is_connect() {
            ExtractionError::ServiceUnavailable {
                message: "Cannot connect to extraction service".to_string(),
            }
        } else if let Some(status) = err.status() {
            match status.as_u16() {
                401 | 403 => ExtractionError::Authentication,
                429 => ExtractionError::RateLimit,
                503 => ExtractionError::ServiceUnavailable {
                    message: "Extraction service unavailable".to_string(),
                },
                _ => ExtractionError::Network(err),
            }
        } else {
            ExtractionError::Network(err)
        }
    }
}

#[async_trait]
impl ExtractionProvider for OpenAiProvider {
    async fn complete(&self, system_prompt: &str, text: &str) -> ExtractionResult<Completion> {
        debug!("Starting extraction request with model: {}", self.config.model);

        let request = ChatRequest::new(
            self.config.model.clone(),
            vec![ChatMessage::system(system_prompt), ChatMessage::user(text)],
        )
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens);

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let mut builder = self.client.post(&url).json(&request);
        if let Some(api_key) = &self.config.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.map_err(Self::handle_http_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            warn!("Extraction API error ({}): {}", status, error_text);
            return Err(ExtractionError::Unknown {
                message: format!("Extraction API error ({}): {}", status, error_text),
            });
        }

        let chat_response: ChatResponse = response.json().await.map_err(Self::handle_http_error)?;

        let total_tokens = chat_response.usage.map(|u| u.total_tokens).unwrap_or(0);

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(ExtractionError::EmptyCompletion)?;

        Ok(Completion {
            content: content.trim().to_string(),
            total_tokens,
        })
    }

    fn provider_name(&self) -> &'static str {
        "openai-compatible"
    }
}
