use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    #[error("Empty completion from extraction service")]
    EmptyCompletion,

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Authentication failed")]
    Authentication,

    #[error("Unknown error: {message}")]
    Unknown { message: String },
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// A single completion returned by the extraction service.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub total_tokens: u32,
}

/// Capability the answer evaluator depends on abstractly. Implementations
/// own their transport and timeout; callers treat every failure as
/// recoverable.
#[async_trait]
pub trait ExtractionProvider: Send + Sync {
    async fn complete(&self, system_prompt: &str, text: &str) -> ExtractionResult<Completion>;

    fn provider_name(&self) -> &'static str;
}
