use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection settings for an OpenAI-compatible extraction endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.studio.nebius.ai/v1".to_string(),
            model: "meta-llama/Llama-3.3-70B-Instruct".to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
            temperature: 0.0,
            max_tokens: 200,
        }
    }
}

impl ExtractionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.is_empty() {
            return Err("Base URL cannot be empty".to_string());
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err("Base URL must start with http:// or https://".to_string());
        }

        if self.model.is_empty() {
            return Err("Model cannot be empty".to_string());
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err("Temperature must be between 0.0 and 2.0".to_string());
        }

        if self.max_tokens == 0 {
            return Err("Max tokens must be greater than 0".to_string());
        }

        if self.timeout.is_zero() {
            return Err("Timeout must be greater than 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExtractionConfig::default();
        assert_eq!(config.base_url, "https://api.studio.nebius.ai/v1");
        assert_eq!(config.model, "meta-llama/Llama-3.3-70B-Instruct");
        assert!(config.api_key.is_none());
        assert_eq!(config.temperature, 0.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ExtractionConfig::new()
            .with_base_url("https://api.example.com/v1")
            .with_model("mistralai/Mixtral-8x7B")
            .with_api_key("secret")
            .with_timeout(Duration::from_secs(60))
            .with_max_tokens(400);

        assert_eq!(config.base_url, "https://api.example.com/v1");
        assert_eq!(config.model, "mistralai/Mixtral-8x7B");
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.max_tokens, 400);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ExtractionConfig::default();

        config.base_url = "".to_string();
        assert!(config.validate().is_err());

        config.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        config.base_url = "https://api.studio.nebius.ai/v1".to_string();
        config.model = "".to_string();
        assert!(config.validate().is_err());

        config.model = "meta-llama/Llama-3.3-70B-Instruct".to_string();
        config.temperature = 3.0;
        assert!(config.validate().is_err());

        config.temperature = 0.0;
        config.max_tokens = 0;
        assert!(config.validate().is_err());

        config.max_tokens = 200;
        config.timeout = Duration::from_secs(0);
        assert!(config.validate().is_err());
    }
}
