//! Programmatic configuration builder for integration tests

use std::time::Duration;

use axon_config::{LlmConfig, ProviderConfig, RetryConfig};
use secrecy::SecretString;

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: LlmConfig,
}

impl ConfigBuilder {
    /// Create a builder with a fast retry policy
    pub fn new() -> Self {
        Self {
            config: LlmConfig {
                retry: fast_retry(3),
                ..LlmConfig::default()
            },
        }
    }

    /// Point the Anthropic client at a mock backend
    pub fn with_anthropic(mut self, base_url: &str) -> Self {
        self.config.providers.anthropic = Some(provider(base_url, Some("test-anthropic-key")));
        self
    }

    /// Point both `OpenAI` clients at a mock backend
    pub fn with_openai(mut self, base_url: &str) -> Self {
        self.config.providers.openai = Some(provider(base_url, Some("test-openai-key")));
        self
    }

    /// Point the local client at a mock backend
    pub fn with_ollama(mut self, base_url: &str) -> Self {
        self.config.providers.ollama = Some(provider(base_url, None));
        self
    }

    /// Send generic models through Chat Completions
    pub fn with_chat_completion_api(mut self) -> Self {
        self.config.chat_completion_api = true;
        self
    }

    /// Substitute `model` for default-model requests
    pub fn with_default_model(mut self, model: &str) -> Self {
        self.config.default_model = Some(model.to_owned());
        self
    }

    /// Override the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Build the final config
    pub fn build(self) -> LlmConfig {
        self.config
    }
}

/// Retry policy with millisecond-scale delays
pub fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
    }
}

fn provider(base_url: &str, api_key: Option<&str>) -> ProviderConfig {
    ProviderConfig {
        api_key: api_key.map(SecretString::from),
        base_url: Some(base_url.parse().expect("valid URL")),
        headers: [("x-test-suite".to_owned(), "integration".to_owned())].into_iter().collect(),
    }
}
