use std::time::Duration;

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Default number of retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default initial backoff delay
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default upper bound for a single backoff delay
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Top-level LLM configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// Model substituted when a request names no model or `"default"`
    #[serde(default)]
    pub default_model: Option<String>,
    /// Route generic models through Chat Completions instead of Responses
    #[serde(default)]
    pub chat_completion_api: bool,
    /// Transport retry policy shared by every provider
    #[serde(default)]
    pub retry: RetryConfig,
    /// Per-vendor provider settings
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// Settings for each supported vendor protocol
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProvidersConfig {
    /// Anthropic Messages API
    #[serde(default)]
    pub anthropic: Option<ProviderConfig>,
    /// `OpenAI` Responses and Chat Completions APIs
    #[serde(default)]
    pub openai: Option<ProviderConfig>,
    /// Local Ollama server
    #[serde(default)]
    pub ollama: Option<ProviderConfig>,
}

/// Configuration for a single provider endpoint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// API key for authentication
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Static headers added to every request
    #[serde(default)]
    pub headers: IndexMap<String, String>,
}

/// Bounded exponential backoff settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Retries after the initial attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry, doubled on each subsequent one
    #[serde(default = "default_base_delay", with = "crate::duration")]
    pub base_delay: Duration,
    /// Ceiling applied to every computed delay
    #[serde(default = "default_max_delay", with = "crate::duration")]
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

const fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

const fn default_base_delay() -> Duration {
    DEFAULT_BASE_DELAY
}

const fn default_max_delay() -> Duration {
    DEFAULT_MAX_DELAY
}
