use std::path::Path;

use http::{HeaderName, HeaderValue};

use crate::{Config, ProviderConfig};

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, TOML parsing fails,
    /// or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        let config: Self = toml::from_str(&raw).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        tracing::debug!(path = %path.display(), "loaded configuration");

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if the retry bounds are inverted, the default
    /// model is blank, or a provider header is not a valid HTTP header
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_retry()?;
        self.validate_default_model()?;
        self.validate_providers()?;
        Ok(())
    }

    fn validate_retry(&self) -> anyhow::Result<()> {
        let retry = &self.llm.retry;
        if retry.base_delay > retry.max_delay {
            anyhow::bail!(
                "llm.retry.base_delay ({:?}) must not exceed llm.retry.max_delay ({:?})",
                retry.base_delay,
                retry.max_delay
            );
        }
        Ok(())
    }

    fn validate_default_model(&self) -> anyhow::Result<()> {
        if let Some(model) = &self.llm.default_model
            && model.trim().is_empty()
        {
            anyhow::bail!("llm.default_model must not be blank");
        }
        Ok(())
    }

    fn validate_providers(&self) -> anyhow::Result<()> {
        let providers = &self.llm.providers;
        let named = [
            ("anthropic", providers.anthropic.as_ref()),
            ("openai", providers.openai.as_ref()),
            ("ollama", providers.ollama.as_ref()),
        ];

        for (name, provider) in named {
            if let Some(provider) = provider {
                validate_headers(name, provider)?;
            }
        }

        Ok(())
    }
}

/// Ensure every configured header is representable on the wire
fn validate_headers(provider: &str, config: &ProviderConfig) -> anyhow::Result<()> {
    for (name, value) in &config.headers {
        HeaderName::try_from(name.as_str())
            .map_err(|e| anyhow::anyhow!("invalid header name '{name}' for provider '{provider}': {e}"))?;
        HeaderValue::try_from(value.as_str())
            .map_err(|e| anyhow::anyhow!("invalid value for header '{name}' on provider '{provider}': {e}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use indoc::indoc;

    use crate::Config;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_valid_file() {
        let file = write_config(indoc! {r#"
            [llm]
            default_model = "claude-sonnet-4-5"

            [llm.retry]
            base_delay = "100ms"
        "#});

        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.llm.default_model.as_deref(), Some("claude-sonnet-4-5"));
        assert_eq!(config.llm.retry.base_delay, Duration::from_millis(100));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = Config::load(std::path::Path::new("/nonexistent/axon.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/axon.toml"));
    }

    #[test]
    fn inverted_retry_bounds_are_rejected() {
        let file = write_config(indoc! {r#"
            [llm.retry]
            base_delay = "1m"
            max_delay = "1s"
        "#});

        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("base_delay"));
    }

    #[test]
    fn blank_default_model_is_rejected() {
        let file = write_config(indoc! {r#"
            [llm]
            default_model = "  "
        "#});

        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn invalid_header_name_is_rejected() {
        let file = write_config(indoc! {r#"
            [llm.providers.ollama.headers]
            "bad header" = "x"
        "#});

        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("ollama"));
    }
}
