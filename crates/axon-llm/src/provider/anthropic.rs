//! Anthropic Messages API provider implementation

use async_trait::async_trait;
use axon_config::ProviderConfig;
use eventsource_stream::Eventsource;
use http::HeaderMap;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use super::Provider;
use crate::context::CompletionContext;
use crate::convert::anthropic::AnthropicStreamState;
use crate::error::LlmError;
use crate::protocol::anthropic::{AnthropicRequest, AnthropicStreamEvent};
use crate::transport::RetryingClient;
use crate::types::{CompletionRequest, CompletionResponse};

/// Default Anthropic API base URL
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API provider
#[derive(Debug)]
pub struct AnthropicProvider {
    transport: RetryingClient,
    base_url: Url,
    api_key: Option<SecretString>,
    headers: HeaderMap,
}

impl AnthropicProvider {
    /// Create from optional provider configuration
    pub fn new(config: Option<&ProviderConfig>, transport: RetryingClient) -> Self {
        Self {
            transport,
            base_url: super::base_url(config, DEFAULT_BASE_URL),
            api_key: config.and_then(|c| c.api_key.clone()),
            headers: super::static_headers(config),
        }
    }

    /// Build the messages endpoint URL
    fn messages_url(&self) -> String {
        super::endpoint(&self.base_url, "messages")
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        context: &CompletionContext,
    ) -> Result<CompletionResponse, LlmError> {
        let wire_request = AnthropicRequest::try_from(request)?;

        let mut builder = self
            .transport
            .client()
            .post(self.messages_url())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .headers(self.headers.clone())
            .json(&wire_request);

        if let Some(key) = &self.api_key {
            builder = builder.header("x-api-key", key.expose_secret());
        }

        tracing::debug!(provider = self.name(), model = %request.model, "sending completion request");

        let response = self.transport.execute(builder.build()?, &context.cancellation).await?;
        let response = super::ensure_success(self.name(), response).await?;

        let mut events = std::pin::pin!(response.bytes_stream().eventsource());
        let mut state = AnthropicStreamState::new();

        while let Some(event) = super::next_or_cancel(&mut events, &context.cancellation).await? {
            let event = event.map_err(|e| LlmError::Streaming(e.to_string()))?;
            let data = event.data.trim();
            if data.is_empty() {
                continue;
            }

            match serde_json::from_str::<AnthropicStreamEvent>(data) {
                Ok(stream_event) => {
                    let progress = state.apply(stream_event)?;
                    super::publish_all(context, &request.agent, progress).await;
                }
                Err(e) => {
                    tracing::debug!(error = %e, event = %event.event, "skipping unparseable Anthropic SSE event");
                }
            }
        }

        Ok(state.finish().into())
    }
}
