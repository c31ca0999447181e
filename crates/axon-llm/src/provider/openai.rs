//! `OpenAI` Chat Completions provider implementation

use async_trait::async_trait;
use axon_config::ProviderConfig;
use eventsource_stream::Eventsource;
use http::HeaderMap;
use url::Url;

use super::Provider;
use crate::context::CompletionContext;
use crate::convert::openai::CompletionsStreamState;
use crate::error::LlmError;
use crate::protocol::openai::{OpenAiRequest, OpenAiStreamChunk};
use crate::transport::RetryingClient;
use crate::types::{CompletionRequest, CompletionResponse};

/// Default `OpenAI` API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Sentinel that ends a Chat Completions stream
const DONE_SENTINEL: &str = "[DONE]";

/// OpenAI-compatible Chat Completions provider
#[derive(Debug)]
pub struct OpenAiProvider {
    transport: RetryingClient,
    base_url: Url,
    headers: HeaderMap,
}

impl OpenAiProvider {
    /// Create from optional provider configuration
    pub fn new(config: Option<&ProviderConfig>, transport: RetryingClient) -> Self {
        let mut headers = super::static_headers(config);
        super::bearer_auth(&mut headers, config.and_then(|c| c.api_key.as_ref()));

        Self {
            transport,
            base_url: super::base_url(config, DEFAULT_BASE_URL),
            headers,
        }
    }

    /// Build the chat completions endpoint URL
    fn completions_url(&self) -> String {
        super::endpoint(&self.base_url, "chat/completions")
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai-completions"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        context: &CompletionContext,
    ) -> Result<CompletionResponse, LlmError> {
        let wire_request = OpenAiRequest::try_from(request)?;

        let http_request = self
            .transport
            .client()
            .post(self.completions_url())
            .headers(self.headers.clone())
            .json(&wire_request)
            .build()?;

        tracing::debug!(provider = self.name(), model = %request.model, "sending completion request");

        let response = self.transport.execute(http_request, &context.cancellation).await?;
        let response = super::ensure_success(self.name(), response).await?;

        let mut events = std::pin::pin!(response.bytes_stream().eventsource());
        let mut state = CompletionsStreamState::new();

        while let Some(event) = super::next_or_cancel(&mut events, &context.cancellation).await? {
            let event = event.map_err(|e| LlmError::Streaming(e.to_string()))?;
            let data = event.data.trim();
            if data == DONE_SENTINEL {
                break;
            }
            if data.is_empty() {
                continue;
            }

            match serde_json::from_str::<OpenAiStreamChunk>(data) {
                Ok(chunk) => {
                    let progress = state.apply(chunk);
                    super::publish_all(context, &request.agent, progress).await;
                }
                Err(e) => {
                    tracing::debug!(error = %e, "skipping unparseable OpenAI SSE chunk");
                }
            }
        }

        Ok(state.finish()?.into())
    }
}
