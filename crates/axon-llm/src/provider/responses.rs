//! `OpenAI` Responses API provider implementation

use async_trait::async_trait;
use axon_config::ProviderConfig;
use eventsource_stream::Eventsource;
use http::HeaderMap;
use url::Url;

use super::Provider;
use crate::context::CompletionContext;
use crate::convert::responses::{ResponsesStreamState, to_response};
use crate::error::LlmError;
use crate::protocol::responses::{ResponsesRequest, ResponsesStreamEvent};
use crate::transport::RetryingClient;
use crate::types::{CompletionRequest, CompletionResponse};

/// Default `OpenAI` API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// `OpenAI` Responses API provider
#[derive(Debug)]
pub struct ResponsesProvider {
    transport: RetryingClient,
    base_url: Url,
    headers: HeaderMap,
}

impl ResponsesProvider {
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

    fn responses_url(&self) -> String {
        super::endpoint(&self.base_url, "responses")
    }
}

#[async_trait]
impl Provider for ResponsesProvider {
    fn name(&self) -> &str {
        "openai-responses"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        context: &CompletionContext,
    ) -> Result<CompletionResponse, LlmError> {
        let wire_request = ResponsesRequest::try_from(request)?;

        let http_request = self
            .transport
            .client()
            .post(self.responses_url())
            .headers(self.headers.clone())
            .json(&wire_request)
            .build()?;

        tracing::debug!(provider = self.name(), model = %request.model, "sending completion request");

        let response = self.transport.execute(http_request, &context.cancellation).await?;
        let response = super::ensure_success(self.name(), response).await?;

        let mut events = std::pin::pin!(response.bytes_stream().eventsource());
        let mut state = ResponsesStreamState::new(request);

        while let Some(event) = super::next_or_cancel(&mut events, &context.cancellation).await? {
            let event = event.map_err(|e| LlmError::Streaming(e.to_string()))?;
            let data = event.data.trim();
            if data.is_empty() {
                continue;
            }

            match serde_json::from_str::<ResponsesStreamEvent>(data) {
                Ok(stream_event) => {
                    let progress = state.apply(stream_event)?;
                    super::publish_all(context, &request.agent, progress).await;
                }
                Err(e) => {
                    tracing::debug!(error = %e, event = %event.event, "skipping unhandled Responses SSE event");
                }
            }
        }

        let final_response = state.finish().inspect_err(|e| {
            tracing::warn!(provider = self.name(), error = %e, "responses stream did not complete");
        })?;

        Ok(to_response(request, final_response))
    }
}
