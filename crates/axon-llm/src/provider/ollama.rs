//! Ollama local model provider implementation

use async_trait::async_trait;
use axon_config::ProviderConfig;
use futures_util::TryStreamExt;
use http::HeaderMap;
use http::header::CONTENT_TYPE;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;
use url::Url;
use uuid::Uuid;

use super::Provider;
use crate::context::CompletionContext;
use crate::convert::ollama::{OllamaStreamState, single_shot_progress, to_response};
use crate::error::LlmError;
use crate::protocol::ollama::{OllamaRequest, OllamaResponse};
use crate::transport::RetryingClient;
use crate::types::{CompletionRequest, CompletionResponse};

/// Default Ollama server address
const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Ollama chat provider
#[derive(Debug)]
pub struct OllamaProvider {
    transport: RetryingClient,
    base_url: Url,
    headers: HeaderMap,
}

impl OllamaProvider {
    /// Create from optional provider configuration
    pub fn new(config: Option<&ProviderConfig>, transport: RetryingClient) -> Self {
        Self {
            transport,
            base_url: super::base_url(config, DEFAULT_BASE_URL),
            headers: super::static_headers(config),
        }
    }

    fn chat_url(&self) -> String {
        super::endpoint(&self.base_url, "api/chat")
    }

    /// Decode a single JSON body and publish it as one final event
    async fn complete_single(
        &self,
        response: reqwest::Response,
        request: &CompletionRequest,
        context: &CompletionContext,
        message_id: &str,
    ) -> Result<CompletionResponse, LlmError> {
        let body = tokio::select! {
            biased;
            () = context.cancellation.cancelled() => return Err(LlmError::Cancelled),
            body = response.bytes() => body.map_err(|e| LlmError::Streaming(e.to_string()))?,
        };

        let mut wire_response: OllamaResponse = serde_json::from_slice(&body)
            .map_err(|e| LlmError::Streaming(format!("failed to decode Ollama response: {e}")))?;
        if wire_response.model.is_empty() {
            wire_response.model.clone_from(&request.model);
        }

        if let Some(progress) = single_shot_progress(&wire_response, message_id) {
            super::publish_all(context, &request.agent, vec![progress]).await;
        }

        Ok(to_response(wire_response, message_id))
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(
        &self,
        request: &CompletionRequest,
        context: &CompletionContext,
    ) -> Result<CompletionResponse, LlmError> {
        let wire_request = OllamaRequest::try_from(request)?;

        let http_request = self
            .transport
            .client()
            .post(self.chat_url())
            .headers(self.headers.clone())
            .json(&wire_request)
            .build()?;

        tracing::debug!(provider = self.name(), model = %request.model, "sending completion request");

        let response = self.transport.execute(http_request, &context.cancellation).await?;
        let response = super::ensure_success(self.name(), response).await?;
        let message_id = format!("ollama-{}", Uuid::new_v4());

        let single = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("application/json"));
        if single {
            return self.complete_single(response, request, context, &message_id).await;
        }

        let reader = StreamReader::new(response.bytes_stream().map_err(std::io::Error::other));
        let mut lines = std::pin::pin!(FramedRead::new(reader, LinesCodec::new()));
        let mut state = OllamaStreamState::new(message_id.clone());

        while let Some(line) = super::next_or_cancel(&mut lines, &context.cancellation).await? {
            let line = line.map_err(|e| LlmError::Streaming(e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<OllamaResponse>(&line) {
                Ok(chunk) => {
                    let progress = state.apply(chunk);
                    super::publish_all(context, &request.agent, progress).await;
                    if state.is_done() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "skipping undecodable Ollama stream line");
                }
            }
        }

        let closing = state.closing_progress();
        let wire_response = state.finish(&request.model)?;
        if let Some(progress) = closing {
            super::publish_all(context, &request.agent, vec![progress]).await;
        }

        Ok(to_response(wire_response, &message_id))
    }
}
