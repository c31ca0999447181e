//! Provider trait and implementations for LLM backends

pub mod anthropic;
pub mod ollama;
pub mod openai;
pub mod responses;

use async_trait::async_trait;
use axon_config::ProviderConfig;
use futures_util::{Stream, StreamExt};
use http::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::context::CompletionContext;
use crate::error::LlmError;
use crate::types::{CompletionProgress, CompletionRequest, CompletionResponse};

/// Trait implemented by each LLM provider backend
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name
    fn name(&self) -> &str;

    /// Stream a completion, publishing progress through `context`
    async fn complete(
        &self,
        request: &CompletionRequest,
        context: &CompletionContext,
    ) -> Result<CompletionResponse, LlmError>;
}

/// Resolve a configured base URL or fall back to the vendor default
///
/// # Panics
///
/// Panics if the hardcoded default base URL is invalid (should never happen).
pub(crate) fn base_url(config: Option<&ProviderConfig>, default: &str) -> Url {
    config
        .and_then(|c| c.base_url.clone())
        .unwrap_or_else(|| Url::parse(default).expect("valid default URL"))
}

/// Join an endpoint path onto a base URL
pub(crate) fn endpoint(base: &Url, path: &str) -> String {
    let base = base.as_str().trim_end_matches('/');
    format!("{base}/{path}")
}

/// Static headers from configuration, skipping entries that do not parse
pub(crate) fn static_headers(config: Option<&ProviderConfig>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in config.into_iter().flat_map(|c| &c.headers) {
        match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "ignoring invalid static header"),
        }
    }
    headers
}

/// Add `Authorization: Bearer` unless a static header already sets it
pub(crate) fn bearer_auth(headers: &mut HeaderMap, api_key: Option<&SecretString>) {
    if headers.contains_key(AUTHORIZATION) {
        return;
    }
    if let Some(key) = api_key
        && let Ok(mut value) = HeaderValue::try_from(format!("Bearer {}", key.expose_secret()))
    {
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
}

/// Turn a non-2xx response into [`LlmError::Upstream`]
pub(crate) async fn ensure_success(provider: &str, response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::warn!(provider = %provider, status = %status, "upstream returned error");
    Err(LlmError::Upstream { status, body })
}

/// Next stream item, or [`LlmError::Cancelled`] once the call is cancelled
pub(crate) async fn next_or_cancel<S>(stream: &mut S, cancel: &CancellationToken) -> Result<Option<S::Item>, LlmError>
where
    S: Stream + Unpin,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(LlmError::Cancelled),
        item = stream.next() => Ok(item),
    }
}

/// Publish progress in order, tagging each event with the calling agent
pub(crate) async fn publish_all(context: &CompletionContext, agent: &str, progress: Vec<CompletionProgress>) {
    for mut event in progress {
        if event.agent.is_empty() {
            agent.clone_into(&mut event.agent);
        }
        context.publisher.publish(&event).await;
    }
}
