//! HTTP transport with bounded exponential backoff

use std::sync::Arc;
use std::time::Duration;

use axon_config::RetryConfig;
use bytes::Bytes;
use rand::Rng;
use reqwest::{Client, Request, Response, StatusCode};
use tokio_util::sync::CancellationToken;

use crate::error::LlmError;

/// Decides whether an attempt's outcome warrants another try
pub type RetryPredicate = Arc<dyn Fn(&Result<Response, reqwest::Error>) -> bool + Send + Sync>;

/// Retry on network errors, HTTP 429 and any 5xx status
pub fn default_should_retry(result: &Result<Response, reqwest::Error>) -> bool {
    match result {
        Err(_) => true,
        Ok(response) => {
            let status = response.status();
            status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500
        }
    }
}

/// Delay before retry number `attempt` (zero-based)
///
/// Computes `base * 2^attempt * jitter`, clamped at `max`.
pub fn backoff_delay(base: Duration, max: Duration, attempt: u32, jitter: f64) -> Duration {
    if base.is_zero() {
        return Duration::ZERO;
    }
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let secs = base.as_secs_f64() * 2f64.powi(exponent) * jitter;
    Duration::try_from_secs_f64(secs.min(max.as_secs_f64())).unwrap_or(max)
}

/// Uniform jitter factor in `[0.5, 1.5)`
fn jitter() -> f64 {
    rand::rng().random_range(0.5..1.5)
}

/// HTTP client that replays requests on transient failures
#[derive(Clone)]
pub struct RetryingClient {
    client: Client,
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    should_retry: RetryPredicate,
}

impl std::fmt::Debug for RetryingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryingClient")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish_non_exhaustive()
    }
}

impl Default for RetryingClient {
    fn default() -> Self {
        Self::new(Client::new(), &RetryConfig::default())
    }
}

impl RetryingClient {
    /// Wrap a client with the given retry policy
    pub fn new(client: Client, config: &RetryConfig) -> Self {
        Self {
            client,
            max_retries: config.max_retries,
            base_delay: config.base_delay,
            max_delay: config.max_delay,
            should_retry: Arc::new(default_should_retry),
        }
    }

    /// Replace the retry predicate
    #[must_use]
    pub fn with_retry_predicate(
        mut self,
        predicate: impl Fn(&Result<Response, reqwest::Error>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.should_retry = Arc::new(predicate);
        self
    }

    /// Underlying client, for building requests
    pub const fn client(&self) -> &Client {
        &self.client
    }

    /// Send a request, retrying per the configured policy
    ///
    /// The body is buffered once so every attempt sends identical bytes.
    /// When attempts run out the last result is returned unchanged, so a
    /// final 5xx surfaces as a response rather than an error.
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Cancelled` if `cancel` fires before a send or
    /// during a backoff wait, and `LlmError::Transport` if the final
    /// attempt failed at the network level.
    pub async fn execute(&self, request: Request, cancel: &CancellationToken) -> Result<Response, LlmError> {
        let template = ReplayableRequest::buffer(request)?;
        let mut attempt = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(LlmError::Cancelled);
            }

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(LlmError::Cancelled),
                result = self.client.execute(template.build()) => result,
            };

            if !(self.should_retry)(&result) || attempt >= self.max_retries {
                return result.map_err(LlmError::from);
            }

            let delay = backoff_delay(self.base_delay, self.max_delay, attempt, jitter());
            match &result {
                Ok(response) => tracing::debug!(
                    url = %template.url,
                    attempt,
                    status = %response.status(),
                    delay_ms = delay.as_millis(),
                    "retrying request"
                ),
                Err(e) => tracing::debug!(
                    url = %template.url,
                    attempt,
                    error = %e,
                    delay_ms = delay.as_millis(),
                    "retrying request"
                ),
            }

            if let Ok(response) = result {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(LlmError::Cancelled),
                    _ = response.bytes() => {}
                }
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(LlmError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }
    }
}

/// Request parts captured once so the request can be rebuilt per attempt
struct ReplayableRequest {
    method: reqwest::Method,
    url: reqwest::Url,
    headers: reqwest::header::HeaderMap,
    version: reqwest::Version,
    timeout: Option<Duration>,
    body: Option<Bytes>,
}

impl ReplayableRequest {
    fn buffer(request: Request) -> Result<Self, LlmError> {
        let body = match request.body() {
            None => None,
            Some(body) => Some(
                body.as_bytes()
                    .map(Bytes::copy_from_slice)
                    .ok_or_else(|| anyhow::anyhow!("streaming request bodies cannot be replayed"))?,
            ),
        };

        Ok(Self {
            method: request.method().clone(),
            url: request.url().clone(),
            headers: request.headers().clone(),
            version: request.version(),
            timeout: request.timeout().copied(),
            body,
        })
    }

    fn build(&self) -> Request {
        let mut request = Request::new(self.method.clone(), self.url.clone());
        *request.headers_mut() = self.headers.clone();
        *request.version_mut() = self.version;
        *request.timeout_mut() = self.timeout;
        *request.body_mut() = self.body.clone().map(reqwest::Body::from);
        request
    }
}
