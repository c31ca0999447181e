use http::StatusCode;
use thiserror::Error;

/// Errors that can occur while completing a request
#[derive(Debug, Error)]
pub enum LlmError {
    /// Canonical request could not be expressed in the vendor format
    #[error("translation error: {0}")]
    Translation(String),

    /// Network failure that persisted through every retry
    #[error("transport error: {0}")]
    Transport(String),

    /// Upstream provider answered with a non-success status
    #[error("provider returned {status}: {body}")]
    Upstream { status: StatusCode, body: String },

    /// Reading the response body failed or the stream ended early
    #[error("streaming error: {0}")]
    Streaming(String),

    /// Provider reported a failure inside an otherwise valid stream
    #[error("{0}")]
    Provider(String),

    /// Stream finished without producing any output
    #[error("{0}")]
    NoContent(String),

    /// Request was cancelled by the caller
    #[error("request cancelled")]
    Cancelled,

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl LlmError {
    /// Whether a partial response may have been produced before the failure
    ///
    /// Translation errors happen before any bytes are sent, so there is
    /// nothing to recover from them.
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Translation(_))
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}
