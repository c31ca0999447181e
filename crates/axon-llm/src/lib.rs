//! Provider-neutral LLM completion gateway
//!
//! Accepts a canonical [`CompletionRequest`], routes it by model name to
//! Anthropic Messages, `OpenAI` Chat Completions, `OpenAI` Responses or a
//! local Ollama server, and returns a canonical [`CompletionResponse`].
//! Incremental output is published as [`CompletionProgress`] notifications
//! when the caller supplies a progress token.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod accumulator;
pub mod capabilities;
pub mod context;
pub mod convert;
pub mod error;
pub mod progress;
pub mod protocol;
pub mod provider;
pub mod router;
pub mod routing;
pub mod tokenizer;
pub mod transport;
pub mod types;

pub use accumulator::ProgressAccumulator;
pub use context::CompletionContext;
pub use error::LlmError;
pub use progress::{ProgressPublisher, ProgressToken, SessionTransport};
pub use provider::Provider;
pub use router::Router;
pub use routing::{ResolvedModel, Route};
pub use transport::RetryingClient;
pub use types::{CompletionProgress, CompletionRequest, CompletionResponse};
