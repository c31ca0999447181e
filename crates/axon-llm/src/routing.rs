//! Model resolution and routing logic
//!
//! Decides which vendor protocol serves a model id. Resolution is purely
//! name based and never fails; an unrecognised model goes to the generic
//! `OpenAI` endpoint.

/// Sentinel model name replaced by the configured default
pub const DEFAULT_MODEL_SENTINEL: &str = "default";

/// Model id prefix served by Anthropic
const ANTHROPIC_PREFIX: &str = "claude";

/// Explicit local-model prefix, stripped before forwarding
const OLLAMA_PREFIX: &str = "ollama:";

/// Model families served by the local Ollama server
const LOCAL_MODEL_FAMILIES: &[&str] = &["llama", "mistral", "gemma", "phi", "qwen", "codellama"];

/// Vendor protocol a model is served by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Anthropic Messages API
    Anthropic,
    /// `OpenAI` Chat Completions API
    Completions,
    /// `OpenAI` Responses API
    Responses,
    /// Local Ollama server
    Ollama,
}

/// Resolved target for a model request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModel {
    /// Protocol to dispatch to
    pub route: Route,
    /// Actual model identifier to send to the provider
    pub model_id: String,
}

/// Whether the request leaves the model to configuration
pub fn is_default_model(model: &str) -> bool {
    model.is_empty() || model == DEFAULT_MODEL_SENTINEL
}

/// Resolve a model id to a protocol
///
/// `chat_completion_api` sends generic models to Chat Completions instead
/// of Responses.
pub fn resolve(model: &str, chat_completion_api: bool) -> ResolvedModel {
    if model.starts_with(ANTHROPIC_PREFIX) {
        return ResolvedModel {
            route: Route::Anthropic,
            model_id: model.to_owned(),
        };
    }

    if let Some(local) = model.strip_prefix(OLLAMA_PREFIX) {
        return ResolvedModel {
            route: Route::Ollama,
            model_id: local.to_owned(),
        };
    }

    let lower = model.to_lowercase();
    let route = if LOCAL_MODEL_FAMILIES.iter().any(|family| lower.contains(family)) {
        Route::Ollama
    } else if chat_completion_api {
        Route::Completions
    } else {
        Route::Responses
    };

    ResolvedModel {
        route,
        model_id: model.to_owned(),
    }
}
