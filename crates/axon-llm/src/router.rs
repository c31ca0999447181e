//! Top-level completion entry point
//!
//! The [`Router`] normalizes a canonical request, dispatches it to the
//! provider client for its model and, when the caller asked for progress,
//! recovers a partial response if the provider fails mid-stream.

use std::sync::Arc;

use axon_config::LlmConfig;
use reqwest::Client;

use crate::accumulator::ProgressAccumulator;
use crate::context::CompletionContext;
use crate::error::LlmError;
use crate::provider::Provider;
use crate::provider::anthropic::AnthropicProvider;
use crate::provider::ollama::OllamaProvider;
use crate::provider::openai::OpenAiProvider;
use crate::provider::responses::ResponsesProvider;
use crate::routing::{self, Route};
use crate::transport::RetryingClient;
use crate::types::{
    CompletionItem, CompletionProgress, CompletionRequest, CompletionResponse, Content, ItemKind, Message, Role,
    SamplingMessage,
};

/// Text that replaces assistant-authored tool output in replayed history
const REPLAYED_TOOL_OUTPUT: &str = "complete";

/// Dispatches completions to the provider client serving each model
pub struct Router {
    default_model: Option<String>,
    chat_completion_api: bool,
    anthropic: Arc<dyn Provider>,
    completions: Arc<dyn Provider>,
    responses: Arc<dyn Provider>,
    ollama: Arc<dyn Provider>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("default_model", &self.default_model)
            .field("chat_completion_api", &self.chat_completion_api)
            .finish_non_exhaustive()
    }
}

impl Router {
    /// Build every provider client from configuration
    pub fn new(config: &LlmConfig) -> Self {
        let transport = RetryingClient::new(Client::new(), &config.retry);
        let providers = &config.providers;

        Self {
            default_model: config.default_model.clone(),
            chat_completion_api: config.chat_completion_api,
            anthropic: Arc::new(AnthropicProvider::new(providers.anthropic.as_ref(), transport.clone())),
            completions: Arc::new(OpenAiProvider::new(providers.openai.as_ref(), transport.clone())),
            responses: Arc::new(ResponsesProvider::new(providers.openai.as_ref(), transport.clone())),
            ollama: Arc::new(OllamaProvider::new(providers.ollama.as_ref(), transport)),
        }
    }

    /// Replace the client serving `route`
    #[must_use]
    pub fn with_provider(mut self, route: Route, provider: Arc<dyn Provider>) -> Self {
        match route {
            Route::Anthropic => self.anthropic = provider,
            Route::Completions => self.completions = provider,
            Route::Responses => self.responses = provider,
            Route::Ollama => self.ollama = provider,
        }
        self
    }

    fn provider(&self, route: Route) -> &Arc<dyn Provider> {
        match route {
            Route::Anthropic => &self.anthropic,
            Route::Completions => &self.completions,
            Route::Responses => &self.responses,
            Route::Ollama => &self.ollama,
        }
    }

    /// Run one completion
    ///
    /// When `context` carries a progress token and the provider fails with
    /// a recoverable error after producing output, the partial output is
    /// returned as success with its `error` field set.
    ///
    /// # Errors
    ///
    /// Returns the provider's error when nothing could be recovered.
    pub async fn complete(
        &self,
        mut request: CompletionRequest,
        context: &CompletionContext,
    ) -> Result<CompletionResponse, LlmError> {
        if routing::is_default_model(&request.model)
            && let Some(model) = &self.default_model
        {
            request.model.clone_from(model);
        }

        if let Some(mut response) = tool_output_response(&request) {
            tracing::debug!(model = %request.model, "returning assistant tool output without a provider call");
            response.agent.clone_from(&request.agent);
            return Ok(response);
        }

        rewrite_tool_history(&mut request);

        let resolved = routing::resolve(&request.model, self.chat_completion_api);
        request.model = resolved.model_id;
        let provider = self.provider(resolved.route);

        announce_user_turn(&request, context).await;

        let accumulator = context.publisher.is_enabled().then(|| Arc::new(ProgressAccumulator::new()));
        let call_context = match &accumulator {
            Some(accumulator) => context.clone().with_observer(Arc::clone(accumulator) as _),
            None => context.clone(),
        };

        tracing::debug!(
            provider = provider.name(),
            model = %request.model,
            messages = request.input.len(),
            tools = request.tools.len(),
            "dispatching completion"
        );

        let mut response = match provider.complete(&request, &call_context).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(provider = provider.name(), model = %request.model, error = %e, "completion failed");

                let partial = match &accumulator {
                    Some(accumulator) if e.is_recoverable() => {
                        accumulator.partial_response(&e, &context.publisher).await
                    }
                    _ => None,
                };
                let Some(partial) = partial else {
                    return Err(e);
                };

                tracing::info!(provider = provider.name(), model = %request.model, "returning partial response");
                partial
            }
        };

        if response.agent.is_empty() {
            response.agent.clone_from(&request.agent);
        }
        Ok(response)
    }
}

/// Response built directly from an assistant-authored tool result
///
/// Applies only when the most recent input item is such a result and it
/// carries content.
fn tool_output_response(request: &CompletionRequest) -> Option<CompletionResponse> {
    let item = request.input.last()?.items.last()?;
    let ItemKind::ToolCallResult(result) = &item.kind else {
        return None;
    };
    if result.output_role != Some(Role::Assistant) || result.output.content.is_empty() {
        return None;
    }

    let items = result
        .output
        .content
        .iter()
        .enumerate()
        .map(|(index, content)| {
            CompletionItem::new(
                format!("{}-{index}", item.id),
                ItemKind::Message(SamplingMessage {
                    role: Role::Assistant,
                    content: content.clone(),
                }),
            )
        })
        .collect();

    Some(CompletionResponse {
        model: request.model.clone(),
        output: Message {
            id: item.id.clone(),
            role: Role::Assistant,
            items,
            ..Message::default()
        },
        ..CompletionResponse::default()
    })
}

/// Collapse assistant-authored tool results in history to a placeholder
fn rewrite_tool_history(request: &mut CompletionRequest) {
    for item in request.input.iter_mut().flat_map(|message| &mut message.items) {
        if let ItemKind::ToolCallResult(result) = &mut item.kind
            && result.output_role == Some(Role::Assistant)
        {
            result.output.content = vec![Content::text(REPLAYED_TOOL_OUTPUT)];
        }
    }
}

/// Echo the caller's latest user turn to the progress destination
async fn announce_user_turn(request: &CompletionRequest, context: &CompletionContext) {
    if !context.publisher.is_enabled() {
        return;
    }
    let Some(last) = request.input.last() else {
        return;
    };
    if last.id.is_empty() || last.role != Role::User {
        return;
    }

    for item in &last.items {
        context
            .publisher
            .publish(&CompletionProgress {
                model: request.model.clone(),
                agent: request.agent.clone(),
                message_id: last.id.clone(),
                role: Some(Role::User),
                item: item.clone(),
            })
            .await;
    }
}
