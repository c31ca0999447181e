//! Conversion between canonical types and the Ollama chat wire format

use crate::error::LlmError;
use crate::protocol::ollama::{
    OllamaFunction, OllamaFunctionCall, OllamaMessage, OllamaOptions, OllamaRequest, OllamaResponse, OllamaTool,
    OllamaToolCall,
};
use crate::types::{
    CompletionItem, CompletionProgress, CompletionRequest, CompletionResponse, Content, ItemKind, Message, Role,
    ToolCall,
};

/// Message sent when the conversation would otherwise be empty
const EMPTY_CONVERSATION: &str = "Hello";

// -- Outbound: canonical request -> Ollama wire format --

impl TryFrom<&CompletionRequest> for OllamaRequest {
    type Error = LlmError;

    fn try_from(req: &CompletionRequest) -> Result<Self, Self::Error> {
        let mut messages = Vec::new();

        if let Some(system) = req.system_prompt.as_deref().filter(|s| !s.is_empty()) {
            messages.push(OllamaMessage {
                role: "system".to_owned(),
                content: system.to_owned(),
                ..OllamaMessage::default()
            });
        }

        for message in &req.input {
            let mut turn = OllamaMessage {
                role: message.role.as_str().to_owned(),
                ..OllamaMessage::default()
            };

            for item in &message.items {
                match &item.kind {
                    ItemKind::Content(content) => append_content(&mut turn, content),
                    ItemKind::Message(sampling) => {
                        let mut single = OllamaMessage {
                            role: sampling.role.as_str().to_owned(),
                            ..OllamaMessage::default()
                        };
                        append_content(&mut single, &sampling.content);
                        messages.push(single);
                    }
                    ItemKind::ToolCall(call) => messages.push(OllamaMessage {
                        role: "assistant".to_owned(),
                        tool_calls: vec![OllamaToolCall {
                            function: OllamaFunctionCall {
                                name: call.name.clone(),
                                arguments: super::parse_arguments(call)?,
                            },
                        }],
                        ..OllamaMessage::default()
                    }),
                    ItemKind::ToolCallResult(result) => {
                        let mut reply = OllamaMessage {
                            role: "tool".to_owned(),
                            tool_name: req.tool_name_for_call(&result.call_id).map(str::to_owned),
                            ..OllamaMessage::default()
                        };
                        for content in &result.output.content {
                            append_content(&mut reply, content);
                        }
                        messages.push(reply);
                    }
                    ItemKind::Reasoning(_) => {}
                }
            }

            if !turn.content.is_empty() || !turn.images.is_empty() {
                messages.push(turn);
            }
        }

        if messages.is_empty() {
            messages.push(OllamaMessage {
                role: "user".to_owned(),
                content: EMPTY_CONVERSATION.to_owned(),
                ..OllamaMessage::default()
            });
        }

        let options = (req.temperature.is_some() || req.top_p.is_some() || req.max_tokens.is_some()).then(|| {
            OllamaOptions {
                temperature: req.temperature,
                top_p: req.top_p,
                num_ctx: req.max_tokens.filter(|&n| n > 0),
            }
        });

        let format = match &req.output_schema {
            Some(schema) => {
                super::check_output_schema(schema)?;
                Some(schema.schema.clone())
            }
            None => None,
        };

        Ok(Self {
            model: req.model.clone(),
            messages,
            stream: true,
            tools: req
                .tools
                .iter()
                .map(|tool| OllamaTool {
                    tool_type: "function".to_owned(),
                    function: OllamaFunction {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: tool
                            .parameters
                            .clone()
                            .unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new())),
                    },
                })
                .collect(),
            options,
            format,
        })
    }
}

/// Fold content into a wire message: text joins with newlines, images attach
fn append_content(message: &mut OllamaMessage, content: &Content) {
    let text = match content {
        Content::Text { text } => text.as_str(),
        Content::Image { data, .. } => {
            message.images.push(data.clone());
            return;
        }
        Content::Resource { resource } => match &resource.text {
            Some(text) => text.as_str(),
            None => {
                tracing::debug!(uri = %resource.uri, "skipping binary resource unsupported by Ollama");
                return;
            }
        },
        Content::Audio { .. } => {
            tracing::debug!("skipping audio content unsupported by Ollama");
            return;
        }
    };

    if !message.content.is_empty() {
        message.content.push('\n');
    }
    message.content.push_str(text);
}

// -- Inbound: Ollama wire format -> canonical response --

/// Convert an assembled Ollama response under the given message id
///
/// Tool calls take precedence over text. Ollama does not issue call ids,
/// so each call is identified by its position.
pub fn to_response(resp: OllamaResponse, message_id: &str) -> CompletionResponse {
    let items = if resp.message.tool_calls.is_empty() {
        vec![CompletionItem::text(text_item_id(message_id), resp.message.content)]
    } else {
        resp.message
            .tool_calls
            .into_iter()
            .enumerate()
            .map(|(index, call)| CompletionItem::new(tool_item_id(message_id, index), tool_call(message_id, index, call)))
            .collect()
    };

    CompletionResponse {
        model: resp.model,
        output: Message {
            id: message_id.to_owned(),
            role: Role::Assistant,
            items,
            ..Message::default()
        },
        ..CompletionResponse::default()
    }
}

fn text_item_id(message_id: &str) -> String {
    format!("{message_id}-0")
}

fn tool_item_id(message_id: &str, index: usize) -> String {
    format!("{message_id}-tool-{index}")
}

fn tool_call(message_id: &str, index: usize, call: OllamaToolCall) -> ItemKind {
    ItemKind::ToolCall(ToolCall {
        call_id: tool_item_id(message_id, index),
        name: call.function.name,
        arguments: call.function.arguments.to_string(),
    })
}

/// Progress for a non-streaming answer: the whole text plus a newline
pub fn single_shot_progress(resp: &OllamaResponse, message_id: &str) -> Option<CompletionProgress> {
    if resp.message.content.is_empty() {
        return None;
    }
    Some(CompletionProgress::assistant(
        &resp.model,
        message_id,
        CompletionItem::text(text_item_id(message_id), format!("{}\n", resp.message.content)),
    ))
}

// -- Streaming: NDJSON lines -> progress --

/// Running state while consuming an Ollama NDJSON stream
#[derive(Debug)]
pub struct OllamaStreamState {
    message_id: String,
    response: OllamaResponse,
    lines: usize,
}

impl OllamaStreamState {
    /// Create a stream state that publishes under `message_id`
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            response: OllamaResponse::default(),
            lines: 0,
        }
    }

    /// Whether the stream has delivered its final line
    pub const fn is_done(&self) -> bool {
        self.response.done
    }

    /// Fold one decoded line, returning the progress it produced
    pub fn apply(&mut self, line: OllamaResponse) -> Vec<CompletionProgress> {
        self.lines += 1;
        let mut progress = Vec::new();

        if !line.message.content.is_empty() {
            progress.push(self.progress(CompletionItem::partial(
                text_item_id(&self.message_id),
                ItemKind::Content(Content::text(line.message.content.clone())),
            )
            .with_has_more(!line.done)));
        }

        // A first line that is already complete is a single-shot answer
        if self.lines == 1 && line.done && !line.message.content.is_empty() {
            self.response = line;
            return progress;
        }

        let current = &mut self.response;
        current.message.content.push_str(&line.message.content);
        if current.model.is_empty() {
            current.model = line.model;
        }
        if current.message.role.is_empty() {
            current.message.role = line.message.role;
        }
        if !line.message.tool_calls.is_empty() {
            current.message.tool_calls = line.message.tool_calls;
            for (index, call) in current.message.tool_calls.clone().into_iter().enumerate() {
                let item = CompletionItem::new(
                    tool_item_id(&self.message_id, index),
                    tool_call(&self.message_id, index, call),
                )
                .with_has_more(!line.done);
                progress.push(CompletionProgress::assistant(&current.model, &self.message_id, item));
            }
        }
        if line.done {
            current.done = true;
            current.done_reason = line.done_reason;
        }

        progress
    }

    fn progress(&self, item: CompletionItem) -> CompletionProgress {
        CompletionProgress::assistant(&self.response.model, &self.message_id, item)
    }

    /// Trailing newline published once after a successful stream
    pub fn closing_progress(&self) -> Option<CompletionProgress> {
        if self.response.message.content.is_empty() {
            return None;
        }
        Some(self.progress(CompletionItem::partial(
            text_item_id(&self.message_id),
            ItemKind::Content(Content::text("\n")),
        )
        .with_has_more(false)))
    }

    /// The assembled response, falling back to `model` when none was reported
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::NoContent`] if the stream produced neither text
    /// nor tool calls.
    pub fn finish(mut self, model: &str) -> Result<OllamaResponse, LlmError> {
        if self.response.message.content.is_empty() && self.response.message.tool_calls.is_empty() {
            return Err(LlmError::NoContent(
                "no response content received from Ollama".to_owned(),
            ));
        }
        if self.response.model.is_empty() {
            model.clone_into(&mut self.response.model);
        }
        Ok(self.response)
    }
}
