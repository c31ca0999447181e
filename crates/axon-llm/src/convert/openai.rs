//! Conversion between canonical types and `OpenAI` Chat Completions wire format

use std::collections::BTreeMap;

use jiff::Timestamp;

use crate::error::LlmError;
use crate::protocol::openai::{
    OpenAiChoice, OpenAiChoiceMessage, OpenAiContent, OpenAiContentPart, OpenAiFile, OpenAiFunction,
    OpenAiFunctionCall, OpenAiImageUrl, OpenAiInputAudio, OpenAiJsonSchema, OpenAiMessage, OpenAiRequest,
    OpenAiResponse, OpenAiResponseFormat, OpenAiStreamChunk, OpenAiStreamOptions, OpenAiStreamToolCall, OpenAiTool,
    OpenAiToolCall,
};
use crate::types::{
    CompletionItem, CompletionProgress, CompletionRequest, CompletionResponse, Content, ItemKind, Message, Reasoning,
    Role, SummaryText, ToolCall,
};

/// Default completion budget when the request leaves it open
const DEFAULT_MAX_COMPLETION_TOKENS: u32 = 4096;

/// Name used for output schemas that do not carry one
const DEFAULT_SCHEMA_NAME: &str = "output-schema";

/// Text sent for a tool result that produced no text
const EMPTY_TOOL_RESULT: &str = "Tool execution completed";

/// Prefix marking refusal text in canonical output
const REFUSAL_PREFIX: &str = "REFUSAL: ";

// -- Outbound: canonical request -> OpenAI wire format --

impl TryFrom<&CompletionRequest> for OpenAiRequest {
    type Error = LlmError;

    fn try_from(req: &CompletionRequest) -> Result<Self, Self::Error> {
        let mut messages = Vec::new();

        if let Some(system) = req.system_prompt.as_deref().filter(|s| !s.is_empty()) {
            messages.push(OpenAiMessage {
                role: "system".to_owned(),
                content: Some(OpenAiContent::Text(system.to_owned())),
                tool_calls: Vec::new(),
                tool_call_id: None,
            });
        }

        for message in &req.input {
            push_message(&mut messages, message);
        }

        let response_format = match &req.output_schema {
            Some(schema) => {
                super::check_output_schema(schema)?;
                Some(OpenAiResponseFormat::JsonSchema {
                    json_schema: OpenAiJsonSchema {
                        name: if schema.name.is_empty() {
                            DEFAULT_SCHEMA_NAME.to_owned()
                        } else {
                            schema.name.clone()
                        },
                        description: Some(schema.description.clone()).filter(|d| !d.is_empty()),
                        schema: schema.schema.clone(),
                        strict: schema.strict,
                    },
                })
            }
            None => None,
        };

        Ok(Self {
            model: req.model.clone(),
            messages,
            temperature: req.temperature,
            top_p: req.top_p,
            max_completion_tokens: Some(req.max_tokens.unwrap_or(DEFAULT_MAX_COMPLETION_TOKENS)),
            stream: true,
            tools: req
                .tools
                .iter()
                .map(|tool| OpenAiTool {
                    tool_type: "function".to_owned(),
                    function: OpenAiFunction {
                        name: tool.name.clone(),
                        description: Some(tool.description.clone()).filter(|d| !d.is_empty()),
                        parameters: tool.parameters.clone(),
                    },
                })
                .collect(),
            tool_choice: req.tool_choice.as_deref().map(|choice| match choice {
                "auto" | "none" | "required" => serde_json::Value::String(choice.to_owned()),
                name => serde_json::json!({"type": "function", "function": {"name": name}}),
            }),
            response_format,
            stream_options: Some(OpenAiStreamOptions { include_usage: true }),
        })
    }
}

/// Append the wire messages for one canonical turn
///
/// Content parts and tool calls of a turn share one message; each tool
/// result becomes its own `tool` message after it.
fn push_message(messages: &mut Vec<OpenAiMessage>, message: &Message) {
    let mut parts = Vec::new();
    let mut tool_calls = Vec::new();
    let mut trailing = Vec::new();

    for item in &message.items {
        match &item.kind {
            ItemKind::Content(content) => parts.extend(content_part(content)),
            ItemKind::Message(sampling) => trailing.push(OpenAiMessage {
                role: sampling.role.as_str().to_owned(),
                content: content_part(&sampling.content).map(|part| message_content(vec![part])),
                tool_calls: Vec::new(),
                tool_call_id: None,
            }),
            ItemKind::ToolCall(call) => tool_calls.push(OpenAiToolCall {
                id: call.call_id.clone(),
                tool_type: "function".to_owned(),
                function: OpenAiFunctionCall {
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                },
            }),
            ItemKind::ToolCallResult(result) => {
                let text = super::result_text(&result.output);
                trailing.push(OpenAiMessage {
                    role: "tool".to_owned(),
                    content: Some(OpenAiContent::Text(if text.is_empty() {
                        EMPTY_TOOL_RESULT.to_owned()
                    } else {
                        text
                    })),
                    tool_calls: Vec::new(),
                    tool_call_id: Some(result.call_id.clone()),
                });
            }
            ItemKind::Reasoning(_) => {}
        }
    }

    if !parts.is_empty() || !tool_calls.is_empty() {
        messages.push(OpenAiMessage {
            role: message.role.as_str().to_owned(),
            content: (!parts.is_empty()).then(|| message_content(parts)),
            tool_calls,
            tool_call_id: None,
        });
    }
    messages.extend(trailing);
}

/// Collapse a lone text part to plain string content
fn message_content(mut parts: Vec<OpenAiContentPart>) -> OpenAiContent {
    if parts.len() == 1 && matches!(parts[0], OpenAiContentPart::Text { .. }) {
        if let Some(OpenAiContentPart::Text { text }) = parts.pop() {
            return OpenAiContent::Text(text);
        }
    }
    OpenAiContent::Parts(parts)
}

fn content_part(content: &Content) -> Option<OpenAiContentPart> {
    match content {
        Content::Text { text } => Some(OpenAiContentPart::Text { text: text.clone() }),
        Content::Image { .. } => content.to_data_url().map(|url| OpenAiContentPart::ImageUrl {
            image_url: OpenAiImageUrl { url },
        }),
        Content::Audio { data, mime_type } => Some(OpenAiContentPart::InputAudio {
            input_audio: OpenAiInputAudio {
                data: data.clone(),
                format: audio_format(mime_type).to_owned(),
            },
        }),
        Content::Resource { resource } => {
            if let Some(text) = &resource.text {
                return Some(OpenAiContentPart::Text { text: text.clone() });
            }
            let blob = resource.blob.as_ref()?;
            let mime = resource.mime_type.as_deref().unwrap_or("application/octet-stream");
            Some(OpenAiContentPart::File {
                file: OpenAiFile {
                    filename: Some(resource.uri.clone()).filter(|uri| !uri.is_empty()),
                    file_data: format!("data:{mime};base64,{blob}"),
                },
            })
        }
    }
}

/// Audio format name from a MIME type
fn audio_format(mime_type: &str) -> &str {
    match mime_type {
        "audio/mpeg" | "audio/mp3" => "mp3",
        other => other.strip_prefix("audio/").unwrap_or(other),
    }
}

// -- Inbound: OpenAI wire format -> canonical response --

impl From<OpenAiResponse> for CompletionResponse {
    fn from(resp: OpenAiResponse) -> Self {
        let mut items = Vec::new();

        if let Some(choice) = resp.choices.into_iter().next() {
            let message = choice.message;
            if let Some(reasoning) = message.reasoning.filter(|r| !r.is_empty()) {
                items.push(CompletionItem::new(
                    format!("{}-reasoning", resp.id),
                    ItemKind::Reasoning(Reasoning {
                        encrypted_content: String::new(),
                        summary: vec![SummaryText { text: reasoning }],
                    }),
                ));
            }
            if !message.content.is_empty() {
                items.push(CompletionItem::text(format!("{}-content", resp.id), message.content));
            }
            if let Some(refusal) = message.refusal.filter(|r| !r.is_empty()) {
                items.push(CompletionItem::text(
                    format!("{}-refusal", resp.id),
                    format!("{REFUSAL_PREFIX}{refusal}"),
                ));
            }
            for (index, call) in message.tool_calls.into_iter().enumerate() {
                items.push(CompletionItem::new(
                    format!("{}-tool-{index}", resp.id),
                    ItemKind::ToolCall(ToolCall {
                        call_id: call.id,
                        name: call.function.name,
                        arguments: call.function.arguments,
                    }),
                ));
            }
        }

        Self {
            model: resp.model,
            output: Message {
                id: resp.id,
                created: (resp.created > 0)
                    .then(|| Timestamp::from_second(resp.created).ok())
                    .flatten(),
                role: Role::Assistant,
                items,
                has_more: false,
            },
            ..Self::default()
        }
    }
}

// -- Streaming: OpenAI SSE chunks -> progress --

/// Running state while consuming a Chat Completions chunk stream
#[derive(Debug, Default)]
pub struct CompletionsStreamState {
    response: Option<OpenAiResponse>,
    tool_calls: BTreeMap<usize, OpenAiToolCall>,
}

impl CompletionsStreamState {
    /// Create an empty stream state
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one chunk, returning the progress it produced
    pub fn apply(&mut self, chunk: OpenAiStreamChunk) -> Vec<CompletionProgress> {
        let response = self.response.get_or_insert_with(|| OpenAiResponse {
            id: chunk.id.clone(),
            created: chunk.created,
            model: chunk.model.clone(),
            choices: vec![OpenAiChoice {
                index: 0,
                message: OpenAiChoiceMessage {
                    role: "assistant".to_owned(),
                    ..OpenAiChoiceMessage::default()
                },
                finish_reason: None,
            }],
            usage: None,
        });

        if chunk.usage.is_some() {
            response.usage = chunk.usage;
        }

        let id = response.id.clone();
        let model = response.model.clone();
        let mut items = Vec::new();

        for choice in chunk.choices {
            if choice.index != 0 {
                tracing::debug!(index = choice.index, "ignoring additional choice");
                continue;
            }
            let Some(target) = response.choices.first_mut() else {
                continue;
            };
            let message = &mut target.message;
            let delta = choice.delta;
            let has_more = choice.finish_reason.is_none();

            if let Some(role) = delta.role.filter(|_| message.role.is_empty()) {
                message.role = role;
            }

            if let Some(fragment) = delta.reasoning.filter(|r| !r.is_empty()) {
                let reasoning = message.reasoning.get_or_insert_with(String::new);
                reasoning.push_str(&fragment);
                items.push(
                    CompletionItem::new(
                        format!("{id}-reasoning"),
                        ItemKind::Reasoning(Reasoning {
                            encrypted_content: String::new(),
                            summary: vec![SummaryText {
                                text: reasoning.clone(),
                            }],
                        }),
                    )
                    .with_has_more(has_more),
                );
            }

            if let Some(fragment) = delta.content.filter(|c| !c.is_empty()) {
                message.content.push_str(&fragment);
                items.push(
                    CompletionItem::partial(format!("{id}-content"), ItemKind::Content(Content::text(fragment)))
                        .with_has_more(has_more),
                );
            }

            if let Some(fragment) = delta.refusal.filter(|r| !r.is_empty()) {
                let refusal = message.refusal.get_or_insert_with(String::new);
                refusal.push_str(&fragment);
                items.push(
                    CompletionItem::text(format!("{id}-refusal"), format!("{REFUSAL_PREFIX}{refusal}"))
                        .with_has_more(has_more),
                );
            }

            for (position, call) in delta.tool_calls.unwrap_or_default().into_iter().enumerate() {
                let index = call.index.unwrap_or(position);
                items.push(
                    merge_tool_call(&mut self.tool_calls, index, call, &id).with_has_more(has_more),
                );
            }

            if let Some(reason) = choice.finish_reason {
                target.finish_reason = Some(reason);
                if !target.message.content.is_empty() {
                    items.push(CompletionItem::text(
                        format!("{id}-content"),
                        target.message.content.clone(),
                    ));
                }
                if let Some(refusal) = target.message.refusal.as_ref().filter(|r| !r.is_empty()) {
                    items.push(CompletionItem::text(
                        format!("{id}-refusal"),
                        format!("{REFUSAL_PREFIX}{refusal}"),
                    ));
                }
                for (index, call) in &self.tool_calls {
                    items.push(CompletionItem::new(
                        format!("{id}-tool-{index}"),
                        ItemKind::ToolCall(ToolCall {
                            call_id: call.id.clone(),
                            name: call.function.name.clone(),
                            arguments: call.function.arguments.clone(),
                        }),
                    ));
                }
            }
        }

        items
            .into_iter()
            .map(|item| CompletionProgress::assistant(&model, &id, item))
            .collect()
    }

    /// Assemble the final response, flattening tool calls in index order
    ///
    /// # Errors
    ///
    /// Returns an error if no chunk was ever received.
    pub fn finish(self) -> Result<OpenAiResponse, LlmError> {
        let mut response = self
            .response
            .ok_or_else(|| LlmError::Streaming("stream ended before any chunk was received".to_owned()))?;
        if let Some(choice) = response.choices.first_mut() {
            choice.message.tool_calls = self.tool_calls.into_values().collect();
        }
        Ok(response)
    }
}

/// Fold a tool-call delta into its indexed record, returning the partial item
fn merge_tool_call(
    records: &mut BTreeMap<usize, OpenAiToolCall>,
    index: usize,
    delta: OpenAiStreamToolCall,
    response_id: &str,
) -> CompletionItem {
    let fragment = delta
        .function
        .as_ref()
        .and_then(|f| f.arguments.clone())
        .unwrap_or_default();

    let record = records.entry(index).or_insert_with(|| OpenAiToolCall {
        id: delta.id.clone().unwrap_or_default(),
        tool_type: delta.tool_type.clone().unwrap_or_else(|| "function".to_owned()),
        function: OpenAiFunctionCall {
            name: delta.function.as_ref().and_then(|f| f.name.clone()).unwrap_or_default(),
            arguments: String::new(),
        },
    });
    record.function.arguments.push_str(&fragment);

    CompletionItem::partial(
        format!("{response_id}-tool-{index}"),
        ItemKind::ToolCall(ToolCall {
            call_id: record.id.clone(),
            name: record.function.name.clone(),
            arguments: fragment,
        }),
    )
}
