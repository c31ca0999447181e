//! Conversion between canonical types and Anthropic wire format

use std::collections::BTreeMap;

use crate::error::LlmError;
use crate::protocol::anthropic::{
    AnthropicContentBlock, AnthropicImageSource, AnthropicMessage, AnthropicMetadata, AnthropicRequest,
    AnthropicResponse, AnthropicResponseBlock, AnthropicStreamDelta, AnthropicStreamEvent, AnthropicTool,
    AnthropicToolChoice,
};
use crate::types::{
    CompletionItem, CompletionProgress, CompletionRequest, CompletionResponse, Content, ItemKind, Message, Role,
    ToolCall,
};

/// Default max tokens when not specified (Anthropic requires this field)
const DEFAULT_MAX_TOKENS: u32 = 64_000;

// -- Outbound: canonical request -> Anthropic wire format --

impl TryFrom<&CompletionRequest> for AnthropicRequest {
    type Error = LlmError;

    fn try_from(req: &CompletionRequest) -> Result<Self, Self::Error> {
        let mut messages: Vec<AnthropicMessage> = Vec::new();

        for message in &req.input {
            for item in &message.items {
                let (role, block) = match &item.kind {
                    ItemKind::Content(content) => (message.role, content_to_block(content)),
                    ItemKind::Message(sampling) => (sampling.role, content_to_block(&sampling.content)),
                    ItemKind::ToolCall(call) => (
                        Role::Assistant,
                        Some(AnthropicContentBlock::ToolUse {
                            id: call.call_id.clone(),
                            name: call.name.clone(),
                            input: super::parse_arguments(call)?,
                        }),
                    ),
                    ItemKind::ToolCallResult(result) => (
                        Role::User,
                        Some(AnthropicContentBlock::ToolResult {
                            tool_use_id: result.call_id.clone(),
                            content: result.output.content.iter().filter_map(content_to_block).collect(),
                            is_error: result.output.is_error,
                        }),
                    ),
                    ItemKind::Reasoning(_) => (message.role, None),
                };

                if let Some(block) = block {
                    push_block(&mut messages, role, block);
                }
            }
        }

        if req.output_schema.is_some() {
            tracing::debug!(model = %req.model, "output schema is not supported by Anthropic, ignoring");
        }

        Ok(Self {
            model: req.model.clone(),
            max_tokens: req.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: req.system_prompt.clone().filter(|s| !s.is_empty()),
            messages,
            temperature: req.temperature,
            top_p: req.top_p,
            stream: true,
            tools: req
                .tools
                .iter()
                .map(|tool| AnthropicTool {
                    name: tool.name.clone(),
                    description: Some(tool.description.clone()).filter(|d| !d.is_empty()),
                    input_schema: tool
                        .parameters
                        .clone()
                        .unwrap_or_else(|| serde_json::json!({"type": "object", "properties": {}})),
                })
                .collect(),
            tool_choice: req.tool_choice.as_deref().map(tool_choice),
            metadata: req
                .metadata
                .get("user_id")
                .and_then(serde_json::Value::as_str)
                .map(|user_id| AnthropicMetadata {
                    user_id: user_id.to_owned(),
                }),
        })
    }
}

/// Append a block, merging consecutive turns of the same role
fn push_block(messages: &mut Vec<AnthropicMessage>, role: Role, block: AnthropicContentBlock) {
    let role = match role {
        Role::Assistant => "assistant",
        Role::User | Role::System => "user",
    };

    match messages.last_mut() {
        Some(last) if last.role == role => last.content.push(block),
        _ => messages.push(AnthropicMessage {
            role: role.to_owned(),
            content: vec![block],
        }),
    }
}

/// Convert canonical content to an Anthropic block, if representable
fn content_to_block(content: &Content) -> Option<AnthropicContentBlock> {
    match content {
        Content::Text { text } => Some(AnthropicContentBlock::Text { text: text.clone() }),
        Content::Image { data, mime_type } => Some(AnthropicContentBlock::Image {
            source: AnthropicImageSource {
                source_type: "base64".to_owned(),
                media_type: Some(mime_type.clone()),
                data: data.clone(),
            },
        }),
        Content::Resource { resource } => {
            if let Some(text) = &resource.text {
                return Some(AnthropicContentBlock::Text { text: text.clone() });
            }
            match (&resource.blob, resource.mime_type.as_deref()) {
                (Some(blob), Some(mime)) if mime.starts_with("image/") => Some(AnthropicContentBlock::Image {
                    source: AnthropicImageSource {
                        source_type: "base64".to_owned(),
                        media_type: Some(mime.to_owned()),
                        data: blob.clone(),
                    },
                }),
                _ => {
                    tracing::debug!(uri = %resource.uri, "skipping binary resource unsupported by Anthropic");
                    None
                }
            }
        }
        Content::Audio { .. } => {
            tracing::debug!("skipping audio content unsupported by Anthropic");
            None
        }
    }
}

/// Map a canonical tool choice to Anthropic's format
fn tool_choice(choice: &str) -> AnthropicToolChoice {
    let (choice_type, name) = match choice {
        "auto" | "none" => (choice, None),
        "required" => ("any", None),
        name => ("tool", Some(name.to_owned())),
    };
    AnthropicToolChoice {
        choice_type: choice_type.to_owned(),
        name,
    }
}

// -- Inbound: Anthropic wire format -> canonical response --

impl From<AnthropicResponse> for CompletionResponse {
    fn from(resp: AnthropicResponse) -> Self {
        let items = resp
            .content
            .into_iter()
            .enumerate()
            .map(|(index, block)| {
                let id = format!("{}-{index}", resp.id);
                match block {
                    AnthropicResponseBlock::Text { text } => CompletionItem::text(id, text),
                    AnthropicResponseBlock::ToolUse { id: call_id, name, input } => CompletionItem::new(
                        id,
                        ItemKind::ToolCall(ToolCall {
                            call_id,
                            name,
                            arguments: input.to_string(),
                        }),
                    ),
                    AnthropicResponseBlock::Image { source } => CompletionItem::new(
                        id,
                        ItemKind::Content(Content::Image {
                            data: source.data,
                            mime_type: source.media_type.unwrap_or_else(|| "image/png".to_owned()),
                        }),
                    ),
                }
            })
            .collect();

        Self {
            model: resp.model,
            output: Message {
                id: resp.id,
                role: Role::from_wire(&resp.role),
                items,
                ..Message::default()
            },
            ..Self::default()
        }
    }
}

// -- Streaming: Anthropic SSE events -> progress --

/// Running state while consuming an Anthropic event stream
///
/// Content slots are keyed by their block index so that tool-call
/// fragments always land in the slot that announced them.
#[derive(Debug, Default)]
pub struct AnthropicStreamState {
    response: AnthropicResponse,
    blocks: BTreeMap<usize, AnthropicResponseBlock>,
    partial_json: String,
}

impl AnthropicStreamState {
    /// Create an empty stream state
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event, returning the progress it produced
    ///
    /// # Errors
    ///
    /// Returns an error if a tool input does not parse as JSON when its
    /// block closes, or if the stream reports an error event.
    pub fn apply(&mut self, event: AnthropicStreamEvent) -> Result<Vec<CompletionProgress>, LlmError> {
        let item = match event {
            AnthropicStreamEvent::MessageStart { message } => {
                self.response = message;
                None
            }
            AnthropicStreamEvent::ContentBlockStart { index, content_block } => {
                self.blocks.insert(index, content_block);
                self.partial_json.clear();
                None
            }
            AnthropicStreamEvent::ContentBlockDelta { index, delta } => self.apply_delta(index, delta),
            AnthropicStreamEvent::ContentBlockStop { index } => self.close_block(index)?,
            AnthropicStreamEvent::MessageDelta { delta, usage } => {
                if delta.stop_reason.is_some() {
                    self.response.stop_reason = delta.stop_reason;
                }
                if delta.stop_sequence.is_some() {
                    self.response.stop_sequence = delta.stop_sequence;
                }
                if let Some(usage) = usage {
                    if usage.input_tokens > 0 {
                        self.response.usage.input_tokens = usage.input_tokens;
                    }
                    self.response.usage.output_tokens = usage.output_tokens;
                }
                None
            }
            AnthropicStreamEvent::MessageStop | AnthropicStreamEvent::Ping => None,
            AnthropicStreamEvent::Error { error } => {
                return Err(LlmError::Provider(format!(
                    "anthropic stream error: {}: {}",
                    error.error_type, error.message
                )));
            }
        };

        Ok(item
            .map(|item| CompletionProgress::assistant(&self.response.model, &self.response.id, item))
            .into_iter()
            .collect())
    }

    fn slot_id(&self, index: usize) -> String {
        format!("{}-{index}", self.response.id)
    }

    fn apply_delta(&mut self, index: usize, delta: AnthropicStreamDelta) -> Option<CompletionItem> {
        let id = self.slot_id(index);
        match (self.blocks.get_mut(&index), delta) {
            (Some(AnthropicResponseBlock::Text { text }), AnthropicStreamDelta::TextDelta { text: fragment }) => {
                text.push_str(&fragment);
                Some(CompletionItem::partial(id, ItemKind::Content(Content::text(fragment))))
            }
            (
                Some(AnthropicResponseBlock::ToolUse { id: call_id, name, .. }),
                AnthropicStreamDelta::InputJsonDelta { partial_json },
            ) => {
                self.partial_json.push_str(&partial_json);
                Some(CompletionItem::partial(
                    id,
                    ItemKind::ToolCall(ToolCall {
                        call_id: call_id.clone(),
                        name: name.clone(),
                        arguments: partial_json,
                    }),
                ))
            }
            (_, delta) => {
                tracing::debug!(index, ?delta, "delta does not match content block, skipping");
                None
            }
        }
    }

    fn close_block(&mut self, index: usize) -> Result<Option<CompletionItem>, LlmError> {
        let id = self.slot_id(index);
        let item = match self.blocks.get_mut(&index) {
            Some(AnthropicResponseBlock::ToolUse { id: call_id, name, input }) => {
                if !self.partial_json.is_empty() {
                    *input = serde_json::from_str(&self.partial_json).map_err(|e| {
                        LlmError::Streaming(format!("failed to unmarshal function call arguments: {e}"))
                    })?;
                    self.partial_json.clear();
                }
                Some(ItemKind::ToolCall(ToolCall {
                    call_id: call_id.clone(),
                    name: name.clone(),
                    arguments: input.to_string(),
                }))
            }
            Some(AnthropicResponseBlock::Text { text }) => Some(ItemKind::Content(Content::text(text.clone()))),
            Some(AnthropicResponseBlock::Image { .. }) | None => None,
        };

        Ok(item.map(|kind| CompletionItem::new(id, kind).with_has_more(true)))
    }

    /// Assemble the final response from all slots
    pub fn finish(mut self) -> AnthropicResponse {
        self.response.content = self.blocks.into_values().collect();
        self.response
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::{CallResult, ToolCallResult, ToolUseDefinition};

    fn event(value: serde_json::Value) -> AnthropicStreamEvent {
        serde_json::from_value(value).unwrap()
    }

    fn started_state() -> AnthropicStreamState {
        let mut state = AnthropicStreamState::new();
        state
            .apply(event(json!({
                "type": "message_start",
                "message": {"id": "msg_1", "type": "message", "role": "assistant", "model": "claude-x",
                            "content": [], "usage": {"input_tokens": 12, "output_tokens": 1}}
            })))
            .unwrap();
        state
    }

    fn user(text: &str) -> Message {
        Message::new("u1", Role::User).with_item(CompletionItem::text("i1", text))
    }

    #[test]
    fn request_defaults_and_mappings() {
        let req = CompletionRequest {
            model: "claude-sonnet-4-5".to_owned(),
            input: vec![user("hi")],
            system_prompt: Some("be brief".to_owned()),
            tool_choice: Some("required".to_owned()),
            tools: vec![ToolUseDefinition {
                name: "lookup".to_owned(),
                ..ToolUseDefinition::default()
            }],
            ..CompletionRequest::default()
        };

        let wire = AnthropicRequest::try_from(&req).unwrap();

        assert_eq!(wire.max_tokens, 64_000);
        assert!(wire.stream);
        assert_eq!(wire.system.as_deref(), Some("be brief"));
        assert_eq!(wire.tool_choice.unwrap().choice_type, "any");
        assert_eq!(wire.tools[0].input_schema, json!({"type": "object", "properties": {}}));
        assert_eq!(wire.messages.len(), 1);
        assert_eq!(wire.messages[0].role, "user");
    }

    #[test]
    fn named_tool_choice() {
        let choice = tool_choice("lookup");
        assert_eq!(choice.choice_type, "tool");
        assert_eq!(choice.name.as_deref(), Some("lookup"));
    }

    #[test]
    fn tool_round_trip_groups_by_role() {
        let call = ToolCall {
            call_id: "toolu_1".to_owned(),
            name: "lookup".to_owned(),
            arguments: r#"{"q":"rust"}"#.to_owned(),
        };
        let assistant = Message::new("a1", Role::Assistant)
            .with_item(CompletionItem::text("t", "Let me check"))
            .with_item(CompletionItem::new("c", ItemKind::ToolCall(call)));
        let result = Message::new("r1", Role::User).with_item(CompletionItem::new(
            "r",
            ItemKind::ToolCallResult(ToolCallResult {
                call_id: "toolu_1".to_owned(),
                output_role: None,
                output: CallResult {
                    content: vec![Content::text("found")],
                    is_error: false,
                },
            }),
        ));
        let req = CompletionRequest {
            model: "claude-x".to_owned(),
            input: vec![user("search"), assistant, result],
            ..CompletionRequest::default()
        };

        let wire = AnthropicRequest::try_from(&req).unwrap();

        let roles: Vec<_> = wire.messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "assistant", "user"]);
        assert_eq!(wire.messages[1].content.len(), 2);
        assert_eq!(
            wire.messages[1].content[1],
            AnthropicContentBlock::ToolUse {
                id: "toolu_1".to_owned(),
                name: "lookup".to_owned(),
                input: json!({"q": "rust"}),
            }
        );
        assert!(matches!(
            &wire.messages[2].content[0],
            AnthropicContentBlock::ToolResult { tool_use_id, .. } if tool_use_id == "toolu_1"
        ));
    }

    #[test]
    fn malformed_tool_arguments_fail_translation() {
        let req = CompletionRequest {
            model: "claude-x".to_owned(),
            input: vec![Message::new("a", Role::Assistant).with_item(CompletionItem::new(
                "c",
                ItemKind::ToolCall(ToolCall {
                    call_id: "toolu_1".to_owned(),
                    name: "lookup".to_owned(),
                    arguments: "{not json".to_owned(),
                }),
            ))],
            ..CompletionRequest::default()
        };

        let err = AnthropicRequest::try_from(&req).unwrap_err();
        assert!(matches!(err, LlmError::Translation(_)));
    }

    #[test]
    fn text_deltas_publish_fragments() {
        let mut state = started_state();
        state
            .apply(event(json!({"type": "content_block_start", "index": 0,
                                 "content_block": {"type": "text", "text": ""}})))
            .unwrap();

        let progress = state
            .apply(event(json!({"type": "content_block_delta", "index": 0,
                                 "delta": {"type": "text_delta", "text": "Hel"}})))
            .unwrap();
        state
            .apply(event(json!({"type": "content_block_delta", "index": 0,
                                 "delta": {"type": "text_delta", "text": "lo"}})))
            .unwrap();

        assert_eq!(progress.len(), 1);
        assert_eq!(progress[0].message_id, "msg_1");
        assert_eq!(progress[0].model, "claude-x");
        assert_eq!(progress[0].item.id, "msg_1-0");
        assert!(progress[0].item.partial);
        assert_eq!(progress[0].item.kind, ItemKind::Content(Content::text("Hel")));

        let stop = state.apply(event(json!({"type": "content_block_stop", "index": 0}))).unwrap();
        assert!(!stop[0].item.partial);
        assert_eq!(stop[0].item.kind, ItemKind::Content(Content::text("Hello")));

        let response: CompletionResponse = state.finish().into();
        assert_eq!(response.output.items, vec![CompletionItem::text("msg_1-0", "Hello")]);
    }

    #[test]
    fn tool_input_is_parsed_on_block_stop() {
        let mut state = started_state();
        state
            .apply(event(json!({"type": "content_block_start", "index": 1,
                                 "content_block": {"type": "tool_use", "id": "toolu_9", "name": "lookup", "input": {}}})))
            .unwrap();

        let first = state
            .apply(event(json!({"type": "content_block_delta", "index": 1,
                                 "delta": {"type": "input_json_delta", "partial_json": "{\"q\":"}})))
            .unwrap();
        state
            .apply(event(json!({"type": "content_block_delta", "index": 1,
                                 "delta": {"type": "input_json_delta", "partial_json": "\"rust\"}"}})))
            .unwrap();

        assert_eq!(
            first[0].item.kind,
            ItemKind::ToolCall(ToolCall {
                call_id: "toolu_9".to_owned(),
                name: "lookup".to_owned(),
                arguments: "{\"q\":".to_owned(),
            })
        );

        let stop = state.apply(event(json!({"type": "content_block_stop", "index": 1}))).unwrap();
        assert!(!stop[0].item.partial);

        state
            .apply(event(json!({"type": "message_delta", "delta": {"stop_reason": "tool_use"},
                                 "usage": {"output_tokens": 30}})))
            .unwrap();
        let wire = state.finish();
        assert_eq!(wire.stop_reason.as_deref(), Some("tool_use"));
        assert_eq!(wire.usage.output_tokens, 30);
        assert_eq!(wire.usage.input_tokens, 12);

        let response: CompletionResponse = wire.into();
        assert_eq!(
            response.output.items[0].kind,
            ItemKind::ToolCall(ToolCall {
                call_id: "toolu_9".to_owned(),
                name: "lookup".to_owned(),
                arguments: r#"{"q":"rust"}"#.to_owned(),
            })
        );
        assert_eq!(response.output.items[0].id, "msg_1-1");
    }

    #[test]
    fn invalid_tool_input_is_a_hard_error() {
        let mut state = started_state();
        state
            .apply(event(json!({"type": "content_block_start", "index": 0,
                                 "content_block": {"type": "tool_use", "id": "t", "name": "n", "input": {}}})))
            .unwrap();
        state
            .apply(event(json!({"type": "content_block_delta", "index": 0,
                                 "delta": {"type": "input_json_delta", "partial_json": "{\"q\""}})))
            .unwrap();

        let err = state
            .apply(event(json!({"type": "content_block_stop", "index": 0})))
            .unwrap_err();
        assert!(err.to_string().contains("failed to unmarshal function call arguments"));
    }

    #[test]
    fn error_event_aborts_stream() {
        let mut state = started_state();
        let err = state
            .apply(event(json!({"type": "error",
                                 "error": {"type": "overloaded_error", "message": "Overloaded"}})))
            .unwrap_err();
        assert_eq!(err.to_string(), "anthropic stream error: overloaded_error: Overloaded");
    }

    #[test]
    fn inert_events_produce_nothing() {
        let mut state = started_state();
        assert!(state.apply(event(json!({"type": "ping"}))).unwrap().is_empty());
        assert!(state.apply(event(json!({"type": "message_stop"}))).unwrap().is_empty());
    }
}
