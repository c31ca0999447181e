//! Conversion between canonical types and the `OpenAI` Responses wire format

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use base64::Engine as _;
use jiff::Timestamp;
use regex::Regex;

use crate::error::LlmError;
use crate::protocol::responses::{
    ComputerScreenshot, ContentPart, FunctionTool, ReasoningConfig, ResponseItem, ResponsesRequest, ResponsesResponse,
    ResponsesStreamEvent, ResponsesTool, ResponsesToolChoice, SummaryPart, TextFormat, TextFormatting,
    ToolChoiceTarget,
};
use crate::types::{
    CompletionItem, CompletionProgress, CompletionRequest, CompletionResponse, Content, ItemKind, Message, Reasoning,
    Role, SummaryText, ToolCall, ToolCallResult, ToolUseDefinition, request::TOOL_TYPE_ATTRIBUTE,
};

/// Models that accept reasoning directives
static REASONING_MODEL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(o\d|gpt-5|codex)").unwrap());

/// Tool choices that name a hosted tool rather than a function
const HOSTED_TOOL_CHOICES: &[&str] = &["file_search", "web_search_preview", "computer_use_preview"];

/// Output sent for a tool result without usable content
const COMPLETED_PLACEHOLDER: &str = "completed";

const DEFAULT_REASONING_EFFORT: &str = "medium";
const DEFAULT_REASONING_SUMMARY: &str = "auto";
const DEFAULT_SCHEMA_NAME: &str = "output-schema";
const REFUSAL_PREFIX: &str = "REFUSAL: ";

/// Whether the model accepts reasoning directives
pub fn is_reasoning_model(model: &str) -> bool {
    REASONING_MODEL.is_match(model)
}

// -- Outbound: canonical request -> Responses wire format --

impl TryFrom<&CompletionRequest> for ResponsesRequest {
    type Error = LlmError;

    fn try_from(req: &CompletionRequest) -> Result<Self, Self::Error> {
        let mut out = Self {
            model: req.model.clone(),
            instructions: req.system_prompt.clone().filter(|s| !s.is_empty()),
            max_output_tokens: req.max_tokens.filter(|&n| n > 0),
            temperature: req.temperature,
            top_p: req.top_p,
            tools: req.tools.iter().map(tool).collect(),
            tool_choice: req.tool_choice.as_deref().map(tool_choice),
            truncation: req.truncation.clone().filter(|t| !t.is_empty()),
            metadata: req
                .metadata
                .iter()
                .map(|(key, value)| {
                    let value = match value {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (key.clone(), value)
                })
                .collect(),
            store: false,
            stream: true,
            ..Self::default()
        };

        if is_reasoning_model(&req.model) {
            let directives = req.reasoning.as_ref();
            out.include.push("reasoning.encrypted_content".to_owned());
            out.reasoning = Some(ReasoningConfig {
                effort: directives
                    .map(|r| r.effort.clone())
                    .filter(|e| !e.is_empty())
                    .unwrap_or_else(|| DEFAULT_REASONING_EFFORT.to_owned()),
                summary: directives
                    .map(|r| r.summary.clone())
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| DEFAULT_REASONING_SUMMARY.to_owned()),
            });
        }

        if let Some(schema) = &req.output_schema {
            super::check_output_schema(schema)?;
            out.text = Some(TextFormatting {
                format: TextFormat::JsonSchema {
                    name: if schema.name.is_empty() {
                        DEFAULT_SCHEMA_NAME.to_owned()
                    } else {
                        schema.name.clone()
                    },
                    description: Some(schema.description.clone()).filter(|d| !d.is_empty()),
                    schema: schema.schema.clone(),
                    strict: schema.strict,
                },
            });
        }

        for message in &req.input {
            for item in &message.items {
                match &item.kind {
                    ItemKind::Content(content) => out.input.extend(message_item(message.role, content)),
                    ItemKind::Message(sampling) => out.input.extend(message_item(sampling.role, &sampling.content)),
                    ItemKind::ToolCall(call) => out.input.push(tool_call_item(req, &item.id, call)?),
                    ItemKind::ToolCallResult(result) => out.input.extend(tool_result_items(req, result)),
                    ItemKind::Reasoning(reasoning) if !reasoning.encrypted_content.is_empty() => {
                        out.input.push(ResponseItem::Reasoning {
                            id: item_id(&item.id),
                            encrypted_content: Some(reasoning.encrypted_content.clone()),
                            summary: reasoning
                                .summary
                                .iter()
                                .map(|s| SummaryPart {
                                    part_type: "summary_text".to_owned(),
                                    text: s.text.clone(),
                                })
                                .collect(),
                        });
                    }
                    ItemKind::Reasoning(_) => {}
                }
            }
        }

        Ok(out)
    }
}

fn item_id(id: &str) -> Option<String> {
    Some(id.to_owned()).filter(|id| !id.is_empty())
}

/// Hosted tools are described entirely by their attributes
fn tool(def: &ToolUseDefinition) -> ResponsesTool {
    let hosted = def
        .attributes
        .get(TOOL_TYPE_ATTRIBUTE)
        .and_then(serde_json::Value::as_str)
        .is_some_and(|kind| kind != "function");

    if hosted {
        let mut attributes = def.attributes.clone();
        if !def.name.is_empty() && !def.is_computer_use() {
            attributes
                .entry("name")
                .or_insert_with(|| serde_json::Value::String(def.name.clone()));
        }
        ResponsesTool::Hosted(attributes)
    } else {
        ResponsesTool::Function(FunctionTool {
            tool_type: "function".to_owned(),
            name: def.name.clone(),
            description: Some(def.description.clone()).filter(|d| !d.is_empty()),
            parameters: def.parameters.clone(),
        })
    }
}

fn tool_choice(choice: &str) -> ResponsesToolChoice {
    match choice {
        "none" | "auto" | "required" => ResponsesToolChoice::Mode(choice.to_owned()),
        hosted if HOSTED_TOOL_CHOICES.contains(&hosted) => ResponsesToolChoice::Tool(ToolChoiceTarget {
            tool_type: hosted.to_owned(),
            name: None,
        }),
        name => ResponsesToolChoice::Tool(ToolChoiceTarget {
            tool_type: "function".to_owned(),
            name: Some(name.to_owned()),
        }),
    }
}

/// Assistant text is replayed as output text, everything else as input
fn message_item(role: Role, content: &Content) -> Option<ResponseItem> {
    if let (Role::Assistant, Content::Text { text }) = (role, content) {
        return Some(ResponseItem::Message {
            id: None,
            role: role.as_str().to_owned(),
            content: vec![ContentPart::OutputText {
                text: text.clone(),
                annotations: Vec::new(),
            }],
        });
    }

    input_part(content).map(|part| ResponseItem::Message {
        id: None,
        role: role.as_str().to_owned(),
        content: vec![part],
    })
}

fn input_part(content: &Content) -> Option<ContentPart> {
    match content {
        Content::Text { text } => Some(ContentPart::InputText { text: text.clone() }),
        Content::Image { .. } => content
            .to_data_url()
            .map(|image_url| ContentPart::InputImage { image_url }),
        Content::Audio { data, .. } => Some(ContentPart::InputFile {
            file_data: Some(data.clone()),
            filename: None,
        }),
        Content::Resource { resource } => {
            let file_data = match (&resource.text, &resource.blob) {
                (Some(text), _) if !text.is_empty() => base64::engine::general_purpose::STANDARD.encode(text),
                (_, Some(blob)) if !blob.is_empty() => blob.clone(),
                _ => {
                    tracing::debug!(uri = %resource.uri, "skipping empty resource");
                    return None;
                }
            };
            Some(ContentPart::InputFile {
                file_data: Some(file_data),
                filename: item_id(&resource.uri),
            })
        }
    }
}

fn tool_call_item(req: &CompletionRequest, id: &str, call: &ToolCall) -> Result<ResponseItem, LlmError> {
    if req.is_computer_use(&call.name) {
        return Ok(ResponseItem::ComputerCall {
            id: item_id(id),
            call_id: call.call_id.clone(),
            action: super::parse_arguments(call)?,
            pending_safety_checks: Vec::new(),
        });
    }

    Ok(ResponseItem::FunctionCall {
        id: item_id(id),
        call_id: call.call_id.clone(),
        name: call.name.clone(),
        arguments: call.arguments.clone(),
    })
}

/// Split a tool result into its call output and any extra content
///
/// The first content of the kind the target tool expects (an image for
/// computer use, text otherwise) answers the call. Remaining content is
/// sent as separate user messages. A result with no matching content is
/// answered with a fixed placeholder.
fn tool_result_items(req: &CompletionRequest, result: &ToolCallResult) -> Vec<ResponseItem> {
    let computer_use = req
        .tool_name_for_call(&result.call_id)
        .is_some_and(|name| req.is_computer_use(name));

    let mut items = Vec::new();
    let mut answered = false;

    for content in &result.output.content {
        if !answered {
            let output = match content {
                Content::Text { text } if !computer_use => Some(ResponseItem::FunctionCallOutput {
                    call_id: result.call_id.clone(),
                    output: text.clone(),
                }),
                Content::Image { .. } if computer_use => {
                    content.to_data_url().map(|image_url| ResponseItem::ComputerCallOutput {
                        call_id: result.call_id.clone(),
                        output: ComputerScreenshot {
                            output_type: "computer_screenshot".to_owned(),
                            image_url,
                        },
                    })
                }
                _ => None,
            };
            if let Some(output) = output {
                items.push(output);
                answered = true;
                continue;
            }
        }

        if let Some(part) = input_part(content) {
            items.push(ResponseItem::Message {
                id: None,
                role: "user".to_owned(),
                content: vec![part],
            });
        }
    }

    if !answered {
        items.push(ResponseItem::FunctionCallOutput {
            call_id: result.call_id.clone(),
            output: COMPLETED_PLACEHOLDER.to_owned(),
        });
    }

    items
}

// -- Inbound: Responses wire format -> canonical response --

/// Convert a final Responses object, naming computer calls from the request
pub fn to_response(req: &CompletionRequest, resp: ResponsesResponse) -> CompletionResponse {
    let computer_tool = req.computer_use_tool().map(|tool| tool.name.as_str());
    let mut output = Message {
        id: resp.id,
        created: resp.created_at.and_then(|secs| Timestamp::from_second(secs).ok()),
        role: Role::Assistant,
        ..Message::default()
    };

    for item in resp.output {
        match item {
            ResponseItem::Message { id, role, content } => {
                let id = id.unwrap_or_default();
                output.items.extend(content.into_iter().filter_map(|part| match part {
                    ContentPart::OutputText { text, .. } => Some(CompletionItem::text(&id, text)),
                    ContentPart::Refusal { refusal } => {
                        Some(CompletionItem::text(&id, format!("{REFUSAL_PREFIX}{refusal}")))
                    }
                    _ => None,
                }));
                output.role = Role::from_wire(&role);
            }
            other => output.items.extend(output_item(computer_tool, other)),
        }
    }

    CompletionResponse {
        model: resp.model,
        output,
        ..CompletionResponse::default()
    }
}

/// Map a non-message output item to a canonical item
fn output_item(computer_tool: Option<&str>, item: ResponseItem) -> Option<CompletionItem> {
    match item {
        ResponseItem::FunctionCall {
            id,
            call_id,
            name,
            arguments,
        } => Some(CompletionItem::new(
            id.unwrap_or_default(),
            ItemKind::ToolCall(ToolCall {
                call_id,
                name,
                arguments,
            }),
        )),
        ResponseItem::ComputerCall { id, call_id, action, .. } => {
            let Some(name) = computer_tool else {
                tracing::debug!(call_id = %call_id, "computer call without a computer-use tool, dropping");
                return None;
            };
            Some(CompletionItem::new(
                id.unwrap_or_default(),
                ItemKind::ToolCall(ToolCall {
                    call_id,
                    name: name.to_owned(),
                    arguments: action.to_string(),
                }),
            ))
        }
        ResponseItem::Reasoning {
            id,
            encrypted_content: Some(encrypted_content),
            summary,
        } => Some(CompletionItem::new(
            id.unwrap_or_default(),
            ItemKind::Reasoning(Reasoning {
                encrypted_content,
                summary: summary.into_iter().map(|part| SummaryText { text: part.text }).collect(),
            }),
        )),
        _ => None,
    }
}

// -- Streaming: Responses SSE events -> progress --

/// Running state while consuming a Responses event stream
#[derive(Debug, Default)]
pub struct ResponsesStreamState {
    computer_tool: Option<String>,
    model: String,
    response_id: String,
    calls: HashMap<String, (String, String)>,
    text: HashMap<String, String>,
    outputs: BTreeMap<usize, ResponseItem>,
    terminal: Option<ResponsesResponse>,
}

impl ResponsesStreamState {
    /// Create a stream state for the given request
    pub fn new(req: &CompletionRequest) -> Self {
        Self {
            computer_tool: req.computer_use_tool().map(|tool| tool.name.clone()),
            model: req.model.clone(),
            ..Self::default()
        }
    }

    /// Apply one event, returning the progress it produced
    ///
    /// # Errors
    ///
    /// Returns an error if the stream reports an `error` event.
    pub fn apply(&mut self, event: ResponsesStreamEvent) -> Result<Vec<CompletionProgress>, LlmError> {
        let item = match event {
            ResponsesStreamEvent::Created { response } => {
                if !response.model.is_empty() {
                    self.model = response.model;
                }
                self.response_id = response.id;
                None
            }
            ResponsesStreamEvent::OutputItemAdded { output_index, item } => {
                if let ResponseItem::FunctionCall {
                    id: Some(id),
                    call_id,
                    name,
                    ..
                } = &item
                {
                    self.calls.insert(id.clone(), (call_id.clone(), name.clone()));
                }
                self.outputs.insert(output_index, item);
                None
            }
            ResponsesStreamEvent::OutputTextDelta { item_id, delta } => {
                self.text.entry(item_id.clone()).or_default().push_str(&delta);
                Some(CompletionItem::partial(item_id, ItemKind::Content(Content::text(delta))))
            }
            ResponsesStreamEvent::FunctionCallArgumentsDelta { item_id, delta } => {
                let (call_id, name) = self.calls.get(&item_id).cloned().unwrap_or_default();
                Some(CompletionItem::partial(
                    item_id,
                    ItemKind::ToolCall(ToolCall {
                        call_id,
                        name,
                        arguments: delta,
                    }),
                ))
            }
            ResponsesStreamEvent::ReasoningSummaryTextDone { item_id, text } => Some(CompletionItem::partial(
                item_id,
                ItemKind::Reasoning(Reasoning {
                    encrypted_content: String::new(),
                    summary: vec![SummaryText { text }],
                }),
            )),
            ResponsesStreamEvent::OutputItemDone { output_index, item } => {
                let finished = self.finished_item(&item);
                self.outputs.insert(output_index, item);
                finished.map(|item| item.with_has_more(true))
            }
            ResponsesStreamEvent::Completed { response }
            | ResponsesStreamEvent::Failed { response }
            | ResponsesStreamEvent::Incomplete { response } => {
                self.terminal = Some(response);
                None
            }
            ResponsesStreamEvent::Error { code, message } => {
                return Err(LlmError::Provider(format!(
                    "responses API error: {} {message}",
                    code.unwrap_or_default()
                )));
            }
            ResponsesStreamEvent::InProgress
            | ResponsesStreamEvent::ContentPartAdded
            | ResponsesStreamEvent::ContentPartDone
            | ResponsesStreamEvent::OutputTextDone
            | ResponsesStreamEvent::OutputTextAnnotationAdded
            | ResponsesStreamEvent::RefusalDelta
            | ResponsesStreamEvent::RefusalDone
            | ResponsesStreamEvent::FunctionCallArgumentsDone
            | ResponsesStreamEvent::ReasoningSummaryPartAdded
            | ResponsesStreamEvent::ReasoningSummaryPartDone
            | ResponsesStreamEvent::ReasoningSummaryTextDelta => None,
        };

        Ok(item
            .map(|item| CompletionProgress::assistant(&self.model, &self.response_id, item))
            .into_iter()
            .collect())
    }

    /// Final payload of a completed output item
    fn finished_item(&self, item: &ResponseItem) -> Option<CompletionItem> {
        match item {
            ResponseItem::Message {
                id: Some(id), content, ..
            } => {
                let mut text: String = content
                    .iter()
                    .filter_map(|part| match part {
                        ContentPart::OutputText { text, .. } => Some(text.as_str()),
                        _ => None,
                    })
                    .collect();
                if text.is_empty() {
                    text = self.text.get(id).cloned().unwrap_or_default();
                }
                Some(CompletionItem::text(id, text))
            }
            other => output_item(self.computer_tool.as_deref(), other.clone()),
        }
    }

    /// The terminal response, with streamed items filling an empty output
    ///
    /// # Errors
    ///
    /// Returns an error if no terminal event arrived, or if the terminal
    /// response carries an error.
    pub fn finish(self) -> Result<ResponsesResponse, LlmError> {
        let mut response = self
            .terminal
            .ok_or_else(|| LlmError::Streaming("stream ended without a final response".to_owned()))?;

        if let Some(error) = &response.error {
            return Err(LlmError::Provider(format!(
                "responses API error: {} {}",
                error.code, error.message
            )));
        }

        if response.output.is_empty() {
            response.output = self.outputs.into_values().collect();
        }
        Ok(response)
    }
}
