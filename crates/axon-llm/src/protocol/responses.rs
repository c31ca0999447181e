//! `OpenAI` Responses API wire format types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// -- Request types --

/// Responses API request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponsesRequest {
    /// Model identifier
    pub model: String,
    /// Input items
    pub input: Vec<ResponseItem>,
    /// System instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Maximum output tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Available tools
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ResponsesTool>,
    /// Tool choice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ResponsesToolChoice>,
    /// Structured output formatting
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<TextFormatting>,
    /// Reasoning configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<ReasoningConfig>,
    /// Extra output to include, e.g. `reasoning.encrypted_content`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    /// String metadata
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Context truncation strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncation: Option<String>,
    /// Whether the response is stored server-side
    pub store: bool,
    /// Whether to stream the response
    pub stream: bool,
}

/// Tool offered to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsesTool {
    /// Function tool
    Function(FunctionTool),
    /// Hosted tool described by its raw attributes
    Hosted(serde_json::Map<String, serde_json::Value>),
}

/// Function tool definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionTool {
    /// Always "function"
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function name
    pub name: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema for parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
}

/// Tool choice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsesToolChoice {
    /// "none", "auto" or "required"
    Mode(String),
    /// Hosted tool or named function
    Tool(ToolChoiceTarget),
}

/// Explicit tool choice target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolChoiceTarget {
    /// Hosted tool type, or "function"
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Output text formatting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFormatting {
    /// Format specification
    pub format: TextFormat,
}

/// Structured output format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextFormat {
    /// Constrain output to a JSON Schema
    JsonSchema {
        /// Schema name
        name: String,
        /// Schema description
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        /// JSON Schema document
        schema: serde_json::Value,
        /// Require strict adherence
        #[serde(default)]
        strict: bool,
    },
}

/// Reasoning configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasoningConfig {
    /// Effort level
    pub effort: String,
    /// Summary mode
    pub summary: String,
}

// -- Items, shared by input and output --

/// Conversation item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseItem {
    /// Input or output message
    Message {
        /// Item identifier (output only)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Author role
        role: String,
        /// Content parts
        content: Vec<ContentPart>,
    },
    /// Function call requested by the model
    FunctionCall {
        /// Item identifier
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Call identifier
        call_id: String,
        /// Function name
        name: String,
        /// JSON-encoded arguments
        #[serde(default)]
        arguments: String,
    },
    /// Result of a function call
    FunctionCallOutput {
        /// Call identifier
        call_id: String,
        /// Output text
        output: String,
    },
    /// Computer-use action requested by the model
    ComputerCall {
        /// Item identifier
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Call identifier
        call_id: String,
        /// Structured action
        #[serde(default)]
        action: serde_json::Value,
        /// Safety checks awaiting acknowledgement
        #[serde(default)]
        pending_safety_checks: Vec<serde_json::Value>,
    },
    /// Screenshot answering a computer call
    ComputerCallOutput {
        /// Call identifier
        call_id: String,
        /// Screenshot
        output: ComputerScreenshot,
    },
    /// Reasoning trace
    Reasoning {
        /// Item identifier
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Opaque continuation data
        #[serde(default, skip_serializing_if = "Option::is_none")]
        encrypted_content: Option<String>,
        /// Summary parts
        #[serde(default)]
        summary: Vec<SummaryPart>,
    },
    /// Hosted tool items and other output this adapter does not map
    #[serde(other)]
    Unsupported,
}

/// Message content part
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// User-supplied text
    InputText {
        /// The text string
        text: String,
    },
    /// User-supplied image
    InputImage {
        /// Image URL or data URI
        image_url: String,
    },
    /// User-supplied file
    InputFile {
        /// Base64 file contents
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_data: Option<String>,
        /// File name
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },
    /// Model-generated text
    OutputText {
        /// The text string
        text: String,
        /// Citations and other annotations
        #[serde(default)]
        annotations: Vec<serde_json::Value>,
    },
    /// Model refusal
    Refusal {
        /// Refusal explanation
        refusal: String,
    },
}

/// Screenshot payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputerScreenshot {
    /// Always "computer_screenshot"
    #[serde(rename = "type")]
    pub output_type: String,
    /// Image URL or data URI
    pub image_url: String,
}

/// Reasoning summary part
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryPart {
    /// Always "summary_text"
    #[serde(rename = "type")]
    pub part_type: String,
    /// Summary text
    pub text: String,
}

// -- Response types --

/// Responses API response object
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponsesResponse {
    /// Response identifier
    pub id: String,
    /// Model used
    #[serde(default)]
    pub model: String,
    /// Creation time in unix seconds
    #[serde(default)]
    pub created_at: Option<i64>,
    /// Lifecycle status
    #[serde(default)]
    pub status: Option<String>,
    /// Output items
    #[serde(default)]
    pub output: Vec<ResponseItem>,
    /// Failure details
    #[serde(default)]
    pub error: Option<ResponsesError>,
    /// Token usage
    #[serde(default)]
    pub usage: Option<serde_json::Value>,
}

/// Error reported by the Responses API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponsesError {
    /// Error code
    #[serde(default)]
    pub code: String,
    /// Error message
    #[serde(default)]
    pub message: String,
}

// -- Streaming types --

/// Responses API stream event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResponsesStreamEvent {
    /// Response created
    #[serde(rename = "response.created")]
    Created {
        /// Initial response state
        response: ResponsesResponse,
    },
    /// Response generation in progress
    #[serde(rename = "response.in_progress")]
    InProgress,
    /// New output item started
    #[serde(rename = "response.output_item.added")]
    OutputItemAdded {
        /// Output position
        output_index: usize,
        /// Initial item state
        item: ResponseItem,
    },
    /// Output item finished
    #[serde(rename = "response.output_item.done")]
    OutputItemDone {
        /// Output position
        output_index: usize,
        /// Final item state
        item: ResponseItem,
    },
    /// Content part started
    #[serde(rename = "response.content_part.added")]
    ContentPartAdded,
    /// Content part finished
    #[serde(rename = "response.content_part.done")]
    ContentPartDone,
    /// Incremental output text
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta {
        /// Owning item
        item_id: String,
        /// Text fragment
        delta: String,
    },
    /// Output text finished
    #[serde(rename = "response.output_text.done")]
    OutputTextDone,
    /// Annotation attached to output text
    #[serde(rename = "response.output_text.annotation.added")]
    OutputTextAnnotationAdded,
    /// Incremental refusal text
    #[serde(rename = "response.refusal.delta")]
    RefusalDelta,
    /// Refusal finished
    #[serde(rename = "response.refusal.done")]
    RefusalDone,
    /// Incremental function call arguments
    #[serde(rename = "response.function_call_arguments.delta")]
    FunctionCallArgumentsDelta {
        /// Owning item
        item_id: String,
        /// Arguments fragment
        delta: String,
    },
    /// Function call arguments finished
    #[serde(rename = "response.function_call_arguments.done")]
    FunctionCallArgumentsDone,
    /// Reasoning summary part started
    #[serde(rename = "response.reasoning_summary_part.added")]
    ReasoningSummaryPartAdded,
    /// Reasoning summary part finished
    #[serde(rename = "response.reasoning_summary_part.done")]
    ReasoningSummaryPartDone,
    /// Incremental reasoning summary text
    #[serde(rename = "response.reasoning_summary_text.delta")]
    ReasoningSummaryTextDelta,
    /// Reasoning summary text finished
    #[serde(rename = "response.reasoning_summary_text.done")]
    ReasoningSummaryTextDone {
        /// Owning reasoning item
        item_id: String,
        /// Full summary part text
        text: String,
    },
    /// Response completed
    #[serde(rename = "response.completed")]
    Completed {
        /// Final response
        response: ResponsesResponse,
    },
    /// Response failed
    #[serde(rename = "response.failed")]
    Failed {
        /// Final response with error details
        response: ResponsesResponse,
    },
    /// Response stopped early
    #[serde(rename = "response.incomplete")]
    Incomplete {
        /// Partial final response
        response: ResponsesResponse,
    },
    /// Stream-level error
    #[serde(rename = "error")]
    Error {
        /// Error code
        #[serde(default)]
        code: Option<String>,
        /// Error message
        #[serde(default)]
        message: String,
    },
}
