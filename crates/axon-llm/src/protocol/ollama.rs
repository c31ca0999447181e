//! Ollama chat API wire format types

use serde::{Deserialize, Serialize};

/// Ollama chat request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaRequest {
    /// Model identifier
    pub model: String,
    /// Conversation messages
    pub messages: Vec<OllamaMessage>,
    /// Whether to stream newline-delimited chunks
    pub stream: bool,
    /// Tool definitions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<OllamaTool>,
    /// Sampling options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<OllamaOptions>,
    /// Structured output schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<serde_json::Value>,
}

/// Sampling options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OllamaOptions {
    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Context window size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<u32>,
}

/// Ollama chat message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OllamaMessage {
    /// Message role
    #[serde(default)]
    pub role: String,
    /// Text content
    #[serde(default)]
    pub content: String,
    /// Base64 images
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    /// Tool calls made by the assistant
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<OllamaToolCall>,
    /// Name of the tool a `tool` message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

/// Ollama tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaToolCall {
    /// Function invocation
    pub function: OllamaFunctionCall,
}

/// Ollama function invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaFunctionCall {
    /// Function name
    pub name: String,
    /// Decoded arguments
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// Ollama tool definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaTool {
    /// Always "function"
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function specification
    pub function: OllamaFunction,
}

/// Ollama function specification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaFunction {
    /// Function name
    pub name: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// JSON Schema for parameters
    pub parameters: serde_json::Value,
}

/// One response object, either the whole answer or a single stream line
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OllamaResponse {
    /// Model used
    #[serde(default)]
    pub model: String,
    /// Creation time
    #[serde(default)]
    pub created_at: Option<String>,
    /// Message or message fragment
    #[serde(default)]
    pub message: OllamaMessage,
    /// Final object of the response
    #[serde(default)]
    pub done: bool,
    /// Why generation stopped
    #[serde(default)]
    pub done_reason: Option<String>,
}
