use serde::{Deserialize, Serialize};

use super::message::Message;

/// Attribute key marking a tool's hosted type
pub const TOOL_TYPE_ATTRIBUTE: &str = "type";

/// Hosted tool type exchanging screenshots and structured actions
pub const COMPUTER_USE_TOOL: &str = "computer_use_preview";

/// Canonical completion request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    /// Model identifier
    #[serde(default)]
    pub model: String,
    /// Agent issuing the request
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub agent: String,
    /// Ordered conversation turns
    #[serde(default)]
    pub input: Vec<Message>,
    /// System prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Tool choice policy: `auto`, `none`, `required`, a hosted tool or a tool name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    /// Available tools
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolUseDefinition>,
    /// Structured output schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<OutputSchema>,
    /// Reasoning directives
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<AgentReasoning>,
    /// Context truncation strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncation: Option<String>,
    /// Arbitrary caller metadata
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl CompletionRequest {
    /// Find a tool definition by name
    pub fn tool(&self, name: &str) -> Option<&ToolUseDefinition> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    /// Whether the named tool is a computer-use tool
    pub fn is_computer_use(&self, name: &str) -> bool {
        self.tool(name).is_some_and(ToolUseDefinition::is_computer_use)
    }

    /// First computer-use tool definition, if any
    pub fn computer_use_tool(&self) -> Option<&ToolUseDefinition> {
        self.tools.iter().find(|tool| tool.is_computer_use())
    }

    /// Name of the tool a call id was issued to, searching the history
    pub fn tool_name_for_call(&self, call_id: &str) -> Option<&str> {
        self.input
            .iter()
            .flat_map(|message| &message.items)
            .find_map(|item| match &item.kind {
                super::ItemKind::ToolCall(call) if call.call_id == call_id => Some(call.name.as_str()),
                _ => None,
            })
    }
}

/// Tool definition offered to the model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUseDefinition {
    /// Tool name
    pub name: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// JSON Schema for the arguments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
    /// Vendor-specific attributes, e.g. `type = computer_use_preview`
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl ToolUseDefinition {
    /// Whether this tool exchanges screenshots and actions
    pub fn is_computer_use(&self) -> bool {
        self.attributes.get(TOOL_TYPE_ATTRIBUTE).and_then(serde_json::Value::as_str) == Some(COMPUTER_USE_TOOL)
    }
}

/// Structured output schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputSchema {
    /// Schema name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Schema description
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// JSON Schema document
    pub schema: serde_json::Value,
    /// Require strict adherence
    #[serde(default)]
    pub strict: bool,
}

/// Reasoning directives
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentReasoning {
    /// Effort level, e.g. `low`, `medium`, `high`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub effort: String,
    /// Summary mode, e.g. `auto`, `detailed`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub summary: String,
}
