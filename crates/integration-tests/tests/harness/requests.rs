//! Canonical requests shared by the integration tests

use axon_llm::CompletionRequest;
use axon_llm::types::{CompletionItem, Message, Role, ToolUseDefinition};
use serde_json::json;

/// Single user turn asking `model` a question
pub fn user_request(model: &str) -> CompletionRequest {
    CompletionRequest {
        model: model.to_owned(),
        agent: "assistant".to_owned(),
        system_prompt: Some("Be brief.".to_owned()),
        input: vec![Message::new("turn-1", Role::User).with_item(CompletionItem::text("turn-1-0", "Hello"))],
        ..CompletionRequest::default()
    }
}

/// Same as [`user_request`] with a weather lookup tool attached
pub fn tool_request(model: &str) -> CompletionRequest {
    CompletionRequest {
        tools: vec![ToolUseDefinition {
            name: "get_weather".to_owned(),
            description: "Current weather for a city".to_owned(),
            parameters: Some(json!({
                "type": "object",
                "properties": {"location": {"type": "string"}},
                "required": ["location"]
            })),
            ..ToolUseDefinition::default()
        }],
        ..user_request(model)
    }
}
