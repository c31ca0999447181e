//! Bidirectional conversion between internal canonical types and wire formats
//!
//! Each submodule handles conversions for a specific provider's protocol,
//! including the running state used to turn stream events into progress.

pub mod anthropic;
pub mod ollama;
pub mod openai;
pub mod responses;

use crate::error::LlmError;
use crate::types::{CallResult, OutputSchema, ToolCall};

/// Decode a tool call's JSON arguments, treating empty text as `{}`
pub(crate) fn parse_arguments(call: &ToolCall) -> Result<serde_json::Value, LlmError> {
    if call.arguments.trim().is_empty() {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(&call.arguments).map_err(|e| {
        LlmError::Translation(format!(
            "failed to unmarshal function call arguments for {}: {e}",
            call.name
        ))
    })
}

/// Reject output schemas that are not JSON objects
pub(crate) fn check_output_schema(schema: &OutputSchema) -> Result<(), LlmError> {
    if schema.schema.is_object() {
        Ok(())
    } else {
        Err(LlmError::Translation(format!(
            "output schema {:?} must be a JSON object",
            schema.name
        )))
    }
}

/// Join the text parts of a tool result
pub(crate) fn result_text(output: &CallResult) -> String {
    output
        .content
        .iter()
        .filter_map(crate::types::Content::as_text)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Content;

    fn call(arguments: &str) -> ToolCall {
        ToolCall {
            call_id: "c1".to_owned(),
            name: "lookup".to_owned(),
            arguments: arguments.to_owned(),
        }
    }

    #[test]
    fn empty_arguments_become_empty_object() {
        assert_eq!(parse_arguments(&call("  ")).unwrap(), serde_json::json!({}));
    }

    #[test]
    fn malformed_arguments_name_the_tool() {
        let err = parse_arguments(&call("{")).unwrap_err();
        assert!(err.to_string().contains("lookup"));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn schema_must_be_an_object() {
        let mut schema = OutputSchema {
            name: "answer".to_owned(),
            schema: serde_json::json!({"type": "object"}),
            ..OutputSchema::default()
        };
        assert!(check_output_schema(&schema).is_ok());

        schema.schema = serde_json::json!("not a schema");
        assert!(check_output_schema(&schema).is_err());
    }

    #[test]
    fn result_text_skips_non_text() {
        let output = CallResult {
            content: vec![
                Content::text("a"),
                Content::Image {
                    data: "AAAA".to_owned(),
                    mime_type: "image/png".to_owned(),
                },
                Content::text("b"),
            ],
            is_error: false,
        };
        assert_eq!(result_text(&output), "a\nb");
    }
}
