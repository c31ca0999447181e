use serde::{Deserialize, Serialize};

use super::content::{Content, Role};

/// One entry in a message, identified by a merge-stable id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionItem {
    /// Identity used to correlate progress events for the same slot
    #[serde(default)]
    pub id: String,
    /// Item is still being generated
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub partial: bool,
    /// Owning message is not yet complete
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub has_more: bool,
    /// The populated variant
    #[serde(flatten)]
    pub kind: ItemKind,
}

/// Payload of a completion item, exactly one per item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemKind {
    /// Text, image, audio or resource content
    Content(Content),
    /// Tool invocation requested by the model
    ToolCall(ToolCall),
    /// Output of a previously requested tool invocation
    ToolCallResult(ToolCallResult),
    /// Reasoning trace
    Reasoning(Reasoning),
    /// Role-tagged content in a single-shot response
    Message(SamplingMessage),
}

/// Tool invocation requested by the model
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    /// Correlates the call with its result
    #[serde(default, rename = "callID")]
    pub call_id: String,
    /// Tool name
    #[serde(default)]
    pub name: String,
    /// Serialized JSON arguments, appended to while streaming
    #[serde(default)]
    pub arguments: String,
}

/// Result of a tool invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    /// Call this result answers
    #[serde(rename = "callID")]
    pub call_id: String,
    /// Role the output should be attributed to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_role: Option<Role>,
    /// Tool output
    pub output: CallResult,
}

/// Content produced by a tool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallResult {
    /// Output content items
    #[serde(default)]
    pub content: Vec<Content>,
    /// Tool reported a failure
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

/// Reasoning trace with an opaque continuation token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reasoning {
    /// Vendor-encrypted state to pass back on the next turn
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub encrypted_content: String,
    /// Human-readable summary fragments, in order
    #[serde(default)]
    pub summary: Vec<SummaryText>,
}

/// Single reasoning summary fragment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryText {
    /// Fragment text
    pub text: String,
}

/// Role-tagged content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingMessage {
    /// Author of the content
    pub role: Role,
    /// The content itself
    pub content: Content,
}

impl CompletionItem {
    /// Build a finished item
    pub fn new(id: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            id: id.into(),
            partial: false,
            has_more: false,
            kind,
        }
    }

    /// Build an in-progress item
    pub fn partial(id: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            id: id.into(),
            partial: true,
            has_more: true,
            kind,
        }
    }

    /// Set the owning message's has-more flag
    #[must_use]
    pub const fn with_has_more(mut self, has_more: bool) -> Self {
        self.has_more = has_more;
        self
    }

    /// Build a finished text item
    pub fn text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, ItemKind::Content(Content::text(text)))
    }

    /// Fold a later event for the same id into this item
    ///
    /// A non-partial event replaces the item outright. Partial text is
    /// concatenated, partial tool calls append argument text, and partial
    /// reasoning appends summary fragments as separate entries.
    pub fn merge(&mut self, newer: Self) {
        if !newer.partial {
            *self = newer;
            return;
        }

        self.partial = true;
        self.has_more = newer.has_more;

        match (&mut self.kind, newer.kind) {
            (ItemKind::Content(Content::Text { text }), ItemKind::Content(Content::Text { text: fragment })) => {
                text.push_str(&fragment);
            }
            (ItemKind::ToolCall(call), ItemKind::ToolCall(delta)) => {
                call.arguments.push_str(&delta.arguments);
                if call.name.is_empty() {
                    call.name = delta.name;
                }
                if call.call_id.is_empty() {
                    call.call_id = delta.call_id;
                }
            }
            (ItemKind::Reasoning(reasoning), ItemKind::Reasoning(delta)) => {
                reasoning.encrypted_content.push_str(&delta.encrypted_content);
                reasoning.summary.extend(delta.summary);
            }
            (kind, replacement) => *kind = replacement,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partial_text(text: &str) -> CompletionItem {
        CompletionItem::partial("item-1", ItemKind::Content(Content::text(text)))
    }

    fn partial_call(name: &str, args: &str) -> CompletionItem {
        CompletionItem::partial(
            "call-slot",
            ItemKind::ToolCall(ToolCall {
                call_id: "call_1".to_owned(),
                name: name.to_owned(),
                arguments: args.to_owned(),
            }),
        )
    }

    #[test]
    fn partial_text_concatenates_in_order() {
        let mut item = partial_text("Hel");
        item.merge(partial_text("lo, "));
        item.merge(partial_text("world"));

        assert_eq!(item.kind, ItemKind::Content(Content::text("Hello, world")));
        assert!(item.partial);
    }

    #[test]
    fn non_partial_replaces_accumulated_item() {
        let mut item = partial_text("draft ");
        item.merge(partial_text("text"));
        item.merge(CompletionItem::text("item-1", "final"));

        assert_eq!(item, CompletionItem::text("item-1", "final"));
    }

    #[test]
    fn tool_call_name_is_set_once_and_arguments_append() {
        let mut item = partial_call("get_weather", r#"{"loc"#);
        item.merge(partial_call("", r#"ation":"#));
        item.merge(partial_call("other_name", r#""Paris"}"#));

        let ItemKind::ToolCall(call) = item.kind else {
            panic!("expected tool call");
        };
        assert_eq!(call.name, "get_weather");
        assert_eq!(call.arguments, r#"{"location":"Paris"}"#);
    }

    #[test]
    fn reasoning_summaries_append_as_entries() {
        let fragment = |text: &str| {
            CompletionItem::partial(
                "rs_1",
                ItemKind::Reasoning(Reasoning {
                    encrypted_content: String::new(),
                    summary: vec![SummaryText { text: text.to_owned() }],
                }),
            )
        };

        let mut item = fragment("first");
        item.merge(fragment("second"));

        let ItemKind::Reasoning(reasoning) = item.kind else {
            panic!("expected reasoning");
        };
        assert_eq!(
            reasoning.summary,
            vec![
                SummaryText { text: "first".to_owned() },
                SummaryText { text: "second".to_owned() }
            ]
        );
    }

    #[test]
    fn tool_call_result_takes_newer_value() {
        let result = |text: &str| {
            CompletionItem::partial(
                "r",
                ItemKind::ToolCallResult(ToolCallResult {
                    call_id: "call_1".to_owned(),
                    output_role: None,
                    output: CallResult {
                        content: vec![Content::text(text)],
                        is_error: false,
                    },
                }),
            )
        };

        let mut item = result("old");
        item.merge(result("new"));

        assert_eq!(item, result("new"));
    }

    #[test]
    fn serializes_kind_as_named_field() {
        let json = serde_json::to_value(CompletionItem::text("a", "hi")).unwrap();
        assert_eq!(json, serde_json::json!({"id": "a", "content": {"type": "text", "text": "hi"}}));

        let parsed: CompletionItem = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, CompletionItem::text("a", "hi"));
    }
}
