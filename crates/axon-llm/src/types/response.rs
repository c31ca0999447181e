use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::content::Role;
use super::item::CompletionItem;
use super::message::Message;

/// Canonical completion response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResponse {
    /// Model that produced the response
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    /// Agent the response belongs to
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub agent: String,
    /// Finalized output message
    #[serde(default)]
    pub output: Message,
    /// Messages still open when the response was captured
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub internal_messages: Vec<Message>,
    /// Failure description, empty on success
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

/// One incremental update to a single item of an in-flight message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionProgress {
    /// Model producing the message
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
    /// Agent producing the message
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub agent: String,
    /// Message the item belongs to
    #[serde(default, rename = "messageID")]
    pub message_id: String,
    /// Author role of the message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// The changed item
    pub item: CompletionItem,
}

impl CompletionProgress {
    /// Progress for an assistant message
    pub fn assistant(model: impl Into<String>, message_id: impl Into<String>, item: CompletionItem) -> Self {
        Self {
            model: model.into(),
            agent: String::new(),
            message_id: message_id.into(),
            role: Some(Role::Assistant),
            item,
        }
    }
}

impl CompletionResponse {
    /// Apply a progress event to the open messages
    ///
    /// Events without a message id only update the model and agent. A new
    /// message id opens a new message stamped with `now`.
    pub fn append_progress(&mut self, progress: CompletionProgress, now: Timestamp) {
        if !progress.agent.is_empty() {
            self.agent = progress.agent;
        }
        if !progress.model.is_empty() {
            self.model = progress.model;
        }
        if progress.message_id.is_empty() {
            return;
        }

        let index = if let Some(index) = self
            .internal_messages
            .iter()
            .position(|message| message.id == progress.message_id)
        {
            index
        } else {
            let mut message = Message::new(progress.message_id, progress.role.unwrap_or_default());
            message.created = Some(now);
            self.internal_messages.push(message);
            self.internal_messages.len() - 1
        };

        let message = &mut self.internal_messages[index];
        message.has_more = true;
        message.upsert_item(progress.item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Content, ItemKind};

    fn text_progress(message_id: &str, item_id: &str, text: &str) -> CompletionProgress {
        CompletionProgress::assistant(
            "claude-x",
            message_id,
            CompletionItem::partial(item_id, ItemKind::Content(Content::text(text))),
        )
    }

    #[test]
    fn progress_opens_and_extends_messages() {
        let now = Timestamp::UNIX_EPOCH;
        let mut response = CompletionResponse::default();

        response.append_progress(text_progress("m1", "i1", "a"), now);
        response.append_progress(text_progress("m1", "i1", "b"), now);
        response.append_progress(text_progress("m1", "i2", "c"), now);
        response.append_progress(text_progress("m2", "i1", "d"), now);

        assert_eq!(response.model, "claude-x");
        assert_eq!(response.internal_messages.len(), 2);

        let first = &response.internal_messages[0];
        assert!(first.has_more);
        assert_eq!(first.created, Some(now));
        assert_eq!(first.role, Role::Assistant);
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.items[0].kind, ItemKind::Content(Content::text("ab")));
    }

    #[test]
    fn progress_without_message_id_only_updates_metadata() {
        let mut response = CompletionResponse::default();
        let mut progress = text_progress("", "i1", "a");
        progress.agent = "planner".to_owned();

        response.append_progress(progress, Timestamp::UNIX_EPOCH);

        assert_eq!(response.agent, "planner");
        assert!(response.internal_messages.is_empty());
    }
}
