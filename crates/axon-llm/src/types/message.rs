use jiff::Timestamp;
use serde::{Deserialize, Serialize};

use super::content::Role;
use super::item::CompletionItem;

/// One turn in a conversation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message identifier
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    /// Creation time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<Timestamp>,
    /// Author role
    #[serde(default)]
    pub role: Role,
    /// Ordered items
    #[serde(default)]
    pub items: Vec<CompletionItem>,
    /// Message is still being generated
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub has_more: bool,
}

impl Message {
    /// Create an empty message
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            ..Self::default()
        }
    }

    /// Append an item, builder style
    #[must_use]
    pub fn with_item(mut self, item: CompletionItem) -> Self {
        self.items.push(item);
        self
    }

    /// Merge an item into the message by id, appending unseen ids
    pub fn upsert_item(&mut self, item: CompletionItem) {
        match self.items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => existing.merge(item),
            None => self.items.push(item),
        }
    }
}
