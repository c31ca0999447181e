use serde::{Deserialize, Serialize};

/// Role of a message participant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction
    System,
    /// User message
    User,
    /// Assistant response
    #[default]
    Assistant,
}

impl Role {
    /// Parse a vendor role string, treating anything unknown as assistant
    pub fn from_wire(role: &str) -> Self {
        match role {
            "user" => Self::User,
            "system" | "developer" => Self::System,
            _ => Self::Assistant,
        }
    }

    /// Wire representation shared by every supported vendor
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Typed payload carried by a content item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    /// Plain text
    Text {
        /// The text string
        text: String,
    },
    /// Base64-encoded image
    Image {
        /// Base64 image bytes
        data: String,
        /// MIME type such as `image/png`
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// Base64-encoded audio clip
    Audio {
        /// Base64 audio bytes
        data: String,
        /// MIME type such as `audio/wav`
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// Embedded file or document
    Resource {
        /// The embedded resource
        resource: EmbeddedResource,
    },
}

impl Content {
    /// Build a text content payload
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Borrow the text if this is a text payload
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            _ => None,
        }
    }

    /// Render image or audio data as a `data:` URL
    pub fn to_data_url(&self) -> Option<String> {
        match self {
            Self::Image { data, mime_type } | Self::Audio { data, mime_type } => {
                Some(format!("data:{mime_type};base64,{data}"))
            }
            _ => None,
        }
    }
}

/// File content embedded directly in a message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedResource {
    /// Resource identifier, used as the filename when forwarded
    pub uri: String,
    /// MIME type of the resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Inline text contents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Base64-encoded binary contents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
}
