//! Canonical types shared by every provider client
//!
//! Requests, responses and progress events are expressed in this
//! vendor-independent vocabulary; each protocol adapter converts to and
//! from it.

pub mod content;
pub mod item;
pub mod message;
pub mod request;
pub mod response;

pub use content::{Content, EmbeddedResource, Role};
pub use item::{CallResult, CompletionItem, ItemKind, Reasoning, SamplingMessage, SummaryText, ToolCall, ToolCallResult};
pub use message::Message;
pub use request::{AgentReasoning, CompletionRequest, OutputSchema, ToolUseDefinition};
pub use response::{CompletionProgress, CompletionResponse};
