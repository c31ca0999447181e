//! Best-effort response reconstruction from progress events

use std::sync::{Arc, Mutex, PoisonError};

use jiff::Timestamp;

use crate::error::LlmError;
use crate::progress::{ProgressObserver, ProgressPublisher};
use crate::types::{CompletionItem, CompletionProgress, CompletionResponse, ItemKind};

/// Source of the current time
pub type Clock = Arc<dyn Fn() -> Timestamp + Send + Sync>;

/// Builds a partial response from the progress events of one call
pub struct ProgressAccumulator {
    state: Mutex<CompletionResponse>,
    clock: Clock,
}

impl std::fmt::Debug for ProgressAccumulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressAccumulator").finish_non_exhaustive()
    }
}

impl Default for ProgressAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressAccumulator {
    /// Accumulator stamped with wall-clock time
    pub fn new() -> Self {
        Self::with_clock(Arc::new(Timestamp::now))
    }

    /// Accumulator with an injected clock
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            state: Mutex::new(CompletionResponse::default()),
            clock,
        }
    }

    /// Merge one progress event into the running state
    pub fn capture_progress(&self, progress: CompletionProgress) {
        let now = (self.clock)();
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .append_progress(progress, now);
    }

    /// Snapshot of the accumulated state
    pub fn snapshot(&self) -> CompletionResponse {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Recover whatever output was produced before `error`
    ///
    /// Returns `None` when no message was ever captured. Otherwise the last
    /// message becomes the output: content and reasoning are kept, partial
    /// tool calls are dropped and an error text item is appended. The
    /// error item is delivered to the session when a token is present.
    pub async fn partial_response(&self, error: &LlmError, publisher: &ProgressPublisher) -> Option<CompletionResponse> {
        let mut response = std::mem::take(&mut *self.state.lock().unwrap_or_else(PoisonError::into_inner));
        let mut output = response.internal_messages.pop()?;

        output.items = output
            .items
            .into_iter()
            .filter_map(|mut item| match item.kind {
                ItemKind::Content(_) | ItemKind::Reasoning(_) => {
                    item.partial = false;
                    item.has_more = false;
                    Some(item)
                }
                ItemKind::ToolCall(_) if !item.partial => Some(item),
                _ => None,
            })
            .collect();

        let message = error.to_string();
        let error_item = CompletionItem::text(format!("error_{}", (self.clock)()), format!("\n\n[Error: {message}]"));
        output.items.push(error_item.clone());
        output.has_more = false;

        publisher
            .deliver(&CompletionProgress {
                model: response.model.clone(),
                agent: response.agent.clone(),
                message_id: output.id.clone(),
                role: Some(output.role),
                item: error_item,
            })
            .await;

        tracing::debug!(
            message_id = %output.id,
            items = output.items.len(),
            error = %message,
            "recovered partial response"
        );

        response.output = output;
        response.error = message;
        Some(response)
    }
}

impl ProgressObserver for ProgressAccumulator {
    fn observe(&self, progress: &CompletionProgress) {
        self.capture_progress(progress.clone());
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::progress::{ProgressToken, SessionTransport};
    use crate::types::{Content, Reasoning, SummaryText, ToolCall};

    fn fixed_clock() -> Clock {
        Arc::new(|| Timestamp::from_second(1_700_000_000).unwrap())
    }

    fn progress(message_id: &str, item: CompletionItem) -> CompletionProgress {
        CompletionProgress::assistant("gpt-5.1", message_id, item)
    }

    fn tool_call(id: &str, args: &str, partial: bool) -> CompletionItem {
        let kind = ItemKind::ToolCall(ToolCall {
            call_id: format!("call_{id}"),
            name: "lookup".to_owned(),
            arguments: args.to_owned(),
        });
        if partial {
            CompletionItem::partial(id, kind)
        } else {
            CompletionItem::new(id, kind)
        }
    }

    #[derive(Default)]
    struct RecordingSession {
        sent: Mutex<Vec<serde_json::Value>>,
    }

    #[async_trait]
    impl SessionTransport for RecordingSession {
        async fn send_notification(&self, _method: &str, params: serde_json::Value) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(params);
            Ok(())
        }
    }

    #[tokio::test]
    async fn nothing_captured_means_nothing_to_recover() {
        let accumulator = ProgressAccumulator::with_clock(fixed_clock());
        let error = LlmError::Streaming("connection reset".to_owned());

        assert!(accumulator.partial_response(&error, &ProgressPublisher::default()).await.is_none());
    }

    #[tokio::test]
    async fn partial_tool_calls_are_dropped_and_error_appended() {
        let accumulator = ProgressAccumulator::with_clock(fixed_clock());
        accumulator.capture_progress(progress(
            "msg_1",
            CompletionItem::partial("text", ItemKind::Content(Content::text("Looking it up"))),
        ));
        accumulator.capture_progress(progress("msg_1", tool_call("half", r#"{"q":"#, true)));
        accumulator.capture_progress(progress("msg_1", tool_call("done", r#"{"q":"x"}"#, false)));

        let error = LlmError::Streaming("connection reset".to_owned());
        let response = accumulator
            .partial_response(&error, &ProgressPublisher::default())
            .await
            .unwrap();

        let ids: Vec<_> = response.output.items.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, vec!["text", "done", "error_2023-11-14T22:13:20Z"]);

        assert!(!response.output.items[0].partial);
        assert_eq!(
            response.output.items[2].kind,
            ItemKind::Content(Content::text("\n\n[Error: streaming error: connection reset]"))
        );
        assert_eq!(response.error, "streaming error: connection reset");
        assert!(!response.output.has_more);
        assert!(response.internal_messages.is_empty());
    }

    #[tokio::test]
    async fn earlier_messages_stay_internal() {
        let accumulator = ProgressAccumulator::with_clock(fixed_clock());
        accumulator.capture_progress(progress("msg_1", CompletionItem::text("a", "first")));
        accumulator.capture_progress(progress("msg_2", CompletionItem::text("b", "second")));

        let response = accumulator
            .partial_response(&LlmError::Cancelled, &ProgressPublisher::default())
            .await
            .unwrap();

        assert_eq!(response.output.id, "msg_2");
        assert_eq!(response.internal_messages.len(), 1);
        assert_eq!(response.internal_messages[0].id, "msg_1");
        assert_eq!(response.error, "request cancelled");
        assert_eq!(response.model, "gpt-5.1");
    }

    #[tokio::test]
    async fn reasoning_is_kept_and_unmarked() {
        let accumulator = ProgressAccumulator::with_clock(fixed_clock());
        accumulator.capture_progress(progress(
            "msg_1",
            CompletionItem::partial(
                "rs",
                ItemKind::Reasoning(Reasoning {
                    encrypted_content: String::new(),
                    summary: vec![SummaryText {
                        text: "Thinking".to_owned(),
                    }],
                }),
            ),
        ));

        let response = accumulator
            .partial_response(&LlmError::Cancelled, &ProgressPublisher::default())
            .await
            .unwrap();

        assert_eq!(response.output.items.len(), 2);
        assert!(!response.output.items[0].partial);
    }

    #[tokio::test]
    async fn error_item_is_delivered_when_token_present() {
        let session = Arc::new(RecordingSession::default());
        let accumulator = Arc::new(ProgressAccumulator::with_clock(fixed_clock()));
        let publisher =
            ProgressPublisher::new(ProgressToken::new("tok"), Some(session.clone())).with_observer(accumulator.clone());

        publisher
            .publish(&progress("msg_1", CompletionItem::partial("t", ItemKind::Content(Content::text("hi")))))
            .await;

        let response = accumulator
            .partial_response(&LlmError::Cancelled, &publisher)
            .await
            .unwrap();
        assert_eq!(response.output.items.len(), 2);

        let sent = session.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        let last = &sent[1]["_meta"][crate::progress::COMPLETION_PROGRESS_META_KEY];
        assert_eq!(last["messageID"], "msg_1");
        assert_eq!(last["item"]["content"]["text"], "\n\n[Error: request cancelled]");
    }
}
