//! In-memory session capturing progress notifications

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axon_llm::{CompletionContext, CompletionProgress, ProgressToken, SessionTransport};
use serde_json::Value;

const PROGRESS_META_KEY: &str = "dev.axon.progress/completion";

/// Session transport that records every notification it is asked to send
#[derive(Default)]
pub struct RecordingSession {
    sent: Mutex<Vec<(String, Value)>>,
}

impl RecordingSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Context publishing to this session under a fixed token
    pub fn context(self: &Arc<Self>) -> CompletionContext {
        let session: Arc<dyn SessionTransport> = Arc::clone(self) as _;
        CompletionContext::new().with_progress(ProgressToken::new("progress-1"), Some(session))
    }

    /// Method names of every notification
    pub fn methods(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(method, _)| method.clone()).collect()
    }

    /// Decoded progress payloads, in delivery order
    pub fn progress(&self) -> Vec<CompletionProgress> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, params)| serde_json::from_value(params["_meta"][PROGRESS_META_KEY].clone()).unwrap())
            .collect()
    }

    /// Text of every streamed content fragment, concatenated
    pub fn streamed_text(&self) -> String {
        self.progress()
            .into_iter()
            .filter(|progress| progress.item.partial)
            .filter_map(|progress| match progress.item.kind {
                axon_llm::types::ItemKind::Content(content) => content.as_text().map(str::to_owned),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl SessionTransport for RecordingSession {
    async fn send_notification(&self, method: &str, params: Value) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push((method.to_owned(), params));
        Ok(())
    }
}
