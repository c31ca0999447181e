//! Fan-out of progress events to observers and the remote session

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::CompletionProgress;

/// Notification method used for progress delivery
pub const PROGRESS_METHOD: &str = "notifications/progress";

/// Metadata key under which a `CompletionProgress` is carried
pub const COMPLETION_PROGRESS_META_KEY: &str = "dev.axon.progress/completion";

/// Opaque caller-supplied destination for progress events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressToken(serde_json::Value);

impl ProgressToken {
    /// Wrap a token, treating `null` and the empty string as absent
    pub fn new(value: impl Into<serde_json::Value>) -> Option<Self> {
        match value.into() {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.is_empty() => None,
            value => Some(Self(value)),
        }
    }

    /// Raw token value
    pub const fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Session transport that delivers notifications to a remote caller
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// Send one notification
    async fn send_notification(&self, method: &str, params: serde_json::Value) -> anyhow::Result<()>;
}

/// Local subscriber that sees every published progress event
pub trait ProgressObserver: Send + Sync {
    /// Called once per event, in publication order
    fn observe(&self, progress: &CompletionProgress);
}

/// Publishes progress events for one completion call
#[derive(Clone, Default)]
pub struct ProgressPublisher {
    token: Option<ProgressToken>,
    session: Option<Arc<dyn SessionTransport>>,
    observers: Vec<Arc<dyn ProgressObserver>>,
}

impl std::fmt::Debug for ProgressPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressPublisher")
            .field("token", &self.token)
            .field("has_session", &self.session.is_some())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl ProgressPublisher {
    /// Publisher delivering to `session` under `token`
    pub fn new(token: Option<ProgressToken>, session: Option<Arc<dyn SessionTransport>>) -> Self {
        Self {
            token,
            session,
            observers: Vec::new(),
        }
    }

    /// Add an observer fed before each delivery
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Destination token, if progress was requested
    pub const fn token(&self) -> Option<&ProgressToken> {
        self.token.as_ref()
    }

    /// Whether events will go anywhere
    pub const fn is_enabled(&self) -> bool {
        self.token.is_some()
    }

    /// Feed observers, then deliver to the session
    ///
    /// No-op when no destination token is present.
    pub async fn publish(&self, progress: &CompletionProgress) {
        if self.token.is_none() {
            return;
        }

        for observer in &self.observers {
            observer.observe(progress);
        }

        self.deliver(progress).await;
    }

    /// Deliver to the session only, bypassing observers
    ///
    /// Delivery failures are logged and swallowed.
    pub async fn deliver(&self, progress: &CompletionProgress) {
        let (Some(token), Some(session)) = (&self.token, &self.session) else {
            return;
        };

        let params = serde_json::json!({
            "progressToken": token,
            "_meta": {
                COMPLETION_PROGRESS_META_KEY: progress,
            },
        });

        if let Err(e) = session.send_notification(PROGRESS_METHOD, params).await {
            tracing::warn!(
                message_id = %progress.message_id,
                item_id = %progress.item.id,
                error = %e,
                "failed to deliver progress notification"
            );
        }
    }
}
