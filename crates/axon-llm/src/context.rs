use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::progress::{ProgressObserver, ProgressPublisher, ProgressToken, SessionTransport};

/// Per-call state handed to every provider client
#[derive(Debug, Clone, Default)]
pub struct CompletionContext {
    /// Destination for progress events
    pub publisher: ProgressPublisher,
    /// Cancels the whole call, including retry waits
    pub cancellation: CancellationToken,
}

impl CompletionContext {
    /// Context with no progress destination and a fresh cancellation token
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver progress under `token` through `session`
    #[must_use]
    pub fn with_progress(mut self, token: Option<ProgressToken>, session: Option<Arc<dyn SessionTransport>>) -> Self {
        self.publisher = ProgressPublisher::new(token, session);
        self
    }

    /// Use an externally owned cancellation token
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Attach an observer to the publisher
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.publisher = self.publisher.with_observer(observer);
        self
    }
}
