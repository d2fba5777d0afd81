//! Event-dispatch capability used for self-continuation.

use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};

/// Fire-and-forget event channel.
///
/// Delivery is at-least-once; the engine never observes an acknowledgement.
#[async_trait]
pub trait EventDispatcher: Send + Sync {
    /// Appends an event to `topic`.
    async fn send(&self, topic: &str, payload: Value) -> SyncResult<()>;
}

/// An event captured by [`RecordingDispatcher`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentEvent {
    /// Topic the event was sent on.
    pub topic: String,
    /// Event payload.
    pub payload: Value,
}

/// A dispatcher that only records what it is given.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    events: RwLock<Vec<SentEvent>>,
    closed: AtomicBool,
}

impl RecordingDispatcher {
    /// Creates a new recording dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every event sent so far.
    pub fn events(&self) -> Vec<SentEvent> {
        self.events.read().clone()
    }

    /// Removes and returns every event sent so far.
    pub fn take(&self) -> Vec<SentEvent> {
        std::mem::take(&mut *self.events.write())
    }

    /// Makes every further send fail.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventDispatcher for RecordingDispatcher {
    async fn send(&self, topic: &str, payload: Value) -> SyncResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SyncError::Dispatch("dispatcher closed".into()));
        }
        self.events.write().push(SentEvent {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn records_and_drains_events() {
        let dispatcher = RecordingDispatcher::new();
        dispatcher.send("topic", json!({"a": 1})).await.unwrap();

        assert_eq!(dispatcher.events().len(), 1);
        let taken = dispatcher.take();
        assert_eq!(taken[0].topic, "topic");
        assert!(dispatcher.events().is_empty());
    }

    #[tokio::test]
    async fn closed_dispatcher_rejects_sends() {
        let dispatcher = RecordingDispatcher::new();
        dispatcher.close();
        let result = dispatcher.send("topic", json!({})).await;
        assert!(matches!(result, Err(SyncError::Dispatch(_))));
    }
}
