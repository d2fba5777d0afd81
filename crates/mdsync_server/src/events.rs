//! In-process event channel for resync continuations.

use crate::server::SyncServer;
use async_trait::async_trait;
use mdsync_engine::{EventDispatcher, SentEvent, SyncError, SyncResult};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error};

/// Unbounded, fire-and-forget event channel.
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    sender: UnboundedSender<SentEvent>,
}

impl ChannelDispatcher {
    /// Creates a dispatcher and the receiving half of its channel.
    pub fn channel() -> (Self, UnboundedReceiver<SentEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl EventDispatcher for ChannelDispatcher {
    async fn send(&self, topic: &str, payload: Value) -> SyncResult<()> {
        self.sender
            .send(SentEvent {
                topic: topic.to_string(),
                payload,
            })
            .map_err(|_| SyncError::Dispatch("event channel closed".into()))
    }
}

/// Statistics from one worker run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Events handled successfully.
    pub handled: usize,
    /// Events whose handling failed.
    pub failed: usize,
}

/// Feeds queued events to [`SyncServer::handle_event`].
pub struct EventWorker {
    server: Arc<SyncServer>,
    receiver: UnboundedReceiver<SentEvent>,
}

impl EventWorker {
    /// Creates a worker draining `receiver` into `server`.
    pub fn new(server: Arc<SyncServer>, receiver: UnboundedReceiver<SentEvent>) -> Self {
        Self { server, receiver }
    }

    /// Handles events until the queue is empty.
    ///
    /// Events emitted while handling are picked up in the same run, so a
    /// resync started before the call runs to completion.
    pub async fn run_until_idle(&mut self) -> WorkerStats {
        let mut stats = WorkerStats::default();
        loop {
            match self.receiver.try_recv() {
                Ok(event) => self.handle(event, &mut stats).await,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return stats,
            }
        }
    }

    async fn handle(&self, event: SentEvent, stats: &mut WorkerStats) {
        debug!(topic = %event.topic, "handling event");
        match self.server.handle_event(&event.topic, event.payload).await {
            Ok(_) => stats.handled += 1,
            Err(err) => {
                error!(topic = %event.topic, error = %err, "event handling failed");
                stats.failed += 1;
            }
        }
    }
}
