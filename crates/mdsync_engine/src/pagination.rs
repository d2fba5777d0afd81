//! Self-continuing scroll over the master store.
//!
//! Each invocation reads exactly one page, replicates it to every target,
//! and then either hands the next cursor to the event channel or stops.
//! The loop never iterates in-process, so one invocation never outlives a
//! single page regardless of how large the result set is.

use crate::config::{Credentials, PaginationConfig};
use crate::document::Document;
use crate::error::{SyncError, SyncResult};
use crate::events::EventDispatcher;
use crate::fanout::FanOutCoordinator;
use crate::retry::RetryExecutor;
use crate::store::{DocumentStore, Predicate, ScrollRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

/// Payload of a continuation message.
///
/// `sync_date` stays unchanged across every page of one resync so the
/// filter the cursor was issued for stays stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncContinuation {
    /// Only records created or updated after this date are selected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_date: Option<String>,
    /// Cursor for the next page; absent on the first page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md_token: Option<String>,
}

impl SyncContinuation {
    /// First-page continuation for an optional date filter.
    pub fn start(sync_date: Option<String>) -> Self {
        Self {
            sync_date: sync_date.filter(|d| !d.trim().is_empty()),
            md_token: None,
        }
    }

    /// Continuation for the page after this one.
    pub fn next(&self, token: impl Into<String>) -> Self {
        Self {
            sync_date: self.sync_date.clone(),
            md_token: Some(token.into()),
        }
    }

    /// Current state of the cursor loop.
    pub fn state(&self) -> CursorState {
        match self.md_token.as_deref() {
            Some(token) if !token.is_empty() => CursorState::Continuing(token.to_string()),
            _ => CursorState::Start,
        }
    }

    /// Filter for this resync; `None` selects everything.
    pub fn predicate(&self) -> Option<Predicate> {
        self.sync_date.as_deref().map(Predicate::changed_since)
    }
}

/// State of the cursor loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorState {
    /// No cursor yet: the first page is requested.
    Start,
    /// A cursor from the previous page is presented.
    Continuing(String),
}

impl CursorState {
    /// The cursor to present, if any.
    pub fn token(&self) -> Option<&str> {
        match self {
            CursorState::Start => None,
            CursorState::Continuing(token) => Some(token),
        }
    }

    /// Returns true on the first page.
    pub fn is_start(&self) -> bool {
        matches!(self, CursorState::Start)
    }
}

/// What one invocation of the loop did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// The page was replicated and a continuation was dispatched.
    Continued {
        /// Documents on the page.
        documents: usize,
        /// Continuation that was sent.
        next: SyncContinuation,
    },
    /// The page was the last one.
    Completed {
        /// Documents on the page.
        documents: usize,
    },
}

/// Drives one page of a resync per invocation.
pub struct CursorLoop {
    master: Arc<dyn DocumentStore>,
    fanout: Arc<FanOutCoordinator>,
    events: Arc<dyn EventDispatcher>,
    retry: RetryExecutor,
    entity: String,
    config: PaginationConfig,
}

impl CursorLoop {
    /// Creates a cursor loop.
    pub fn new(
        master: Arc<dyn DocumentStore>,
        fanout: Arc<FanOutCoordinator>,
        events: Arc<dyn EventDispatcher>,
        retry: RetryExecutor,
        entity: impl Into<String>,
        config: PaginationConfig,
    ) -> Self {
        Self {
            master,
            fanout,
            events,
            retry,
            entity: entity.into(),
            config,
        }
    }

    /// Begins a manual resync by dispatching its first continuation.
    pub async fn start(&self, sync_date: Option<String>) -> SyncResult<SyncContinuation> {
        let continuation = SyncContinuation::start(sync_date);
        self.dispatch(&continuation).await?;
        info!(sync_date = ?continuation.sync_date, "manual sync started");
        Ok(continuation)
    }

    /// Runs one iteration: fetch a page, replicate it, continue or stop.
    ///
    /// A failed page read is logged and returned without rescheduling, so
    /// the resync stalls until it is triggered again.
    pub async fn run_page(
        &self,
        continuation: &SyncContinuation,
        targets: &[String],
        fields: &[String],
        credentials: &Credentials,
    ) -> SyncResult<PageOutcome> {
        let state = continuation.state();
        let request = ScrollRequest {
            fields: fields.to_vec(),
            predicate: continuation.predicate(),
            page_size: self.config.page_size,
            token: state.token().map(str::to_string),
        };

        let page = self
            .retry
            .execute(|_| self.master.scroll(&self.entity, &request))
            .await
            .map_err(|err| {
                error!(
                    sync_date = ?continuation.sync_date,
                    first_page = state.is_start(),
                    error = %err.detail(),
                    "manual sync page fetch failed; resync stalled"
                );
                err
            })?;

        let documents = page.documents.len();
        info!(
            sync_date = ?continuation.sync_date,
            first_page = state.is_start(),
            documents,
            "fetched manual sync page"
        );

        if !page.documents.is_empty() {
            self.replicate(&page.documents, targets, credentials).await;
        }

        // An empty page ends the scroll even if the store hands back a token.
        match page.token.filter(|t| !t.is_empty() && documents > 0) {
            Some(token) => {
                let next = continuation.next(token);
                self.dispatch(&next).await?;
                Ok(PageOutcome::Continued { documents, next })
            }
            None => {
                info!(sync_date = ?continuation.sync_date, "manual sync finished");
                Ok(PageOutcome::Completed { documents })
            }
        }
    }

    async fn replicate(&self, documents: &[Document], targets: &[String], credentials: &Credentials) {
        let report = self.fanout.replicate(documents, targets, credentials).await;
        info!(
            documents = documents.len(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            "replicated manual sync page"
        );
    }

    async fn dispatch(&self, continuation: &SyncContinuation) -> SyncResult<()> {
        let payload = serde_json::to_value(continuation)
            .map_err(|e| SyncError::Dispatch(format!("failed to encode continuation: {}", e)))?;
        self.events
            .send(&self.config.continuation_topic, payload)
            .await
            .map_err(|err| {
                error!(error = %err, "failed to dispatch manual sync continuation");
                err
            })
    }
}
