//! Single-document replication for change notifications.

use crate::config::Credentials;
use crate::error::SyncResult;
use crate::fanout::{FanOutCoordinator, FanOutReport};
use crate::retry::RetryExecutor;
use crate::store::DocumentStore;
use std::sync::Arc;
use tracing::info;

/// Fetches one document from the master and fans it out.
pub struct SingleDocumentSync {
    master: Arc<dyn DocumentStore>,
    fanout: Arc<FanOutCoordinator>,
    retry: RetryExecutor,
    entity: String,
}

impl SingleDocumentSync {
    /// Creates a single-document sync.
    pub fn new(
        master: Arc<dyn DocumentStore>,
        fanout: Arc<FanOutCoordinator>,
        retry: RetryExecutor,
        entity: impl Into<String>,
    ) -> Self {
        Self {
            master,
            fanout,
            retry,
            entity: entity.into(),
        }
    }

    /// Replicates document `document_id` to every target.
    ///
    /// Fetch failures, not-found included, are returned to the caller.
    pub async fn sync_one(
        &self,
        document_id: &str,
        targets: &[String],
        fields: &[String],
        credentials: &Credentials,
    ) -> SyncResult<FanOutReport> {
        let document = self
            .retry
            .execute(|_| self.master.get_document(&self.entity, document_id, fields))
            .await?;

        let report = self
            .fanout
            .replicate(std::slice::from_ref(&document), targets, credentials)
            .await;

        info!(
            document_id,
            targets = targets.len(),
            failed = report.failed(),
            "document sync finished"
        );
        Ok(report)
    }
}
