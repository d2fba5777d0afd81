//! The replication engine.

use crate::config::{EngineConfig, SyncSettings};
use crate::dispatch::BatchDispatcher;
use crate::document::Document;
use crate::error::SyncResult;
use crate::events::EventDispatcher;
use crate::fanout::{FanOutCoordinator, FanOutReport};
use crate::pagination::{CursorLoop, PageOutcome, SyncContinuation};
use crate::retry::RetryExecutor;
use crate::single::SingleDocumentSync;
use crate::store::{DocumentStore, StoreConnector};
use crate::upsert::UpsertResolver;
use std::sync::Arc;

/// Wires the replication components together.
///
/// Every operation takes the invocation's [`SyncSettings`] explicitly; the
/// engine itself holds no per-invocation state and can be shared behind an
/// `Arc` across concurrent invocations.
pub struct ReplicationEngine {
    config: EngineConfig,
    fanout: Arc<FanOutCoordinator>,
    single: SingleDocumentSync,
    cursor: CursorLoop,
}

impl ReplicationEngine {
    /// Creates an engine reading from `master`, writing through
    /// `connector`, and continuing resyncs through `events`.
    pub fn new(
        config: EngineConfig,
        master: Arc<dyn DocumentStore>,
        connector: Arc<dyn StoreConnector>,
        events: Arc<dyn EventDispatcher>,
    ) -> Self {
        let retry = RetryExecutor::new(config.retry.clone());
        let dispatcher = BatchDispatcher::new(
            UpsertResolver::new(&config.data_entity),
            retry.clone(),
            config.dispatch.clone(),
        );
        let fanout = Arc::new(FanOutCoordinator::new(connector, dispatcher));
        let single = SingleDocumentSync::new(
            Arc::clone(&master),
            Arc::clone(&fanout),
            retry.clone(),
            &config.data_entity,
        );
        let cursor = CursorLoop::new(
            master,
            Arc::clone(&fanout),
            events,
            retry,
            &config.data_entity,
            config.pagination.clone(),
        );

        Self {
            config,
            fanout,
            single,
            cursor,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replicates an already-fetched document set to every sub-account.
    pub async fn replicate(&self, documents: &[Document], settings: &SyncSettings) -> FanOutReport {
        self.fanout
            .replicate(documents, &settings.sub_accounts, &settings.credentials())
            .await
    }

    /// Fetches one document from the master and replicates it.
    pub async fn sync_one(&self, document_id: &str, settings: &SyncSettings) -> SyncResult<FanOutReport> {
        self.single
            .sync_one(
                document_id,
                &settings.sub_accounts,
                &settings.sync_fields,
                &settings.credentials(),
            )
            .await
    }

    /// Starts a manual resync by emitting its first continuation.
    pub async fn start_manual_sync(&self, sync_date: Option<String>) -> SyncResult<SyncContinuation> {
        self.cursor.start(sync_date).await
    }

    /// Runs one page of a manual resync.
    pub async fn continue_manual_sync(
        &self,
        continuation: &SyncContinuation,
        settings: &SyncSettings,
    ) -> SyncResult<PageOutcome> {
        self.cursor
            .run_page(
                continuation,
                &settings.sub_accounts,
                &settings.sync_fields,
                &settings.credentials(),
            )
            .await
    }
}
