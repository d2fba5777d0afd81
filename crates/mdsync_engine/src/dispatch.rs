//! Chunked, failure-isolated delivery of a document batch to one target.

use crate::config::DispatchConfig;
use crate::document::Document;
use crate::retry::RetryExecutor;
use crate::store::DocumentStore;
use crate::upsert::{PendingUpsert, UpsertResolver};
use futures::future::join_all;
use tokio::time::sleep;
use tracing::{debug, error};

/// Counters for one dispatch pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Upserts started.
    pub attempted: usize,
    /// Upserts that completed.
    pub succeeded: usize,
    /// Upserts that failed after retries or terminally.
    pub failed: usize,
    /// Chunks processed.
    pub chunks: usize,
}

impl DispatchReport {
    /// Returns true when every document was written.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Delivers documents to one target in fixed-size chunks.
///
/// Every upload in a chunk runs concurrently and is retried on its own; the
/// next chunk starts only after the whole chunk has settled and the
/// inter-chunk delay has elapsed. A failed document is logged and skipped.
#[derive(Debug, Clone)]
pub struct BatchDispatcher {
    resolver: UpsertResolver,
    retry: RetryExecutor,
    config: DispatchConfig,
}

impl BatchDispatcher {
    /// Creates a dispatcher.
    pub fn new(resolver: UpsertResolver, retry: RetryExecutor, config: DispatchConfig) -> Self {
        Self {
            resolver,
            retry,
            config,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Upserts every document into `target`. Never fails as a whole.
    pub async fn dispatch(&self, documents: &[Document], target: &dyn DocumentStore) -> DispatchReport {
        let pending: Vec<PendingUpsert> = documents.iter().cloned().map(PendingUpsert::new).collect();
        let mut report = DispatchReport::default();

        for (index, chunk) in pending.chunks(self.config.chunk_size.max(1)).enumerate() {
            if index > 0 {
                sleep(self.config.chunk_delay).await;
            }

            debug!(
                target_account = target.account(),
                chunk = index,
                size = chunk.len(),
                "dispatching chunk"
            );

            let results = join_all(chunk.iter().map(|item| self.upload(item, target))).await;

            report.chunks += 1;
            report.attempted += results.len();
            let succeeded = results.iter().filter(|ok| **ok).count();
            report.succeeded += succeeded;
            report.failed += results.len() - succeeded;
        }

        report
    }

    async fn upload(&self, pending: &PendingUpsert, target: &dyn DocumentStore) -> bool {
        let result = self
            .retry
            .execute(|_| self.resolver.upsert(target, pending))
            .await;

        match result {
            Ok(_) => true,
            Err(err) => {
                error!(
                    document_id = %pending.document().display_id(),
                    target_account = target.account(),
                    error = %err.detail(),
                    "failed to sync document to account"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::error::SyncError;
    use crate::memory::{MemoryStore, StoreCall, StoreOperation};
    use proptest::prelude::*;
    use std::time::Duration;
    use tokio::time::Instant;
    use tracing_test::traced_test;

    const CL: &str = "CL";

    fn dispatcher() -> BatchDispatcher {
        BatchDispatcher::new(
            UpsertResolver::new(CL),
            RetryExecutor::default(),
            DispatchConfig::default(),
        )
    }

    fn docs(count: usize) -> Vec<Document> {
        (0..count)
            .map(|i| Document::new().with("id", format!("doc-{:03}", i)))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn every_document_is_attempted_once() {
        let target = MemoryStore::new("store-a");
        let report = dispatcher().dispatch(&docs(65), &target).await;

        assert_eq!(report.attempted, 65);
        assert_eq!(report.succeeded, 65);
        assert_eq!(report.chunks, 3);
        assert_eq!(target.writes().len(), 65);
        assert_eq!(target.records(CL).len(), 65);
    }

    #[tokio::test(start_paused = true)]
    async fn chunk_delays_are_inserted_between_chunks_only() {
        let target = MemoryStore::new("store-a");
        let start = Instant::now();
        dispatcher().dispatch(&docs(61), &target).await;

        // ceil(61 / 30) - 1 = 2 pauses of one second, none after the last chunk.
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn chunk_uploads_run_concurrently_within_bound() {
        let target = MemoryStore::new("store-a");
        target.set_write_latency(Duration::from_millis(500));

        let start = Instant::now();
        dispatcher().dispatch(&docs(45), &target).await;

        assert_eq!(target.peak_in_flight(), 30);
        // Two chunks of overlapping 500ms writes plus one 1s pause.
        assert_eq!(start.elapsed(), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn failures_are_isolated_per_document() {
        let target = MemoryStore::new("store-b");
        target.fail_writes_for("doc-001", SyncError::remote(400, "rejected"));

        let report = dispatcher().dispatch(&docs(3), &target).await;

        assert_eq!(report.attempted, 3);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 1);
        assert!(target.record(CL, "doc-000").is_some());
        assert!(target.record(CL, "doc-002").is_some());
        assert!(logs_contain("failed to sync document to account"));
        assert!(logs_contain("doc-001"));
        assert!(logs_contain("store-b"));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_is_honoured_even_when_a_chunk_fails_entirely() {
        let target = MemoryStore::new("store-a");
        for doc in docs(30) {
            target.fail_writes_for(doc.id().unwrap(), SyncError::remote(403, "denied"));
        }

        let start = Instant::now();
        let report = dispatcher().dispatch(&docs(31), &target).await;

        assert_eq!(report.failed, 30);
        assert_eq!(report.succeeded, 1);
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_per_document() {
        let target = MemoryStore::new("store-a");
        target.fail_next(StoreOperation::Create, SyncError::remote(429, "slow down"));

        let report = dispatcher().dispatch(&docs(1), &target).await;

        assert!(report.is_clean());
        let creates = target
            .writes()
            .into_iter()
            .filter(|c| matches!(c, StoreCall::Create { .. }))
            .count();
        assert_eq!(creates, 2);
    }

    #[tokio::test]
    async fn empty_batch_does_nothing() {
        let target = MemoryStore::new("store-a");
        let report = dispatcher().dispatch(&[], &target).await;
        assert_eq!(report, DispatchReport::default());
        assert!(target.calls().is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn pause_count_matches_chunk_arithmetic(count in 0usize..200) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .start_paused(true)
                .build()
                .unwrap();

            let dispatcher = BatchDispatcher::new(
                UpsertResolver::new(CL),
                RetryExecutor::new(RetryConfig::no_retry()),
                DispatchConfig::default(),
            );
            let target = MemoryStore::new("store-a");

            let (report, elapsed) = runtime.block_on(async {
                let start = Instant::now();
                let report = dispatcher.dispatch(&docs(count), &target).await;
                (report, start.elapsed())
            });

            let expected_pauses = count.div_ceil(30).saturating_sub(1);
            prop_assert_eq!(report.attempted, count);
            prop_assert_eq!(report.chunks, count.div_ceil(30));
            prop_assert_eq!(elapsed, Duration::from_secs(expected_pauses as u64));
        }
    }
}
