//! Sequential fan-out of one document set to every sub-account.

use crate::config::Credentials;
use crate::dispatch::{BatchDispatcher, DispatchReport};
use crate::document::Document;
use crate::store::StoreConnector;
use std::sync::Arc;
use tracing::{error, info};

/// Outcome for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    /// The batch was dispatched; per-document results are in the report.
    Dispatched(DispatchReport),
    /// No client could be built for the target.
    Unreachable(String),
}

/// Result of one fan-out for a single target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReport {
    /// Target account.
    pub account: String,
    /// What happened.
    pub outcome: TargetOutcome,
}

/// Result of a fan-out across all targets, in target order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// One entry per configured target, duplicates included.
    pub targets: Vec<TargetReport>,
}

impl FanOutReport {
    /// Total documents written across targets.
    pub fn succeeded(&self) -> usize {
        self.dispatched().map(|r| r.succeeded).sum()
    }

    /// Total documents that failed across targets.
    pub fn failed(&self) -> usize {
        self.dispatched().map(|r| r.failed).sum()
    }

    /// Number of targets that could not be reached.
    pub fn unreachable(&self) -> usize {
        self.targets
            .iter()
            .filter(|t| matches!(t.outcome, TargetOutcome::Unreachable(_)))
            .count()
    }

    fn dispatched(&self) -> impl Iterator<Item = &DispatchReport> {
        self.targets.iter().filter_map(|t| match &t.outcome {
            TargetOutcome::Dispatched(report) => Some(report),
            TargetOutcome::Unreachable(_) => None,
        })
    }
}

/// Applies the batch dispatcher once per target, one target at a time.
pub struct FanOutCoordinator {
    connector: Arc<dyn StoreConnector>,
    dispatcher: BatchDispatcher,
}

impl FanOutCoordinator {
    /// Creates a coordinator.
    pub fn new(connector: Arc<dyn StoreConnector>, dispatcher: BatchDispatcher) -> Self {
        Self {
            connector,
            dispatcher,
        }
    }

    /// Replicates `documents` to every target in order.
    ///
    /// A target that cannot be reached is logged and skipped; later targets
    /// still run.
    pub async fn replicate(
        &self,
        documents: &[Document],
        targets: &[String],
        credentials: &Credentials,
    ) -> FanOutReport {
        let mut report = FanOutReport::default();

        for account in targets {
            let outcome = match self.connector.connect(account, credentials) {
                Ok(client) => {
                    let dispatched = self.dispatcher.dispatch(documents, client.as_ref()).await;
                    info!(
                        target_account = %account,
                        succeeded = dispatched.succeeded,
                        failed = dispatched.failed,
                        "replicated batch to account"
                    );
                    TargetOutcome::Dispatched(dispatched)
                }
                Err(err) => {
                    error!(
                        target_account = %account,
                        error = %err,
                        "could not connect to account; skipping"
                    );
                    TargetOutcome::Unreachable(err.to_string())
                }
            };

            report.targets.push(TargetReport {
                account: account.clone(),
                outcome,
            });
        }

        report
    }
}
