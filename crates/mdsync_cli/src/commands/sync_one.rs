//! Sync-one command implementation.

use super::{CommandResult, Runtime};
use mdsync_engine::{FanOutReport, TargetOutcome};
use mdsync_server::SettingsLoader;
use serde::Serialize;
use std::path::Path;

/// Per-target line of the report.
#[derive(Debug, Serialize)]
pub struct TargetSummary {
    /// Target account.
    pub account: String,
    /// `ok`, `partial` or `unreachable`.
    pub status: &'static str,
    /// Documents written.
    pub succeeded: usize,
    /// Documents that failed.
    pub failed: usize,
}

/// Builds the per-target summary of a fan-out.
pub fn summarize(report: &FanOutReport) -> Vec<TargetSummary> {
    report
        .targets
        .iter()
        .map(|target| match &target.outcome {
            TargetOutcome::Dispatched(dispatch) => TargetSummary {
                account: target.account.clone(),
                status: if dispatch.is_clean() { "ok" } else { "partial" },
                succeeded: dispatch.succeeded,
                failed: dispatch.failed,
            },
            TargetOutcome::Unreachable(_) => TargetSummary {
                account: target.account.clone(),
                status: "unreachable",
                succeeded: 0,
                failed: 0,
            },
        })
        .collect()
}

/// Runs the sync-one command.
pub async fn run(
    settings_path: &Path,
    account: &str,
    document_id: &str,
    format: &str,
) -> CommandResult<()> {
    let runtime = Runtime::connect(settings_path, account)?;
    let settings = runtime.settings.load()?;
    let report = runtime.engine.sync_one(document_id, &settings).await?;
    let summary = summarize(&report);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Document {}", document_id);
        for target in &summary {
            println!(
                "  {:<24} {:<12} {} written, {} failed",
                target.account, target.status, target.succeeded, target.failed
            );
        }
    }

    if report.failed() > 0 || report.unreachable() > 0 {
        return Err(format!("document {} did not reach every account", document_id).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdsync_engine::{DispatchReport, TargetReport};

    #[test]
    fn summary_statuses() {
        let report = FanOutReport {
            targets: vec![
                TargetReport {
                    account: "b".into(),
                    outcome: TargetOutcome::Dispatched(DispatchReport {
                        attempted: 1,
                        succeeded: 1,
                        failed: 0,
                        chunks: 1,
                    }),
                },
                TargetReport {
                    account: "c".into(),
                    outcome: TargetOutcome::Dispatched(DispatchReport {
                        attempted: 1,
                        succeeded: 0,
                        failed: 1,
                        chunks: 1,
                    }),
                },
                TargetReport {
                    account: "d".into(),
                    outcome: TargetOutcome::Unreachable("dns".into()),
                },
            ],
        };

        let statuses: Vec<&str> = summarize(&report).iter().map(|s| s.status).collect();
        assert_eq!(statuses, vec!["ok", "partial", "unreachable"]);
    }
}
