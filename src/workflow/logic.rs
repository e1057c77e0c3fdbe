// rdssnapshare/src/workflow/logic.rs
use anyhow::Result;
use serde::Serialize;
use tracing::{error, info, warn};

use super::status::{self, WorkflowStatus};
use super::{copier, locator, sharing};
use crate::config::CycleConfig;
use crate::directory;
use crate::errors::SnapshotError;
use crate::rds::{Snapshot, SnapshotBackend, SourceKind};

/// Step of the per-source workflow a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Locate,
    ReadStatus,
    Delete,
    Copy,
    Tag,
    Wait,
    Share,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SourceOutcome {
    NoSnapshot,
    CopyStarted {
        source_snapshot: String,
        target: String,
    },
    CopyPending {
        target: String,
        status: Option<String>,
    },
    Shared {
        target: String,
        account_id: String,
    },
    AlreadyShared {
        target: String,
    },
    UnrecognizedStatus {
        target: String,
        value: String,
    },
    Failed {
        stage: Stage,
        message: String,
        transient: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source: String,
    #[serde(flatten)]
    pub outcome: SourceOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub kind: SourceKind,
    pub sources: Vec<SourceReport>,
}

impl CycleReport {
    pub fn failed(&self) -> usize {
        self.sources
            .iter()
            .filter(|r| matches!(r.outcome, SourceOutcome::Failed { .. }))
            .count()
    }

    #[cfg(test)]
    pub fn outcome_of(&self, source: &str) -> Option<&SourceOutcome> {
        self.sources
            .iter()
            .find(|r| r.source == source)
            .map(|r| &r.outcome)
    }
}

struct StageError {
    stage: Stage,
    error: SnapshotError,
}

fn at(stage: Stage) -> impl FnOnce(SnapshotError) -> StageError {
    move |error| StageError { stage, error }
}

impl From<StageError> for SourceOutcome {
    fn from(failure: StageError) -> Self {
        SourceOutcome::Failed {
            stage: failure.stage,
            message: failure.error.to_string(),
            transient: failure.error.is_transient(),
        }
    }
}

type StageResult<T> = std::result::Result<T, StageError>;

/// Runs one workflow cycle over every configured source.
///
/// Only resolving the source list can fail the cycle as a whole; each source's
/// failure is recorded in its own report entry and the loop moves on.
pub async fn run_cycle<B: SnapshotBackend>(
    backend: &B,
    config: &CycleConfig,
) -> Result<CycleReport> {
    let sources = directory::resolve_sources(backend, &config.sources).await?;
    info!(
        kind = %backend.kind(),
        count = sources.len(),
        "🚀 Starting snapshot share cycle"
    );

    let mut reports = Vec::with_capacity(sources.len());
    for source in &sources {
        let outcome = match process_source(backend, config, &source.identifier).await {
            Ok(outcome) => outcome,
            Err(failure) => {
                error!(
                    source = %source.identifier,
                    stage = ?failure.stage,
                    error = %failure.error,
                    "❌ Source failed, continuing with the next one"
                );
                failure.into()
            }
        };
        reports.push(SourceReport {
            source: source.identifier.clone(),
            outcome,
        });
    }

    let report = CycleReport {
        kind: backend.kind(),
        sources: reports,
    };
    info!(
        processed = report.sources.len(),
        failed = report.failed(),
        "Snapshot share cycle finished"
    );
    Ok(report)
}

async fn process_source<B: SnapshotBackend>(
    backend: &B,
    config: &CycleConfig,
    source: &str,
) -> StageResult<SourceOutcome> {
    let target_id = config.target_identifier(source);

    let Some(latest) = locator::locate_latest(backend, source, &target_id)
        .await
        .map_err(at(Stage::Locate))?
    else {
        info!(source, "No snapshot yet, skipping this cycle");
        return Ok(SourceOutcome::NoSnapshot);
    };

    let target = backend
        .describe_snapshot(&target_id)
        .await
        .map_err(at(Stage::ReadStatus))?;
    let current = match &target {
        None => WorkflowStatus::None,
        Some(snapshot) => {
            let stored = status::read(backend, &snapshot.address)
                .await
                .map_err(at(Stage::ReadStatus))?;
            // A finished target is only current if it was copied from the latest
            // snapshot. Without an origin marker that cannot be shown.
            let stale = stored.status == WorkflowStatus::CopyComplete
                && stored.origin.as_deref() != Some(latest.identifier.as_str());
            if stale {
                info!(
                    source,
                    previous = stored.origin.as_deref().unwrap_or("unknown"),
                    latest = %latest.identifier,
                    "Target is not a copy of the latest snapshot, refreshing"
                );
                WorkflowStatus::None
            } else {
                stored.status
            }
        }
    };
    info!(source, snapshot = %target_id, status = ?current, "Evaluating source");

    match (current, target) {
        (WorkflowStatus::None, _) => start_copy(backend, config, &latest, &target_id).await,
        (WorkflowStatus::CopyInProgress, Some(snapshot)) if snapshot.is_terminal_failure() => {
            warn!(
                source,
                snapshot = %target_id,
                status = snapshot.status.as_deref().unwrap_or("unknown"),
                "Previous copy failed, starting over"
            );
            start_copy(backend, config, &latest, &target_id).await
        }
        (WorkflowStatus::CopyInProgress, Some(snapshot)) => {
            finish_share(backend, config, &snapshot).await
        }
        (WorkflowStatus::CopyComplete, _) => {
            info!(source, "Nothing to do, latest snapshot already copied and shared");
            Ok(SourceOutcome::AlreadyShared { target: target_id })
        }
        (WorkflowStatus::Unrecognized(value), _) => {
            warn!(
                source,
                snapshot = %target_id,
                value = %value,
                "Unrecognized workflow status, skipping"
            );
            Ok(SourceOutcome::UnrecognizedStatus {
                target: target_id,
                value,
            })
        }
        // A status is only ever read from an existing target.
        (WorkflowStatus::CopyInProgress, None) => {
            start_copy(backend, config, &latest, &target_id).await
        }
    }
}

async fn start_copy<B: SnapshotBackend>(
    backend: &B,
    config: &CycleConfig,
    latest: &Snapshot,
    target_id: &str,
) -> StageResult<SourceOutcome> {
    copier::delete(backend, target_id, config.delete_settle)
        .await
        .map_err(at(Stage::Delete))?;

    let copied = copier::copy(
        backend,
        latest,
        target_id,
        config.encryption_key_id.as_deref(),
    )
    .await
    .map_err(at(Stage::Copy))?;

    // Tagged only after the copy request succeeded: a rejected copy leaves no
    // status behind and is retried from scratch next cycle.
    status::mark_copy_started(backend, &copied.address, &latest.identifier)
        .await
        .map_err(at(Stage::Tag))?;

    if let Some(policy) = config.wait {
        let ready = copier::wait_until_available(backend, target_id, policy)
            .await
            .map_err(at(Stage::Wait))?;
        return finish_share(backend, config, &ready).await;
    }

    Ok(SourceOutcome::CopyStarted {
        source_snapshot: latest.identifier.clone(),
        target: target_id.to_string(),
    })
}

async fn finish_share<B: SnapshotBackend>(
    backend: &B,
    config: &CycleConfig,
    target: &Snapshot,
) -> StageResult<SourceOutcome> {
    if !target.is_available() {
        info!(
            snapshot = %target.identifier,
            status = target.status.as_deref().unwrap_or("unknown"),
            "Copy still running, will check again next cycle"
        );
        return Ok(SourceOutcome::CopyPending {
            target: target.identifier.clone(),
            status: target.status.clone(),
        });
    }

    // Share first: if the tag update below fails, the next cycle still sees
    // copy-in-progress and re-shares, which the provider treats as a no-op.
    sharing::share(backend, &target.identifier, &config.shared_account_id)
        .await
        .map_err(at(Stage::Share))?;
    status::write(backend, &target.address, &WorkflowStatus::CopyComplete)
        .await
        .map_err(at(Stage::Tag))?;

    Ok(SourceOutcome::Shared {
        target: target.identifier.clone(),
        account_id: config.shared_account_id.clone(),
    })
}
