// rdssnapshare/src/workflow/copier.rs
use std::time::Duration;
use tracing::{debug, info};

use crate::config::WaitPolicy;
use crate::errors::{Result, SnapshotError};
use crate::rds::{Snapshot, SnapshotBackend};

/// Removes a stale target so the next copy can reuse its name.
///
/// Absent targets are a no-op. After a real delete the call pauses for `settle`
/// so the provider has released the name before a copy is issued. Returns
/// whether anything was deleted.
pub async fn delete<B: SnapshotBackend>(
    backend: &B,
    identifier: &str,
    settle: Duration,
) -> Result<bool> {
    if backend.describe_snapshot(identifier).await?.is_none() {
        debug!(snapshot = identifier, "Target does not exist, nothing to delete");
        return Ok(false);
    }

    match backend.delete_snapshot(identifier).await {
        Ok(()) => {}
        // Gone between the describe and the delete.
        Err(e) if e.is_not_found() => return Ok(false),
        Err(e) => return Err(e),
    }
    info!(snapshot = identifier, "🗑 Deleted previous target snapshot");

    if !settle.is_zero() {
        tokio::time::sleep(settle).await;
    }
    Ok(true)
}

/// Starts an asynchronous copy of `source` into `target_identifier`, carrying
/// the source tags over. With a KMS key the copy is re-encrypted under it.
pub async fn copy<B: SnapshotBackend>(
    backend: &B,
    source: &Snapshot,
    target_identifier: &str,
    kms_key_id: Option<&str>,
) -> Result<Snapshot> {
    info!(
        source_snapshot = %source.identifier,
        snapshot = target_identifier,
        reencrypt = kms_key_id.is_some(),
        "📦 Copying snapshot"
    );
    let copied = backend
        .copy_snapshot(&source.address, target_identifier, kms_key_id)
        .await?;
    info!(
        snapshot = %copied.identifier,
        status = copied.status.as_deref().unwrap_or("unknown"),
        "Copy requested"
    );
    Ok(copied)
}

/// Polls until the snapshot is `available`, at most `policy.max_attempts` times.
pub async fn wait_until_available<B: SnapshotBackend>(
    backend: &B,
    identifier: &str,
    policy: WaitPolicy,
) -> Result<Snapshot> {
    for attempt in 1..=policy.max_attempts {
        let snapshot = backend.describe_snapshot(identifier).await?.ok_or_else(|| {
            SnapshotError::UnexpectedState {
                identifier: identifier.to_string(),
                state: "deleted while waiting".to_string(),
            }
        })?;

        if snapshot.is_available() {
            info!(snapshot = identifier, attempt, "✅ Snapshot is available");
            return Ok(snapshot);
        }
        if snapshot.is_terminal_failure() {
            return Err(SnapshotError::UnexpectedState {
                identifier: identifier.to_string(),
                state: snapshot.status.unwrap_or_default(),
            });
        }

        debug!(
            snapshot = identifier,
            attempt,
            max_attempts = policy.max_attempts,
            status = snapshot.status.as_deref().unwrap_or("unknown"),
            "Waiting for snapshot"
        );
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.poll_interval).await;
        }
    }

    Err(SnapshotError::WaitExhausted {
        identifier: identifier.to_string(),
        attempts: policy.max_attempts,
    })
}
