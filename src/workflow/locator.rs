// rdssnapshare/src/workflow/locator.rs
use tracing::{debug, info};

use crate::errors::Result;
use crate::rds::{Snapshot, SnapshotBackend};

/// Finds the newest usable snapshot of `source`.
///
/// `exclude` is the stable target name: the shared copy is itself a snapshot of
/// the same source and must never be picked as its own origin. Snapshots that
/// report a status other than `available` are skipped as well, since they
/// cannot be copied yet.
///
/// Returns `Ok(None)` when the source has no snapshots or does not exist.
pub async fn locate_latest<B: SnapshotBackend>(
    backend: &B,
    source: &str,
    exclude: &str,
) -> Result<Option<Snapshot>> {
    let snapshots = match backend.list_snapshots(source).await {
        Ok(snapshots) => snapshots,
        Err(e) if e.is_not_found() => Vec::new(),
        Err(e) => return Err(e),
    };
    let total = snapshots.len();

    let latest = snapshots
        .into_iter()
        .filter(|s| s.identifier != exclude)
        .filter(|s| s.status.is_none() || s.is_available())
        // None sorts below Some, so snapshots without a timestamp come last.
        .max_by_key(|s| s.created_at);

    match &latest {
        Some(snapshot) => info!(
            source,
            snapshot = %snapshot.identifier,
            address = %snapshot.address,
            "Located latest snapshot"
        ),
        None => debug!(source, total, "No usable snapshot found"),
    }
    Ok(latest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SnapshotError;
    use crate::rds::SourceKind;
    use crate::rds::fake::FakeBackend;

    #[tokio::test]
    async fn test_picks_most_recent_snapshot() -> anyhow::Result<()> {
        let backend = FakeBackend::new(SourceKind::Instance);
        backend.add_snapshot("db-1", "db-1-2023", 1);
        backend.add_snapshot("db-1", "db-1-2024", 200);
        backend.add_snapshot("db-1", "db-1-mid", 100);
        backend.add_snapshot("db-2", "db-2-newest", 300);

        let latest = locate_latest(&backend, "db-1", "db-1-latest").await?;
        assert_eq!(latest.map(|s| s.identifier).as_deref(), Some("db-1-2024"));
        Ok(())
    }

    #[tokio::test]
    async fn test_zero_snapshots_is_not_found_not_error() -> anyhow::Result<()> {
        let backend = FakeBackend::new(SourceKind::Cluster);
        assert_eq!(locate_latest(&backend, "db-1", "db-1-latest").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_skips_target_and_unavailable_snapshots() -> anyhow::Result<()> {
        let backend = FakeBackend::new(SourceKind::Instance);
        backend.add_snapshot("db-1", "db-1-2024", 200);
        backend.add_snapshot("db-1", "db-1-latest", 250);
        backend.add_snapshot("db-1", "db-1-inflight", 300);
        backend.set_status("db-1-inflight", "creating");

        let latest = locate_latest(&backend, "db-1", "db-1-latest").await?;
        assert_eq!(latest.map(|s| s.identifier).as_deref(), Some("db-1-2024"));
        Ok(())
    }

    #[tokio::test]
    async fn test_provider_failure_is_typed() {
        let backend = FakeBackend::new(SourceKind::Instance);
        backend.add_snapshot("db-1", "db-1-2024", 200);
        backend.fail_snapshot_listing_for("db-1");

        let result = locate_latest(&backend, "db-1", "db-1-latest").await;
        assert!(matches!(result, Err(SnapshotError::Transient { .. })));
    }
}
