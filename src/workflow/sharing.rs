// rdssnapshare/src/workflow/sharing.rs
use tracing::info;

use crate::errors::Result;
use crate::rds::SnapshotBackend;

/// Adds `account_id` to the target's restore permission list. The provider
/// treats an account that is already present as a no-op.
pub async fn share<B: SnapshotBackend>(
    backend: &B,
    target_identifier: &str,
    account_id: &str,
) -> Result<()> {
    info!(
        snapshot = target_identifier,
        account_id,
        "🔗 Sharing snapshot with external account"
    );
    backend.share_snapshot(target_identifier, account_id).await?;
    info!(snapshot = target_identifier, account_id, "✅ Snapshot shared");
    Ok(())
}
