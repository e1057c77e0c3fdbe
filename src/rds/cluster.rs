// rdssnapshare/src/rds/cluster.rs
use aws_sdk_rds::Client;
use aws_sdk_rds::types::DbClusterSnapshot;

use super::{Snapshot, SnapshotBackend, Source, SourceKind, tags, to_chrono};
use crate::errors::{Result, SnapshotError, from_sdk};

/// Snapshots of Aurora / multi-AZ DB clusters (`DescribeDBClusterSnapshots` and friends).
#[derive(Debug, Clone)]
pub struct ClusterSnapshots {
    client: Client,
}

impl ClusterSnapshots {
    pub fn new(client: Client) -> Self {
        ClusterSnapshots { client }
    }
}

fn from_cluster_snapshot(snapshot: &DbClusterSnapshot) -> Result<Snapshot> {
    let identifier = snapshot.db_cluster_snapshot_identifier().ok_or_else(|| {
        SnapshotError::Malformed("DB cluster snapshot without identifier".to_string())
    })?;
    let address = snapshot.db_cluster_snapshot_arn().ok_or_else(|| {
        SnapshotError::Malformed(format!("DB cluster snapshot {} without ARN", identifier))
    })?;

    Ok(Snapshot {
        identifier: identifier.to_string(),
        address: address.to_string(),
        created_at: snapshot.snapshot_create_time().and_then(to_chrono),
        status: snapshot.status().map(str::to_string),
    })
}

impl SnapshotBackend for ClusterSnapshots {
    fn kind(&self) -> SourceKind {
        SourceKind::Cluster
    }

    async fn list_sources(&self) -> Result<Vec<Source>> {
        let mut sources = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let output = self
                .client
                .describe_db_clusters()
                .set_marker(marker.take())
                .send()
                .await
                .map_err(|err| from_sdk("DescribeDBClusters", "DB clusters", err))?;

            for cluster in output.db_clusters() {
                if let Some(identifier) = cluster.db_cluster_identifier() {
                    sources.push(Source {
                        identifier: identifier.to_string(),
                        engine: cluster.engine().map(str::to_string),
                    });
                }
            }

            match output.marker() {
                Some(next) if !next.is_empty() => marker = Some(next.to_string()),
                _ => break,
            }
        }
        Ok(sources)
    }

    async fn list_snapshots(&self, source: &str) -> Result<Vec<Snapshot>> {
        let mut snapshots = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let output = match self
                .client
                .describe_db_cluster_snapshots()
                .db_cluster_identifier(source)
                .set_marker(marker.take())
                .send()
                .await
            {
                Ok(output) => output,
                Err(err) => match from_sdk("DescribeDBClusterSnapshots", source, err) {
                    e if e.is_not_found() => return Ok(Vec::new()),
                    e => return Err(e),
                },
            };

            for snapshot in output.db_cluster_snapshots() {
                snapshots.push(from_cluster_snapshot(snapshot)?);
            }

            match output.marker() {
                Some(next) if !next.is_empty() => marker = Some(next.to_string()),
                _ => break,
            }
        }
        Ok(snapshots)
    }

    async fn describe_snapshot(&self, identifier: &str) -> Result<Option<Snapshot>> {
        let output = match self
            .client
            .describe_db_cluster_snapshots()
            .db_cluster_snapshot_identifier(identifier)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => match from_sdk("DescribeDBClusterSnapshots", identifier, err) {
                e if e.is_not_found() => return Ok(None),
                e => return Err(e),
            },
        };

        output.db_cluster_snapshots().first().map(from_cluster_snapshot).transpose()
    }

    async fn delete_snapshot(&self, identifier: &str) -> Result<()> {
        self.client
            .delete_db_cluster_snapshot()
            .db_cluster_snapshot_identifier(identifier)
            .send()
            .await
            .map_err(|err| from_sdk("DeleteDBClusterSnapshot", identifier, err))?;
        Ok(())
    }

    async fn copy_snapshot(
        &self,
        source_address: &str,
        target_identifier: &str,
        kms_key_id: Option<&str>,
    ) -> Result<Snapshot> {
        let output = self
            .client
            .copy_db_cluster_snapshot()
            .source_db_cluster_snapshot_identifier(source_address)
            .target_db_cluster_snapshot_identifier(target_identifier)
            .copy_tags(true)
            .set_kms_key_id(kms_key_id.map(str::to_string))
            .send()
            .await
            .map_err(|err| from_sdk("CopyDBClusterSnapshot", target_identifier, err))?;

        let snapshot = output.db_cluster_snapshot().ok_or_else(|| {
            SnapshotError::Malformed(format!(
                "CopyDBClusterSnapshot returned no snapshot for {}",
                target_identifier
            ))
        })?;
        from_cluster_snapshot(snapshot)
    }

    async fn share_snapshot(&self, identifier: &str, account_id: &str) -> Result<()> {
        self.client
            .modify_db_cluster_snapshot_attribute()
            .db_cluster_snapshot_identifier(identifier)
            .attribute_name("restore")
            .values_to_add(account_id)
            .send()
            .await
            .map_err(|err| from_sdk("ModifyDBClusterSnapshotAttribute", identifier, err))?;
        Ok(())
    }

    async fn list_tags(&self, address: &str) -> Result<Vec<(String, String)>> {
        tags::list_tags(&self.client, address).await
    }

    async fn add_tags(&self, address: &str, pairs: &[(&str, &str)]) -> Result<()> {
        tags::add_tags(&self.client, address, pairs).await
    }
}
