// rdssnapshare/src/rds/mod.rs
//! RDS control-plane access.
//!
//! Instance and cluster snapshots expose the same capability set
//! (list, describe, delete, copy, share, tag) through [`SnapshotBackend`];
//! the workflow is written once against that trait.

pub(crate) mod cluster;
pub(crate) mod instance;
mod tags;

#[cfg(test)]
pub(crate) mod fake;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::errors::Result;

pub use cluster::ClusterSnapshots;
pub use instance::InstanceSnapshots;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Instance,
    Cluster,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Instance => write!(f, "instance"),
            SourceKind::Cluster => write!(f, "cluster"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "instance" | "db-instance" => Ok(SourceKind::Instance),
            "cluster" | "db-cluster" => Ok(SourceKind::Cluster),
            other => Err(anyhow::anyhow!(
                "unknown source kind '{}', expected 'instance' or 'cluster'",
                other
            )),
        }
    }
}

/// A database the workflow keeps a shared copy of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub identifier: String,
    pub engine: Option<String>,
}

impl Source {
    pub fn new(identifier: impl Into<String>) -> Self {
        Source {
            identifier: identifier.into(),
            engine: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub identifier: String,
    /// ARN; tags are addressed by it.
    pub address: String,
    pub created_at: Option<DateTime<Utc>>,
    /// Provider lifecycle status, e.g. `creating` or `available`.
    pub status: Option<String>,
}

impl Snapshot {
    pub fn is_available(&self) -> bool {
        self.status.as_deref() == Some("available")
    }

    /// Statuses from which a snapshot never becomes available.
    pub fn is_terminal_failure(&self) -> bool {
        match self.status.as_deref() {
            Some(status) => status == "failed" || status.starts_with("incompatible"),
            None => false,
        }
    }
}

/// The snapshot operations the workflow needs from the provider.
///
/// Lookups that find nothing return `Ok(None)` / an empty list; every other
/// failure is a typed [`crate::errors::SnapshotError`].
#[allow(async_fn_in_trait)]
pub trait SnapshotBackend {
    fn kind(&self) -> SourceKind;

    async fn list_sources(&self) -> Result<Vec<Source>>;

    async fn list_snapshots(&self, source: &str) -> Result<Vec<Snapshot>>;

    async fn describe_snapshot(&self, identifier: &str) -> Result<Option<Snapshot>>;

    async fn delete_snapshot(&self, identifier: &str) -> Result<()>;

    async fn copy_snapshot(
        &self,
        source_address: &str,
        target_identifier: &str,
        kms_key_id: Option<&str>,
    ) -> Result<Snapshot>;

    async fn share_snapshot(&self, identifier: &str, account_id: &str) -> Result<()>;

    async fn list_tags(&self, address: &str) -> Result<Vec<(String, String)>>;

    async fn add_tags(&self, address: &str, tags: &[(&str, &str)]) -> Result<()>;
}

/// Builds an RDS client from the default provider chain (env, profile, IMDS / Lambda role).
pub async fn client_from_env() -> aws_sdk_rds::Client {
    let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    aws_sdk_rds::Client::new(&sdk_config)
}

fn to_chrono(value: &aws_smithy_types::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(value.secs(), value.subsec_nanos())
}
