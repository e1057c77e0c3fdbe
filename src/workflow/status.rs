// rdssnapshare/src/workflow/status.rs
//! Workflow tag store. The status tag on the target snapshot is the only state
//! carried between invocations.

use tracing::debug;

use crate::errors::Result;
use crate::rds::SnapshotBackend;

pub const STATUS_TAG_KEY: &str = "rds-util-status";
/// Identifier of the source snapshot the target was copied from.
pub const ORIGIN_TAG_KEY: &str = "rds-util-source-snapshot";

const COPY_IN_PROGRESS: &str = "copy-in-progress";
const COPY_COMPLETE: &str = "copy-complete";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowStatus {
    None,
    CopyInProgress,
    CopyComplete,
    Unrecognized(String),
}

impl WorkflowStatus {
    pub fn from_tag_value(value: Option<&str>) -> Self {
        match value {
            None => WorkflowStatus::None,
            Some(COPY_IN_PROGRESS) => WorkflowStatus::CopyInProgress,
            Some(COPY_COMPLETE) => WorkflowStatus::CopyComplete,
            Some(other) => WorkflowStatus::Unrecognized(other.to_string()),
        }
    }

    pub fn tag_value(&self) -> Option<&str> {
        match self {
            WorkflowStatus::None => None,
            WorkflowStatus::CopyInProgress => Some(COPY_IN_PROGRESS),
            WorkflowStatus::CopyComplete => Some(COPY_COMPLETE),
            WorkflowStatus::Unrecognized(value) => Some(value.as_str()),
        }
    }
}

/// What the target snapshot's tags say about its copy cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredState {
    pub status: WorkflowStatus,
    pub origin: Option<String>,
}

pub async fn read<B: SnapshotBackend>(backend: &B, address: &str) -> Result<StoredState> {
    let tags = backend.list_tags(address).await?;
    let state = StoredState {
        status: WorkflowStatus::from_tag_value(find_tag(&tags, STATUS_TAG_KEY)),
        origin: find_tag(&tags, ORIGIN_TAG_KEY).map(str::to_string),
    };
    debug!(address, status = ?state.status, origin = ?state.origin, "Read workflow tags");
    Ok(state)
}

fn find_tag<'a>(tags: &'a [(String, String)], key: &str) -> Option<&'a str> {
    tags.iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Sets the status tag. Other tags on the resource are left alone; writing
/// `None` is a no-op because absence is the `None` state.
pub async fn write<B: SnapshotBackend>(
    backend: &B,
    address: &str,
    status: &WorkflowStatus,
) -> Result<()> {
    let Some(value) = status.tag_value() else {
        return Ok(());
    };
    backend.add_tags(address, &[(STATUS_TAG_KEY, value)]).await?;
    debug!(address, value, "Updated workflow status tag");
    Ok(())
}

/// Opens a copy cycle: `copy-in-progress` and the origin marker land in one
/// request, so a target never carries one without the other.
pub async fn mark_copy_started<B: SnapshotBackend>(
    backend: &B,
    address: &str,
    source_snapshot: &str,
) -> Result<()> {
    backend
        .add_tags(
            address,
            &[
                (STATUS_TAG_KEY, COPY_IN_PROGRESS),
                (ORIGIN_TAG_KEY, source_snapshot),
            ],
        )
        .await?;
    debug!(address, source_snapshot, "Marked copy as started");
    Ok(())
}
