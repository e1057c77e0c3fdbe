// rdssnapshare/src/rds/fake.rs
// In-memory backend used by the workflow tests. Records every call it receives.
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{Snapshot, SnapshotBackend, Source, SourceKind};
use crate::errors::{Result, SnapshotError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    ListSources,
    ListSnapshots(String),
    Describe(String),
    Delete(String),
    Copy {
        source_address: String,
        target: String,
        kms_key_id: Option<String>,
    },
    Share {
        identifier: String,
        account_id: String,
    },
    ListTags(String),
    AddTags {
        address: String,
        tags: Vec<(String, String)>,
    },
}

struct Entry {
    source: String,
    snapshot: Snapshot,
    tags: Vec<(String, String)>,
    shared_with: Vec<String>,
}

#[derive(Default)]
struct State {
    sources: Vec<Source>,
    entries: Vec<Entry>,
    calls: Vec<Call>,
    pending_polls: HashMap<String, u32>,
    copy_pending_polls: u32,
    failing_sources: Vec<String>,
    fail_shares: bool,
    fail_tagging: bool,
}

pub(crate) struct FakeBackend {
    kind: SourceKind,
    state: Mutex<State>,
}

impl FakeBackend {
    pub(crate) fn new(kind: SourceKind) -> Self {
        FakeBackend {
            kind,
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("fake backend state poisoned")
    }

    fn arn(&self, identifier: &str) -> String {
        match self.kind {
            SourceKind::Instance => {
                format!("arn:aws:rds:us-east-1:123456789012:snapshot:{}", identifier)
            }
            SourceKind::Cluster => {
                format!("arn:aws:rds:us-east-1:123456789012:cluster-snapshot:{}", identifier)
            }
        }
    }

    pub(crate) fn add_source(&self, identifier: &str, engine: Option<&str>) {
        self.state().sources.push(Source {
            identifier: identifier.to_string(),
            engine: engine.map(str::to_string),
        });
    }

    /// Adds an available snapshot of `source` created on the given day of 2024.
    pub(crate) fn add_snapshot(
        &self,
        source: &str,
        identifier: &str,
        day_of_2024: u32,
    ) -> Snapshot {
        let snapshot = Snapshot {
            identifier: identifier.to_string(),
            address: self.arn(identifier),
            created_at: Some(day(day_of_2024)),
            status: Some("available".to_string()),
        };
        self.state().entries.push(Entry {
            source: source.to_string(),
            snapshot: snapshot.clone(),
            tags: Vec::new(),
            shared_with: Vec::new(),
        });
        snapshot
    }

    pub(crate) fn set_status(&self, identifier: &str, status: &str) {
        let mut state = self.state();
        if let Some(entry) = state
            .entries
            .iter_mut()
            .find(|e| e.snapshot.identifier == identifier)
        {
            entry.snapshot.status = Some(status.to_string());
        }
    }

    pub(crate) fn tag(&self, identifier: &str, key: &str, value: &str) {
        let mut state = self.state();
        if let Some(entry) = state
            .entries
            .iter_mut()
            .find(|e| e.snapshot.identifier == identifier)
        {
            upsert(&mut entry.tags, key, value);
        }
    }

    /// New copies report `creating` for this many describes before turning available.
    pub(crate) fn set_copy_pending_polls(&self, polls: u32) {
        self.state().copy_pending_polls = polls;
    }

    pub(crate) fn fail_snapshot_listing_for(&self, source: &str) {
        self.state().failing_sources.push(source.to_string());
    }

    pub(crate) fn fail_shares(&self) {
        self.state().fail_shares = true;
    }

    pub(crate) fn set_tagging_fails(&self, fails: bool) {
        self.state().fail_tagging = fails;
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub(crate) fn copy_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Copy { .. }))
            .count()
    }

    pub(crate) fn share_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Share { .. }))
            .count()
    }

    pub(crate) fn tag_value(&self, identifier: &str, key: &str) -> Option<String> {
        let state = self.state();
        state
            .entries
            .iter()
            .find(|e| e.snapshot.identifier == identifier)
            .and_then(|e| e.tags.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone()))
    }

    pub(crate) fn shared_with(&self, identifier: &str) -> Vec<String> {
        let state = self.state();
        state
            .entries
            .iter()
            .find(|e| e.snapshot.identifier == identifier)
            .map(|e| e.shared_with.clone())
            .unwrap_or_default()
    }

    pub(crate) fn exists(&self, identifier: &str) -> bool {
        self.state()
            .entries
            .iter()
            .any(|e| e.snapshot.identifier == identifier)
    }
}

fn day(day_of_2024: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::days(day_of_2024 as i64)
}

fn upsert(tags: &mut Vec<(String, String)>, key: &str, value: &str) {
    match tags.iter_mut().find(|(k, _)| k == key) {
        Some(existing) => existing.1 = value.to_string(),
        None => tags.push((key.to_string(), value.to_string())),
    }
}

fn not_found(resource: &str) -> SnapshotError {
    SnapshotError::NotFound {
        resource: resource.to_string(),
    }
}

impl SnapshotBackend for FakeBackend {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn list_sources(&self) -> Result<Vec<Source>> {
        let mut state = self.state();
        state.calls.push(Call::ListSources);
        Ok(state.sources.clone())
    }

    async fn list_snapshots(&self, source: &str) -> Result<Vec<Snapshot>> {
        let mut state = self.state();
        state.calls.push(Call::ListSnapshots(source.to_string()));
        if state.failing_sources.iter().any(|s| s == source) {
            return Err(SnapshotError::Transient {
                operation: "DescribeDBSnapshots",
                message: "Rate exceeded".to_string(),
            });
        }
        Ok(state
            .entries
            .iter()
            .filter(|e| e.source == source)
            .map(|e| e.snapshot.clone())
            .collect())
    }

    async fn describe_snapshot(&self, identifier: &str) -> Result<Option<Snapshot>> {
        let mut state = self.state();
        state.calls.push(Call::Describe(identifier.to_string()));

        // Only copies made through copy_snapshot finish on their own.
        let finished = match state.pending_polls.get(identifier).copied() {
            Some(polls) if polls > 0 => {
                state
                    .pending_polls
                    .insert(identifier.to_string(), polls - 1);
                false
            }
            Some(_) => {
                state.pending_polls.remove(identifier);
                true
            }
            None => false,
        };

        let entry = state
            .entries
            .iter_mut()
            .find(|e| e.snapshot.identifier == identifier);
        Ok(entry.map(|e| {
            if finished && e.snapshot.status.as_deref() == Some("creating") {
                e.snapshot.status = Some("available".to_string());
            }
            e.snapshot.clone()
        }))
    }

    async fn delete_snapshot(&self, identifier: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::Delete(identifier.to_string()));
        let before = state.entries.len();
        state.entries.retain(|e| e.snapshot.identifier != identifier);
        if state.entries.len() == before {
            return Err(not_found(identifier));
        }
        Ok(())
    }

    async fn copy_snapshot(
        &self,
        source_address: &str,
        target_identifier: &str,
        kms_key_id: Option<&str>,
    ) -> Result<Snapshot> {
        let address = self.arn(target_identifier);
        let mut state = self.state();
        state.calls.push(Call::Copy {
            source_address: source_address.to_string(),
            target: target_identifier.to_string(),
            kms_key_id: kms_key_id.map(str::to_string),
        });

        if state
            .entries
            .iter()
            .any(|e| e.snapshot.identifier == target_identifier)
        {
            return Err(SnapshotError::Fatal {
                operation: "CopyDBSnapshot",
                message: format!("DBSnapshotAlreadyExists: {}", target_identifier),
            });
        }
        let (source, tags) = state
            .entries
            .iter()
            .find(|e| e.snapshot.address == source_address)
            .map(|e| (e.source.clone(), e.tags.clone()))
            .ok_or_else(|| not_found(source_address))?;

        let pending = state.copy_pending_polls;
        let snapshot = Snapshot {
            identifier: target_identifier.to_string(),
            address,
            created_at: Some(day(365)),
            status: Some("creating".to_string()),
        };
        state.entries.push(Entry {
            source,
            snapshot: snapshot.clone(),
            tags,
            shared_with: Vec::new(),
        });
        state
            .pending_polls
            .insert(target_identifier.to_string(), pending);
        Ok(snapshot)
    }

    async fn share_snapshot(&self, identifier: &str, account_id: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::Share {
            identifier: identifier.to_string(),
            account_id: account_id.to_string(),
        });
        if state.fail_shares {
            return Err(SnapshotError::Transient {
                operation: "ModifyDBSnapshotAttribute",
                message: "Throttling".to_string(),
            });
        }
        let entry = state
            .entries
            .iter_mut()
            .find(|e| e.snapshot.identifier == identifier)
            .ok_or_else(|| not_found(identifier))?;
        if !entry.shared_with.iter().any(|a| a == account_id) {
            entry.shared_with.push(account_id.to_string());
        }
        Ok(())
    }

    async fn list_tags(&self, address: &str) -> Result<Vec<(String, String)>> {
        let mut state = self.state();
        state.calls.push(Call::ListTags(address.to_string()));
        state
            .entries
            .iter()
            .find(|e| e.snapshot.address == address)
            .map(|e| e.tags.clone())
            .ok_or_else(|| not_found(address))
    }

    async fn add_tags(&self, address: &str, pairs: &[(&str, &str)]) -> Result<()> {
        let mut state = self.state();
        state.calls.push(Call::AddTags {
            address: address.to_string(),
            tags: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        });
        if state.fail_tagging {
            return Err(SnapshotError::Transient {
                operation: "AddTagsToResource",
                message: "Rate exceeded".to_string(),
            });
        }
        let entry = state
            .entries
            .iter_mut()
            .find(|e| e.snapshot.address == address)
            .ok_or_else(|| not_found(address))?;
        for (key, value) in pairs {
            upsert(&mut entry.tags, key, value);
        }
        Ok(())
    }
}
