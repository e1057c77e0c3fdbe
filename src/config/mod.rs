// rdssnapshare/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use crate::rds::SourceKind;

const DEFAULT_TARGET_SUFFIX: &str = "-latest";
const DEFAULT_EXPORT_FILE: &str = "dbIdentifierList.txt";
const DEFAULT_DELETE_SETTLE_SECS: u64 = 5;
const DEFAULT_WAIT_POLL_SECS: u64 = 30;
const DEFAULT_WAIT_MAX_ATTEMPTS: u32 = 60;

// Raw environment, one field per variable (lowercased). Everything is optional here;
// the load_* functions decide what each operation requires.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEnvConfig {
    pub shared_account_id: Option<String>,
    pub aws_shared_account: Option<String>,
    pub encryption_key_id: Option<String>,
    pub reencrypt_copies: Option<String>,
    pub source_kind: Option<String>,
    pub source_database: Option<String>,
    pub source_list: Option<String>,
    pub source_list_file: Option<PathBuf>,
    pub source_engine: Option<String>,
    pub target_snapshot_suffix: Option<String>,
    pub wait_for_copy: Option<String>,
    pub wait_poll_seconds: Option<String>,
    pub wait_max_attempts: Option<String>,
    pub delete_settle_seconds: Option<String>,
    pub source_export_file: Option<PathBuf>,
}

impl RawEnvConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(utf8_vars(std::env::vars_os()))
    }

    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let map: Map<String, Value> = vars
            .into_iter()
            .map(|(key, value)| (key.as_ref().to_ascii_lowercase(), Value::String(value.into())))
            .collect();
        serde_json::from_value(Value::Object(map))
            .context("Failed to read configuration from environment variables")
    }
}

// Variables that are not valid UTF-8 cannot be ours; skip them.
fn utf8_vars<I>(vars: I) -> impl Iterator<Item = (String, String)>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
}

/// Which databases a cycle works on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSelection {
    Single(String),
    Inline(Vec<String>),
    ListFile(PathBuf),
    Directory { engine: Option<String> },
}

/// Bounded polling used when the copy is awaited in-process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub poll_interval: Duration,
    pub max_attempts: u32,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        WaitPolicy {
            poll_interval: Duration::from_secs(DEFAULT_WAIT_POLL_SECS),
            max_attempts: DEFAULT_WAIT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CycleConfig {
    pub shared_account_id: String,
    pub encryption_key_id: Option<String>,
    pub source_kind: SourceKind,
    pub sources: SourceSelection,
    pub target_suffix: String,
    pub wait: Option<WaitPolicy>,
    pub delete_settle: Duration,
}

impl CycleConfig {
    /// Stable name of the shared copy kept for `source`.
    pub fn target_identifier(&self, source: &str) -> String {
        format!("{}{}", source, self.target_suffix)
    }
}

#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub source_kind: SourceKind,
    pub engine: Option<String>,
    pub export_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub operation: Option<OperationConfig>,
    pub raw_env_config: RawEnvConfig,
}

#[derive(Debug, Clone)]
pub enum OperationConfig {
    Cycle(CycleConfig),
    Export(ExportConfig),
}

impl AppConfig {
    pub fn load_from_env() -> Result<Self> {
        Ok(AppConfig {
            operation: None, // filled in by main once the operation is known
            raw_env_config: RawEnvConfig::from_env()?,
        })
    }
}

pub fn load_cycle_config(raw: &RawEnvConfig) -> Result<CycleConfig> {
    let shared_account_id = non_empty(&raw.shared_account_id)
        .or_else(|| non_empty(&raw.aws_shared_account))
        .context("SHARED_ACCOUNT_ID must be set to the account the snapshots are shared with")?;
    if shared_account_id.len() != 12 || !shared_account_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(anyhow::anyhow!(
            "SHARED_ACCOUNT_ID must be a 12-digit AWS account id, got '{}'",
            shared_account_id
        ));
    }

    let encryption_key_id = non_empty(&raw.encryption_key_id);
    let reencrypt = parse_flag(&raw.reencrypt_copies, "REENCRYPT_COPIES")?;
    if reencrypt && encryption_key_id.is_none() {
        return Err(anyhow::anyhow!(
            "ENCRYPTION_KEY_ID must be set when REENCRYPT_COPIES is enabled"
        ));
    }

    let wait = if parse_flag(&raw.wait_for_copy, "WAIT_FOR_COPY")? {
        Some(WaitPolicy {
            poll_interval: Duration::from_secs(parse_number(
                &raw.wait_poll_seconds,
                "WAIT_POLL_SECONDS",
                DEFAULT_WAIT_POLL_SECS,
            )?),
            max_attempts: parse_number(
                &raw.wait_max_attempts,
                "WAIT_MAX_ATTEMPTS",
                DEFAULT_WAIT_MAX_ATTEMPTS,
            )?,
        })
    } else {
        None
    };

    Ok(CycleConfig {
        shared_account_id,
        encryption_key_id,
        source_kind: parse_source_kind(raw)?,
        sources: parse_source_selection(raw),
        target_suffix: raw
            .target_snapshot_suffix
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_TARGET_SUFFIX.to_string()),
        wait,
        delete_settle: Duration::from_secs(parse_number(
            &raw.delete_settle_seconds,
            "DELETE_SETTLE_SECONDS",
            DEFAULT_DELETE_SETTLE_SECS,
        )?),
    })
}

pub fn load_export_config(raw: &RawEnvConfig) -> Result<ExportConfig> {
    Ok(ExportConfig {
        source_kind: parse_source_kind(raw)?,
        engine: non_empty(&raw.source_engine),
        export_path: raw
            .source_export_file
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_FILE)),
    })
}

/// SOURCE_DATABASE wins over SOURCE_LIST, which wins over SOURCE_LIST_FILE.
/// With none of them set the live directory is queried.
fn parse_source_selection(raw: &RawEnvConfig) -> SourceSelection {
    if let Some(single) = non_empty(&raw.source_database) {
        return SourceSelection::Single(single);
    }
    if let Some(list) = non_empty(&raw.source_list) {
        let names: Vec<String> = list
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if !names.is_empty() {
            return SourceSelection::Inline(names);
        }
    }
    if let Some(path) = raw
        .source_list_file
        .clone()
        .filter(|p| !p.as_os_str().is_empty())
    {
        return SourceSelection::ListFile(path);
    }
    SourceSelection::Directory {
        engine: non_empty(&raw.source_engine),
    }
}

fn parse_source_kind(raw: &RawEnvConfig) -> Result<SourceKind> {
    match non_empty(&raw.source_kind) {
        Some(kind) => kind.parse::<SourceKind>().context("Invalid SOURCE_KIND"),
        None => Ok(SourceKind::Instance),
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_flag(value: &Option<String>, name: &str) -> Result<bool> {
    match non_empty(value).map(|s| s.to_ascii_lowercase()).as_deref() {
        None | Some("false") | Some("0") | Some("no") => Ok(false),
        Some("true") | Some("1") | Some("yes") => Ok(true),
        Some(other) => Err(anyhow::anyhow!(
            "{} must be true or false, got '{}'",
            name,
            other
        )),
    }
}

fn parse_number<T>(value: &Option<String>, name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty(value) {
        Some(s) => s
            .parse()
            .with_context(|| format!("{} must be a non-negative integer, got '{}'", name, s)),
        None => Ok(default),
    }
}
