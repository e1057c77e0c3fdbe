// rdssnapshare/src/directory/mod.rs
//! Resource directory: turns the configured source selection into a list of
//! databases to process.

use anyhow::{Context, Result};
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use crate::config::{AppConfig, ExportConfig, OperationConfig, SourceSelection};
use crate::rds::{self, ClusterSnapshots, InstanceSnapshots, SnapshotBackend, Source, SourceKind};

/// Public entry point for exporting the live directory to a list file.
pub async fn run_export_flow(app_config: &AppConfig) -> Result<usize> {
    let export_config = match &app_config.operation {
        Some(OperationConfig::Export(cfg)) => cfg,
        _ => anyhow::bail!("Export operation selected but no export configuration found."),
    };

    let client = rds::client_from_env().await;
    match export_config.source_kind {
        SourceKind::Instance => {
            export_sources(&InstanceSnapshots::new(client), export_config).await
        }
        SourceKind::Cluster => {
            export_sources(&ClusterSnapshots::new(client), export_config).await
        }
    }
}

/// Resolves the sources a cycle should process, in a stable order without duplicates.
pub async fn resolve_sources<B: SnapshotBackend>(
    backend: &B,
    selection: &SourceSelection,
) -> Result<Vec<Source>> {
    let names = match selection {
        SourceSelection::Single(name) => vec![name.clone()],
        SourceSelection::Inline(names) => names.clone(),
        SourceSelection::ListFile(path) => read_source_list(path)?,
        SourceSelection::Directory { engine } => {
            return list_live_sources(backend, engine.as_deref()).await;
        }
    };

    let mut sources: Vec<Source> = Vec::with_capacity(names.len());
    for name in names {
        if sources.iter().any(|s| s.identifier == name) {
            warn!(source = %name, "Source listed more than once, ignoring duplicate");
            continue;
        }
        sources.push(Source::new(name));
    }
    Ok(sources)
}

/// Queries the provider for every database of the backend's kind, keeping only
/// those whose engine matches `engine` (case-insensitive) when one is given.
pub async fn list_live_sources<B: SnapshotBackend>(
    backend: &B,
    engine: Option<&str>,
) -> Result<Vec<Source>> {
    let sources = backend
        .list_sources()
        .await
        .with_context(|| format!("Failed to list DB {}s", backend.kind()))?;
    let total = sources.len();

    let filtered: Vec<Source> = sources
        .into_iter()
        .filter(|source| match engine {
            Some(wanted) => source
                .engine
                .as_deref()
                .is_some_and(|e| e.eq_ignore_ascii_case(wanted)),
            None => true,
        })
        .collect();

    info!(
        kind = %backend.kind(),
        engine = engine.unwrap_or("*"),
        total,
        selected = filtered.len(),
        "🔍 Listed sources from RDS"
    );
    Ok(filtered)
}

/// Reads a static source list. `.csv` files use the first column; anything else
/// is one identifier per line. Blank lines and `#` comments are skipped.
pub fn read_source_list(path: &Path) -> Result<Vec<String>> {
    let file = fs::File::open(path)
        .with_context(|| format!("Failed to open source list {}", path.display()))?;

    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    let names = if is_csv {
        parse_csv_sources(file)
            .with_context(|| format!("Failed to parse source list {}", path.display()))?
    } else {
        let mut text = String::new();
        let mut file = file;
        file.read_to_string(&mut text)
            .with_context(|| format!("Failed to read source list {}", path.display()))?;
        parse_line_sources(&text)
    };

    info!(path = %path.display(), count = names.len(), "📄 Loaded source list");
    Ok(names)
}

fn parse_csv_sources<R: Read>(reader: R) -> Result<Vec<String>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut names = Vec::new();
    for record in csv_reader.records() {
        let record = record.context("Malformed CSV record")?;
        if let Some(first) = record.get(0).filter(|f| !f.is_empty()) {
            names.push(first.to_string());
        }
    }
    Ok(names)
}

fn parse_line_sources(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Writes the live directory to a newline-delimited file that can later be
/// used as `SOURCE_LIST_FILE`. Returns the number of identifiers written.
pub async fn export_sources<B: SnapshotBackend>(
    backend: &B,
    config: &ExportConfig,
) -> Result<usize> {
    let sources = list_live_sources(backend, config.engine.as_deref()).await?;

    let mut contents = String::new();
    for source in &sources {
        contents.push_str(&source.identifier);
        contents.push('\n');
    }
    fs::write(&config.export_path, contents).with_context(|| {
        format!(
            "Failed to write source list to {}",
            config.export_path.display()
        )
    })?;

    info!(
        path = %config.export_path.display(),
        count = sources.len(),
        "✅ Exported source list"
    );
    Ok(sources.len())
}
