// rdssnapshare/src/workflow/mod.rs
pub(crate) mod copier;
pub(crate) mod locator;
pub(crate) mod logic;
pub(crate) mod sharing;
pub(crate) mod status;

use anyhow::Result;

use crate::config::{AppConfig, OperationConfig};
use crate::rds::{self, ClusterSnapshots, InstanceSnapshots, SourceKind};

pub use logic::CycleReport;

/// Public entry point for one copy-and-share cycle against live RDS.
pub async fn run_cycle_flow(app_config: &AppConfig) -> Result<CycleReport> {
    let cycle_config = match &app_config.operation {
        Some(OperationConfig::Cycle(cfg)) => cfg,
        _ => anyhow::bail!("Cycle operation selected but no cycle configuration found."),
    };

    let client = rds::client_from_env().await;
    match cycle_config.source_kind {
        SourceKind::Instance => {
            logic::run_cycle(&InstanceSnapshots::new(client), cycle_config).await
        }
        SourceKind::Cluster => logic::run_cycle(&ClusterSnapshots::new(client), cycle_config).await,
    }
}
