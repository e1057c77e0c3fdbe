// rdssnapshare/src/lambda.rs
//! Lambda entry point. Each invocation, typically from an EventBridge schedule,
//! runs one cycle and returns its report.

use lambda_runtime::{Error, LambdaEvent, service_fn};
use serde_json::Value;
use tracing::info;

use crate::config::{AppConfig, OperationConfig, RawEnvConfig, load_cycle_config};
use crate::workflow::{self, CycleReport};

pub async fn run_lambda() -> Result<(), Error> {
    lambda_runtime::run(service_fn(handle_scheduled_event)).await
}

async fn handle_scheduled_event(event: LambdaEvent<Value>) -> Result<CycleReport, Error> {
    info!(
        request_id = %event.context.request_id,
        trigger = trigger_name(&event.payload),
        "⏰ Invocation received"
    );

    // Re-read on every invocation so configuration changes apply to warm containers.
    let raw_env_config = RawEnvConfig::from_env().map_err(|e| Error::from(format!("{e:#}")))?;
    let cycle_config =
        load_cycle_config(&raw_env_config).map_err(|e| Error::from(format!("{e:#}")))?;
    let app_config = AppConfig {
        operation: Some(OperationConfig::Cycle(cycle_config)),
        raw_env_config,
    };

    let report = workflow::run_cycle_flow(&app_config)
        .await
        .map_err(|e| Error::from(format!("cycle failed: {e:#}")))?;
    info!(
        sources = report.sources.len(),
        failed = report.failed(),
        "Invocation finished"
    );
    Ok(report)
}

/// The payload is otherwise ignored; the scheduled rule's detail-type is only logged.
fn trigger_name(payload: &Value) -> &str {
    payload
        .get("detail-type")
        .and_then(Value::as_str)
        .unwrap_or("manual")
}
