//! RDS Snapshot Share Tool
//!
//! Keeps a re-encrypted copy of each database's latest snapshot shared with a
//! partner account. Runs as a CLI or as a scheduled Lambda function.

// rdssnapshare/src/main.rs
mod config;
mod directory;
mod errors;
mod lambda;
mod rds;
mod workflow;

use anyhow::{Context, Result};
use config::{AppConfig, OperationConfig, load_cycle_config, load_export_config};
use std::env;
use std::io::IsTerminal;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Set by the Lambda execution environment.
const LAMBDA_RUNTIME_ENV: &str = "AWS_LAMBDA_RUNTIME_API";

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    init_logging();

    match run_app().await {
        Ok(_) => {
            info!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = format!("{e:#}"), "❌ Operation failed");
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(std::io::stdout().is_terminal()))
        .init();
}

async fn run_app() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    let choice = if args.len() > 1 {
        args[1].trim().to_string()
    } else if env::var_os(LAMBDA_RUNTIME_ENV).is_some() {
        "lambda".to_string()
    } else {
        prompt_choice()?
    };

    let mut app_config = AppConfig::load_from_env().context("Failed to load configuration")?;

    match choice.as_str() {
        "1" | "cycle" => {
            info!("🚀 Starting copy-and-share cycle...");
            let cycle_config = load_cycle_config(&app_config.raw_env_config)
                .context("Failed to load cycle configuration")?;
            app_config.operation = Some(OperationConfig::Cycle(cycle_config));

            let report = workflow::run_cycle_flow(&app_config)
                .await
                .context("Cycle failed")?;
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to render cycle report")?
            );
            let failed = report.failed();
            if failed > 0 {
                // Per-source failures are reported, not fatal; the next run retries them.
                info!(failed, "Some sources did not complete this cycle");
            }
        }
        "2" | "export-sources" => {
            info!("📄 Exporting source list...");
            let export_config = load_export_config(&app_config.raw_env_config)
                .context("Failed to load export configuration")?;
            app_config.operation = Some(OperationConfig::Export(export_config));

            directory::run_export_flow(&app_config)
                .await
                .context("Export failed")?;
        }
        "3" | "lambda" => {
            info!("⚙️ Starting Lambda runtime...");
            lambda::run_lambda()
                .await
                .map_err(|e| anyhow::anyhow!("{e}"))
                .context("Lambda runtime exited with an error")?;
        }
        _ => {
            println!(
                "❌ Invalid choice. Please enter '1' (cycle), '2' (export-sources), \
                 or '3' (lambda)."
            );
            anyhow::bail!("Invalid operation choice");
        }
    }
    Ok(())
}

/// Prompts user to select an operation
///
/// Returns the user's choice as String
fn prompt_choice() -> Result<String> {
    use std::io::{Write, stdin, stdout};

    println!("Select an operation:");
    println!("1. Copy and share latest snapshots (or type 'cycle')");
    println!("2. Export live source list (or type 'export-sources')");
    println!("3. Run as Lambda handler (or type 'lambda')");
    print!("Enter your choice: ");
    stdout().flush().context("Failed to flush stdout")?;

    let mut input = String::new();
    stdin()
        .read_line(&mut input)
        .context("Failed to read user input")?;
    Ok(input.trim().to_string())
}
