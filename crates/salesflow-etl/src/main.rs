//! Salesflow - daily sales ETL run

use anyhow::Result;
use clap::Parser;
use salesflow_common::logging::{init_logging, LogConfig};
use salesflow_etl::config::{EtlConfig, DEFAULT_ALERT_GRACE_SECS};
use salesflow_etl::context::RunContext;
use salesflow_etl::notify::{
    deliver_within, notifier_from_config, Alert, AlertStatus, LogNotifier,
};
use salesflow_etl::pipeline::Pipeline;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const DEFAULT_GRACE: Duration = Duration::from_secs(DEFAULT_ALERT_GRACE_SECS);

#[derive(Parser, Debug)]
#[command(name = "salesflow")]
#[command(author, version, about = "Extract, normalize, merge and report daily sales data")]
struct Cli {}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let _cli = Cli::parse();

    dotenvy::dotenv().ok();

    let log_config = LogConfig::from_env()?;
    // Held until exit so buffered log lines are flushed
    let _guard = init_logging(&log_config)?;

    let config = match EtlConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!(kind = e.kind(), error = %e, "Invalid configuration");
            // The configured webhook is unknown, so the alert can only be logged
            let alert = Alert::config_failure(chrono::Local::now().date_naive(), &e);
            deliver_within(Arc::new(LogNotifier), alert, DEFAULT_GRACE).await;
            return Ok(ExitCode::FAILURE);
        },
    };

    let grace = Duration::from_secs(config.alert.grace_secs);
    let notifier = notifier_from_config(&config.alert);
    let ctx = RunContext::today(config).with_logging(log_config);

    let mut pipeline = Pipeline::new(ctx.clone());
    let (alert, code) = match pipeline.run().await {
        Ok(summary) => (
            Alert::new(&ctx, AlertStatus::Success, summary.describe()),
            ExitCode::SUCCESS,
        ),
        Err(failure) => {
            error!(
                run_id = %ctx.run_id,
                state = %failure.state,
                kind = failure.error.kind(),
                error = %failure.error,
                "Run aborted"
            );
            (
                Alert::new(&ctx, AlertStatus::Failure, failure.to_string()),
                ExitCode::FAILURE,
            )
        },
    };

    deliver_within(notifier, alert, grace).await;

    info!(run_id = %ctx.run_id, "Exiting");
    Ok(code)
}
