mod job;
mod status;

use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use quarry_config::{init_tracing, AppConfig};
use quarry_ingest::bootstrap::{jira_connector, open_checkpoints};
use quarry_ingest::jira::client::JiraClientConfig;
use quarry_ingest::jira::extract::ExtractConfig;
use tokio_util::sync::CancellationToken;

use crate::job::run_job;
use crate::status::StatusWriter;

/// Run Jira extraction periodically and keep `worker_status.json` current.
#[derive(Debug, Parser)]
#[command(name = "quarry-scheduler", version)]
struct Cli {
    /// Hours between two extraction runs
    #[arg(
        long,
        env = "SCHEDULER_INTERVAL_HOURS",
        default_value_t = 6,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    interval_hours: u64,

    /// Wait one full interval before the first run
    #[arg(long)]
    no_initial_run: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let app = AppConfig::from_env().expect("failed to load config");
    init_tracing(&app.log_level);
    tracing::info!(
        service = "quarry-scheduler",
        interval_hours = cli.interval_hours,
        "starting"
    );

    let checkpoints = open_checkpoints(&app)
        .await
        .expect("failed to open checkpoint store");
    let extract = ExtractConfig::from_env().expect("invalid extraction config");
    let client_config = JiraClientConfig::from_env().expect("invalid jira config");
    let connector = jira_connector(&app, client_config, extract, checkpoints)
        .expect("failed to create jira connector");

    let status = StatusWriter::new(app.data_dir.join("worker_status.json"), Utc::now());
    if let Err(e) = status.lifecycle("worker started").await {
        tracing::error!(error = %e, "failed to write worker status");
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("shutdown signal received");
        on_signal.cancel();
    });

    if !cli.no_initial_run {
        run_job(&connector, &status, &cancel).await;
    }

    let interval = Duration::from_secs(cli.interval_hours.saturating_mul(3600));
    while !cancel.is_cancelled() {
        tracing::info!(interval_hours = cli.interval_hours, "waiting for next run");
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
        run_job(&connector, &status, &cancel).await;
    }

    if let Err(e) = status.lifecycle("worker stopped gracefully").await {
        tracing::error!(error = %e, "failed to write worker status");
    }
    tracing::info!("shutting down");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
