use std::process::ExitCode;

use clap::Parser;
use quarry_common::types::CollectionId;
use quarry_config::{init_tracing, AppConfig};
use quarry_ingest::bootstrap::{jira_connector, open_checkpoints};
use quarry_ingest::connector::Connector;
use quarry_ingest::jira::client::JiraClientConfig;
use quarry_ingest::jira::extract::ExtractConfig;
use quarry_store::checkpoint::CheckpointRepository;
use tokio_util::sync::CancellationToken;

/// Extract Jira issues page by page into raw JSON files, resuming from the
/// last checkpoint of every project.
#[derive(Debug, Parser)]
#[command(name = "quarry-ingest", version)]
struct Cli {
    /// Only extract this project (must be listed in JIRA_PROJECT_KEYS)
    #[arg(long, value_name = "KEY")]
    project: Option<String>,

    /// Reset checkpoints (of --project, or all) before extracting
    #[arg(long)]
    clean: bool,

    /// Only fetch issues updated since the last watermark
    #[arg(long, conflicts_with = "full")]
    incremental: bool,

    /// Fetch every issue regardless of EXTRACT_INCREMENTAL
    #[arg(long)]
    full: bool,

    /// Print all checkpoints as JSON and exit
    #[arg(long)]
    show_checkpoints: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let app = AppConfig::from_env().expect("failed to load config");
    init_tracing(&app.log_level);
    tracing::info!(service = "quarry-ingest", "starting");

    let checkpoints = open_checkpoints(&app)
        .await
        .expect("failed to open checkpoint store");

    if cli.show_checkpoints {
        let all = checkpoints
            .list()
            .await
            .expect("failed to list checkpoints");
        println!(
            "{}",
            serde_json::to_string_pretty(&all).expect("checkpoints serialize")
        );
        return ExitCode::SUCCESS;
    }

    let mut extract = ExtractConfig::from_env().expect("invalid extraction config");
    let project = match cli.project.as_deref().map(CollectionId::parse).transpose() {
        Ok(project) => project,
        Err(e) => {
            tracing::error!(error = %e, "invalid --project");
            return ExitCode::FAILURE;
        }
    };
    if let Some(project) = &project {
        extract = match extract.restricted_to(project) {
            Ok(restricted) => restricted,
            Err(e) => {
                tracing::error!(error = %e, "cannot restrict run");
                return ExitCode::FAILURE;
            }
        };
    }
    if cli.incremental {
        extract.incremental = true;
    }
    if cli.full {
        extract.incremental = false;
    }

    if cli.clean {
        let removed = checkpoints
            .reset(project.as_ref())
            .await
            .expect("failed to reset checkpoints");
        tracing::info!(removed, "checkpoints reset");
    }

    let client_config = JiraClientConfig::from_env().expect("invalid jira config");
    let connector = jira_connector(&app, client_config, extract, checkpoints)
        .expect("failed to create jira connector");

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping after the current step");
            on_interrupt.cancel();
        }
    });

    let summary = connector.sync(&cancel).await;
    if summary.is_success() {
        tracing::info!(records = summary.records, "all collections extracted");
        ExitCode::SUCCESS
    } else {
        tracing::error!(
            failed = summary.failed.len(),
            cancelled = summary.cancelled,
            "extraction finished with failures"
        );
        ExitCode::FAILURE
    }
}
