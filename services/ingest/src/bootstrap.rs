//! Production wiring shared by the ingest CLI and the scheduler.

use std::sync::Arc;

use quarry_common::error::{QuarryError, QuarryResult};
use quarry_config::AppConfig;
use quarry_store::checkpoint::CheckpointRepository;
use quarry_store::open_checkpoint_repository;
use quarry_store::pages::FilePageSink;

use crate::jira::client::{JiraClient, JiraClientConfig};
use crate::jira::extract::{ExtractConfig, Extractor};
use crate::jira::sync::JiraProjectsConnector;
use crate::pacing::TokioSleeper;

pub type JiraConnector =
    JiraProjectsConnector<Arc<dyn CheckpointRepository>, FilePageSink, TokioSleeper>;

pub async fn open_checkpoints(app: &AppConfig) -> QuarryResult<Arc<dyn CheckpointRepository>> {
    open_checkpoint_repository(&app.checkpoint_dir(), app.database_url.as_deref()).await
}

pub fn jira_connector(
    app: &AppConfig,
    client_config: JiraClientConfig,
    extract: ExtractConfig,
    checkpoints: Arc<dyn CheckpointRepository>,
) -> QuarryResult<JiraConnector> {
    let client = JiraClient::new(client_config)
        .map_err(|e| QuarryError::Config(format!("failed to build http client: {e}")))?;

    let projects: Vec<&str> = extract.project_keys.iter().map(|k| k.as_str()).collect();
    tracing::info!(
        projects = %projects.join(","),
        page_size = extract.page_size,
        incremental = extract.incremental,
        raw_dir = %app.raw_page_dir().display(),
        "jira connector configured"
    );

    let pages = FilePageSink::new(app.raw_page_dir());
    let extractor = Extractor::new(client, extract, checkpoints, pages);
    Ok(JiraProjectsConnector::new(extractor))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::Connector;
    use crate::jira::retry::RetryPolicy;
    use quarry_common::types::CollectionId;
    use std::time::Duration;

    fn app(dir: &std::path::Path) -> AppConfig {
        AppConfig {
            data_dir: dir.to_path_buf(),
            database_url: None,
            host: "127.0.0.1".into(),
            port: 0,
            log_level: "info".into(),
        }
    }

    #[tokio::test]
    async fn wires_file_backends_under_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(dir.path());
        let checkpoints = open_checkpoints(&app).await.unwrap();
        let hadoop = CollectionId::parse("HADOOP").unwrap();
        checkpoints.save(&hadoop, 5, None).await.unwrap();
        assert!(dir.path().join("checkpoints/HADOOP.json").exists());

        let extract = ExtractConfig {
            project_keys: vec![hadoop],
            page_size: 50,
            polite_delay: Duration::from_secs(2),
            incremental: false,
            lookback_days: 7,
            retry: RetryPolicy::default(),
        };
        let connector =
            jira_connector(&app, JiraClientConfig::default(), extract, checkpoints).unwrap();
        assert_eq!(connector.source_name(), "jira_issues");
    }
}
