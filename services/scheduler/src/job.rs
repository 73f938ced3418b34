use std::time::Instant;

use quarry_ingest::connector::{Connector, RunSummary};
use tokio_util::sync::CancellationToken;

use crate::status::StatusWriter;

/// Run the connector once and record the outcome in the status file.
pub async fn run_job(
    connector: &dyn Connector,
    status: &StatusWriter,
    cancel: &CancellationToken,
) -> RunSummary {
    tracing::info!(source = connector.source_name(), "job started");
    let started = Instant::now();
    let summary = connector.sync(cancel).await;
    let message = describe(&summary, started.elapsed().as_secs_f64());

    if summary.is_success() {
        tracing::info!(%message, "job finished");
    } else {
        tracing::error!(%message, "job finished");
    }
    if let Err(e) = status.job_finished(summary.is_success(), &message).await {
        tracing::error!(error = %e, "failed to write worker status");
    }
    summary
}

pub fn describe(summary: &RunSummary, elapsed_secs: f64) -> String {
    if summary.cancelled {
        return format!("job cancelled after {elapsed_secs:.2}s");
    }
    if summary.failed.is_empty() {
        return format!(
            "job completed successfully in {elapsed_secs:.2}s ({} records from {} collections)",
            summary.records,
            summary.succeeded.len()
        );
    }
    let names: Vec<&str> = summary
        .failed
        .iter()
        .map(|f| f.collection.as_str())
        .collect();
    format!(
        "job finished in {elapsed_secs:.2}s with {} failed collections: {}",
        names.len(),
        names.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Health;
    use async_trait::async_trait;
    use quarry_common::types::CollectionId;
    use quarry_ingest::connector::FailedCollection;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // ── Mock connector ──

    struct MockConnector {
        fail: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Connector for MockConnector {
        fn source_name(&self) -> &str {
            "mock"
        }

        async fn sync(&self, _cancel: &CancellationToken) -> RunSummary {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut summary = RunSummary::new("mock");
            summary.succeeded.push(CollectionId::parse("SPARK").unwrap());
            summary.records = 12;
            if self.fail {
                summary.failed.push(FailedCollection {
                    collection: CollectionId::parse("HADOOP").unwrap(),
                    error: "HTTP 500".into(),
                });
            }
            summary
        }
    }

    #[tokio::test]
    async fn successful_job_marks_status_healthy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker_status.json");
        let status = StatusWriter::new(&path, chrono::Utc::now());
        let connector = MockConnector {
            fail: false,
            calls: AtomicUsize::new(0),
        };

        let summary = run_job(&connector, &status, &CancellationToken::new()).await;

        assert!(summary.is_success());
        assert_eq!(connector.calls.load(Ordering::SeqCst), 1);
        let doc: crate::status::WorkerStatus =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(doc.status, Health::Healthy);
        assert!(doc.last_successful_run.is_some());
        assert!(doc.message.contains("12 records"), "got: {}", doc.message);
    }

    #[tokio::test]
    async fn failed_collection_marks_status_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker_status.json");
        let status = StatusWriter::new(&path, chrono::Utc::now());
        let connector = MockConnector {
            fail: true,
            calls: AtomicUsize::new(0),
        };

        run_job(&connector, &status, &CancellationToken::new()).await;

        let doc: crate::status::WorkerStatus =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(doc.status, Health::Error);
        assert!(doc.message.contains("HADOOP"), "got: {}", doc.message);
        assert!(doc.last_successful_run.is_none());
    }

    #[test]
    fn describe_cancelled_run() {
        let mut summary = RunSummary::new("jira_issues");
        summary.cancelled = true;
        assert!(describe(&summary, 1.5).starts_with("job cancelled after 1.50s"));
    }
}
