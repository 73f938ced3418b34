use async_trait::async_trait;
use quarry_store::checkpoint::CheckpointRepository;
use quarry_store::pages::PageSink;
use tokio_util::sync::CancellationToken;

use super::extract::{ExtractError, Extractor};
use crate::connector::{Connector, FailedCollection, RunSummary};
use crate::pacing::Sleeper;

const SOURCE_NAME: &str = "jira_issues";

/// Extracts every configured project, one after another, so all of them
/// share a single rate-limit budget.
pub struct JiraProjectsConnector<C, P, S> {
    extractor: Extractor<C, P, S>,
}

impl<C, P, S> JiraProjectsConnector<C, P, S>
where
    C: CheckpointRepository,
    P: PageSink,
    S: Sleeper,
{
    pub fn new(extractor: Extractor<C, P, S>) -> Self {
        Self { extractor }
    }
}

#[async_trait]
impl<C, P, S> Connector for JiraProjectsConnector<C, P, S>
where
    C: CheckpointRepository,
    P: PageSink,
    S: Sleeper,
{
    fn source_name(&self) -> &str {
        SOURCE_NAME
    }

    async fn sync(&self, cancel: &CancellationToken) -> RunSummary {
        let collections = &self.extractor.config().project_keys;
        tracing::info!(count = collections.len(), "starting jira extraction");

        let mut summary = RunSummary::new(SOURCE_NAME);
        for collection in collections {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            match self.extractor.extract(collection, cancel).await {
                Ok(report) => {
                    summary.records += report.records;
                    summary.succeeded.push(collection.clone());
                }
                Err(ExtractError::Cancelled { .. }) => {
                    summary.cancelled = true;
                    break;
                }
                Err(e) => {
                    tracing::error!(collection = %collection, error = %e, "collection failed");
                    summary.failed.push(FailedCollection {
                        collection: collection.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            source = %summary.source,
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            records = summary.records,
            cancelled = summary.cancelled,
            "jira extraction finished"
        );
        summary
    }
}
