use async_trait::async_trait;
use quarry_common::types::CollectionId;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Serialize)]
pub struct FailedCollection {
    pub collection: CollectionId,
    pub error: String,
}

/// Outcome of one run over every configured collection.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub source: String,
    pub succeeded: Vec<CollectionId>,
    pub failed: Vec<FailedCollection>,
    pub records: u64,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            succeeded: Vec::new(),
            failed: Vec::new(),
            records: 0,
            cancelled: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }
}

#[async_trait]
pub trait Connector: Send + Sync {
    fn source_name(&self) -> &str;

    /// Failures are reported per collection in the summary; one failing
    /// collection never prevents the others from running.
    async fn sync(&self, cancel: &CancellationToken) -> RunSummary;
}
