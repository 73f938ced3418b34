use std::path::PathBuf;

use async_trait::async_trait;
use quarry_common::error::QuarryResult;
use quarry_common::types::CollectionId;
use serde_json::Value;

use crate::fs::{atomic_write, list_file_names, read_optional};
use crate::pages::repositories::PageSink;

/// Raw pages as `<dir>/<COLLECTION>_<offset>.json`, one JSON array per page.
#[derive(Debug)]
pub struct FilePageSink {
    dir: PathBuf,
}

impl FilePageSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn page_path(&self, collection: &CollectionId, offset: u64) -> PathBuf {
        self.dir.join(format!("{collection}_{offset}.json"))
    }
}

#[async_trait]
impl PageSink for FilePageSink {
    async fn store(
        &self,
        collection: &CollectionId,
        offset: u64,
        records: &[Value],
    ) -> QuarryResult<()> {
        let path = self.page_path(collection, offset);
        let body = serde_json::to_vec_pretty(records)?;
        atomic_write(&path, &body).await?;
        tracing::debug!(
            collection = %collection,
            offset,
            records = records.len(),
            path = %path.display(),
            "page stored"
        );
        Ok(())
    }

    async fn load(
        &self,
        collection: &CollectionId,
        offset: u64,
    ) -> QuarryResult<Option<Vec<Value>>> {
        let path = self.page_path(collection, offset);
        match read_optional(&path).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn offsets(&self, collection: &CollectionId) -> QuarryResult<Vec<u64>> {
        let prefix = format!("{collection}_");
        let mut offsets = Vec::new();
        for name in list_file_names(&self.dir).await? {
            let Some(rest) = name.strip_prefix(&prefix) else {
                continue;
            };
            let Some(number) = rest.strip_suffix(".json") else {
                continue;
            };
            // `HADOOP_` also prefixes `HADOOP_X_0.json`; only pure offsets count.
            if let Ok(offset) = number.parse::<u64>() {
                offsets.push(offset);
            }
        }
        offsets.sort_unstable();
        Ok(offsets)
    }
}
