use std::sync::Arc;

use async_trait::async_trait;
use quarry_common::error::QuarryResult;
use quarry_common::types::CollectionId;
use serde_json::Value;

/// Durable store for raw fetched pages, keyed by collection and the offset
/// the page was requested at. Storing the same key again replaces the page.
#[async_trait]
pub trait PageSink: Send + Sync {
    async fn store(
        &self,
        collection: &CollectionId,
        offset: u64,
        records: &[Value],
    ) -> QuarryResult<()>;

    async fn load(&self, collection: &CollectionId, offset: u64)
        -> QuarryResult<Option<Vec<Value>>>;

    /// Offsets of every stored page of `collection`, ascending.
    async fn offsets(&self, collection: &CollectionId) -> QuarryResult<Vec<u64>>;
}

#[async_trait]
impl<T> PageSink for Arc<T>
where
    T: PageSink + ?Sized,
{
    async fn store(
        &self,
        collection: &CollectionId,
        offset: u64,
        records: &[Value],
    ) -> QuarryResult<()> {
        (**self).store(collection, offset, records).await
    }

    async fn load(
        &self,
        collection: &CollectionId,
        offset: u64,
    ) -> QuarryResult<Option<Vec<Value>>> {
        (**self).load(collection, offset).await
    }

    async fn offsets(&self, collection: &CollectionId) -> QuarryResult<Vec<u64>> {
        (**self).offsets(collection).await
    }
}
