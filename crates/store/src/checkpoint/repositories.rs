use std::sync::Arc;

use async_trait::async_trait;
use quarry_common::error::QuarryResult;
use quarry_common::types::CollectionId;

use crate::checkpoint::models::{Checkpoint, CollectionCheckpoint};

#[async_trait]
pub trait CheckpointRepository: Send + Sync {
    /// The persisted checkpoint, or `None` if the collection was never saved.
    async fn find(&self, collection: &CollectionId) -> QuarryResult<Option<Checkpoint>>;

    /// The persisted checkpoint, or the zero-value when none exists.
    async fn load(&self, collection: &CollectionId) -> QuarryResult<Checkpoint> {
        Ok(self.find(collection).await?.unwrap_or_default())
    }

    /// Persist a new cursor. `None` for `watermark` keeps the stored one.
    /// Returns the document as written.
    async fn save(
        &self,
        collection: &CollectionId,
        cursor: u64,
        watermark: Option<&str>,
    ) -> QuarryResult<Checkpoint>;

    /// Every persisted checkpoint, ordered by collection.
    async fn list(&self) -> QuarryResult<Vec<CollectionCheckpoint>>;

    /// Delete the checkpoint of one collection, or of all when `None`.
    /// Returns how many collections were reset.
    async fn reset(&self, collection: Option<&CollectionId>) -> QuarryResult<usize>;
}

#[async_trait]
impl<T> CheckpointRepository for Arc<T>
where
    T: CheckpointRepository + ?Sized,
{
    async fn find(&self, collection: &CollectionId) -> QuarryResult<Option<Checkpoint>> {
        (**self).find(collection).await
    }

    async fn load(&self, collection: &CollectionId) -> QuarryResult<Checkpoint> {
        (**self).load(collection).await
    }

    async fn save(
        &self,
        collection: &CollectionId,
        cursor: u64,
        watermark: Option<&str>,
    ) -> QuarryResult<Checkpoint> {
        (**self).save(collection, cursor, watermark).await
    }

    async fn list(&self) -> QuarryResult<Vec<CollectionCheckpoint>> {
        (**self).list().await
    }

    async fn reset(&self, collection: Option<&CollectionId>) -> QuarryResult<usize> {
        (**self).reset(collection).await
    }
}
