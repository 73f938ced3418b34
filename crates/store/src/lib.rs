pub mod checkpoint;
pub mod fs;
pub mod pages;

use std::path::Path;
use std::sync::Arc;

use quarry_common::error::{QuarryError, QuarryResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::checkpoint::{CheckpointRepository, FileCheckpointRepository, PgCheckpointRepository};

/// Create a Postgres connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> QuarryResult<PgPool> {
    tracing::info!("connecting to database");
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|e| QuarryError::Database(e.to_string()))
}

/// Postgres when `database_url` is set, JSON files under `checkpoint_dir` otherwise.
pub async fn open_checkpoint_repository(
    checkpoint_dir: &Path,
    database_url: Option<&str>,
) -> QuarryResult<Arc<dyn CheckpointRepository>> {
    match database_url {
        Some(url) => {
            let pool = create_pool(url).await?;
            tracing::info!("checkpoints stored in postgres");
            Ok(Arc::new(PgCheckpointRepository::new(pool)))
        }
        None => {
            tracing::info!(dir = %checkpoint_dir.display(), "checkpoints stored on disk");
            Ok(Arc::new(FileCheckpointRepository::new(checkpoint_dir)))
        }
    }
}
