use async_trait::async_trait;
use quarry_common::error::{QuarryError, QuarryResult};
use quarry_common::types::CollectionId;
use sqlx::{PgPool, Row};
use tokio::sync::OnceCell;

use crate::checkpoint::models::{Checkpoint, CollectionCheckpoint};
use crate::checkpoint::repositories::CheckpointRepository;

const CREATE_TABLE: &str = "create table if not exists extract_checkpoints (
       collection text primary key,
       cursor bigint not null default 0,
       watermark text,
       updated_at timestamptz not null default now()
     )";

/// Checkpoints as one row per collection. The table is created on first use.
pub struct PgCheckpointRepository {
    pool: PgPool,
    schema_ready: OnceCell<()>,
}

impl PgCheckpointRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: OnceCell::new(),
        }
    }

    async fn ensure_schema(&self) -> QuarryResult<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(CREATE_TABLE)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| QuarryError::Database(e.to_string()))?;
                Ok::<(), QuarryError>(())
            })
            .await?;
        Ok(())
    }

    fn map_row(collection: &CollectionId, row: &sqlx::postgres::PgRow) -> Checkpoint {
        let cursor: i64 = row.get("cursor");
        let watermark: Option<String> = row.get("watermark");
        match u64::try_from(cursor) {
            Ok(cursor) => Checkpoint { cursor, watermark },
            Err(_) => {
                let err = QuarryError::CheckpointCorrupt {
                    collection: collection.to_string(),
                    reason: format!("negative cursor {cursor}"),
                };
                tracing::warn!(error = %err, "ignoring corrupt checkpoint");
                Checkpoint::default()
            }
        }
    }
}

fn cursor_param(cursor: u64) -> QuarryResult<i64> {
    i64::try_from(cursor)
        .map_err(|_| QuarryError::Validation(format!("cursor {cursor} does not fit in bigint")))
}

#[async_trait]
impl CheckpointRepository for PgCheckpointRepository {
    async fn find(&self, collection: &CollectionId) -> QuarryResult<Option<Checkpoint>> {
        self.ensure_schema().await?;
        let row = sqlx::query(
            "select cursor, watermark from extract_checkpoints where collection = $1",
        )
        .bind(collection.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| QuarryError::Database(e.to_string()))?;

        Ok(row.map(|r| Self::map_row(collection, &r)))
    }

    async fn save(
        &self,
        collection: &CollectionId,
        cursor: u64,
        watermark: Option<&str>,
    ) -> QuarryResult<Checkpoint> {
        self.ensure_schema().await?;
        let row = sqlx::query(
            "insert into extract_checkpoints (collection, cursor, watermark, updated_at)
             values ($1, $2, $3, now())
             on conflict (collection) do update set
               cursor = excluded.cursor,
               watermark = coalesce(excluded.watermark, extract_checkpoints.watermark),
               updated_at = now()
             returning cursor, watermark",
        )
        .bind(collection.as_str())
        .bind(cursor_param(cursor)?)
        .bind(watermark)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| QuarryError::Database(e.to_string()))?;

        let saved = Self::map_row(collection, &row);
        tracing::debug!(
            collection = %collection,
            cursor = saved.cursor,
            watermark = ?saved.watermark,
            "checkpoint saved"
        );
        Ok(saved)
    }

    async fn list(&self) -> QuarryResult<Vec<CollectionCheckpoint>> {
        self.ensure_schema().await?;
        let rows = sqlx::query(
            "select collection, cursor, watermark from extract_checkpoints order by collection",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| QuarryError::Database(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let raw: String = row.get("collection");
            let collection = match CollectionId::parse(&raw) {
                Ok(c) => c,
                Err(e) => {
                    tracing::debug!(collection = %raw, error = %e, "skipping foreign row");
                    continue;
                }
            };
            let checkpoint = Self::map_row(&collection, &row);
            out.push(CollectionCheckpoint {
                collection,
                checkpoint,
            });
        }
        Ok(out)
    }

    async fn reset(&self, collection: Option<&CollectionId>) -> QuarryResult<usize> {
        self.ensure_schema().await?;
        let result = match collection {
            Some(c) => {
                sqlx::query("delete from extract_checkpoints where collection = $1")
                    .bind(c.as_str())
                    .execute(&self.pool)
                    .await
            }
            None => {
                sqlx::query("delete from extract_checkpoints")
                    .execute(&self.pool)
                    .await
            }
        }
        .map_err(|e| QuarryError::Database(e.to_string()))?;

        Ok(result.rows_affected() as usize)
    }
}
