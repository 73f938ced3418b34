use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use quarry_common::error::{QuarryError, QuarryResult};
use quarry_common::types::CollectionId;

use crate::checkpoint::models::{Checkpoint, CollectionCheckpoint};
use crate::checkpoint::repositories::CheckpointRepository;
use crate::fs::{atomic_write, list_file_names, read_optional, remove_if_exists};

const DOCUMENT_EXT: &str = "json";
const LEGACY_EXT: &str = "txt";

/// Checkpoints as one JSON document per collection under a directory.
///
/// `<COLLECTION>.txt` files left by older extractors (a bare offset) are read
/// as a fallback when the JSON document is absent or unreadable, and are
/// never written.
pub struct FileCheckpointRepository {
    dir: PathBuf,
    write_locks: Mutex<HashMap<CollectionId, Arc<tokio::sync::Mutex<()>>>>,
}

impl FileCheckpointRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    fn document_path(&self, collection: &CollectionId) -> PathBuf {
        self.dir.join(format!("{collection}.{DOCUMENT_EXT}"))
    }

    fn legacy_path(&self, collection: &CollectionId) -> PathBuf {
        self.dir.join(format!("{collection}.{LEGACY_EXT}"))
    }

    fn write_lock(&self, collection: &CollectionId) -> QuarryResult<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .write_locks
            .lock()
            .map_err(|_| QuarryError::Internal("checkpoint lock table poisoned".to_string()))?;
        Ok(locks.entry(collection.clone()).or_default().clone())
    }

    /// Read one candidate file. Unreadable or undecodable content is logged
    /// and reported as `Err(())` so the caller can fall through.
    async fn read_candidate(
        &self,
        collection: &CollectionId,
        path: &Path,
        decode: fn(&CollectionId, &[u8]) -> QuarryResult<Checkpoint>,
    ) -> Result<Option<Checkpoint>, ()> {
        let bytes = match read_optional(path).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::warn!(collection = %collection, error = %e, "checkpoint unreadable");
                return Err(());
            }
        };
        match decode(collection, &bytes) {
            Ok(cp) => Ok(Some(cp)),
            Err(e) => {
                tracing::warn!(
                    collection = %collection,
                    path = %path.display(),
                    error = %e,
                    "ignoring corrupt checkpoint"
                );
                Err(())
            }
        }
    }
}

#[async_trait]
impl CheckpointRepository for FileCheckpointRepository {
    async fn find(&self, collection: &CollectionId) -> QuarryResult<Option<Checkpoint>> {
        let document = self
            .read_candidate(
                collection,
                &self.document_path(collection),
                Checkpoint::decode,
            )
            .await;
        let document_absent = match document {
            Ok(Some(cp)) => return Ok(Some(cp)),
            Ok(None) => true,
            Err(()) => false,
        };

        let legacy = self
            .read_candidate(
                collection,
                &self.legacy_path(collection),
                Checkpoint::decode_legacy,
            )
            .await;
        match legacy {
            Ok(Some(cp)) => {
                tracing::info!(
                    collection = %collection,
                    cursor = cp.cursor,
                    "using legacy plain-offset checkpoint"
                );
                Ok(Some(cp))
            }
            Ok(None) if document_absent => Ok(None),
            // Something was persisted but nothing decodes: restart from zero.
            _ => Ok(Some(Checkpoint::default())),
        }
    }

    async fn save(
        &self,
        collection: &CollectionId,
        cursor: u64,
        watermark: Option<&str>,
    ) -> QuarryResult<Checkpoint> {
        let lock = self.write_lock(collection)?;
        let _guard = lock.lock().await;

        let current = self.load(collection).await?;
        let next = current.merged(cursor, watermark);
        let body = serde_json::to_vec_pretty(&next)?;
        atomic_write(&self.document_path(collection), &body).await?;

        tracing::debug!(
            collection = %collection,
            cursor = next.cursor,
            watermark = ?next.watermark,
            "checkpoint saved"
        );
        Ok(next)
    }

    async fn list(&self) -> QuarryResult<Vec<CollectionCheckpoint>> {
        let mut collections = BTreeSet::new();
        for name in list_file_names(&self.dir).await? {
            let stem = name
                .strip_suffix(&format!(".{DOCUMENT_EXT}"))
                .or_else(|| name.strip_suffix(&format!(".{LEGACY_EXT}")));
            let Some(stem) = stem else { continue };
            match CollectionId::parse(stem) {
                Ok(id) if id.as_str() == stem => {
                    collections.insert(id);
                }
                Ok(_) => tracing::debug!(file = %name, "skipping non-canonical file name"),
                Err(e) => tracing::debug!(file = %name, error = %e, "skipping foreign file"),
            }
        }

        let mut out = Vec::with_capacity(collections.len());
        for collection in collections {
            if let Some(checkpoint) = self.find(&collection).await? {
                out.push(CollectionCheckpoint {
                    collection,
                    checkpoint,
                });
            }
        }
        Ok(out)
    }

    async fn reset(&self, collection: Option<&CollectionId>) -> QuarryResult<usize> {
        let targets = match collection {
            Some(c) => vec![c.clone()],
            None => self
                .list()
                .await?
                .into_iter()
                .map(|e| e.collection)
                .collect(),
        };

        let mut reset = 0;
        for target in &targets {
            let lock = self.write_lock(target)?;
            let _guard = lock.lock().await;

            let removed_doc = remove_if_exists(&self.document_path(target)).await?;
            let removed_legacy = remove_if_exists(&self.legacy_path(target)).await?;
            if removed_doc || removed_legacy {
                tracing::info!(collection = %target, "checkpoint reset");
                reset += 1;
            }
        }
        Ok(reset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn id(key: &str) -> CollectionId {
        CollectionId::parse(key).unwrap()
    }

    #[tokio::test]
    async fn load_missing_returns_zero_value() {
        let dir = tempdir().unwrap();
        let repo = FileCheckpointRepository::new(dir.path());

        assert!(repo.find(&id("HADOOP")).await.unwrap().is_none());
        let cp = repo.load(&id("HADOOP")).await.unwrap();
        assert_eq!(cp, Checkpoint::default());
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempdir().unwrap();
        let repo = FileCheckpointRepository::new(dir.path());

        let written = repo
            .save(&id("HADOOP"), 50, Some("2025-01-15T12:34:56.789Z"))
            .await
            .unwrap();
        assert_eq!(written.cursor, 50);

        let cp = repo.load(&id("HADOOP")).await.unwrap();
        assert_eq!(
            cp,
            Checkpoint::new(50, Some("2025-01-15T12:34:56.789Z".into()))
        );
        assert!(dir.path().join("HADOOP.json").exists());
        assert!(!dir.path().join("HADOOP.txt").exists());
    }

    #[tokio::test]
    async fn save_without_watermark_preserves_previous() {
        let dir = tempdir().unwrap();
        let repo = FileCheckpointRepository::new(dir.path());

        repo.save(&id("HADOOP"), 50, Some("2025-01-15T12:34:56.789Z"))
            .await
            .unwrap();
        repo.save(&id("HADOOP"), 80, None).await.unwrap();

        let cp = repo.load(&id("HADOOP")).await.unwrap();
        assert_eq!(cp.cursor, 80);
        assert_eq!(cp.watermark.as_deref(), Some("2025-01-15T12:34:56.789Z"));
    }

    #[tokio::test]
    async fn corrupt_document_falls_back_to_zero_value() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("HADOOP.json"), "{\"cursor\": 5").unwrap();
        let repo = FileCheckpointRepository::new(dir.path());

        let cp = repo.load(&id("HADOOP")).await.unwrap();
        assert_eq!(cp, Checkpoint::default());
    }

    #[tokio::test]
    async fn corrupt_document_is_replaced_on_next_save() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("HADOOP.json"), "garbage").unwrap();
        let repo = FileCheckpointRepository::new(dir.path());

        repo.save(&id("HADOOP"), 10, None).await.unwrap();
        let cp = repo.load(&id("HADOOP")).await.unwrap();
        assert_eq!(cp, Checkpoint::new(10, None));
    }

    #[tokio::test]
    async fn legacy_offset_file_used_when_document_absent() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("SPARK.txt"), "150").unwrap();
        let repo = FileCheckpointRepository::new(dir.path());

        let cp = repo.load(&id("SPARK")).await.unwrap();
        assert_eq!(cp, Checkpoint::new(150, None));
    }

    #[tokio::test]
    async fn legacy_offset_file_used_when_document_corrupt() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("SPARK.json"), "not json").unwrap();
        std::fs::write(dir.path().join("SPARK.txt"), "75").unwrap();
        let repo = FileCheckpointRepository::new(dir.path());

        let cp = repo.load(&id("SPARK")).await.unwrap();
        assert_eq!(cp.cursor, 75);
    }

    #[tokio::test]
    async fn document_wins_over_legacy_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("SPARK.txt"), "75").unwrap();
        let repo = FileCheckpointRepository::new(dir.path());
        repo.save(&id("SPARK"), 200, Some("2025-02-01T00:00:00.000+0000"))
            .await
            .unwrap();

        let cp = repo.load(&id("SPARK")).await.unwrap();
        assert_eq!(cp.cursor, 200);
    }

    #[tokio::test]
    async fn reads_documents_written_by_older_extractor() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("KAFKA.json"),
            r#"{"start_at": 50, "last_updated": "2025-01-15T12:34:56.789Z"}"#,
        )
        .unwrap();
        let repo = FileCheckpointRepository::new(dir.path());

        let cp = repo.load(&id("KAFKA")).await.unwrap();
        assert_eq!(
            cp,
            Checkpoint::new(50, Some("2025-01-15T12:34:56.789Z".into()))
        );
    }

    #[tokio::test]
    async fn list_returns_sorted_collections() {
        let dir = tempdir().unwrap();
        let repo = FileCheckpointRepository::new(dir.path());
        repo.save(&id("SPARK"), 10, None).await.unwrap();
        repo.save(&id("HADOOP"), 20, Some("2025-01-01"))
            .await
            .unwrap();
        std::fs::write(dir.path().join("KAFKA.txt"), "5").unwrap();
        std::fs::write(dir.path().join("notes.md"), "ignored").unwrap();

        let all = repo.list().await.unwrap();
        let keys: Vec<&str> = all.iter().map(|e| e.collection.as_str()).collect();
        assert_eq!(keys, vec!["HADOOP", "KAFKA", "SPARK"]);
        assert_eq!(all[0].checkpoint.watermark.as_deref(), Some("2025-01-01"));
        assert_eq!(all[1].checkpoint.cursor, 5);
    }

    #[tokio::test]
    async fn reset_single_collection_removes_both_formats() {
        let dir = tempdir().unwrap();
        let repo = FileCheckpointRepository::new(dir.path());
        repo.save(&id("HADOOP"), 10, None).await.unwrap();
        std::fs::write(dir.path().join("HADOOP.txt"), "10").unwrap();
        repo.save(&id("SPARK"), 10, None).await.unwrap();

        let n = repo.reset(Some(&id("HADOOP"))).await.unwrap();
        assert_eq!(n, 1);
        assert!(repo.find(&id("HADOOP")).await.unwrap().is_none());
        assert!(repo.find(&id("SPARK")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn reset_all_collections() {
        let dir = tempdir().unwrap();
        let repo = FileCheckpointRepository::new(dir.path());
        repo.save(&id("HADOOP"), 10, None).await.unwrap();
        repo.save(&id("SPARK"), 10, None).await.unwrap();

        assert_eq!(repo.reset(None).await.unwrap(), 2);
        assert!(repo.list().await.unwrap().is_empty());
        assert_eq!(repo.reset(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn concurrent_saves_to_one_collection_are_serialised() {
        let dir = tempdir().unwrap();
        let repo = Arc::new(FileCheckpointRepository::new(dir.path()));
        repo.save(&id("HADOOP"), 0, Some("2025-01-01"))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for cursor in 1..=20u64 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.save(&id("HADOOP"), cursor, None).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let cp = repo.load(&id("HADOOP")).await.unwrap();
        assert!((1..=20).contains(&cp.cursor));
        assert_eq!(cp.watermark.as_deref(), Some("2025-01-01"));
    }
}
