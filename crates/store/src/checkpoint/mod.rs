pub mod fs_repository;
pub mod models;
pub mod pg_repository;
pub mod repositories;

pub use fs_repository::FileCheckpointRepository;
pub use models::{Checkpoint, CollectionCheckpoint};
pub use pg_repository::PgCheckpointRepository;
pub use repositories::CheckpointRepository;
