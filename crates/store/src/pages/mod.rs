pub mod fs_repository;
pub mod repositories;

pub use fs_repository::FilePageSink;
pub use repositories::PageSink;
