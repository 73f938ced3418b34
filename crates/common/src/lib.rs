pub mod error;
pub mod types;

pub use error::{QuarryError, QuarryResult};
pub use types::{CollectionId, ServiceInfo};
