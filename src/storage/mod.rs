pub mod error;
pub mod persistence;

pub use error::{StorageError, StorageResult};
pub use persistence::{ConfigRecord, ConfigStore, IntegrationRecord};
