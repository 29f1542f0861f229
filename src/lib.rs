pub mod cli;
pub mod config;
pub mod console;
pub mod integration;
pub mod logging;
pub mod storage;
pub mod types;
pub mod watcher;

pub use config::Settings;
pub use integration::{FileIntegration, Integration, IntegrationError, IntegrationRegistry, Parameters};
pub use storage::{ConfigStore, StorageError};
pub use types::{ConfigId, Configuration};
pub use watcher::{Orchestrator, WatchError, WatchEvent};
