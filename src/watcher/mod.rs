//! Folder watching and integration dispatch.
//!
//! # Architecture
//!
//! ```text
//! Orchestrator
//!   - Configurations (id, folder, integration)
//!   - FolderRegistry: one WatchHandle per folder
//!   - Single dispatcher thread fed by every handle
//!   - EventBroadcaster for observers
//!         |
//!    FolderSource
//!    +------------+------------+
//!    |                         |
//! NotifySource            ManualSource
//! ```

mod error;
pub mod events;
mod folder_registry;
mod orchestrator;
pub mod source;

pub use error::WatchError;
pub use events::{EventBroadcaster, WatchEvent};
pub use folder_registry::FolderRegistry;
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use source::{CreatedCallback, FolderSource, ManualSource, NotifySource, WatchHandle};
