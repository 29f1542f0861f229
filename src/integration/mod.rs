//! Actions run against files that appear in a watched folder.
//!
//! Every action implements [`Integration`]. Variants are looked up by their
//! type identifier through the [`IntegrationRegistry`], which is also how the
//! store rebuilds them on reload.

mod error;
mod file;
pub mod registry;

use std::fmt;
use std::path::Path;

use indexmap::IndexMap;

pub use error::IntegrationError;
pub use file::FileIntegration;
pub use registry::{IntegrationDescriptor, IntegrationRegistry, ParamSpec};

/// Named string parameters, kept in the order they were declared.
pub type Parameters = IndexMap<String, String>;

/// Capability every watched-folder action satisfies.
pub trait Integration: Send + Sync + fmt::Debug {
    /// Stable type identifier, the registry key of this variant.
    fn kind(&self) -> &'static str;

    /// What this instance does, e.g. `copied to /srv/out`.
    fn action_message(&self) -> &str;

    /// Resolved parameter values, enough to rebuild this exact instance.
    fn parameters(&self) -> Parameters;

    /// Run the action for a newly created file.
    fn execute(&self, file: &Path) -> Result<(), IntegrationError>;
}
