use std::collections::HashSet;
use std::fmt;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::integration::Integration;

/// Identifier of a watch configuration. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigId(NonZeroU32);

impl ConfigId {
    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    pub fn value(&self) -> u32 {
        self.0.get()
    }

    /// Smallest positive id not present in `used`.
    ///
    /// Ids freed by removals are handed out again before the range grows.
    pub fn first_free(used: impl IntoIterator<Item = ConfigId>) -> Self {
        let taken: HashSet<u32> = used.into_iter().map(|id| id.value()).collect();
        let mut candidate = NonZeroU32::MIN;
        while taken.contains(&candidate.get()) {
            candidate = candidate.saturating_add(1);
        }
        Self(candidate)
    }
}

impl fmt::Display for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A rule binding one folder to one integration.
///
/// Only the orchestrator and the store create these; once built they never change.
#[derive(Debug, Clone)]
pub struct Configuration {
    id: ConfigId,
    folder: PathBuf,
    integration: Arc<dyn Integration>,
}

impl Configuration {
    pub(crate) fn new(id: ConfigId, folder: PathBuf, integration: Arc<dyn Integration>) -> Self {
        Self {
            id,
            folder,
            integration,
        }
    }

    pub fn id(&self) -> ConfigId {
        self.id
    }

    /// Absolute path of the watched folder.
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn integration(&self) -> &Arc<dyn Integration> {
        &self.integration
    }

    /// Type identifier of the bound integration.
    pub fn kind(&self) -> &'static str {
        self.integration.kind()
    }
}
