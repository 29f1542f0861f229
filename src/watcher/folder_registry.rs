//! Folder to watch-handle map.
//!
//! Holds at most one open handle per folder no matter how many
//! configurations point at it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::source::WatchHandle;

/// Open notification handles keyed by folder.
#[derive(Default)]
pub struct FolderRegistry {
    handles: HashMap<PathBuf, Box<dyn WatchHandle>>,
}

impl FolderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a folder already has an open handle.
    pub fn contains(&self, folder: &Path) -> bool {
        self.handles.contains_key(folder)
    }

    /// Store the handle for its folder.
    ///
    /// Returns false and drops `handle` when the folder is already watched.
    pub fn insert(&mut self, handle: Box<dyn WatchHandle>) -> bool {
        let folder = handle.folder().to_path_buf();
        if self.handles.contains_key(&folder) {
            return false;
        }
        self.handles.insert(folder, handle);
        true
    }

    /// Drop the handle for `folder`, closing its subscription.
    pub fn close(&mut self, folder: &Path) -> bool {
        self.handles.remove(folder).is_some()
    }

    /// Watched folders, sorted.
    pub fn folders(&self) -> Vec<PathBuf> {
        let mut folders: Vec<_> = self.handles.keys().cloned().collect();
        folders.sort();
        folders
    }

    /// Get count of open handles.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
