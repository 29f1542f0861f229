//! Folder notification sources.
//!
//! A [`FolderSource`] opens one [`WatchHandle`] per folder and calls back with
//! the path of every file created directly inside it. Dropping the handle
//! closes the subscription.
//!
//! Production uses [`NotifySource`] (platform notifications via `notify`),
//! which reports a file once its writer is done with it where the platform
//! allows.
//! [`ManualSource`] is an in-process source whose events are emitted by the
//! caller, for tests and for embedders that already have their own event feed.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::{AccessKind, AccessMode, CreateKind};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use parking_lot::Mutex;

use super::WatchError;

/// Called with the full path of each created file.
pub type CreatedCallback = Arc<dyn Fn(PathBuf) + Send + Sync>;

/// Live subscription on one folder. Closed on drop.
pub trait WatchHandle: Send {
    fn folder(&self) -> &Path;
}

/// Opens creation-event subscriptions on folders.
pub trait FolderSource: Send + Sync {
    /// Source name for logging.
    fn name(&self) -> &str;

    /// Start delivering creation events for files directly inside `folder`.
    fn watch(
        &self,
        folder: &Path,
        on_created: CreatedCallback,
    ) -> Result<Box<dyn WatchHandle>, WatchError>;
}

/// Platform notifications through `notify::RecommendedWatcher`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifySource;

struct NotifyHandle {
    folder: PathBuf,
    _watcher: notify::RecommendedWatcher,
}

impl WatchHandle for NotifyHandle {
    fn folder(&self) -> &Path {
        &self.folder
    }
}

/// Turns raw notify events into "file is ready" paths.
///
/// Where the platform reports write-close (inotify), a created file is held
/// back until its writer closes it, so integrations never see a half-written
/// file. A file that already has other links was complete when it appeared
/// and is released at once. Elsewhere the create event itself is the signal.
#[derive(Debug, Default)]
struct CreateTracker {
    pending: Mutex<HashSet<PathBuf>>,
}

#[cfg(any(target_os = "linux", target_os = "android"))]
const REPORTS_WRITE_CLOSE: bool = true;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const REPORTS_WRITE_CLOSE: bool = false;

impl CreateTracker {
    fn ready(&self, event: Event) -> Vec<PathBuf> {
        match event.kind {
            EventKind::Create(CreateKind::Folder) => event.paths,
            EventKind::Create(_) if !REPORTS_WRITE_CLOSE => event.paths,
            EventKind::Create(_) => {
                let mut pending = self.pending.lock();
                event
                    .paths
                    .into_iter()
                    .filter(|path| {
                        if already_complete(path) {
                            return true;
                        }
                        pending.insert(path.clone());
                        false
                    })
                    .collect()
            }
            EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
                let mut pending = self.pending.lock();
                event
                    .paths
                    .into_iter()
                    .filter(|path| pending.remove(path))
                    .collect()
            }
            EventKind::Remove(_) => {
                let mut pending = self.pending.lock();
                for path in &event.paths {
                    pending.remove(path);
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(unix)]
fn already_complete(path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    std::fs::symlink_metadata(path).is_ok_and(|meta| meta.is_file() && meta.nlink() > 1)
}

#[cfg(not(unix))]
fn already_complete(_path: &Path) -> bool {
    false
}

impl FolderSource for NotifySource {
    fn name(&self) -> &str {
        "notify"
    }

    fn watch(
        &self,
        folder: &Path,
        on_created: CreatedCallback,
    ) -> Result<Box<dyn WatchHandle>, WatchError> {
        let watched = folder.to_path_buf();
        let tracker = CreateTracker::default();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    for path in tracker.ready(event) {
                        on_created(path);
                    }
                }
                Err(e) => {
                    tracing::error!("[watcher] file watch error on {}: {e}", watched.display());
                }
            }
        })?;

        watcher
            .watch(folder, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::PathWatchFailed {
                path: folder.to_path_buf(),
                reason: e.to_string(),
            })?;

        Ok(Box::new(NotifyHandle {
            folder: folder.to_path_buf(),
            _watcher: watcher,
        }))
    }
}

#[derive(Default)]
struct ManualState {
    next_token: u64,
    opened: usize,
    watches: HashMap<PathBuf, (u64, CreatedCallback)>,
}

/// In-process source; events are emitted with [`ManualSource::create`].
#[derive(Clone, Default)]
pub struct ManualSource {
    state: Arc<Mutex<ManualState>>,
}

struct ManualHandle {
    folder: PathBuf,
    token: u64,
    state: Arc<Mutex<ManualState>>,
}

impl WatchHandle for ManualHandle {
    fn folder(&self) -> &Path {
        &self.folder
    }
}

impl Drop for ManualHandle {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if state
            .watches
            .get(&self.folder)
            .is_some_and(|(token, _)| *token == self.token)
        {
            state.watches.remove(&self.folder);
        }
    }
}

impl ManualSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a created file. Returns false when nothing watches its folder.
    pub fn create(&self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        let callback = {
            let state = self.state.lock();
            path.parent()
                .and_then(|folder| state.watches.get(folder))
                .map(|(_, callback)| callback.clone())
        };

        match callback {
            Some(callback) => {
                callback(path);
                true
            }
            None => false,
        }
    }

    /// Number of currently open handles.
    pub fn open_handles(&self) -> usize {
        self.state.lock().watches.len()
    }

    /// Number of handles ever opened.
    pub fn opened_total(&self) -> usize {
        self.state.lock().opened
    }

    pub fn is_watching(&self, folder: &Path) -> bool {
        self.state.lock().watches.contains_key(folder)
    }
}

impl FolderSource for ManualSource {
    fn name(&self) -> &str {
        "manual"
    }

    fn watch(
        &self,
        folder: &Path,
        on_created: CreatedCallback,
    ) -> Result<Box<dyn WatchHandle>, WatchError> {
        let mut state = self.state.lock();
        state.next_token += 1;
        state.opened += 1;
        let token = state.next_token;
        state
            .watches
            .insert(folder.to_path_buf(), (token, on_created));

        Ok(Box::new(ManualHandle {
            folder: folder.to_path_buf(),
            token,
            state: self.state.clone(),
        }))
    }
}
