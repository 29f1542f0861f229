//! Watch orchestrator: owns configurations, folder handles and dispatch.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::config::Settings;
use crate::integration::{Integration, IntegrationError, IntegrationRegistry};
use crate::storage::{ConfigRecord, ConfigStore};
use crate::types::{ConfigId, Configuration};

use super::error::WatchError;
use super::events::{EventBroadcaster, WatchEvent};
use super::folder_registry::FolderRegistry;
use super::source::{FolderSource, NotifySource};

/// Configurations and folder handles, always mutated together under one lock.
#[derive(Default)]
struct WatchState {
    configurations: Vec<Configuration>,
    folders: FolderRegistry,
}

impl WatchState {
    fn records(&self) -> Vec<ConfigRecord> {
        self.configurations.iter().map(ConfigRecord::from).collect()
    }
}

struct Inner {
    state: Mutex<WatchState>,
    store: ConfigStore,
    registry: IntegrationRegistry,
    source: Arc<dyn FolderSource>,
    broadcaster: EventBroadcaster,
    queue: Sender<PathBuf>,
}

/// Watches folders and runs the configured integrations on new files.
///
/// Each distinct folder gets one handle from the [`FolderSource`]. Handle
/// callbacks only enqueue the created path; a single dispatcher thread
/// resolves the matching configurations at dispatch time and runs them in
/// list order.
///
/// ```text
/// FolderSource handle ──┐
/// FolderSource handle ──┼─> queue ─> dispatcher ─> integrations
/// FolderSource handle ──┘                 │
///                                         └─> EventBroadcaster
/// ```
pub struct Orchestrator {
    inner: Arc<Inner>,
    pending: Mutex<Option<Receiver<PathBuf>>>,
    started: AtomicBool,
}

impl Orchestrator {
    /// Create a builder for configuring the orchestrator.
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Build an orchestrator from settings with the platform notification source.
    pub fn from_settings(settings: &Settings) -> Result<Self, WatchError> {
        Self::builder()
            .store_path(settings.resolved_store_path())
            .event_capacity(settings.events.capacity)
            .build()
    }

    /// Load the store, watch every stored folder and start dispatching.
    ///
    /// A missing store starts empty. A corrupt store fails and is left as is.
    /// Stored folders that can no longer be watched stay configured but
    /// inactive, with a warning.
    pub fn start(&self) -> Result<(), WatchError> {
        if self.started.load(Ordering::SeqCst) {
            return Err(WatchError::AlreadyStarted);
        }
        let loaded = self.inner.store.load(&self.inner.registry)?;

        let queue = self
            .pending
            .lock()
            .take()
            .ok_or(WatchError::AlreadyStarted)?;
        let weak = Arc::downgrade(&self.inner);
        thread::Builder::new()
            .name("dropwatch-dispatch".to_string())
            .spawn(move || dispatch_loop(weak, queue))
            .map_err(|e| WatchError::InitFailed {
                reason: format!("cannot spawn dispatcher: {e}"),
            })?;

        let mut state = self.inner.state.lock();
        for configuration in loaded {
            if let Err(e) = self.inner.activate(&mut state.folders, configuration.folder()) {
                tracing::warn!(
                    "[watcher] configuration {} inactive: {e}",
                    configuration.id()
                );
            }
            state.configurations.push(configuration);
        }
        // Flipped under the lock so no add can allocate an id before stored ones are in
        self.started.store(true, Ordering::SeqCst);

        crate::log_event!(
            "watcher",
            "started",
            "{} configurations in {} folders",
            state.configurations.len(),
            state.folders.len()
        );
        Ok(())
    }

    /// Add a configuration watching `folder` and persist the list.
    ///
    /// The id is the smallest positive integer not in use. Nothing changes
    /// unless the updated list was written to the store.
    pub fn add_configuration(
        &self,
        folder: impl AsRef<Path>,
        integration: Arc<dyn Integration>,
    ) -> Result<Configuration, WatchError> {
        self.ensure_started()?;

        let invalid = || WatchError::InvalidFolder {
            path: folder.as_ref().to_path_buf(),
        };
        if !folder.as_ref().is_dir() {
            return Err(invalid());
        }
        // The store keeps folders as JSON strings
        let folder = std::path::absolute(folder.as_ref()).map_err(|_| invalid())?;
        if folder.to_str().is_none() {
            return Err(invalid());
        }
        // Only registered variants can be rebuilt from the store
        self.inner.registry.descriptor(integration.kind())?;

        let mut state = self.inner.state.lock();
        let id = ConfigId::first_free(state.configurations.iter().map(Configuration::id));
        let configuration = Configuration::new(id, folder, integration);

        let mut records = state.records();
        records.push(ConfigRecord::from(&configuration));
        let json = ConfigStore::encode(&records)?;

        let opened = self.inner.activate(&mut state.folders, configuration.folder())?;
        if let Err(e) = self.inner.write_store(&json) {
            if opened {
                state.folders.close(configuration.folder());
            }
            return Err(e);
        }

        state.configurations.push(configuration.clone());
        crate::log_event!(
            "watcher",
            "added",
            "{id} ({}) watching {}",
            configuration.kind(),
            configuration.folder().display()
        );
        Ok(configuration)
    }

    /// Remove a configuration by id and persist the list.
    ///
    /// Returns `Ok(None)` when no configuration has that id. The folder's
    /// handle is closed once no configuration references it. A failed store
    /// write leaves the configuration in place.
    pub fn remove_configuration(&self, id: ConfigId) -> Result<Option<Configuration>, WatchError> {
        self.ensure_started()?;

        let mut state = self.inner.state.lock();
        let Some(index) = state.configurations.iter().position(|c| c.id() == id) else {
            crate::debug_event!("watcher", "remove", "no configuration {id}");
            return Ok(None);
        };

        let records: Vec<ConfigRecord> = state
            .configurations
            .iter()
            .filter(|c| c.id() != id)
            .map(ConfigRecord::from)
            .collect();
        self.inner.write_store(&ConfigStore::encode(&records)?)?;

        let removed = state.configurations.remove(index);
        let still_used = state
            .configurations
            .iter()
            .any(|c| c.folder() == removed.folder());
        if !still_used && state.folders.close(removed.folder()) {
            crate::log_event!("watcher", "unwatched", "{}", removed.folder().display());
        }
        crate::log_event!(
            "watcher",
            "removed",
            "{id} ({}) stopped watching {}",
            removed.kind(),
            removed.folder().display()
        );
        Ok(Some(removed))
    }

    /// Snapshot of active configurations in insertion order.
    pub fn configurations(&self) -> Vec<Configuration> {
        self.inner.state.lock().configurations.clone()
    }

    /// Folders with an open notification handle, sorted.
    pub fn watched_folders(&self) -> Vec<PathBuf> {
        self.inner.state.lock().folders.folders()
    }

    /// Subscribe to file-added and integration events.
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.inner.broadcaster.subscribe()
    }

    pub fn registry(&self) -> &IntegrationRegistry {
        &self.inner.registry
    }

    pub fn store(&self) -> &ConfigStore {
        &self.inner.store
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Run every integration whose folder is `path`'s parent.
    ///
    /// This is what the dispatcher thread does for each queued event; it runs
    /// synchronously on the calling thread.
    pub fn dispatch(&self, path: &Path) {
        self.inner.dispatch(path);
    }

    fn ensure_started(&self) -> Result<(), WatchError> {
        if self.is_started() {
            Ok(())
        } else {
            Err(WatchError::NotStarted)
        }
    }
}

impl Inner {
    /// Open a handle for `folder` unless one is already open.
    ///
    /// Returns whether a new handle was opened.
    fn activate(&self, folders: &mut FolderRegistry, folder: &Path) -> Result<bool, WatchError> {
        if folders.contains(folder) {
            crate::debug_event!("watcher", "already watching", "{}", folder.display());
            return Ok(false);
        }

        let queue = self.queue.clone();
        let handle = self.source.watch(
            folder,
            Arc::new(move |path: PathBuf| {
                if queue.send(path).is_err() {
                    crate::debug_event!("watcher", "dispatcher gone");
                }
            }),
        )?;
        folders.insert(handle);
        crate::log_event!(
            "watcher",
            "watching",
            "{} ({})",
            folder.display(),
            self.source.name()
        );
        Ok(true)
    }

    /// Replace the store contents. Callers hold the state lock, so writes land
    /// in the order their snapshots were taken.
    fn write_store(&self, json: &str) -> Result<(), WatchError> {
        self.store.write(json).map_err(|e| {
            tracing::error!("[store] failed to save configurations: {e}");
            WatchError::from(e)
        })
    }

    fn dispatch(&self, path: &Path) {
        crate::log_event!("dispatch", "file", "{}", path.display());
        self.broadcaster.send(WatchEvent::FileAdded {
            path: path.to_path_buf(),
        });

        let Some(folder) = path.parent() else {
            return;
        };
        let targets: Vec<(ConfigId, Arc<dyn Integration>)> = self
            .state
            .lock()
            .configurations
            .iter()
            .filter(|c| c.folder() == folder)
            .map(|c| (c.id(), c.integration().clone()))
            .collect();

        if targets.is_empty() {
            crate::debug_event!("dispatch", "unmatched", "{}", path.display());
        }

        for (configuration_id, integration) in targets {
            match run_integration(integration.as_ref(), path) {
                Ok(()) => {
                    crate::log_event!(
                        "dispatch",
                        "executed",
                        "{configuration_id} {}",
                        integration.action_message()
                    );
                    self.broadcaster.send(WatchEvent::IntegrationExecuted {
                        configuration_id,
                        path: path.to_path_buf(),
                        integration,
                    });
                }
                Err(e) => {
                    tracing::error!(
                        "[dispatch] configuration {configuration_id} failed for {}: {e}",
                        path.display()
                    );
                    self.broadcaster.send(WatchEvent::IntegrationFailed {
                        configuration_id,
                        path: path.to_path_buf(),
                        integration,
                        error: e.to_string(),
                    });
                }
            }
        }
    }
}

/// Execute one integration, turning a panic into an ordinary failure so the
/// dispatcher keeps running.
fn run_integration(integration: &dyn Integration, path: &Path) -> Result<(), String> {
    match panic::catch_unwind(AssertUnwindSafe(|| integration.execute(path))) {
        Ok(result) => result.map_err(|e: IntegrationError| e.to_string()),
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(format!("integration panicked: {reason}"))
        }
    }
}

fn dispatch_loop(inner: Weak<Inner>, queue: Receiver<PathBuf>) {
    crate::debug_event!("dispatch", "started");
    for path in queue.iter() {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.dispatch(&path);
    }
    crate::debug_event!("dispatch", "stopped");
}

/// Builder for constructing an [`Orchestrator`].
pub struct OrchestratorBuilder {
    store_path: Option<PathBuf>,
    registry: IntegrationRegistry,
    source: Option<Arc<dyn FolderSource>>,
    event_capacity: usize,
}

impl OrchestratorBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            store_path: None,
            registry: IntegrationRegistry::builtin(),
            source: None,
            event_capacity: 256,
        }
    }

    /// Set the configuration store file.
    pub fn store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }

    /// Replace the integration registry (defaults to the built-in variants).
    pub fn registry(mut self, registry: IntegrationRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Set the notification source (defaults to [`NotifySource`]).
    pub fn source(mut self, source: impl FolderSource + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Set the observer channel capacity.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Build the Orchestrator.
    pub fn build(self) -> Result<Orchestrator, WatchError> {
        let store_path = self.store_path.ok_or_else(|| WatchError::InitFailed {
            reason: "Store path is required".to_string(),
        })?;
        let source = self.source.unwrap_or_else(|| Arc::new(NotifySource));

        let (tx, rx) = crossbeam_channel::unbounded();

        let inner = Inner {
            state: Mutex::new(WatchState::default()),
            store: ConfigStore::new(store_path),
            registry: self.registry,
            source,
            broadcaster: EventBroadcaster::new(self.event_capacity),
            queue: tx,
        };

        Ok(Orchestrator {
            inner: Arc::new(inner),
            pending: Mutex::new(Some(rx)),
            started: AtomicBool::new(false),
        })
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::{FileIntegration, IntegrationDescriptor, Parameters};
    use crate::watcher::ManualSource;
    use tempfile::TempDir;

    fn orchestrator(temp_dir: &TempDir, source: &ManualSource) -> Orchestrator {
        Orchestrator::builder()
            .store_path(temp_dir.path().join("configurations.json"))
            .source(source.clone())
            .build()
            .unwrap()
    }

    fn file_integration(target: &Path) -> Arc<dyn Integration> {
        Arc::new(FileIntegration::new(target).unwrap())
    }

    #[test]
    fn test_build_requires_store_path() {
        assert!(matches!(
            Orchestrator::builder().build(),
            Err(WatchError::InitFailed { .. })
        ));
    }

    #[test]
    fn test_operations_require_start() {
        let temp_dir = TempDir::new().unwrap();
        let source = ManualSource::new();
        let orchestrator = orchestrator(&temp_dir, &source);

        let result = orchestrator.add_configuration(temp_dir.path(), file_integration(temp_dir.path()));
        assert!(matches!(result, Err(WatchError::NotStarted)));
        assert!(matches!(
            orchestrator.remove_configuration(ConfigId::new(1).unwrap()),
            Err(WatchError::NotStarted)
        ));
    }

    #[test]
    fn test_start_twice_fails() {
        let temp_dir = TempDir::new().unwrap();
        let source = ManualSource::new();
        let orchestrator = orchestrator(&temp_dir, &source);

        orchestrator.start().unwrap();
        assert!(orchestrator.is_started());
        assert!(matches!(orchestrator.start(), Err(WatchError::AlreadyStarted)));
    }

    #[test]
    fn test_ids_reuse_gaps() {
        let temp_dir = TempDir::new().unwrap();
        let source = ManualSource::new();
        let orchestrator = orchestrator(&temp_dir, &source);
        orchestrator.start().unwrap();

        let target = temp_dir.path().join("out");
        let ids: Vec<u32> = (0..4)
            .map(|_| {
                orchestrator
                    .add_configuration(temp_dir.path(), file_integration(&target))
                    .unwrap()
                    .id()
                    .value()
            })
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);

        orchestrator.remove_configuration(ConfigId::new(2).unwrap()).unwrap();
        orchestrator.remove_configuration(ConfigId::new(1).unwrap()).unwrap();

        let next = orchestrator
            .add_configuration(temp_dir.path(), file_integration(&target))
            .unwrap();
        assert_eq!(next.id().value(), 1);
        let next = orchestrator
            .add_configuration(temp_dir.path(), file_integration(&target))
            .unwrap();
        assert_eq!(next.id().value(), 2);
        let next = orchestrator
            .add_configuration(temp_dir.path(), file_integration(&target))
            .unwrap();
        assert_eq!(next.id().value(), 5);
    }

    #[test]
    fn test_dispatch_runs_matching_configurations_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let source = ManualSource::new();
        let orchestrator = orchestrator(&temp_dir, &source);
        orchestrator.start().unwrap();

        let inbox = temp_dir.path().join("in");
        let first = temp_dir.path().join("first");
        let second = temp_dir.path().join("second");
        for dir in [&inbox, &first, &second] {
            std::fs::create_dir(dir).unwrap();
        }
        orchestrator
            .add_configuration(&inbox, file_integration(&first))
            .unwrap();
        orchestrator
            .add_configuration(&inbox, file_integration(&second))
            .unwrap();

        let mut rx = orchestrator.subscribe();
        let file = inbox.join("a.txt");
        std::fs::write(&file, "data").unwrap();
        orchestrator.dispatch(&file);

        assert!(matches!(rx.try_recv().unwrap(), WatchEvent::FileAdded { path } if path == file));
        for expected in [1, 2] {
            match rx.try_recv().unwrap() {
                WatchEvent::IntegrationExecuted {
                    configuration_id, ..
                } => assert_eq!(configuration_id.value(), expected),
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert!(first.join("a.txt").exists());
        assert!(second.join("a.txt").exists());
    }

    #[test]
    fn test_dispatch_survives_panicking_integration() {
        #[derive(Debug)]
        struct Panics;

        impl Integration for Panics {
            fn kind(&self) -> &'static str {
                "Panics"
            }
            fn action_message(&self) -> &str {
                "panics"
            }
            fn parameters(&self) -> Parameters {
                Parameters::new()
            }
            fn execute(&self, _file: &Path) -> Result<(), IntegrationError> {
                panic!("boom")
            }
        }

        let mut registry = IntegrationRegistry::builtin();
        registry.register(IntegrationDescriptor::new("Panics", "always panics", &[], |_| {
            Ok(Arc::new(Panics))
        }));

        let temp_dir = TempDir::new().unwrap();
        let orchestrator = Orchestrator::builder()
            .store_path(temp_dir.path().join("configurations.json"))
            .registry(registry)
            .source(ManualSource::new())
            .build()
            .unwrap();
        orchestrator.start().unwrap();

        let out = temp_dir.path().join("out");
        std::fs::create_dir(&out).unwrap();
        let inbox = temp_dir.path().join("in");
        std::fs::create_dir(&inbox).unwrap();
        orchestrator.add_configuration(&inbox, Arc::new(Panics)).unwrap();
        orchestrator
            .add_configuration(&inbox, file_integration(&out))
            .unwrap();

        let mut rx = orchestrator.subscribe();
        let file = inbox.join("a.txt");
        std::fs::write(&file, "data").unwrap();
        orchestrator.dispatch(&file);

        assert!(matches!(rx.try_recv().unwrap(), WatchEvent::FileAdded { .. }));
        match rx.try_recv().unwrap() {
            WatchEvent::IntegrationFailed { error, .. } => assert!(error.contains("boom")),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(
            rx.try_recv().unwrap(),
            WatchEvent::IntegrationExecuted { .. }
        ));
        assert!(out.join("a.txt").exists());
    }
}
