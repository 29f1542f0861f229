//! One-shot commands that read or edit the configuration store.
//!
//! Edits go through an orchestrator that watches nothing, so the same
//! validation and id allocation apply as in the console. A running `watch`
//! session only reads the store at startup and sees edits after a restart.

use std::io;
use std::path::Path;

use anyhow::Context;

use crate::config::Settings;
use crate::console::{write_integrations, write_table};
use crate::integration::IntegrationRegistry;
use crate::storage::ConfigStore;
use crate::types::ConfigId;
use crate::watcher::{ManualSource, Orchestrator};

/// Print stored configurations without starting any watches.
pub fn run_list(settings: &Settings) -> anyhow::Result<()> {
    let store = ConfigStore::new(settings.resolved_store_path());
    let configurations = store
        .load(&IntegrationRegistry::builtin())
        .with_context(|| format!("Failed to read {}", store.path().display()))?;

    if configurations.is_empty() {
        println!("No configurations in {}", store.path().display());
        return Ok(());
    }
    write_table(&mut io::stdout().lock(), &configurations)?;
    Ok(())
}

pub fn run_integrations() -> anyhow::Result<()> {
    write_integrations(&mut io::stdout().lock(), &IntegrationRegistry::builtin())?;
    Ok(())
}

pub fn run_add(settings: &Settings, folder: &Path, kind: &str, params: &[String]) -> anyhow::Result<()> {
    let orchestrator = editor(settings)?;
    let registry = orchestrator.registry();
    let parameters = registry.parse_flags(kind, params)?;
    let integration = registry.create(kind, &parameters)?;

    let configuration = orchestrator.add_configuration(folder, integration)?;
    println!(
        "Configuration {} ({}) watching {}",
        configuration.id(),
        configuration.kind(),
        configuration.folder().display()
    );
    Ok(())
}

pub fn run_remove(settings: &Settings, id: u32) -> anyhow::Result<()> {
    let id = ConfigId::new(id).context("Configuration ids start at 1")?;
    let orchestrator = editor(settings)?;

    match orchestrator.remove_configuration(id)? {
        Some(configuration) => println!(
            "Configuration {} ({}) stopped watching {}",
            configuration.id(),
            configuration.kind(),
            configuration.folder().display()
        ),
        None => println!("There is no configuration with the given id"),
    }
    Ok(())
}

/// Orchestrator for store edits: its folder source opens no platform watches,
/// so nothing is dispatched while the command runs.
fn editor(settings: &Settings) -> anyhow::Result<Orchestrator> {
    let orchestrator = Orchestrator::builder()
        .store_path(settings.resolved_store_path())
        .event_capacity(settings.events.capacity)
        .source(ManualSource::new())
        .build()?;
    orchestrator
        .start()
        .with_context(|| format!("Failed to load {}", settings.resolved_store_path().display()))?;
    Ok(orchestrator)
}
