//! dropwatch command-line entry point.

use anyhow::{Context, anyhow};
use clap::Parser;

use dropwatch::Settings;
use dropwatch::cli::commands::{configurations, init, watch};
use dropwatch::cli::{Cli, Commands};
use dropwatch::logging;

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let settings = match &cli.config {
        Some(path) => {
            let mut settings = Settings::load_from(path)
                .map_err(|e| anyhow!("{e}"))
                .with_context(|| format!("Failed to load {}", path.display()))?;
            if settings.workspace_root.is_none() {
                settings.workspace_root = Settings::workspace_root();
            }
            settings
        }
        None => Settings::load().map_err(|e| anyhow!("Failed to load settings: {e}"))?,
    };
    Ok(settings)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Init { force }) = &cli.command {
        logging::init();
        let dir = std::env::current_dir().context("Cannot determine current directory")?;
        return init::run_init(&dir, *force);
    }

    let settings = load_settings(&cli)?;
    logging::init_with_config(&settings.logging);

    match cli.command_or_default() {
        Commands::Init { .. } => Ok(()),
        Commands::Watch => watch::run_watch(&settings).await,
        Commands::Add { folder, kind, params } => {
            configurations::run_add(&settings, &folder, &kind, &params)
        }
        Commands::Remove { id } => configurations::run_remove(&settings, id),
        Commands::List => configurations::run_list(&settings),
        Commands::Integrations => configurations::run_integrations(),
        Commands::Config => init::run_config(&settings),
    }
}
