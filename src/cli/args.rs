//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Watch folders and run integrations on new files
#[derive(Parser, Debug)]
#[command(
    name = "dropwatch",
    version = env!("CARGO_PKG_VERSION"),
    about = "Watch folders and run integrations on new files",
    long_about = "Watch folders for newly created files and run the configured \
                  integrations on each one. Without a command, starts the interactive console.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
pub struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Set up .dropwatch directory with default settings
    #[command(about = "Set up .dropwatch directory with default settings")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Watch configured folders with an interactive console
    #[command(about = "Watch configured folders with an interactive console")]
    Watch,

    /// Add a watch configuration to the store
    #[command(
        about = "Add a watch configuration",
        after_help = "Example:\n  $ dropwatch add ./inbox File -t ./archive"
    )]
    Add {
        /// Folder to watch
        folder: PathBuf,

        /// Integration type, see `dropwatch integrations`
        #[arg(value_name = "TYPE")]
        kind: String,

        /// Integration parameters as flag/value pairs
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "PARAMS")]
        params: Vec<String>,
    },

    /// Remove a watch configuration by id
    #[command(about = "Remove a watch configuration by id")]
    Remove {
        /// Configuration id as shown by `dropwatch list`
        id: u32,
    },

    /// List stored configurations
    #[command(about = "List stored configurations")]
    List,

    /// List integration types and their parameters
    #[command(about = "List integration types and their parameters")]
    Integrations,

    /// Display active settings
    #[command(about = "Display active settings")]
    Config,
}

impl Cli {
    /// The command to run, `watch` when none was given.
    pub fn command_or_default(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Watch)
    }
}
