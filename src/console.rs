//! Interactive console on top of the orchestrator.
//!
//! Commands, one per line:
//!
//! ```text
//! add <folder> <type> [-flag value]..   add a watch configuration
//! remove <id>                           remove a configuration
//! list                                  list active configurations
//! integrations                          list integration types and their flags
//! ? | help                              show help
//! quit | exit                           leave
//! ```

use std::io::{self, Write};
use std::path::PathBuf;

use console::style;
use thiserror::Error;

use crate::integration::{IntegrationError, IntegrationRegistry};
use crate::types::{ConfigId, Configuration};
use crate::watcher::{Orchestrator, WatchError, WatchEvent};

pub const PROMPT: &str = "> ";

#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("Unknown command '{0}', enter ? for help")]
    UnknownCommand(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("You have to enter a valid id")]
    InvalidId(String),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error(transparent)]
    Integration(#[from] IntegrationError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// One parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Empty,
    Help,
    Add {
        folder: PathBuf,
        kind: String,
        args: Vec<String>,
    },
    Remove(ConfigId),
    List,
    Integrations,
    Quit,
}

/// Whether the console keeps reading after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

const ADD_USAGE: &str = "add folder integrationType [integration parameters]";
const REMOVE_USAGE: &str = "remove id";

impl ConsoleCommand {
    /// Parse a whitespace separated command line.
    pub fn parse(line: &str) -> Result<Self, ConsoleError> {
        let mut words = line.split_whitespace();
        let Some(action) = words.next() else {
            return Ok(Self::Empty);
        };

        match action {
            "?" | "help" => Ok(Self::Help),
            "list" => Ok(Self::List),
            "integrations" => Ok(Self::Integrations),
            "quit" | "exit" => Ok(Self::Quit),
            "add" => {
                let folder = words.next().ok_or(ConsoleError::Usage(ADD_USAGE))?;
                let kind = words.next().ok_or(ConsoleError::Usage(ADD_USAGE))?;
                Ok(Self::Add {
                    folder: PathBuf::from(folder),
                    kind: kind.to_string(),
                    args: words.map(str::to_string).collect(),
                })
            }
            "remove" => {
                let raw = words.next().ok_or(ConsoleError::Usage(REMOVE_USAGE))?;
                raw.parse::<u32>()
                    .ok()
                    .and_then(ConfigId::new)
                    .map(Self::Remove)
                    .ok_or_else(|| ConsoleError::InvalidId(raw.to_string()))
            }
            other => Err(ConsoleError::UnknownCommand(other.to_string())),
        }
    }
}

/// Executes console commands against an orchestrator, writing to `out`.
pub struct Console<'a, W: Write> {
    orchestrator: &'a Orchestrator,
    out: W,
}

impl<'a, W: Write> Console<'a, W> {
    pub fn new(orchestrator: &'a Orchestrator, out: W) -> Self {
        Self { orchestrator, out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Parse and run one line.
    pub fn handle_line(&mut self, line: &str) -> Result<Flow, ConsoleError> {
        let command = ConsoleCommand::parse(line)?;
        self.execute(command)
    }

    pub fn execute(&mut self, command: ConsoleCommand) -> Result<Flow, ConsoleError> {
        match command {
            ConsoleCommand::Empty => {}
            ConsoleCommand::Help => self.print_help()?,
            ConsoleCommand::List => self.print_list()?,
            ConsoleCommand::Integrations => self.print_integrations()?,
            ConsoleCommand::Quit => return Ok(Flow::Quit),
            ConsoleCommand::Add { folder, kind, args } => {
                let registry = self.orchestrator.registry();
                let parameters = registry.parse_flags(&kind, args.as_slice())?;
                let integration = registry.create(&kind, &parameters)?;
                let configuration = self.orchestrator.add_configuration(&folder, integration)?;
                writeln!(self.out, "Now watching {}", configuration.folder().display())?;
            }
            ConsoleCommand::Remove(id) => match self.orchestrator.remove_configuration(id)? {
                Some(configuration) => writeln!(
                    self.out,
                    "{} stopped watching {}",
                    describe(&configuration),
                    configuration.folder().display()
                )?,
                None => writeln!(self.out, "There is no configuration with the given id")?,
            },
        }
        Ok(Flow::Continue)
    }

    /// Print the startup banner: one line per active configuration.
    pub fn print_active(&mut self) -> io::Result<()> {
        for configuration in self.orchestrator.configurations() {
            writeln!(
                self.out,
                "{} watching {}",
                describe(&configuration),
                configuration.folder().display()
            )?;
        }
        Ok(())
    }

    /// Write an observer event.
    pub fn print_event(&mut self, event: &WatchEvent) -> io::Result<()> {
        writeln!(self.out, "{}", render_event(event))
    }

    pub fn prompt(&mut self) -> io::Result<()> {
        write!(self.out, "{PROMPT}")?;
        self.out.flush()
    }

    fn print_list(&mut self) -> io::Result<()> {
        let configurations = self.orchestrator.configurations();
        write_table(&mut self.out, &configurations)
    }

    fn print_integrations(&mut self) -> io::Result<()> {
        write_integrations(&mut self.out, self.orchestrator.registry())
    }

    fn print_help(&mut self) -> io::Result<()> {
        let lines = [
            "Add a new watch configuration:",
            "    add folder integrationType [integration parameters]",
            "",
            "List all active configurations:",
            "    list",
            "",
            "List integration types and their parameters:",
            "    integrations",
            "",
            "Remove a configuration:",
            "    remove id",
            "",
            "Leave:",
            "    quit",
        ];
        writeln!(self.out, "{}", lines.join("\n"))
    }
}

/// `Configuration 3 (File)`
fn describe(configuration: &Configuration) -> String {
    format!("Configuration {} ({})", configuration.id(), configuration.kind())
}

/// One console line for an observer event.
pub fn render_event(event: &WatchEvent) -> String {
    match event {
        WatchEvent::FileAdded { path } => format!("File {}", path.display()),
        WatchEvent::IntegrationExecuted { integration, .. } => {
            format!("    {}", integration.action_message())
        }
        WatchEvent::IntegrationFailed {
            configuration_id,
            error,
            ..
        } => format!(
            "    {} configuration {configuration_id}: {error}",
            style("failed").red()
        ),
    }
}

/// Id / type / folder table.
pub fn write_table(out: &mut impl Write, configurations: &[Configuration]) -> io::Result<()> {
    writeln!(out, "{}", style("Id Type        Folder").bold())?;
    for configuration in configurations {
        writeln!(
            out,
            "{:>2} {:<11} {}",
            configuration.id(),
            configuration.kind(),
            configuration.folder().display()
        )?;
    }
    Ok(())
}

/// Integration types with their flags.
pub fn write_integrations(out: &mut impl Write, registry: &IntegrationRegistry) -> io::Result<()> {
    for kind in registry.kinds() {
        let Ok(descriptor) = registry.descriptor(kind) else {
            continue;
        };
        writeln!(out, "{} - {}", style(kind).bold(), descriptor.description)?;
        for spec in descriptor.parameters {
            writeln!(out, "    {} <{}>  {}", spec.flag, spec.name, spec.description)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watcher::ManualSource;
    use tempfile::TempDir;

    fn started(temp_dir: &TempDir) -> Orchestrator {
        let orchestrator = Orchestrator::builder()
            .store_path(temp_dir.path().join("configurations.json"))
            .source(ManualSource::new())
            .build()
            .unwrap();
        orchestrator.start().unwrap();
        orchestrator
    }

    fn output(console: Console<'_, Vec<u8>>) -> String {
        String::from_utf8(console.into_inner()).unwrap()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(ConsoleCommand::parse("   ").unwrap(), ConsoleCommand::Empty);
        assert_eq!(ConsoleCommand::parse("?").unwrap(), ConsoleCommand::Help);
        assert_eq!(ConsoleCommand::parse("list").unwrap(), ConsoleCommand::List);
        assert_eq!(ConsoleCommand::parse("exit").unwrap(), ConsoleCommand::Quit);
        assert_eq!(
            ConsoleCommand::parse("add /in File -t /out").unwrap(),
            ConsoleCommand::Add {
                folder: PathBuf::from("/in"),
                kind: "File".to_string(),
                args: vec!["-t".to_string(), "/out".to_string()],
            }
        );
        assert_eq!(
            ConsoleCommand::parse("remove 3").unwrap(),
            ConsoleCommand::Remove(ConfigId::new(3).unwrap())
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            ConsoleCommand::parse("add /in"),
            Err(ConsoleError::Usage(_))
        ));
        assert!(matches!(
            ConsoleCommand::parse("remove"),
            Err(ConsoleError::Usage(_))
        ));
        assert!(matches!(
            ConsoleCommand::parse("remove zero"),
            Err(ConsoleError::InvalidId(_))
        ));
        assert!(matches!(
            ConsoleCommand::parse("remove 0"),
            Err(ConsoleError::InvalidId(_))
        ));
        assert!(matches!(
            ConsoleCommand::parse("frobnicate"),
            Err(ConsoleError::UnknownCommand(cmd)) if cmd == "frobnicate"
        ));
    }

    #[test]
    fn test_add_list_remove() {
        let temp_dir = TempDir::new().unwrap();
        let orchestrator = started(&temp_dir);
        let inbox = temp_dir.path().join("in");
        std::fs::create_dir(&inbox).unwrap();

        let mut console = Console::new(&orchestrator, Vec::new());
        let line = format!("add {} File -t {}", inbox.display(), temp_dir.path().join("out").display());
        assert_eq!(console.handle_line(&line).unwrap(), Flow::Continue);
        console.handle_line("list").unwrap();
        console.handle_line("remove 1").unwrap();
        console.handle_line("remove 1").unwrap();
        assert_eq!(console.handle_line("quit").unwrap(), Flow::Quit);

        let text = output(console);
        assert!(text.contains(&format!("Now watching {}", inbox.display())));
        assert!(text.contains(&format!(" 1 File        {}", inbox.display())));
        assert!(text.contains(&format!(
            "Configuration 1 (File) stopped watching {}",
            inbox.display()
        )));
        assert!(text.contains("There is no configuration with the given id"));
        assert!(orchestrator.configurations().is_empty());
    }

    #[test]
    fn test_add_missing_parameter() {
        let temp_dir = TempDir::new().unwrap();
        let orchestrator = started(&temp_dir);
        let mut console = Console::new(&orchestrator, Vec::new());

        let line = format!("add {} File", temp_dir.path().display());
        let err = console.handle_line(&line).unwrap_err();
        assert!(matches!(
            err,
            ConsoleError::Integration(IntegrationError::MissingParameter { .. })
        ));
        assert!(orchestrator.configurations().is_empty());
    }

    #[test]
    fn test_add_invalid_folder() {
        let temp_dir = TempDir::new().unwrap();
        let orchestrator = started(&temp_dir);
        let mut console = Console::new(&orchestrator, Vec::new());

        let line = format!("add {} File -t /out", temp_dir.path().join("missing").display());
        let err = console.handle_line(&line).unwrap_err();
        assert!(matches!(
            err,
            ConsoleError::Watch(WatchError::InvalidFolder { .. })
        ));
    }

    #[test]
    fn test_help_and_integrations() {
        let temp_dir = TempDir::new().unwrap();
        let orchestrator = started(&temp_dir);
        let mut console = Console::new(&orchestrator, Vec::new());

        console.handle_line("?").unwrap();
        console.handle_line("integrations").unwrap();

        let text = output(console);
        assert!(text.contains("remove id"));
        assert!(text.contains("-t <target>  target folder"));
    }

    #[test]
    fn test_render_events() {
        let integration: std::sync::Arc<dyn crate::Integration> =
            std::sync::Arc::new(crate::FileIntegration::new("/srv/out").unwrap());

        let added = WatchEvent::FileAdded {
            path: PathBuf::from("/srv/in/a.txt"),
        };
        assert_eq!(render_event(&added), "File /srv/in/a.txt");

        let executed = WatchEvent::IntegrationExecuted {
            configuration_id: ConfigId::new(1).unwrap(),
            path: PathBuf::from("/srv/in/a.txt"),
            integration,
        };
        assert_eq!(render_event(&executed), "    copied to /srv/out");
    }
}
