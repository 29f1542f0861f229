//! Watch command: interactive console over a running orchestrator.

use std::io;

use anyhow::Context;
use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use crate::config::Settings;
use crate::console::{Console, Flow};
use crate::watcher::Orchestrator;

/// Start watching every stored configuration and read console commands
/// from stdin until `quit` or end of input.
pub async fn run_watch(settings: &Settings) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::from_settings(settings)?;
    orchestrator.start().with_context(|| {
        format!(
            "Failed to load configurations from {}",
            settings.resolved_store_path().display()
        )
    })?;

    let mut events = orchestrator.subscribe();
    let mut console = Console::new(&orchestrator, io::stdout());
    console.print_active()?;
    println!("Enter ? for help");
    console.prompt()?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                match console.handle_line(&line) {
                    Ok(Flow::Quit) => break,
                    Ok(Flow::Continue) => {}
                    Err(e) => eprintln!("{} {e}", style("error:").red().bold()),
                }
                console.prompt()?;
            }
            event = events.recv() => match event {
                Ok(event) => console.print_event(&event)?,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("[console] skipped {skipped} events");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    crate::log_event!("console", "stopped");
    Ok(())
}
