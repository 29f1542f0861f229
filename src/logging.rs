//! Logging setup and event macros.
//!
//! Logs go to stderr so they never interleave with the console prompt on
//! stdout. Levels come from the `[logging]` settings table; `RUST_LOG`
//! overrides them.
//!
//! ```toml
//! [logging]
//! default = "warn"
//!
//! [logging.modules]
//! dropwatch = "debug"
//! ```
//!
//! ```bash
//! RUST_LOG=dropwatch=debug dropwatch watch
//! ```

use std::sync::Once;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

/// Local wall-clock stamp, e.g. `14:03:07.512`.
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Filter directives for `config`, e.g. `warn,dropwatch=debug`.
fn filter_directives(config: &LoggingConfig) -> String {
    let mut modules: Vec<_> = config.modules.iter().collect();
    modules.sort();

    let mut directives = config.default.clone();
    for (module, level) in modules {
        directives.push_str(&format!(",{module}={level}"));
    }
    directives
}

/// Install the stderr subscriber for the `[logging]` settings.
///
/// `RUST_LOG` wins over the settings when set. Later calls are no-ops.
pub fn init_with_config(config: &LoggingConfig) {
    INIT.call_once(|| {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(filter_directives(config))
        };

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_timer(CompactTime)
            .with_level(true)
            .with_filter(filter);

        tracing_subscriber::registry().with(fmt_layer).init();
    });
}

/// Install the subscriber before settings are available (`init` command).
pub fn init() {
    init_with_config(&LoggingConfig::default());
}

/// Info line tagged with the emitting component: `[watcher] added: 1 (File) ...`.
///
/// # Examples
/// ```ignore
/// log_event!("watcher", "watching", "{}", folder.display());
/// log_event!("watcher", "started");
/// ```
#[macro_export]
macro_rules! log_event {
    ($component:expr, $event:expr) => {
        tracing::info!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::info!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}

/// Like [`log_event!`] at debug level, for per-file dispatch detail.
///
/// # Examples
/// ```ignore
/// debug_event!("dispatch", "unmatched", "{}", path.display());
/// ```
#[macro_export]
macro_rules! debug_event {
    ($component:expr, $event:expr) => {
        tracing::debug!("[{}] {}", $component, $event)
    };
    ($component:expr, $event:expr, $($arg:tt)*) => {
        tracing::debug!("[{}] {}: {}", $component, $event, format!($($arg)*))
    };
}
