// Logging setup.
// Initializes the tracing subscriber from the configured level and destination.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use directories::ProjectDirs;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{Config, DisplayType};
use crate::error::Result;

pub const DEFAULT_LOG_LEVEL: &str = "info";

const LOG_FILE_NAME: &str = "ghstats.log";

/// Where log records are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

/// Normalize a level name; unknown values fall back to `info`.
pub fn parse_level(value: &str) -> &'static str {
    match value.trim().to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "info" => "info",
        "warn" | "warning" => "warn",
        "error" => "error",
        "off" | "none" | "disabled" => "off",
        _ => DEFAULT_LOG_LEVEL,
    }
}

/// Default log file under the platform data directory.
pub fn default_log_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "ghstats").map(|dirs| dirs.data_dir().join(LOG_FILE_NAME))
}

/// Pick the log destination for a configuration.
///
/// The full-screen dashboard owns the terminal, so without an explicit
/// `log_file` it logs to the data directory instead of stderr.
pub fn log_target(config: &Config) -> LogTarget {
    if let Some(path) = &config.log_file {
        return LogTarget::File(path.clone());
    }
    match (config.display_type, default_log_path()) {
        (DisplayType::Gui, Some(path)) => LogTarget::File(path),
        _ => LogTarget::Stderr,
    }
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
pub fn init(config: &Config) -> Result<()> {
    let level = parse_level(&config.log_level);
    if level == "off" {
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let target = log_target(config);

    match &target {
        LogTarget::Stderr => {
            let layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false);
            tracing_subscriber::registry().with(filter).with(layer).try_init()
        }
        LogTarget::File(path) => {
            let file = open_log_file(path)?;
            let layer = fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true);
            tracing_subscriber::registry().with(filter).with(layer).try_init()
        }
    }
    .map_err(|e| crate::error::StatsError::Other(format!("Failed to initialize logging: {}", e)))?;

    tracing::debug!(level, ?target, "logging initialized");
    Ok(())
}
