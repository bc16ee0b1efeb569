// ghstats entry point.
// Parses the command line, loads config and runs the dashboard.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use ghstats::cache::TtlCache;
use ghstats::config::DEFAULT_CONFIG_PATH;
use ghstats::{App, Config, Result, display, logging};

/// Rotating display of GitHub repository statistics.
#[derive(Debug, Parser)]
#[command(name = "ghstats", version, about)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Remove all cached API responses before starting
    #[arg(long)]
    clear_cache: bool,
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(&cli.config)?;
    logging::init(&config)?;

    if cli.clear_cache {
        let removed = TtlCache::new(&config.cache_dir, true, config.cache_ttl()).clear(None);
        tracing::info!(removed, "Cleared cache in {}", config.cache_dir.display());
    }

    tracing::info!(
        repositories = config.repositories.len(),
        display = ?config.display_type,
        "Loaded {}",
        cli.config.display()
    );

    let display = display::open(&config)?;
    let app = App::new(&config, display)?;
    app.run().await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
