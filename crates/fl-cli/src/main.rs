use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use fl_cli::commands::{devices, run};
use fl_cli::{Cli, Commands, Config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with debug flag support
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    // Diagnostics go to stderr; stdout is reserved for command output
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let mut config =
        Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    cli.apply_to(&mut config);
    tracing::debug!(?config, "loaded configuration");

    match &cli.command {
        Some(Commands::Devices { json }) => {
            devices::run(&mut std::io::stdout().lock(), &config.device, *json)?;
        }
        Some(Commands::Run) | None => run::run(&config)?,
    }

    Ok(())
}
