//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::Config;

/// Foot pedal activity logger.
///
/// Watches the pedal's input event nodes and logs each press as a
/// DOWN/UP pair with its duration.
#[derive(Debug, Parser)]
#[command(name = "footlog", version, about, long_about = None)]
pub struct Cli {
    /// Enable debug output.
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Milliseconds to sleep between event checks.
    #[arg(short = 't', long = "pace", value_name = "MS", global = true)]
    pub pace: Option<u64>,

    /// Minimum gap in milliseconds that separates two presses.
    #[arg(short, long, value_name = "MS", global = true)]
    pub gap: Option<u64>,

    /// Activity log file.
    #[arg(short = 'f', long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Log pedal presses (the default).
    Run,

    /// List input event devices and whether they match the pedal.
    Devices {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Applies command-line overrides on top of the loaded configuration.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(pace) = self.pace {
            config.poll_pace_ms = pace;
        }
        if let Some(gap) = self.gap {
            config.gap_threshold_ms = gap;
        }
        if let Some(path) = &self.log_file {
            config.log_file.clone_from(path);
        }
    }
}
