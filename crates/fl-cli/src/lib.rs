//! Foot pedal activity logger CLI library.
//!
//! This crate provides the CLI interface, configuration, device discovery
//! and log file handling around the `fl-core` engine.

mod cli;
pub mod commands;
mod config;
pub mod device;
pub mod logfile;

pub use cli::{Cli, Commands};
pub use config::{Config, DeviceConfig};
