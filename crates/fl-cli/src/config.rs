//! Configuration loading and management.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use fl_core::{DEFAULT_MAX_SOURCES, EngineConfig, parse_key};
use serde::{Deserialize, Serialize};

/// System-wide config file, read before the per-user one.
const SYSTEM_CONFIG: &str = "/etc/footlog/config.toml";

/// Hard ceiling for `max_sources`; `poll` over more than this is not a pedal.
const MAX_SOURCES_LIMIT: usize = 64;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Activity log written by `run`.
    pub log_file: PathBuf,
    /// Inactivity gap in milliseconds that ends a session.
    pub gap_threshold_ms: u64,
    /// Sleep between event checks in milliseconds.
    pub poll_pace_ms: u64,
    /// Upper bound on event nodes monitored at once.
    pub max_sources: usize,
    /// Symbolic name of the key the pedal repeats.
    pub tracked_key: String,
    pub device: DeviceConfig,
}

/// How to find the pedal's event nodes.
///
/// All configured criteria must match. With none configured nothing
/// matches, so a stray keyboard is never grabbed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// USB vendor id, four hex digits.
    pub vendor_id: Option<String>,
    /// USB product id, four hex digits.
    pub product_id: Option<String>,
    /// Substring of the kernel device name.
    pub name_contains: Option<String>,
    /// Explicit event nodes; skips discovery when non-empty.
    pub paths: Vec<PathBuf>,
    /// Where input class entries are listed.
    pub sysfs_dir: PathBuf,
    /// Where event device nodes live.
    pub dev_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("/var/log/footlog/events.log"),
            gap_threshold_ms: 1000,
            poll_pace_ms: 100,
            max_sources: DEFAULT_MAX_SOURCES,
            tracked_key: "KEY_1".to_string(),
            device: DeviceConfig::default(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            // QinHeng Electronics
            vendor_id: Some("1a86".to_string()),
            product_id: None,
            name_contains: None,
            paths: Vec::new(),
            sysfs_dir: PathBuf::from("/sys/class/input"),
            dev_dir: PathBuf::from("/dev/input"),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(SYSTEM_CONFIG));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // FOOTLOG_GAP_THRESHOLD_MS, FOOTLOG_DEVICE__VENDOR_ID, ...
        figment = figment.merge(Env::prefixed("FOOTLOG_").split("__"));

        figment.extract()
    }

    /// Validates the timing settings and resolves the tracked key.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        ensure!(
            self.gap_threshold_ms > 0,
            "invalid configuration: gap threshold must be positive"
        );
        ensure!(
            (1..=MAX_SOURCES_LIMIT).contains(&self.max_sources),
            "invalid configuration: max_sources must be between 1 and {MAX_SOURCES_LIMIT}, got {}",
            self.max_sources
        );
        let tracked_key =
            parse_key(&self.tracked_key).context("invalid configuration: tracked_key")?;

        Ok(EngineConfig {
            gap_threshold_ms: self.gap_threshold_ms,
            tracked_key,
            ..EngineConfig::default()
        })
    }
}

/// Returns the platform-specific config directory for footlog.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("footlog"))
}
