//! Discovering and acquiring the pedal's event nodes.
//!
//! Devices are found through the input class in sysfs, which exposes each
//! node's name and USB ids without opening the node itself.

use std::fs::{self, OpenOptions};
use std::os::fd::OwnedFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use evdev::raw_stream::RawDevice;
use nix::fcntl::OFlag;
use serde::Serialize;

use crate::config::DeviceConfig;

/// An input event node as described by sysfs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputDevice {
    /// Device node, e.g. `/dev/input/event3`.
    pub path: PathBuf,
    pub name: String,
    pub vendor: Option<String>,
    pub product: Option<String>,
}

impl InputDevice {
    /// `vendor:product`, or `?` where unknown.
    pub fn usb_id(&self) -> String {
        format!(
            "{}:{}",
            self.vendor.as_deref().unwrap_or("?"),
            self.product.as_deref().unwrap_or("?")
        )
    }

    /// True if every configured criterion holds.
    pub fn matches(&self, config: &DeviceConfig) -> bool {
        let id_matches = |want: &Option<String>, have: &Option<String>| match (want, have) {
            (None, _) => true,
            (Some(want), Some(have)) => want.eq_ignore_ascii_case(have),
            (Some(_), None) => false,
        };

        let any_criteria = config.vendor_id.is_some()
            || config.product_id.is_some()
            || config.name_contains.is_some();

        any_criteria
            && id_matches(&config.vendor_id, &self.vendor)
            && id_matches(&config.product_id, &self.product)
            && config
                .name_contains
                .as_ref()
                .is_none_or(|needle| self.name.contains(needle.as_str()))
    }
}

/// Lists every `event*` entry of the input class in version order.
pub fn scan(config: &DeviceConfig) -> Result<Vec<InputDevice>> {
    let entries = fs::read_dir(&config.sysfs_dir)
        .with_context(|| format!("failed to read {}", config.sysfs_dir.display()))?;

    let mut nodes: Vec<(u32, String)> = Vec::new();
    for entry in entries {
        let entry = entry.context("failed to read input class entry")?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(number) = name.strip_prefix("event") {
            nodes.push((number.parse().unwrap_or(u32::MAX), name));
        }
    }
    nodes.sort();

    let devices = nodes
        .into_iter()
        .map(|(_, node)| {
            let info = config.sysfs_dir.join(&node).join("device");
            InputDevice {
                path: config.dev_dir.join(&node),
                name: read_attr(&info.join("name")).unwrap_or_else(|| "???".to_string()),
                vendor: read_attr(&info.join("id/vendor")),
                product: read_attr(&info.join("id/product")),
            }
        })
        .collect();
    Ok(devices)
}

fn read_attr(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|s| s.trim_end().to_string())
}

/// Resolves the event nodes to monitor.
///
/// Explicit paths win; otherwise the input class is scanned for matches.
pub fn discover(config: &DeviceConfig, max_sources: usize) -> Result<Vec<PathBuf>> {
    let paths: Vec<PathBuf> = if config.paths.is_empty() {
        let devices = scan(config)?;
        tracing::debug!(count = devices.len(), "available devices");
        devices
            .into_iter()
            .filter(|d| d.matches(config))
            .inspect(|d| {
                tracing::info!(path = %d.path.display(), id = %d.usb_id(), name = %d.name, "footpedal found");
            })
            .map(|d| d.path)
            .collect()
    } else {
        config.paths.clone()
    };

    if paths.is_empty() {
        bail!("can't find footpedal device");
    }
    if paths.len() > max_sources {
        bail!(
            "too many event devices: {} (at most {max_sources})",
            paths.len()
        );
    }
    Ok(paths)
}

/// Opens an event node non-blocking and grabs it so no other reader,
/// including the display server, sees its events.
pub fn open_grabbed(path: &Path) -> Result<RawDevice> {
    let file = OpenOptions::new()
        .read(true)
        .custom_flags(OFlag::O_NONBLOCK.bits())
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut device = RawDevice::from_fd(OwnedFd::from(file))
        .with_context(|| format!("{} is not an input event device", path.display()))?;
    device
        .grab()
        .with_context(|| format!("grab ioctl() on {} failed", path.display()))?;
    tracing::debug!(
        path = %path.display(),
        name = device.name().unwrap_or("???"),
        "grabbed"
    );
    Ok(device)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use tempfile::TempDir;

    /// Builds a fake input class directory.
    pub fn fake_sysfs(devices: &[(&str, &str, &str, &str)]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (node, name, vendor, product) in devices {
            let info = dir.path().join(node).join("device");
            fs::create_dir_all(info.join("id")).unwrap();
            fs::write(info.join("name"), format!("{name}\n")).unwrap();
            fs::write(info.join("id/vendor"), format!("{vendor}\n")).unwrap();
            fs::write(info.join("id/product"), format!("{product}\n")).unwrap();
        }
        // Non-event entries are ignored.
        fs::create_dir_all(dir.path().join("mouse0")).unwrap();
        dir
    }

    pub fn config_for(sysfs: &TempDir) -> DeviceConfig {
        DeviceConfig {
            sysfs_dir: sysfs.path().to_path_buf(),
            ..DeviceConfig::default()
        }
    }

    fn pedal_sysfs() -> TempDir {
        fake_sysfs(&[
            ("event10", "HID 1a86:e026 Consumer Control", "1a86", "e026"),
            ("event2", "AT Translated Set 2 keyboard", "0001", "0001"),
            ("event9", "HID 1a86:e026", "1a86", "e026"),
        ])
    }

    #[test]
    fn scan_sorts_numerically() {
        let sysfs = pedal_sysfs();
        let devices = scan(&config_for(&sysfs)).unwrap();
        let paths: Vec<_> = devices.iter().map(|d| d.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/dev/input/event2"),
                PathBuf::from("/dev/input/event9"),
                PathBuf::from("/dev/input/event10"),
            ]
        );
        assert_eq!(devices[1].name, "HID 1a86:e026");
        assert_eq!(devices[1].usb_id(), "1a86:e026");
    }

    #[test]
    fn discover_matches_vendor() {
        let sysfs = pedal_sysfs();
        let paths = discover(&config_for(&sysfs), 6).unwrap();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/dev/input/event9"),
                PathBuf::from("/dev/input/event10"),
            ]
        );
    }

    #[test]
    fn criteria_are_combined() {
        let sysfs = pedal_sysfs();
        let config = DeviceConfig {
            name_contains: Some("Consumer".to_string()),
            ..config_for(&sysfs)
        };
        let paths = discover(&config, 6).unwrap();
        assert_eq!(paths, vec![PathBuf::from("/dev/input/event10")]);

        let config = DeviceConfig {
            product_id: Some("E026".to_string()),
            ..config_for(&sysfs)
        };
        assert_eq!(discover(&config, 6).unwrap().len(), 2);
    }

    #[test]
    fn no_criteria_match_nothing() {
        let sysfs = pedal_sysfs();
        let config = DeviceConfig {
            vendor_id: None,
            ..config_for(&sysfs)
        };
        let err = discover(&config, 6).unwrap_err();
        assert_eq!(err.to_string(), "can't find footpedal device");
    }

    #[test]
    fn too_many_matches_is_fatal() {
        let sysfs = pedal_sysfs();
        let err = discover(&config_for(&sysfs), 1).unwrap_err();
        assert!(err.to_string().starts_with("too many event devices"));
    }

    #[test]
    fn explicit_paths_skip_scan() {
        let config = DeviceConfig {
            paths: vec![PathBuf::from("/dev/input/event42")],
            sysfs_dir: PathBuf::from("/nonexistent"),
            ..DeviceConfig::default()
        };
        assert_eq!(
            discover(&config, 6).unwrap(),
            vec![PathBuf::from("/dev/input/event42")]
        );
    }

    #[test]
    fn missing_sysfs_is_an_error() {
        let config = DeviceConfig {
            sysfs_dir: PathBuf::from("/nonexistent/input"),
            ..DeviceConfig::default()
        };
        assert!(scan(&config).is_err());
    }

    #[test]
    fn regular_file_is_not_an_event_device() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = open_grabbed(file.path()).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("{} is not an input event device", file.path().display())
        );
    }

    #[test]
    fn missing_node_fails_to_open() {
        let err = open_grabbed(Path::new("/nonexistent/event0")).unwrap_err();
        assert!(err.to_string().starts_with("failed to open"));
    }
}
