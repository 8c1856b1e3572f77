//! Devices command for checking which event nodes would be monitored.

use std::io::Write;

use anyhow::Result;
use serde::Serialize;

use crate::config::DeviceConfig;
use crate::device::{self, InputDevice};

/// Device data for JSON output.
#[derive(Debug, Serialize)]
struct DeviceEntry {
    #[serde(flatten)]
    device: InputDevice,
    matched: bool,
}

pub fn run<W: Write>(writer: &mut W, config: &DeviceConfig, json: bool) -> Result<()> {
    let entries: Vec<DeviceEntry> = device::scan(config)?
        .into_iter()
        .map(|device| DeviceEntry {
            matched: device.matches(config),
            device,
        })
        .collect();

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&entries)?)?;
        return Ok(());
    }

    if entries.is_empty() {
        writeln!(writer, "No input event devices found.")?;
        return Ok(());
    }

    for entry in &entries {
        let marker = if entry.matched { '*' } else { ' ' };
        writeln!(
            writer,
            "{marker} {}  {}  {}",
            entry.device.path.display(),
            entry.device.usb_id(),
            entry.device.name
        )?;
    }
    Ok(())
}
