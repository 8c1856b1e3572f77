//! Activity log lifecycle.
//!
//! Each run starts a fresh log. A previous log is kept under a name derived
//! from its first record, e.g. `events-2021-11-07-14-03-12-045.log`.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use chrono::{Local, TimeZone};

/// Parses `<sec>.<msec>: DOWN` into its timestamp.
pub fn parse_down_line(line: &str) -> Option<(i64, u32)> {
    let (stamp, rest) = line.split_once(": ")?;
    if !rest.starts_with("DOWN") {
        return None;
    }
    let (sec, msec) = stamp.split_once('.')?;
    Some((sec.parse().ok()?, msec.parse().ok()?))
}

/// Archive file name for a log whose first record is at `sec.msec`, in local time.
pub fn archive_name(sec: i64, msec: u32) -> Result<String> {
    let when = Local
        .timestamp_opt(sec, 0)
        .single()
        .ok_or_else(|| anyhow!("log timestamp {sec} is out of range"))?;
    Ok(format!(
        "{}-{msec:03}.log",
        when.format("events-%Y-%m-%d-%H-%M-%S")
    ))
}

/// Saves any existing log at `path` and opens a new one in its place.
///
/// An empty old log is simply deleted. Returns the new log file and, if one
/// was kept, where the old log went.
pub fn open_with_rotation(path: &Path) -> Result<(File, Option<PathBuf>)> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let archived = match File::open(path) {
        Ok(old) => rotate(path, &dir, old)?,
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => return Err(e).with_context(|| format!("failed to open {}", path.display())),
    };

    fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok((file, archived))
}

fn rotate(path: &Path, dir: &Path, old: File) -> Result<Option<PathBuf>> {
    let len = old
        .metadata()
        .with_context(|| format!("failed to stat {}", path.display()))?
        .len();
    if len == 0 {
        tracing::debug!(path = %path.display(), "deleting empty old log");
        fs::remove_file(path).with_context(|| format!("failed to delete {}", path.display()))?;
        return Ok(None);
    }

    let mut first = String::new();
    BufReader::new(old)
        .read_line(&mut first)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let Some((sec, msec)) = parse_down_line(first.trim_end()) else {
        bail!(
            "can't understand log file format of {}; first line is: {:?}",
            path.display(),
            first.trim_end()
        );
    };

    let target = dir.join(archive_name(sec, msec)?);
    fs::rename(path, &target).with_context(|| {
        format!(
            "failed to rename {} to {}",
            path.display(),
            target.display()
        )
    })?;
    tracing::info!(from = %path.display(), to = %target.display(), "saved old log");
    Ok(Some(target))
}
