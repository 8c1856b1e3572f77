//! Run command: log pedal presses until killed.

use std::io::BufWriter;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use fl_core::{Monitor, Multiplexer, SequenceEngine};
use nix::unistd::Uid;

use crate::Config;
use crate::device;
use crate::logfile;

pub fn run(config: &Config) -> Result<()> {
    let engine_config = config.engine_config()?;

    if !Uid::effective().is_root() {
        bail!("footlog has to be run as root");
    }

    let (log, archived) = logfile::open_with_rotation(&config.log_file)?;
    if let Some(archived) = archived {
        tracing::debug!(path = %archived.display(), "previous log archived");
    }

    let paths = device::discover(&config.device, config.max_sources)?;
    let sources = paths
        .iter()
        .map(|path| device::open_grabbed(path))
        .collect::<Result<Vec<_>>>()?;
    let mux = Multiplexer::new(sources, config.max_sources)?;

    let engine = SequenceEngine::new(engine_config, BufWriter::new(log));
    let monitor = Monitor::new(mux, engine, Duration::from_millis(config.poll_pace_ms));

    match monitor.run().context("stopped monitoring footpedal")? {}
}
