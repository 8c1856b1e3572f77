//! Sequence engine: turns classified events and timeouts into session records.

use std::io::{self, Write};
use std::time::Duration;

use evdev::KeyCode;

use crate::event::RawEvent;
use crate::event_type::{EventClass, code_name, type_name};
use crate::session::{Session, SessionRecord};

/// Timing parameters for session detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Inactivity gap that ends a session. Default: 1000 ms.
    pub gap_threshold_ms: u64,
    /// Sessions no longer than this are dropped as noise. Default: 10 ms.
    pub runt_threshold_ms: u64,
    /// The key whose repeats make up a session. Default: `KEY_1`.
    pub tracked_key: KeyCode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gap_threshold_ms: 1000,
            runt_threshold_ms: 10,
            tracked_key: KeyCode::KEY_1,
        }
    }
}

impl EngineConfig {
    fn gap_threshold(&self) -> i64 {
        i64::try_from(self.gap_threshold_ms).unwrap_or(i64::MAX)
    }

    fn runt_threshold(&self) -> i64 {
        i64::try_from(self.runt_threshold_ms).unwrap_or(i64::MAX)
    }
}

/// Owns the current session and the log sink it is written to.
///
/// The sink is flushed after every record, so a tailing reader sees each
/// session as soon as it closes.
#[derive(Debug)]
pub struct SequenceEngine<W> {
    config: EngineConfig,
    session: Session,
    sink: W,
}

impl<W: Write> SequenceEngine<W> {
    pub fn new(config: EngineConfig, sink: W) -> Self {
        Self {
            config,
            session: Session::default(),
            sink,
        }
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub const fn session(&self) -> &Session {
        &self.session
    }

    pub const fn sink(&self) -> &W {
        &self.sink
    }

    pub fn into_sink(self) -> W {
        self.sink
    }

    /// How long the multiplexer may block.
    ///
    /// An open session needs a timely close even if the pedal goes silent;
    /// an idle engine can wait forever.
    pub fn deadline(&self) -> Option<Duration> {
        self.session
            .is_open()
            .then(|| Duration::from_millis(self.config.gap_threshold_ms))
    }

    /// Closes the open session after the multiplexer waited a full gap.
    pub fn on_timeout(&mut self) -> io::Result<Option<SessionRecord>> {
        if !self.session.is_open() {
            return Ok(None);
        }
        self.close(self.config.gap_threshold())
    }

    /// Feeds one event. Returns the record if this event closed a logged session.
    pub fn on_event(&mut self, event: &RawEvent) -> io::Result<Option<SessionRecord>> {
        let class = EventClass::of(event, self.config.tracked_key);
        let gap = self.session.gap_at(event.timestamp);

        tracing::debug!(
            at = %event.timestamp,
            kind = type_name(event.kind),
            code = %code_name(event.kind, event.code),
            value = event.value,
            gap,
            "event"
        );

        // Close before counting so this event belongs to the next session.
        let closed = if self.session.is_open() && gap >= self.config.gap_threshold() {
            self.close(gap)?
        } else {
            None
        };

        self.session.count_event(event.kind);

        match class {
            EventClass::Tracked => self.session.record_tracked(event.timestamp),
            EventClass::Structural | EventClass::OtherKey | EventClass::Auxiliary => {}
        }

        Ok(closed)
    }

    /// Emits the session unless it is a runt, then resets it.
    fn close(&mut self, gap_ms: i64) -> io::Result<Option<SessionRecord>> {
        let session = std::mem::take(&mut self.session);
        let Some(record) = session.to_record(gap_ms) else {
            return Ok(None);
        };

        if record.duration_ms <= self.config.runt_threshold() {
            tracing::debug!(seqlen = record.duration_ms, "runt ignored");
            return Ok(None);
        }

        write!(self.sink, "{record}")?;
        self.sink.flush()?;
        tracing::debug!(
            down = %record.first_seen,
            seqlen = record.duration_ms,
            key1count = record.tracked_count,
            gap = record.gap_ms,
            "session logged"
        );
        Ok(Some(record))
    }
}
