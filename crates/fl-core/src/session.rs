//! The single in-progress pedal session and its rendered log record.

use std::collections::BTreeMap;
use std::fmt;

use crate::event::Timestamp;
use crate::event_type::type_name;

/// Aggregate state for a run of tracked-key events.
///
/// A session is open iff `first_seen` is set. Counters and `last_seen` are
/// only meaningful while open, except that events arriving while idle are
/// still counted and end up attributed to the next session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    first_seen: Option<Timestamp>,
    last_seen: Option<Timestamp>,
    tracked_count: u64,
    counts: BTreeMap<u16, u64>,
}

impl Session {
    pub const fn is_open(&self) -> bool {
        self.first_seen.is_some()
    }

    pub const fn first_seen(&self) -> Option<Timestamp> {
        self.first_seen
    }

    pub const fn last_seen(&self) -> Option<Timestamp> {
        self.last_seen
    }

    pub const fn tracked_count(&self) -> u64 {
        self.tracked_count
    }

    /// Events of type `kind` counted so far.
    pub fn count(&self, kind: u16) -> u64 {
        self.counts.get(&kind).copied().unwrap_or_default()
    }

    /// Milliseconds from the last tracked event to `now`.
    ///
    /// Zero when no tracked event has been seen. A clock that runs
    /// backwards also yields zero rather than a negative gap.
    pub fn gap_at(&self, now: Timestamp) -> i64 {
        self.last_seen
            .map_or(0, |last| now.millis_since(last).max(0))
    }

    /// Milliseconds between the first and last tracked events, never negative.
    pub fn duration_ms(&self) -> i64 {
        match (self.first_seen, self.last_seen) {
            (Some(first), Some(last)) => last.millis_since(first).max(0),
            _ => 0,
        }
    }

    pub(crate) fn count_event(&mut self, kind: u16) {
        *self.counts.entry(kind).or_default() += 1;
    }

    /// Opens the session on its first tracked event, otherwise advances `last_seen`.
    pub(crate) const fn record_tracked(&mut self, at: Timestamp) {
        self.tracked_count += 1;
        if self.first_seen.is_none() {
            self.first_seen = Some(at);
        }
        self.last_seen = Some(at);
    }

    /// Snapshot of a closed session for logging.
    ///
    /// Returns `None` if the session never opened.
    pub(crate) fn to_record(&self, gap_ms: i64) -> Option<SessionRecord> {
        let first_seen = self.first_seen?;
        let last_seen = self.last_seen.unwrap_or(first_seen);
        Some(SessionRecord {
            first_seen,
            last_seen,
            duration_ms: self.duration_ms(),
            tracked_count: self.tracked_count,
            gap_ms,
            counts: self
                .counts
                .iter()
                .filter(|(_, n)| **n > 0)
                .map(|(kind, n)| (*kind, *n))
                .collect(),
        })
    }
}

/// A completed session as written to the activity log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub first_seen: Timestamp,
    pub last_seen: Timestamp,
    pub duration_ms: i64,
    pub tracked_count: u64,
    /// Gap that ended the session.
    pub gap_ms: i64,
    /// Non-zero per-type counts in ascending type order.
    pub counts: Vec<(u16, u64)>,
}

impl fmt::Display for SessionRecord {
    /// Renders the `DOWN`/`UP` line pair, each line newline-terminated.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: DOWN", self.first_seen)?;
        write!(
            f,
            "{}: UP  seqlen = {} ms  key1count = {}  gap = {} ms  evcounts:  ",
            self.last_seen, self.duration_ms, self.tracked_count, self.gap_ms
        )?;
        for (kind, n) in &self.counts {
            write!(f, "{} = {n}  ", type_name(*kind))?;
        }
        writeln!(f)
    }
}
