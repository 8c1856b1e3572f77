//! Input events as delivered by evdev nodes, reduced to what the engine needs.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use evdev::InputEvent;

/// Event timestamp truncated to millisecond resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp {
    pub sec: i64,
    pub msec: u32,
}

impl Timestamp {
    pub const fn new(sec: i64, msec: u32) -> Self {
        Self { sec, msec }
    }

    /// Splits milliseconds since the epoch into seconds and milliseconds.
    pub fn from_millis(millis: i64) -> Self {
        Self {
            sec: millis.div_euclid(1000),
            msec: u32::try_from(millis.rem_euclid(1000)).unwrap_or_default(),
        }
    }

    /// Converts a kernel event time, dropping sub-millisecond precision.
    pub fn from_system_time(time: SystemTime) -> Self {
        let millis = match time.duration_since(UNIX_EPOCH) {
            Ok(after) => i64::try_from(after.as_millis()).unwrap_or(i64::MAX),
            Err(before) => {
                i64::try_from(before.duration().as_millis()).map_or(i64::MIN, |ms| -ms)
            }
        };
        Self::from_millis(millis)
    }

    /// Milliseconds since the epoch.
    pub fn as_millis(self) -> i64 {
        self.sec
            .saturating_mul(1000)
            .saturating_add(i64::from(self.msec))
    }

    /// Signed milliseconds elapsed from `earlier` to `self`.
    pub fn millis_since(self, earlier: Self) -> i64 {
        self.as_millis().saturating_sub(earlier.as_millis())
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}", self.sec, self.msec)
    }
}

/// One input event with its time already truncated to milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: u16,
    pub code: u16,
    pub value: i32,
    pub timestamp: Timestamp,
}

impl RawEvent {
    pub const fn new(kind: u16, code: u16, value: i32, timestamp: Timestamp) -> Self {
        Self {
            kind,
            code,
            value,
            timestamp,
        }
    }
}

impl From<InputEvent> for RawEvent {
    fn from(event: InputEvent) -> Self {
        Self {
            kind: event.event_type().0,
            code: event.code(),
            value: event.value(),
            timestamp: Timestamp::from_system_time(event.timestamp()),
        }
    }
}
