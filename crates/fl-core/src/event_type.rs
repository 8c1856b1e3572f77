//! Event type classification and symbolic naming.
//!
//! Code names come from evdev's tables, which mirror
//! `linux/input-event-codes.h`. Types and codes evdev does not know render
//! as [`UNKNOWN`], so rendering never fails.

use std::fmt;
use std::str::FromStr;

use evdev::{
    AbsoluteAxisCode, EventType, KeyCode, LedCode, MiscCode, RelativeAxisCode, SwitchCode,
    SynchronizationCode,
};
use thiserror::Error;

use crate::event::RawEvent;

pub const EV_SYN: u16 = EventType::SYNCHRONIZATION.0;
pub const EV_KEY: u16 = EventType::KEY.0;
pub const EV_MSC: u16 = EventType::MISC.0;

/// Placeholder rendered for unrecognized types and codes.
pub const UNKNOWN: &str = "?";

/// Kernel names of the event types, as written in the activity log.
const TYPE_NAMES: &[(EventType, &str)] = &[
    (EventType::SYNCHRONIZATION, "EV_SYN"),
    (EventType::KEY, "EV_KEY"),
    (EventType::RELATIVE, "EV_REL"),
    (EventType::ABSOLUTE, "EV_ABS"),
    (EventType::MISC, "EV_MSC"),
    (EventType::SWITCH, "EV_SW"),
    (EventType::LED, "EV_LED"),
    (EventType::SOUND, "EV_SND"),
    (EventType::REPEAT, "EV_REP"),
    (EventType::FORCEFEEDBACK, "EV_FF"),
    (EventType::POWER, "EV_PWR"),
    (EventType::FORCEFEEDBACKSTATUS, "EV_FF_STATUS"),
];

/// Symbolic name of an event type.
pub fn type_name(kind: u16) -> &'static str {
    TYPE_NAMES
        .iter()
        .find(|(ty, _)| ty.0 == kind)
        .map_or(UNKNOWN, |&(_, name)| name)
}

/// evdev prints unknown codes as a sentence, so a name only counts if it
/// parses back.
fn known<T: fmt::Debug + FromStr>(code: T) -> Option<String> {
    let name = format!("{code:?}");
    name.parse::<T>().is_ok().then_some(name)
}

/// Symbolic name of a code within its type's namespace.
pub fn code_name(kind: u16, code: u16) -> String {
    let name = match EventType(kind) {
        EventType::SYNCHRONIZATION => known(SynchronizationCode(code)),
        EventType::KEY => known(KeyCode::new(code)),
        EventType::RELATIVE => known(RelativeAxisCode(code)),
        EventType::ABSOLUTE => known(AbsoluteAxisCode(code)),
        EventType::MISC => known(MiscCode(code)),
        EventType::SWITCH => known(SwitchCode(code)),
        EventType::LED => known(LedCode(code)),
        _ => None,
    };
    name.unwrap_or_else(|| UNKNOWN.to_string())
}

/// Resolves a key name such as `KEY_1`, `KEY_F5` or `BTN_LEFT`.
pub fn parse_key(name: &str) -> Result<KeyCode, UnknownKey> {
    name.parse().map_err(|_| UnknownKey(name.to_string()))
}

/// Error for names evdev does not recognize as a key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown key name: {0}")]
pub struct UnknownKey(String);

/// How the sequence engine treats an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
    /// Frame boundary (`EV_SYN`). Counted, otherwise ignored.
    Structural,
    /// The tracked key. Drives session timing.
    Tracked,
    /// Any other `EV_KEY` event.
    OtherKey,
    /// Scan codes and every remaining type.
    Auxiliary,
}

impl EventClass {
    pub const fn of(event: &RawEvent, tracked: KeyCode) -> Self {
        match EventType(event.kind) {
            EventType::SYNCHRONIZATION => Self::Structural,
            EventType::KEY if event.code == tracked.code() => Self::Tracked,
            EventType::KEY => Self::OtherKey,
            _ => Self::Auxiliary,
        }
    }
}
