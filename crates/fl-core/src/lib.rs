//! Core event aggregation for the foot pedal activity logger.
//!
//! This crate contains:
//! - Input events reduced to [`RawEvent`] with millisecond timestamps
//! - Classification and evdev-backed naming of event types and codes
//! - The sequence engine: coalescing tracked-key bursts into sessions
//! - The multiplexer and monitor loop driving the engine from event sources

pub mod engine;
pub mod event;
pub mod event_type;
pub mod monitor;
pub mod multiplexer;
pub mod session;

pub use engine::{EngineConfig, SequenceEngine};
pub use event::{RawEvent, Timestamp};
pub use event_type::{EventClass, UnknownKey, code_name, parse_key, type_name};
pub use monitor::{Monitor, MonitorError, Step, merge_batches};
pub use multiplexer::{
    DEFAULT_MAX_SOURCES, EventSource, Multiplexer, MultiplexerError, Readiness,
};
pub use session::{Session, SessionRecord};
