//! The control loop tying the multiplexer to the sequence engine.

use std::convert::Infallible;
use std::io::{self, Write};
use std::time::Duration;

use thiserror::Error;

use crate::engine::SequenceEngine;
use crate::event::RawEvent;
use crate::multiplexer::{EventSource, Multiplexer, MultiplexerError, Readiness};
use crate::session::SessionRecord;

/// Fatal monitoring failures. The caller is expected to exit.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Source(#[from] MultiplexerError),
    #[error("failed to write activity log: {0}")]
    Sink(#[source] io::Error),
}

/// What one [`Monitor::step`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// The wait timed out with a session open.
    TimedOut { logged: Option<SessionRecord> },
    /// Events were read and processed.
    Events {
        count: usize,
        logged: Vec<SessionRecord>,
    },
}

#[derive(Debug)]
pub struct Monitor<S, W> {
    mux: Multiplexer<S>,
    engine: SequenceEngine<W>,
    pace: Duration,
}

impl<S: EventSource, W: Write> Monitor<S, W> {
    pub const fn new(mux: Multiplexer<S>, engine: SequenceEngine<W>, pace: Duration) -> Self {
        Self { mux, engine, pace }
    }

    pub const fn engine(&self) -> &SequenceEngine<W> {
        &self.engine
    }

    /// Runs until a fatal error. There is no graceful stop; a session open
    /// when the process is killed is lost.
    pub fn run(mut self) -> Result<Infallible, MonitorError> {
        tracing::info!(
            sources = self.mux.len(),
            gap_ms = self.engine.config().gap_threshold_ms,
            tracked = ?self.engine.config().tracked_key,
            "monitoring"
        );
        loop {
            if let Step::Events { .. } = self.step()? {
                // Bounds CPU use when sources are ready back to back.
                std::thread::sleep(self.pace);
            }
        }
    }

    /// One wait plus processing of everything it yielded.
    pub fn step(&mut self) -> Result<Step, MonitorError> {
        match self.mux.wait(self.engine.deadline())? {
            Readiness::TimedOut => {
                let logged = self.engine.on_timeout().map_err(MonitorError::Sink)?;
                Ok(Step::TimedOut { logged })
            }
            Readiness::Ready(indices) => {
                let mut batches = Vec::with_capacity(indices.len());
                for index in indices {
                    batches.push(self.mux.read_batch(index)?);
                }
                let events = merge_batches(batches);

                let mut logged = Vec::new();
                for event in &events {
                    if let Some(record) = self.engine.on_event(event).map_err(MonitorError::Sink)? {
                        logged.push(record);
                    }
                }
                Ok(Step::Events {
                    count: events.len(),
                    logged,
                })
            }
        }
    }
}

/// Merges per-source batches into one stream ordered by timestamp.
///
/// Each batch keeps its own read order; ties go to the lower source index.
pub fn merge_batches(batches: Vec<Vec<RawEvent>>) -> Vec<RawEvent> {
    if batches.len() <= 1 {
        return batches.into_iter().flatten().collect();
    }

    let total: usize = batches.iter().map(Vec::len).sum();
    let mut merged = Vec::with_capacity(total);
    let mut cursors = vec![0usize; batches.len()];

    while merged.len() < total {
        let next = batches
            .iter()
            .zip(&cursors)
            .enumerate()
            .filter_map(|(i, (batch, &pos))| batch.get(pos).map(|e| (i, e.timestamp)))
            .min_by_key(|&(i, ts)| (ts, i));
        let Some((i, _)) = next else { break };
        merged.push(batches[i][cursors[i]]);
        cursors[i] += 1;
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::engine::EngineConfig;
    use crate::event::Timestamp;
    use crate::event_type::{EV_KEY, EV_SYN};
    use crate::multiplexer::DEFAULT_MAX_SOURCES;
    use crate::multiplexer::fake::{FakeSource, Feed, pair};

    fn at(ms: i64) -> Timestamp {
        Timestamp::from_millis(1_636_300_000_000 + ms)
    }

    fn key(ms: i64) -> RawEvent {
        RawEvent::new(EV_KEY, 2, 1, at(ms))
    }

    fn syn(ms: i64) -> RawEvent {
        RawEvent::new(EV_SYN, 0, 0, at(ms))
    }

    fn config() -> EngineConfig {
        EngineConfig {
            gap_threshold_ms: 50,
            ..EngineConfig::default()
        }
    }

    fn monitor_with<W: Write>(count: usize, sink: W) -> (Vec<Feed>, Monitor<FakeSource, W>) {
        let (feeds, sources): (Vec<_>, Vec<_>) = (0..count).map(|_| pair()).unzip();
        let mux = Multiplexer::new(sources, DEFAULT_MAX_SOURCES).unwrap();
        let engine = SequenceEngine::new(config(), sink);
        (feeds, Monitor::new(mux, engine, Duration::ZERO))
    }

    fn monitor(count: usize) -> (Vec<Feed>, Monitor<FakeSource, Vec<u8>>) {
        monitor_with(count, Vec::new())
    }

    /// A log device that refuses every write.
    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("no space left on device"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn merge_preserves_source_order_and_sorts_across_sources() {
        let a = vec![key(0), syn(0), key(2000)];
        let b = vec![key(1000), syn(1000)];
        let merged = merge_batches(vec![a, b]);
        assert_eq!(
            merged,
            vec![key(0), syn(0), key(1000), syn(1000), key(2000)]
        );
    }

    #[test]
    fn merge_single_batch_is_untouched() {
        let a = vec![key(20), key(10)];
        assert_eq!(merge_batches(vec![a.clone()]), a);
    }

    #[test]
    fn step_processes_events_then_times_out() {
        let (mut feeds, mut monitor) = monitor(1);
        feeds[0].send(&[key(0), syn(0), key(30), syn(30)]);

        let step = monitor.step().unwrap();
        assert_eq!(
            step,
            Step::Events {
                count: 4,
                logged: Vec::new()
            }
        );
        assert!(monitor.engine().session().is_open());

        let Step::TimedOut { logged: Some(record) } = monitor.step().unwrap() else {
            panic!("expected timeout to log the session");
        };
        assert_eq!(record.duration_ms, 30);
        assert_eq!(record.gap_ms, 50);
        assert_eq!(record.tracked_count, 2);
        assert!(!monitor.engine().session().is_open());
    }

    #[test]
    fn sources_closing_is_fatal() {
        let (feeds, mut monitor) = monitor(2);
        drop(feeds);
        assert!(matches!(
            monitor.step(),
            Err(MonitorError::Source(MultiplexerError::SourceClosed { .. }))
        ));
    }

    #[test]
    fn log_write_failure_is_fatal() {
        let (mut feeds, mut monitor) = monitor_with(1, FullDisk);
        feeds[0].send(&[key(0), key(30)]);
        monitor.step().unwrap();

        let err = monitor.step().unwrap_err();
        assert!(matches!(err, MonitorError::Sink(_)));
        assert!(err.to_string().starts_with("failed to write activity log"));
    }

    #[test]
    fn interleaved_sources_match_merged_stream() {
        // The first source alone has 60 ms holes, wider than the 50 ms gap.
        // The second source fills them, so the merged stream is one session.
        let first = [key(0), key(60), key(120)];
        let second = [key(30), key(90)];

        let (mut feeds, mut monitor) = monitor(2);
        feeds[0].send(&first);
        feeds[1].send(&second);

        // Both sources are pending, so one wakeup sees all five events.
        let Step::Events { count, logged } = monitor.step().unwrap() else {
            panic!("expected both sources to be ready");
        };
        assert_eq!(count, first.len() + second.len());
        assert!(logged.is_empty());

        let Step::TimedOut { logged: Some(split) } = monitor.step().unwrap() else {
            panic!("expected a logged session");
        };

        let mut merged: Vec<RawEvent> = first.iter().chain(&second).copied().collect();
        merged.sort_by_key(|e| e.timestamp);
        let mut reference = SequenceEngine::new(config(), Vec::new());
        for event in &merged {
            reference.on_event(event).unwrap();
        }
        let whole = reference.on_timeout().unwrap().unwrap();

        assert_eq!(split, whole);
        assert_eq!(split.duration_ms, 120);
        assert_eq!(split.tracked_count, 5);
    }
}
