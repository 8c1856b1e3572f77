//! Readiness multiplexing over a small fixed set of event sources.

use std::io;
use std::os::fd::AsFd;
use std::time::Duration;

use evdev::raw_stream::RawDevice;
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use thiserror::Error;

use crate::event::RawEvent;

/// Default upper bound on concurrently monitored sources.
pub const DEFAULT_MAX_SOURCES: usize = 6;

/// A pollable handle that yields whole input events.
pub trait EventSource: AsFd {
    /// Reads whatever events are pending without blocking.
    ///
    /// Nothing pending is reported as [`io::ErrorKind::WouldBlock`]; an empty
    /// batch means the source is gone.
    fn fetch(&mut self) -> io::Result<Vec<RawEvent>>;
}

impl EventSource for RawDevice {
    fn fetch(&mut self) -> io::Result<Vec<RawEvent>> {
        Ok(self.fetch_events()?.map(RawEvent::from).collect())
    }
}

/// Unrecoverable source-side failures.
#[derive(Debug, Error)]
pub enum MultiplexerError {
    #[error("no event sources to monitor")]
    NoSources,
    #[error("too many event sources: {count} (at most {max})")]
    TooManySources { count: usize, max: usize },
    #[error("poll failed: {0}")]
    Poll(#[source] Errno),
    #[error("error reading event source {index}: {source}")]
    Read {
        index: usize,
        #[source]
        source: io::Error,
    },
    #[error("event source {index} closed")]
    SourceClosed { index: usize },
}

/// Outcome of one [`Multiplexer::wait`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Indices of the sources that have data (or an error) pending.
    Ready(Vec<usize>),
    TimedOut,
}

/// Owns the monitored sources for the life of the process.
#[derive(Debug)]
pub struct Multiplexer<S> {
    sources: Vec<S>,
}

impl<S: EventSource> Multiplexer<S> {
    /// Takes ownership of `sources`, refusing an empty set or more than `max_sources`.
    pub fn new(sources: Vec<S>, max_sources: usize) -> Result<Self, MultiplexerError> {
        if sources.is_empty() {
            return Err(MultiplexerError::NoSources);
        }
        if sources.len() > max_sources {
            return Err(MultiplexerError::TooManySources {
                count: sources.len(),
                max: max_sources,
            });
        }
        Ok(Self { sources })
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Blocks until a source is readable or `deadline` elapses.
    ///
    /// `None` blocks indefinitely. Interrupted waits are restarted with the
    /// full deadline.
    pub fn wait(&self, deadline: Option<Duration>) -> Result<Readiness, MultiplexerError> {
        let timeout = deadline.map_or(PollTimeout::NONE, |d| {
            u32::try_from(d.as_millis())
                .ok()
                .and_then(|ms| PollTimeout::try_from(ms).ok())
                .unwrap_or(PollTimeout::MAX)
        });

        let mut fds: Vec<PollFd<'_>> = self
            .sources
            .iter()
            .map(|s| PollFd::new(s.as_fd(), PollFlags::POLLIN))
            .collect();

        let ready = loop {
            match poll(&mut fds, timeout) {
                Ok(n) => break n,
                Err(Errno::EINTR) => {
                    tracing::debug!("poll interrupted, retrying");
                }
                Err(e) => return Err(MultiplexerError::Poll(e)),
            }
        };

        if ready == 0 {
            return Ok(Readiness::TimedOut);
        }

        // Hangups and errors count as ready so the read surfaces them.
        let indices = fds
            .iter()
            .enumerate()
            .filter(|(_, fd)| fd.revents().is_some_and(|r| !r.is_empty()))
            .map(|(i, _)| i)
            .collect();
        Ok(Readiness::Ready(indices))
    }

    /// Reads whatever events source `index` has pending.
    pub fn read_batch(&mut self, index: usize) -> Result<Vec<RawEvent>, MultiplexerError> {
        let source = &mut self.sources[index];
        let events = loop {
            match source.fetch() {
                Ok(events) => break events,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    tracing::trace!(index, "spurious wakeup");
                    return Ok(Vec::new());
                }
                Err(err) => return Err(MultiplexerError::Read { index, source: err }),
            }
        };

        if events.is_empty() {
            return Err(MultiplexerError::SourceClosed { index });
        }
        tracing::trace!(index, count = events.len(), "read events");
        Ok(events)
    }
}
