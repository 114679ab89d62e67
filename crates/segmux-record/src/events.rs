//! Recorder lifecycle events.
//!
//! The controller reports every file and stream transition as a
//! [`MuxerEvent`] to a single injected [`EventObserver`], synchronously on
//! the worker thread. Two reusable observers are provided: [`EventLog`]
//! keeps a bounded history and [`BroadcastObserver`] fans events out to any
//! number of async subscribers.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;

use segmux_common::MediaKind;

/// Default number of events retained by an [`EventLog`].
pub const DEFAULT_LOG_CAPACITY: usize = 100;

// ---------------------------------------------------------------------------
// MuxerEvent
// ---------------------------------------------------------------------------

/// What a failed write was aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteTarget {
    Header,
    Track(MediaKind),
}

impl WriteTarget {
    /// Numeric code: 0 for the header, the track code otherwise.
    pub fn code(self) -> i64 {
        match self {
            Self::Header => 0,
            Self::Track(kind) => kind.track_code(),
        }
    }
}

/// A lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MuxerEvent {
    /// A session opened a new file.
    FileBegin { path: String, duration_secs: i64 },
    /// A session finalized its file.
    FileEnd { path: String, duration_secs: i64 },
    /// Streaming was switched on.
    StreamStart,
    /// Streaming was switched off, by command or after a failure.
    StreamStop,
    /// The backend rejected a track.
    ErrCreateTrack { path: String, kind: MediaKind },
    /// A header or frame write failed.
    ErrWriteFile { path: String, target: WriteTarget },
}

/// Discriminant of a [`MuxerEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    FileBegin,
    FileEnd,
    StreamStart,
    StreamStop,
    ErrCreateTrack,
    ErrWriteFile,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FileBegin => "file_begin",
            Self::FileEnd => "file_end",
            Self::StreamStart => "stream_start",
            Self::StreamStop => "stream_stop",
            Self::ErrCreateTrack => "err_create_track",
            Self::ErrWriteFile => "err_write_file",
        };
        f.write_str(name)
    }
}

impl MuxerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::FileBegin { .. } => EventKind::FileBegin,
            Self::FileEnd { .. } => EventKind::FileEnd,
            Self::StreamStart => EventKind::StreamStart,
            Self::StreamStop => EventKind::StreamStop,
            Self::ErrCreateTrack { .. } => EventKind::ErrCreateTrack,
            Self::ErrWriteFile { .. } => EventKind::ErrWriteFile,
        }
    }

    /// The file the event refers to; empty for stream transitions.
    pub fn path(&self) -> &str {
        match self {
            Self::FileBegin { path, .. }
            | Self::FileEnd { path, .. }
            | Self::ErrCreateTrack { path, .. }
            | Self::ErrWriteFile { path, .. } => path,
            Self::StreamStart | Self::StreamStop => "",
        }
    }

    /// The numeric value carried alongside the event.
    ///
    /// File events carry the configured segment duration, track errors the
    /// track code, and header errors zero.
    pub fn value(&self) -> i64 {
        match self {
            Self::FileBegin { duration_secs, .. } | Self::FileEnd { duration_secs, .. } => {
                *duration_secs
            }
            Self::ErrCreateTrack { kind, .. } => kind.track_code(),
            Self::ErrWriteFile { target, .. } => target.code(),
            Self::StreamStart | Self::StreamStop => 0,
        }
    }
}

impl fmt::Display for MuxerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} path='{}' value={}", self.kind(), self.path(), self.value())
    }
}

// ---------------------------------------------------------------------------
// Observers
// ---------------------------------------------------------------------------

/// Receives events on the worker thread.
pub trait EventObserver: Send {
    fn on_event(&mut self, event: &MuxerEvent);
}

impl<F> EventObserver for F
where
    F: FnMut(&MuxerEvent) + Send,
{
    fn on_event(&mut self, event: &MuxerEvent) {
        self(event)
    }
}

/// An event together with the time it was observed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedEvent {
    pub timestamp: DateTime<Utc>,
    pub event: MuxerEvent,
}

/// Bounded, shareable history of events (oldest first).
///
/// Clones share the same history, so one clone can be handed to the
/// controller while another is inspected.
#[derive(Debug, Clone)]
pub struct EventLog {
    capacity: usize,
    recent: Arc<RwLock<VecDeque<RecordedEvent>>>,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            recent: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
        }
    }

    pub fn record(&self, event: MuxerEvent) {
        let mut recent = self.recent.write();
        if recent.len() >= self.capacity {
            recent.pop_front();
        }
        recent.push_back(RecordedEvent {
            timestamp: Utc::now(),
            event,
        });
    }

    /// All retained events, oldest first.
    pub fn entries(&self) -> Vec<RecordedEvent> {
        self.recent.read().iter().cloned().collect()
    }

    /// All retained events without timestamps, oldest first.
    pub fn events(&self) -> Vec<MuxerEvent> {
        self.recent.read().iter().map(|r| r.event.clone()).collect()
    }

    /// Number of retained events of `kind`.
    pub fn count(&self, kind: EventKind) -> usize {
        self.recent
            .read()
            .iter()
            .filter(|r| r.event.kind() == kind)
            .count()
    }

    pub fn len(&self) -> usize {
        self.recent.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.read().is_empty()
    }

    pub fn clear(&self) {
        self.recent.write().clear();
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl EventObserver for EventLog {
    fn on_event(&mut self, event: &MuxerEvent) {
        self.record(event.clone());
    }
}

/// Forwards events to every subscriber of a broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastObserver {
    tx: broadcast::Sender<MuxerEvent>,
}

impl BroadcastObserver {
    /// `capacity` bounds how far a slow subscriber may lag.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MuxerEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastObserver {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventObserver for BroadcastObserver {
    fn on_event(&mut self, event: &MuxerEvent) {
        // No subscribers is not an error.
        let _ = self.tx.send(event.clone());
    }
}

// ---------------------------------------------------------------------------
// EventSink
// ---------------------------------------------------------------------------

/// The controller's optional observer slot.
#[derive(Default)]
pub struct EventSink {
    observer: Option<Box<dyn EventObserver>>,
}

impl EventSink {
    pub fn new(observer: Option<Box<dyn EventObserver>>) -> Self {
        Self { observer }
    }

    /// Replace the observer. `None` unregisters it.
    pub fn set(&mut self, observer: Option<Box<dyn EventObserver>>) {
        self.observer = observer;
    }

    pub fn is_registered(&self) -> bool {
        self.observer.is_some()
    }

    /// Deliver an event. Without an observer the event is only logged.
    pub fn emit(&mut self, event: MuxerEvent) {
        tracing::debug!(kind = %event.kind(), path = event.path(), value = event.value(), "Muxer event");
        if let Some(observer) = self.observer.as_mut() {
            observer.on_event(&event);
        }
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("registered", &self.is_registered())
            .finish()
    }
}
