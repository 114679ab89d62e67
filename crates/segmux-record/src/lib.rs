//! Segmux-Record: time-segmented recording control.
//!
//! This crate holds the state machines of the recorder:
//!
//! - **[`SegmentController`]**: rotation and naming policy, streaming state,
//!   and the single active session
//! - **[`RecordingSession`]**: one open container, lazy track and header
//!   creation, write forwarding, finalize
//! - **Backends**: the [`MuxerBackend`]/[`Container`] seam, a name-indexed
//!   [`BackendRegistry`] and the in-process [`MemoryBackend`]
//! - **Events**: [`MuxerEvent`] and its observers
//!
//! # Example
//!
//! ```
//! use segmux_common::Buffer;
//! use segmux_record::{BackendRegistry, EventKind, EventLog, SegmentController};
//!
//! let log = EventLog::default();
//! let mut controller = SegmentController::configure(
//!     "name=memory;path=/rec;file_prefix=cam;file_index=1|type=video;codec=h264",
//!     &BackendRegistry::with_builtin(),
//! )
//! .unwrap()
//! .with_observer(log.clone());
//!
//! let idr = vec![0, 0, 0, 1, 0x67, 0x42, 0, 0, 0, 1, 0x68, 0xCE, 0, 0, 0, 1, 0x65, 0x88];
//! controller.ingest(Some(Buffer::video(idr, 0, true)), None);
//! assert_eq!(controller.session_path(), Some("/rec/cam_1.mp4"));
//! assert_eq!(log.count(EventKind::FileBegin), 1);
//! ```

pub mod backend;
pub mod command;
pub mod config;
pub mod controller;
pub mod events;
pub mod memory;
pub mod naming;
pub mod session;

pub use backend::{BackendRegistry, ByteSink, Container, IoTarget, MuxerBackend, OpenRequest, TrackHandle};
pub use command::ControlCommand;
pub use config::{IoMode, MuxerConfig, TrackFailurePolicy};
pub use controller::{ControllerStats, SegmentController, StreamingStatus};
pub use events::{
    BroadcastObserver, EventKind, EventLog, EventObserver, EventSink, MuxerEvent, RecordedEvent,
    WriteTarget,
};
pub use memory::{Faults, MemoryBackend, MemoryFile, MemoryOp};
pub use naming::{FileNamer, FileNaming, FILE_EXTENSION};
pub use session::{RecordingSession, SessionOptions, SessionState, WriteOutcome};
