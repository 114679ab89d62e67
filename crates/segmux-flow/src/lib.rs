//! Segmux-Flow: runs a segment controller on a dedicated worker thread.
//!
//! - [`DropOldestQueue`]: bounded, non-blocking input queue
//! - [`RecorderWorker`]: owns the worker thread and the controller
//! - [`RecorderHandle`]: cloneable producer/control handle

pub mod queue;
pub mod worker;

pub use queue::{DropOldestQueue, DEFAULT_AUDIO_CAPACITY, DEFAULT_VIDEO_CAPACITY};
pub use worker::{RecorderHandle, RecorderWorker, WorkerOptions};
