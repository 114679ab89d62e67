//! In-process muxer backend.
//!
//! [`MemoryBackend`] records every container operation instead of producing a
//! real file, which makes it the backend of choice for simulation and tests.
//! Clones share state, so a caller can register one clone and inspect the
//! other. Failures can be injected per operation through [`Faults`].
//!
//! In callback mode the header and every frame payload are pushed through
//! the sink, so callback consumers see real byte ranges.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use segmux_common::{Buffer, Error, MediaKind, Result, TrackConfig};

use crate::backend::{ByteSink, Container, IoTarget, MuxerBackend, OpenRequest, TrackHandle};

/// Magic prefix of the header bytes emitted in callback mode.
pub const HEADER_MAGIC: &[u8; 4] = b"SMUX";

/// One recorded container operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryOp {
    Open {
        path: String,
        callback: bool,
    },
    AddTrack {
        path: String,
        kind: MediaKind,
        handle: TrackHandle,
        extradata_len: usize,
    },
    WriteHeader {
        path: String,
    },
    WriteFrame {
        path: String,
        kind: MediaKind,
        timestamp_us: i64,
        len: usize,
        keyframe: bool,
        eos: bool,
    },
    Finalize {
        path: String,
    },
}

/// Injected failures. They stay active until cleared.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// Fail every `open`.
    pub open: bool,
    /// Fail `add_track` for these kinds.
    pub add_track: Vec<MediaKind>,
    /// Fail every `write_header`.
    pub header: bool,
    /// Fail frame writes on a kind once this many have succeeded.
    pub write: Option<(MediaKind, u64)>,
}

/// Summary of one container opened through the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemoryFile {
    pub path: String,
    pub callback: bool,
    pub tracks: Vec<MediaKind>,
    pub header_written: bool,
    pub video_frames: Vec<i64>,
    pub audio_frames: Vec<i64>,
    pub eos_written: bool,
    pub finalized: bool,
    pub bytes_emitted: usize,
}

#[derive(Debug, Default)]
struct MemoryState {
    ops: Vec<MemoryOp>,
    files: Vec<MemoryFile>,
    faults: Faults,
    successful_writes: HashMap<MediaKind, u64>,
}

/// Backend that keeps everything in memory.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    name: String,
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// A backend registered as `memory`.
    pub fn new() -> Self {
        Self::named("memory")
    }

    /// A backend registered under a custom name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    /// Replace the active fault set.
    pub fn set_faults(&self, faults: Faults) {
        self.state.lock().faults = faults;
    }

    /// Update the active fault set in place.
    pub fn update_faults(&self, f: impl FnOnce(&mut Faults)) {
        f(&mut self.state.lock().faults);
    }

    pub fn clear_faults(&self) {
        self.set_faults(Faults::default());
    }

    /// Every operation recorded so far, in order.
    pub fn ops(&self) -> Vec<MemoryOp> {
        self.state.lock().ops.clone()
    }

    /// Every container opened so far, in order.
    pub fn files(&self) -> Vec<MemoryFile> {
        self.state.lock().files.clone()
    }

    /// Number of headers written across all containers.
    pub fn header_count(&self) -> usize {
        self.state
            .lock()
            .ops
            .iter()
            .filter(|op| matches!(op, MemoryOp::WriteHeader { .. }))
            .count()
    }
}

impl MuxerBackend for MemoryBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self, request: OpenRequest<'_>) -> Result<Box<dyn Container>> {
        let mut state = self.state.lock();
        if state.faults.open {
            return Err(Error::open_session(request.path, "injected open failure"));
        }

        let callback = request.io.is_callback();
        state.ops.push(MemoryOp::Open {
            path: request.path.to_string(),
            callback,
        });
        state.files.push(MemoryFile {
            path: request.path.to_string(),
            callback,
            ..MemoryFile::default()
        });

        let sink = match request.io {
            IoTarget::File => None,
            IoTarget::Callback(sink) => Some(sink),
        };
        Ok(Box::new(MemoryContainer {
            state: Arc::clone(&self.state),
            file: state.files.len() - 1,
            path: request.path.to_string(),
            tracks: Vec::new(),
            sink,
        }))
    }
}

struct MemoryContainer {
    state: Arc<Mutex<MemoryState>>,
    file: usize,
    path: String,
    tracks: Vec<MediaKind>,
    sink: Option<ByteSink>,
}

impl MemoryContainer {
    /// Push bytes through the sink (callback mode only), outside the state lock.
    fn emit(&self, bytes: &[u8]) {
        if let Some(sink) = &self.sink {
            sink(bytes);
            self.state.lock().files[self.file].bytes_emitted += bytes.len();
        }
    }
}

impl Container for MemoryContainer {
    fn add_track(&mut self, config: &TrackConfig, extradata: Option<&Bytes>) -> Result<TrackHandle> {
        let mut state = self.state.lock();
        if state.faults.add_track.contains(&config.kind) {
            return Err(Error::track_create(config.kind, "injected track failure"));
        }
        let handle = TrackHandle(self.tracks.len() as u32);
        self.tracks.push(config.kind);
        state.files[self.file].tracks.push(config.kind);
        state.ops.push(MemoryOp::AddTrack {
            path: self.path.clone(),
            kind: config.kind,
            handle,
            extradata_len: extradata.map_or(0, Bytes::len),
        });
        Ok(handle)
    }

    fn write_header(&mut self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.faults.header {
                return Err(Error::header_write("injected header failure"));
            }
            state.files[self.file].header_written = true;
            state.ops.push(MemoryOp::WriteHeader {
                path: self.path.clone(),
            });
        }
        let mut header = HEADER_MAGIC.to_vec();
        header.push(self.tracks.len() as u8);
        self.emit(&header);
        Ok(())
    }

    fn write_frame(&mut self, track: TrackHandle, buffer: &Buffer) -> Result<()> {
        let kind = *self
            .tracks
            .get(track.0 as usize)
            .ok_or_else(|| Error::internal(format!("unknown track {track}")))?;
        {
            let mut state = self.state.lock();
            let written = state.successful_writes.get(&kind).copied().unwrap_or(0);
            if let Some((fail_kind, after)) = state.faults.write {
                if fail_kind == kind && written >= after {
                    return Err(Error::write(kind, "injected write failure"));
                }
            }
            if !buffer.is_eos() {
                *state.successful_writes.entry(kind).or_insert(0) += 1;
            }

            let file = &mut state.files[self.file];
            if buffer.is_eos() {
                file.eos_written = true;
            } else {
                match kind {
                    MediaKind::Video => file.video_frames.push(buffer.timestamp_us()),
                    MediaKind::Audio => file.audio_frames.push(buffer.timestamp_us()),
                }
            }
            state.ops.push(MemoryOp::WriteFrame {
                path: self.path.clone(),
                kind,
                timestamp_us: buffer.timestamp_us(),
                len: buffer.len(),
                keyframe: buffer.is_keyframe(),
                eos: buffer.is_eos(),
            });
        }
        if !buffer.is_empty() {
            self.emit(buffer.data());
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.files[self.file].finalized = true;
        state.ops.push(MemoryOp::Finalize {
            path: self.path.clone(),
        });
        Ok(())
    }
}
