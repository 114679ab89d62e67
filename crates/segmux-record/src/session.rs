//! One open output file.
//!
//! A [`RecordingSession`] owns a single container from open to finalize.
//! Tracks and the header are created lazily: the video track (and with it
//! the audio track) is only opened once a keyframe's extradata has been
//! captured, so nothing is written to the container before a decodable
//! frame exists. Audio-only configurations open on the first audio write.
//!
//! ```text
//! HeaderPending ──tracks + header──▶ Active ──close──▶ Closed
//!       │                              │
//!       └──────── any failure ─────────┴──▶ Broken ──close──▶ Closed
//! ```

use bytes::Bytes;

use segmux_common::{Buffer, Error, MediaKind, Result, SessionId, TrackConfig};

use crate::backend::{Container, IoTarget, MuxerBackend, OpenRequest, TrackHandle};
use crate::config::TrackFailurePolicy;
use crate::events::{EventSink, MuxerEvent, WriteTarget};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Container open, no header yet.
    HeaderPending,
    /// Header written, at least one track open.
    Active,
    /// A write failed; only `close` remains.
    Broken,
    Closed,
}

/// Result of forwarding one buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The buffer reached the container.
    Written,
    /// The track is not open (yet); the buffer was dropped.
    Skipped,
}

/// Parameters for [`RecordingSession::open`].
#[derive(Debug, Clone)]
pub struct SessionOptions<'a> {
    pub path: String,
    pub io: IoTarget,
    pub container: Option<&'a str>,
    pub dictionary: Option<&'a str>,
    pub video: Option<TrackConfig>,
    pub audio: Option<TrackConfig>,
    pub track_failure: TrackFailurePolicy,
    /// Reported with `FileBegin` and `FileEnd`.
    pub duration_secs: i64,
}

/// Per-file recording state.
pub struct RecordingSession {
    id: SessionId,
    path: String,
    state: SessionState,
    container: Option<Box<dyn Container>>,
    video: Option<TrackConfig>,
    audio: Option<TrackConfig>,
    video_track: Option<TrackHandle>,
    audio_track: Option<TrackHandle>,
    tracks_attempted: bool,
    extradata: Option<Bytes>,
    track_failure: TrackFailurePolicy,
    duration_secs: i64,
}

impl RecordingSession {
    /// Open a container at `options.path` and emit `FileBegin`.
    pub fn open(
        backend: &dyn MuxerBackend,
        options: SessionOptions<'_>,
        events: &mut EventSink,
    ) -> Result<Self> {
        let id = SessionId::new();
        let callback = options.io.is_callback();
        let container = backend.open(OpenRequest {
            path: &options.path,
            container: options.container,
            dictionary: options.dictionary,
            io: options.io,
        })?;

        tracing::info!(session = %id, path = %options.path, callback, "Opened recording session");
        events.emit(MuxerEvent::FileBegin {
            path: options.path.clone(),
            duration_secs: options.duration_secs,
        });

        Ok(Self {
            id,
            path: options.path,
            state: SessionState::HeaderPending,
            container: Some(container),
            video: options.video,
            audio: options.audio,
            video_track: None,
            audio_track: None,
            tracks_attempted: false,
            extradata: None,
            track_failure: options.track_failure,
            duration_secs: options.duration_secs,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn has_extradata(&self) -> bool {
        self.extradata.is_some()
    }

    pub fn extradata(&self) -> Option<&Bytes> {
        self.extradata.as_ref()
    }

    /// Cache the video extradata. Only the first call has an effect.
    pub fn set_extradata(&mut self, extradata: Bytes) {
        if self.extradata.is_none() {
            self.extradata = Some(extradata);
        }
    }

    pub fn is_track_open(&self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::Video => self.video_track.is_some(),
            MediaKind::Audio => self.audio_track.is_some(),
        }
    }

    /// Create the tracks and write the header once the session is ready.
    ///
    /// Tracks are attempted at most once per session. A rejected track is
    /// reported with `ErrCreateTrack` and, under the default policy, the
    /// other track carries on. A failed header write breaks the session.
    pub fn ensure_tracks_open(&mut self, events: &mut EventSink) -> Result<()> {
        if self.tracks_attempted || self.state != SessionState::HeaderPending {
            return Ok(());
        }
        let video_ready = self.video.is_some() && self.extradata.is_some();
        let audio_only = self.video.is_none() && self.audio.is_some();
        if !video_ready && !audio_only {
            return Ok(());
        }
        self.tracks_attempted = true;

        let container = self
            .container
            .as_mut()
            .ok_or_else(|| Error::internal("session container already released"))?;

        // Handles follow the slot, not the config's own kind.
        for (slot, config, extradata) in [
            (MediaKind::Video, self.video.as_ref(), self.extradata.as_ref()),
            (MediaKind::Audio, self.audio.as_ref(), None),
        ] {
            let Some(config) = config else {
                continue;
            };
            match container.add_track(config, extradata) {
                Ok(handle) => {
                    tracing::debug!(session = %self.id, kind = %slot, codec = %config.codec, %handle, "Track created");
                    match slot {
                        MediaKind::Video => self.video_track = Some(handle),
                        MediaKind::Audio => self.audio_track = Some(handle),
                    }
                }
                Err(e) => {
                    tracing::warn!(session = %self.id, kind = %slot, "Track creation failed: {e}");
                    events.emit(MuxerEvent::ErrCreateTrack {
                        path: self.path.clone(),
                        kind: slot,
                    });
                    if self.track_failure == TrackFailurePolicy::AbortSession {
                        self.state = SessionState::Broken;
                        return Err(e);
                    }
                }
            }
        }

        if self.video_track.is_none() && self.audio_track.is_none() {
            tracing::warn!(session = %self.id, "No track could be opened; header not written");
            return Ok(());
        }

        if let Err(e) = container.write_header() {
            tracing::error!(session = %self.id, path = %self.path, "Header write failed: {e}");
            events.emit(MuxerEvent::ErrWriteFile {
                path: self.path.clone(),
                target: WriteTarget::Header,
            });
            self.state = SessionState::Broken;
            return Err(e);
        }

        self.state = SessionState::Active;
        tracing::debug!(session = %self.id, "Container header written");
        Ok(())
    }

    pub fn write_video(&mut self, buffer: &Buffer, events: &mut EventSink) -> Result<WriteOutcome> {
        self.write(MediaKind::Video, buffer, events)
    }

    pub fn write_audio(&mut self, buffer: &Buffer, events: &mut EventSink) -> Result<WriteOutcome> {
        self.write(MediaKind::Audio, buffer, events)
    }

    fn write(
        &mut self,
        kind: MediaKind,
        buffer: &Buffer,
        events: &mut EventSink,
    ) -> Result<WriteOutcome> {
        if matches!(self.state, SessionState::Broken | SessionState::Closed) {
            return Err(Error::internal(format!(
                "write to {:?} session {}",
                self.state, self.id
            )));
        }
        self.ensure_tracks_open(events)?;
        if self.state != SessionState::Active {
            return Ok(WriteOutcome::Skipped);
        }

        let track = match kind {
            MediaKind::Video => self.video_track,
            MediaKind::Audio => self.audio_track,
        };
        let Some(track) = track else {
            return Ok(WriteOutcome::Skipped);
        };
        let container = self
            .container
            .as_mut()
            .ok_or_else(|| Error::internal("session container already released"))?;

        if let Err(e) = container.write_frame(track, buffer) {
            tracing::error!(session = %self.id, %kind, ts = buffer.timestamp_us(), "Frame write failed: {e}");
            events.emit(MuxerEvent::ErrWriteFile {
                path: self.path.clone(),
                target: WriteTarget::Track(kind),
            });
            self.state = SessionState::Broken;
            return Err(e);
        }
        Ok(WriteOutcome::Written)
    }

    /// Finalize the container and emit `FileEnd`.
    ///
    /// A healthy session with an open video track first receives a
    /// zero-length end-of-stream marker. Finalize errors are logged; the
    /// session is closed either way.
    pub fn close(mut self, events: &mut EventSink) {
        self.release();
        tracing::info!(session = %self.id, path = %self.path, "Closed recording session");
        events.emit(MuxerEvent::FileEnd {
            path: self.path.clone(),
            duration_secs: self.duration_secs,
        });
    }

    fn release(&mut self) {
        let Some(mut container) = self.container.take() else {
            return;
        };
        if self.state == SessionState::Active {
            if let Some(track) = self.video_track {
                if let Err(e) = container.write_frame(track, &Buffer::end_of_stream(MediaKind::Video, 0)) {
                    tracing::warn!(session = %self.id, "End-of-stream marker not written: {e}");
                }
            }
        }
        if let Err(e) = container.finalize() {
            tracing::error!(session = %self.id, path = %self.path, "Finalize failed: {e}");
        }
        self.state = SessionState::Closed;
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if self.container.is_some() {
            tracing::debug!(session = %self.id, "Finalizing dropped session");
            self.release();
        }
    }
}

impl std::fmt::Debug for RecordingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingSession")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("state", &self.state)
            .field("video_track", &self.video_track)
            .field("audio_track", &self.audio_track)
            .field("extradata", &self.extradata.as_ref().map(Bytes::len))
            .finish()
    }
}
