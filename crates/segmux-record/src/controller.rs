//! Segment controller.
//!
//! [`SegmentController`] owns the rotation and naming policy and at most one
//! active [`RecordingSession`]. It is driven by [`ingest`](SegmentController::ingest),
//! once per cycle, with whatever video and audio buffers arrived. Policy
//! changes arrive as [`ControlCommand`]s applied between cycles.
//!
//! Failures never escape `ingest`: a failed open or write closes the session,
//! reports it through the event sink, and switches streaming off until it is
//! explicitly re-enabled.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;

use segmux_common::{Buffer, ControllerId, Error, Result};
use segmux_media::{ExtradataExtractor, ParameterSetExtractor};

use crate::backend::{BackendRegistry, ByteSink, IoTarget, MuxerBackend};
use crate::command::ControlCommand;
use crate::config::{IoMode, MuxerConfig};
use crate::events::{EventObserver, EventSink, MuxerEvent};
use crate::naming::{FileNamer, FileNaming};
use crate::session::{RecordingSession, SessionOptions, WriteOutcome};

/// Shared, read-only view of the streaming flag.
#[derive(Debug, Clone)]
pub struct StreamingStatus(Arc<AtomicBool>);

impl StreamingStatus {
    fn new(enabled: bool) -> Self {
        Self(Arc::new(AtomicBool::new(enabled)))
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::Release);
    }
}

/// Counters accumulated over the controller's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ControllerStats {
    pub cycles: u64,
    pub sessions_opened: u64,
    pub sessions_closed: u64,
    pub rotations: u64,
    pub video_written: u64,
    pub audio_written: u64,
    pub failures: u64,
}

type OutputQueue = Arc<Mutex<VecDeque<Buffer>>>;

/// Rotation, naming and session lifecycle for one pipeline.
pub struct SegmentController {
    id: ControllerId,
    config: MuxerConfig,
    backend: Option<Arc<dyn MuxerBackend>>,
    config_error: Option<String>,
    io_mode: IoMode,
    naming: FileNaming,
    events: EventSink,
    extractor: Box<dyn ExtradataExtractor>,
    streaming: StreamingStatus,
    /// Whether the current enabled period has been reported; drives StreamStop.
    announced: bool,
    session: Option<RecordingSession>,
    segment_start_us: Option<i64>,
    outputs: OutputQueue,
    stats: ControllerStats,
}

impl SegmentController {
    /// Create a controller over an already resolved backend.
    pub fn new(config: MuxerConfig, backend: Arc<dyn MuxerBackend>) -> Self {
        Self::build(config, Some(backend), None)
    }

    /// Parse `params` and resolve the backend in `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a malformed parameter string, a missing
    /// backend name, a name the registry does not know, or a track placed in
    /// the other kind's slot.
    pub fn configure(params: &str, registry: &BackendRegistry) -> Result<Self> {
        Self::from_config(MuxerConfig::parse(params)?, registry)
    }

    /// Resolve the backend for an already parsed configuration.
    pub fn from_config(config: MuxerConfig, registry: &BackendRegistry) -> Result<Self> {
        if config.backend.is_empty() {
            return Err(Error::config("missing muxer backend name"));
        }
        config.check_tracks()?;
        let backend = registry.get(&config.backend).ok_or_else(|| {
            Error::config(format!(
                "unknown muxer backend '{}' (available: {})",
                config.backend,
                registry.names().join(", ")
            ))
        })?;
        Ok(Self::new(config, backend))
    }

    /// Like [`configure`](Self::configure), but a configuration error yields
    /// an inert controller instead of failing.
    ///
    /// An inert controller accepts every call and never opens a session.
    pub fn from_params(params: &str, registry: &BackendRegistry) -> Self {
        match Self::configure(params, registry) {
            Ok(controller) => controller,
            Err(e) => {
                tracing::error!("Recorder configuration rejected, controller is inert: {e}");
                let config = MuxerConfig::parse(params).unwrap_or_default();
                Self::build(config, None, Some(e.to_string()))
            }
        }
    }

    fn build(
        config: MuxerConfig,
        backend: Option<Arc<dyn MuxerBackend>>,
        config_error: Option<String>,
    ) -> Self {
        let id = ControllerId::new();
        // An inert controller never records, so it never reports streaming.
        let enabled = config.enable_streaming && backend.is_some();
        if let Some(backend) = &backend {
            tracing::info!(
                controller = %id,
                backend = backend.name(),
                io_mode = ?config.io_mode(),
                file_duration = config.file_duration,
                "Segment controller configured"
            );
        }
        Self {
            id,
            io_mode: config.io_mode(),
            naming: FileNaming::from_config(&config),
            config,
            backend,
            config_error,
            events: EventSink::default(),
            extractor: Box::new(ParameterSetExtractor::new()),
            streaming: StreamingStatus::new(enabled),
            announced: enabled,
            session: None,
            segment_start_us: None,
            outputs: Arc::default(),
            stats: ControllerStats::default(),
        }
    }

    pub fn with_observer(mut self, observer: impl EventObserver + 'static) -> Self {
        self.events.set(Some(Box::new(observer)));
        self
    }

    pub fn with_extractor(mut self, extractor: impl ExtradataExtractor + 'static) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    pub fn with_file_namer(mut self, namer: impl FileNamer + 'static) -> Self {
        self.naming.set_namer(Some(Box::new(namer)));
        self
    }

    pub fn id(&self) -> ControllerId {
        self.id
    }

    pub fn config(&self) -> &MuxerConfig {
        &self.config
    }

    pub fn is_inert(&self) -> bool {
        self.backend.is_none()
    }

    /// Why the controller is inert, if it is.
    pub fn config_error(&self) -> Option<&str> {
        self.config_error.as_deref()
    }

    pub fn io_mode(&self) -> IoMode {
        self.io_mode
    }

    pub fn streaming_status(&self) -> StreamingStatus {
        self.streaming.clone()
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.get()
    }

    pub fn stats(&self) -> ControllerStats {
        self.stats
    }

    /// Path of the active session, if any.
    pub fn session_path(&self) -> Option<&str> {
        self.session.as_ref().map(RecordingSession::path)
    }

    pub fn segment_start_us(&self) -> Option<i64> {
        self.segment_start_us
    }

    /// Produce the next output path. See [`FileNaming::generate`].
    pub fn generate_file_path(&mut self) -> String {
        self.naming.generate()
    }

    /// Apply a control command.
    pub fn apply(&mut self, command: ControlCommand) {
        tracing::debug!(controller = %self.id, command = command.name(), "Applying control command");
        match command {
            ControlCommand::SetStreaming(enabled) => self.set_streaming(enabled),
            ControlCommand::SetSegmentDuration(secs) => {
                if secs != 0 {
                    self.config.file_duration = secs;
                }
            }
            ControlCommand::SetOutputPath(path) => {
                if !path.is_empty() {
                    self.naming.output_path = path.clone();
                    self.config.output_path = path;
                }
            }
            ControlCommand::SetFilePrefix(prefix) => {
                if !prefix.is_empty() {
                    self.naming.prefix = prefix.clone();
                    self.config.file_prefix = prefix;
                }
            }
            ControlCommand::SetFileNamer(namer) => self.naming.set_namer(namer),
            ControlCommand::SetObserver(observer) => self.events.set(observer),
        }
    }

    /// Switch streaming on or off.
    ///
    /// Enabling reports `StreamStart` right away. Disabling takes effect on
    /// the next [`ingest`](Self::ingest), which closes the session and
    /// reports `StreamStop`.
    pub fn set_streaming(&mut self, enabled: bool) {
        if self.is_inert() {
            tracing::debug!(controller = %self.id, enabled, "Ignoring streaming change on inert controller");
            return;
        }
        let was = self.streaming.get();
        self.streaming.set(enabled);
        if enabled && !was && !self.announced {
            tracing::info!(controller = %self.id, "Streaming enabled");
            self.events.emit(MuxerEvent::StreamStart);
            self.announced = true;
        }
    }

    /// Run one cycle with the buffers that arrived since the last one.
    pub fn ingest(&mut self, video: Option<Buffer>, audio: Option<Buffer>) {
        let Some(backend) = self.backend.clone() else {
            return;
        };
        self.stats.cycles += 1;

        if !self.streaming.get() {
            self.close_session();
            self.announce_stop();
            return;
        }

        if let Some(frame) = video.as_ref() {
            self.check_rotation(frame);
        }

        if self.session.is_none() {
            match self.open_session(backend.as_ref()) {
                Ok(session) => {
                    self.stats.sessions_opened += 1;
                    self.session = Some(session);
                }
                Err(e) => {
                    tracing::error!(controller = %self.id, "Failed to open recording session: {e}");
                    self.stats.failures += 1;
                    self.disable();
                    return;
                }
            }
        }

        if self.config.audio.is_some() {
            if let Some(buffer) = audio.as_ref() {
                if !self.forward_audio(buffer) {
                    return;
                }
            }
        }

        if self.config.video.is_some() {
            if let Some(buffer) = video.as_ref() {
                self.forward_video(buffer);
            }
        }
    }

    /// Drain the byte ranges emitted by callback-mode sessions.
    pub fn take_output(&self) -> Vec<Buffer> {
        self.outputs.lock().drain(..).collect()
    }

    /// Close the active session, reporting `FileEnd`. Idempotent.
    pub fn finish(&mut self) {
        self.close_session();
    }

    fn check_rotation(&mut self, frame: &Buffer) {
        let Some(threshold) = self.config.rotation_threshold_us() else {
            return;
        };
        if self.session.is_none() || self.config.video.is_none() || !frame.is_keyframe() {
            return;
        }
        let Some(start) = self.segment_start_us else {
            return;
        };
        let elapsed = frame.timestamp_us() - start;
        if elapsed >= threshold {
            tracing::info!(
                controller = %self.id,
                elapsed_us = elapsed,
                threshold_us = threshold,
                "Segment duration reached, rotating"
            );
            self.stats.rotations += 1;
            self.close_session();
        }
    }

    fn open_session(&mut self, backend: &dyn MuxerBackend) -> Result<RecordingSession> {
        let path = self.naming.generate();
        let io = match self.io_mode {
            IoMode::File => IoTarget::File,
            IoMode::Callback => IoTarget::Callback(self.output_sink()),
        };
        let options = SessionOptions {
            path,
            io,
            container: non_empty(&self.config.output_type),
            dictionary: non_empty(&self.config.dictionary),
            video: self.config.video.clone(),
            audio: self.config.audio.clone(),
            track_failure: self.config.track_failure,
            duration_secs: self.config.file_duration,
        };
        RecordingSession::open(backend, options, &mut self.events)
    }

    fn output_sink(&self) -> ByteSink {
        let outputs = Arc::clone(&self.outputs);
        Arc::new(move |bytes: &[u8]| {
            let buffer = Buffer::untyped(Bytes::copy_from_slice(bytes), Utc::now().timestamp_micros());
            outputs.lock().push_back(buffer);
        })
    }

    /// Returns `false` when the session failed and the cycle must end.
    fn forward_audio(&mut self, buffer: &Buffer) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        match session.write_audio(buffer, &mut self.events) {
            Ok(WriteOutcome::Written) => {
                self.stats.audio_written += 1;
                true
            }
            Ok(WriteOutcome::Skipped) => true,
            Err(e) => {
                self.fail_session(&e);
                false
            }
        }
    }

    fn forward_video(&mut self, buffer: &Buffer) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        if buffer.is_keyframe() && !session.has_extradata() {
            if let Some(track) = self.config.video.as_ref() {
                match self.extractor.extract(track.codec, buffer) {
                    Ok(extradata) => session.set_extradata(extradata),
                    Err(e) => tracing::warn!(
                        controller = %self.id,
                        ts = buffer.timestamp_us(),
                        "No extradata in keyframe, video track stays closed: {e}"
                    ),
                }
            }
        }

        match session.write_video(buffer, &mut self.events) {
            Ok(outcome) => {
                if outcome == WriteOutcome::Written {
                    self.stats.video_written += 1;
                }
                // Every frame seen counts, so rotation still runs when the
                // video track could not be opened.
                let ts = buffer.timestamp_us();
                self.segment_start_us = Some(self.segment_start_us.map_or(ts, |start| start.min(ts)));
            }
            Err(e) => self.fail_session(&e),
        }
    }

    fn fail_session(&mut self, error: &Error) {
        tracing::error!(controller = %self.id, "Recording session failed, streaming disabled: {error}");
        self.stats.failures += 1;
        self.close_session();
        self.disable();
    }

    fn close_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.close(&mut self.events);
            self.stats.sessions_closed += 1;
        }
        self.segment_start_us = None;
    }

    fn disable(&mut self) {
        self.streaming.set(false);
        self.announce_stop();
    }

    fn announce_stop(&mut self) {
        if self.announced {
            tracing::info!(controller = %self.id, "Streaming stopped");
            self.events.emit(MuxerEvent::StreamStop);
            self.announced = false;
        }
    }
}

impl Drop for SegmentController {
    fn drop(&mut self) {
        self.finish();
    }
}

impl std::fmt::Debug for SegmentController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentController")
            .field("id", &self.id)
            .field("backend", &self.backend.as_ref().map(|b| b.name().to_string()))
            .field("streaming", &self.streaming.get())
            .field("session", &self.session)
            .field("segment_start_us", &self.segment_start_us)
            .finish()
    }
}

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}
