//! Dedicated recorder worker.
//!
//! [`RecorderWorker::spawn`] moves a [`SegmentController`] onto its own
//! thread. Producers push buffers through a cloneable [`RecorderHandle`]
//! into per-kind [`DropOldestQueue`]s and never block. The worker applies
//! pending commands, then runs one ingest cycle per popped video/audio pair
//! until both queues are empty, and sleeps until the next push.
//!
//! Callback-mode output buffers are forwarded to an unbounded channel the
//! owner can take with [`RecorderWorker::take_outputs`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use segmux_common::{Buffer, Error, MediaKind, Result};
use segmux_record::{
    ControlCommand, ControllerStats, EventObserver, FileNamer, SegmentController, StreamingStatus,
};

use crate::queue::{DropOldestQueue, DEFAULT_AUDIO_CAPACITY, DEFAULT_VIDEO_CAPACITY};

/// Queue sizing for a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerOptions {
    pub video_capacity: usize,
    pub audio_capacity: usize,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            video_capacity: DEFAULT_VIDEO_CAPACITY,
            audio_capacity: DEFAULT_AUDIO_CAPACITY,
        }
    }
}

struct Shared {
    video: DropOldestQueue<Buffer>,
    audio: DropOldestQueue<Buffer>,
    pending: Mutex<bool>,
    wake: Condvar,
    shutdown: AtomicBool,
}

impl Shared {
    fn notify(&self) {
        *self.pending.lock() = true;
        self.wake.notify_one();
    }

    /// Block until something is pending. Returns `false` on shutdown.
    fn wait(&self) -> bool {
        let mut pending = self.pending.lock();
        while !*pending && !self.shutdown.load(Ordering::Acquire) {
            self.wake.wait(&mut pending);
        }
        *pending = false;
        !self.shutdown.load(Ordering::Acquire)
    }
}

/// Cloneable producer and control handle.
#[derive(Clone)]
pub struct RecorderHandle {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<ControlCommand>,
    status: StreamingStatus,
}

impl RecorderHandle {
    /// Queue a typed buffer on the matching input.
    ///
    /// Untyped buffers are rejected with a configuration error.
    pub fn push(&self, buffer: Buffer) -> Result<()> {
        match buffer.kind() {
            Some(kind) => self.push_kind(kind, buffer),
            None => Err(Error::config("untyped buffer pushed to recorder input")),
        }
    }

    pub fn push_video(&self, buffer: Buffer) -> Result<()> {
        self.push_kind(MediaKind::Video, buffer)
    }

    pub fn push_audio(&self, buffer: Buffer) -> Result<()> {
        self.push_kind(MediaKind::Audio, buffer)
    }

    /// Fails once the worker is shutting down; nothing would drain the queue.
    fn push_kind(&self, kind: MediaKind, buffer: Buffer) -> Result<()> {
        if self.shared.shutdown.load(Ordering::Acquire) {
            tracing::warn!(%kind, ts = buffer.timestamp_us(), "Recorder worker stopped, buffer discarded");
            return Err(Error::internal(format!("recorder worker stopped, {kind} buffer not queued")));
        }
        let queue = self.queue(kind);
        if let Some(evicted) = queue.push(buffer) {
            tracing::debug!(%kind, ts = evicted.timestamp_us(), dropped = queue.dropped(), "Input queue full, dropped oldest buffer");
        }
        self.shared.notify();
        Ok(())
    }

    fn queue(&self, kind: MediaKind) -> &DropOldestQueue<Buffer> {
        match kind {
            MediaKind::Video => &self.shared.video,
            MediaKind::Audio => &self.shared.audio,
        }
    }

    /// Buffers currently waiting on `kind`'s input.
    pub fn queued(&self, kind: MediaKind) -> usize {
        self.queue(kind).len()
    }

    /// Buffers discarded by overflow on `kind`'s input.
    pub fn dropped(&self, kind: MediaKind) -> u64 {
        self.queue(kind).dropped()
    }

    /// Deliver a command, observed at the start of the next cycle.
    pub fn send(&self, command: ControlCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|e| Error::internal(format!("recorder worker stopped, {} not delivered", e.0.name())))?;
        self.shared.notify();
        Ok(())
    }

    pub fn set_streaming(&self, enabled: bool) -> Result<()> {
        self.send(ControlCommand::SetStreaming(enabled))
    }

    pub fn set_segment_duration(&self, secs: i64) -> Result<()> {
        self.send(ControlCommand::SetSegmentDuration(secs))
    }

    pub fn set_output_path(&self, path: impl Into<String>) -> Result<()> {
        self.send(ControlCommand::SetOutputPath(path.into()))
    }

    pub fn set_file_prefix(&self, prefix: impl Into<String>) -> Result<()> {
        self.send(ControlCommand::SetFilePrefix(prefix.into()))
    }

    pub fn set_file_namer(&self, namer: Option<Box<dyn FileNamer>>) -> Result<()> {
        self.send(ControlCommand::SetFileNamer(namer))
    }

    pub fn set_observer(&self, observer: Option<Box<dyn EventObserver>>) -> Result<()> {
        self.send(ControlCommand::SetObserver(observer))
    }

    /// Current streaming flag as last published by the worker.
    pub fn streaming_status(&self) -> bool {
        self.status.get()
    }
}

impl std::fmt::Debug for RecorderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecorderHandle")
            .field("video_queued", &self.shared.video.len())
            .field("audio_queued", &self.shared.audio.len())
            .field("streaming", &self.status.get())
            .finish()
    }
}

/// Owner of the worker thread.
pub struct RecorderWorker {
    handle: RecorderHandle,
    outputs: Option<mpsc::UnboundedReceiver<Buffer>>,
    thread: Option<JoinHandle<ControllerStats>>,
}

impl RecorderWorker {
    /// Start a worker thread that owns `controller`.
    pub fn spawn(controller: SegmentController, options: WorkerOptions) -> Result<Self> {
        let shared = Arc::new(Shared {
            video: DropOldestQueue::new(options.video_capacity),
            audio: DropOldestQueue::new(options.audio_capacity),
            pending: Mutex::new(false),
            wake: Condvar::new(),
            shutdown: AtomicBool::new(false),
        });
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let status = controller.streaming_status();

        let thread = std::thread::Builder::new()
            .name(format!("segmux-recorder-{}", controller.id()))
            .spawn({
                let shared = Arc::clone(&shared);
                move || run(controller, shared, command_rx, output_tx)
            })?;

        tracing::info!(
            video_capacity = options.video_capacity,
            audio_capacity = options.audio_capacity,
            "Recorder worker started"
        );

        Ok(Self {
            handle: RecorderHandle {
                shared,
                commands: command_tx,
                status,
            },
            outputs: Some(output_rx),
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> RecorderHandle {
        self.handle.clone()
    }

    /// Take the receiver for callback-mode output buffers. Only the first
    /// call returns it.
    pub fn take_outputs(&mut self) -> Option<mpsc::UnboundedReceiver<Buffer>> {
        self.outputs.take()
    }

    /// Drain the queues, close the active session and stop the thread.
    pub fn shutdown(mut self) -> Result<ControllerStats> {
        self.stop()
    }

    fn stop(&mut self) -> Result<ControllerStats> {
        let Some(thread) = self.thread.take() else {
            return Err(Error::internal("recorder worker already stopped"));
        };
        self.handle.shared.shutdown.store(true, Ordering::Release);
        self.handle.shared.notify();
        let stats = thread
            .join()
            .map_err(|_| Error::internal("recorder worker panicked"))?;
        tracing::info!(
            cycles = stats.cycles,
            sessions = stats.sessions_opened,
            rotations = stats.rotations,
            "Recorder worker stopped"
        );
        Ok(stats)
    }
}

impl Drop for RecorderWorker {
    fn drop(&mut self) {
        if self.thread.is_some() {
            if let Err(e) = self.stop() {
                tracing::error!("Recorder worker shutdown failed: {e}");
            }
        }
    }
}

fn run(
    mut controller: SegmentController,
    shared: Arc<Shared>,
    mut commands: mpsc::UnboundedReceiver<ControlCommand>,
    outputs: mpsc::UnboundedSender<Buffer>,
) -> ControllerStats {
    loop {
        let running = shared.wait();
        loop {
            // Pop first: every command sent before these buffers were pushed
            // is then already in the channel.
            let video = shared.video.pop();
            let audio = shared.audio.pop();
            while let Ok(command) = commands.try_recv() {
                controller.apply(command);
            }
            if video.is_none() && audio.is_none() {
                break;
            }
            controller.ingest(video, audio);
            forward_outputs(&controller, &outputs);
        }
        if !running {
            break;
        }
    }

    controller.finish();
    forward_outputs(&controller, &outputs);
    controller.stats()
}

fn forward_outputs(controller: &SegmentController, outputs: &mpsc::UnboundedSender<Buffer>) {
    for buffer in controller.take_output() {
        // The receiver may have been dropped; output is then discarded.
        let _ = outputs.send(buffer);
    }
}
