//! Synthetic stream simulation.
//!
//! Drives a [`SegmentController`] with a generated video/audio stream against
//! an in-memory stand-in for the configured backend, then reports the events,
//! files, and counters the run produced. Useful for checking rotation and
//! naming settings before pointing a real pipeline at them.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use serde::Serialize;

use segmux_common::{Buffer, CodecType, MediaKind};
use segmux_flow::{RecorderWorker, WorkerOptions};
use segmux_record::{
    BackendRegistry, ControllerStats, EventLog, Faults, MemoryBackend, MemoryFile, MuxerConfig,
    RecordedEvent, SegmentController,
};

/// Parameters of a simulated run.
#[derive(Debug, Clone)]
pub struct SimulationOptions {
    pub duration_secs: f64,
    pub fps: u32,
    /// Frames per GOP; every GOP starts with a keyframe.
    pub gop: u32,
    pub start_us: i64,
    /// Fail video writes once this many have succeeded.
    pub fail_video_after: Option<u64>,
    /// Fail every container open.
    pub fail_open: bool,
    /// Run on a [`RecorderWorker`] instead of calling the controller directly.
    pub use_worker: bool,
    pub worker: WorkerOptions,
    pub log_capacity: usize,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            duration_secs: 10.0,
            fps: 25,
            gop: 25,
            start_us: 0,
            fail_video_after: None,
            fail_open: false,
            use_worker: false,
            worker: WorkerOptions::default(),
            log_capacity: 1000,
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub events: Vec<RecordedEvent>,
    pub files: Vec<MemoryFile>,
    pub stats: ControllerStats,
    pub output_buffers: usize,
    pub output_bytes: usize,
}

/// Generates one video and one audio buffer per frame interval.
#[derive(Debug, Clone)]
pub struct SyntheticStream {
    video: Option<CodecType>,
    audio: bool,
    frame_us: i64,
    gop: u64,
    start_us: i64,
    frame: u64,
    frames: u64,
}

impl SyntheticStream {
    pub fn new(config: &MuxerConfig, options: &SimulationOptions) -> Self {
        let fps = options.fps.max(1);
        Self {
            video: config.video.as_ref().map(|t| t.codec),
            audio: config.audio.is_some(),
            frame_us: 1_000_000 / i64::from(fps),
            gop: u64::from(options.gop.max(1)),
            start_us: options.start_us,
            frame: 0,
            frames: (options.duration_secs.max(0.0) * f64::from(fps)) as u64,
        }
    }
}

impl Iterator for SyntheticStream {
    type Item = (Option<Buffer>, Option<Buffer>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.frame >= self.frames {
            return None;
        }
        let ts = self.start_us + self.frame as i64 * self.frame_us;
        let keyframe = self.frame % self.gop == 0;
        let video = self
            .video
            .map(|codec| Buffer::video(video_payload(codec, keyframe, self.frame), ts, keyframe));
        let audio = self
            .audio
            .then(|| Buffer::audio(Bytes::from(vec![0x21, 0x10, self.frame as u8]), ts));
        self.frame += 1;
        Some((video, audio))
    }
}

fn video_payload(codec: CodecType, keyframe: bool, frame: u64) -> Bytes {
    let tag = frame as u8;
    let payload: Vec<u8> = match (codec, keyframe) {
        (CodecType::H264, true) => vec![
            0, 0, 0, 1, 0x67, 0x42, 0x00, 0x1F, // SPS
            0, 0, 0, 1, 0x68, 0xCE, 0x3C, 0x80, // PPS
            0, 0, 0, 1, 0x65, 0x88, tag, // IDR
        ],
        (CodecType::H264, false) => vec![0, 0, 0, 1, 0x41, 0x9A, tag],
        (CodecType::H265, true) => vec![
            0, 0, 0, 1, 0x40, 0x01, 0x0C, // VPS
            0, 0, 0, 1, 0x42, 0x01, 0x01, // SPS
            0, 0, 0, 1, 0x44, 0x01, 0xC1, // PPS
            0, 0, 0, 1, 0x26, 0x01, tag, // IDR_W_RADL
        ],
        (CodecType::H265, false) => vec![0, 0, 0, 1, 0x02, 0x01, tag],
        _ => vec![0xFF, 0xD8, tag, 0xFF, 0xD9],
    };
    Bytes::from(payload)
}

/// Run a simulation for `config`.
pub fn run(config: &MuxerConfig, options: &SimulationOptions) -> Result<SimulationReport> {
    let backend = MemoryBackend::named(config.backend.clone());
    let mut registry = BackendRegistry::new();
    registry.register(Arc::new(backend.clone()));

    backend.set_faults(Faults {
        open: options.fail_open,
        write: options.fail_video_after.map(|n| (MediaKind::Video, n)),
        ..Faults::default()
    });

    let log = EventLog::new(options.log_capacity);
    let controller = SegmentController::from_config(config.clone(), &registry)
        .context("Failed to configure recorder")?
        .with_observer(log.clone());

    let stream = SyntheticStream::new(config, options);
    tracing::info!(
        frames = stream.frames,
        worker = options.use_worker,
        "Starting simulation"
    );

    let (stats, outputs) = if options.use_worker {
        run_on_worker(controller, stream, options.worker)?
    } else {
        run_direct(controller, stream)
    };

    Ok(SimulationReport {
        events: log.entries(),
        files: backend.files(),
        stats,
        output_buffers: outputs.len(),
        output_bytes: outputs.iter().map(Buffer::len).sum(),
    })
}

fn run_direct(
    mut controller: SegmentController,
    stream: SyntheticStream,
) -> (ControllerStats, Vec<Buffer>) {
    let mut outputs = Vec::new();
    for (video, audio) in stream {
        controller.ingest(video, audio);
        outputs.extend(controller.take_output());
    }
    controller.finish();
    outputs.extend(controller.take_output());
    (controller.stats(), outputs)
}

fn run_on_worker(
    controller: SegmentController,
    stream: SyntheticStream,
    options: WorkerOptions,
) -> Result<(ControllerStats, Vec<Buffer>)> {
    let mut worker = RecorderWorker::spawn(controller, options)?;
    let mut receiver = worker
        .take_outputs()
        .context("Worker output channel already taken")?;
    let handle = worker.handle();

    for (video, audio) in stream {
        // Respect backpressure instead of letting the queues drop frames.
        while handle.queued(MediaKind::Video) >= options.video_capacity
            || handle.queued(MediaKind::Audio) >= options.audio_capacity
        {
            std::thread::sleep(Duration::from_micros(200));
        }
        if let Some(video) = video {
            handle.push_video(video)?;
        }
        if let Some(audio) = audio {
            handle.push_audio(audio)?;
        }
    }

    let stats = worker.shutdown()?;
    let mut outputs = Vec::new();
    while let Ok(buffer) = receiver.try_recv() {
        outputs.push(buffer);
    }
    Ok((stats, outputs))
}
