//! Integration tests for segment rotation, failure containment and events

use std::sync::Arc;

use segmux_common::{Buffer, MediaKind};
use segmux_record::{
    memory::HEADER_MAGIC, BackendRegistry, ControlCommand, EventKind, EventLog, Faults,
    MemoryBackend, MemoryOp, MuxerConfig, MuxerEvent, SegmentController, WriteTarget,
};

const FRAME_US: i64 = 40_000;
const AUDIO_US: i64 = 21_333;

/// SPS + PPS + IDR slice.
fn keyframe(ts: i64) -> Buffer {
    Buffer::video(
        vec![
            0, 0, 0, 1, 0x67, 0x42, 0x00, 0x1F, 0, 0, 0, 1, 0x68, 0xCE, 0x3C, 0x80, 0, 0, 0, 1,
            0x65, 0x88, 0x84,
        ],
        ts,
        true,
    )
}

fn delta(ts: i64) -> Buffer {
    Buffer::video(vec![0, 0, 0, 1, 0x41, 0x9A, 0x02], ts, false)
}

fn audio(ts: i64) -> Buffer {
    Buffer::audio(vec![0x21, 0x10, 0x05], ts)
}

fn setup(params: &str) -> (SegmentController, MemoryBackend, EventLog) {
    let backend = MemoryBackend::new();
    let log = EventLog::new(10_000);
    let controller = SegmentController::new(
        MuxerConfig::parse(params).unwrap(),
        Arc::new(backend.clone()),
    )
    .with_observer(log.clone());
    (controller, backend, log)
}

/// Feed `duration_us` of 25 fps video with a keyframe every `gop_us`.
fn feed_video(
    controller: &mut SegmentController,
    start_us: i64,
    duration_us: i64,
    gop_us: i64,
    with_audio: bool,
) {
    let mut ts = start_us;
    while ts < start_us + duration_us {
        let offset = ts - start_us;
        let video = if offset % gop_us == 0 { keyframe(ts) } else { delta(ts) };
        let audio = with_audio.then(|| audio(ts + AUDIO_US / 2));
        controller.ingest(Some(video), audio);
        ts += FRAME_US;
    }
}

#[test]
fn test_rotation_once_per_duration() {
    for with_audio in [false, true] {
        let mut params =
            "name=memory;path=/rec;file_prefix=cam;file_index=1;file_duration=2|type=video;codec=h264"
                .to_string();
        if with_audio {
            params.push_str("|type=audio;codec=aac");
        }
        let (mut controller, backend, log) = setup(&params);

        // 10 s of video with 1 s GOPs starting at an arbitrary t0.
        feed_video(&mut controller, 5_000_000, 10_000_000, 1_000_000, with_audio);

        assert_eq!(controller.stats().rotations, 4, "with_audio={with_audio}");
        let paths: Vec<String> = backend.files().iter().map(|f| f.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                "/rec/cam_1.mp4",
                "/rec/cam_2.mp4",
                "/rec/cam_3.mp4",
                "/rec/cam_4.mp4",
                "/rec/cam_5.mp4"
            ]
        );
        assert_eq!(log.count(EventKind::FileEnd), 4);
        for (i, file) in backend.files().iter().enumerate() {
            assert_eq!(file.video_frames.len(), 50, "segment {i}");
            assert_eq!(file.video_frames[0], 5_000_000 + i as i64 * 2_000_000);
        }
    }
}

#[test]
fn test_rotation_measured_from_segment_first_keyframe() {
    let (mut controller, backend, _log) = setup(
        "name=memory;path=/rec;file_prefix=cam;file_duration=2|type=video;codec=h264",
    );
    // Keyframes every 1.2 s: 0, 1.2, 2.4, 3.6, 4.8, 6.0, 7.2, 8.4, 9.6
    feed_video(&mut controller, 0, 10_000_000, 1_200_000, false);

    // Segments start at 0, 2.4, 4.8, 7.2 and each rotates at start + 2.4.
    let starts: Vec<i64> = backend.files().iter().map(|f| f.video_frames[0]).collect();
    assert_eq!(starts, vec![0, 2_400_000, 4_800_000, 7_200_000, 9_600_000]);
    assert_eq!(controller.stats().rotations, 4);
}

#[test]
fn test_no_rotation_without_duration() {
    let (mut controller, backend, _log) =
        setup("name=memory;path=/rec;file_prefix=cam|type=video;codec=h264");
    feed_video(&mut controller, 0, 30_000_000, 1_000_000, false);
    assert_eq!(controller.stats().rotations, 0);
    assert_eq!(backend.files().len(), 1);
}

#[test]
fn test_no_header_before_keyframe_for_any_interleaving() {
    // Small LCG so every seed gives a different, reproducible interleaving.
    for seed in 1u64..40 {
        let (mut controller, backend, _log) = setup(
            "name=memory;path=/rec;file_prefix=cam|type=video;codec=h264|type=audio;codec=aac",
        );
        let mut state = seed;
        let mut next = || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 33) % 4
        };

        let keyframe_cycle = 5 + (next() as usize) * 3;
        let mut saw_keyframe = false;
        for cycle in 0..40 {
            let ts = cycle as i64 * FRAME_US;
            let roll = next();
            let video = match roll {
                0 => None,
                _ if cycle >= keyframe_cycle && !saw_keyframe => {
                    saw_keyframe = true;
                    Some(keyframe(ts))
                }
                _ => Some(delta(ts)),
            };
            let audio = (roll != 3).then(|| audio(ts));
            controller.ingest(video, audio);

            if !saw_keyframe {
                assert_eq!(backend.header_count(), 0, "seed {seed} cycle {cycle}");
            }
        }

        let ops = backend.ops();
        let header_at = ops.iter().position(|op| matches!(op, MemoryOp::WriteHeader { .. }));
        let first_frame_at = ops.iter().position(|op| matches!(op, MemoryOp::WriteFrame { .. }));
        if let (Some(header), Some(frame)) = (header_at, first_frame_at) {
            assert!(header < frame, "seed {seed}");
            assert!(
                matches!(ops[frame], MemoryOp::WriteFrame { kind: MediaKind::Video, keyframe: true, .. })
                    || matches!(ops[frame], MemoryOp::WriteFrame { kind: MediaKind::Audio, .. }),
                "seed {seed}"
            );
        }
    }
}

#[test]
fn test_video_write_failure_contained() {
    let (mut controller, backend, log) = setup(
        "name=memory;path=/rec;file_prefix=cam|type=video;codec=h264|type=audio;codec=aac",
    );
    controller.ingest(Some(keyframe(0)), Some(audio(0)));
    controller.ingest(Some(delta(FRAME_US)), Some(audio(FRAME_US)));

    backend.update_faults(|f| f.write = Some((MediaKind::Video, 2)));
    controller.ingest(Some(delta(2 * FRAME_US)), Some(audio(2 * FRAME_US)));

    assert!(!controller.is_streaming());
    assert!(!controller.streaming_status().get());
    assert!(controller.session_path().is_none());

    let kinds: Vec<EventKind> = log.events().iter().map(MuxerEvent::kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::FileBegin,
            EventKind::ErrWriteFile,
            EventKind::FileEnd,
            EventKind::StreamStop
        ]
    );
    assert_eq!(log.events()[1].value(), MediaKind::Video.track_code());

    // Later cycles do nothing until streaming is re-enabled.
    let ops_before = backend.ops().len();
    controller.ingest(Some(keyframe(3 * FRAME_US)), Some(audio(3 * FRAME_US)));
    assert_eq!(backend.ops().len(), ops_before);
}

#[test]
fn test_disable_enable_cycle_events() {
    let (mut controller, _backend, log) =
        setup("name=memory;path=/rec;file_prefix=cam;file_index=1|type=video;codec=h264");
    controller.ingest(Some(keyframe(0)), None);

    controller.apply(ControlCommand::SetStreaming(false));
    controller.ingest(Some(delta(FRAME_US)), None);
    controller.ingest(Some(delta(2 * FRAME_US)), None);
    controller.ingest(None, None);

    assert_eq!(log.count(EventKind::FileEnd), 1);
    assert_eq!(log.count(EventKind::StreamStop), 1);

    controller.apply(ControlCommand::SetStreaming(true));
    controller.apply(ControlCommand::SetStreaming(true));
    controller.ingest(Some(keyframe(3 * FRAME_US)), None);

    let kinds: Vec<EventKind> = log.events().iter().map(MuxerEvent::kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::FileBegin,
            EventKind::FileEnd,
            EventKind::StreamStop,
            EventKind::StreamStart,
            EventKind::FileBegin,
        ]
    );
    assert_eq!(controller.session_path(), Some("/rec/cam_2.mp4"));
}

#[test]
fn test_starting_disabled_emits_nothing() {
    let (mut controller, backend, log) = setup(
        "name=memory;path=/rec;file_prefix=cam;enable_streaming=false|type=video;codec=h264",
    );
    controller.ingest(Some(keyframe(0)), None);
    assert!(log.is_empty());
    assert!(backend.files().is_empty());
}

#[test]
fn test_rejected_track_reports_and_continues() {
    let (mut controller, backend, log) = setup(
        "name=memory;path=/rec;file_prefix=cam|type=video;codec=h264|type=audio;codec=aac",
    );
    backend.update_faults(|f| f.add_track = vec![MediaKind::Audio]);
    controller.ingest(Some(keyframe(0)), Some(audio(0)));
    controller.ingest(Some(delta(FRAME_US)), Some(audio(FRAME_US)));

    assert!(controller.is_streaming());
    assert_eq!(log.count(EventKind::ErrCreateTrack), 1);
    assert_eq!(backend.files()[0].video_frames.len(), 2);
    assert!(backend.files()[0].audio_frames.is_empty());
}

#[test]
fn test_abort_policy_closes_session() {
    let (mut controller, backend, log) = setup(
        "name=memory;path=/rec;file_prefix=cam;track_failure=abort|type=video;codec=h264|type=audio;codec=aac",
    );
    backend.update_faults(|f| f.add_track = vec![MediaKind::Audio]);
    controller.ingest(Some(keyframe(0)), Some(audio(0)));

    assert!(!controller.is_streaming());
    let kinds: Vec<EventKind> = log.events().iter().map(MuxerEvent::kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::FileBegin,
            EventKind::ErrCreateTrack,
            EventKind::FileEnd,
            EventKind::StreamStop
        ]
    );
}

#[test]
fn test_rotation_continues_without_video_track() {
    let (mut controller, backend, log) = setup(
        "name=memory;path=/rec;file_prefix=cam;file_index=1;file_duration=1\
         |type=video;codec=h264|type=audio;codec=aac",
    );
    backend.update_faults(|f| f.add_track = vec![MediaKind::Video]);

    feed_video(&mut controller, 0, 5_000_000, 1_000_000, true);

    assert!(controller.is_streaming());
    assert_eq!(controller.stats().rotations, 4);
    assert_eq!(controller.stats().video_written, 0);
    assert_eq!(log.count(EventKind::ErrCreateTrack), 5);

    let files = backend.files();
    assert_eq!(files.len(), 5);
    for (i, file) in files.iter().enumerate() {
        assert!(file.header_written, "segment {i}");
        assert!(file.video_frames.is_empty(), "segment {i}");
        // The opening cycle's audio arrives before the tracks exist.
        assert_eq!(file.audio_frames.len(), 24, "segment {i}");
    }
}

#[test]
fn test_header_failure_closes_session_and_disables() {
    let (mut controller, backend, log) =
        setup("name=memory;path=/rec;file_prefix=cam|type=video;codec=h264");
    backend.update_faults(|f| f.header = true);
    controller.ingest(Some(keyframe(0)), None);

    assert!(!controller.is_streaming());
    assert!(controller.session_path().is_none());
    assert_eq!(controller.stats().failures, 1);
    assert_eq!(
        log.events(),
        vec![
            MuxerEvent::FileBegin {
                path: "/rec/cam.mp4".into(),
                duration_secs: 0
            },
            MuxerEvent::ErrWriteFile {
                path: "/rec/cam.mp4".into(),
                target: WriteTarget::Header
            },
            MuxerEvent::FileEnd {
                path: "/rec/cam.mp4".into(),
                duration_secs: 0
            },
            MuxerEvent::StreamStop,
        ]
    );
    assert_eq!(log.events()[1].value(), 0);

    let ops = backend.ops();
    assert!(!ops.iter().any(|op| matches!(op, MemoryOp::WriteFrame { .. })));
    assert!(matches!(ops.last(), Some(MemoryOp::Finalize { .. })));

    // Nothing more happens until streaming is re-enabled.
    controller.ingest(Some(keyframe(FRAME_US)), None);
    assert_eq!(backend.ops().len(), ops.len());
}

#[test]
fn test_callback_mode_outputs() {
    let (mut controller, backend, _log) =
        setup("name=memory;output_type=mp4|type=video;codec=h264");
    assert_eq!(controller.io_mode(), segmux_record::IoMode::Callback);

    controller.ingest(Some(keyframe(0)), None);
    controller.ingest(Some(delta(FRAME_US)), None);

    let outputs = controller.take_output();
    assert_eq!(outputs.len(), 3);
    assert!(outputs.iter().all(|b| b.kind().is_none()));
    assert_eq!(&outputs[0].data()[..4], HEADER_MAGIC);
    assert_eq!(outputs[2].data().as_ref(), &[0, 0, 0, 1, 0x41, 0x9A, 0x02]);
    assert!(outputs[0].timestamp_us() > 0);
    assert!(controller.take_output().is_empty());
    assert!(backend.files()[0].callback);
}

#[test]
fn test_naming_callback_failure_falls_back() {
    let (controller, backend, _log) =
        setup("name=memory;path=/rec;file_prefix=cam;file_index=3|type=video;codec=h264");
    let mut controller = controller.with_file_namer(|| -> segmux_common::Result<String> {
        Err(segmux_common::Error::NamingCallback("no storage".into()))
    });
    controller.ingest(Some(keyframe(0)), None);
    assert_eq!(backend.files()[0].path, "/rec/cam_3.mp4");
}

#[test]
fn test_file_events_carry_duration() {
    let (mut controller, _backend, log) = setup(
        "name=memory;path=/rec;file_prefix=cam;file_duration=30|type=video;codec=h264",
    );
    controller.ingest(Some(keyframe(0)), None);
    controller.finish();
    assert_eq!(
        log.events(),
        vec![
            MuxerEvent::FileBegin {
                path: "/rec/cam.mp4".into(),
                duration_secs: 30
            },
            MuxerEvent::FileEnd {
                path: "/rec/cam.mp4".into(),
                duration_secs: 30
            },
        ]
    );
}

#[test]
fn test_missing_backend_name_is_inert() {
    let registry = BackendRegistry::with_builtin();
    assert!(SegmentController::configure("path=/rec|type=video;codec=h264", &registry).is_err());

    let mut controller = SegmentController::from_params("path=/rec|type=video;codec=h264", &registry);
    assert!(controller.is_inert());
    let status = controller.streaming_status();
    assert!(!status.get());
    controller.set_streaming(false);
    controller.set_streaming(true);
    assert!(!controller.is_streaming());
    assert!(!status.get());
    controller.ingest(Some(keyframe(0)), None);
    assert!(controller.session_path().is_none());
}

#[test]
fn test_track_in_wrong_slot_is_inert() {
    let registry = BackendRegistry::with_builtin();
    let mut config = MuxerConfig::parse("name=memory;path=/rec").unwrap();
    config.video = Some(segmux_common::TrackConfig::audio(segmux_common::CodecType::Aac));
    assert!(SegmentController::from_config(config, &registry).is_err());
}

#[test]
fn test_extradata_recaptured_after_rotation() {
    let (mut controller, backend, _log) = setup(
        "name=memory;path=/rec;file_prefix=cam;file_duration=1|type=video;codec=h264",
    );
    feed_video(&mut controller, 0, 3_000_000, 1_000_000, false);
    let add_tracks = backend
        .ops()
        .into_iter()
        .filter(|op| matches!(op, MemoryOp::AddTrack { extradata_len, .. } if *extradata_len == 16))
        .count();
    assert_eq!(add_tracks, 3);
}

#[test]
fn test_open_failure_keeps_naming_progress() {
    let (mut controller, backend, _log) =
        setup("name=memory;path=/rec;file_prefix=cam;file_index=1|type=video;codec=h264");
    backend.set_faults(Faults {
        open: true,
        ..Faults::default()
    });
    controller.ingest(Some(keyframe(0)), None);
    backend.clear_faults();
    controller.set_streaming(true);
    controller.ingest(Some(keyframe(FRAME_US)), None);
    // cam_1 was consumed by the failed attempt.
    assert_eq!(controller.session_path(), Some("/rec/cam_2.mp4"));
}
