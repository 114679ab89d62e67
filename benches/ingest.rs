//! Benchmark controller ingest cycles against the in-memory backend.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use segmux_common::Buffer;
use segmux_record::{MemoryBackend, MuxerConfig, SegmentController};

const KEYFRAME: &[u8] = &[
    0, 0, 0, 1, 0x67, 0x42, 0x00, 0x1F, 0, 0, 0, 1, 0x68, 0xCE, 0x3C, 0x80, 0, 0, 0, 1, 0x65, 0x88,
];

fn controller(params: &str) -> SegmentController {
    SegmentController::new(
        MuxerConfig::parse(params).unwrap(),
        Arc::new(MemoryBackend::new()),
    )
}

fn frames(count: i64) -> Vec<(Buffer, Buffer)> {
    (0..count)
        .map(|i| {
            let ts = i * 40_000;
            let video = if i % 25 == 0 {
                Buffer::video(KEYFRAME.to_vec(), ts, true)
            } else {
                Buffer::video(vec![0, 0, 0, 1, 0x41, 0x9A, i as u8], ts, false)
            };
            (video, Buffer::audio(vec![0x21, 0x10, i as u8], ts))
        })
        .collect()
}

fn bench_ingest(c: &mut Criterion) {
    let input = frames(250);

    c.bench_function("ingest_250_frames_no_rotation", |b| {
        b.iter(|| {
            let mut c = controller(
                "name=memory;path=/rec;file_prefix=cam|type=video;codec=h264|type=audio;codec=aac",
            );
            for (video, audio) in &input {
                c.ingest(Some(video.clone()), Some(audio.clone()));
            }
            c.finish();
            black_box(c.stats())
        })
    });

    c.bench_function("ingest_250_frames_rotating", |b| {
        b.iter(|| {
            let mut c = controller(
                "name=memory;path=/rec;file_prefix=cam;file_index=1;file_duration=1\
                 |type=video;codec=h264|type=audio;codec=aac",
            );
            for (video, audio) in &input {
                c.ingest(Some(video.clone()), Some(audio.clone()));
            }
            c.finish();
            black_box(c.stats())
        })
    });

    c.bench_function("ingest_250_frames_callback", |b| {
        b.iter(|| {
            let mut c = controller("name=memory;output_type=mp4|type=video;codec=h264");
            let mut bytes = 0;
            for (video, _) in &input {
                c.ingest(Some(video.clone()), None);
                bytes += c.take_output().iter().map(Buffer::len).sum::<usize>();
            }
            c.finish();
            black_box(bytes)
        })
    });
}

criterion_group!(benches, bench_ingest);
criterion_main!(benches);
