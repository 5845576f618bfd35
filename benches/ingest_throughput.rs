//! Benchmarks for the MCU record path
//!
//! Run with: cargo bench

use chrono::Local;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use linescan_capture::config::ImageFormat;
use linescan_capture::ingest::LineFramer;
use linescan_capture::{frame_filename, RecordQueue, TimestampRecord};

fn wire_bytes(messages: usize) -> Vec<u8> {
    let mut wire = Vec::new();
    for i in 0..messages {
        wire.extend_from_slice(format!("trigger-{},{}\n", i, i * 3).as_bytes());
    }
    wire
}

fn bench_line_framing(c: &mut Criterion) {
    let mut group = c.benchmark_group("line_framing");
    let wire = wire_bytes(1000);
    group.throughput(Throughput::Bytes(wire.len() as u64));

    for chunk in [1usize, 64, 1024].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(chunk), chunk, |b, &chunk| {
            b.iter(|| {
                let mut framer = LineFramer::new(65536);
                let mut count = 0;
                for piece in wire.chunks(chunk) {
                    framer.push(piece);
                    while let Ok(Some(line)) = framer.next_line() {
                        count += line.len();
                    }
                }
                black_box(count)
            });
        });
    }

    group.finish();
}

fn bench_record_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_queue");
    let now = Local::now();

    for size in [100usize, 10_000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("enqueue_drain", size), size, |b, &size| {
            let queue = RecordQueue::new();
            b.iter(|| {
                for i in 0..size {
                    queue.enqueue(TimestampRecord::new(format!("evt-{}", i), now));
                }
                let mut drained = 0;
                while let Some(record) = queue.try_dequeue() {
                    drained += record.payload().len();
                }
                black_box(drained)
            });
        });
    }

    group.finish();
}

fn bench_record_rendering(c: &mut Criterion) {
    let record = TimestampRecord::new("trigger-42", Local::now());
    c.bench_function("record_render", |b| b.iter(|| black_box(record.to_string())));
    c.bench_function("frame_filename", |b| {
        b.iter(|| {
            black_box(frame_filename(
                black_box(123_456),
                black_box(12.345678),
                black_box(1730557805.25),
                ImageFormat::Bmp,
            ))
        })
    });
}

criterion_group!(
    benches,
    bench_line_framing,
    bench_record_queue,
    bench_record_rendering
);
criterion_main!(benches);
