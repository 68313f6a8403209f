use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use rift_buffer::{Buffer, BufferOptions, Logger, SourceId};
use std::hint::black_box;

fn quiet_buffer(bytes: &[u8]) -> Buffer {
    let buffer = Buffer::with_options(BufferOptions::default(), Logger::silent());
    buffer.load(bytes).unwrap();
    buffer
}

fn large_text() -> Vec<u8> {
    (0..10_000)
        .map(|i| format!("line {} of the quick brown fox\n", i))
        .collect::<String>()
        .into_bytes()
}

fn buffer_insertion(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_insertion");

    // Typing at the end of a small buffer
    group.bench_function("insert_byte_end", |b| {
        b.iter_batched(
            || quiet_buffer(b""),
            |buf| {
                for _ in 0..100 {
                    let len = buf.length();
                    let mut tx = buf.begin(SourceId::NONE);
                    tx.insert(len, black_box(b"a"));
                    tx.end().unwrap();
                }
                buf
            },
            BatchSize::SmallInput,
        )
    });

    static TEXT: &[u8] = b"The quick brown fox jumps over the lazy dog. ";
    group.throughput(Throughput::Bytes(TEXT.len() as u64));
    group.bench_function("insert_middle_large", |b| {
        let text = large_text();
        b.iter_batched(
            || quiet_buffer(&text),
            |buf| {
                let mut tx = buf.begin(SourceId::NONE);
                tx.insert(buf.length() / 2, black_box(TEXT));
                tx.end().unwrap();
                buf
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn buffer_batches(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_batches");
    let text = large_text();

    // One transaction touching every 100th line
    group.bench_function("multi_range_replace", |b| {
        b.iter_batched(
            || quiet_buffer(&text),
            |buf| {
                let mut tx = buf.begin(SourceId::NONE);
                for offset in (0..text.len() - 4).step_by(3100) {
                    tx.modify(offset, 4, b"LINE");
                }
                tx.end().unwrap();
                buf
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn buffer_reading(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_reading");
    let buf = quiet_buffer(&large_text());
    for i in 0..1000 {
        let mut tx = buf.begin(SourceId::NONE);
        tx.insert((i * 331) % buf.length(), b"xy");
        tx.end().unwrap();
    }
    group.throughput(Throughput::Bytes(buf.length() as u64));

    group.bench_function("cursor_scan", |b| {
        b.iter(|| {
            let snapshot = buf.snapshot();
            let cursor = snapshot.cursor(0).unwrap();
            black_box(cursor.filter(|&byte| byte == b'\n').count())
        })
    });

    group.bench_function("chunks_scan", |b| {
        b.iter(|| {
            let snapshot = buf.snapshot();
            let chunks = snapshot.chunks_in_range(0..snapshot.len()).unwrap();
            black_box(chunks.map(<[u8]>::len).sum::<usize>())
        })
    });

    group.bench_function("byte_at_random", |b| {
        let snapshot = buf.snapshot();
        b.iter(|| {
            let mut sum = 0u64;
            for i in 0..1000 {
                sum += u64::from(snapshot.byte_at((i * 7919) % snapshot.len()).unwrap_or(0));
            }
            black_box(sum)
        })
    });

    group.finish();
}

criterion_group!(benches, buffer_insertion, buffer_batches, buffer_reading);
criterion_main!(benches);
