use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use std::hint::black_box;
use std::sync::Arc;
use std::thread;
use tandem_core::{Buffer, Document};

fn filled(lines: usize, width: usize) -> Buffer {
    let mut buffer = Buffer::new();
    for line in 0..lines {
        for column in 0..width {
            buffer.insert(line, column, 'x');
        }
    }
    buffer
}

fn bench_append_line(c: &mut Criterion) {
    c.bench_function("append_80_chars", |b| {
        b.iter(|| {
            let mut buffer = Buffer::new();
            for column in 0..80 {
                buffer.insert(0, black_box(column), 'x');
            }
            black_box(buffer.char_count());
        })
    });
}

fn bench_insert_head(c: &mut Criterion) {
    c.bench_function("insert_head_1K", |b| {
        b.iter(|| {
            let mut buffer = Buffer::new();
            for _ in 0..1_000 {
                buffer.insert(0, 0, black_box('a'));
            }
            black_box(buffer.char_count());
        })
    });
}

fn bench_split_merge(c: &mut Criterion) {
    let base = filled(100, 80);
    c.bench_function("split_merge_mid_document", |b| {
        b.iter_batched(
            || base.clone(),
            |mut buffer| {
                buffer.insert_line_break(black_box(50), black_box(40));
                buffer.delete_line_break(black_box(50));
                black_box(buffer)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_render(c: &mut Criterion) {
    let buffer = filled(200, 80);
    c.bench_function("render_200x80", |b| {
        b.iter(|| black_box(buffer.to_string()))
    });
}

fn bench_contended_inserts(c: &mut Criterion) {
    c.bench_function("document_inserts_8_threads", |b| {
        b.iter(|| {
            let doc = Arc::new(Document::new("bench").unwrap());
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let doc = doc.clone();
                    thread::spawn(move || {
                        for _ in 0..100 {
                            doc.insert(0, 0, 'z');
                        }
                    })
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }
            black_box(doc.line_count());
        })
    });
}

criterion_group!(
    benches,
    bench_append_line,
    bench_insert_head,
    bench_split_merge,
    bench_render,
    bench_contended_inserts,
);
criterion_main!(benches);
