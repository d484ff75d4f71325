//! Sync engine benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nestsync_bench::{blog_with_comments, post_payload};
use nestsync_core::{Key, SyncConfig};

/// Full `save_and_sync` of a post with N new comments.
fn bench_create(c: &mut Criterion) {
    let mut group = c.benchmark_group("sync_create");

    for count in [10usize, 100, 500] {
        let data = post_payload(count, false);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &data, |b, data| {
            b.iter(|| {
                let blog = blog_with_comments(0);
                let mut post = blog.load("posts", Key::Int(1));
                let outcome = blog
                    .with_engine(|engine| engine.save_and_sync(&mut post, black_box(data)))
                    .unwrap();
                black_box(outcome);
            });
        });
    }

    group.finish();
}

/// Resync of unchanged data: validation plus lookups, no writes.
fn bench_resync(c: &mut Criterion) {
    let mut group = c.benchmark_group("sync_resync");

    for count in [10usize, 100, 500] {
        let blog = blog_with_comments(count);
        let data = post_payload(count, true);
        let mut post = blog.load("posts", Key::Int(1));
        blog.with_engine(|engine| engine.save_and_sync(&mut post, &data))
            .unwrap();

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("validated", count), &data, |b, data| {
            b.iter(|| {
                let mut post = blog.load("posts", Key::Int(1));
                let outcome = blog
                    .with_engine(|engine| engine.save_and_sync(&mut post, black_box(data)))
                    .unwrap();
                black_box(outcome);
            });
        });

        let unvalidated = SyncConfig::default().with_validation(false);
        group.bench_with_input(BenchmarkId::new("unvalidated", count), &data, |b, data| {
            b.iter(|| {
                let mut post = blog.load("posts", Key::Int(1));
                let outcome = blog
                    .with_engine_config(unvalidated.clone(), |engine| {
                        engine.save_and_sync(&mut post, black_box(data))
                    })
                    .unwrap();
                black_box(outcome);
            });
        });
    }

    group.finish();
}

/// Rule generation and validation without any store writes.
fn bench_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("validate");

    for count in [10usize, 100, 500] {
        let blog = blog_with_comments(count);
        let data = post_payload(count, true);
        let post = blog.load("posts", Key::Int(1));

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &data, |b, data| {
            b.iter(|| {
                blog.with_engine(|engine| {
                    engine.validate_for_sync(&post, engine.default_paths("posts")?, black_box(data))
                })
                .unwrap();
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_create, bench_resync, bench_validate);
criterion_main!(benches);
