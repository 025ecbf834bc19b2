use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fastpng::parallel::estimate_timeout;
use fastpng::processing::{scan_directory, PreflightValidator};
use fastpng::TimeoutConfig;
use std::fs;
use tempfile::TempDir;

fn populated_dir(images: usize) -> TempDir {
    let dir = TempDir::new().unwrap();
    for i in 0..images {
        fs::write(dir.path().join(format!("image_{:05}.png", i)), b"png").unwrap();
        // Same amount of noise the scan has to skip
        fs::write(dir.path().join(format!("notes_{:05}.txt", i)), b"txt").unwrap();
    }
    dir
}

fn benchmark_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan_directory");

    for images in [100, 1_000, 5_000] {
        let dir = populated_dir(images);
        group.bench_with_input(BenchmarkId::from_parameter(images), &dir, |b, dir| {
            b.iter(|| scan_directory(black_box(dir.path())).unwrap());
        });
    }

    group.finish();
}

fn benchmark_timeout_budget(c: &mut Criterion) {
    let level = PreflightValidator::verify_level(7).unwrap();
    let config = TimeoutConfig::default();

    c.bench_function("estimate_timeout", |b| {
        b.iter(|| estimate_timeout(black_box(10_000), level, &config));
    });
}

criterion_group!(benches, benchmark_scan, benchmark_timeout_budget);
criterion_main!(benches);
