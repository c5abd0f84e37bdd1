use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use atelier_jobs::{JobId, JobSnapshot, PartSpec, derive_state, progress};

fn snapshot_with_parts(count: usize) -> JobSnapshot {
    (0..count)
        .fold(JobSnapshot::builder(JobId::new()), |b, i| {
            let spec = match i % 3 {
                0 => PartSpec::new(4).with_produced(4),
                1 => PartSpec::new(4).with_produced(2),
                _ => PartSpec::new(2),
            };
            b.part(format!("part{i}"), spec)
        })
        .build()
        .expect("bench snapshot")
}

fn bench_derive_state(c: &mut Criterion) {
    let mut group = c.benchmark_group("derive_state");

    for parts in [2usize, 8, 64] {
        let snapshot = snapshot_with_parts(parts);
        group.throughput(Throughput::Elements(parts as u64));
        group.bench_with_input(BenchmarkId::from_parameter(parts), &snapshot, |b, s| {
            b.iter(|| derive_state(black_box(s)))
        });
    }

    group.finish();
}

fn bench_progress(c: &mut Criterion) {
    let snapshot = snapshot_with_parts(8);
    c.bench_function("progress_8_parts", |b| b.iter(|| progress(black_box(&snapshot))));
}

fn bench_build_snapshot(c: &mut Criterion) {
    c.bench_function("build_snapshot_front_back", |b| {
        b.iter(|| {
            JobSnapshot::builder(JobId::new())
                .part("front", PartSpec::new(2).with_artifacts(["a.png", "b.png"]))
                .part("back", PartSpec::new(1))
                .build()
        })
    });
}

criterion_group!(benches, bench_derive_state, bench_progress, bench_build_snapshot);
criterion_main!(benches);
