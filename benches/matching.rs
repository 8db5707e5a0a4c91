//! Matching benchmarks.
//!
//! - Index build time as the database grows
//! - Match time: cascade hashing vs exhaustive L2
//! - Effect of the bucket width on match time

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use syna_match::cascade::CascadeConfig;
use syna_match::{BruteForceMatcher, CascadeHashingMatcher, DescriptorMatrix, Descriptors, DistanceMetric};

const DIMS: usize = 128;

fn descriptors(rows: usize, seed: u64) -> Descriptors {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let data = (0..rows * DIMS).map(|_| rng.gen::<f32>()).collect();
    Descriptors::F32(DescriptorMatrix::from_flat(data, DIMS).expect("well-formed matrix"))
}

fn perturbed(base: &Descriptors, rows: usize, seed: u64) -> Descriptors {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let base = base.as_f32().expect("float descriptors");
    let data = base.as_slice()[..rows * DIMS]
        .iter()
        .map(|&x| x + rng.gen_range(-0.02..0.02))
        .collect();
    Descriptors::F32(DescriptorMatrix::from_flat(data, DIMS).expect("well-formed matrix"))
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build_index");
    group.sample_size(20);

    for &n in &[1_000usize, 5_000, 20_000] {
        let db = descriptors(n, 1);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &db, |b, db| {
            b.iter(|| {
                let mut matcher = CascadeHashingMatcher::default();
                matcher.build_index(black_box(db)).expect("index");
                matcher
            })
        });
    }
    group.finish();
}

fn bench_match(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_descriptors");
    group.sample_size(10);

    for &n in &[2_000usize, 10_000] {
        let db = descriptors(n, 2);
        let query = perturbed(&db, n / 2, 3);
        group.throughput(Throughput::Elements((n / 2) as u64));

        let mut cascade = CascadeHashingMatcher::default();
        cascade.build_index(&db).expect("index");
        group.bench_with_input(BenchmarkId::new("cascade", n), &query, |b, q| {
            b.iter(|| cascade.match_descriptors(black_box(q), 0.8, false).expect("match"))
        });

        let mut exhaustive = BruteForceMatcher::new(DistanceMetric::L2);
        exhaustive.build_index(&db).expect("index");
        group.bench_with_input(BenchmarkId::new("brute_force", n), &query, |b, q| {
            b.iter(|| exhaustive.match_descriptors(black_box(q), 0.8, false).expect("match"))
        });
    }
    group.finish();
}

fn bench_bucket_width(c: &mut Criterion) {
    let mut group = c.benchmark_group("bits_per_bucket");
    group.sample_size(10);

    let db = descriptors(10_000, 4);
    let query = perturbed(&db, 2_000, 5);

    for bits in [6u8, 8, 10, 12] {
        let config = CascadeConfig {
            bits_per_bucket: bits,
            ..Default::default()
        };
        let mut matcher = CascadeHashingMatcher::new(config);
        matcher.build_index(&db).expect("index");
        group.bench_with_input(BenchmarkId::from_parameter(bits), &query, |b, q| {
            b.iter(|| matcher.match_descriptors(black_box(q), 0.8, false).expect("match"))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_build, bench_match, bench_bucket_width);
criterion_main!(benches);
