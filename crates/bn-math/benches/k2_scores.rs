//! Criterion benchmarks for the K2 family score.

use bn_math::{log_k2_score, log_sum_exp};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn synthetic_table(q: usize, r: usize, rows_per_cell: u64) -> Vec<Vec<u64>> {
    (0..q)
        .map(|j| {
            (0..r)
                .map(|k| rows_per_cell + ((j * 7 + k * 3) as u64 % 11))
                .collect()
        })
        .collect()
}

fn bench_log_k2_score(c: &mut Criterion) {
    let mut group = c.benchmark_group("k2");

    for (q, r) in [(1usize, 2usize), (4, 3), (16, 4), (64, 5)] {
        let table = synthetic_table(q, r, 250);
        group.bench_with_input(
            BenchmarkId::new("log_k2_score", format!("q{q}_r{r}")),
            &table,
            |b, t| b.iter(|| black_box(log_k2_score(r, black_box(t)))),
        );
    }

    let scores: Vec<f64> = (0..32).map(|i| -(i as f64) * 13.5).collect();
    group.bench_function("candidate_normalizer", |b| {
        b.iter(|| black_box(log_sum_exp(black_box(&scores))))
    });

    group.finish();
}

criterion_group!(benches, bench_log_k2_score);
criterion_main!(benches);
