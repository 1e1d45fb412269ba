//! Routing hot-path benchmarks
//!
//! Assignment runs once per view, so it has to stay cheap for every variant
//! count the core accepts.

use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use headliner::ab_testing::{ABTest, SuccessMetric, TestStatus, TitleVariant, VariantRouter};
use headliner::chrono::{Duration, Utc};

fn active_test(variant_count: usize) -> ABTest {
    let now = Utc::now();
    let share = 100.0 / variant_count as f64;
    ABTest {
        test_id: format!("bench-{variant_count}"),
        content_id: "bench-content".to_string(),
        variants: (0..variant_count)
            .map(|i| TitleVariant::new(&format!("V{i}"), &format!("Title {i}"), share))
            .collect(),
        start_date: now,
        end_date: now + Duration::days(14),
        status: TestStatus::Active,
        min_sample_size: 100,
        success_metric: SuccessMetric::Ctr,
        created_at: now,
        updated_at: now,
        started_at: Some(now),
        ended_at: None,
        config: BTreeMap::new(),
    }
}

fn bench_bucket(c: &mut Criterion) {
    c.bench_function("bucket", |b| {
        b.iter(|| VariantRouter::bucket(black_box("bench-test"), black_box("viewer-123456")));
    });
}

fn bench_assign(c: &mut Criterion) {
    let mut group = c.benchmark_group("assign");

    for variants in [2, 3, 5] {
        let test = active_test(variants);
        let viewers: Vec<String> = (0..1000).map(|i| format!("viewer-{i}")).collect();

        group.bench_with_input(BenchmarkId::new("variants", variants), &test, |b, test| {
            let mut i = 0;
            b.iter(|| {
                i = (i + 1) % viewers.len();
                VariantRouter::assign(black_box(test), black_box(&viewers[i]))
                    .map(|v| v.traffic_percent)
            });
        });
    }

    group.finish();
}

criterion_group!(
    name = routing_benches;
    config = Criterion::default()
        .sample_size(200)
        .measurement_time(std::time::Duration::from_secs(3));
    targets = bench_bucket, bench_assign
);

criterion_main!(routing_benches);
