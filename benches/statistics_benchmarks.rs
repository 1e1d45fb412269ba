//! Significance engine and report benchmarks
//!
//! Reports run the full O(variants²) tournament, so the 5-variant case is the
//! one to watch.

use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use headliner::ab_testing::{
    LifecycleManager, ReportGenerator, StatisticsEngine, SuccessMetric, TestDefinition,
    VariantMetrics,
};
use headliner::chrono::{Duration, Utc};

fn snapshot(variant_count: usize) -> Vec<VariantMetrics> {
    (0..variant_count)
        .map(|i| {
            let clicks = 400 + 40 * i as u64;
            VariantMetrics::new(&format!("V{i}"), 5_000, clicks, 0.3 + 0.02 * i as f64)
        })
        .collect()
}

fn bench_pairwise(c: &mut Criterion) {
    let engine = StatisticsEngine::default();
    let metrics = snapshot(2);
    let mut group = c.benchmark_group("pairwise");

    for metric in [SuccessMetric::Ctr, SuccessMetric::Engagement, SuccessMetric::Views] {
        group.bench_function(metric.as_str(), |b| {
            b.iter(|| engine.compare(black_box(metric), &metrics[0], &metrics[1]));
        });
    }

    group.finish();
}

fn bench_tournament(c: &mut Criterion) {
    let engine = StatisticsEngine::default();
    let mut group = c.benchmark_group("tournament");

    for variants in [3, 4, 5] {
        let metrics = snapshot(variants);
        let refs: Vec<&VariantMetrics> = metrics.iter().collect();
        group.bench_with_input(BenchmarkId::new("ctr", variants), &refs, |b, refs| {
            b.iter(|| engine.multi_variant(SuccessMetric::Ctr, black_box(refs)));
        });
    }

    group.finish();
}

fn bench_report(c: &mut Criterion) {
    let manager = LifecycleManager::new();
    let start = Utc::now() - Duration::days(10);
    let mut definition = TestDefinition::builder("bench-content")
        .with_id("bench-report")
        .with_window(start, start + Duration::days(30));
    for i in 0..5 {
        definition = definition.with_variant(&format!("V{i}"), &format!("Title {i}"), 20.0);
    }
    manager.create_test(definition.build()).ok();
    let Ok(test) = manager.start_test("bench-report") else {
        return;
    };

    let metrics: HashMap<String, VariantMetrics> = snapshot(5)
        .into_iter()
        .map(|m| (m.variant_id.clone(), m))
        .collect();
    let generator = ReportGenerator::default();

    c.bench_function("report_5_variants", |b| {
        b.iter(|| generator.generate(black_box(&test), black_box(&metrics)));
    });
}

criterion_group!(
    name = statistics_benches;
    config = Criterion::default()
        .sample_size(100)
        .measurement_time(std::time::Duration::from_secs(3));
    targets = bench_pairwise, bench_tournament, bench_report
);

criterion_main!(statistics_benches);
