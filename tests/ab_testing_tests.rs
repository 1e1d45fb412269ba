//! End-to-end tests for the title testing core
//!
//! Covers the path a caller takes: define → start → route viewers → feed a
//! metrics snapshot → report, plus concurrent lifecycle races.
//!
//! Run with: cargo test --test ab_testing_tests -- --nocapture

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use headliner::ab_testing::{
    Decision, LifecycleManager, ReportGenerator, TestDefinition, TestStatus, VariantMetrics,
    VariantRouter,
};
use headliner::chrono::{Duration, Utc};
use headliner::errors::ABTestError;

fn three_way(test_id: &str) -> TestDefinition {
    let start = Utc::now() - Duration::days(10);
    TestDefinition::builder("video-cabin")
        .with_id(test_id)
        .with_variant("A", "I built a cabin", 40.0)
        .with_variant("B", "I built a cabin with no power tools", 30.0)
        .with_variant("C", "30 days, one axe, one cabin", 30.0)
        .with_window(start, start + Duration::days(21))
        .with_success_metric("ctr")
        .build()
}

#[test]
fn test_end_to_end_flow() {
    let manager = LifecycleManager::new();
    manager.create_test(three_way("e2e")).unwrap();

    // Drafts do not route
    let draft = manager.get_test("e2e").unwrap();
    assert_eq!(
        VariantRouter::assign(&draft, "viewer-1").unwrap_err().code(),
        "TEST_NOT_ACTIVE"
    );

    let active = manager.start_test("e2e").unwrap();

    // Simulate traffic: each viewer sees their assigned title, variant C converts best
    let mut metrics: HashMap<String, VariantMetrics> = active
        .variants
        .iter()
        .map(|v| (v.variant_id.clone(), VariantMetrics::new(&v.variant_id, 0, 0, 0.5)))
        .collect();
    for i in 0..12_000u64 {
        let variant = VariantRouter::assign_id(&active, &format!("viewer-{i}")).unwrap();
        let row = metrics.get_mut(&variant).unwrap();
        row.views += 1;
        let clicks_every = if variant == "C" { 6 } else { 10 };
        if i % clicks_every == 0 {
            row.clicks += 1;
        }
    }

    let report = ReportGenerator::default().generate(&active, &metrics).unwrap();

    assert_eq!(report.status, TestStatus::Active);
    assert_eq!(report.total_views, 12_000);
    assert_eq!(report.duration_days, 10);
    assert_eq!(report.decision, Decision::DeployWinner);
    assert_eq!(report.analysis.winning_variant.as_deref(), Some("C"));
    assert!(report.tournament.is_some());
    let srm = report.sample_ratio.unwrap();
    assert!(!srm.srm_detected, "router split drifted: {srm:?}");

    let completed = manager.complete_test("e2e").unwrap();
    assert_eq!(completed.status, TestStatus::Completed);
    assert!(VariantRouter::assign(&completed, "viewer-1").is_err());
}

#[test]
fn test_routing_is_deterministic_across_snapshots() {
    let manager = LifecycleManager::new();
    manager.create_test(three_way("stable")).unwrap();
    let first = manager.start_test("stable").unwrap();
    let second = manager.get_test("stable").unwrap();

    for i in 0..200 {
        let viewer = format!("viewer-{i}");
        assert_eq!(
            VariantRouter::assign_id(&first, &viewer).unwrap(),
            VariantRouter::assign_id(&second, &viewer).unwrap()
        );
    }
}

#[test]
fn test_report_for_identical_variants() {
    let manager = LifecycleManager::new();
    manager.create_test(three_way("flat")).unwrap();
    let test = manager.start_test("flat").unwrap();

    let metrics: HashMap<String, VariantMetrics> = ["A", "B", "C"]
        .iter()
        .map(|id| (id.to_string(), VariantMetrics::new(id, 1000, 100, 0.3)))
        .collect();

    let report = ReportGenerator::default().generate(&test, &metrics).unwrap();

    assert!(report.analysis.winning_variant.is_none());
    assert_eq!(report.decision, Decision::NoMeaningfulDifference);
    assert!(report.recommendation.starts_with("No meaningful difference"));
}

#[test]
fn test_concurrent_start_has_one_winner() {
    let manager = LifecycleManager::new();
    manager.create_test(three_way("race-start")).unwrap();
    let successes = AtomicUsize::new(0);

    std::thread::scope(|s| {
        for _ in 0..16 {
            s.spawn(|| {
                if manager.start_test("race-start").is_ok() {
                    successes.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
    });

    assert_eq!(successes.load(Ordering::SeqCst), 1);
    assert_eq!(
        manager.get_test("race-start").unwrap().status,
        TestStatus::Active
    );
}

#[test]
fn test_concurrent_start_and_cancel_stay_consistent() {
    for round in 0..50 {
        let manager = LifecycleManager::new();
        let id = format!("race-{round}");
        manager.create_test(three_way(&id)).unwrap();

        let (started, cancelled) = std::thread::scope(|s| {
            let start = s.spawn(|| manager.start_test(&id));
            let cancel = s.spawn(|| manager.cancel_test(&id));
            (start.join().unwrap(), cancel.join().unwrap())
        });

        // Cancel is legal from DRAFT and ACTIVE, so it always lands
        let cancelled = cancelled.unwrap();
        assert_eq!(cancelled.status, TestStatus::Cancelled);
        let final_state = manager.get_test(&id).unwrap();
        assert_eq!(final_state.status, TestStatus::Cancelled);

        match started {
            // Start went first; cancel then moved ACTIVE → CANCELLED
            Ok(test) => assert_eq!(test.status, TestStatus::Active),
            // Cancel went first; start saw a terminal test
            Err(ABTestError::StateTransition { from, .. }) => {
                assert_eq!(from, TestStatus::Cancelled);
                assert!(final_state.started_at.is_none());
            }
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
}

#[test]
fn test_concurrent_creates_on_distinct_keys() {
    let manager = LifecycleManager::new();

    std::thread::scope(|s| {
        for t in 0..8 {
            let manager = &manager;
            s.spawn(move || {
                for i in 0..25 {
                    manager
                        .create_test(three_way(&format!("t{t}-{i}")))
                        .unwrap();
                }
            });
        }
    });

    assert_eq!(manager.summary().draft, 200);
}

#[test]
fn test_error_response_is_machine_readable() {
    let manager = LifecycleManager::new();
    let mut definition = three_way("bad");
    definition.variants[0].traffic_percent = 10.0;

    let err = manager.create_test(definition).unwrap_err();
    let response = err.to_response();
    assert_eq!(response.code, "CONFIGURATION_ERROR");
    assert!(response.message.contains("traffic_percent"));
}
