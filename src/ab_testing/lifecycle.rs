//! Test registry and lifecycle manager
//!
//! The registry is a [`TestRepository`]: create, get, list and a
//! compare-and-swap on `status`. Every lifecycle call reads the current
//! status, checks the transition, then swaps only if nobody changed the
//! status in between, retrying against the newer state otherwise. That keeps
//! each read-validate-write atomic per `test_id` without any cross-key lock.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::ab_testing::model::{ABTest, LifecycleAction, SuccessMetric, TestDefinition, TestStatus};
use crate::errors::{ABTestError, Result, ValidationErrorExt};
use crate::metrics;
use crate::validation;

// =============================================================================
// REPOSITORY
// =============================================================================

/// Result of a conditional status update
#[derive(Debug, Clone, PartialEq)]
pub enum CasOutcome {
    /// Status matched and was replaced; carries the updated snapshot
    Swapped(ABTest),
    /// Status had moved on; carries the status actually found
    Conflict(TestStatus),
}

/// Storage for test definitions, keyed by `test_id`
///
/// Tests are never removed. Implementations must make
/// [`TestRepository::compare_and_swap_status`] atomic per key.
pub trait TestRepository: Send + Sync {
    /// Store a new test. Returns `false` if the id is already taken.
    fn insert(&self, test: ABTest) -> bool;

    /// Snapshot of one test
    fn get(&self, test_id: &str) -> Option<ABTest>;

    /// Set `status` to `new` only if it is currently `expected`
    fn compare_and_swap_status(
        &self,
        test_id: &str,
        expected: TestStatus,
        new: TestStatus,
        at: DateTime<Utc>,
    ) -> Result<CasOutcome>;

    /// Snapshot of every test
    fn list(&self) -> Vec<ABTest>;
}

/// In-process repository with one lock per test
#[derive(Debug, Clone, Default)]
pub struct InMemoryTestRepository {
    tests: Arc<RwLock<HashMap<String, Arc<Mutex<ABTest>>>>>,
}

impl InMemoryTestRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, test_id: &str) -> Option<Arc<Mutex<ABTest>>> {
        self.tests.read().get(test_id).cloned()
    }
}

impl TestRepository for InMemoryTestRepository {
    fn insert(&self, test: ABTest) -> bool {
        let mut tests = self.tests.write();
        if tests.contains_key(&test.test_id) {
            return false;
        }
        tests.insert(test.test_id.clone(), Arc::new(Mutex::new(test)));
        true
    }

    fn get(&self, test_id: &str) -> Option<ABTest> {
        self.entry(test_id).map(|entry| entry.lock().clone())
    }

    fn compare_and_swap_status(
        &self,
        test_id: &str,
        expected: TestStatus,
        new: TestStatus,
        at: DateTime<Utc>,
    ) -> Result<CasOutcome> {
        let entry = self
            .entry(test_id)
            .ok_or_else(|| ABTestError::TestNotFound(test_id.to_string()))?;

        let mut test = entry.lock();
        if test.status != expected {
            return Ok(CasOutcome::Conflict(test.status));
        }
        test.set_status(new, at);
        Ok(CasOutcome::Swapped(test.clone()))
    }

    fn list(&self) -> Vec<ABTest> {
        let entries: Vec<Arc<Mutex<ABTest>>> = self.tests.read().values().cloned().collect();
        let mut tests: Vec<ABTest> = entries.iter().map(|e| e.lock().clone()).collect();
        tests.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.test_id.cmp(&b.test_id))
        });
        tests
    }
}

// =============================================================================
// LIFECYCLE MANAGER
// =============================================================================

/// Counts of tests per lifecycle state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleSummary {
    pub total: usize,
    pub draft: usize,
    pub active: usize,
    pub paused: usize,
    pub completed: usize,
    pub cancelled: usize,
}

/// Validates, stores and transitions title tests
pub struct LifecycleManager<R: TestRepository = InMemoryTestRepository> {
    repository: R,
}

impl Default for LifecycleManager<InMemoryTestRepository> {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleManager<InMemoryTestRepository> {
    /// Manager over a fresh in-memory registry
    pub fn new() -> Self {
        Self::with_repository(InMemoryTestRepository::new())
    }
}

impl<R: TestRepository> LifecycleManager<R> {
    pub fn with_repository(repository: R) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Validate a definition and store it in DRAFT
    pub fn create_test(&self, definition: TestDefinition) -> Result<ABTest> {
        let result = self.build_and_insert(definition);
        match &result {
            Ok(test) => {
                metrics::record_created(true);
                info!(
                    test_id = %test.test_id,
                    content_id = %test.content_id,
                    variants = test.variants.len(),
                    metric = %test.success_metric,
                    "Created title test"
                );
            }
            Err(e) => {
                metrics::record_created(false);
                warn!(error = %e, "Rejected title test definition");
            }
        }
        result
    }

    fn build_and_insert(&self, definition: TestDefinition) -> Result<ABTest> {
        validation::validate_id(&definition.test_id).map_validation_err("test_id")?;
        validation::validate_id(&definition.content_id).map_validation_err("content_id")?;
        validation::validate_variant_count(definition.variants.len())
            .map_validation_err("variants")?;
        validation::validate_variant_ids(definition.variants.iter().map(|v| v.variant_id.as_str()))
            .map_validation_err("variants")?;
        for variant in &definition.variants {
            validation::validate_title(&variant.title).map_validation_err("variants.title")?;
        }
        let splits: Vec<f64> = definition.variants.iter().map(|v| v.traffic_percent).collect();
        validation::validate_traffic_split(&splits).map_validation_err("traffic_percent")?;
        validation::validate_min_sample_size(definition.min_sample_size)
            .map_validation_err("min_sample_size")?;
        validation::validate_success_metric(&definition.success_metric)
            .map_validation_err("success_metric")?;
        let success_metric: SuccessMetric = definition
            .success_metric
            .parse()
            .map_validation_err("success_metric")?;
        validation::validate_window(definition.start_date, definition.end_date)
            .map_validation_err("end_date")?;

        let now = Utc::now();
        let test = ABTest {
            test_id: definition.test_id,
            content_id: definition.content_id,
            variants: definition.variants,
            start_date: definition.start_date,
            end_date: definition.end_date,
            status: TestStatus::Draft,
            min_sample_size: definition.min_sample_size,
            success_metric,
            created_at: now,
            updated_at: now,
            started_at: None,
            ended_at: None,
            config: definition.config,
        };

        if !self.repository.insert(test.clone()) {
            return Err(ABTestError::configuration(
                "test_id",
                format!("test {} already exists", test.test_id),
            ));
        }
        Ok(test)
    }

    /// DRAFT → ACTIVE
    pub fn start_test(&self, test_id: &str) -> Result<ABTest> {
        self.transition(test_id, LifecycleAction::Start, Utc::now())
    }

    /// ACTIVE → PAUSED
    pub fn pause_test(&self, test_id: &str) -> Result<ABTest> {
        self.transition(test_id, LifecycleAction::Pause, Utc::now())
    }

    /// PAUSED → ACTIVE
    pub fn resume_test(&self, test_id: &str) -> Result<ABTest> {
        self.transition(test_id, LifecycleAction::Resume, Utc::now())
    }

    /// ACTIVE | PAUSED → COMPLETED
    pub fn complete_test(&self, test_id: &str) -> Result<ABTest> {
        self.transition(test_id, LifecycleAction::Complete, Utc::now())
    }

    /// Any non-terminal state → CANCELLED
    pub fn cancel_test(&self, test_id: &str) -> Result<ABTest> {
        self.transition(test_id, LifecycleAction::Cancel, Utc::now())
    }

    pub fn get_test(&self, test_id: &str) -> Result<ABTest> {
        self.repository
            .get(test_id)
            .ok_or_else(|| ABTestError::TestNotFound(test_id.to_string()))
    }

    /// Filtered snapshot, ordered by creation time
    pub fn list_tests(&self, status: Option<TestStatus>, content_id: Option<&str>) -> Vec<ABTest> {
        self.repository
            .list()
            .into_iter()
            .filter(|t| status.map_or(true, |s| t.status == s))
            .filter(|t| content_id.map_or(true, |c| t.content_id == c))
            .collect()
    }

    pub fn summary(&self) -> LifecycleSummary {
        let mut summary = LifecycleSummary::default();
        for test in self.repository.list() {
            summary.total += 1;
            match test.status {
                TestStatus::Draft => summary.draft += 1,
                TestStatus::Active => summary.active += 1,
                TestStatus::Paused => summary.paused += 1,
                TestStatus::Completed => summary.completed += 1,
                TestStatus::Cancelled => summary.cancelled += 1,
            }
        }
        summary
    }

    /// Set the per-status gauge from this registry's current counts
    ///
    /// The gauge is process-wide; with several managers it reflects the last
    /// one published.
    pub fn publish_metrics(&self) -> LifecycleSummary {
        let summary = self.summary();
        metrics::publish_status_counts(&summary);
        summary
    }

    /// Complete every running or paused test whose window closed by `now`
    ///
    /// Returns the ids that were completed by this sweep.
    pub fn complete_expired_tests(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut completed = Vec::new();
        for test in self.repository.list() {
            if !matches!(test.status, TestStatus::Active | TestStatus::Paused)
                || !test.is_expired(now)
            {
                continue;
            }
            // A concurrent cancel or complete may win; that test is skipped
            if self
                .transition(&test.test_id, LifecycleAction::Complete, now)
                .is_ok()
            {
                completed.push(test.test_id);
            }
        }
        if !completed.is_empty() {
            info!(count = completed.len(), "Completed expired title tests");
        }
        completed
    }

    fn transition(
        &self,
        test_id: &str,
        action: LifecycleAction,
        at: DateTime<Utc>,
    ) -> Result<ABTest> {
        let mut current = self.get_test(test_id)?.status;

        loop {
            let Some(target) = current.apply(action) else {
                metrics::record_transition(action.as_str(), false);
                warn!(
                    test_id,
                    action = action.as_str(),
                    from = %current,
                    "Rejected lifecycle transition"
                );
                return Err(ABTestError::StateTransition {
                    test_id: test_id.to_string(),
                    from: current,
                    action: action.as_str(),
                });
            };

            match self
                .repository
                .compare_and_swap_status(test_id, current, target, at)?
            {
                CasOutcome::Swapped(test) => {
                    metrics::record_transition(action.as_str(), true);
                    info!(
                        test_id,
                        from = %current,
                        to = %target,
                        "Title test transitioned"
                    );
                    return Ok(test);
                }
                // Someone else moved the test; re-check against their state
                CasOutcome::Conflict(actual) => current = actual,
            }
        }
    }
}
