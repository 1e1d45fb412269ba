//! Documented constants for the title A/B testing core
//!
//! Every threshold the lifecycle, router and statistics engine rely on lives
//! here so the numbers are tuned in one place.

// =============================================================================
// TEST DEFINITION LIMITS
// =============================================================================

/// Fewest variants a test may carry (a control and one challenger)
pub const MIN_VARIANTS: usize = 2;

/// Most variants a test may carry
///
/// Pairwise tournaments are O(n²); five variants means ten comparisons.
pub const MAX_VARIANTS: usize = 5;

/// Total traffic across variants must equal this
pub const TRAFFIC_TOTAL_PERCENT: f64 = 100.0;

/// Tolerance on the traffic total (percentage points)
pub const TRAFFIC_TOLERANCE: f64 = 0.1;

/// Smallest allowed `min_sample_size` (views per variant)
pub const MIN_SAMPLE_SIZE: u64 = 100;

/// Accepted success metric names
pub const SUCCESS_METRICS: [&str; 3] = ["ctr", "engagement", "views"];

// =============================================================================
// ROUTING
// =============================================================================

/// Number of hash buckets the router maps identifiers into
///
/// 10,000 buckets give 0.01 percentage-point resolution over [0, 100).
pub const ROUTING_BUCKETS: u64 = 10_000;

// =============================================================================
// SIGNIFICANCE
// =============================================================================

/// Default significance level (p < 0.05)
pub const DEFAULT_SIGNIFICANCE_LEVEL: f64 = 0.05;

/// Views every variant needs before any comparison runs
pub const MIN_VIEWS_FOR_ANALYSIS: u64 = 100;

/// Chi-squared critical values, df=1
/// p=0.05 -> 3.841, p=0.01 -> 6.635, p=0.001 -> 10.83
pub const CHI_SQUARED_CRITICAL_005: f64 = 3.841;
pub const CHI_SQUARED_CRITICAL_001: f64 = 6.635;
pub const CHI_SQUARED_CRITICAL_0001: f64 = 10.83;

/// Chi-squared critical values at p=0.05 for df = 1..=4
pub const CHI_SQUARED_CRITICAL_005_BY_DF: [f64; 4] = [3.841, 5.991, 7.815, 9.488];

/// Chi-squared critical values at p=0.001 for df = 1..=4
pub const CHI_SQUARED_CRITICAL_0001_BY_DF: [f64; 4] = [10.828, 13.816, 16.266, 18.467];

/// Engagement z-score bands
///
/// z > 1.96 maps to p≈0.03, z > 1.0 to p≈0.15, anything lower to p≈0.5.
pub const ENGAGEMENT_Z_STRONG: f64 = 1.96;
pub const ENGAGEMENT_Z_WEAK: f64 = 1.0;
pub const ENGAGEMENT_P_STRONG: f64 = 0.03;
pub const ENGAGEMENT_P_WEAK: f64 = 0.15;
pub const ENGAGEMENT_P_NONE: f64 = 0.5;

// =============================================================================
// REPORTING
// =============================================================================

/// A non-significant test younger than this keeps running
pub const MIN_TEST_DAYS: i64 = 7;
