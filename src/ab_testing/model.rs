//! Value types for title tests: definitions, lifecycle states, metrics
//! snapshots and significance outcomes.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::constants::MIN_SAMPLE_SIZE;

// =============================================================================
// LIFECYCLE
// =============================================================================

/// Status of a title test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// Defined and validated, not yet routing traffic
    Draft,
    /// Routing traffic and collecting metrics
    Active,
    /// Temporarily halted, can resume
    Paused,
    /// Concluded (terminal)
    Completed,
    /// Abandoned (terminal); the test stays in the registry
    Cancelled,
}

impl TestStatus {
    pub const ALL: [TestStatus; 5] = [
        TestStatus::Draft,
        TestStatus::Active,
        TestStatus::Paused,
        TestStatus::Completed,
        TestStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Draft => "draft",
            TestStatus::Active => "active",
            TestStatus::Paused => "paused",
            TestStatus::Completed => "completed",
            TestStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TestStatus::Completed | TestStatus::Cancelled)
    }

    /// Target state of `action` from this state, or `None` if illegal
    ///
    /// `DRAFT → ACTIVE ⇄ PAUSED → COMPLETED`, and any non-terminal state
    /// may be cancelled.
    pub fn apply(self, action: LifecycleAction) -> Option<TestStatus> {
        use LifecycleAction::*;
        use TestStatus::*;

        match (self, action) {
            (Draft, Start) => Some(Active),
            (Active, Pause) => Some(Paused),
            (Paused, Resume) => Some(Active),
            (Active | Paused, Complete) => Some(Completed),
            (Draft | Active | Paused, Cancel) => Some(Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle operations a caller can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleAction {
    Start,
    Pause,
    Resume,
    Complete,
    Cancel,
}

impl LifecycleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleAction::Start => "start",
            LifecycleAction::Pause => "pause",
            LifecycleAction::Resume => "resume",
            LifecycleAction::Complete => "complete",
            LifecycleAction::Cancel => "cancel",
        }
    }
}

/// Metric a test optimizes for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuccessMetric {
    Ctr,
    Engagement,
    Views,
}

impl SuccessMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuccessMetric::Ctr => "ctr",
            SuccessMetric::Engagement => "engagement",
            SuccessMetric::Views => "views",
        }
    }
}

impl fmt::Display for SuccessMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SuccessMetric {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ctr" => Ok(SuccessMetric::Ctr),
            "engagement" => Ok(SuccessMetric::Engagement),
            "views" => Ok(SuccessMetric::Views),
            other => Err(anyhow::anyhow!("unknown success metric '{other}'")),
        }
    }
}

// =============================================================================
// TEST DEFINITIONS
// =============================================================================

/// One title competing in a test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TitleVariant {
    /// Short code, unique within the test (e.g. "A")
    pub variant_id: String,
    pub title: String,
    /// Share of traffic routed to this variant (0-100)
    pub traffic_percent: f64,
}

impl TitleVariant {
    pub fn new(variant_id: &str, title: &str, traffic_percent: f64) -> Self {
        Self {
            variant_id: variant_id.to_string(),
            title: title.to_string(),
            traffic_percent,
        }
    }
}

/// A title test as held by the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ABTest {
    pub test_id: String,
    /// Subject under test (the video, article, ...)
    pub content_id: String,
    /// Ordered variants; routing walks them in this order
    pub variants: Vec<TitleVariant>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: TestStatus,
    /// Views needed per variant
    pub min_sample_size: u64,
    pub success_metric: SuccessMetric,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set on the first start
    pub started_at: Option<DateTime<Utc>>,
    /// Set when the test reaches a terminal state
    pub ended_at: Option<DateTime<Utc>>,
    /// Opaque caller configuration
    #[serde(default)]
    pub config: BTreeMap<String, serde_json::Value>,
}

impl ABTest {
    /// Look up a variant by id
    pub fn variant(&self, variant_id: &str) -> Option<&TitleVariant> {
        self.variants.iter().find(|v| v.variant_id == variant_id)
    }

    pub fn variant_ids(&self) -> impl Iterator<Item = &str> {
        self.variants.iter().map(|v| v.variant_id.as_str())
    }

    /// Whether the scheduled window has closed
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.end_date <= now
    }

    /// Apply a status change in place, stamping timestamps
    pub(crate) fn set_status(&mut self, status: TestStatus, at: DateTime<Utc>) {
        if status == TestStatus::Active && self.started_at.is_none() {
            self.started_at = Some(at);
        }
        if status.is_terminal() {
            self.ended_at = Some(at);
        }
        self.status = status;
        self.updated_at = at;
    }
}

/// Plain-value test definition handed to the lifecycle manager
///
/// The success metric stays a string here; it is checked at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestDefinition {
    pub test_id: String,
    pub content_id: String,
    pub variants: Vec<TitleVariant>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub min_sample_size: u64,
    pub success_metric: String,
    #[serde(default)]
    pub config: BTreeMap<String, serde_json::Value>,
}

impl TestDefinition {
    /// Create a new definition builder
    pub fn builder(content_id: &str) -> TestDefinitionBuilder {
        TestDefinitionBuilder::new(content_id)
    }
}

/// Builder for test definitions
///
/// Defaults: random UUID test id, a 14-day window starting now,
/// `min_sample_size` of 100, `ctr` as the success metric.
pub struct TestDefinitionBuilder {
    definition: TestDefinition,
}

impl TestDefinitionBuilder {
    pub fn new(content_id: &str) -> Self {
        let start = Utc::now();
        Self {
            definition: TestDefinition {
                test_id: Uuid::new_v4().to_string(),
                content_id: content_id.to_string(),
                variants: Vec::new(),
                start_date: start,
                end_date: start + Duration::days(14),
                min_sample_size: MIN_SAMPLE_SIZE,
                success_metric: SuccessMetric::Ctr.as_str().to_string(),
                config: BTreeMap::new(),
            },
        }
    }

    pub fn with_id(mut self, test_id: &str) -> Self {
        self.definition.test_id = test_id.to_string();
        self
    }

    pub fn with_variant(mut self, variant_id: &str, title: &str, traffic_percent: f64) -> Self {
        self.definition
            .variants
            .push(TitleVariant::new(variant_id, title, traffic_percent));
        self
    }

    pub fn with_window(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.definition.start_date = start;
        self.definition.end_date = end;
        self
    }

    pub fn with_min_sample_size(mut self, min: u64) -> Self {
        self.definition.min_sample_size = min;
        self
    }

    pub fn with_success_metric(mut self, metric: &str) -> Self {
        self.definition.success_metric = metric.to_string();
        self
    }

    pub fn with_config(mut self, key: &str, value: serde_json::Value) -> Self {
        self.definition.config.insert(key.to_string(), value);
        self
    }

    pub fn build(self) -> TestDefinition {
        self.definition
    }
}

// =============================================================================
// METRICS AND RESULTS
// =============================================================================

/// Externally accumulated counts for one variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantMetrics {
    pub variant_id: String,
    pub views: u64,
    /// Never more than `views`
    pub clicks: u64,
    /// Normalized engagement (0.0-1.0)
    pub engagement_score: f64,
}

impl VariantMetrics {
    pub fn new(variant_id: &str, views: u64, clicks: u64, engagement_score: f64) -> Self {
        Self {
            variant_id: variant_id.to_string(),
            views,
            clicks,
            engagement_score,
        }
    }

    /// Click-through rate as a percentage (0 with no views)
    pub fn ctr(&self) -> f64 {
        if self.views == 0 {
            0.0
        } else {
            self.clicks as f64 / self.views as f64 * 100.0
        }
    }

    /// Value of the given success metric, used to rank variants
    pub fn metric_value(&self, metric: SuccessMetric) -> f64 {
        match metric {
            SuccessMetric::Ctr => self.ctr(),
            SuccessMetric::Engagement => self.engagement_score,
            SuccessMetric::Views => self.views as f64,
        }
    }
}

/// Relative uplift of a winner over a loser, in percent
///
/// `Infinite` marks a zero baseline with a non-zero winner. Serialized as a
/// plain number, or the string `"infinite"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Improvement {
    Percent(f64),
    Infinite,
}

impl Improvement {
    /// Uplift of `winner` over `baseline`
    pub fn between(winner: f64, baseline: f64) -> Self {
        if baseline == 0.0 {
            if winner == 0.0 {
                Improvement::Percent(0.0)
            } else {
                Improvement::Infinite
            }
        } else {
            Improvement::Percent((winner - baseline) / baseline * 100.0)
        }
    }

    pub fn as_percent(&self) -> Option<f64> {
        match self {
            Improvement::Percent(p) => Some(*p),
            Improvement::Infinite => None,
        }
    }

    pub(crate) fn rounded(self, decimals: i32) -> Self {
        match self {
            Improvement::Percent(p) => Improvement::Percent(round_to(p, decimals)),
            Improvement::Infinite => Improvement::Infinite,
        }
    }
}

impl fmt::Display for Improvement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Improvement::Percent(p) => write!(f, "{p:.1}%"),
            Improvement::Infinite => write!(f, "∞ (zero baseline)"),
        }
    }
}

const INFINITE_MARKER: &str = "infinite";

impl Serialize for Improvement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Improvement::Percent(p) => serializer.serialize_f64(*p),
            Improvement::Infinite => serializer.serialize_str(INFINITE_MARKER),
        }
    }
}

impl<'de> Deserialize<'de> for Improvement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(f64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(p) => Ok(Improvement::Percent(p)),
            Repr::Text(s) if s == INFINITE_MARKER => Ok(Improvement::Infinite),
            Repr::Text(s) => Err(serde::de::Error::custom(format!(
                "expected a number or \"{INFINITE_MARKER}\", got \"{s}\""
            ))),
        }
    }
}

/// Outcome of one significance comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignificanceResult {
    pub p_value: f64,
    /// 100 · (1 − p_value)
    pub confidence: f64,
    pub is_significant: bool,
    /// Variant with the better metric value; `None` on an exact tie
    pub winning_variant: Option<String>,
    pub improvement: Option<Improvement>,
}

impl SignificanceResult {
    pub fn new(
        p_value: f64,
        significance_level: f64,
        winning_variant: Option<String>,
        improvement: Option<Improvement>,
    ) -> Self {
        let p_value = p_value.clamp(0.0, 1.0);
        Self {
            p_value,
            confidence: 100.0 * (1.0 - p_value),
            is_significant: p_value < significance_level,
            winning_variant,
            improvement,
        }
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
