//! Decision reports
//!
//! A report combines a test snapshot with one metrics snapshot per variant.
//! Two variants get a direct pairwise test. Three to five run the tournament
//! first, then a direct test between the winner and its strongest competitor
//! (or the top two by metric value when there is no winner), so the headline
//! numbers always come from a single two-way comparison.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ab_testing::model::{
    round_to, ABTest, Improvement, SignificanceResult, SuccessMetric, TestStatus, VariantMetrics,
};
use crate::ab_testing::statistics::{
    strongest_excluding, PairwiseComparison, SRMCheck, StatisticsEngine, VariantWins,
};
use crate::config::AnalysisConfig;
use crate::errors::{ABTestError, Result};

/// One row of the per-variant performance table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantPerformance {
    pub variant_id: String,
    pub title: String,
    pub views: u64,
    pub clicks: u64,
    /// Percent, 2 decimals
    pub ctr: f64,
    /// 3 decimals
    pub engagement_score: f64,
}

/// Headline significance numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestAnalysis {
    pub winning_variant: Option<String>,
    /// Percent, 1 decimal
    pub confidence: f64,
    /// 4 decimals
    pub p_value: f64,
    pub is_significant: bool,
    /// Percent, 1 decimal
    pub improvement: Option<Improvement>,
}

impl From<SignificanceResult> for TestAnalysis {
    fn from(result: SignificanceResult) -> Self {
        Self {
            winning_variant: result.winning_variant,
            confidence: round_to(result.confidence, 1),
            p_value: round_to(result.p_value, 4),
            is_significant: result.is_significant,
            improvement: result.improvement.map(|i| i.rounded(1)),
        }
    }
}

/// What the report tells the caller to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    InsufficientData,
    TooEarly,
    NoMeaningfulDifference,
    DeployWinner,
    Inconclusive,
}

/// Win counts and every pairwise result for 3-5 variant tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TournamentDetail {
    pub wins: Vec<VariantWins>,
    pub comparisons: Vec<PairwiseComparison>,
}

/// Immutable decision report for one test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub test_id: String,
    pub content_id: String,
    pub status: TestStatus,
    pub duration_days: i64,
    pub total_views: u64,
    pub success_metric: SuccessMetric,
    pub variants: Vec<VariantPerformance>,
    pub analysis: TestAnalysis,
    pub recommendation: String,
    pub decision: Decision,
    /// Observed split vs configured split; informational only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_ratio: Option<SRMCheck>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tournament: Option<TournamentDetail>,
    pub created_at: DateTime<Utc>,
}

impl TestReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Builds [`TestReport`]s from a test and its metrics snapshot
#[derive(Debug, Clone, Default)]
pub struct ReportGenerator {
    engine: StatisticsEngine,
}

impl ReportGenerator {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            engine: StatisticsEngine::new(config),
        }
    }

    pub fn engine(&self) -> &StatisticsEngine {
        &self.engine
    }

    /// Generate a report as of now
    pub fn generate(
        &self,
        test: &ABTest,
        metrics: &HashMap<String, VariantMetrics>,
    ) -> Result<TestReport> {
        self.generate_at(test, metrics, Utc::now())
    }

    /// Generate a report as of `now`
    ///
    /// Fails without a metrics entry for every variant, or when any variant is
    /// below the analysis view threshold. No partial report is produced.
    pub fn generate_at(
        &self,
        test: &ABTest,
        metrics: &HashMap<String, VariantMetrics>,
        now: DateTime<Utc>,
    ) -> Result<TestReport> {
        if test.variants.is_empty() {
            return Err(ABTestError::NoVariants(test.test_id.clone()));
        }

        let ordered = test
            .variants
            .iter()
            .map(|v| {
                metrics
                    .get(&v.variant_id)
                    .ok_or_else(|| ABTestError::MissingMetrics {
                        test_id: test.test_id.clone(),
                        variant_id: v.variant_id.clone(),
                    })
            })
            .collect::<Result<Vec<&VariantMetrics>>>()?;

        let metric = test.success_metric;
        let (result, tournament) = match ordered.as_slice() {
            [_] => {
                return Err(ABTestError::configuration(
                    "variants",
                    "a report needs at least two variants",
                ))
            }
            [a, b] => (self.engine.compare(metric, a, b)?, None),
            _ => self.tournament_analysis(test, &ordered)?,
        };

        let total_views = ordered
            .iter()
            .fold(0u64, |total, m| total.saturating_add(m.views));
        let duration_days = (test.end_date.min(now) - test.start_date).num_days().max(0);
        let sample_ratio = Some(self.engine.sample_ratio_check(&test.variants, &ordered));

        let analysis = TestAnalysis::from(result);
        let required_views = test.min_sample_size.saturating_mul(ordered.len() as u64);
        let decision = self.decide(&analysis, total_views, required_views, duration_days);
        let recommendation = self.recommendation(
            test,
            &analysis,
            decision,
            total_views,
            required_views,
            duration_days,
        );

        debug!(
            test_id = %test.test_id,
            decision = ?decision,
            p_value = analysis.p_value,
            winner = ?analysis.winning_variant,
            total_views,
            duration_days,
            "Generated test report"
        );

        let variants = test
            .variants
            .iter()
            .zip(&ordered)
            .map(|(variant, m)| VariantPerformance {
                variant_id: variant.variant_id.clone(),
                title: variant.title.clone(),
                views: m.views,
                clicks: m.clicks,
                ctr: round_to(m.ctr(), 2),
                engagement_score: round_to(m.engagement_score, 3),
            })
            .collect();

        Ok(TestReport {
            test_id: test.test_id.clone(),
            content_id: test.content_id.clone(),
            status: test.status,
            duration_days,
            total_views,
            success_metric: metric,
            variants,
            analysis,
            recommendation,
            decision,
            sample_ratio,
            tournament,
            created_at: now,
        })
    }

    /// Tournament, then one direct comparison for the headline numbers
    fn tournament_analysis(
        &self,
        test: &ABTest,
        ordered: &[&VariantMetrics],
    ) -> Result<(SignificanceResult, Option<TournamentDetail>)> {
        let metric = test.success_metric;
        let outcome = self.engine.multi_variant(metric, ordered)?;

        let find = |id: &str| ordered.iter().copied().find(|m| m.variant_id == id);
        let pair = match (&outcome.winner, &outcome.strongest_competitor) {
            (Some(winner), Some(competitor)) => find(winner).zip(find(competitor)),
            _ => top_two(metric, ordered),
        };

        let (first, second) = pair.ok_or_else(|| ABTestError::NoVariants(test.test_id.clone()))?;
        let mut result = self.engine.compare(metric, first, second)?;
        // Only the tournament names a winner, however the direct pair came out
        result.winning_variant = outcome.winner.clone();
        if outcome.winner.is_some() {
            result.improvement = outcome.improvement;
        }

        Ok((
            result,
            Some(TournamentDetail {
                wins: outcome.wins,
                comparisons: outcome.comparisons,
            }),
        ))
    }

    fn decide(
        &self,
        analysis: &TestAnalysis,
        total_views: u64,
        required_views: u64,
        duration_days: i64,
    ) -> Decision {
        if total_views < required_views {
            Decision::InsufficientData
        } else if !analysis.is_significant {
            if duration_days < self.engine.config().min_test_days {
                Decision::TooEarly
            } else {
                Decision::NoMeaningfulDifference
            }
        } else if analysis.winning_variant.is_some() {
            Decision::DeployWinner
        } else {
            Decision::Inconclusive
        }
    }

    fn recommendation(
        &self,
        test: &ABTest,
        analysis: &TestAnalysis,
        decision: Decision,
        total_views: u64,
        required_views: u64,
        duration_days: i64,
    ) -> String {
        match decision {
            Decision::InsufficientData => format!(
                "Insufficient data: {total_views} views collected, need at least {required_views}. Continue the test."
            ),
            Decision::TooEarly => format!(
                "Too early to call: no significant difference after {duration_days} days (minimum {}). Continue the test.",
                self.engine.config().min_test_days
            ),
            Decision::NoMeaningfulDifference => format!(
                "No meaningful difference after {duration_days} days. Pick a title on other grounds."
            ),
            Decision::DeployWinner => {
                let winner = analysis.winning_variant.as_deref().unwrap_or_default();
                let title = test.variant(winner).map(|v| v.title.as_str()).unwrap_or_default();
                let improvement = analysis
                    .improvement
                    .map(|i| i.to_string())
                    .unwrap_or_else(|| "n/a".to_string());
                format!(
                    "Deploy variant {winner} (\"{title}\"): {:.1}% confidence, {improvement} improvement in {}.",
                    analysis.confidence, test.success_metric
                )
            }
            Decision::Inconclusive => {
                "Inconclusive: significant difference without a clear winner. Extend the test.".to_string()
            }
        }
    }
}

/// Two best variants by metric value, best first
fn top_two<'a>(
    metric: SuccessMetric,
    ordered: &[&'a VariantMetrics],
) -> Option<(&'a VariantMetrics, &'a VariantMetrics)> {
    let best = strongest_excluding(metric, ordered, "")?;
    let runner_up = strongest_excluding(metric, ordered, &best.variant_id)?;
    Some((best, runner_up))
}
