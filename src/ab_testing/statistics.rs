//! Significance testing for title variants
//!
//! Pairwise tests per success metric:
//!
//! - **ctr**: chi-square test of independence on the 2x2 clicks / non-clicks
//!   table (df=1), optionally with Yates' continuity correction
//! - **engagement**: z-score of the absolute score difference against a
//!   simplified combined standard error, mapped to fixed p-value bands (or a
//!   continuous normal p-value when configured)
//! - **views**: chi-square goodness of fit against an even split of the
//!   pair's total views, p-value interpolated between df=1 critical values
//!
//! Three to five variants run a pairwise tournament: the variant with strictly
//! the most significant wins is the overall winner. Zero wins everywhere, or a
//! tie at the top, means no winner.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ab_testing::model::{
    Improvement, SignificanceResult, SuccessMetric, TitleVariant, VariantMetrics,
};
use crate::config::{AnalysisConfig, EngagementMethod};
use crate::constants::{
    CHI_SQUARED_CRITICAL_0001, CHI_SQUARED_CRITICAL_0001_BY_DF, CHI_SQUARED_CRITICAL_001,
    CHI_SQUARED_CRITICAL_005, CHI_SQUARED_CRITICAL_005_BY_DF, ENGAGEMENT_P_NONE,
    ENGAGEMENT_P_STRONG, ENGAGEMENT_P_WEAK, ENGAGEMENT_Z_STRONG, ENGAGEMENT_Z_WEAK,
};
use crate::errors::{ABTestError, Result};

// =============================================================================
// RESULT TYPES
// =============================================================================

/// One head-to-head comparison inside a tournament
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseComparison {
    pub variant_a: String,
    pub variant_b: String,
    pub result: SignificanceResult,
}

/// Significant wins collected by one variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantWins {
    pub variant_id: String,
    pub wins: u32,
}

/// Outcome of a 3-5 variant tournament
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiVariantResult {
    /// Every pair, in variant order
    pub comparisons: Vec<PairwiseComparison>,
    /// Wins per variant, in variant order
    pub wins: Vec<VariantWins>,
    /// Overall winner, only when one variant has strictly the most wins
    pub winner: Option<String>,
    /// Best-performing variant other than the winner
    pub strongest_competitor: Option<String>,
    /// Winner's uplift over the strongest competitor
    pub improvement: Option<Improvement>,
}

/// Severity of a sample ratio mismatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SRMSeverity {
    None,
    Warning,
    Critical,
}

/// Observed views versus the configured traffic split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SRMCheck {
    /// Whether the split looks broken (data quality issue)
    pub srm_detected: bool,
    pub chi_squared: f64,
    pub degrees_of_freedom: usize,
    pub severity: SRMSeverity,
}

// =============================================================================
// ENGINE
// =============================================================================

/// Pure significance engine over supplied metrics snapshots
#[derive(Debug, Clone, Default)]
pub struct StatisticsEngine {
    config: AnalysisConfig,
}

impl StatisticsEngine {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Compare two variants on the given metric
    pub fn compare(
        &self,
        metric: SuccessMetric,
        a: &VariantMetrics,
        b: &VariantMetrics,
    ) -> Result<SignificanceResult> {
        match metric {
            SuccessMetric::Ctr => self.ctr_significance(a, b),
            SuccessMetric::Engagement => self.engagement_significance(a, b),
            SuccessMetric::Views => self.views_significance(a, b),
        }
    }

    /// Chi-square test of independence on clicks vs non-clicks
    pub fn ctr_significance(
        &self,
        a: &VariantMetrics,
        b: &VariantMetrics,
    ) -> Result<SignificanceResult> {
        self.check_inputs([a, b])?;

        let chi_squared = chi_squared_2x2(
            a.clicks,
            a.views,
            b.clicks,
            b.views,
            self.config.yates_correction,
        );
        let p_value = chi_squared_df1_p_value(chi_squared);

        debug!(
            variant_a = %a.variant_id,
            variant_b = %b.variant_id,
            ctr_a = a.ctr(),
            ctr_b = b.ctr(),
            chi_squared,
            p_value,
            "ctr comparison"
        );

        Ok(self.result_for(SuccessMetric::Ctr, a, b, p_value))
    }

    /// z-score comparison of normalized engagement scores
    pub fn engagement_significance(
        &self,
        a: &VariantMetrics,
        b: &VariantMetrics,
    ) -> Result<SignificanceResult> {
        self.check_inputs([a, b])?;

        let z = engagement_z_score(a, b);
        let p_value = match self.config.engagement_method {
            EngagementMethod::Banded => {
                if z > ENGAGEMENT_Z_STRONG {
                    ENGAGEMENT_P_STRONG
                } else if z > ENGAGEMENT_Z_WEAK {
                    ENGAGEMENT_P_WEAK
                } else {
                    ENGAGEMENT_P_NONE
                }
            }
            EngagementMethod::NormalApprox => erfc(z / std::f64::consts::SQRT_2),
        };

        debug!(
            variant_a = %a.variant_id,
            variant_b = %b.variant_id,
            z,
            p_value,
            method = %self.config.engagement_method,
            "engagement comparison"
        );

        Ok(self.result_for(SuccessMetric::Engagement, a, b, p_value))
    }

    /// Goodness of fit of the pair's views against a 50/50 split
    pub fn views_significance(
        &self,
        a: &VariantMetrics,
        b: &VariantMetrics,
    ) -> Result<SignificanceResult> {
        self.check_inputs([a, b])?;

        let expected = (a.views + b.views) as f64 / 2.0;
        let chi_squared = if expected > 0.0 {
            ((a.views as f64 - expected).powi(2) + (b.views as f64 - expected).powi(2)) / expected
        } else {
            0.0
        };
        let p_value = banded_p_value(chi_squared);

        debug!(
            variant_a = %a.variant_id,
            variant_b = %b.variant_id,
            chi_squared,
            p_value,
            "views comparison"
        );

        Ok(self.result_for(SuccessMetric::Views, a, b, p_value))
    }

    /// Pairwise tournament across 3-5 variants
    pub fn multi_variant(
        &self,
        metric: SuccessMetric,
        variants: &[&VariantMetrics],
    ) -> Result<MultiVariantResult> {
        self.check_inputs(variants.iter().copied())?;

        let mut wins: Vec<VariantWins> = variants
            .iter()
            .map(|m| VariantWins {
                variant_id: m.variant_id.clone(),
                wins: 0,
            })
            .collect();
        let mut comparisons =
            Vec::with_capacity(variants.len() * variants.len().saturating_sub(1) / 2);

        for (i, a) in variants.iter().enumerate() {
            for b in &variants[i + 1..] {
                let result = self.compare(metric, a, b)?;
                if result.is_significant {
                    if let Some(winner) = &result.winning_variant {
                        if let Some(entry) = wins.iter_mut().find(|w| &w.variant_id == winner) {
                            entry.wins += 1;
                        }
                    }
                }
                comparisons.push(PairwiseComparison {
                    variant_a: a.variant_id.clone(),
                    variant_b: b.variant_id.clone(),
                    result,
                });
            }
        }

        let winner = sole_leader(&wins);
        let (strongest_competitor, improvement) = match &winner {
            Some(winner_id) => {
                let winner_metrics = variants.iter().find(|m| &m.variant_id == winner_id);
                let competitor = winner_metrics
                    .and_then(|w| strongest_below(metric, variants, w));
                match (winner_metrics, competitor) {
                    (Some(w), Some(c)) => (
                        Some(c.variant_id.clone()),
                        Some(Improvement::between(
                            w.metric_value(metric),
                            c.metric_value(metric),
                        )),
                    ),
                    _ => (None, None),
                }
            }
            None => (None, None),
        };

        debug!(
            metric = %metric,
            variants = variants.len(),
            winner = ?winner,
            competitor = ?strongest_competitor,
            "multi-variant tournament"
        );

        Ok(MultiVariantResult {
            comparisons,
            wins,
            winner,
            strongest_competitor,
            improvement,
        })
    }

    /// Check observed views against the configured traffic split
    ///
    /// Variants without metrics are skipped. Severity comes from the
    /// chi-square critical values for df = variants - 1.
    pub fn sample_ratio_check(
        &self,
        variants: &[TitleVariant],
        metrics: &[&VariantMetrics],
    ) -> SRMCheck {
        let observed: Vec<(f64, u64)> = variants
            .iter()
            .filter_map(|v| {
                metrics
                    .iter()
                    .find(|m| m.variant_id == v.variant_id)
                    .map(|m| (v.traffic_percent, m.views))
            })
            .collect();

        let total: u64 = observed.iter().map(|(_, views)| views).sum();
        let degrees_of_freedom = observed.len().saturating_sub(1);
        if total == 0 || degrees_of_freedom == 0 {
            return SRMCheck {
                srm_detected: false,
                chi_squared: 0.0,
                degrees_of_freedom,
                severity: SRMSeverity::None,
            };
        }

        // Views on a variant configured for 0% traffic is a broken split outright
        let mut unexpected_traffic = false;
        let chi_squared: f64 = observed
            .iter()
            .map(|&(percent, views)| {
                let expected = total as f64 * percent / 100.0;
                if expected > 0.0 {
                    (views as f64 - expected).powi(2) / expected
                } else {
                    unexpected_traffic |= views > 0;
                    0.0
                }
            })
            .sum();

        let idx = (degrees_of_freedom - 1).min(CHI_SQUARED_CRITICAL_005_BY_DF.len() - 1);
        let critical = chi_squared > CHI_SQUARED_CRITICAL_0001_BY_DF[idx];
        let severity = if unexpected_traffic || critical {
            SRMSeverity::Critical
        } else if chi_squared > CHI_SQUARED_CRITICAL_005_BY_DF[idx] {
            SRMSeverity::Warning
        } else {
            SRMSeverity::None
        };

        SRMCheck {
            srm_detected: severity != SRMSeverity::None,
            chi_squared,
            degrees_of_freedom,
            severity,
        }
    }

    /// Every variant needs enough views and sane counts
    fn check_inputs<'a>(
        &self,
        metrics: impl IntoIterator<Item = &'a VariantMetrics>,
    ) -> Result<()> {
        for m in metrics {
            if m.clicks > m.views {
                return Err(ABTestError::configuration(
                    "metrics",
                    format!(
                        "variant {} has more clicks ({}) than views ({})",
                        m.variant_id, m.clicks, m.views
                    ),
                ));
            }
            if !(0.0..=1.0).contains(&m.engagement_score) {
                return Err(ABTestError::configuration(
                    "metrics",
                    format!(
                        "variant {} engagement_score must be within 0.0-1.0, got {}",
                        m.variant_id, m.engagement_score
                    ),
                ));
            }
            if m.views < self.config.min_views_per_variant {
                return Err(ABTestError::InsufficientData {
                    variant_id: m.variant_id.clone(),
                    views: m.views,
                    required: self.config.min_views_per_variant,
                });
            }
        }
        Ok(())
    }

    /// Winner is the better metric value; ties have no winner
    fn result_for(
        &self,
        metric: SuccessMetric,
        a: &VariantMetrics,
        b: &VariantMetrics,
        p_value: f64,
    ) -> SignificanceResult {
        let value_a = a.metric_value(metric);
        let value_b = b.metric_value(metric);

        let (winner, improvement) = if value_a > value_b {
            (Some(a.variant_id.clone()), Some(Improvement::between(value_a, value_b)))
        } else if value_b > value_a {
            (Some(b.variant_id.clone()), Some(Improvement::between(value_b, value_a)))
        } else {
            (None, Some(Improvement::Percent(0.0)))
        };

        SignificanceResult::new(p_value, self.config.significance_level, winner, improvement)
    }
}

fn sole_leader(wins: &[VariantWins]) -> Option<String> {
    let max = wins.iter().map(|w| w.wins).max().unwrap_or(0);
    if max == 0 {
        return None;
    }
    let mut leaders = wins.iter().filter(|w| w.wins == max);
    match (leaders.next(), leaders.next()) {
        (Some(leader), None) => Some(leader.variant_id.clone()),
        _ => None,
    }
}

/// Best variant by metric value other than `excluded` (first wins ties)
pub(crate) fn strongest_excluding<'a>(
    metric: SuccessMetric,
    variants: &[&'a VariantMetrics],
    excluded: &str,
) -> Option<&'a VariantMetrics> {
    variants
        .iter()
        .copied()
        .filter(|m| m.variant_id != excluded)
        .fold(None::<&'a VariantMetrics>, |best, m| match best {
            Some(b) if b.metric_value(metric) >= m.metric_value(metric) => Some(b),
            _ => Some(m),
        })
}

/// Best variant other than `leader` whose metric value does not exceed it
///
/// A tournament winner beat at least one variant significantly, so there is
/// always a candidate. Variants above the winner without significant wins
/// are never its competitor.
fn strongest_below<'a>(
    metric: SuccessMetric,
    variants: &[&'a VariantMetrics],
    leader: &VariantMetrics,
) -> Option<&'a VariantMetrics> {
    let ceiling = leader.metric_value(metric);
    let candidates: Vec<&'a VariantMetrics> = variants
        .iter()
        .copied()
        .filter(|m| m.metric_value(metric) <= ceiling)
        .collect();
    strongest_excluding(metric, &candidates, &leader.variant_id)
}

// =============================================================================
// DISTRIBUTION HELPERS
// =============================================================================

/// Chi-squared statistic for a 2x2 table of (successes, trials) per row
///
/// Returns 0 when a row or column total is empty. Successes are capped at
/// the trial count.
pub fn chi_squared_2x2(x1: u64, n1: u64, x2: u64, n2: u64, yates: bool) -> f64 {
    // Successes beyond the trial count are capped
    let (x1, x2) = (x1.min(n1), x2.min(n2));
    let observed = [
        [x1 as f64, (n1 - x1) as f64],
        [x2 as f64, (n2 - x2) as f64],
    ];
    let rows = [n1 as f64, n2 as f64];
    let cols = [observed[0][0] + observed[1][0], observed[0][1] + observed[1][1]];
    let total = rows[0] + rows[1];

    if rows.iter().chain(cols.iter()).any(|&t| t == 0.0) {
        return 0.0;
    }

    let mut chi_squared = 0.0;
    for (i, row) in observed.iter().enumerate() {
        for (j, &cell) in row.iter().enumerate() {
            let expected = rows[i] * cols[j] / total;
            let mut deviation = (cell - expected).abs();
            if yates {
                deviation = (deviation - 0.5).max(0.0);
            }
            chi_squared += deviation.powi(2) / expected;
        }
    }
    chi_squared
}

/// Upper-tail p-value of the chi-squared distribution with df=1
pub fn chi_squared_df1_p_value(chi_squared: f64) -> f64 {
    if chi_squared <= 0.0 {
        return 1.0;
    }
    erfc((chi_squared / 2.0).sqrt())
}

/// Piecewise p-value from the df=1 critical values
///
/// Interpolates 1.0 → 0.05 below 3.841, 0.05 → 0.01 up to 6.635,
/// 0.01 → 0.001 up to 10.83, and decays below 0.001 beyond.
pub fn banded_p_value(chi_squared: f64) -> f64 {
    fn lerp(x: f64, x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
        y0 + (x - x0) / (x1 - x0) * (y1 - y0)
    }

    if chi_squared <= 0.0 {
        1.0
    } else if chi_squared <= CHI_SQUARED_CRITICAL_005 {
        lerp(chi_squared, 0.0, CHI_SQUARED_CRITICAL_005, 1.0, 0.05)
    } else if chi_squared <= CHI_SQUARED_CRITICAL_001 {
        lerp(
            chi_squared,
            CHI_SQUARED_CRITICAL_005,
            CHI_SQUARED_CRITICAL_001,
            0.05,
            0.01,
        )
    } else if chi_squared <= CHI_SQUARED_CRITICAL_0001 {
        lerp(
            chi_squared,
            CHI_SQUARED_CRITICAL_001,
            CHI_SQUARED_CRITICAL_0001,
            0.01,
            0.001,
        )
    } else {
        0.001 * CHI_SQUARED_CRITICAL_0001 / chi_squared
    }
}

/// |Δ engagement| over sqrt(p1(1-p1)/n1 + p2(1-p2)/n2)
fn engagement_z_score(a: &VariantMetrics, b: &VariantMetrics) -> f64 {
    let diff = (a.engagement_score - b.engagement_score).abs();
    let variance = a.engagement_score * (1.0 - a.engagement_score) / a.views as f64
        + b.engagement_score * (1.0 - b.engagement_score) / b.views as f64;
    let se = variance.sqrt();

    if se > 0.0 {
        diff / se
    } else if diff > 0.0 {
        f64::INFINITY
    } else {
        0.0
    }
}

/// Complementary error function (Abramowitz-Stegun 7.1.26, |ε| < 1.5e-7)
///
/// Evaluated directly so tiny tail probabilities never go negative.
fn erfc(x: f64) -> f64 {
    if x < 0.0 {
        return 2.0 - erfc(-x);
    }
    if x.is_infinite() {
        return 0.0;
    }

    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let t = 1.0 / (1.0 + p * x);
    ((((a5 * t + a4) * t + a3) * t + a2) * t + a1) * t * (-x * x).exp()
}
