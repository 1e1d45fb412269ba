//! Configuration for significance analysis and reporting
//!
//! Sensible defaults, with optional environment overrides for processes that
//! embed the core. Nothing in the core reads the environment on its own; only
//! callers that opt into [`AnalysisConfig::from_env`] do.

use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::constants::{
    DEFAULT_SIGNIFICANCE_LEVEL, MIN_SAMPLE_SIZE, MIN_TEST_DAYS, MIN_VIEWS_FOR_ANALYSIS,
};

/// How engagement scores are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementMethod {
    /// Fixed z-score bands (p≈0.03 / 0.15 / 0.5)
    #[default]
    Banded,
    /// Continuous two-sided p-value from the normal CDF
    NormalApprox,
}

impl fmt::Display for EngagementMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Banded => write!(f, "banded"),
            Self::NormalApprox => write!(f, "normal"),
        }
    }
}

impl FromStr for EngagementMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "banded" => Ok(Self::Banded),
            "normal" | "normal_approx" => Ok(Self::NormalApprox),
            other => Err(anyhow::anyhow!("unknown engagement method '{other}'")),
        }
    }
}

/// Analysis configuration shared by the statistics engine and report generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// p-value below which a comparison counts as significant (default: 0.05)
    pub significance_level: f64,

    /// Views every variant needs before comparisons run (default: 100)
    pub min_views_per_variant: u64,

    /// Days a non-significant test must run before calling it a wash (default: 7)
    pub min_test_days: i64,

    /// Apply Yates' continuity correction to 2x2 chi-square tests (default: true)
    pub yates_correction: bool,

    /// Engagement comparison method (default: banded)
    pub engagement_method: EngagementMethod,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            significance_level: DEFAULT_SIGNIFICANCE_LEVEL,
            min_views_per_variant: MIN_VIEWS_FOR_ANALYSIS,
            min_test_days: MIN_TEST_DAYS,
            yates_correction: true,
            engagement_method: EngagementMethod::Banded,
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from environment variables with defaults
    #[allow(clippy::field_reassign_with_default)] // Environment overrides require mutable config
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = env::var("HEADLINER_SIGNIFICANCE_LEVEL") {
            if let Ok(level) = val.parse::<f64>() {
                config.significance_level = level.clamp(0.001, 0.1);
            }
        }

        if let Ok(val) = env::var("HEADLINER_MIN_VIEWS") {
            if let Ok(n) = val.parse::<u64>() {
                config.min_views_per_variant = n.max(MIN_SAMPLE_SIZE);
            }
        }

        if let Ok(val) = env::var("HEADLINER_MIN_TEST_DAYS") {
            if let Ok(n) = val.parse::<i64>() {
                config.min_test_days = n.max(0);
            }
        }

        if let Ok(val) = env::var("HEADLINER_YATES_CORRECTION") {
            config.yates_correction = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = env::var("HEADLINER_ENGAGEMENT_METHOD") {
            match val.parse() {
                Ok(method) => config.engagement_method = method,
                Err(e) => tracing::warn!("Ignoring HEADLINER_ENGAGEMENT_METHOD: {e}"),
            }
        }

        config
    }

    /// Log the current configuration
    pub fn log(&self) {
        info!("📋 Analysis configuration:");
        info!("   Significance level: {}", self.significance_level);
        info!("   Min views per variant: {}", self.min_views_per_variant);
        info!("   Min test days: {}", self.min_test_days);
        info!(
            "   Yates correction: {}",
            if self.yates_correction { "on" } else { "off" }
        );
        info!("   Engagement method: {}", self.engagement_method);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();
        assert_eq!(config.significance_level, 0.05);
        assert_eq!(config.min_views_per_variant, 100);
        assert_eq!(config.min_test_days, 7);
        assert!(config.yates_correction);
        assert_eq!(config.engagement_method, EngagementMethod::Banded);
    }

    #[test]
    fn test_env_override() {
        env::set_var("HEADLINER_SIGNIFICANCE_LEVEL", "0.5");
        env::set_var("HEADLINER_MIN_VIEWS", "40");
        env::set_var("HEADLINER_ENGAGEMENT_METHOD", "normal");

        let config = AnalysisConfig::from_env();
        // Clamped into the accepted ranges
        assert_eq!(config.significance_level, 0.1);
        assert_eq!(config.min_views_per_variant, 100);
        assert_eq!(config.engagement_method, EngagementMethod::NormalApprox);

        env::remove_var("HEADLINER_SIGNIFICANCE_LEVEL");
        env::remove_var("HEADLINER_MIN_VIEWS");
        env::remove_var("HEADLINER_ENGAGEMENT_METHOD");
    }

    #[test]
    fn test_engagement_method_parsing() {
        assert_eq!(
            "Banded".parse::<EngagementMethod>().unwrap(),
            EngagementMethod::Banded
        );
        assert_eq!(
            "normal_approx".parse::<EngagementMethod>().unwrap(),
            EngagementMethod::NormalApprox
        );
        assert!("bayesian".parse::<EngagementMethod>().is_err());
    }
}
