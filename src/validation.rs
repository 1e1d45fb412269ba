//! Input validation for test definitions
//!
//! Each validator checks one field and returns a descriptive `anyhow` error;
//! the lifecycle manager tags it with the field name.

use std::collections::HashSet;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};

use crate::constants::{
    MAX_VARIANTS, MIN_SAMPLE_SIZE, MIN_VARIANTS, SUCCESS_METRICS, TRAFFIC_TOLERANCE,
    TRAFFIC_TOTAL_PERCENT,
};

/// Maximum identifier length (test ids, content ids, variant ids)
pub const MAX_ID_LENGTH: usize = 128;

/// Maximum title length
pub const MAX_TITLE_LENGTH: usize = 500;

/// Validate an identifier (test_id, content_id)
pub fn validate_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(anyhow!("cannot be empty"));
    }

    if id.len() > MAX_ID_LENGTH {
        return Err(anyhow!(
            "too long: {} chars (max: {})",
            id.len(),
            MAX_ID_LENGTH
        ));
    }

    Ok(())
}

/// Validate the variant count
pub fn validate_variant_count(count: usize) -> Result<()> {
    if !(MIN_VARIANTS..=MAX_VARIANTS).contains(&count) {
        return Err(anyhow!(
            "expected {MIN_VARIANTS}-{MAX_VARIANTS} variants, got {count}"
        ));
    }
    Ok(())
}

/// Validate that variant ids are non-empty and unique within the test
pub fn validate_variant_ids<'a>(ids: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        validate_id(id).map_err(|e| anyhow!("variant id '{id}' {e}"))?;
        if !seen.insert(id) {
            return Err(anyhow!("duplicate variant id '{id}'"));
        }
    }
    Ok(())
}

/// Validate a title
pub fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(anyhow!("title cannot be empty"));
    }

    if title.len() > MAX_TITLE_LENGTH {
        return Err(anyhow!(
            "title too long: {} chars (max: {})",
            title.len(),
            MAX_TITLE_LENGTH
        ));
    }

    Ok(())
}

/// Validate each split is within 0-100 and that the splits sum to 100 ± 0.1
pub fn validate_traffic_split(percents: &[f64]) -> Result<()> {
    for &percent in percents {
        if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
            return Err(anyhow!(
                "traffic_percent must be between 0 and 100, got: {percent}"
            ));
        }
    }

    let total: f64 = percents.iter().sum();
    if (total - TRAFFIC_TOTAL_PERCENT).abs() > TRAFFIC_TOLERANCE {
        return Err(anyhow!(
            "traffic percentages must sum to {TRAFFIC_TOTAL_PERCENT} (±{TRAFFIC_TOLERANCE}), got: {total}"
        ));
    }

    Ok(())
}

/// Validate the per-variant minimum sample size
pub fn validate_min_sample_size(min_sample_size: u64) -> Result<()> {
    if min_sample_size < MIN_SAMPLE_SIZE {
        return Err(anyhow!(
            "must be at least {MIN_SAMPLE_SIZE}, got: {min_sample_size}"
        ));
    }
    Ok(())
}

/// Validate the success metric name
pub fn validate_success_metric(metric: &str) -> Result<()> {
    if !SUCCESS_METRICS.contains(&metric) {
        return Err(anyhow!(
            "unknown metric '{metric}' (allowed: {})",
            SUCCESS_METRICS.join(", ")
        ));
    }
    Ok(())
}

/// Validate the test window
pub fn validate_window(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    if start >= end {
        return Err(anyhow!(
            "start_date ({}) must be before end_date ({})",
            start.to_rfc3339(),
            end.to_rfc3339()
        ));
    }
    Ok(())
}
