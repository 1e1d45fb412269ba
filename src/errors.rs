//! Structured error types for the A/B testing core
//!
//! Every failure carries a machine-readable code so callers can branch on the
//! reason without parsing messages. Nothing here is retried internally: the
//! core performs no I/O, so each error reaches the caller synchronously.

use serde::{Deserialize, Serialize};

use crate::ab_testing::TestStatus;

/// Structured error payload for callers forwarding errors to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub code: String,

    /// Human-readable error message
    pub message: String,
}

/// Errors from A/B testing operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ABTestError {
    /// Invalid test definition, raised at creation and never retried
    #[error("Invalid test configuration for '{field}': {reason}")]
    Configuration { field: String, reason: String },

    /// Illegal lifecycle transition; the registry is left unchanged
    #[error("Cannot {action} test {test_id} in {from} state")]
    StateTransition {
        test_id: String,
        from: TestStatus,
        action: &'static str,
    },

    /// A variant has too few views for a comparison; retry later
    #[error("Insufficient data for variant {variant_id}: {views} views (need {required})")]
    InsufficientData {
        variant_id: String,
        views: u64,
        required: u64,
    },

    /// Report requested without metrics for every configured variant
    #[error("Missing metrics for variant {variant_id} of test {test_id}")]
    MissingMetrics { test_id: String, variant_id: String },

    #[error("Test not found: {0}")]
    TestNotFound(String),

    #[error("Test {test_id} is not active (status: {status})")]
    TestNotActive { test_id: String, status: TestStatus },

    #[error("Test {0} has no variants")]
    NoVariants(String),
}

impl ABTestError {
    pub(crate) fn configuration(field: &str, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Get error code for client identification
    pub fn code(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::StateTransition { .. } => "STATE_TRANSITION_ERROR",
            Self::InsufficientData { .. } => "INSUFFICIENT_DATA",
            Self::MissingMetrics { .. } => "MISSING_METRICS",
            Self::TestNotFound(_) => "TEST_NOT_FOUND",
            Self::TestNotActive { .. } => "TEST_NOT_ACTIVE",
            Self::NoVariants(_) => "NO_VARIANTS",
        }
    }

    /// Whether the caller can expect a different outcome by retrying later
    ///
    /// Only insufficient data recovers on its own, as views accumulate.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::InsufficientData { .. })
    }

    /// Convert to structured error response
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

/// Helper trait to convert validation errors
pub trait ValidationErrorExt<T> {
    fn map_validation_err(self, field: &str) -> Result<T>;
}

impl<T> ValidationErrorExt<T> for anyhow::Result<T> {
    fn map_validation_err(self, field: &str) -> Result<T> {
        self.map_err(|e| ABTestError::Configuration {
            field: field.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Type alias for Results using ABTestError
pub type Result<T> = std::result::Result<T, ABTestError>;
