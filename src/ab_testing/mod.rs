//! Title A/B testing
//!
//! - [`model`]: tests, variants, metrics snapshots and significance results
//! - [`lifecycle`]: registry and state machine
//! - [`router`]: deterministic identifier → variant assignment
//! - [`statistics`]: pairwise and tournament significance testing
//! - [`report`]: decision reports and recommendations

pub mod lifecycle;
pub mod model;
pub mod report;
pub mod router;
pub mod statistics;

pub use lifecycle::{
    CasOutcome, InMemoryTestRepository, LifecycleManager, LifecycleSummary, TestRepository,
};
pub use model::{
    ABTest, Improvement, LifecycleAction, SignificanceResult, SuccessMetric, TestDefinition,
    TestDefinitionBuilder, TestStatus, TitleVariant, VariantMetrics,
};
pub use report::{
    Decision, ReportGenerator, TestAnalysis, TestReport, TournamentDetail, VariantPerformance,
};
pub use router::VariantRouter;
pub use statistics::{
    MultiVariantResult, PairwiseComparison, SRMCheck, SRMSeverity, StatisticsEngine, VariantWins,
};
