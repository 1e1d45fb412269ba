//! Headliner Library
//!
//! Core of a title A/B testing pipeline: define a test over 2-5 competing
//! titles, route viewers to variants deterministically, and turn per-variant
//! metrics snapshots into a significance-backed decision report.
//!
//! # Key Features
//! - Lifecycle state machine over a pluggable test repository
//! - Stateless SHA-256 traffic splitting, stable across restarts
//! - Chi-square / z-score significance per success metric (ctr, engagement, views)
//! - Pairwise tournaments for 3-5 variants
//! - Reports with a recommendation and sample-ratio-mismatch check
//!
//! The core performs no I/O: persistence, metric collection and process
//! bootstrap belong to the embedding application.

pub mod ab_testing;
pub mod config;
pub mod constants;
pub mod errors;
pub mod metrics;
pub mod tracing_setup;
pub mod validation;

// Re-export dependencies to ensure tests/benchmarks use the same version
pub use chrono;
pub use parking_lot;
pub use uuid;
