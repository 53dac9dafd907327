//! Metrics aggregation facade and quality gates.
//!
//! The core never parses foreign formats; external adapters deliver
//! documents already shaped like [`MetricsDocument`]. Aggregation merges
//! them into one normalized bundle; gate evaluation compares the bundle
//! against configured thresholds.

mod bundle;
mod gate;

pub use bundle::{
    aggregate_metrics, parse_metrics_document, CoverageFile, CoverageMetrics, LintIssue,
    LintMetrics, MetricsBundle, MetricsDocument, SecurityIssue, SecurityMetrics, TestsMetrics,
    METRICS_SCHEMA_VERSION,
};
pub use gate::{evaluate_gates, GateCondition, GateReport, GateVerdict};
