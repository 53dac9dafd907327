//! Normalized metrics model and aggregation.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const METRICS_SCHEMA_VERSION: u32 = 1;

/// Test totals from an external adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestsMetrics {
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub duration_ms: u64,
}

/// Coverage with optional per-file breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoverageMetrics {
    pub line_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_percent: Option<f64>,
    #[serde(default)]
    pub files: Vec<CoverageFile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoverageFile {
    pub path: String,
    pub covered_lines: u64,
    pub total_lines: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LintMetrics {
    pub issues: Vec<LintIssue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LintIssue {
    pub rule: String,
    /// `error`, `warning`, or `info`.
    pub severity: String,
    pub path: String,
    pub line: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityMetrics {
    pub issues: Vec<SecurityIssue>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityIssue {
    pub id: String,
    /// `critical`, `high`, `medium`, or `low`.
    pub severity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// One inbound document. Every section is optional; unknown keys make the
/// document malformed, which skips the source rather than the run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests: Option<TestsMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lint: Option<LintMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityMetrics>,
}

/// The single normalized bundle a run emits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsBundle {
    pub schema_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tests: Option<TestsMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lint: Option<LintMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityMetrics>,
    /// Source labels that contributed, in merge order.
    pub sources: Vec<String>,
}

impl MetricsBundle {
    #[must_use]
    pub fn lint_warning_count(&self) -> u64 {
        self.lint
            .as_ref()
            .map(|l| {
                l.issues
                    .iter()
                    .filter(|i| i.severity == "warning" || i.severity == "error")
                    .count() as u64
            })
            .unwrap_or(0)
    }

    #[must_use]
    pub fn critical_vulnerability_count(&self) -> u64 {
        self.security
            .as_ref()
            .map(|s| s.issues.iter().filter(|i| i.severity == "critical").count() as u64)
            .unwrap_or(0)
    }
}

/// Parse one inbound document. Errors here mean the source is skipped.
pub fn parse_metrics_document(content: &str) -> Result<MetricsDocument> {
    serde_json::from_str(content).context("metrics document does not match the normalized shape")
}

/// Merge documents in order: for each section, the last document providing
/// it wins. Issue lists are sorted for stable output.
#[must_use]
pub fn aggregate_metrics(documents: &[(String, MetricsDocument)]) -> MetricsBundle {
    let mut bundle = MetricsBundle {
        schema_version: METRICS_SCHEMA_VERSION,
        ..MetricsBundle::default()
    };
    for (label, document) in documents {
        if document.tests.is_some() {
            bundle.tests = document.tests.clone();
        }
        if document.coverage.is_some() {
            bundle.coverage = document.coverage.clone();
        }
        if document.lint.is_some() {
            bundle.lint = document.lint.clone();
        }
        if document.security.is_some() {
            bundle.security = document.security.clone();
        }
        bundle.sources.push(label.clone());
    }

    if let Some(coverage) = &mut bundle.coverage {
        coverage.files.sort_by(|a, b| a.path.cmp(&b.path));
    }
    if let Some(lint) = &mut bundle.lint {
        lint.issues
            .sort_by(|a, b| (&a.path, a.line, &a.rule).cmp(&(&b.path, b.line, &b.rule)));
    }
    if let Some(security) = &mut bundle.security {
        security
            .issues
            .sort_by(|a, b| (&a.severity, &a.id).cmp(&(&b.severity, &b.id)));
    }
    bundle
}
