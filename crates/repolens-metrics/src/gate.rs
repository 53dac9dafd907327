//! Threshold evaluation.

use repolens_config::Thresholds;
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::bundle::MetricsBundle;

/// Verdict for one condition or the whole report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GateVerdict {
    Pass,
    Fail,
    /// Threshold configured but its metric source was absent or skipped.
    NotEvaluated,
}

/// One evaluated threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateCondition {
    pub name: String,
    pub threshold: String,
    /// Observed value, absent when the metric source is missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    pub verdict: GateVerdict,
    pub reason: String,
}

/// The full gate report for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateReport {
    pub schema_version: u32,
    /// `pass` iff every evaluated condition passes. Absent thresholds and
    /// not-evaluated conditions do not affect the verdict.
    pub overall: GateVerdict,
    pub conditions: Vec<GateCondition>,
}

impl GateReport {
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.conditions
            .iter()
            .filter(|c| c.verdict == GateVerdict::Fail)
            .count()
    }

    #[must_use]
    pub fn evaluated_count(&self) -> usize {
        self.conditions
            .iter()
            .filter(|c| c.verdict != GateVerdict::NotEvaluated)
            .count()
    }
}

/// Evaluate the configured thresholds against the bundle.
///
/// Conditions appear in a fixed order so the report is byte-stable.
#[must_use]
pub fn evaluate_gates(thresholds: &Thresholds, bundle: &MetricsBundle) -> GateReport {
    let mut conditions = Vec::new();

    if let Some(min_coverage) = thresholds.min_coverage {
        conditions.push(match &bundle.coverage {
            Some(coverage) => {
                let actual = coverage.line_percent;
                if actual >= min_coverage {
                    condition(
                        "min_coverage",
                        format!(">= {min_coverage}"),
                        Some(format!("{actual}")),
                        GateVerdict::Pass,
                        format!("line coverage {actual}% meets the minimum {min_coverage}%"),
                    )
                } else {
                    condition(
                        "min_coverage",
                        format!(">= {min_coverage}"),
                        Some(format!("{actual}")),
                        GateVerdict::Fail,
                        format!("line coverage {actual}% is below the minimum {min_coverage}%"),
                    )
                }
            }
            None => not_evaluated("min_coverage", format!(">= {min_coverage}"), "coverage"),
        });
    }

    if let Some(max_failed) = thresholds.max_failed_tests {
        conditions.push(match &bundle.tests {
            Some(tests) => {
                let actual = tests.failed;
                if actual <= max_failed {
                    condition(
                        "max_failed_tests",
                        format!("<= {max_failed}"),
                        Some(actual.to_string()),
                        GateVerdict::Pass,
                        format!("{actual} failed test(s) within the allowed {max_failed}"),
                    )
                } else {
                    condition(
                        "max_failed_tests",
                        format!("<= {max_failed}"),
                        Some(actual.to_string()),
                        GateVerdict::Fail,
                        format!("{actual} failed test(s) exceed the allowed {max_failed}"),
                    )
                }
            }
            None => not_evaluated("max_failed_tests", format!("<= {max_failed}"), "tests"),
        });
    }

    if let Some(max_warnings) = thresholds.max_lint_warnings {
        conditions.push(match &bundle.lint {
            Some(_) => {
                let actual = bundle.lint_warning_count();
                if actual <= max_warnings {
                    condition(
                        "max_lint_warnings",
                        format!("<= {max_warnings}"),
                        Some(actual.to_string()),
                        GateVerdict::Pass,
                        format!("{actual} lint finding(s) within the allowed {max_warnings}"),
                    )
                } else {
                    condition(
                        "max_lint_warnings",
                        format!("<= {max_warnings}"),
                        Some(actual.to_string()),
                        GateVerdict::Fail,
                        format!("{actual} lint finding(s) exceed the allowed {max_warnings}"),
                    )
                }
            }
            None => not_evaluated("max_lint_warnings", format!("<= {max_warnings}"), "lint"),
        });
    }

    if let Some(max_critical) = thresholds.max_critical_vulnerabilities {
        conditions.push(match &bundle.security {
            Some(_) => {
                let actual = bundle.critical_vulnerability_count();
                if actual <= max_critical {
                    condition(
                        "max_critical_vulnerabilities",
                        format!("<= {max_critical}"),
                        Some(actual.to_string()),
                        GateVerdict::Pass,
                        format!("{actual} critical vulnerability(ies) within the allowed {max_critical}"),
                    )
                } else {
                    condition(
                        "max_critical_vulnerabilities",
                        format!("<= {max_critical}"),
                        Some(actual.to_string()),
                        GateVerdict::Fail,
                        format!("{actual} critical vulnerability(ies) exceed the allowed {max_critical}"),
                    )
                }
            }
            None => not_evaluated(
                "max_critical_vulnerabilities",
                format!("<= {max_critical}"),
                "security",
            ),
        });
    }

    let overall = if conditions.iter().any(|c| c.verdict == GateVerdict::Fail) {
        GateVerdict::Fail
    } else {
        GateVerdict::Pass
    };

    GateReport {
        schema_version: 1,
        overall,
        conditions,
    }
}

fn condition(
    name: &str,
    threshold: String,
    actual: Option<String>,
    verdict: GateVerdict,
    reason: String,
) -> GateCondition {
    GateCondition {
        name: name.to_string(),
        threshold,
        actual,
        verdict,
        reason,
    }
}

fn not_evaluated(name: &str, threshold: String, section: &str) -> GateCondition {
    condition(
        name,
        threshold,
        None,
        GateVerdict::NotEvaluated,
        format!("no `{section}` metrics were supplied; threshold not evaluated"),
    )
}
