//! Run summary rendering.
//!
//! The summary is the human entry point into a run directory: one Markdown
//! page cross-linking every artifact, with the delta, gate, and diagnostics
//! at a glance. Bytes are a pure function of the run's outputs.

use repolens_cache::DeltaReport;
use repolens_metrics::{GateReport, GateVerdict};
use repolens_utils::diagnostics::DiagnosticLedger;

use crate::manifest::Manifest;

/// Render `summary/summary.md`.
#[must_use]
pub fn render_summary(
    manifest: &Manifest,
    delta: &DeltaReport,
    gate: &GateReport,
    diagnostics: &DiagnosticLedger,
) -> String {
    let mut out = format!("# Run {}\n\n", manifest.run_id);
    out.push_str(&format!(
        "- Timestamp: {}\n- Tool version: {}\n- Files scanned: {}\n- Config digest: `{}`\n",
        manifest.timestamp_utc,
        manifest.tool_version,
        manifest.file_records.len(),
        &manifest.resolved_config_digest[..16.min(manifest.resolved_config_digest.len())],
    ));
    out.push_str("- Manifest: [manifest.json](../manifests/manifest.json)\n");

    out.push_str("\n## Delta\n\n");
    out.push_str(&format!(
        "| added | changed | removed | unchanged |\n|---|---|---|---|\n| {} | {} | {} | {} |\n",
        delta.summary.added, delta.summary.changed, delta.summary.removed, delta.summary.unchanged
    ));
    out.push_str("\nDetails: [delta.json](../delta/delta.json)\n");

    out.push_str("\n## Quality gate\n\n");
    out.push_str(&format!("Overall verdict: **{}**\n\n", gate.overall));
    if gate.conditions.is_empty() {
        out.push_str("No thresholds were configured.\n");
    } else {
        out.push_str("| threshold | bound | actual | verdict |\n|---|---|---|---|\n");
        for condition in &gate.conditions {
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                condition.name,
                condition.threshold,
                condition.actual.as_deref().unwrap_or("-"),
                condition.verdict
            ));
        }
    }
    out.push_str("\nDetails: [gate.json](../gates/gate.json), [metrics.json](../metrics/metrics.json)\n");

    out.push_str("\n## Artifacts\n\n");
    for artifact in &manifest.artifacts {
        out.push_str(&format!(
            "- [{}](../{}) ({})\n",
            artifact.relative_path, artifact.relative_path, artifact.kind
        ));
    }
    if !manifest.skips.is_empty() {
        out.push_str("\n### Skipped stages\n\n");
        for skip in &manifest.skips {
            out.push_str(&format!("- {}: {}\n", skip.stage, skip.reason));
        }
    }

    out.push_str("\n## Diagnostics\n\n");
    if diagnostics.is_empty() {
        out.push_str("_none_\n");
    } else {
        for diagnostic in diagnostics.entries() {
            match &diagnostic.path {
                Some(path) => out.push_str(&format!(
                    "- `{}` {}: {}\n",
                    diagnostic.code, path, diagnostic.message
                )),
                None => out.push_str(&format!("- `{}` {}\n", diagnostic.code, diagnostic.message)),
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{ArtifactEntry, Environment, MANIFEST_SCHEMA_VERSION};
    use repolens_cache::{classify_delta, CacheSnapshot};
    use repolens_config::Thresholds;
    use repolens_metrics::{aggregate_metrics, evaluate_gates};
    use repolens_utils::diagnostics::DiagnosticCode;

    fn manifest() -> Manifest {
        Manifest {
            schema_version: MANIFEST_SCHEMA_VERSION,
            run_id: "19700101T000000Z-abc".into(),
            timestamp_utc: "1970-01-01T00:00:00Z".into(),
            tool_version: "0.4.0".into(),
            config_version: "1".into(),
            seed: 0,
            resolved_config_digest: "c".repeat(64),
            environment: Environment::current(),
            file_records: vec![],
            artifacts: vec![ArtifactEntry {
                kind: "bundle".into(),
                relative_path: "bundles/all-0.txt".into(),
                digest: "e".repeat(64),
            }],
            skips: vec![],
        }
    }

    #[test]
    fn summary_cross_links_artifacts_and_sections() {
        let delta = classify_delta(&CacheSnapshot::default(), &[]);
        let metrics = aggregate_metrics(&[]);
        let gate = evaluate_gates(&Thresholds::default(), &metrics);
        let mut diagnostics = DiagnosticLedger::new();
        diagnostics.push(DiagnosticCode::MetricsSkipped, "bad.json skipped");

        let summary = render_summary(&manifest(), &delta, &gate, &diagnostics);
        assert!(summary.contains("[manifest.json](../manifests/manifest.json)"));
        assert!(summary.contains("[delta.json](../delta/delta.json)"));
        assert!(summary.contains("[bundles/all-0.txt](../bundles/all-0.txt)"));
        assert!(summary.contains("## Diagnostics"));
        assert!(summary.contains("metrics-skipped"));
        assert!(summary.contains("Overall verdict: **pass**"));
    }

    #[test]
    fn empty_diagnostics_render_none() {
        let delta = classify_delta(&CacheSnapshot::default(), &[]);
        let metrics = aggregate_metrics(&[]);
        let gate = evaluate_gates(&Thresholds::default(), &metrics);
        let summary = render_summary(&manifest(), &delta, &gate, &DiagnosticLedger::new());
        assert!(summary.contains("## Diagnostics\n\n_none_\n"));
    }
}
