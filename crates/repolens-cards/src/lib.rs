//! Explain card composer.
//!
//! Cards are composed strictly from the graph, the metrics bundle, and the
//! gate report; template-mode bytes are fixed by those inputs. Cards
//! reference node ids by value and never own graph state. There is no
//! generative backend here: absence of a local adapter is the normal case
//! and yields `template-fallback` status, never a network call.

use anyhow::Result;
use repolens_graph::{project_kinds, EdgeKind, Graph, GraphDiff, NodeKind, Subgraph};
use repolens_metrics::{GateReport, GateVerdict, MetricsBundle};
use repolens_utils::digest::digest_str;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum::{Display, EnumString};

pub const CARD_SCHEMA_VERSION: u32 = 1;

/// Closed set of card scopes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CardScope {
    Architecture,
    Quality,
    Tests,
}

/// One composed card: Markdown body plus machine-readable sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub schema_version: u32,
    pub id: String,
    pub scope: CardScope,
    /// `template-fallback` in every current configuration.
    pub status: String,
    pub review_history: Vec<String>,
    pub traceability: Traceability,
    #[serde(skip)]
    pub markdown: String,
}

/// What the card's statements are grounded on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Traceability {
    pub node_ids: Vec<String>,
    pub bundle_sequences: Vec<String>,
    pub metrics_keys: Vec<String>,
}

/// Everything the composer consumes.
#[derive(Debug)]
pub struct CardInputs<'a> {
    pub graph: &'a Graph,
    pub metrics: &'a MetricsBundle,
    pub gate: &'a GateReport,
    pub diff: Option<&'a GraphDiff>,
    /// Bundle file stems, e.g. `all-0`.
    pub bundle_stems: &'a [String],
}

/// Compose one card per scope, in scope order.
pub fn compose_cards(scopes: &[CardScope], inputs: &CardInputs<'_>) -> Result<Vec<Card>> {
    let mut sorted_scopes: Vec<CardScope> = scopes.to_vec();
    sorted_scopes.sort();
    sorted_scopes.dedup();
    sorted_scopes
        .into_iter()
        .map(|scope| compose_card(scope, inputs))
        .collect()
}

/// The subgraph a scope's statements are about; its digest seeds the card
/// id, so a change confined to another scope's subgraph never renames this
/// scope's card.
fn scope_subgraph(scope: CardScope, graph: &Graph) -> Subgraph {
    match scope {
        CardScope::Architecture => project_kinds(
            graph,
            &[NodeKind::File, NodeKind::Module],
            &[EdgeKind::Contains, EdgeKind::Imports],
        ),
        // quality metrics (coverage, lint, vulnerabilities) attach to files
        CardScope::Quality => project_kinds(graph, &[NodeKind::File], &[]),
        CardScope::Tests => project_kinds(
            graph,
            &[NodeKind::Test, NodeKind::Module],
            &[EdgeKind::Tests],
        ),
    }
}

fn card_id(scope: CardScope, subgraph_digest: &str) -> String {
    let mut id = digest_str(&format!("{scope}\u{1f}{subgraph_digest}"));
    id.truncate(16);
    id
}

fn compose_card(scope: CardScope, inputs: &CardInputs<'_>) -> Result<Card> {
    let (summary, rationale, edge_cases, traceability) = match scope {
        CardScope::Architecture => architecture_sections(inputs),
        CardScope::Quality => quality_sections(inputs),
        CardScope::Tests => tests_sections(inputs),
    };

    let subgraph_digest = scope_subgraph(scope, inputs.graph).digest()?;
    let id = card_id(scope, &subgraph_digest);
    let mut markdown = format!("# Explain card: {scope}\n\n## Summary\n\n{summary}\n");
    markdown.push_str(&format!("\n## Rationale\n\n{rationale}\n"));
    markdown.push_str(&format!("\n## Edge Cases\n\n{edge_cases}\n"));
    markdown.push_str("\n## Traceability\n\n");
    render_trace_list(&mut markdown, "Nodes", &traceability.node_ids);
    render_trace_list(&mut markdown, "Bundles", &traceability.bundle_sequences);
    render_trace_list(&mut markdown, "Metrics", &traceability.metrics_keys);

    Ok(Card {
        schema_version: CARD_SCHEMA_VERSION,
        id,
        scope,
        status: "template-fallback".to_string(),
        review_history: vec!["review_pending".to_string()],
        traceability,
        markdown,
    })
}

fn render_trace_list(out: &mut String, title: &str, items: &[String]) {
    out.push_str(&format!("### {title}\n\n"));
    if items.is_empty() {
        out.push_str("_none_\n\n");
        return;
    }
    for item in items {
        out.push_str(&format!("- `{item}`\n"));
    }
    out.push('\n');
}

fn architecture_sections(inputs: &CardInputs<'_>) -> (String, String, String, Traceability) {
    let files = inputs.graph.nodes_of_kind(NodeKind::File).count();
    let modules = inputs.graph.nodes_of_kind(NodeKind::Module).count();
    let imports = inputs.graph.edges_of_kind(EdgeKind::Imports).count();
    let dependencies = inputs.graph.nodes_of_kind(NodeKind::Dependency).count();

    let summary = format!(
        "The scanned tree resolves to {files} file(s) and {modules} module(s), \
         connected by {imports} intra-run import(s) and {dependencies} external dependenc(ies)."
    );
    let rationale = "Counts are taken from the validated knowledge graph; every module sits \
                     in a single containment chain under the run root, so the numbers partition \
                     the tree rather than sampling it."
        .to_string();
    let edge_cases = match inputs.diff {
        Some(diff) if !diff.is_empty() => format!(
            "Compared to the prior run, {} node(s) were added, {} removed, {} changed.",
            diff.added_nodes.len(),
            diff.removed_nodes.len(),
            diff.changed_nodes.len()
        ),
        Some(_) => "The graph is unchanged from the prior run.".to_string(),
        None => "No prior run was available for comparison.".to_string(),
    };

    let node_ids: Vec<String> = inputs
        .graph
        .nodes_of_kind(NodeKind::Module)
        .map(|n| n.id.clone())
        .collect();
    (
        summary,
        rationale,
        edge_cases,
        Traceability {
            node_ids,
            bundle_sequences: inputs.bundle_stems.to_vec(),
            metrics_keys: Vec::new(),
        },
    )
}

fn quality_sections(inputs: &CardInputs<'_>) -> (String, String, String, Traceability) {
    let mut metrics_keys = BTreeSet::new();
    let mut statements = Vec::new();
    if let Some(tests) = &inputs.metrics.tests {
        statements.push(format!(
            "{} of {} test(s) passed ({} failed, {} skipped)",
            tests.passed, tests.total, tests.failed, tests.skipped
        ));
        metrics_keys.insert("tests".to_string());
    }
    if let Some(coverage) = &inputs.metrics.coverage {
        statements.push(format!("line coverage is {}%", coverage.line_percent));
        metrics_keys.insert("coverage".to_string());
    }
    if inputs.metrics.lint.is_some() {
        statements.push(format!(
            "{} lint finding(s) at warning level or above",
            inputs.metrics.lint_warning_count()
        ));
        metrics_keys.insert("lint".to_string());
    }
    if inputs.metrics.security.is_some() {
        statements.push(format!(
            "{} critical vulnerability(ies)",
            inputs.metrics.critical_vulnerability_count()
        ));
        metrics_keys.insert("security".to_string());
    }
    let summary = if statements.is_empty() {
        "No external metrics were supplied for this run.".to_string()
    } else {
        format!("{}.", statements.join("; "))
    };

    let rationale = format!(
        "The quality gate verdict is `{}` across {} evaluated threshold(s).",
        inputs.gate.overall,
        inputs.gate.evaluated_count()
    );
    let failed: Vec<&str> = inputs
        .gate
        .conditions
        .iter()
        .filter(|c| c.verdict == GateVerdict::Fail)
        .map(|c| c.name.as_str())
        .collect();
    let edge_cases = if failed.is_empty() {
        "No thresholds are currently violated.".to_string()
    } else {
        format!("Violated thresholds: {}.", failed.join(", "))
    };

    (
        summary,
        rationale,
        edge_cases,
        Traceability {
            node_ids: Vec::new(),
            bundle_sequences: Vec::new(),
            metrics_keys: metrics_keys.into_iter().collect(),
        },
    )
}

fn tests_sections(inputs: &CardInputs<'_>) -> (String, String, String, Traceability) {
    let test_nodes: Vec<String> = inputs
        .graph
        .nodes_of_kind(NodeKind::Test)
        .map(|n| n.id.clone())
        .collect();
    let tests_edges = inputs.graph.edges_of_kind(EdgeKind::Tests).count();

    let summary = format!(
        "The tree declares {} test(s); {} of them are linked to a module under test.",
        test_nodes.len(),
        tests_edges
    );
    let rationale = "Test nodes come from per-file extraction; links to tested modules are \
                     resolved by name against the modules discovered in the same run."
        .to_string();
    let edge_cases = if test_nodes.is_empty() {
        "No test declarations were found in the scanned tree.".to_string()
    } else {
        "Tests whose target cannot be resolved are linked to their own module.".to_string()
    };

    (
        summary,
        rationale,
        edge_cases,
        Traceability {
            node_ids: test_nodes,
            bundle_sequences: Vec::new(),
            metrics_keys: inputs
                .metrics
                .tests
                .is_some()
                .then(|| vec!["tests".to_string()])
                .unwrap_or_default(),
        },
    )
}
