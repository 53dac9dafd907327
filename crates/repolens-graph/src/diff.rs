//! Inter-run graph diff.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{EdgeKind, Graph, NodeKind};

/// Summary of one node in a diff listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSummary {
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
}

/// Summary of one edge in a diff listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSummary {
    pub id: String,
    pub kind: EdgeKind,
    pub source_id: String,
    pub target_id: String,
}

/// Node and edge set differences between two graph snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDiff {
    pub schema_version: u32,
    pub added_nodes: Vec<NodeSummary>,
    pub removed_nodes: Vec<NodeSummary>,
    /// Same id, different label, attributes, or provenance.
    pub changed_nodes: Vec<NodeSummary>,
    pub added_edges: Vec<EdgeSummary>,
    pub removed_edges: Vec<EdgeSummary>,
}

impl GraphDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added_nodes.is_empty()
            && self.removed_nodes.is_empty()
            && self.changed_nodes.is_empty()
            && self.added_edges.is_empty()
            && self.removed_edges.is_empty()
    }
}

/// Diff `current` against `prior`. Listings inherit the graphs' sorted
/// iteration order, so output is deterministic.
#[must_use]
pub fn diff_graphs(prior: &Graph, current: &Graph) -> GraphDiff {
    let mut added_nodes = Vec::new();
    let mut changed_nodes = Vec::new();
    for node in current.nodes() {
        match prior.node(&node.id) {
            None => added_nodes.push(summarize(node)),
            Some(previous) => {
                if previous.label != node.label
                    || previous.attributes != node.attributes
                    || previous.provenance != node.provenance
                {
                    changed_nodes.push(summarize(node));
                }
            }
        }
    }

    let removed_nodes = prior
        .nodes()
        .filter(|n| current.node(&n.id).is_none())
        .map(summarize)
        .collect();

    let current_edge_ids: BTreeMap<&str, ()> =
        current.edges().map(|e| (e.id.as_str(), ())).collect();
    let prior_edge_ids: BTreeMap<&str, ()> = prior.edges().map(|e| (e.id.as_str(), ())).collect();

    let added_edges = current
        .edges()
        .filter(|e| !prior_edge_ids.contains_key(e.id.as_str()))
        .map(|e| EdgeSummary {
            id: e.id.clone(),
            kind: e.kind,
            source_id: e.source_id.clone(),
            target_id: e.target_id.clone(),
        })
        .collect();
    let removed_edges = prior
        .edges()
        .filter(|e| !current_edge_ids.contains_key(e.id.as_str()))
        .map(|e| EdgeSummary {
            id: e.id.clone(),
            kind: e.kind,
            source_id: e.source_id.clone(),
            target_id: e.target_id.clone(),
        })
        .collect();

    GraphDiff {
        schema_version: 1,
        added_nodes,
        removed_nodes,
        changed_nodes,
        added_edges,
        removed_edges,
    }
}

fn summarize(node: &crate::model::Node) -> NodeSummary {
    NodeSummary {
        id: node.id.clone(),
        kind: node.kind,
        label: node.label.clone(),
    }
}

/// Render the diff as Markdown grouped by kind. Empty sections render as
/// `_none_` so consecutive diffs stay line-comparable.
#[must_use]
pub fn render_diff_markdown(diff: &GraphDiff) -> String {
    let mut out = String::from("# Knowledge graph diff\n");

    for (title, nodes) in [
        ("Added nodes", &diff.added_nodes),
        ("Removed nodes", &diff.removed_nodes),
        ("Changed nodes", &diff.changed_nodes),
    ] {
        out.push_str(&format!("\n## {title}\n\n"));
        if nodes.is_empty() {
            out.push_str("_none_\n");
            continue;
        }
        let mut by_kind: BTreeMap<String, Vec<&NodeSummary>> = BTreeMap::new();
        for node in nodes {
            by_kind.entry(node.kind.to_string()).or_default().push(node);
        }
        for (kind, group) in by_kind {
            out.push_str(&format!("### {kind}\n\n"));
            for node in group {
                out.push_str(&format!("- `{}` {}\n", node.id, node.label));
            }
            out.push('\n');
        }
    }

    for (title, edges) in [
        ("Added edges", &diff.added_edges),
        ("Removed edges", &diff.removed_edges),
    ] {
        out.push_str(&format!("\n## {title}\n\n"));
        if edges.is_empty() {
            out.push_str("_none_\n");
            continue;
        }
        let mut by_kind: BTreeMap<String, Vec<&EdgeSummary>> = BTreeMap::new();
        for edge in edges {
            by_kind.entry(edge.kind.to_string()).or_default().push(edge);
        }
        for (kind, group) in by_kind {
            out.push_str(&format!("### {kind}\n\n"));
            for edge in group {
                out.push_str(&format!(
                    "- `{}` {} -> {}\n",
                    edge.id, edge.source_id, edge.target_id
                ));
            }
            out.push('\n');
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttrValue, Edge, Node};
    use std::collections::{BTreeMap as Map, BTreeSet};

    fn node(kind: NodeKind, scope: &str) -> Node {
        Node {
            id: Node::make_id(kind, scope),
            kind,
            label: scope.to_string(),
            attributes: Map::new(),
            provenance: BTreeSet::from(["p".to_string()]),
        }
    }

    fn graph_with(nodes: Vec<Node>, edges: Vec<Edge>) -> Graph {
        let mut graph = Graph::new();
        for edge in edges {
            graph.insert_edge(edge);
        }
        for n in nodes {
            graph.upsert_node(n);
        }
        graph
    }

    #[test]
    fn identical_graphs_diff_empty() {
        let a = graph_with(vec![node(NodeKind::Module, "m")], vec![]);
        let b = graph_with(vec![node(NodeKind::Module, "m")], vec![]);
        let diff = diff_graphs(&a, &b);
        assert!(diff.is_empty());
    }

    #[test]
    fn added_removed_and_changed_are_detected() {
        let prior = graph_with(
            vec![node(NodeKind::Module, "kept"), node(NodeKind::Module, "gone")],
            vec![],
        );
        let mut changed = node(NodeKind::Module, "kept");
        changed
            .attributes
            .insert("line".into(), AttrValue::Int(9));
        let current = graph_with(vec![changed, node(NodeKind::Module, "fresh")], vec![]);

        let diff = diff_graphs(&prior, &current);
        assert_eq!(diff.added_nodes.len(), 1);
        assert_eq!(diff.added_nodes[0].label, "fresh");
        assert_eq!(diff.removed_nodes.len(), 1);
        assert_eq!(diff.removed_nodes[0].label, "gone");
        assert_eq!(diff.changed_nodes.len(), 1);
        assert_eq!(diff.changed_nodes[0].label, "kept");
    }

    #[test]
    fn edge_changes_are_detected() {
        let a = node(NodeKind::File, "a.py");
        let m = node(NodeKind::Module, "a");
        let prior = graph_with(
            vec![a.clone(), m.clone()],
            vec![Edge::new(&a.id, EdgeKind::Contains, &m.id)],
        );
        let current = graph_with(
            vec![a.clone(), m.clone()],
            vec![Edge::new(&a.id, EdgeKind::Defines, &m.id)],
        );
        let diff = diff_graphs(&prior, &current);
        assert_eq!(diff.added_edges.len(), 1);
        assert_eq!(diff.removed_edges.len(), 1);
    }

    #[test]
    fn markdown_renders_none_for_empty_sections() {
        let diff = diff_graphs(&Graph::new(), &Graph::new());
        let markdown = render_diff_markdown(&diff);
        assert_eq!(markdown.matches("_none_").count(), 5);
        assert!(markdown.starts_with("# Knowledge graph diff\n"));
    }

    #[test]
    fn markdown_groups_by_kind() {
        let current = graph_with(
            vec![node(NodeKind::Module, "m"), node(NodeKind::File, "f.py")],
            vec![],
        );
        let markdown = render_diff_markdown(&diff_graphs(&Graph::new(), &current));
        assert!(markdown.contains("### file"));
        assert!(markdown.contains("### module"));
    }
}
