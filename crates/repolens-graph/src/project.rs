//! Sorted subgraph projections.
//!
//! A projection selects node kinds and edge kinds and yields the sorted
//! `(id, kind, label)` and `(source_id, kind, target_id)` triples that
//! selection includes. Its digest is the subgraph identity consumed by the
//! diagram cache keys and the explain card ids.

use anyhow::Result;
use repolens_utils::canonical::emit_jcs;
use repolens_utils::digest::digest_str;
use serde::Serialize;
use std::collections::BTreeSet;

use crate::model::{EdgeKind, Graph, NodeKind};

/// The sorted projection of one kind selection.
#[derive(Debug, Clone, Serialize)]
pub struct Subgraph {
    /// `(id, kind, label)` sorted by id.
    pub nodes: Vec<(String, String, String)>,
    /// `(source_id, kind, target_id)` in key order.
    pub edges: Vec<(String, String, String)>,
}

impl Subgraph {
    /// Digest over the canonical serialization; stable across runs for an
    /// unchanged selection, insensitive to everything outside it.
    pub fn digest(&self) -> Result<String> {
        Ok(digest_str(&emit_jcs(self)?))
    }
}

/// Project the graph onto the given node and edge kinds. Edges survive only
/// when both endpoints do.
#[must_use]
pub fn project_kinds(graph: &Graph, node_kinds: &[NodeKind], edge_kinds: &[EdgeKind]) -> Subgraph {
    let kept_ids: BTreeSet<&str> = graph
        .nodes()
        .filter(|n| node_kinds.contains(&n.kind))
        .map(|n| n.id.as_str())
        .collect();

    let edges = graph
        .edges()
        .filter(|e| {
            edge_kinds.contains(&e.kind)
                && kept_ids.contains(e.source_id.as_str())
                && kept_ids.contains(e.target_id.as_str())
        })
        .map(|e| {
            (
                e.source_id.clone(),
                e.kind.to_string(),
                e.target_id.clone(),
            )
        })
        .collect();

    let nodes = graph
        .nodes()
        .filter(|n| kept_ids.contains(n.id.as_str()))
        .map(|n| (n.id.clone(), n.kind.to_string(), n.label.clone()))
        .collect();

    Subgraph { nodes, edges }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttrValue, Edge, Node};
    use std::collections::{BTreeMap, BTreeSet as Set};

    fn node(kind: NodeKind, scope: &str) -> Node {
        Node {
            id: Node::make_id(kind, scope),
            kind,
            label: scope.to_string(),
            attributes: BTreeMap::new(),
            provenance: Set::from(["p".to_string()]),
        }
    }

    fn sample_graph() -> Graph {
        let mut graph = Graph::new();
        let file = node(NodeKind::File, "a.py");
        let module = node(NodeKind::Module, "a");
        let test = node(NodeKind::Test, "a.test_f");
        graph.insert_edge(Edge::new(&file.id, EdgeKind::Contains, &module.id));
        graph.insert_edge(Edge::new(&test.id, EdgeKind::Tests, &module.id));
        for n in [file, module, test] {
            graph.upsert_node(n);
        }
        graph
    }

    #[test]
    fn edges_need_both_endpoints_in_the_selection() {
        let subgraph = project_kinds(
            &sample_graph(),
            &[NodeKind::File, NodeKind::Module],
            &[EdgeKind::Contains, EdgeKind::Tests],
        );
        // the tests edge has a source outside the selection
        assert_eq!(subgraph.nodes.len(), 2);
        assert_eq!(subgraph.edges.len(), 1);
        assert_eq!(subgraph.edges[0].1, "contains");
    }

    #[test]
    fn digest_ignores_changes_outside_the_selection() {
        let mut graph = sample_graph();
        let before = project_kinds(&graph, &[NodeKind::File], &[])
            .digest()
            .unwrap();

        // mutate a module attribute and add a test: neither is selected
        let module_id = Node::make_id(NodeKind::Module, "a");
        let mut module = graph.node(&module_id).unwrap().clone();
        module.attributes.insert("line".into(), AttrValue::Int(3));
        graph.upsert_node_replacing(module);
        graph.upsert_node(node(NodeKind::Test, "a.test_g"));

        let after = project_kinds(&graph, &[NodeKind::File], &[])
            .digest()
            .unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn digest_tracks_changes_inside_the_selection() {
        let graph = sample_graph();
        let before = project_kinds(&graph, &[NodeKind::Test], &[]).digest().unwrap();

        let mut grown = graph.clone();
        grown.upsert_node(node(NodeKind::Test, "a.test_g"));
        let after = project_kinds(&grown, &[NodeKind::Test], &[]).digest().unwrap();
        assert_ne!(before, after);
    }
}
