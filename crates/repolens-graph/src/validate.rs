//! Schema invariant validation, run before any serialization.

use repolens_utils::error::InvariantError;
use std::collections::{BTreeMap, BTreeSet};

use crate::model::{EdgeKind, Graph, NodeKind};

/// Validate the graph's schema invariants.
///
/// Checked in order: non-empty provenance, edge endpoints exist, containment
/// is single-parented and acyclic, and every node is reachable from the run
/// root through `contains`. The first violation is returned with the
/// offending ids.
pub fn validate_graph(graph: &Graph) -> Result<(), InvariantError> {
    for node in graph.nodes() {
        if node.provenance.is_empty() {
            return Err(InvariantError::MissingProvenance {
                node_id: node.id.clone(),
            });
        }
    }

    for edge in graph.edges() {
        for endpoint in [&edge.source_id, &edge.target_id] {
            if graph.node(endpoint).is_none() {
                return Err(InvariantError::DanglingEdge {
                    edge_id: edge.id.clone(),
                    node_id: endpoint.clone(),
                });
            }
        }
    }

    let roots: Vec<&str> = graph
        .nodes_of_kind(NodeKind::Run)
        .map(|n| n.id.as_str())
        .collect();
    let root = match roots.as_slice() {
        [single] => *single,
        _ => {
            return Err(InvariantError::Orphans {
                node_ids: graph.nodes().map(|n| n.id.clone()).collect(),
            });
        }
    };

    // Single-parent check over the containment sub-graph
    let mut parents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for edge in graph.edges_of_kind(EdgeKind::Contains) {
        parents
            .entry(edge.target_id.as_str())
            .or_default()
            .push(edge.source_id.as_str());
    }
    for (child, parent_list) in &parents {
        if parent_list.len() > 1 {
            return Err(InvariantError::MultipleParents {
                node_id: (*child).to_string(),
                parent_count: parent_list.len(),
            });
        }
    }

    // Cycle check: follow parent links upward from every node; a node that
    // re-encounters itself is on a cycle.
    for node in graph.nodes() {
        let mut seen = BTreeSet::new();
        let mut current = node.id.as_str();
        let mut trail = vec![current.to_string()];
        while let Some(parent_list) = parents.get(current) {
            let parent = parent_list[0];
            if !seen.insert(parent) {
                return Err(InvariantError::ContainmentCycle { node_ids: trail });
            }
            trail.push(parent.to_string());
            if parent == node.id.as_str() {
                return Err(InvariantError::ContainmentCycle { node_ids: trail });
            }
            current = parent;
        }
    }

    // Reachability from the root through contains
    let mut children: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for edge in graph.edges_of_kind(EdgeKind::Contains) {
        children
            .entry(edge.source_id.as_str())
            .or_default()
            .push(edge.target_id.as_str());
    }
    let mut reached: BTreeSet<&str> = BTreeSet::new();
    let mut stack = vec![root];
    while let Some(current) = stack.pop() {
        if !reached.insert(current) {
            continue;
        }
        if let Some(kids) = children.get(current) {
            stack.extend(kids.iter().copied());
        }
    }
    let orphans: Vec<String> = graph
        .nodes()
        .filter(|n| !reached.contains(n.id.as_str()))
        .map(|n| n.id.clone())
        .collect();
    if !orphans.is_empty() {
        return Err(InvariantError::Orphans { node_ids: orphans });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttrValue, Edge, Node};
    use std::collections::BTreeMap as Map;

    fn node(kind: NodeKind, scope: &str) -> Node {
        Node {
            id: Node::make_id(kind, scope),
            kind,
            label: scope.to_string(),
            attributes: Map::new(),
            provenance: std::collections::BTreeSet::from(["test".to_string()]),
        }
    }

    fn valid_graph() -> Graph {
        let mut graph = Graph::new();
        let run = node(NodeKind::Run, "run");
        let file = node(NodeKind::File, "a.py");
        let module = node(NodeKind::Module, "a");
        graph.insert_edge(Edge::new(&run.id, EdgeKind::Contains, &file.id));
        graph.insert_edge(Edge::new(&file.id, EdgeKind::Contains, &module.id));
        graph.upsert_node(run);
        graph.upsert_node(file);
        graph.upsert_node(module);
        graph
    }

    #[test]
    fn valid_graph_passes() {
        assert!(validate_graph(&valid_graph()).is_ok());
    }

    #[test]
    fn empty_provenance_is_rejected() {
        let mut graph = valid_graph();
        let mut bad = node(NodeKind::Module, "a");
        bad.provenance.clear();
        graph.upsert_node_replacing(bad);
        assert!(matches!(
            validate_graph(&graph),
            Err(InvariantError::MissingProvenance { .. })
        ));
    }

    #[test]
    fn dangling_edge_is_rejected() {
        let mut graph = valid_graph();
        let ghost = Node::make_id(NodeKind::Module, "ghost");
        let file = Node::make_id(NodeKind::File, "a.py");
        graph.insert_edge(Edge::new(&file, EdgeKind::Contains, &ghost));
        assert!(matches!(
            validate_graph(&graph),
            Err(InvariantError::DanglingEdge { .. })
        ));
    }

    #[test]
    fn containment_cycle_is_rejected_with_ids() {
        let mut graph = valid_graph();
        // a.py -> a (existing), a -> a.py closes the cycle
        let file = Node::make_id(NodeKind::File, "a.py");
        let module = Node::make_id(NodeKind::Module, "a");
        graph.insert_edge(Edge::new(&module, EdgeKind::Contains, &file));
        let err = validate_graph(&graph).unwrap_err();
        match err {
            InvariantError::MultipleParents { .. } | InvariantError::ContainmentCycle { .. } => {}
            other => panic!("unexpected invariant error: {other}"),
        }
    }

    #[test]
    fn orphan_is_rejected() {
        let mut graph = valid_graph();
        graph.upsert_node(node(NodeKind::Module, "island"));
        let err = validate_graph(&graph).unwrap_err();
        match err {
            InvariantError::Orphans { node_ids } => {
                assert_eq!(node_ids, vec![Node::make_id(NodeKind::Module, "island")]);
            }
            other => panic!("unexpected invariant error: {other}"),
        }
    }

    #[test]
    fn multiple_parents_are_rejected() {
        let mut graph = valid_graph();
        let second_file = node(NodeKind::File, "b.py");
        let run = Node::make_id(NodeKind::Run, "run");
        let module = Node::make_id(NodeKind::Module, "a");
        graph.insert_edge(Edge::new(&run, EdgeKind::Contains, &second_file.id));
        graph.insert_edge(Edge::new(&second_file.id, EdgeKind::Contains, &module));
        graph.upsert_node(second_file);
        assert!(matches!(
            validate_graph(&graph),
            Err(InvariantError::MultipleParents { .. })
        ));
    }

    #[test]
    fn attribute_values_do_not_affect_validation() {
        let mut graph = valid_graph();
        let mut file = node(NodeKind::File, "a.py");
        file.attributes
            .insert("size_bytes".into(), AttrValue::Int(10));
        graph.upsert_node_replacing(file);
        assert!(validate_graph(&graph).is_ok());
    }
}
