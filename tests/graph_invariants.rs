//! Graph invariant enforcement and its exit-code mapping.

use repolens_graph::{validate_graph, Edge, EdgeKind, Graph, Node, NodeKind};
use repolens_utils::{ExitCode, RepolensError};
use std::collections::{BTreeMap, BTreeSet};

fn node(kind: NodeKind, scope: &str) -> Node {
    Node {
        id: Node::make_id(kind, scope),
        kind,
        label: scope.to_string(),
        attributes: BTreeMap::new(),
        provenance: BTreeSet::from(["fixture".to_string()]),
    }
}

#[test]
fn injected_containment_cycle_is_rejected_with_exit_3() {
    let mut graph = Graph::new();
    let run = node(NodeKind::Run, "run");
    let a = node(NodeKind::Module, "a");
    let b = node(NodeKind::Module, "b");
    // run -> a -> b -> a closes a cycle below the root
    graph.insert_edge(Edge::new(&run.id, EdgeKind::Contains, &a.id));
    graph.insert_edge(Edge::new(&a.id, EdgeKind::Contains, &b.id));
    graph.insert_edge(Edge::new(&b.id, EdgeKind::Contains, &a.id));
    for n in [run, a, b] {
        graph.upsert_node(n);
    }

    let err = validate_graph(&graph).unwrap_err();
    let wrapped: RepolensError = err.into();
    assert_eq!(wrapped.to_exit_code(), ExitCode::CONFIG);
    // the structured error names the offending ids
    let message = wrapped.to_string();
    assert!(
        message.contains(&Node::make_id(NodeKind::Module, "a"))
            || message.contains("parents"),
        "message did not name offending nodes: {message}"
    );
}

#[test]
fn orphaned_node_is_rejected_and_named() {
    let mut graph = Graph::new();
    let run = node(NodeKind::Run, "run");
    let island = node(NodeKind::Module, "island");
    let island_id = island.id.clone();
    graph.upsert_node(run);
    graph.upsert_node(island);

    let err = validate_graph(&graph).unwrap_err();
    assert!(err.to_string().contains(&island_id));
}

#[test]
fn provenance_is_required_on_every_node() {
    let mut graph = Graph::new();
    let mut run = node(NodeKind::Run, "run");
    run.provenance.clear();
    graph.upsert_node(run);

    let err = validate_graph(&graph).unwrap_err();
    assert!(err.to_string().contains("empty provenance"));
}
