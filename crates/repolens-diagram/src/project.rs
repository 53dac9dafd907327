//! Graph projections per diagram preset.

use repolens_config::DiagramPreset;
use repolens_graph::{project_kinds, EdgeKind, Graph, NodeKind, Subgraph};

/// The sorted subgraph a preset includes.
#[derive(Debug, Clone)]
pub struct Projection {
    pub preset: DiagramPreset,
    pub subgraph: Subgraph,
}

impl Projection {
    /// The `subgraph_digest` component of diagram cache keys.
    pub fn digest(&self) -> anyhow::Result<String> {
        self.subgraph.digest()
    }
}

/// Project the graph for one preset.
///
/// - `architecture`: file and module nodes; `contains` and `imports` edges.
/// - `dependencies`: module and dependency nodes; `depends_on` edges.
/// - `tests`: test and module nodes; `tests` edges.
#[must_use]
pub fn project_graph(graph: &Graph, preset: DiagramPreset) -> Projection {
    let (node_kinds, edge_kinds): (&[NodeKind], &[EdgeKind]) = match preset {
        DiagramPreset::Architecture => (
            &[NodeKind::File, NodeKind::Module],
            &[EdgeKind::Contains, EdgeKind::Imports],
        ),
        DiagramPreset::Dependencies => (
            &[NodeKind::Module, NodeKind::Dependency],
            &[EdgeKind::DependsOn],
        ),
        DiagramPreset::Tests => (&[NodeKind::Test, NodeKind::Module], &[EdgeKind::Tests]),
    };

    Projection {
        preset,
        subgraph: project_kinds(graph, node_kinds, edge_kinds),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repolens_graph::{Edge, Node};
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
        let run = node(NodeKind::Run, "run");
        let file = node(NodeKind::File, "a.py");
        let module = node(NodeKind::Module, "a");
        let dep = node(NodeKind::Dependency, "requests");
        let test = node(NodeKind::Test, "a.test_f");
        graph.insert_edge(Edge::new(&run.id, EdgeKind::Contains, &file.id));
        graph.insert_edge(Edge::new(&file.id, EdgeKind::Contains, &module.id));
        graph.insert_edge(Edge::new(&module.id, EdgeKind::DependsOn, &dep.id));
        graph.insert_edge(Edge::new(&test.id, EdgeKind::Tests, &module.id));
        for n in [run, file, module, dep, test] {
            graph.upsert_node(n);
        }
        graph
    }

    #[test]
    fn architecture_keeps_files_and_modules() {
        let projection = project_graph(&sample_graph(), DiagramPreset::Architecture);
        assert_eq!(projection.subgraph.nodes.len(), 2);
        assert_eq!(projection.subgraph.edges.len(), 1);
        assert_eq!(projection.subgraph.edges[0].1, "contains");
    }

    #[test]
    fn dependencies_keeps_depends_on() {
        let projection = project_graph(&sample_graph(), DiagramPreset::Dependencies);
        assert_eq!(projection.subgraph.edges.len(), 1);
        assert_eq!(projection.subgraph.edges[0].1, "depends_on");
    }

    #[test]
    fn tests_projection_links_tests_to_modules() {
        let projection = project_graph(&sample_graph(), DiagramPreset::Tests);
        assert_eq!(projection.subgraph.nodes.len(), 2);
        assert_eq!(projection.subgraph.edges[0].1, "tests");
    }

    #[test]
    fn preset_digests_are_independent() {
        let graph = sample_graph();
        let architecture = project_graph(&graph, DiagramPreset::Architecture)
            .digest()
            .unwrap();

        // adding a second test changes only the tests projection
        let mut grown = graph.clone();
        let module_id = Node::make_id(NodeKind::Module, "a");
        let extra = node(NodeKind::Test, "a.test_g");
        grown.insert_edge(Edge::new(&extra.id, EdgeKind::Tests, &module_id));
        grown.upsert_node(extra);

        assert_eq!(
            architecture,
            project_graph(&grown, DiagramPreset::Architecture)
                .digest()
                .unwrap()
        );
        assert_ne!(
            project_graph(&graph, DiagramPreset::Tests).digest().unwrap(),
            project_graph(&grown, DiagramPreset::Tests).digest().unwrap()
        );
    }
}
