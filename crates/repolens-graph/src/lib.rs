//! Repository knowledge graph.
//!
//! The graph is built once per run from walk records, extraction events,
//! dependency events, and the registered artifact list; validated against
//! its schema invariants; then serialized (JSON-LD and GraphML) and diffed
//! against the prior run. After construction the graph is an immutable
//! value; serializer and differ take read-only views.

mod build;
mod diff;
mod model;
mod project;
mod serialize;
mod validate;

pub use build::{build_graph, ArtifactRef, GraphInputs};
pub use diff::{diff_graphs, render_diff_markdown, EdgeSummary, GraphDiff, NodeSummary};
pub use model::{AttrValue, Edge, EdgeKind, Graph, Node, NodeKind};
pub use project::{project_kinds, Subgraph};
pub use serialize::{parse_json_ld, to_graphml, to_json_ld, GRAPH_SCHEMA_VERSION};
pub use validate::validate_graph;
