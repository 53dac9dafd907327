//! Graph data model.

use repolens_utils::digest::{edge_id, node_id};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use strum::{Display, EnumString};

/// Closed set of node kinds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
    EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Run,
    File,
    Module,
    Function,
    Class,
    Test,
    Dependency,
    Artifact,
    Asset,
    AssetCard,
}

/// Closed set of relationship kinds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
    EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Contains,
    Imports,
    DependsOn,
    Tests,
    Defines,
    Derives,
    Describes,
    Produces,
}

/// Scalar attribute values. Maps of these stay key-sorted via `BTreeMap`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<u64> for AttrValue {
    fn from(value: u64) -> Self {
        Self::Int(value as i64)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// One graph node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub label: String,
    pub attributes: BTreeMap<String, AttrValue>,
    /// Canonical paths and/or run ids justifying this node. Never empty in
    /// a valid graph.
    pub provenance: BTreeSet<String>,
}

impl Node {
    /// Deterministic id for a kind and scope path.
    #[must_use]
    pub fn make_id(kind: NodeKind, scope_path: &str) -> String {
        node_id(&kind.to_string(), scope_path)
    }
}

/// One directed relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source_id: String,
    pub kind: EdgeKind,
    pub target_id: String,
}

impl Edge {
    #[must_use]
    pub fn new(source_id: &str, kind: EdgeKind, target_id: &str) -> Self {
        Self {
            id: edge_id(source_id, &kind.to_string(), target_id),
            source_id: source_id.to_string(),
            kind,
            target_id: target_id.to_string(),
        }
    }
}

/// The immutable graph value.
///
/// Nodes are keyed by id; edges by `(source_id, kind, target_id)`, which is
/// also their serialization order.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: BTreeMap<String, Node>,
    edges: BTreeMap<(String, String, String), Edge>,
}

impl Graph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node; merging provenance when the id already exists with
    /// the same kind. Returns false on a kind clash (an id collision).
    pub fn upsert_node(&mut self, node: Node) -> bool {
        match self.nodes.get_mut(&node.id) {
            Some(existing) => {
                if existing.kind != node.kind {
                    return false;
                }
                existing.provenance.extend(node.provenance);
                true
            }
            None => {
                self.nodes.insert(node.id.clone(), node);
                true
            }
        }
    }

    /// Replace a node wholesale, keeping its id slot. Used for attribute
    /// enrichment after initial insertion.
    pub fn upsert_node_replacing(&mut self, node: Node) {
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn insert_edge(&mut self, edge: Edge) {
        let key = (
            edge.source_id.clone(),
            edge.kind.to_string(),
            edge.target_id.clone(),
        );
        self.edges.insert(key, edge);
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Edges in `(source_id, kind, target_id)` order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Nodes of one kind, in id order.
    pub fn nodes_of_kind(&self, kind: NodeKind) -> impl Iterator<Item = &Node> {
        self.nodes.values().filter(move |n| n.kind == kind)
    }

    /// Edges of one kind, in key order.
    pub fn edges_of_kind(&self, kind: EdgeKind) -> impl Iterator<Item = &Edge> {
        self.edges.values().filter(move |e| e.kind == kind)
    }
}
