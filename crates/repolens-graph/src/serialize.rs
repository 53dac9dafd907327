//! Byte-stable graph serialization: JSON-LD and GraphML.

use anyhow::{Context, Result};
use repolens_utils::canonical::emit_jcs;
use serde::{Deserialize, Serialize};

use crate::model::{Edge, Graph, Node};

pub const GRAPH_SCHEMA_VERSION: u32 = 1;

const JSON_LD_VOCAB: &str = "https://repolens.dev/schema/v1#";

#[derive(Debug, Serialize, Deserialize)]
struct JsonLdDocument {
    #[serde(rename = "@context")]
    context: JsonLdContext,
    schema_version: u32,
    /// Sorted by id.
    nodes: Vec<Node>,
    /// Sorted by `(source_id, kind, target_id)`.
    relationships: Vec<Edge>,
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonLdContext {
    #[serde(rename = "@vocab")]
    vocab: String,
}

/// Serialize the graph as canonical JSON-LD (UTF-8, LF, JCS key order).
pub fn to_json_ld(graph: &Graph) -> Result<String> {
    let document = JsonLdDocument {
        context: JsonLdContext {
            vocab: JSON_LD_VOCAB.to_string(),
        },
        schema_version: GRAPH_SCHEMA_VERSION,
        nodes: graph.nodes().cloned().collect(),
        relationships: graph.edges().cloned().collect(),
    };
    emit_jcs(&document).context("Failed to serialize graph as JSON-LD")
}

/// Parse a previously emitted JSON-LD document back into a graph.
pub fn parse_json_ld(content: &str) -> Result<Graph> {
    let document: JsonLdDocument =
        serde_json::from_str(content).context("Failed to parse graph JSON-LD")?;
    let mut graph = Graph::new();
    for node in document.nodes {
        graph.upsert_node_replacing(node);
    }
    for edge in document.relationships {
        graph.insert_edge(edge);
    }
    Ok(graph)
}

/// Serialize the graph as GraphML with the same ordering as the JSON-LD
/// form. Attribute keys are declared before any node or edge data.
pub fn to_graphml(graph: &Graph) -> Result<String> {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\">\n");
    out.push_str("  <key id=\"kind\" for=\"node\" attr.name=\"kind\" attr.type=\"string\"/>\n");
    out.push_str("  <key id=\"label\" for=\"node\" attr.name=\"label\" attr.type=\"string\"/>\n");
    out.push_str(
        "  <key id=\"attributes\" for=\"node\" attr.name=\"attributes\" attr.type=\"string\"/>\n",
    );
    out.push_str(
        "  <key id=\"provenance\" for=\"node\" attr.name=\"provenance\" attr.type=\"string\"/>\n",
    );
    out.push_str("  <key id=\"ekind\" for=\"edge\" attr.name=\"kind\" attr.type=\"string\"/>\n");
    out.push_str("  <graph id=\"G\" edgedefault=\"directed\">\n");

    for node in graph.nodes() {
        let attributes =
            emit_jcs(&node.attributes).context("Failed to serialize node attributes")?;
        let provenance =
            emit_jcs(&node.provenance).context("Failed to serialize node provenance")?;
        out.push_str(&format!("    <node id=\"{}\">\n", xml_escape(&node.id)));
        out.push_str(&format!(
            "      <data key=\"kind\">{}</data>\n",
            xml_escape(&node.kind.to_string())
        ));
        out.push_str(&format!(
            "      <data key=\"label\">{}</data>\n",
            xml_escape(&node.label)
        ));
        out.push_str(&format!(
            "      <data key=\"attributes\">{}</data>\n",
            xml_escape(&attributes)
        ));
        out.push_str(&format!(
            "      <data key=\"provenance\">{}</data>\n",
            xml_escape(&provenance)
        ));
        out.push_str("    </node>\n");
    }

    for edge in graph.edges() {
        out.push_str(&format!(
            "    <edge id=\"{}\" source=\"{}\" target=\"{}\">\n",
            xml_escape(&edge.id),
            xml_escape(&edge.source_id),
            xml_escape(&edge.target_id)
        ));
        out.push_str(&format!(
            "      <data key=\"ekind\">{}</data>\n",
            xml_escape(&edge.kind.to_string())
        ));
        out.push_str("    </edge>\n");
    }

    out.push_str("  </graph>\n</graphml>\n");
    Ok(out)
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
