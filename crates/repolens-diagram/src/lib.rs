//! Diagram generation.
//!
//! Each `(preset, format)` pair projects the knowledge graph into a sorted
//! subgraph, emits a template in the requested syntax, and renders it:
//! through a local external renderer when one is present, otherwise through
//! a deterministic fallback SVG. Template bytes are cache-keyed on the
//! projection digest so unchanged subgraphs reuse the prior run's bytes.

mod project;
mod render;
mod template;
mod theme;

pub use project::{project_graph, Projection};
pub use render::{
    probe_renderers, render_diagram, renderer_binary, RenderedDiagram, RendererProbe,
};
pub use template::{diagram_cache_key, emit_template};
pub use theme::{resolve_theme, validate_theme, Theme};
