//! Template emission per format.

use repolens_config::{DiagramFormat, DiagramPreset, ThemeId};
use repolens_utils::digest::digest_bytes;

use crate::project::Projection;
use crate::theme::Theme;

/// Cache key for one template: SHA-256 over
/// `(preset, format, theme_id, subgraph_digest)`.
#[must_use]
pub fn diagram_cache_key(
    preset: DiagramPreset,
    format: DiagramFormat,
    theme_id: ThemeId,
    subgraph_digest: &str,
) -> String {
    let joined = format!("{preset}\u{1f}{format}\u{1f}{theme_id}\u{1f}{subgraph_digest}");
    digest_bytes(joined.as_bytes())
}

/// Emit the template source for a projection. Output is line-oriented,
/// LF-terminated, and a pure function of its inputs.
#[must_use]
pub fn emit_template(projection: &Projection, format: DiagramFormat, theme: &Theme) -> String {
    match format {
        DiagramFormat::Mermaid => emit_mermaid(projection, theme),
        DiagramFormat::Plantuml => emit_plantuml(projection, theme),
        DiagramFormat::Graphviz => emit_graphviz(projection, theme),
    }
}

fn short(id: &str) -> String {
    format!("n_{id}")
}

fn emit_mermaid(projection: &Projection, theme: &Theme) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "%%{{init: {{'theme':'base','themeVariables':{{'primaryColor':'{}','primaryTextColor':'{}','lineColor':'{}','fontSize':'{}pt'}}}}}}%%\n",
        theme.background, theme.foreground, theme.accent, theme.font_size_pt
    ));
    out.push_str("graph TD\n");
    for (id, kind, label) in &projection.subgraph.nodes {
        out.push_str(&format!(
            "    {}[\"{} {}\"]\n",
            short(id),
            kind,
            escape_quotes(label)
        ));
    }
    for (source, kind, target) in &projection.subgraph.edges {
        out.push_str(&format!(
            "    {} -->|{}| {}\n",
            short(source),
            kind,
            short(target)
        ));
    }
    out
}

fn emit_plantuml(projection: &Projection, theme: &Theme) -> String {
    let mut out = String::from("@startuml\n");
    out.push_str(&format!("skinparam backgroundColor {}\n", theme.background));
    out.push_str(&format!(
        "skinparam defaultFontColor {}\n",
        theme.foreground
    ));
    out.push_str(&format!("skinparam defaultFontSize {}\n", theme.font_size_pt));
    out.push_str(&format!("skinparam arrowColor {}\n", theme.accent));
    for (id, kind, label) in &projection.subgraph.nodes {
        out.push_str(&format!(
            "rectangle \"{} {}\" as {}\n",
            kind,
            escape_quotes(label),
            short(id)
        ));
    }
    for (source, kind, target) in &projection.subgraph.edges {
        out.push_str(&format!("{} --> {} : {}\n", short(source), short(target), kind));
    }
    out.push_str("@enduml\n");
    out
}

fn emit_graphviz(projection: &Projection, theme: &Theme) -> String {
    let mut out = String::from("digraph repolens {\n");
    out.push_str(&format!("    bgcolor=\"{}\";\n", theme.background));
    out.push_str(&format!(
        "    node [shape=box, color=\"{}\", fontcolor=\"{}\", fontsize={}];\n",
        theme.accent, theme.foreground, theme.font_size_pt
    ));
    out.push_str(&format!(
        "    edge [color=\"{}\", fontcolor=\"{}\"];\n",
        theme.accent, theme.foreground
    ));
    for (id, kind, label) in &projection.subgraph.nodes {
        out.push_str(&format!(
            "    \"{}\" [label=\"{} {}\"];\n",
            short(id),
            kind,
            escape_quotes(label)
        ));
    }
    for (source, kind, target) in &projection.subgraph.edges {
        out.push_str(&format!(
            "    \"{}\" -> \"{}\" [label=\"{}\"];\n",
            short(source),
            short(target),
            kind
        ));
    }
    out.push_str("}\n");
    out
}

fn escape_quotes(value: &str) -> String {
    value.replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::resolve_theme;
    use repolens_graph::Subgraph;

    fn projection() -> Projection {
        Projection {
            preset: DiagramPreset::Architecture,
            subgraph: Subgraph {
                nodes: vec![
                    ("aaaa".into(), "file".into(), "a.py".into()),
                    ("bbbb".into(), "module".into(), "a".into()),
                ],
                edges: vec![("aaaa".into(), "contains".into(), "bbbb".into())],
            },
        }
    }

    #[test]
    fn cache_key_depends_on_every_component() {
        let base = diagram_cache_key(
            DiagramPreset::Architecture,
            DiagramFormat::Mermaid,
            ThemeId::Light,
            "d1",
        );
        assert_ne!(
            base,
            diagram_cache_key(
                DiagramPreset::Dependencies,
                DiagramFormat::Mermaid,
                ThemeId::Light,
                "d1"
            )
        );
        assert_ne!(
            base,
            diagram_cache_key(
                DiagramPreset::Architecture,
                DiagramFormat::Graphviz,
                ThemeId::Light,
                "d1"
            )
        );
        assert_ne!(
            base,
            diagram_cache_key(
                DiagramPreset::Architecture,
                DiagramFormat::Mermaid,
                ThemeId::Dark,
                "d1"
            )
        );
        assert_ne!(
            base,
            diagram_cache_key(
                DiagramPreset::Architecture,
                DiagramFormat::Mermaid,
                ThemeId::Light,
                "d2"
            )
        );
    }

    #[test]
    fn mermaid_template_lists_nodes_and_edges() {
        let theme = resolve_theme(ThemeId::Light);
        let src = emit_template(&projection(), DiagramFormat::Mermaid, &theme);
        assert!(src.starts_with("%%{init:"));
        assert!(src.contains("graph TD"));
        assert!(src.contains("n_aaaa[\"file a.py\"]"));
        assert!(src.contains("n_aaaa -->|contains| n_bbbb"));
    }

    #[test]
    fn plantuml_template_is_wrapped() {
        let theme = resolve_theme(ThemeId::Dark);
        let src = emit_template(&projection(), DiagramFormat::Plantuml, &theme);
        assert!(src.starts_with("@startuml\n"));
        assert!(src.ends_with("@enduml\n"));
        assert!(src.contains("rectangle \"module a\" as n_bbbb"));
    }

    #[test]
    fn graphviz_template_quotes_identifiers() {
        let theme = resolve_theme(ThemeId::Light);
        let src = emit_template(&projection(), DiagramFormat::Graphviz, &theme);
        assert!(src.starts_with("digraph repolens {"));
        assert!(src.contains("\"n_aaaa\" -> \"n_bbbb\" [label=\"contains\"];"));
    }

    #[test]
    fn templates_are_deterministic() {
        let theme = resolve_theme(ThemeId::Light);
        for format in [
            DiagramFormat::Mermaid,
            DiagramFormat::Plantuml,
            DiagramFormat::Graphviz,
        ] {
            assert_eq!(
                emit_template(&projection(), format, &theme),
                emit_template(&projection(), format, &theme)
            );
        }
    }
}
