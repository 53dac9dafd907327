//! Rendering: external renderers when present, deterministic fallback SVG
//! otherwise.
//!
//! Renderers are only ever local binaries found on `PATH`; nothing here
//! opens a socket. Probe results are surfaced so the metadata sidecar can
//! record exactly which path was taken.

use anyhow::{Context, Result};
use repolens_config::DiagramFormat;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::process::{Command, Stdio};
use tracing::debug;

use crate::theme::Theme;

/// Availability of the external renderer for one format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RendererProbe {
    pub renderer: String,
    pub available: bool,
}

/// One rendered diagram: the bytes plus how they were produced.
#[derive(Debug, Clone)]
pub struct RenderedDiagram {
    /// Output file extension, `svg` in every current path.
    pub extension: &'static str,
    pub bytes: Vec<u8>,
    /// True when the fallback renderer produced the bytes.
    pub fallback: bool,
}

/// Binary name for each format's renderer.
#[must_use]
pub const fn renderer_binary(format: DiagramFormat) -> &'static str {
    match format {
        DiagramFormat::Mermaid => "mmdc",
        DiagramFormat::Plantuml => "plantuml",
        DiagramFormat::Graphviz => "dot",
    }
}

/// Probe the external renderer for each requested format.
#[must_use]
pub fn probe_renderers(formats: &[DiagramFormat]) -> Vec<RendererProbe> {
    let mut probes: Vec<RendererProbe> = formats
        .iter()
        .map(|format| {
            let binary = renderer_binary(*format);
            RendererProbe {
                renderer: binary.to_string(),
                available: which::which(binary).is_ok(),
            }
        })
        .collect();
    probes.sort_by(|a, b| a.renderer.cmp(&b.renderer));
    probes.dedup();
    probes
}

/// Render a template.
///
/// When the external renderer is unavailable or fails, the deterministic
/// fallback SVG is returned instead; the error is reported through the
/// `fallback` flag rather than failing the run.
#[must_use]
pub fn render_diagram(
    format: DiagramFormat,
    template: &str,
    node_labels: &[String],
    theme: &Theme,
    renderer_available: bool,
) -> RenderedDiagram {
    if renderer_available {
        match invoke_renderer(format, template) {
            Ok(bytes) if !bytes.is_empty() => {
                return RenderedDiagram {
                    extension: "svg",
                    bytes,
                    fallback: false,
                };
            }
            Ok(_) | Err(_) => {
                debug!(renderer = renderer_binary(format), "renderer failed; using fallback");
            }
        }
    }
    RenderedDiagram {
        extension: "svg",
        bytes: fallback_svg(node_labels, theme).into_bytes(),
        fallback: true,
    }
}

fn invoke_renderer(format: DiagramFormat, template: &str) -> Result<Vec<u8>> {
    match format {
        DiagramFormat::Graphviz => pipe_through(Command::new("dot").arg("-Tsvg"), template),
        DiagramFormat::Plantuml => {
            pipe_through(Command::new("plantuml").args(["-tsvg", "-pipe"]), template)
        }
        DiagramFormat::Mermaid => {
            let dir = tempfile::tempdir().context("Failed to create renderer scratch dir")?;
            let input = dir.path().join("diagram.mmd");
            let output = dir.path().join("diagram.svg");
            std::fs::write(&input, template).context("Failed to write renderer input")?;
            let status = Command::new("mmdc")
                .arg("-i")
                .arg(&input)
                .arg("-o")
                .arg(&output)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .context("Failed to invoke mmdc")?;
            anyhow::ensure!(status.success(), "mmdc exited with {status}");
            std::fs::read(&output).context("Failed to read renderer output")
        }
    }
}

fn pipe_through(command: &mut Command, input: &str) -> Result<Vec<u8>> {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .context("Failed to spawn renderer")?;
    child
        .stdin
        .take()
        .context("Renderer stdin unavailable")?
        .write_all(input.as_bytes())
        .context("Failed to write template to renderer")?;
    let output = child
        .wait_with_output()
        .context("Failed to collect renderer output")?;
    anyhow::ensure!(output.status.success(), "renderer exited with {}", output.status);
    Ok(output.stdout)
}

/// The fallback renderer: a visually plain but byte-stable SVG listing the
/// projection's node labels.
#[must_use]
pub fn fallback_svg(node_labels: &[String], theme: &Theme) -> String {
    const ROW_HEIGHT: usize = 28;
    const WIDTH: usize = 480;
    let height = 40 + node_labels.len() * ROW_HEIGHT;

    let mut out = format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{WIDTH}\" height=\"{height}\" viewBox=\"0 0 {WIDTH} {height}\">\n"
    );
    out.push_str(&format!(
        "  <rect width=\"{WIDTH}\" height=\"{height}\" fill=\"{}\"/>\n",
        theme.background
    ));
    for (index, label) in node_labels.iter().enumerate() {
        let y = 32 + index * ROW_HEIGHT;
        out.push_str(&format!(
            "  <rect x=\"12\" y=\"{}\" width=\"{}\" height=\"22\" fill=\"none\" stroke=\"{}\"/>\n",
            y - 16,
            WIDTH - 24,
            theme.accent
        ));
        out.push_str(&format!(
            "  <text x=\"20\" y=\"{y}\" font-size=\"{}\" fill=\"{}\">{}</text>\n",
            theme.font_size_pt,
            theme.foreground,
            svg_escape(label)
        ));
    }
    out.push_str("</svg>\n");
    out
}

fn svg_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
