//! Canonical forms shared by every artifact emitter.
//!
//! Two canonicalizations matter for reproducibility: canonical file paths
//! (the identity of every walked file) and canonical JSON (RFC 8785 JCS,
//! so map ordering is a property of the emitter rather than of struct
//! field order).

use anyhow::{Context, Result};
use camino::Utf8Path;
use serde::Serialize;
use unicode_normalization::UnicodeNormalization;

/// Emit a value as JCS-canonical JSON (RFC 8785).
///
/// This is the standard way to emit every JSON artifact: manifest, delta,
/// graph, metrics, gate, cards, and the cache file. JCS guarantees
/// deterministic output regardless of field ordering in the source struct.
pub fn emit_jcs<T: Serialize>(value: &T) -> Result<String> {
    let json_value =
        serde_json::to_value(value).with_context(|| "Failed to serialize value to JSON")?;
    let json_bytes = serde_json_canonicalizer::to_vec(&json_value)
        .with_context(|| "Failed to canonicalize JSON")?;
    String::from_utf8(json_bytes).with_context(|| "Canonical JSON contained invalid UTF-8")
}

/// Canonicalize a path relative to a scan root.
///
/// The result is relative, forward-slash separated, Unicode NFC, with drive
/// letters (when one survives into a component) lowercased. Paths that
/// escape the root are rejected.
pub fn canonical_rel_path(path: &Utf8Path, root: &Utf8Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .with_context(|| format!("Path {path} is not under scan root {root}"))?;

    let mut segments = Vec::new();
    for component in relative.components() {
        let text = component.as_str();
        if text == "." || text.is_empty() {
            continue;
        }
        if text == ".." {
            anyhow::bail!("Path {path} escapes scan root {root}");
        }
        segments.push(normalize_segment(text));
    }

    if segments.is_empty() {
        anyhow::bail!("Path {path} canonicalizes to the scan root itself");
    }

    Ok(segments.join("/"))
}

/// NFC-normalize a path segment; lowercase a leading drive letter.
fn normalize_segment(segment: &str) -> String {
    let normalized: String = segment.nfc().collect();
    if is_drive_letter(&normalized) {
        normalized.to_ascii_lowercase()
    } else {
        normalized
    }
}

fn is_drive_letter(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Normalize emitted text: LF line endings, no trailing spaces, exactly one
/// final newline.
#[must_use]
pub fn normalize_text(content: &str) -> String {
    let unified = content.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines: Vec<&str> = unified.lines().map(str::trim_end).collect();
    while lines.last() == Some(&"") {
        lines.pop();
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}
