//! Bundle assembly: selection, headers, splitting, index emission.

use anyhow::{Context, Result};
use chrono::DateTime;
use repolens_config::BundlePreset;
use repolens_utils::diagnostics::{DiagnosticCode, DiagnosticLedger};
use repolens_walk::FileRecord;
use tracing::debug;

use crate::budget::BudgetUsage;
use crate::model::{Bundle, BundleIndex, IndexEntry, BUNDLE_INDEX_SCHEMA_VERSION};

/// Inputs for building all sequences of one preset.
#[derive(Debug)]
pub struct BundleRequest<'a> {
    pub preset: BundlePreset,
    /// Walk records, already sorted by canonical path.
    pub records: &'a [FileRecord],
    pub max_bytes: usize,
    pub max_lines: usize,
    /// Scan-root license hint, identical for every unit.
    pub license_hint: &'a str,
}

struct PendingUnit {
    record_path: String,
    header: String,
    content: String,
}

/// Build every sequence for one preset.
///
/// Selection preserves record order, so output order is lexicographic by
/// canonical path. An empty selection still yields sequence 0 with the
/// bundle header only.
pub fn build_bundles(
    request: &BundleRequest<'_>,
    diagnostics: &mut DiagnosticLedger,
) -> Result<Vec<Bundle>> {
    let mut bundles = Vec::new();
    let mut pending: Vec<PendingUnit> = Vec::new();
    let mut budget = BudgetUsage::new(request.max_bytes, request.max_lines);
    let mut sequence = 0u32;

    for record in request.records {
        if !preset_matches(request.preset, record) {
            continue;
        }
        let raw = match std::fs::read_to_string(record.absolute_path.as_std_path()) {
            Ok(raw) => raw,
            Err(err) => {
                diagnostics.push_for_path(
                    DiagnosticCode::WalkUnreadable,
                    record.canonical_path.clone(),
                    format!("unreadable while bundling: {err}"),
                );
                continue;
            }
        };
        let content = prepare_content(request.preset, &raw);
        let content_bytes = content.len();
        let content_lines = content.lines().count();

        let unit = PendingUnit {
            record_path: record.canonical_path.clone(),
            header: render_unit_header(record, request.license_hint),
            content,
        };
        let oversize =
            content_bytes > request.max_bytes || content_lines > request.max_lines;

        if !budget.is_empty() && budget.would_exceed(content_bytes, content_lines) {
            bundles.push(flush(request.preset, &mut sequence, &mut pending, false)?);
            budget = BudgetUsage::new(request.max_bytes, request.max_lines);
        }

        budget.add_content(content_bytes, content_lines);
        pending.push(unit);

        if oversize {
            bundles.push(flush(request.preset, &mut sequence, &mut pending, true)?);
            budget = BudgetUsage::new(request.max_bytes, request.max_lines);
        }
    }

    if !pending.is_empty() || bundles.is_empty() {
        bundles.push(flush(request.preset, &mut sequence, &mut pending, false)?);
    }

    debug!(preset = %request.preset, sequences = bundles.len(), "bundles built");
    Ok(bundles)
}

fn preset_matches(preset: BundlePreset, record: &FileRecord) -> bool {
    match preset {
        BundlePreset::All => true,
        BundlePreset::Api => matches!(
            record.language.as_str(),
            "python" | "rust" | "javascript" | "typescript" | "go" | "java" | "ruby" | "c" | "cpp"
                | "csharp"
        ),
        BundlePreset::Tests => record.looks_like_test(),
        BundlePreset::Dependencies => record.is_dependency_manifest(),
    }
}

/// For the `api` preset only declaration lines survive; every other preset
/// carries content verbatim (modulo LF normalization).
fn prepare_content(preset: BundlePreset, raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");
    let body = if preset == BundlePreset::Api {
        unified
            .lines()
            .filter(|line| is_declaration_line(line))
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        unified
    };
    let mut body = body.trim_end_matches('\n').to_string();
    if !body.is_empty() {
        body.push('\n');
    }
    body
}

const DECLARATION_PREFIXES: &[&str] = &[
    "def ", "async def ", "class ", "fn ", "pub fn ", "pub struct ", "pub enum ", "pub trait ",
    "struct ", "enum ", "trait ", "impl ", "function ", "export ", "interface ", "type ",
    "import ", "from ", "use ", "mod ", "pub mod ",
];

fn is_declaration_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    DECLARATION_PREFIXES
        .iter()
        .any(|prefix| trimmed.starts_with(prefix))
}

/// Header fields in sorted key order; synopsis newlines are escaped so the
/// header stays line-oriented.
fn render_unit_header(record: &FileRecord, license_hint: &str) -> String {
    let mtime_utc = format_mtime(record.mtime_ns);
    let synopsis = record
        .synopsis
        .as_deref()
        .map(|s| s.replace('\n', "\\n"))
        .unwrap_or_else(|| "null".to_string());
    format!(
        "--- unit: {path} ---\n\
         digest: {digest}\n\
         language: {language}\n\
         license_hint: {license_hint}\n\
         lines: {lines}\n\
         mtime_utc: {mtime_utc}\n\
         path: {path}\n\
         size: {size}\n\
         synopsis: {synopsis}\n",
        path = record.canonical_path,
        digest = record.digest,
        language = record.language,
        lines = record.line_count,
        size = record.size_bytes,
    )
}

fn format_mtime(mtime_ns: i128) -> String {
    let secs = (mtime_ns / 1_000_000_000) as i64;
    let nanos = (mtime_ns % 1_000_000_000) as u32;
    DateTime::from_timestamp(secs, nanos)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| "1970-01-01T00:00:00Z".to_string())
}

fn flush(
    preset: BundlePreset,
    sequence: &mut u32,
    pending: &mut Vec<PendingUnit>,
    oversize: bool,
) -> Result<Bundle> {
    let seq = *sequence;
    *sequence = sequence
        .checked_add(1)
        .context("bundle sequence overflow")?;

    let mut content = format!("# repolens bundle\n# preset: {preset}\n# sequence: {seq}\n\n");
    let mut units = Vec::with_capacity(pending.len());

    for unit in pending.drain(..) {
        let byte_offset = content.len();
        let line_offset = content.lines().count();
        let section = format!("{}\n{}\n", unit.header, unit.content);
        content.push_str(&section);
        units.push(IndexEntry {
            unit_path: unit.record_path,
            byte_offset,
            line_offset,
            length_bytes: section.len(),
            length_lines: section.lines().count(),
        });
    }

    Ok(Bundle {
        preset,
        sequence: seq,
        content,
        index: BundleIndex {
            schema_version: BUNDLE_INDEX_SCHEMA_VERSION,
            preset,
            sequence: seq,
            oversize,
            units,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use repolens_walk::{walk, WalkOptions};
    use std::fs;
    use tempfile::TempDir;

    fn records_for(files: &[(&str, &str)]) -> (TempDir, Vec<FileRecord>) {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        for (name, content) in files {
            if let Some(parent) = root.join(name).parent() {
                fs::create_dir_all(parent.as_std_path()).unwrap();
            }
            fs::write(root.join(name).as_std_path(), content).unwrap();
        }
        let records = walk(&root, &WalkOptions::default()).unwrap().records;
        (dir, records)
    }

    fn request<'a>(
        preset: BundlePreset,
        records: &'a [FileRecord],
        max_bytes: usize,
        max_lines: usize,
    ) -> BundleRequest<'a> {
        BundleRequest {
            preset,
            records,
            max_bytes,
            max_lines,
            license_hint: "unknown",
        }
    }

    #[test]
    fn all_preset_bundles_every_record_in_order() {
        let (_dir, records) =
            records_for(&[("b.py", "x = 2\n"), ("a.py", "x = 1\n")]);
        let mut diagnostics = DiagnosticLedger::new();
        let bundles = build_bundles(
            &request(BundlePreset::All, &records, 10_000, 1_000),
            &mut diagnostics,
        )
        .unwrap();

        assert_eq!(bundles.len(), 1);
        let bundle = &bundles[0];
        assert_eq!(bundle.sequence, 0);
        let paths: Vec<&str> = bundle
            .index
            .units
            .iter()
            .map(|u| u.unit_path.as_str())
            .collect();
        assert_eq!(paths, vec!["a.py", "b.py"]);
        assert!(bundle.content.contains("--- unit: a.py ---"));
        assert!(bundle.content.contains("path: a.py"));
        assert!(bundle.content.contains("license_hint: unknown"));
    }

    #[test]
    fn index_offsets_locate_unit_sections() {
        let (_dir, records) = records_for(&[("a.py", "x = 1\n"), ("b.py", "y = 2\n")]);
        let mut diagnostics = DiagnosticLedger::new();
        let bundles = build_bundles(
            &request(BundlePreset::All, &records, 10_000, 1_000),
            &mut diagnostics,
        )
        .unwrap();

        let bundle = &bundles[0];
        for entry in &bundle.index.units {
            let section =
                &bundle.content[entry.byte_offset..entry.byte_offset + entry.length_bytes];
            assert!(section.starts_with(&format!("--- unit: {} ---", entry.unit_path)));
        }
    }

    #[test]
    fn budget_exceedance_starts_new_sequence() {
        // Two 6-byte files with max_bytes = 11: 6 + 6 > 11 forces a split
        let (_dir, records) = records_for(&[("a.py", "x = 1\n"), ("b.py", "y = 2\n")]);
        let mut diagnostics = DiagnosticLedger::new();
        let bundles = build_bundles(
            &request(BundlePreset::All, &records, 11, 1_000),
            &mut diagnostics,
        )
        .unwrap();

        assert_eq!(bundles.len(), 2);
        assert_eq!(bundles[0].sequence, 0);
        assert_eq!(bundles[1].sequence, 1);
        assert_eq!(bundles[0].index.units[0].unit_path, "a.py");
        assert_eq!(bundles[1].index.units[0].unit_path, "b.py");
    }

    #[test]
    fn line_budget_splits_independently() {
        let (_dir, records) =
            records_for(&[("a.py", "1\n2\n3\n"), ("b.py", "4\n5\n6\n")]);
        let mut diagnostics = DiagnosticLedger::new();
        let bundles = build_bundles(
            &request(BundlePreset::All, &records, 10_000, 5),
            &mut diagnostics,
        )
        .unwrap();
        assert_eq!(bundles.len(), 2);
    }

    #[test]
    fn oversize_unit_is_alone_and_flagged() {
        let big = "data\n".repeat(100);
        let (_dir, records) = records_for(&[
            ("big.py", big.as_str()),
            ("small.py", "x = 1\n"),
            ("tiny.py", "y = 2\n"),
        ]);
        let mut diagnostics = DiagnosticLedger::new();
        let bundles = build_bundles(
            &request(BundlePreset::All, &records, 50, 1_000),
            &mut diagnostics,
        )
        .unwrap();

        let oversize: Vec<&Bundle> = bundles.iter().filter(|b| b.index.oversize).collect();
        assert_eq!(oversize.len(), 1);
        assert_eq!(oversize[0].index.units.len(), 1);
        assert_eq!(oversize[0].index.units[0].unit_path, "big.py");
    }

    #[test]
    fn empty_selection_emits_header_only_sequence_zero() {
        let (_dir, records) = records_for(&[("README.md", "# demo\n")]);
        let mut diagnostics = DiagnosticLedger::new();
        let bundles = build_bundles(
            &request(BundlePreset::Tests, &records, 10_000, 1_000),
            &mut diagnostics,
        )
        .unwrap();

        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].sequence, 0);
        assert!(bundles[0].index.units.is_empty());
        assert!(bundles[0].content.starts_with("# repolens bundle\n"));
    }

    #[test]
    fn api_preset_keeps_declarations_only() {
        let (_dir, records) = records_for(&[(
            "app.py",
            "import os\n\ndef f():\n    return 1\n\nclass C:\n    pass\n",
        )]);
        let mut diagnostics = DiagnosticLedger::new();
        let bundles = build_bundles(
            &request(BundlePreset::Api, &records, 10_000, 1_000),
            &mut diagnostics,
        )
        .unwrap();

        let content = &bundles[0].content;
        assert!(content.contains("import os\ndef f():\nclass C:\n"));
        assert!(!content.contains("return 1"));
    }

    #[test]
    fn dependencies_preset_selects_manifests() {
        let (_dir, records) = records_for(&[
            ("requirements.txt", "flask\n"),
            ("src/app.py", "import flask\n"),
        ]);
        let mut diagnostics = DiagnosticLedger::new();
        let bundles = build_bundles(
            &request(BundlePreset::Dependencies, &records, 10_000, 1_000),
            &mut diagnostics,
        )
        .unwrap();
        assert_eq!(bundles[0].index.units.len(), 1);
        assert_eq!(bundles[0].index.units[0].unit_path, "requirements.txt");
    }

    #[test]
    fn identical_inputs_render_identical_bytes() {
        let (_dir, records) = records_for(&[("a.py", "x = 1\n")]);
        let mut d1 = DiagnosticLedger::new();
        let mut d2 = DiagnosticLedger::new();
        let first = build_bundles(
            &request(BundlePreset::All, &records, 10_000, 1_000),
            &mut d1,
        )
        .unwrap();
        let second = build_bundles(
            &request(BundlePreset::All, &records, 10_000, 1_000),
            &mut d2,
        )
        .unwrap();
        assert_eq!(first[0].content, second[0].content);
    }
}
