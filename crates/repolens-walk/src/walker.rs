//! Directory traversal.
//!
//! The walk is depth-first over real directories only (symlinks are never
//! followed), filters on canonical paths with ignore-over-include
//! precedence, and returns records sorted by canonical path. Unreadable
//! files are recorded as diagnostics and skipped; they never abort the walk.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use globset::{Glob, GlobSet, GlobSetBuilder};
use repolens_utils::canonical::canonical_rel_path;
use repolens_utils::diagnostics::{DiagnosticCode, DiagnosticLedger};
use repolens_utils::digest::StreamingDigest;
use std::fs::File;
use std::io::Read;
use std::time::UNIX_EPOCH;
use tracing::debug;

use crate::language::classify_language;
use crate::record::FileRecord;

/// Walk filters. Empty `include` admits every file.
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    pub include: Vec<String>,
    pub ignore: Vec<String>,
    /// Worker threads for digesting; 0 means single-threaded.
    pub workers: usize,
}

/// Result of one walk: sorted records plus local failures.
#[derive(Debug)]
pub struct WalkOutcome {
    pub records: Vec<FileRecord>,
    pub diagnostics: DiagnosticLedger,
}

/// Walk `root` and produce canonical records in sorted order.
pub fn walk(root: &Utf8Path, options: &WalkOptions) -> Result<WalkOutcome> {
    let include = build_globset(&options.include)?;
    let ignore = build_globset(&options.ignore)?;
    let mut diagnostics = DiagnosticLedger::new();

    let mut paths = Vec::new();
    collect_files(root, root, &mut paths, &mut diagnostics);

    let mut selected = Vec::new();
    for absolute in paths {
        let canonical = match canonical_rel_path(&absolute, root) {
            Ok(canonical) => canonical,
            Err(err) => {
                diagnostics.push_for_path(
                    DiagnosticCode::WalkUnreadable,
                    absolute.to_string(),
                    err.to_string(),
                );
                continue;
            }
        };
        if let Some(ignore) = &ignore {
            if ignore.is_match(&canonical) {
                continue;
            }
        }
        if let Some(include) = &include {
            if !include.is_match(&canonical) {
                continue;
            }
        }
        selected.push((canonical, absolute));
    }

    selected.sort_by(|a, b| a.0.cmp(&b.0));
    selected.dedup_by(|a, b| a.0 == b.0);

    // Digesting is the hot loop; it fans out over the pool and results are
    // merged back in sorted input order.
    let read_results = repolens_utils::pool::map_indexed(&selected, options.workers, |pair| {
        read_record(&pair.0, &pair.1)
    });

    let mut records = Vec::with_capacity(selected.len());
    for ((canonical, _), result) in selected.iter().zip(read_results) {
        match result {
            Ok(record) => records.push(record),
            Err(err) => {
                diagnostics.push_for_path(
                    DiagnosticCode::WalkUnreadable,
                    canonical.clone(),
                    format!("{err:#}"),
                );
            }
        }
    }

    debug!(files = records.len(), "walk complete");
    Ok(WalkOutcome {
        records,
        diagnostics,
    })
}

fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob =
            Glob::new(pattern).with_context(|| format!("Invalid glob pattern: {pattern}"))?;
        builder.add(glob);
    }
    Ok(Some(builder.build().context("Failed to build glob set")?))
}

fn collect_files(
    root: &Utf8Path,
    dir: &Utf8Path,
    out: &mut Vec<Utf8PathBuf>,
    diagnostics: &mut DiagnosticLedger,
) {
    let entries = match dir.read_dir_utf8() {
        Ok(entries) => entries,
        Err(err) => {
            diagnostics.push_for_path(
                DiagnosticCode::WalkUnreadable,
                dir.to_string(),
                err.to_string(),
            );
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                diagnostics.push_for_path(
                    DiagnosticCode::WalkUnreadable,
                    dir.to_string(),
                    err.to_string(),
                );
                continue;
            }
        };
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        // symlink_metadata semantics: a symlink is neither descended nor read
        if file_type.is_symlink() {
            continue;
        }
        if file_type.is_dir() {
            collect_files(root, entry.path(), out, diagnostics);
        } else if file_type.is_file() {
            out.push(entry.path().to_owned());
        }
    }
}

fn read_record(canonical: &str, absolute: &Utf8Path) -> Result<FileRecord> {
    let metadata = std::fs::metadata(absolute)
        .with_context(|| format!("Failed to stat: {absolute}"))?;
    let mtime_ns = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| i128::from(d.as_nanos() as u64))
        .unwrap_or(0);

    let file = File::open(absolute).with_context(|| format!("Failed to open: {absolute}"))?;
    let DigestLines { digest, lines } = digest_and_count(file)?;

    Ok(FileRecord {
        canonical_path: canonical.to_string(),
        absolute_path: absolute.to_owned(),
        digest,
        size_bytes: metadata.len(),
        mtime_ns,
        line_count: lines,
        language: classify_language(canonical).to_string(),
        cached: false,
        synopsis: None,
    })
}

struct DigestLines {
    digest: String,
    lines: u64,
}

/// Single-pass digest + line count so large files are read once, in chunks.
fn digest_and_count<R: Read>(mut reader: R) -> Result<DigestLines> {
    let mut hasher = StreamingDigest::new();
    let mut buf = vec![0u8; 64 * 1024];
    let mut newlines: u64 = 0;
    let mut total: u64 = 0;
    let mut last_byte = 0u8;

    loop {
        let n = reader.read(&mut buf).context("Failed to read file chunk")?;
        if n == 0 {
            break;
        }
        let chunk = &buf[..n];
        hasher.update(chunk);
        newlines += chunk.iter().filter(|&&b| b == b'\n').count() as u64;
        last_byte = chunk[n - 1];
        total += n as u64;
    }

    let lines = if total == 0 {
        0
    } else if last_byte == b'\n' {
        newlines
    } else {
        newlines + 1
    };

    Ok(DigestLines {
        digest: hasher.finish(),
        lines,
    })
}
