//! Retention: prune old sibling run directories after finalization.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use repolens_utils::diagnostics::{DiagnosticCode, DiagnosticLedger};
use tracing::debug;

/// Prune run directories under `runs_root` beyond `keep`, preserving
/// `current` unconditionally. Oldest directories (by modification time,
/// then name) go first. Returns the pruned paths.
pub fn prune_runs(
    runs_root: &Utf8Path,
    current: &Utf8Path,
    keep: usize,
    diagnostics: &mut DiagnosticLedger,
) -> Result<Vec<Utf8PathBuf>> {
    let mut candidates: Vec<(std::time::SystemTime, Utf8PathBuf)> = Vec::new();
    let entries = runs_root
        .read_dir_utf8()
        .with_context(|| format!("Failed to list runs directory: {runs_root}"))?;
    for entry in entries {
        let entry = entry.context("Failed to read runs directory entry")?;
        let path = entry.path().to_owned();
        if !path.is_dir() || path == current {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(std::time::UNIX_EPOCH);
        candidates.push((modified, path));
    }

    // newest first; everything past keep - 1 (current counts toward keep)
    candidates.sort_by(|a, b| b.cmp(a));
    let keep_siblings = keep.saturating_sub(1);
    let mut pruned = Vec::new();
    for (_, path) in candidates.into_iter().skip(keep_siblings) {
        std::fs::remove_dir_all(path.as_std_path())
            .with_context(|| format!("Failed to prune run directory: {path}"))?;
        diagnostics.push_for_path(
            DiagnosticCode::RetentionPruned,
            path.to_string(),
            "pruned by retention policy",
        );
        debug!(%path, "pruned run directory");
        pruned.push(path);
    }
    Ok(pruned)
}
