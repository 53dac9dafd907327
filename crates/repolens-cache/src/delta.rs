//! Per-run delta classification.
//!
//! Classification runs over the union of prior cache keys and current walk
//! records, so a path can appear exactly once:
//! added (no prior entry), changed (digest differs), unchanged (digest
//! equal), removed (prior entry not seen by this walk).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::service::CacheSnapshot;

/// Delta classification for one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaState {
    Added,
    Changed,
    Removed,
    Unchanged,
}

impl std::fmt::Display for DeltaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Added => "added",
            Self::Changed => "changed",
            Self::Removed => "removed",
            Self::Unchanged => "unchanged",
        };
        f.write_str(s)
    }
}

/// The full delta for one run: per-path states plus summary counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeltaReport {
    pub schema_version: u32,
    pub summary: DeltaSummary,
    /// Sorted by canonical path.
    pub files: BTreeMap<String, DeltaState>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaSummary {
    pub added: usize,
    pub changed: usize,
    pub removed: usize,
    pub unchanged: usize,
}

/// Classify current records against the prior snapshot.
///
/// `current` pairs canonical path with digest; the caller supplies them in
/// any order.
#[must_use]
pub fn classify_delta(prior: &CacheSnapshot, current: &[(String, String)]) -> DeltaReport {
    let mut files = BTreeMap::new();
    let mut summary = DeltaSummary::default();

    for (path, digest) in current {
        let state = match prior.get(path) {
            None => DeltaState::Added,
            Some(entry) if &entry.digest == digest => DeltaState::Unchanged,
            Some(_) => DeltaState::Changed,
        };
        match state {
            DeltaState::Added => summary.added += 1,
            DeltaState::Changed => summary.changed += 1,
            DeltaState::Unchanged => summary.unchanged += 1,
            DeltaState::Removed => unreachable!(),
        }
        files.insert(path.clone(), state);
    }

    for path in prior.entries().keys() {
        if !files.contains_key(path) {
            files.insert(path.clone(), DeltaState::Removed);
            summary.removed += 1;
        }
    }

    DeltaReport {
        schema_version: 1,
        summary,
        files,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::{CacheEntry, CacheService};
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    fn snapshot_with(entries: Vec<CacheEntry>) -> CacheSnapshot {
        // Round-trip through a real cache so tests exercise the same code
        // path the orchestrator uses.
        let dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("cache")).unwrap();
        let cache = CacheService::open(&path).unwrap();
        cache.commit("seed", entries, &[]).unwrap();
        CacheService::open(&path).unwrap().snapshot().clone()
    }

    fn entry(path: &str, digest: &str) -> CacheEntry {
        CacheEntry {
            canonical_path: path.into(),
            digest: digest.into(),
            size_bytes: 1,
            mtime_ns: 0,
            last_seen_run_id: String::new(),
            extraction_events_digest: None,
        }
    }

    #[test]
    fn classifies_all_four_states() {
        let prior = snapshot_with(vec![
            entry("same.py", "d1"),
            entry("edited.py", "d2"),
            entry("deleted.py", "d3"),
        ]);
        let current = vec![
            ("same.py".to_string(), "d1".to_string()),
            ("edited.py".to_string(), "dX".to_string()),
            ("new.py".to_string(), "d4".to_string()),
        ];

        let report = classify_delta(&prior, &current);
        assert_eq!(report.files["same.py"], DeltaState::Unchanged);
        assert_eq!(report.files["edited.py"], DeltaState::Changed);
        assert_eq!(report.files["new.py"], DeltaState::Added);
        assert_eq!(report.files["deleted.py"], DeltaState::Removed);
        assert_eq!(
            report.summary,
            DeltaSummary {
                added: 1,
                changed: 1,
                removed: 1,
                unchanged: 1
            }
        );
    }

    #[test]
    fn counts_partition_current_records() {
        let prior = snapshot_with(vec![entry("a.py", "d1")]);
        let current = vec![
            ("a.py".to_string(), "d1".to_string()),
            ("b.py".to_string(), "d2".to_string()),
        ];
        let report = classify_delta(&prior, &current);
        assert_eq!(
            report.summary.added + report.summary.changed + report.summary.unchanged,
            current.len()
        );
    }

    #[test]
    fn empty_both_sides_is_empty_report() {
        let prior = CacheSnapshot::default();
        let report = classify_delta(&prior, &[]);
        assert!(report.files.is_empty());
        assert_eq!(report.summary, DeltaSummary::default());
    }
}
