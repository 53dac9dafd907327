//! Run identity.
//!
//! Both the run id and the run timestamp are pure functions of the inputs
//! (resolved configuration plus walked records), never of the wall clock.
//! That is what makes every artifact byte, the manifest included,
//! reproducible for an unchanged tree.

use chrono::{DateTime, Utc};
use repolens_utils::digest::digest_str;
use repolens_walk::FileRecord;

/// Derive the run id: `<compact timestamp>-<12 hex>` where the hex is a
/// digest over the resolved config digest and every record's identity.
#[must_use]
pub fn derive_run_id(resolved_config_digest: &str, records: &[FileRecord]) -> String {
    let mut seed = String::from(resolved_config_digest);
    for record in records {
        seed.push('\u{1f}');
        seed.push_str(&record.canonical_path);
        seed.push('\u{1f}');
        seed.push_str(&record.digest);
    }
    let mut short = digest_str(&seed);
    short.truncate(12);

    let timestamp = derive_timestamp(records);
    format!("{}-{short}", timestamp.format("%Y%m%dT%H%M%SZ"))
}

/// The run timestamp: the newest record mtime, truncated to seconds; the
/// Unix epoch for an empty tree.
#[must_use]
pub fn derive_timestamp(records: &[FileRecord]) -> DateTime<Utc> {
    let max_mtime_ns = records.iter().map(|r| r.mtime_ns).max().unwrap_or(0);
    let secs = (max_mtime_ns / 1_000_000_000) as i64;
    DateTime::from_timestamp(secs, 0).unwrap_or_else(|| DateTime::from_timestamp(0, 0).unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    fn record(path: &str, digest: &str, mtime_ns: i128) -> FileRecord {
        FileRecord {
            canonical_path: path.into(),
            absolute_path: Utf8PathBuf::from("/scan").join(path),
            digest: digest.into(),
            size_bytes: 1,
            mtime_ns,
            line_count: 1,
            language: "python".into(),
            cached: false,
            synopsis: None,
        }
    }

    #[test]
    fn run_id_is_stable_for_identical_inputs() {
        let records = vec![record("a.py", "d1", 1_700_000_000_000_000_000)];
        assert_eq!(derive_run_id("cfg", &records), derive_run_id("cfg", &records));
    }

    #[test]
    fn run_id_changes_with_content_or_config() {
        let records = vec![record("a.py", "d1", 1_700_000_000_000_000_000)];
        let edited = vec![record("a.py", "d2", 1_700_000_000_000_000_000)];
        assert_ne!(derive_run_id("cfg", &records), derive_run_id("cfg", &edited));
        assert_ne!(derive_run_id("cfg", &records), derive_run_id("cfg2", &records));
    }

    #[test]
    fn empty_tree_uses_epoch_timestamp() {
        let id = derive_run_id("cfg", &[]);
        assert!(id.starts_with("19700101T000000Z-"));
    }
}
