//! Cache persistence and the per-run snapshot.

use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use fd_lock::RwLock as FdRwLock;
use repolens_utils::atomic_write::{write_bytes_atomic, write_text_atomic};
use repolens_utils::canonical::emit_jcs;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs::{self, File};
use tracing::{debug, warn};

/// Version of the on-disk cache schema. An incompatible version resets the
/// cache, which forces a full rescan.
pub const CACHE_SCHEMA_VERSION: u32 = 1;

const CACHE_FILE_NAME: &str = "cache.json";
const BLOB_DIR_NAME: &str = "events";
const LOCK_FILE_NAME: &str = ".lock";

/// One cached file, persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub canonical_path: String,
    pub digest: String,
    pub size_bytes: u64,
    pub mtime_ns: i128,
    pub last_seen_run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_events_digest: Option<String>,
}

/// Blob-store access counters, reported in the run summary.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub invalidations: usize,
    pub writes: usize,
}

/// Immutable view of the prior run's cache state.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CacheSnapshot {
    entries: BTreeMap<String, CacheEntry>,
}

impl CacheSnapshot {
    #[must_use]
    pub fn get(&self, canonical_path: &str) -> Option<&CacheEntry> {
        self.entries.get(canonical_path)
    }

    #[must_use]
    pub fn entries(&self) -> &BTreeMap<String, CacheEntry> {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a walked file matches its cached digest and size.
    #[must_use]
    pub fn is_cached(&self, canonical_path: &str, digest: &str, size_bytes: u64) -> bool {
        self.entries
            .get(canonical_path)
            .is_some_and(|e| e.digest == digest && e.size_bytes == size_bytes)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    schema_version: u32,
    entries: BTreeMap<String, CacheEntry>,
}

/// Handle to the on-disk cache for one scan root.
///
/// `open` loads a snapshot; the only mutation path is [`CacheService::commit`]
/// which stages the new map to a temp file and swaps it in under an advisory
/// lock, after the run has finalized.
#[derive(Debug)]
pub struct CacheService {
    dir: Utf8PathBuf,
    snapshot: CacheSnapshot,
    schema_was_reset: bool,
    stats: RefCell<CacheStats>,
}

impl CacheService {
    /// Open (or initialize) the cache under `dir`.
    ///
    /// A missing or unreadable cache file, or one with an incompatible
    /// `schema_version`, yields an empty snapshot; the reset is reported via
    /// [`CacheService::schema_was_reset`] so the orchestrator can log it.
    pub fn open(dir: &Utf8Path) -> Result<Self> {
        fs::create_dir_all(dir.as_std_path())
            .with_context(|| format!("Failed to create cache directory: {dir}"))?;

        let cache_path = dir.join(CACHE_FILE_NAME);
        let mut schema_was_reset = false;
        let snapshot = if cache_path.is_file() {
            match load_cache_file(&cache_path) {
                Ok(file) if file.schema_version == CACHE_SCHEMA_VERSION => CacheSnapshot {
                    entries: file.entries,
                },
                Ok(file) => {
                    warn!(
                        found = file.schema_version,
                        expected = CACHE_SCHEMA_VERSION,
                        "cache schema version mismatch; forcing full rescan"
                    );
                    schema_was_reset = true;
                    CacheSnapshot::default()
                }
                Err(err) => {
                    warn!("cache file unreadable ({err:#}); forcing full rescan");
                    schema_was_reset = true;
                    CacheSnapshot::default()
                }
            }
        } else {
            CacheSnapshot::default()
        };

        Ok(Self {
            dir: dir.to_owned(),
            snapshot,
            schema_was_reset,
            stats: RefCell::new(CacheStats::default()),
        })
    }

    #[must_use]
    pub fn snapshot(&self) -> &CacheSnapshot {
        &self.snapshot
    }

    /// True when an incompatible or corrupt cache file was discarded on open.
    #[must_use]
    pub fn schema_was_reset(&self) -> bool {
        self.schema_was_reset
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        *self.stats.borrow()
    }

    /// Load an extraction event blob by its digest key.
    pub fn load_event_blob(&self, events_digest: &str) -> Option<String> {
        let path = self.blob_path(events_digest);
        match fs::read_to_string(path.as_std_path()) {
            Ok(content) => {
                self.stats.borrow_mut().hits += 1;
                Some(content)
            }
            Err(_) => {
                self.stats.borrow_mut().misses += 1;
                None
            }
        }
    }

    /// Swap in the post-run cache state. Called exactly once, after the run
    /// directory has finalized; holds the advisory lock for the swap.
    ///
    /// `blobs` pairs an extraction-events digest with its serialized blob.
    /// Blobs land before the map swap so a committed entry never references
    /// a missing blob; they are content-addressed, so rewriting an existing
    /// key is byte-identical and harmless.
    pub fn commit(
        &self,
        run_id: &str,
        seen: Vec<CacheEntry>,
        blobs: &[(String, String)],
    ) -> Result<()> {
        let mut entries = self.snapshot.entries.clone();
        let mut invalidations = 0usize;
        for mut entry in seen {
            entry.last_seen_run_id = run_id.to_string();
            if let Some(prior) = entries.get(&entry.canonical_path) {
                if prior.digest != entry.digest {
                    invalidations += 1;
                }
            }
            entries.insert(entry.canonical_path.clone(), entry);
        }

        let file = CacheFile {
            schema_version: CACHE_SCHEMA_VERSION,
            entries,
        };
        let canonical = emit_jcs(&file).context("Failed to canonicalize cache file")?;

        let lock_path = self.dir.join(LOCK_FILE_NAME);
        let lock_file = File::create(lock_path.as_std_path())
            .with_context(|| format!("Failed to create cache lock file: {lock_path}"))?;
        let mut lock = FdRwLock::new(lock_file);
        let _guard = lock
            .write()
            .context("Failed to acquire cache lock for commit")?;

        for (events_digest, content) in blobs {
            write_text_atomic(&self.blob_path(events_digest), content)
                .with_context(|| format!("Failed to store event blob: {events_digest}"))?;
        }

        write_bytes_atomic(&self.dir.join(CACHE_FILE_NAME), canonical.as_bytes())
            .context("Failed to swap cache file")?;

        let mut stats = self.stats.borrow_mut();
        stats.invalidations += invalidations;
        stats.writes += 1 + blobs.len();
        debug!(entries = file.entries.len(), "cache committed");
        Ok(())
    }

    fn blob_path(&self, events_digest: &str) -> Utf8PathBuf {
        self.dir
            .join(BLOB_DIR_NAME)
            .join(format!("{events_digest}.json"))
    }
}

fn load_cache_file(path: &Utf8Path) -> Result<CacheFile> {
    let content = fs::read_to_string(path.as_std_path())
        .with_context(|| format!("Failed to read cache file: {path}"))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse cache file: {path}"))
}
