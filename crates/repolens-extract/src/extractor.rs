//! Digest-memoized extraction.

use anyhow::{Context, Result};
use repolens_cache::CacheService;
use repolens_utils::canonical::emit_jcs;
use repolens_utils::diagnostics::{DiagnosticCode, DiagnosticLedger};
use repolens_utils::digest::digest_str;
use repolens_walk::FileRecord;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use tracing::debug;

use crate::events::{module_qualified_name, EntityEvent, EventBlob, EVENT_BLOB_SCHEMA_VERSION};
use crate::heuristics::extract_events;

/// Read-only memoization counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtractorStats {
    /// Blob reused from the prior run's cache or the in-run memo.
    pub memo_hits: usize,
    /// Content parsed fresh.
    pub memo_misses: usize,
    /// Files whose events degraded to the module declaration only.
    pub degraded: usize,
}

/// Result of extracting one record.
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub blob: EventBlob,
    /// Digest of the canonical blob serialization; the cache key.
    pub events_digest: String,
    /// Canonical serialization, staged into the cache at commit.
    pub serialized: String,
    /// True when the blob came from the prior run's cache.
    pub reused: bool,
}

/// Extraction service for one run.
pub struct Extractor<'a> {
    cache: &'a CacheService,
    force_rebuild: bool,
    synopsis_lines: usize,
    memo: HashMap<String, ExtractionOutcome>,
    stats: ExtractorStats,
}

impl<'a> Extractor<'a> {
    #[must_use]
    pub fn new(cache: &'a CacheService, force_rebuild: bool, synopsis_lines: usize) -> Self {
        Self {
            cache,
            force_rebuild,
            synopsis_lines,
            memo: HashMap::new(),
            stats: ExtractorStats::default(),
        }
    }

    #[must_use]
    pub const fn stats(&self) -> &ExtractorStats {
        &self.stats
    }

    /// Extract events for a record, honoring the cached flag.
    ///
    /// A cached record reuses the prior run's blob; a repeated content
    /// digest within the run reuses the in-run memo. Parse failure degrades
    /// to the module declaration and is recorded, never fatal.
    pub fn extract(
        &mut self,
        record: &FileRecord,
        diagnostics: &mut DiagnosticLedger,
    ) -> Result<ExtractionOutcome> {
        if record.cached && !self.force_rebuild {
            if let Some(outcome) = self.lookup_prior(record) {
                self.stats.memo_hits += 1;
                return Ok(outcome);
            }
        }

        if let Some(memoized) = self.memo.get(&record.digest) {
            self.stats.memo_hits += 1;
            return Ok(memoized.clone());
        }
        self.stats.memo_misses += 1;

        let blob = parse_record(record, self.synopsis_lines)?;
        let outcome = self.finish_fresh(record, blob, diagnostics)?;
        debug!(path = %record.canonical_path, "extracted");
        Ok(outcome)
    }

    /// Extract every record, parallelizing the fresh parses over a bounded
    /// worker pool. Results come back keyed by canonical path; counters and
    /// diagnostics are merged in record order, so output is deterministic
    /// regardless of worker completion order.
    pub fn extract_all(
        &mut self,
        records: &[FileRecord],
        workers: usize,
        diagnostics: &mut DiagnosticLedger,
    ) -> Result<BTreeMap<String, ExtractionOutcome>> {
        let mut outcomes: BTreeMap<String, ExtractionOutcome> = BTreeMap::new();
        let mut fresh: Vec<&FileRecord> = Vec::new();
        let mut fresh_digests = std::collections::HashSet::new();

        for record in records {
            if record.cached && !self.force_rebuild {
                if let Some(outcome) = self.lookup_prior(record) {
                    self.stats.memo_hits += 1;
                    outcomes.insert(record.canonical_path.clone(), outcome);
                    continue;
                }
            }
            if fresh_digests.insert(record.digest.clone()) {
                fresh.push(record);
            }
        }

        let synopsis_lines = self.synopsis_lines;
        let parsed = repolens_utils::pool::map_indexed(&fresh, workers, |record| {
            parse_record(record, synopsis_lines)
        });

        for (record, blob) in fresh.iter().zip(parsed) {
            self.stats.memo_misses += 1;
            let outcome = self.finish_fresh(record, blob?, diagnostics)?;
            outcomes.insert(record.canonical_path.clone(), outcome);
        }

        // Records sharing a digest with a freshly parsed one, and cached
        // records whose prior blob was missing, resolve from the memo.
        for record in records {
            if outcomes.contains_key(&record.canonical_path) {
                continue;
            }
            let outcome = self.extract(record, diagnostics)?;
            outcomes.insert(record.canonical_path.clone(), outcome);
        }

        Ok(outcomes)
    }

    fn finish_fresh(
        &mut self,
        record: &FileRecord,
        blob: EventBlob,
        diagnostics: &mut DiagnosticLedger,
    ) -> Result<ExtractionOutcome> {
        if blob.degraded {
            self.stats.degraded += 1;
            diagnostics.push_for_path(
                DiagnosticCode::ExtractDegraded,
                record.canonical_path.clone(),
                "content is not valid UTF-8; module declaration only",
            );
        }
        let serialized = emit_jcs(&blob).context("Failed to canonicalize event blob")?;
        let events_digest = digest_str(&serialized);
        let outcome = ExtractionOutcome {
            blob,
            events_digest,
            serialized,
            reused: false,
        };
        self.memo.insert(record.digest.clone(), outcome.clone());
        Ok(outcome)
    }

    fn lookup_prior(&self, record: &FileRecord) -> Option<ExtractionOutcome> {
        let prior = self.cache.snapshot().get(&record.canonical_path)?;
        let events_digest = prior.extraction_events_digest.clone()?;
        let serialized = self.cache.load_event_blob(&events_digest)?;
        let blob: EventBlob = serde_json::from_str(&serialized).ok()?;
        if blob.schema_version != EVENT_BLOB_SCHEMA_VERSION {
            return None;
        }
        Some(ExtractionOutcome {
            blob,
            events_digest,
            serialized,
            reused: true,
        })
    }
}

/// Parse one file into its event blob. Pure function of the file bytes;
/// safe to run on worker threads.
fn parse_record(record: &FileRecord, synopsis_lines: usize) -> Result<EventBlob> {
    let bytes = fs::read(record.absolute_path.as_std_path())
        .with_context(|| format!("Failed to read file for extraction: {}", record.canonical_path))?;

    Ok(match String::from_utf8(bytes) {
        Ok(content) => {
            let events = extract_events(&record.canonical_path, &record.language, &content);
            EventBlob {
                schema_version: EVENT_BLOB_SCHEMA_VERSION,
                synopsis: extract_synopsis(&content, &record.language, synopsis_lines),
                events,
                degraded: false,
            }
        }
        Err(_) => EventBlob {
            schema_version: EVENT_BLOB_SCHEMA_VERSION,
            synopsis: None,
            events: vec![EntityEvent::ModuleDeclared {
                name: module_qualified_name(&record.canonical_path),
            }],
            degraded: true,
        },
    })
}

/// First lines of the leading heading or docstring, or `None`.
#[must_use]
pub fn extract_synopsis(content: &str, language: &str, max_lines: usize) -> Option<String> {
    if max_lines == 0 {
        return None;
    }
    let lines: Vec<&str> = match language {
        "python" => python_docstring_lines(content)?,
        "rust" => prefixed_lines(content, "//!"),
        "markdown" | "restructuredtext" | "text" => markdown_heading_lines(content)?,
        "javascript" | "typescript" => block_comment_lines(content),
        _ => return None,
    };
    if lines.is_empty() {
        return None;
    }
    let taken: Vec<&str> = lines.into_iter().take(max_lines).collect();
    Some(taken.join("\n"))
}

fn python_docstring_lines(content: &str) -> Option<Vec<&str>> {
    let mut lines = content.lines().peekable();
    while let Some(line) = lines.peek() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            lines.next();
            continue;
        }
        break;
    }
    let first = lines.next()?.trim();
    let quote = if first.starts_with("\"\"\"") {
        "\"\"\""
    } else if first.starts_with("'''") {
        "'''"
    } else {
        return None;
    };

    let inner = &first[3..];
    if let Some(stripped) = inner.strip_suffix(quote) {
        // single-line docstring
        let text = stripped.trim();
        return (!text.is_empty()).then(|| vec![text]);
    }

    let mut collected = Vec::new();
    if !inner.trim().is_empty() {
        collected.push(inner.trim());
    }
    for line in lines {
        if line.trim_end().ends_with(quote) {
            let body = line.trim_end();
            let body = &body[..body.len() - 3];
            if !body.trim().is_empty() {
                collected.push(body.trim());
            }
            break;
        }
        collected.push(line.trim());
    }
    Some(collected)
}

fn prefixed_lines<'c>(content: &'c str, prefix: &str) -> Vec<&'c str> {
    content
        .lines()
        .take_while(|l| l.trim_start().starts_with(prefix))
        .map(|l| l.trim_start().trim_start_matches(prefix).trim())
        .filter(|l| !l.is_empty())
        .collect()
}

fn markdown_heading_lines(content: &str) -> Option<Vec<&str>> {
    let mut out = Vec::new();
    for line in content.lines() {
        let trimmed = line.trim();
        if out.is_empty() {
            if trimmed.is_empty() {
                continue;
            }
            if !trimmed.starts_with('#') {
                return None;
            }
            out.push(trimmed.trim_start_matches('#').trim());
        } else {
            if trimmed.is_empty() {
                break;
            }
            out.push(trimmed);
        }
    }
    Some(out)
}

fn block_comment_lines(content: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut in_block = false;
    for line in content.lines() {
        let trimmed = line.trim();
        if !in_block {
            if trimmed.starts_with("/**") || trimmed.starts_with("/*") {
                in_block = true;
                continue;
            }
            if trimmed.starts_with("//") {
                let text = trimmed.trim_start_matches('/').trim();
                if !text.is_empty() {
                    out.push(text);
                }
                continue;
            }
            break;
        }
        if trimmed.contains("*/") {
            break;
        }
        let text = trimmed.trim_start_matches('*').trim();
        if !text.is_empty() {
            out.push(text);
        }
    }
    out
}
