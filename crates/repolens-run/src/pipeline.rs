//! Pipeline driver: one `execute` call per run.

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use repolens_bundle::{build_bundles, detect_license_hint, BundleRequest};
use repolens_cache::{classify_delta, CacheEntry, CacheService, DeltaSummary};
use repolens_cards::{compose_cards, CardInputs, CardScope};
use repolens_config::Config;
use repolens_diagram::{
    diagram_cache_key, emit_template, probe_renderers, project_graph, render_diagram,
    resolve_theme, validate_theme, RendererProbe,
};
use repolens_extract::{parse_dependency_manifest, DependencyEvent, EventBlob, Extractor};
use repolens_graph::{
    build_graph, diff_graphs, parse_json_ld, render_diff_markdown, to_graphml, to_json_ld,
    validate_graph, ArtifactRef, Graph, GraphInputs,
};
use repolens_metrics::{
    aggregate_metrics, evaluate_gates, parse_metrics_document, GateVerdict, MetricsDocument,
};
use repolens_utils::atomic_write::{write_bytes_atomic, write_text_atomic};
use repolens_utils::canonical::emit_jcs;
use repolens_utils::diagnostics::{DiagnosticCode, DiagnosticLedger};
use repolens_utils::digest::digest_file;
use repolens_utils::error::RepolensError;
use repolens_walk::{walk, FileRecord, WalkOptions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::ids::{derive_run_id, derive_timestamp};
use crate::layout::RunLayout;
use crate::manifest::{
    write_manifest, ArtifactEntry, Environment, Manifest, ManifestFileRecord, SkipEntry,
    MANIFEST_SCHEMA_VERSION,
};
use crate::retention::prune_runs;
use crate::summary::render_summary;

/// Cooperative cancellation signal shared with the caller.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a completed run reports back to the CLI.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: String,
    pub run_dir: Utf8PathBuf,
    pub files: usize,
    pub delta: DeltaSummary,
    pub gate: GateVerdict,
    pub gate_failed_count: usize,
    pub gate_evaluated_count: usize,
    pub diagnostics_count: usize,
}

impl RunOutcome {
    #[must_use]
    pub fn gate_failed(&self) -> bool {
        self.gate == GateVerdict::Fail
    }
}

/// Per-diagram entry in `diagrams/metadata.json`.
#[derive(Debug, Serialize, Deserialize)]
struct DiagramMetadataEntry {
    preset: String,
    format: String,
    theme: String,
    cache_key: String,
    cache_hit: bool,
    fallback: bool,
    src_path: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct DiagramMetadata {
    schema_version: u32,
    probes: Vec<RendererProbe>,
    diagrams: Vec<DiagramMetadataEntry>,
}

/// Execute one run end to end.
///
/// Fatal errors map to exit codes via `RepolensError::to_exit_code`. A gate
/// failure is not an error here; it is reported in the outcome so the CLI
/// can finish writing artifacts first and exit 2 after.
pub fn execute(config: &Config, cancel: &CancelFlag) -> Result<RunOutcome, RepolensError> {
    let mut diagnostics = DiagnosticLedger::new();
    let started = Instant::now();

    // Theme accessibility is enforced before anything is written
    let theme = resolve_theme(config.diagrams.theme);
    if config.diagrams.enabled {
        validate_theme(&theme).map_err(RepolensError::Config)?;
    }

    let cache = CacheService::open(&config.cache_dir).map_err(internal)?;
    if cache.schema_was_reset() {
        diagnostics.push(
            DiagnosticCode::CacheSchemaReset,
            "cache schema version incompatible; full rescan forced",
        );
    }
    let force_rebuild = config.force_rebuild || cache.schema_was_reset();

    // --- walk ---
    let stage_started = Instant::now();
    let mut ignore: Vec<String> = repolens_config::DEFAULT_IGNORE_PATTERNS
        .iter()
        .map(|s| (*s).to_string())
        .collect();
    ignore.extend(config.ignore.iter().cloned());
    let walk_outcome = walk(
        &config.input_root,
        &WalkOptions {
            include: config.include.clone(),
            ignore,
            workers: config.diagram_workers(),
        },
    )
    .map_err(internal)?;
    let mut records = walk_outcome.records;
    diagnostics.extend(walk_outcome.diagnostics);
    for record in &mut records {
        record.cached = config.incremental
            && cache
                .snapshot()
                .is_cached(&record.canonical_path, &record.digest, record.size_bytes);
    }
    check_stage("walk", stage_started, config.stage_timeout_secs)?;
    check_cancelled(cancel, None)?;

    // --- delta ---
    let pairs: Vec<(String, String)> = records
        .iter()
        .map(|r| (r.canonical_path.clone(), r.digest.clone()))
        .collect();
    let delta = classify_delta(cache.snapshot(), &pairs);

    // --- extraction ---
    let stage_started = Instant::now();
    let mut extractor = Extractor::new(&cache, force_rebuild, config.bundle.synopsis_lines);
    let extraction = extractor
        .extract_all(&records, config.diagram_workers(), &mut diagnostics)
        .map_err(internal)?;
    for record in &mut records {
        if let Some(outcome) = extraction.get(&record.canonical_path) {
            record.synopsis = outcome.blob.synopsis.clone();
        }
    }
    let records = records; // immutable from here on
    check_stage("extract", stage_started, config.stage_timeout_secs)?;
    check_cancelled(cancel, None)?;

    // --- dependency parsing ---
    let mut dependency_events: Vec<DependencyEvent> = Vec::new();
    for record in &records {
        if !record.is_dependency_manifest() {
            continue;
        }
        match std::fs::read_to_string(record.absolute_path.as_std_path()) {
            Ok(content) => {
                dependency_events.extend(parse_dependency_manifest(&record.canonical_path, &content));
            }
            Err(err) => diagnostics.push_for_path(
                DiagnosticCode::WalkUnreadable,
                record.canonical_path.clone(),
                format!("unreadable while parsing dependencies: {err}"),
            ),
        }
    }

    // --- run identity and directory ---
    let config_digest = config.resolved_digest()?;
    let run_id = derive_run_id(&config_digest, &records);
    let timestamp = derive_timestamp(&records);
    std::fs::create_dir_all(config.runs_root.as_std_path()).map_err(RepolensError::Io)?;
    let layout = RunLayout::new(unique_run_dir(&config.runs_root, &run_id));
    layout.create_all().map_err(RepolensError::Io)?;
    info!(run_id = %run_id, dir = %layout.root, "run directory created");

    let mut artifacts: Vec<(String, Utf8PathBuf)> = Vec::new();
    let mut skips: Vec<SkipEntry> = Vec::new();

    // --- delta artifact ---
    write_json(&layout.delta_path(), &delta).map_err(internal)?;
    artifacts.push(("delta".into(), layout.delta_path()));

    // --- bundles ---
    let stage_started = Instant::now();
    let license_hint = detect_license_hint(&config.input_root);
    let mut artifact_refs: Vec<ArtifactRef> = Vec::new();
    let mut bundle_stems: Vec<String> = Vec::new();
    for preset in &config.bundle.presets {
        let bundles = build_bundles(
            &BundleRequest {
                preset: *preset,
                records: &records,
                max_bytes: config.bundle.max_bundle_bytes,
                max_lines: config.bundle.max_bundle_lines,
                license_hint: &license_hint,
            },
            &mut diagnostics,
        )
        .map_err(internal)?;
        for bundle in bundles {
            let stem = bundle.file_stem();
            let text_path = layout.bundles_dir().join(format!("{stem}.txt"));
            let index_path = layout.bundles_dir().join(format!("{stem}.index.json"));
            write_text_atomic(&text_path, &bundle.content).map_err(internal)?;
            write_json(&index_path, &bundle.index).map_err(internal)?;
            // header-only sequences are files, not graph artifacts
            if !bundle.index.units.is_empty() {
                artifact_refs.push(ArtifactRef {
                    kind: "bundle".into(),
                    relative_path: layout.relative_to_root(&text_path),
                    derived_paths: bundle
                        .index
                        .units
                        .iter()
                        .map(|u| u.unit_path.clone())
                        .collect(),
                });
            }
            artifacts.push(("bundle".into(), text_path));
            artifacts.push(("bundle_index".into(), index_path));
            bundle_stems.push(stem);
        }
    }
    check_stage("bundle", stage_started, config.stage_timeout_secs)?;
    check_cancelled(cancel, Some(&layout))?;

    // --- planned diagram artifacts (registered in the graph) ---
    let diagram_jobs: Vec<(repolens_config::DiagramPreset, repolens_config::DiagramFormat)> =
        if config.graph.enabled && config.diagrams.enabled {
            config
                .diagrams
                .presets
                .iter()
                .flat_map(|p| config.diagrams.formats.iter().map(move |f| (*p, *f)))
                .collect()
        } else {
            Vec::new()
        };
    if !records.is_empty() {
        for (preset, format) in &diagram_jobs {
            artifact_refs.push(ArtifactRef {
                kind: "diagram".into(),
                relative_path: format!("diagrams/{preset}.{format}.src"),
                derived_paths: Vec::new(),
            });
        }
    }

    // --- graph ---
    let stage_started = Instant::now();
    let mut built_graph: Option<Graph> = None;
    let mut graph_diff = None;
    if config.graph.enabled {
        let blobs: BTreeMap<String, EventBlob> = extraction
            .iter()
            .map(|(path, outcome)| (path.clone(), outcome.blob.clone()))
            .collect();
        let graph = build_graph(&GraphInputs {
            run_id: &run_id,
            records: &records,
            blobs: &blobs,
            dependency_events: &dependency_events,
            artifacts: &artifact_refs,
            scope: config.graph.scope,
            include_tests: config.graph.include_tests,
        });
        validate_graph(&graph).map_err(RepolensError::Invariant)?;

        let json_ld = to_json_ld(&graph).map_err(internal)?;
        write_bytes_atomic(&layout.graph_json_path(), json_ld.as_bytes()).map_err(internal)?;
        let graphml = to_graphml(&graph).map_err(internal)?;
        write_text_atomic(&layout.graph_graphml_path(), &graphml).map_err(internal)?;
        artifacts.push(("graph".into(), layout.graph_json_path()));
        artifacts.push(("graph".into(), layout.graph_graphml_path()));

        if config.graph.diff {
            if let Some(prior_graph) = load_prior_graph(&config.runs_root, &layout.root) {
                let diff = diff_graphs(&prior_graph, &graph);
                write_json(&layout.graph_diff_json_path(), &diff).map_err(internal)?;
                write_text_atomic(&layout.graph_diff_md_path(), &render_diff_markdown(&diff))
                    .map_err(internal)?;
                artifacts.push(("graph_diff".into(), layout.graph_diff_json_path()));
                artifacts.push(("graph_diff".into(), layout.graph_diff_md_path()));
                graph_diff = Some(diff);
            }
        } else {
            skips.push(SkipEntry {
                stage: "graph_diff".into(),
                reason: "disabled by configuration".into(),
            });
        }
        built_graph = Some(graph);
    } else {
        skips.push(SkipEntry {
            stage: "graph".into(),
            reason: "disabled by configuration".into(),
        });
    }
    check_stage("graph", stage_started, config.stage_timeout_secs)?;
    check_cancelled(cancel, Some(&layout))?;

    // --- diagrams ---
    let stage_started = Instant::now();
    if let Some(graph) = &built_graph {
        if config.diagrams.enabled {
            let probes = probe_renderers(&config.diagrams.formats);
            let prior_metadata = load_prior_diagram_metadata(&config.runs_root, &layout.root);

            struct DiagramWork {
                preset: repolens_config::DiagramPreset,
                format: repolens_config::DiagramFormat,
                cache_key: String,
                cache_hit: bool,
                template: String,
                labels: Vec<String>,
                renderer_available: bool,
            }

            let mut work = Vec::new();
            for (preset, format) in &diagram_jobs {
                let projection = project_graph(graph, *preset);
                let subgraph_digest = projection.digest().map_err(internal)?;
                let cache_key =
                    diagram_cache_key(*preset, *format, config.diagrams.theme, &subgraph_digest);
                let reused = prior_metadata.as_ref().and_then(|(dir, metadata)| {
                    metadata
                        .diagrams
                        .iter()
                        .find(|d| d.cache_key == cache_key)
                        .and_then(|d| std::fs::read_to_string(dir.join(&d.src_path).as_std_path()).ok())
                });
                let cache_hit = reused.is_some();
                let template =
                    reused.unwrap_or_else(|| emit_template(&projection, *format, &theme));
                let renderer_available = probes
                    .iter()
                    .any(|p| p.renderer == repolens_diagram::renderer_binary(*format) && p.available);
                work.push(DiagramWork {
                    preset: *preset,
                    format: *format,
                    cache_key,
                    cache_hit,
                    template,
                    labels: projection
                        .subgraph
                        .nodes
                        .iter()
                        .map(|(_, kind, label)| format!("{kind} {label}"))
                        .collect(),
                    renderer_available,
                });
            }

            let rendered = repolens_utils::pool::map_indexed(
                &work,
                config.diagram_workers(),
                |job| {
                    render_diagram(
                        job.format,
                        &job.template,
                        &job.labels,
                        &theme,
                        job.renderer_available,
                    )
                },
            );

            let mut entries = Vec::new();
            for (job, output) in work.iter().zip(rendered) {
                let src_rel = format!("diagrams/{}.{}.src", job.preset, job.format);
                let src_path = layout.root.join(&src_rel);
                let out_path = layout
                    .diagrams_dir()
                    .join(format!("{}.{}.{}", job.preset, job.format, output.extension));
                write_text_atomic(&src_path, &job.template).map_err(internal)?;
                write_bytes_atomic(&out_path, &output.bytes).map_err(internal)?;
                artifacts.push(("diagram".into(), src_path));
                artifacts.push(("diagram_render".into(), out_path));
                if output.fallback && job.renderer_available {
                    diagnostics.push_for_path(
                        DiagnosticCode::RenderFallback,
                        src_rel.clone(),
                        "external renderer failed; deterministic fallback used",
                    );
                }
                entries.push(DiagramMetadataEntry {
                    preset: job.preset.to_string(),
                    format: job.format.to_string(),
                    theme: config.diagrams.theme.to_string(),
                    cache_key: job.cache_key.clone(),
                    cache_hit: job.cache_hit,
                    fallback: output.fallback,
                    src_path: src_rel,
                });
            }
            let metadata = DiagramMetadata {
                schema_version: 1,
                probes,
                diagrams: entries,
            };
            write_json(&layout.diagram_metadata_path(), &metadata).map_err(internal)?;
            artifacts.push(("diagram_metadata".into(), layout.diagram_metadata_path()));
        } else {
            skips.push(SkipEntry {
                stage: "diagrams".into(),
                reason: "disabled by configuration".into(),
            });
        }
    } else if config.diagrams.enabled {
        skips.push(SkipEntry {
            stage: "diagrams".into(),
            reason: "graph disabled; diagrams require the graph".into(),
        });
    }
    check_stage("diagrams", stage_started, config.stage_timeout_secs)?;
    check_cancelled(cancel, Some(&layout))?;

    // --- metrics ---
    let mut documents: Vec<(String, MetricsDocument)> = Vec::new();
    for path in &config.metrics_files {
        let label = path
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| path.to_string());
        let parsed = std::fs::read_to_string(path.as_std_path())
            .map_err(anyhow::Error::from)
            .and_then(|content| parse_metrics_document(&content));
        match parsed {
            Ok(document) => documents.push((label, document)),
            Err(err) => diagnostics.push_for_path(
                DiagnosticCode::MetricsSkipped,
                label,
                format!("{err:#}"),
            ),
        }
    }
    let metrics_bundle = aggregate_metrics(&documents);
    write_json(&layout.metrics_path(), &metrics_bundle).map_err(internal)?;
    artifacts.push(("metrics".into(), layout.metrics_path()));

    // --- gate ---
    let gate = evaluate_gates(&config.thresholds, &metrics_bundle);
    write_json(&layout.gate_path(), &gate).map_err(internal)?;
    artifacts.push(("gate".into(), layout.gate_path()));

    // --- cards ---
    if let Some(graph) = &built_graph {
        let cards = compose_cards(
            &[CardScope::Architecture, CardScope::Quality, CardScope::Tests],
            &CardInputs {
                graph,
                metrics: &metrics_bundle,
                gate: &gate,
                diff: graph_diff.as_ref(),
                bundle_stems: &bundle_stems,
            },
        )
        .map_err(internal)?;
        let mut index = Vec::new();
        for card in &cards {
            let md_path = layout.cards_dir().join(format!("{}.md", card.id));
            let json_path = layout.cards_dir().join(format!("{}.json", card.id));
            write_text_atomic(&md_path, &card.markdown).map_err(internal)?;
            write_json(&json_path, card).map_err(internal)?;
            artifacts.push(("card".into(), md_path));
            artifacts.push(("card".into(), json_path));
            index.push(serde_json::json!({
                "id": card.id,
                "scope": card.scope,
                "markdown": format!("{}.md", card.id),
                "sidecar": format!("{}.json", card.id),
            }));
        }
        let index_path = layout.cards_dir().join("index.json");
        write_json(
            &index_path,
            &serde_json::json!({"schema_version": 1, "cards": index}),
        )
        .map_err(internal)?;
        artifacts.push(("card_index".into(), index_path));
    } else {
        skips.push(SkipEntry {
            stage: "cards".into(),
            reason: "graph disabled; cards are generated from the graph".into(),
        });
    }

    // External-adapter stages with no configured backend
    skips.push(SkipEntry {
        stage: "assets".into(),
        reason: "no asset adapter configured".into(),
    });
    skips.push(SkipEntry {
        stage: "badges".into(),
        reason: "no badge renderer configured".into(),
    });

    // --- run log ---
    let mut log = String::new();
    for diagnostic in diagnostics.entries() {
        match &diagnostic.path {
            Some(path) => log.push_str(&format!(
                "{} {} {}\n",
                diagnostic.code, path, diagnostic.message
            )),
            None => log.push_str(&format!("{} {}\n", diagnostic.code, diagnostic.message)),
        }
    }
    let extractor_stats = *extractor.stats();
    log.push_str(&format!(
        "extractor memo_hits={} memo_misses={} degraded={}\n",
        extractor_stats.memo_hits, extractor_stats.memo_misses, extractor_stats.degraded
    ));
    let cache_stats = cache.stats();
    log.push_str(&format!(
        "cache hits={} misses={} invalidations={} writes={}\n",
        cache_stats.hits, cache_stats.misses, cache_stats.invalidations, cache_stats.writes
    ));
    write_text_atomic(&layout.run_log_path(), &log).map_err(internal)?;

    // --- manifest ---
    let mut artifact_entries = Vec::with_capacity(artifacts.len());
    for (kind, path) in &artifacts {
        artifact_entries.push(ArtifactEntry {
            kind: kind.clone(),
            relative_path: layout.relative_to_root(path),
            digest: digest_file(path).map_err(internal)?,
        });
    }
    artifact_entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    let manifest = Manifest {
        schema_version: MANIFEST_SCHEMA_VERSION,
        run_id: run_id.clone(),
        timestamp_utc: timestamp.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        config_version: config.config_version.clone(),
        seed: config.seed,
        resolved_config_digest: config_digest,
        environment: Environment::current(),
        file_records: records
            .iter()
            .map(|r| ManifestFileRecord {
                path: r.canonical_path.clone(),
                digest: r.digest.clone(),
                size_bytes: r.size_bytes,
                mtime_ns: r.mtime_ns,
            })
            .collect(),
        artifacts: artifact_entries,
        skips,
    };
    write_manifest(&layout.manifest_path(), &manifest).map_err(internal)?;

    // --- summary ---
    let summary = render_summary(&manifest, &delta, &gate, &diagnostics);
    write_text_atomic(&layout.summary_path(), &summary).map_err(internal)?;

    // --- cache commit, strictly after finalization ---
    let entries: Vec<CacheEntry> = records
        .iter()
        .map(|r| CacheEntry {
            canonical_path: r.canonical_path.clone(),
            digest: r.digest.clone(),
            size_bytes: r.size_bytes,
            mtime_ns: r.mtime_ns,
            last_seen_run_id: String::new(),
            extraction_events_digest: extraction
                .get(&r.canonical_path)
                .map(|o| o.events_digest.clone()),
        })
        .collect();
    let mut blobs: Vec<(String, String)> = extraction
        .values()
        .filter(|o| !o.reused)
        .map(|o| (o.events_digest.clone(), o.serialized.clone()))
        .collect();
    blobs.sort();
    blobs.dedup();
    cache.commit(&run_id, entries, &blobs).map_err(internal)?;

    // --- retention ---
    if let Some(keep) = config.retention {
        prune_runs(&config.runs_root, &layout.root, keep, &mut diagnostics).map_err(internal)?;
    }

    debug!(elapsed_ms = started.elapsed().as_millis() as u64, "run complete");
    Ok(RunOutcome {
        run_id,
        run_dir: layout.root.clone(),
        files: records.len(),
        delta: delta.summary,
        gate: gate.overall,
        gate_failed_count: gate.failed_count(),
        gate_evaluated_count: gate.evaluated_count(),
        diagnostics_count: diagnostics.len(),
    })
}

fn internal(err: anyhow::Error) -> RepolensError {
    match err.downcast::<std::io::Error>() {
        Ok(io) => RepolensError::Io(io),
        Err(other) => RepolensError::Internal(format!("{other:#}")),
    }
}

fn check_stage(
    stage: &str,
    started: Instant,
    timeout_secs: Option<u64>,
) -> Result<(), RepolensError> {
    if let Some(limit) = timeout_secs {
        let elapsed = started.elapsed().as_secs();
        if elapsed > limit {
            return Err(RepolensError::StageTimeout {
                stage: stage.to_string(),
                seconds: limit,
            });
        }
    }
    Ok(())
}

/// On cancellation, partially written artifacts are discarded with the run
/// directory; the cache has not been touched yet.
fn check_cancelled(cancel: &CancelFlag, layout: Option<&RunLayout>) -> Result<(), RepolensError> {
    if !cancel.is_cancelled() {
        return Ok(());
    }
    if let Some(layout) = layout {
        let _ = std::fs::remove_dir_all(layout.root.as_std_path());
    }
    Err(RepolensError::Cancelled)
}

fn write_json<T: Serialize>(path: &Utf8Path, value: &T) -> anyhow::Result<()> {
    let canonical = emit_jcs(value).with_context(|| format!("Failed to canonicalize: {path}"))?;
    write_bytes_atomic(path, canonical.as_bytes())
}

fn unique_run_dir(runs_root: &Utf8Path, run_id: &str) -> Utf8PathBuf {
    let base = runs_root.join(run_id);
    if !base.exists() {
        return base;
    }
    let mut suffix = 2u32;
    loop {
        let candidate = runs_root.join(format!("{run_id}-{suffix}"));
        if !candidate.exists() {
            return candidate;
        }
        suffix += 1;
    }
}

/// Latest sibling run directory holding a manifest, by manifest mtime then
/// name.
fn find_prior_run(runs_root: &Utf8Path, current: &Utf8Path) -> Option<Utf8PathBuf> {
    let mut best: Option<(std::time::SystemTime, Utf8PathBuf)> = None;
    for entry in runs_root.read_dir_utf8().ok()? {
        let Ok(entry) = entry else { continue };
        let path = entry.path().to_owned();
        if !path.is_dir() || path == current {
            continue;
        }
        let manifest = path.join("manifests/manifest.json");
        let Ok(metadata) = std::fs::metadata(manifest.as_std_path()) else {
            continue;
        };
        let modified = metadata.modified().unwrap_or(std::time::UNIX_EPOCH);
        let candidate = (modified, path);
        if best.as_ref().is_none_or(|b| candidate > *b) {
            best = Some(candidate);
        }
    }
    best.map(|(_, path)| path)
}

fn load_prior_graph(runs_root: &Utf8Path, current: &Utf8Path) -> Option<Graph> {
    let prior = find_prior_run(runs_root, current)?;
    let content =
        std::fs::read_to_string(prior.join("graphs/knowledge_graph.json").as_std_path()).ok()?;
    parse_json_ld(&content).ok()
}

fn load_prior_diagram_metadata(
    runs_root: &Utf8Path,
    current: &Utf8Path,
) -> Option<(Utf8PathBuf, DiagramMetadata)> {
    let prior = find_prior_run(runs_root, current)?;
    let content =
        std::fs::read_to_string(prior.join("diagrams/metadata.json").as_std_path()).ok()?;
    let metadata: DiagramMetadata = serde_json::from_str(&content).ok()?;
    Some((prior, metadata))
}

#[cfg(test)]
mod tests {
    use super::*;
    use repolens_config::Overrides;
    use std::fs;
    use tempfile::TempDir;

    fn scan_root(dir: &TempDir) -> Utf8PathBuf {
        let root = Utf8PathBuf::from_path_buf(dir.path().join("tree")).unwrap();
        fs::create_dir_all(root.as_std_path()).unwrap();
        root
    }

    fn resolve(root: &Utf8Path, overrides: &Overrides) -> Config {
        Config::resolve(root, None, overrides).unwrap()
    }

    #[test]
    fn empty_tree_run_produces_envelope_and_passes() {
        let dir = TempDir::new().unwrap();
        let root = scan_root(&dir);
        let config = resolve(&root, &Overrides::default());

        let outcome = execute(&config, &CancelFlag::new()).unwrap();
        assert_eq!(outcome.files, 0);
        assert_eq!(outcome.gate, GateVerdict::Pass);
        assert!(outcome.run_dir.join("manifests/manifest.json").is_file());
        assert!(outcome.run_dir.join("delta/delta.json").is_file());
        assert!(outcome.run_dir.join("bundles/all-0.txt").is_file());
        assert!(outcome
            .run_dir
            .join("graphs/knowledge_graph.json")
            .is_file());
        assert!(outcome.run_dir.join("summary/summary.md").is_file());
    }

    #[test]
    fn cancelled_flag_aborts_before_any_directory() {
        let dir = TempDir::new().unwrap();
        let root = scan_root(&dir);
        let config = resolve(&root, &Overrides::default());

        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = execute(&config, &cancel).unwrap_err();
        assert!(matches!(err, RepolensError::Cancelled));
        assert!(!config.runs_root.exists() || config.runs_root.read_dir_utf8().unwrap().next().is_none());
    }

    #[test]
    fn rerun_without_changes_is_unchanged_and_cache_hits() {
        let dir = TempDir::new().unwrap();
        let root = scan_root(&dir);
        fs::write(root.join("a.py").as_std_path(), "def f():\n    pass\n").unwrap();
        let config = resolve(&root, &Overrides::default());

        let first = execute(&config, &CancelFlag::new()).unwrap();
        assert_eq!(first.delta.added, 1);

        let second = execute(&config, &CancelFlag::new()).unwrap();
        assert_eq!(second.delta.unchanged, 1);
        assert_eq!(second.delta.added, 0);
        assert_eq!(first.run_id, second.run_id);

        // Graph bytes identical across the two runs
        let g1 = fs::read(first.run_dir.join("graphs/knowledge_graph.json").as_std_path()).unwrap();
        let g2 =
            fs::read(second.run_dir.join("graphs/knowledge_graph.json").as_std_path()).unwrap();
        assert_eq!(g1, g2);
    }

    #[test]
    fn gate_failure_reports_fail_but_completes_artifacts() {
        let dir = TempDir::new().unwrap();
        let root = scan_root(&dir);
        fs::write(root.join("a.py").as_std_path(), "x = 1\n").unwrap();
        let metrics_path = Utf8PathBuf::from_path_buf(dir.path().join("metrics.json")).unwrap();
        fs::write(
            metrics_path.as_std_path(),
            r#"{"tests":{"total":3,"passed":2,"failed":1,"skipped":0,"duration_ms":9}}"#,
        )
        .unwrap();

        let overrides = Overrides {
            max_failed_tests: Some(0),
            metrics_files: vec![metrics_path],
            ..Overrides::default()
        };
        let config = resolve(&root, &overrides);
        let outcome = execute(&config, &CancelFlag::new()).unwrap();
        assert!(outcome.gate_failed());
        assert!(outcome.run_dir.join("gates/gate.json").is_file());
        assert!(outcome.run_dir.join("summary/summary.md").is_file());
    }

    #[test]
    fn malformed_metrics_source_is_skipped_not_fatal() {
        let dir = TempDir::new().unwrap();
        let root = scan_root(&dir);
        let metrics_path = Utf8PathBuf::from_path_buf(dir.path().join("bad.json")).unwrap();
        fs::write(metrics_path.as_std_path(), "{not json").unwrap();

        let overrides = Overrides {
            metrics_files: vec![metrics_path],
            max_failed_tests: Some(0),
            ..Overrides::default()
        };
        let config = resolve(&root, &overrides);
        let outcome = execute(&config, &CancelFlag::new()).unwrap();
        // threshold not evaluated, so the gate passes
        assert_eq!(outcome.gate, GateVerdict::Pass);
        assert_eq!(outcome.gate_evaluated_count, 0);
        assert!(outcome.diagnostics_count >= 1);
    }

    #[test]
    fn retention_prunes_older_runs() {
        let dir = TempDir::new().unwrap();
        let root = scan_root(&dir);
        fs::write(root.join("a.py").as_std_path(), "x = 1\n").unwrap();

        let overrides = Overrides {
            retention: Some(1),
            ..Overrides::default()
        };
        let config = resolve(&root, &overrides);
        let first = execute(&config, &CancelFlag::new()).unwrap();
        let second = execute(&config, &CancelFlag::new()).unwrap();

        assert!(!first.run_dir.exists());
        assert!(second.run_dir.exists());
    }
}
