//! Command-line interface.
//!
//! Parsing and precedence only; the pipeline lives in `repolens-run`.
//! Library code never calls `process::exit`: `run` returns the exit code
//! and `main` applies it.

use camino::Utf8PathBuf;
use clap::Parser;
use repolens_config::{Config, Overrides};
use repolens_run::{execute, CancelFlag};
use repolens_utils::logging::init_tracing;
use repolens_utils::{ExitCode, RepolensError};
use tracing::info;

/// repolens - deterministic local-first code analysis
#[derive(Parser, Debug)]
#[command(name = "repolens")]
#[command(about = "Scan a source tree into a reproducible run artifact bundle")]
#[command(long_about = r#"
repolens walks a source tree and emits a timestamped, reproducible run
directory: manifest, delta report against the prior run, context bundles for
LLM ingestion, a knowledge graph (JSON-LD + GraphML) with inter-run diff,
diagram templates, normalized metrics with quality gates, explain cards, and
a Markdown summary.

EXAMPLES:
  # Analyze a tree with defaults
  repolens --input .

  # Only Python sources, tests bundle included, strict gates
  repolens --input . --include '**/*.py' --preset all --preset tests \
      --metrics junit.json --max-failed-tests 0

  # Full rebuild ignoring the cache, no diagrams
  repolens --input . --force-rebuild --no-diagrams

EXIT CODES:
  0  run completed, all evaluated gates passed
  1  fatal internal error
  2  run completed but a quality gate failed
  3  configuration, input, or graph invariant failure

Runs never open network sockets; external diagram renderers are used only
when the binary is already present locally.
"#)]
#[command(version)]
pub struct Cli {
    /// Scan root to analyze
    #[arg(long)]
    pub input: Utf8PathBuf,

    /// Path to configuration file (overrides discovery)
    #[arg(long)]
    pub config: Option<Utf8PathBuf>,

    /// Bundle presets to build (all, api, tests, dependencies)
    #[arg(long = "preset")]
    pub presets: Vec<String>,

    /// Include glob over canonical paths (repeatable)
    #[arg(long = "include")]
    pub include: Vec<String>,

    /// Ignore glob over canonical paths; ignores win over includes
    #[arg(long = "ignore")]
    pub ignore: Vec<String>,

    /// Reparse every file even when the cache digest matches
    #[arg(long)]
    pub force_rebuild: bool,

    /// Disable cache reuse entirely
    #[arg(long)]
    pub no_incremental: bool,

    /// Normalized metrics JSON supplied by an external parser (repeatable)
    #[arg(long = "metrics")]
    pub metrics: Vec<Utf8PathBuf>,

    /// Minimum line coverage percentage
    #[arg(long)]
    pub min_coverage: Option<f64>,

    /// Maximum failed tests
    #[arg(long)]
    pub max_failed_tests: Option<u64>,

    /// Maximum lint findings at warning level or above
    #[arg(long)]
    pub max_lint_warnings: Option<u64>,

    /// Maximum critical vulnerabilities
    #[arg(long)]
    pub max_critical_vulns: Option<u64>,

    /// Skip the knowledge graph (and everything derived from it)
    #[arg(long)]
    pub no_graph: bool,

    /// Graph scope: full, code, dependencies, tests
    #[arg(long)]
    pub graph_scope: Option<String>,

    /// Diff the graph against the prior run (default on)
    #[arg(long, overrides_with = "no_graph_diff")]
    pub graph_diff: bool,

    /// Skip the graph diff
    #[arg(long)]
    pub no_graph_diff: bool,

    /// Exclude test nodes from the graph regardless of scope
    #[arg(long)]
    pub graph_no_tests: bool,

    /// Skip diagram generation
    #[arg(long)]
    pub no_diagrams: bool,

    /// Diagram presets (architecture, dependencies, tests; repeatable)
    #[arg(long = "diagram-preset")]
    pub diagram_presets: Vec<String>,

    /// Diagram formats (mermaid, plantuml, graphviz; repeatable)
    #[arg(long = "diagram-format")]
    pub diagram_formats: Vec<String>,

    /// Diagram theme (light, dark, auto)
    #[arg(long)]
    pub diagram_theme: Option<String>,

    /// Diagram render worker count
    #[arg(long)]
    pub diagram_concurrency: Option<usize>,

    /// Cache directory override
    #[arg(long)]
    pub cache_dir: Option<Utf8PathBuf>,

    /// Keep at most this many run directories after finalization
    #[arg(long)]
    pub retention: Option<usize>,

    /// Per-stage wall-clock timeout in seconds
    #[arg(long)]
    pub stage_timeout: Option<u64>,

    /// Allow network access (not supported; present for forward
    /// compatibility and always rejected)
    #[arg(long)]
    pub allow_network: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    fn into_overrides(self) -> (Utf8PathBuf, Option<Utf8PathBuf>, Overrides) {
        let overrides = Overrides {
            include: self.include,
            ignore: self.ignore,
            presets: self.presets,
            force_rebuild: self.force_rebuild,
            no_incremental: self.no_incremental,
            allow_network: self.allow_network,
            min_coverage: self.min_coverage,
            max_failed_tests: self.max_failed_tests,
            max_lint_warnings: self.max_lint_warnings,
            max_critical_vulns: self.max_critical_vulns,
            no_graph: self.no_graph,
            graph_scope: self.graph_scope,
            graph_diff: if self.no_graph_diff {
                Some(false)
            } else if self.graph_diff {
                Some(true)
            } else {
                None
            },
            graph_no_tests: self.graph_no_tests,
            no_diagrams: self.no_diagrams,
            diagram_presets: self.diagram_presets,
            diagram_formats: self.diagram_formats,
            diagram_theme: self.diagram_theme,
            diagram_concurrency: self.diagram_concurrency,
            metrics_files: self.metrics,
            cache_dir: self.cache_dir,
            retention: self.retention,
            stage_timeout_secs: self.stage_timeout,
            verbose: self.verbose,
        };
        (self.input, self.config, overrides)
    }
}

/// CLI entry point: parse, resolve, execute, report.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let (input, config_file, overrides) = cli.into_overrides();
    let config = match Config::resolve(&input, config_file.as_deref(), &overrides) {
        Ok(config) => config,
        Err(err) => return Err(report(err)),
    };

    let cancel = CancelFlag::new();
    match execute(&config, &cancel) {
        Ok(outcome) => {
            info!(
                run = %outcome.run_id,
                files = outcome.files,
                added = outcome.delta.added,
                changed = outcome.delta.changed,
                removed = outcome.delta.removed,
                unchanged = outcome.delta.unchanged,
                gate = %outcome.gate,
                "run finished"
            );
            println!("{}", outcome.run_dir);
            if outcome.gate_failed() {
                eprintln!(
                    "quality gate failed: {} of {} evaluated threshold(s) violated (see gates/gate.json)",
                    outcome.gate_failed_count, outcome.gate_evaluated_count
                );
                return Err(ExitCode::GATE_FAILURE);
            }
            Ok(())
        }
        Err(err) => Err(report(err)),
    }
}

fn report(err: RepolensError) -> ExitCode {
    eprintln!("error: {err}");
    err.to_exit_code()
}
