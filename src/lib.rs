//! repolens: a deterministic, local-first code-analysis pipeline.
//!
//! A run scans a source tree and emits a reproducible artifact bundle:
//! manifest, delta report, context bundles, knowledge graph with inter-run
//! diff, diagram templates, normalized metrics with quality gates, explain
//! cards, and a Markdown summary. Given the same inputs, configuration, and
//! prior cache state, a run produces byte-identical outputs.

pub mod cli;

pub use repolens_config::{Config, Overrides};
pub use repolens_run::{execute, CancelFlag, RunOutcome};
pub use repolens_utils::{ExitCode, RepolensError};
