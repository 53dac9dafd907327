//! Run orchestration.
//!
//! The orchestrator owns the `runs/<run_id>/` tree from creation to
//! manifest finalization, drives the pipeline stages in dependency order,
//! and touches the cache exactly once, after everything else has landed.

mod ids;
mod layout;
mod manifest;
mod pipeline;
mod retention;
mod summary;

pub use ids::{derive_run_id, derive_timestamp};
pub use layout::RunLayout;
pub use manifest::{
    ArtifactEntry, Environment, Manifest, ManifestFileRecord, SkipEntry, MANIFEST_SCHEMA_VERSION,
};
pub use pipeline::{execute, CancelFlag, RunOutcome};
pub use retention::prune_runs;
