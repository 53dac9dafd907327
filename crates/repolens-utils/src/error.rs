//! Library-level error taxonomy.
//!
//! `RepolensError` is the error type returned at subsystem boundaries. Fatal
//! categories map onto CLI exit codes via [`RepolensError::to_exit_code`];
//! recoverable conditions (render fallbacks, per-file extraction failures,
//! malformed metrics sources) are not errors at this level; they are
//! reported through [`crate::diagnostics`] and the run continues.
//!
//! Library code never calls `std::process::exit`; only the binary maps an
//! error to a process exit.

use crate::exit_codes::ExitCode;
use camino::Utf8PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepolensError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Input error: {0}")]
    Input(#[from] InputError),

    #[error("Graph invariant violation: {0}")]
    Invariant(#[from] InvariantError),

    #[error("Quality gate failed: {failed} of {evaluated} evaluated threshold(s) violated")]
    GateFailed { failed: usize, evaluated: usize },

    #[error("Stage `{stage}` exceeded its timeout of {seconds}s")]
    StageTimeout { stage: String, seconds: u64 },

    #[error("Run cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RepolensError {
    /// Map this error to the documented CLI exit code.
    #[must_use]
    pub const fn to_exit_code(&self) -> ExitCode {
        match self {
            Self::Config(_) | Self::Input(_) | Self::Invariant(_) => ExitCode::CONFIG,
            Self::GateFailed { .. } => ExitCode::GATE_FAILURE,
            Self::StageTimeout { .. }
            | Self::Cancelled
            | Self::Io(_)
            | Self::Internal(_) => ExitCode::INTERNAL,
        }
    }
}

/// Invalid flags, unreadable or malformed config, unknown presets.
///
/// Always fatal before any run directory is created.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(Utf8PathBuf),

    #[error("failed to read config file {path}: {reason}")]
    Unreadable { path: Utf8PathBuf, reason: String },

    #[error("failed to parse config file {path}: {reason}")]
    Invalid { path: Utf8PathBuf, reason: String },

    #[error("unknown bundle preset `{0}`")]
    UnknownPreset(String),

    #[error("unknown diagram preset `{0}`")]
    UnknownDiagramPreset(String),

    #[error("unknown diagram format `{0}`")]
    UnknownDiagramFormat(String),

    #[error("unknown diagram theme `{0}`")]
    UnknownDiagramTheme(String),

    #[error("unknown graph scope `{0}`")]
    UnknownGraphScope(String),

    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("invalid glob pattern `{pattern}`: {reason}")]
    InvalidGlob { pattern: String, reason: String },

    #[error("network access is not supported; remove --allow-network")]
    NetworkNotSupported,
}

/// Scan root problems detected before the pipeline starts.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("scan root does not exist: {0}")]
    MissingRoot(Utf8PathBuf),

    #[error("scan root is not a directory: {0}")]
    NotADirectory(Utf8PathBuf),

    #[error("scan root is not valid UTF-8: {0}")]
    NonUtf8Root(String),
}

/// Schema-level graph violations detected by the validator.
///
/// Fatal: the run directory is preserved for inspection, the cache is left
/// untouched.
#[derive(Error, Debug)]
pub enum InvariantError {
    #[error("duplicate node id `{node_id}` ({first_label} vs {second_label})")]
    DuplicateNode {
        node_id: String,
        first_label: String,
        second_label: String,
    },

    #[error("node `{node_id}` has empty provenance")]
    MissingProvenance { node_id: String },

    #[error("edge `{edge_id}` references missing node `{node_id}`")]
    DanglingEdge { edge_id: String, node_id: String },

    #[error("containment cycle through nodes: {}", node_ids.join(" -> "))]
    ContainmentCycle { node_ids: Vec<String> },

    #[error("node `{node_id}` has {parent_count} containment parents")]
    MultipleParents { node_id: String, parent_count: usize },

    #[error("nodes unreachable from the run root: {}", node_ids.join(", "))]
    Orphans { node_ids: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_categories_map_to_documented_exit_codes() {
        let config: RepolensError = ConfigError::UnknownPreset("bogus".into()).into();
        assert_eq!(config.to_exit_code(), ExitCode::CONFIG);

        let input: RepolensError = InputError::MissingRoot("/nope".into()).into();
        assert_eq!(input.to_exit_code(), ExitCode::CONFIG);

        let invariant: RepolensError = InvariantError::MissingProvenance {
            node_id: "abcd".into(),
        }
        .into();
        assert_eq!(invariant.to_exit_code(), ExitCode::CONFIG);

        let gate = RepolensError::GateFailed {
            failed: 1,
            evaluated: 2,
        };
        assert_eq!(gate.to_exit_code(), ExitCode::GATE_FAILURE);

        let io: RepolensError = std::io::Error::other("disk full").into();
        assert_eq!(io.to_exit_code(), ExitCode::INTERNAL);
    }

    #[test]
    fn cycle_message_names_offending_ids() {
        let err = InvariantError::ContainmentCycle {
            node_ids: vec!["a1".into(), "b2".into(), "a1".into()],
        };
        assert_eq!(
            err.to_string(),
            "containment cycle through nodes: a1 -> b2 -> a1"
        );
    }
}
