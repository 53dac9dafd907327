//! Run manifest: the reproducibility envelope.

use anyhow::{Context, Result};
use camino::Utf8Path;
use repolens_utils::atomic_write::write_bytes_atomic;
use repolens_utils::canonical::emit_jcs;
use serde::{Deserialize, Serialize};

pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    pub platform: String,
    pub arch: String,
}

impl Environment {
    #[must_use]
    pub fn current() -> Self {
        Self {
            platform: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }
}

/// File identity as recorded in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestFileRecord {
    pub path: String,
    pub digest: String,
    pub size_bytes: u64,
    pub mtime_ns: i128,
}

/// One registered artifact with its content digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub kind: String,
    pub relative_path: String,
    pub digest: String,
}

/// A stage that intentionally produced nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkipEntry {
    pub stage: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: u32,
    pub run_id: String,
    pub timestamp_utc: String,
    pub tool_version: String,
    pub config_version: String,
    pub seed: u64,
    pub resolved_config_digest: String,
    pub environment: Environment,
    /// Sorted by path.
    pub file_records: Vec<ManifestFileRecord>,
    /// Sorted by relative path.
    pub artifacts: Vec<ArtifactEntry>,
    pub skips: Vec<SkipEntry>,
}

/// Write the manifest as canonical JSON.
pub fn write_manifest(path: &Utf8Path, manifest: &Manifest) -> Result<()> {
    let canonical = emit_jcs(manifest).context("Failed to canonicalize manifest")?;
    write_bytes_atomic(path, canonical.as_bytes())
        .with_context(|| format!("Failed to write manifest: {path}"))
}

/// Load a prior run's manifest.
pub fn load_manifest(path: &Utf8Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path.as_std_path())
        .with_context(|| format!("Failed to read manifest: {path}"))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse manifest: {path}"))
}
