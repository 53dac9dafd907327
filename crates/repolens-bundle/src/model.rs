//! Bundle output model.

use repolens_config::BundlePreset;
use serde::{Deserialize, Serialize};

pub const BUNDLE_INDEX_SCHEMA_VERSION: u32 = 1;

/// One bundle sequence: rendered text plus its sidecar index.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub preset: BundlePreset,
    pub sequence: u32,
    /// Full text, UTF-8, LF line endings.
    pub content: String,
    pub index: BundleIndex,
}

impl Bundle {
    /// File stem used for both the bundle and its index sidecar.
    #[must_use]
    pub fn file_stem(&self) -> String {
        format!("{}-{}", self.preset, self.sequence)
    }
}

/// Sidecar index for one bundle sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleIndex {
    pub schema_version: u32,
    pub preset: BundlePreset,
    pub sequence: u32,
    /// True when this sequence holds a single unit larger than the budget.
    pub oversize: bool,
    pub units: Vec<IndexEntry>,
}

/// Location of one unit inside its bundle sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub unit_path: String,
    pub byte_offset: usize,
    pub line_offset: usize,
    pub length_bytes: usize,
    pub length_lines: usize,
}
