//! Run directory layout. The shape is a compatibility contract.

use camino::{Utf8Path, Utf8PathBuf};
use std::io;

/// Subdirectories created for every run.
const SUBDIRS: &[&str] = &[
    "manifests", "bundles", "graphs", "diagrams", "metrics", "delta", "gates", "cards", "assets",
    "logs", "badges", "summary",
];

/// Paths inside one run directory.
#[derive(Debug, Clone)]
pub struct RunLayout {
    pub root: Utf8PathBuf,
}

impl RunLayout {
    #[must_use]
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn create_all(&self) -> io::Result<()> {
        for sub in SUBDIRS {
            std::fs::create_dir_all(self.root.join(sub).as_std_path())?;
        }
        Ok(())
    }

    #[must_use]
    pub fn manifest_path(&self) -> Utf8PathBuf {
        self.root.join("manifests/manifest.json")
    }

    #[must_use]
    pub fn delta_path(&self) -> Utf8PathBuf {
        self.root.join("delta/delta.json")
    }

    #[must_use]
    pub fn bundles_dir(&self) -> Utf8PathBuf {
        self.root.join("bundles")
    }

    #[must_use]
    pub fn graph_json_path(&self) -> Utf8PathBuf {
        self.root.join("graphs/knowledge_graph.json")
    }

    #[must_use]
    pub fn graph_graphml_path(&self) -> Utf8PathBuf {
        self.root.join("graphs/knowledge_graph.graphml")
    }

    #[must_use]
    pub fn graph_diff_json_path(&self) -> Utf8PathBuf {
        self.root.join("graphs/diff.json")
    }

    #[must_use]
    pub fn graph_diff_md_path(&self) -> Utf8PathBuf {
        self.root.join("graphs/diff.md")
    }

    #[must_use]
    pub fn diagrams_dir(&self) -> Utf8PathBuf {
        self.root.join("diagrams")
    }

    #[must_use]
    pub fn diagram_metadata_path(&self) -> Utf8PathBuf {
        self.root.join("diagrams/metadata.json")
    }

    #[must_use]
    pub fn metrics_path(&self) -> Utf8PathBuf {
        self.root.join("metrics/metrics.json")
    }

    #[must_use]
    pub fn gate_path(&self) -> Utf8PathBuf {
        self.root.join("gates/gate.json")
    }

    #[must_use]
    pub fn cards_dir(&self) -> Utf8PathBuf {
        self.root.join("cards")
    }

    #[must_use]
    pub fn run_log_path(&self) -> Utf8PathBuf {
        self.root.join("logs/run.log")
    }

    #[must_use]
    pub fn summary_path(&self) -> Utf8PathBuf {
        self.root.join("summary/summary.md")
    }

    /// Path of an artifact relative to the run root, for manifest entries.
    #[must_use]
    pub fn relative_to_root(&self, path: &Utf8Path) -> String {
        path.strip_prefix(&self.root)
            .map(|p| p.as_str().replace('\\', "/"))
            .unwrap_or_else(|_| path.as_str().to_string())
    }
}
