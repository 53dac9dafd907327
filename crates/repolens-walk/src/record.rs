//! Per-file walk records.

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// One discovered input file. Immutable once the extraction stage has
/// attached the synopsis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Forward-slash path relative to the scan root; the file's identity.
    pub canonical_path: String,
    /// Absolute on-disk location; never emitted into artifacts.
    #[serde(skip)]
    pub absolute_path: Utf8PathBuf,
    /// SHA-256 of the file content, 64 hex chars.
    pub digest: String,
    pub size_bytes: u64,
    pub mtime_ns: i128,
    pub line_count: u64,
    /// Extension-table classification, or `"unknown"`.
    pub language: String,
    /// True when the prior cache carries the same digest and size.
    pub cached: bool,
    /// First lines of the leading heading or docstring, when one exists.
    /// Filled from the extraction event blob after the extraction stage.
    pub synopsis: Option<String>,
}

impl FileRecord {
    /// Whether the canonical path sits under a directory or name commonly
    /// used for tests.
    #[must_use]
    pub fn looks_like_test(&self) -> bool {
        let path = self.canonical_path.as_str();
        let file_name = path.rsplit('/').next().unwrap_or(path);
        path.split('/').any(|seg| seg == "tests" || seg == "test")
            || file_name.starts_with("test_")
            || file_name.ends_with("_test.py")
            || file_name.ends_with(".test.js")
            || file_name.ends_with(".test.ts")
            || file_name.ends_with("_test.rs")
    }

    /// Whether this file is a dependency manifest the dependency parser
    /// understands.
    #[must_use]
    pub fn is_dependency_manifest(&self) -> bool {
        let file_name = self
            .canonical_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.canonical_path);
        file_name == "pyproject.toml"
            || file_name == "Cargo.toml"
            || file_name == "package.json"
            || (file_name.starts_with("requirements") && file_name.ends_with(".txt"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str) -> FileRecord {
        FileRecord {
            canonical_path: path.to_string(),
            absolute_path: Utf8PathBuf::from("/scan").join(path),
            digest: "0".repeat(64),
            size_bytes: 0,
            mtime_ns: 0,
            line_count: 0,
            language: "python".into(),
            cached: false,
            synopsis: None,
        }
    }

    #[test]
    fn test_detection_covers_directories_and_names() {
        assert!(record("tests/test_api.py").looks_like_test());
        assert!(record("pkg/test_util.py").looks_like_test());
        assert!(record("src/walker_test.rs").looks_like_test());
        assert!(record("web/app.test.ts").looks_like_test());
        assert!(!record("src/contest.py").looks_like_test());
    }

    #[test]
    fn manifest_detection() {
        assert!(record("requirements.txt").is_dependency_manifest());
        assert!(record("requirements-dev.txt").is_dependency_manifest());
        assert!(record("sub/pyproject.toml").is_dependency_manifest());
        assert!(!record("requirements.md").is_dependency_manifest());
    }
}
