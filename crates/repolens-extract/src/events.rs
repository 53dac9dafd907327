//! The closed event vocabulary produced per file.

use serde::{Deserialize, Serialize};

pub const EVENT_BLOB_SCHEMA_VERSION: u32 = 1;

/// One structural fact observed in a file.
///
/// The set is closed: downstream consumers match exhaustively and new
/// variants are a breaking change to the cache blob schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EntityEvent {
    ModuleDeclared { name: String },
    FunctionDeclared { name: String, line: u64 },
    ClassDeclared { name: String, line: u64 },
    TestDeclared { name: String, line: u64 },
    ImportObserved { target: String },
    FixtureDeclared { name: String, line: u64 },
}

/// The memoized unit: everything extraction derives from one file's bytes.
///
/// Synopsis lives here so a cache hit reuses it without re-reading content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBlob {
    pub schema_version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synopsis: Option<String>,
    pub events: Vec<EntityEvent>,
    /// True when parsing degraded to the module declaration only.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub degraded: bool,
}

/// Qualified module name for a canonical path.
///
/// `src/pkg/mod.py` becomes `src.pkg.mod`; a Python package marker
/// (`__init__.py`) names its directory; `src/lib.rs` becomes `src.lib`.
#[must_use]
pub fn module_qualified_name(canonical_path: &str) -> String {
    let without_ext = canonical_path
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(canonical_path);
    let mut segments: Vec<&str> = without_ext.split('/').collect();
    if segments.last() == Some(&"__init__") {
        segments.pop();
    }
    if segments.is_empty() {
        return "root".to_string();
    }
    segments.join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_names_are_dotted_paths() {
        assert_eq!(module_qualified_name("src/pkg/mod.py"), "src.pkg.mod");
        assert_eq!(module_qualified_name("app.py"), "app");
        assert_eq!(module_qualified_name("src/pkg/__init__.py"), "src.pkg");
    }

    #[test]
    fn blob_serialization_is_round_trippable() {
        let blob = EventBlob {
            schema_version: EVENT_BLOB_SCHEMA_VERSION,
            synopsis: Some("Top heading".into()),
            events: vec![
                EntityEvent::ModuleDeclared { name: "app".into() },
                EntityEvent::FunctionDeclared {
                    name: "main".into(),
                    line: 3,
                },
            ],
            degraded: false,
        };
        let json = serde_json::to_string(&blob).unwrap();
        let back: EventBlob = serde_json::from_str(&json).unwrap();
        assert_eq!(back, blob);
    }
}
