//! Entity extraction and dependency parsing.
//!
//! Extraction is a pure function of file bytes, memoized by content digest
//! through the cache blob store. A second extraction of the same digest
//! returns the stored event blob without reparsing.

mod deps;
mod events;
mod extractor;
mod heuristics;

pub use deps::{normalize_package_name, parse_dependency_manifest, DependencyEvent, DependencyScope};
pub use events::{module_qualified_name, EntityEvent, EventBlob, EVENT_BLOB_SCHEMA_VERSION};
pub use extractor::{ExtractionOutcome, Extractor, ExtractorStats};
