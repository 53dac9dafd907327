//! Context bundle builder.
//!
//! A bundle is the ordered concatenation of selected file records, each
//! introduced by a key-sorted header block, split into sequences when a byte
//! or line budget would be exceeded. Each sequence carries a JSON sidecar
//! index. Output bytes are a pure function of the selected records.

mod budget;
mod builder;
mod license;
mod model;

pub use budget::BudgetUsage;
pub use builder::{build_bundles, BundleRequest};
pub use license::detect_license_hint;
pub use model::{Bundle, BundleIndex, IndexEntry, BUNDLE_INDEX_SCHEMA_VERSION};
