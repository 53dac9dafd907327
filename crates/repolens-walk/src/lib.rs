//! Source walker: canonical, sorted, duplicate-free file discovery.

mod language;
mod record;
mod walker;

pub use language::classify_language;
pub use record::FileRecord;
pub use walker::{WalkOptions, WalkOutcome, walk};
