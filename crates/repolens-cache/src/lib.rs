//! Content-addressed cache and delta engine.
//!
//! One JSON cache file per scan root maps canonical paths to their last seen
//! digest, plus a digest-keyed blob store for extraction events. The cache
//! is read-only for the duration of a run; the update is staged and swapped
//! atomically only when the run finalizes.

mod delta;
mod service;

pub use delta::{classify_delta, DeltaReport, DeltaState, DeltaSummary};
pub use service::{CacheEntry, CacheService, CacheSnapshot, CacheStats, CACHE_SCHEMA_VERSION};
