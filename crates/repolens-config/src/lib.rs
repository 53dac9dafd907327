//! Configuration for repolens.
//!
//! Precedence is CLI > config file > defaults. The resolved record is an
//! explicit closed set of fields; unknown keys in the config file are a
//! `ConfigError`. The resolved configuration is digested into the manifest
//! so two runs can prove they used the same settings.

mod discovery;
mod model;

pub use discovery::discover_config_file;
pub use model::{
    BundleOptions, BundlePreset, Config, DiagramFormat, DiagramOptions, DiagramPreset,
    GraphOptions, GraphScope, Overrides, ThemeId, Thresholds, DEFAULT_IGNORE_PATTERNS,
    DEFAULT_MAX_BUNDLE_BYTES, DEFAULT_MAX_BUNDLE_LINES, DEFAULT_SYNOPSIS_LINES,
};
