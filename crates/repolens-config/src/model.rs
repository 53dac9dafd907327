//! Resolved configuration record and the closed option sets.

use camino::{Utf8Path, Utf8PathBuf};
use repolens_utils::canonical::emit_jcs;
use repolens_utils::digest::digest_str;
use repolens_utils::error::{ConfigError, InputError, RepolensError};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Bundle selection presets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BundlePreset {
    All,
    Api,
    Tests,
    Dependencies,
}

impl BundlePreset {
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        name.parse()
            .map_err(|_| ConfigError::UnknownPreset(name.to_string()))
    }
}

/// Graph projection scope.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum GraphScope {
    #[default]
    Full,
    Code,
    Dependencies,
    Tests,
}

impl GraphScope {
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        name.parse()
            .map_err(|_| ConfigError::UnknownGraphScope(name.to_string()))
    }
}

/// Diagram presets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DiagramPreset {
    Architecture,
    Dependencies,
    Tests,
}

impl DiagramPreset {
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        name.parse()
            .map_err(|_| ConfigError::UnknownDiagramPreset(name.to_string()))
    }
}

/// Diagram template formats.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DiagramFormat {
    Mermaid,
    Plantuml,
    Graphviz,
}

impl DiagramFormat {
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        name.parse()
            .map_err(|_| ConfigError::UnknownDiagramFormat(name.to_string()))
    }
}

/// Diagram theme identifiers. The palette behind each id lives with the
/// diagram generator.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ThemeId {
    #[default]
    Light,
    Dark,
    Auto,
}

impl ThemeId {
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        name.parse()
            .map_err(|_| ConfigError::UnknownDiagramTheme(name.to_string()))
    }
}

/// Quality-gate thresholds. Absent thresholds are not evaluated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Thresholds {
    #[serde(default)]
    pub min_coverage: Option<f64>,
    #[serde(default)]
    pub max_failed_tests: Option<u64>,
    #[serde(default)]
    pub max_lint_warnings: Option<u64>,
    #[serde(default)]
    pub max_critical_vulnerabilities: Option<u64>,
}

/// Bundle budgets and synopsis length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleOptions {
    pub presets: Vec<BundlePreset>,
    pub max_bundle_bytes: usize,
    pub max_bundle_lines: usize,
    pub synopsis_lines: usize,
}

pub const DEFAULT_MAX_BUNDLE_BYTES: usize = 262_144;
pub const DEFAULT_MAX_BUNDLE_LINES: usize = 6_000;
pub const DEFAULT_SYNOPSIS_LINES: usize = 5;

impl Default for BundleOptions {
    fn default() -> Self {
        Self {
            presets: vec![BundlePreset::All],
            max_bundle_bytes: DEFAULT_MAX_BUNDLE_BYTES,
            max_bundle_lines: DEFAULT_MAX_BUNDLE_LINES,
            synopsis_lines: DEFAULT_SYNOPSIS_LINES,
        }
    }
}

/// Knowledge-graph options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphOptions {
    pub enabled: bool,
    pub scope: GraphScope,
    pub diff: bool,
    /// Excluding tests dominates every scope, including `tests`.
    pub include_tests: bool,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            scope: GraphScope::Full,
            diff: true,
            include_tests: true,
        }
    }
}

/// Diagram options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramOptions {
    pub enabled: bool,
    pub presets: Vec<DiagramPreset>,
    pub formats: Vec<DiagramFormat>,
    pub theme: ThemeId,
    /// Worker count; `None` resolves to `min(4, cores)` at run time.
    pub concurrency: Option<usize>,
}

impl Default for DiagramOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            presets: vec![
                DiagramPreset::Architecture,
                DiagramPreset::Dependencies,
                DiagramPreset::Tests,
            ],
            formats: vec![DiagramFormat::Mermaid],
            theme: ThemeId::Light,
            concurrency: None,
        }
    }
}

/// Ignore patterns applied in addition to user patterns. The runs and cache
/// trees live under the scan root by default and must never be scanned.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git/**",
    ".repolens/**",
    "runs/**",
    "**/__pycache__/**",
    "**/node_modules/**",
    "**/target/**",
];

/// The fully resolved configuration for one run.
///
/// Construction goes through [`Config::resolve`] which applies precedence
/// (CLI > file > defaults) and validates the result.
///
/// Serialization feeds [`Config::resolved_digest`]; machine-specific
/// absolute paths are skipped so the digest (and everything derived from
/// it, the run id included) is a function of the semantic settings alone.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    #[serde(skip_serializing)]
    pub input_root: Utf8PathBuf,
    #[serde(skip_serializing)]
    pub cache_dir: Utf8PathBuf,
    #[serde(skip_serializing)]
    pub runs_root: Utf8PathBuf,
    pub include: Vec<String>,
    pub ignore: Vec<String>,
    pub incremental: bool,
    pub force_rebuild: bool,
    pub allow_network: bool,
    pub bundle: BundleOptions,
    pub graph: GraphOptions,
    pub diagrams: DiagramOptions,
    pub thresholds: Thresholds,
    #[serde(skip_serializing)]
    pub metrics_files: Vec<Utf8PathBuf>,
    pub retention: Option<usize>,
    pub stage_timeout_secs: Option<u64>,
    pub seed: u64,
    pub config_version: String,
    #[serde(skip_serializing)]
    pub verbose: bool,
}

/// Current version of the configuration contract.
pub const CONFIG_VERSION: &str = "1";

/// Optional CLI-supplied overrides, applied on top of file values.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub include: Vec<String>,
    pub ignore: Vec<String>,
    pub presets: Vec<String>,
    pub force_rebuild: bool,
    pub no_incremental: bool,
    pub allow_network: bool,
    pub min_coverage: Option<f64>,
    pub max_failed_tests: Option<u64>,
    pub max_lint_warnings: Option<u64>,
    pub max_critical_vulns: Option<u64>,
    pub no_graph: bool,
    pub graph_scope: Option<String>,
    pub graph_diff: Option<bool>,
    pub graph_no_tests: bool,
    pub no_diagrams: bool,
    pub diagram_presets: Vec<String>,
    pub diagram_formats: Vec<String>,
    pub diagram_theme: Option<String>,
    pub diagram_concurrency: Option<usize>,
    pub metrics_files: Vec<Utf8PathBuf>,
    pub cache_dir: Option<Utf8PathBuf>,
    pub retention: Option<usize>,
    pub stage_timeout_secs: Option<u64>,
    pub verbose: bool,
}

/// On-disk configuration file shape. Every section is optional; unknown
/// keys anywhere are rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    scan: ScanSection,
    #[serde(default)]
    bundle: BundleSection,
    #[serde(default)]
    graph: GraphSection,
    #[serde(default)]
    diagrams: DiagramSection,
    #[serde(default)]
    thresholds: Thresholds,
    #[serde(default)]
    run: RunSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScanSection {
    #[serde(default)]
    include: Option<Vec<String>>,
    #[serde(default)]
    ignore: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BundleSection {
    #[serde(default)]
    presets: Option<Vec<BundlePreset>>,
    #[serde(default)]
    max_bytes: Option<usize>,
    #[serde(default)]
    max_lines: Option<usize>,
    #[serde(default)]
    synopsis_lines: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct GraphSection {
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default)]
    scope: Option<GraphScope>,
    #[serde(default)]
    diff: Option<bool>,
    #[serde(default)]
    include_tests: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DiagramSection {
    #[serde(default)]
    enabled: Option<bool>,
    #[serde(default)]
    presets: Option<Vec<DiagramPreset>>,
    #[serde(default)]
    formats: Option<Vec<DiagramFormat>>,
    #[serde(default)]
    theme: Option<ThemeId>,
    #[serde(default)]
    concurrency: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RunSection {
    #[serde(default)]
    cache_dir: Option<Utf8PathBuf>,
    #[serde(default)]
    runs_root: Option<Utf8PathBuf>,
    #[serde(default)]
    retention: Option<usize>,
    #[serde(default)]
    stage_timeout_secs: Option<u64>,
    #[serde(default)]
    seed: Option<u64>,
}

impl Config {
    /// Resolve a configuration from the input root, an optional config file,
    /// and CLI overrides, then validate it.
    pub fn resolve(
        input_root: &Utf8Path,
        config_file: Option<&Utf8Path>,
        overrides: &Overrides,
    ) -> Result<Self, RepolensError> {
        let input_root = validate_input_root(input_root)?;

        let file = match config_file {
            Some(path) => Some(load_config_file(path)?),
            None => match crate::discovery::discover_config_file(&input_root) {
                Some(path) => Some(load_config_file(&path)?),
                None => None,
            },
        };
        let file = file.unwrap_or_default();

        let mut presets = Vec::new();
        for name in &overrides.presets {
            presets.push(BundlePreset::parse(name)?);
        }
        if presets.is_empty() {
            presets = file
                .bundle
                .presets
                .clone()
                .unwrap_or_else(|| BundleOptions::default().presets);
        }
        presets.sort();
        presets.dedup();

        let mut diagram_presets = Vec::new();
        for name in &overrides.diagram_presets {
            diagram_presets.push(DiagramPreset::parse(name)?);
        }
        if diagram_presets.is_empty() {
            diagram_presets = file
                .diagrams
                .presets
                .clone()
                .unwrap_or_else(|| DiagramOptions::default().presets);
        }
        diagram_presets.sort();
        diagram_presets.dedup();

        let mut diagram_formats = Vec::new();
        for name in &overrides.diagram_formats {
            diagram_formats.push(DiagramFormat::parse(name)?);
        }
        if diagram_formats.is_empty() {
            diagram_formats = file
                .diagrams
                .formats
                .clone()
                .unwrap_or_else(|| DiagramOptions::default().formats);
        }
        diagram_formats.sort();
        diagram_formats.dedup();

        let theme = match &overrides.diagram_theme {
            Some(name) => ThemeId::parse(name)?,
            None => file.diagrams.theme.unwrap_or_default(),
        };

        let graph_scope = match &overrides.graph_scope {
            Some(name) => GraphScope::parse(name)?,
            None => file.graph.scope.unwrap_or_default(),
        };

        let mut include = overrides.include.clone();
        if include.is_empty() {
            include = file.scan.include.clone().unwrap_or_default();
        }
        let mut ignore = file.scan.ignore.clone().unwrap_or_default();
        ignore.extend(overrides.ignore.iter().cloned());

        let defaults = BundleOptions::default();
        let config = Self {
            cache_dir: overrides
                .cache_dir
                .clone()
                .or(file.run.cache_dir.clone())
                .unwrap_or_else(|| input_root.join(".repolens").join("cache")),
            runs_root: file
                .run
                .runs_root
                .clone()
                .unwrap_or_else(|| input_root.join("runs")),
            include,
            ignore,
            incremental: !overrides.no_incremental,
            force_rebuild: overrides.force_rebuild,
            allow_network: overrides.allow_network,
            bundle: BundleOptions {
                presets,
                max_bundle_bytes: file.bundle.max_bytes.unwrap_or(defaults.max_bundle_bytes),
                max_bundle_lines: file.bundle.max_lines.unwrap_or(defaults.max_bundle_lines),
                synopsis_lines: file
                    .bundle
                    .synopsis_lines
                    .unwrap_or(defaults.synopsis_lines),
            },
            graph: GraphOptions {
                enabled: !overrides.no_graph && file.graph.enabled.unwrap_or(true),
                scope: graph_scope,
                diff: overrides
                    .graph_diff
                    .or(file.graph.diff)
                    .unwrap_or(true),
                include_tests: !overrides.graph_no_tests
                    && file.graph.include_tests.unwrap_or(true),
            },
            diagrams: DiagramOptions {
                enabled: !overrides.no_diagrams && file.diagrams.enabled.unwrap_or(true),
                presets: diagram_presets,
                formats: diagram_formats,
                theme,
                concurrency: overrides.diagram_concurrency.or(file.diagrams.concurrency),
            },
            thresholds: Thresholds {
                min_coverage: overrides.min_coverage.or(file.thresholds.min_coverage),
                max_failed_tests: overrides
                    .max_failed_tests
                    .or(file.thresholds.max_failed_tests),
                max_lint_warnings: overrides
                    .max_lint_warnings
                    .or(file.thresholds.max_lint_warnings),
                max_critical_vulnerabilities: overrides
                    .max_critical_vulns
                    .or(file.thresholds.max_critical_vulnerabilities),
            },
            metrics_files: overrides.metrics_files.clone(),
            retention: overrides.retention.or(file.run.retention),
            stage_timeout_secs: overrides.stage_timeout_secs.or(file.run.stage_timeout_secs),
            seed: file.run.seed.unwrap_or(0),
            config_version: CONFIG_VERSION.to_string(),
            verbose: overrides.verbose,
            input_root,
        };

        config.validate()?;
        Ok(config)
    }

    /// Digest of the resolved configuration, recorded in the manifest.
    pub fn resolved_digest(&self) -> Result<String, RepolensError> {
        let canonical = emit_jcs(self)
            .map_err(|e| RepolensError::Internal(format!("config digest: {e}")))?;
        Ok(digest_str(&canonical))
    }

    /// Diagram worker count after applying the default bound.
    #[must_use]
    pub fn diagram_workers(&self) -> usize {
        self.diagrams.concurrency.unwrap_or_else(|| {
            let cores = std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(1);
            cores.min(4)
        })
    }

    fn validate(&self) -> Result<(), RepolensError> {
        if self.allow_network {
            return Err(ConfigError::NetworkNotSupported.into());
        }
        if self.bundle.max_bundle_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "bundle.max_bytes".into(),
                reason: "must be greater than zero".into(),
            }
            .into());
        }
        if self.bundle.max_bundle_lines == 0 {
            return Err(ConfigError::InvalidValue {
                field: "bundle.max_lines".into(),
                reason: "must be greater than zero".into(),
            }
            .into());
        }
        if let Some(coverage) = self.thresholds.min_coverage {
            if !(0.0..=100.0).contains(&coverage) {
                return Err(ConfigError::InvalidValue {
                    field: "thresholds.min_coverage".into(),
                    reason: format!("{coverage} is outside 0..=100"),
                }
                .into());
            }
        }
        if self.diagrams.concurrency == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "diagrams.concurrency".into(),
                reason: "must be at least 1".into(),
            }
            .into());
        }
        if self.stage_timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "run.stage_timeout_secs".into(),
                reason: "must be at least 1".into(),
            }
            .into());
        }
        for pattern in self.include.iter().chain(self.ignore.iter()) {
            globset::Glob::new(pattern).map_err(|e| ConfigError::InvalidGlob {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }
}

fn validate_input_root(input_root: &Utf8Path) -> Result<Utf8PathBuf, RepolensError> {
    let metadata = std::fs::metadata(input_root)
        .map_err(|_| InputError::MissingRoot(input_root.to_owned()))?;
    if !metadata.is_dir() {
        return Err(InputError::NotADirectory(input_root.to_owned()).into());
    }
    let absolute = if input_root.is_absolute() {
        input_root.to_owned()
    } else {
        let cwd = std::env::current_dir().map_err(RepolensError::Io)?;
        let joined = cwd.join(input_root.as_std_path());
        Utf8PathBuf::from_path_buf(joined)
            .map_err(|p| InputError::NonUtf8Root(p.display().to_string()))?
    };
    Ok(absolute)
}

fn load_config_file(path: &Utf8Path) -> Result<ConfigFile, RepolensError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_owned()).into());
    }
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
        path: path.to_owned(),
        reason: e.to_string(),
    })?;
    let file: ConfigFile = toml::from_str(&content).map_err(|e| ConfigError::Invalid {
        path: path.to_owned(),
        reason: e.to_string(),
    })?;
    Ok(file)
}
