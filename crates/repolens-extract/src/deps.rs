//! Dependency-manifest normalization.
//!
//! Parses the allow-listed manifest formats into `DependencyEvent`s with
//! canonical package names. Unparseable content yields no events; the
//! manifest is still a walked file like any other.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::events::module_qualified_name;

/// Where a dependency applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyScope {
    Runtime,
    Dev,
    Optional,
}

impl std::fmt::Display for DependencyScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Runtime => "runtime",
            Self::Dev => "dev",
            Self::Optional => "optional",
        };
        f.write_str(s)
    }
}

/// One normalized dependency declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEvent {
    /// Canonical package name (lowercased, `[-_.]` runs collapsed to `-`).
    pub package: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_spec: Option<String>,
    pub scope: DependencyScope,
    /// Qualified name of the nearest containing directory's module; the
    /// manifest's own module when it sits at the scan root.
    pub owning_module: String,
    /// Canonical path of the manifest that declared this dependency.
    pub manifest_path: String,
}

static NAME_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-_.]+").unwrap());
static REQ_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z0-9][A-Za-z0-9._-]*)(?:\[[^\]]*\])?\s*(.*)$").unwrap());

/// Canonicalize a package name: lowercase, collapse runs of `-`, `_`, `.`
/// to a single `-`.
#[must_use]
pub fn normalize_package_name(name: &str) -> String {
    NAME_RUNS
        .replace_all(&name.to_lowercase(), "-")
        .into_owned()
}

/// Parse one dependency manifest into events.
///
/// Dispatch is by file name; unknown names yield nothing.
#[must_use]
pub fn parse_dependency_manifest(canonical_path: &str, content: &str) -> Vec<DependencyEvent> {
    let file_name = canonical_path
        .rsplit('/')
        .next()
        .unwrap_or(canonical_path);
    let owner = owning_module(canonical_path);

    let mut events = if file_name.starts_with("requirements") && file_name.ends_with(".txt") {
        let scope = if file_name.contains("dev") || file_name.contains("test") {
            DependencyScope::Dev
        } else {
            DependencyScope::Runtime
        };
        parse_requirements(content, scope, &owner)
    } else if file_name == "pyproject.toml" {
        parse_pyproject(content, &owner)
    } else if file_name == "Cargo.toml" {
        parse_cargo(content, &owner)
    } else if file_name == "package.json" {
        parse_package_json(content, &owner)
    } else {
        Vec::new()
    };

    for event in &mut events {
        event.manifest_path = canonical_path.to_string();
    }
    events.sort_by(|a, b| (&a.package, a.scope as u8).cmp(&(&b.package, b.scope as u8)));
    events.dedup();
    events
}

fn event(
    package: String,
    version_spec: Option<String>,
    scope: DependencyScope,
    owner: &str,
) -> DependencyEvent {
    DependencyEvent {
        package,
        version_spec,
        scope,
        owning_module: owner.to_string(),
        manifest_path: String::new(),
    }
}

fn owning_module(canonical_path: &str) -> String {
    match canonical_path.rsplit_once('/') {
        Some((dir, _)) => dir.replace('/', "."),
        None => module_qualified_name(canonical_path),
    }
}

fn parse_requirements(content: &str, scope: DependencyScope, owner: &str) -> Vec<DependencyEvent> {
    let mut out = Vec::new();
    for raw in content.lines() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() || line.starts_with('-') {
            continue;
        }
        if let Some((package, version_spec)) = split_requirement(line) {
            out.push(event(package, version_spec, scope, owner));
        }
    }
    out
}

/// Split a PEP 508-style requirement into name and optional spec, dropping
/// extras and environment markers.
fn split_requirement(line: &str) -> Option<(String, Option<String>)> {
    let before_marker = line.split(';').next().unwrap_or(line).trim();
    let captures = REQ_LINE.captures(before_marker)?;
    let package = normalize_package_name(&captures[1]);
    let rest = captures[2].trim();
    let version_spec = (!rest.is_empty()).then(|| rest.to_string());
    Some((package, version_spec))
}

fn parse_pyproject(content: &str, owner: &str) -> Vec<DependencyEvent> {
    let Ok(value) = toml::from_str::<toml::Value>(content) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    let project = value.get("project");

    if let Some(deps) = project
        .and_then(|p| p.get("dependencies"))
        .and_then(|d| d.as_array())
    {
        for entry in deps {
            if let Some((package, version_spec)) = entry.as_str().and_then(split_requirement) {
                out.push(event(package, version_spec, DependencyScope::Runtime, owner));
            }
        }
    }

    if let Some(groups) = project
        .and_then(|p| p.get("optional-dependencies"))
        .and_then(|d| d.as_table())
    {
        for (group, deps) in groups {
            let scope = if group.contains("dev") || group.contains("test") {
                DependencyScope::Dev
            } else {
                DependencyScope::Optional
            };
            if let Some(deps) = deps.as_array() {
                for entry in deps {
                    if let Some((package, version_spec)) =
                        entry.as_str().and_then(split_requirement)
                    {
                        out.push(event(package, version_spec, scope, owner));
                    }
                }
            }
        }
    }

    out
}

fn parse_cargo(content: &str, owner: &str) -> Vec<DependencyEvent> {
    let Ok(value) = toml::from_str::<toml::Value>(content) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for (table, scope) in [
        ("dependencies", DependencyScope::Runtime),
        ("dev-dependencies", DependencyScope::Dev),
        ("build-dependencies", DependencyScope::Optional),
    ] {
        if let Some(deps) = value.get(table).and_then(|d| d.as_table()) {
            for (name, spec) in deps {
                let version_spec = match spec {
                    toml::Value::String(version) => Some(version.clone()),
                    toml::Value::Table(table) => table
                        .get("version")
                        .and_then(|v| v.as_str())
                        .map(str::to_string),
                    _ => None,
                };
                out.push(event(normalize_package_name(name), version_spec, scope, owner));
            }
        }
    }
    out
}

fn parse_package_json(content: &str, owner: &str) -> Vec<DependencyEvent> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(content) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    for (key, scope) in [
        ("dependencies", DependencyScope::Runtime),
        ("devDependencies", DependencyScope::Dev),
        ("optionalDependencies", DependencyScope::Optional),
    ] {
        if let Some(deps) = value.get(key).and_then(|d| d.as_object()) {
            for (name, version) in deps {
                out.push(event(
                    normalize_package_name(name),
                    version.as_str().map(str::to_string),
                    scope,
                    owner,
                ));
            }
        }
    }
    out
}
