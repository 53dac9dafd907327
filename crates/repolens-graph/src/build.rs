//! Graph synthesis from pipeline events.

use repolens_config::GraphScope;
use repolens_extract::{
    normalize_package_name, DependencyEvent, EntityEvent, EventBlob,
};
use repolens_walk::FileRecord;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::model::{AttrValue, Edge, EdgeKind, Graph, Node, NodeKind};

/// Scope path of the synthetic run root. Constant so the root id is stable
/// across runs.
const RUN_SCOPE: &str = "run";

/// One artifact to register in the graph.
#[derive(Debug, Clone)]
pub struct ArtifactRef {
    /// Artifact kind label, e.g. `bundle` or `diagram`.
    pub kind: String,
    /// Path relative to the run directory, e.g. `bundles/all-0.txt`.
    pub relative_path: String,
    /// Canonical paths of files this artifact derives from (bundles only).
    pub derived_paths: Vec<String>,
}

/// Everything the builder consumes.
#[derive(Debug)]
pub struct GraphInputs<'a> {
    pub run_id: &'a str,
    /// Sorted walk records.
    pub records: &'a [FileRecord],
    /// Event blob per canonical path.
    pub blobs: &'a BTreeMap<String, EventBlob>,
    pub dependency_events: &'a [DependencyEvent],
    pub artifacts: &'a [ArtifactRef],
    pub scope: GraphScope,
    /// When false, test nodes are excluded regardless of scope.
    pub include_tests: bool,
}

/// Build the typed graph for one run. The result is not yet validated;
/// callers run [`crate::validate_graph`] before serialization.
#[must_use]
pub fn build_graph(inputs: &GraphInputs<'_>) -> Graph {
    let mut graph = Graph::new();
    let run_node_id = Node::make_id(NodeKind::Run, RUN_SCOPE);
    graph.upsert_node(Node {
        id: run_node_id.clone(),
        kind: NodeKind::Run,
        label: RUN_SCOPE.to_string(),
        attributes: BTreeMap::from([("run_id".to_string(), AttrValue::from(inputs.run_id))]),
        provenance: BTreeSet::from([inputs.run_id.to_string()]),
    });

    let keep_code = matches!(inputs.scope, GraphScope::Full | GraphScope::Code);
    let keep_dependencies =
        matches!(inputs.scope, GraphScope::Full | GraphScope::Dependencies);
    let keep_tests =
        inputs.include_tests && matches!(inputs.scope, GraphScope::Full | GraphScope::Tests);
    let keep_artifacts = inputs.scope == GraphScope::Full;

    // Qualified module name -> module node id, for import and dependency
    // resolution. Populated for every scope since modules anchor the tree.
    let mut modules_by_name: BTreeMap<String, String> = BTreeMap::new();
    let mut module_parent_file: BTreeMap<String, String> = BTreeMap::new();

    for record in inputs.records {
        let file_id = file_node_id(&record.canonical_path);
        graph.upsert_node(file_node(record));
        graph.insert_edge(Edge::new(&run_node_id, EdgeKind::Contains, &file_id));

        let Some(blob) = inputs.blobs.get(&record.canonical_path) else {
            continue;
        };
        for event in &blob.events {
            if let EntityEvent::ModuleDeclared { name } = event {
                let module_id = Node::make_id(NodeKind::Module, name);
                graph.upsert_node(Node {
                    id: module_id.clone(),
                    kind: NodeKind::Module,
                    label: name.clone(),
                    attributes: BTreeMap::new(),
                    provenance: BTreeSet::from([record.canonical_path.clone()]),
                });
                modules_by_name.insert(name.clone(), module_id.clone());
                // single-parent containment: first declaring file wins
                if !module_parent_file.contains_key(&module_id) {
                    module_parent_file.insert(module_id.clone(), file_id.clone());
                    graph.insert_edge(Edge::new(&file_id, EdgeKind::Contains, &module_id));
                }
            }
        }
    }

    // Second pass: members, imports, tests. Modules must all exist first so
    // intra-run import resolution is order-independent.
    let mut pending_imports: Vec<(String, String, String)> = Vec::new();
    for record in inputs.records {
        let Some(blob) = inputs.blobs.get(&record.canonical_path) else {
            continue;
        };
        let module_name = blob.events.iter().find_map(|e| match e {
            EntityEvent::ModuleDeclared { name } => Some(name.clone()),
            _ => None,
        });
        let Some(module_name) = module_name else {
            continue;
        };
        let module_id = Node::make_id(NodeKind::Module, &module_name);

        for event in &blob.events {
            match event {
                EntityEvent::ModuleDeclared { .. } => {}
                EntityEvent::FunctionDeclared { name, line } if keep_code => {
                    add_member(
                        &mut graph,
                        NodeKind::Function,
                        &module_id,
                        &module_name,
                        name,
                        *line,
                        record,
                    );
                }
                EntityEvent::ClassDeclared { name, line } if keep_code => {
                    add_member(
                        &mut graph,
                        NodeKind::Class,
                        &module_id,
                        &module_name,
                        name,
                        *line,
                        record,
                    );
                }
                EntityEvent::TestDeclared { name, line } if keep_tests => {
                    let test_id = add_member(
                        &mut graph,
                        NodeKind::Test,
                        &module_id,
                        &module_name,
                        name,
                        *line,
                        record,
                    );
                    let target = resolve_tested_module(name, &module_name, &modules_by_name)
                        .unwrap_or_else(|| module_id.clone());
                    graph.insert_edge(Edge::new(&test_id, EdgeKind::Tests, &target));
                }
                EntityEvent::FixtureDeclared { name, line } if keep_code => {
                    let fixture_id = add_member(
                        &mut graph,
                        NodeKind::Function,
                        &module_id,
                        &module_name,
                        name,
                        *line,
                        record,
                    );
                    if let Some(node) = graph.node(&fixture_id) {
                        let mut updated = node.clone();
                        updated
                            .attributes
                            .insert("fixture".to_string(), AttrValue::from(true));
                        graph.upsert_node_replacing(updated);
                    }
                    graph.insert_edge(Edge::new(&module_id, EdgeKind::Defines, &fixture_id));
                }
                EntityEvent::ImportObserved { target } if keep_dependencies || keep_code => {
                    pending_imports.push((
                        module_id.clone(),
                        record.canonical_path.clone(),
                        target.clone(),
                    ));
                }
                _ => {}
            }
        }
    }

    for (module_id, origin_path, target) in pending_imports {
        match resolve_import(&target, &modules_by_name) {
            Some(target_module_id) => {
                if target_module_id != module_id {
                    graph.insert_edge(Edge::new(&module_id, EdgeKind::Imports, &target_module_id));
                }
            }
            None if keep_dependencies => {
                let dependency_id = add_dependency_node(
                    &mut graph,
                    &run_node_id,
                    &import_package_name(&target),
                    &origin_path,
                );
                graph.insert_edge(Edge::new(&module_id, EdgeKind::DependsOn, &dependency_id));
            }
            None => {}
        }
    }

    if keep_dependencies {
        for event in inputs.dependency_events {
            let dependency_id = add_dependency_node(
                &mut graph,
                &run_node_id,
                &event.package,
                &event.manifest_path,
            );
            if let Some(node) = graph.node(&dependency_id) {
                let mut updated = node.clone();
                updated
                    .attributes
                    .entry("scope".to_string())
                    .or_insert_with(|| AttrValue::from(event.scope.to_string()));
                if let Some(spec) = &event.version_spec {
                    updated
                        .attributes
                        .entry("version_spec".to_string())
                        .or_insert_with(|| AttrValue::from(spec.clone()));
                }
                graph.upsert_node_replacing(updated);
            }

            let source_id = modules_by_name
                .get(&event.owning_module)
                .cloned()
                .or_else(|| {
                    let fallback =
                        repolens_extract::module_qualified_name(&event.manifest_path);
                    modules_by_name.get(&fallback).cloned()
                });
            if let Some(source_id) = source_id {
                graph.insert_edge(Edge::new(&source_id, EdgeKind::DependsOn, &dependency_id));
            }
        }
    }

    if keep_artifacts {
        for artifact in inputs.artifacts {
            let artifact_id = Node::make_id(NodeKind::Artifact, &artifact.relative_path);
            graph.upsert_node(Node {
                id: artifact_id.clone(),
                kind: NodeKind::Artifact,
                label: artifact.relative_path.clone(),
                attributes: BTreeMap::from([(
                    "artifact_kind".to_string(),
                    AttrValue::from(artifact.kind.clone()),
                )]),
                provenance: BTreeSet::from([inputs.run_id.to_string()]),
            });
            graph.insert_edge(Edge::new(&run_node_id, EdgeKind::Contains, &artifact_id));
            graph.insert_edge(Edge::new(&run_node_id, EdgeKind::Produces, &artifact_id));
            for derived in &artifact.derived_paths {
                let file_id = file_node_id(derived);
                if graph.node(&file_id).is_some() {
                    graph.insert_edge(Edge::new(&artifact_id, EdgeKind::Derives, &file_id));
                }
            }
        }
    }

    debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "graph built"
    );
    graph
}

fn file_node_id(canonical_path: &str) -> String {
    Node::make_id(NodeKind::File, canonical_path)
}

fn file_node(record: &FileRecord) -> Node {
    Node {
        id: file_node_id(&record.canonical_path),
        kind: NodeKind::File,
        label: record.canonical_path.clone(),
        attributes: BTreeMap::from([
            ("digest".to_string(), AttrValue::from(record.digest.clone())),
            (
                "language".to_string(),
                AttrValue::from(record.language.clone()),
            ),
            ("line_count".to_string(), AttrValue::from(record.line_count)),
            ("size_bytes".to_string(), AttrValue::from(record.size_bytes)),
        ]),
        provenance: BTreeSet::from([record.canonical_path.clone()]),
    }
}

fn add_member(
    graph: &mut Graph,
    kind: NodeKind,
    module_id: &str,
    module_name: &str,
    name: &str,
    line: u64,
    record: &FileRecord,
) -> String {
    let scope_path = format!("{module_name}.{name}");
    let id = Node::make_id(kind, &scope_path);
    graph.upsert_node(Node {
        id: id.clone(),
        kind,
        label: name.to_string(),
        attributes: BTreeMap::from([("line".to_string(), AttrValue::from(line))]),
        provenance: BTreeSet::from([record.canonical_path.clone()]),
    });
    graph.insert_edge(Edge::new(module_id, EdgeKind::Contains, &id));
    id
}

fn add_dependency_node(
    graph: &mut Graph,
    run_node_id: &str,
    package: &str,
    origin: &str,
) -> String {
    let id = Node::make_id(NodeKind::Dependency, package);
    graph.upsert_node(Node {
        id: id.clone(),
        kind: NodeKind::Dependency,
        label: package.to_string(),
        attributes: BTreeMap::new(),
        provenance: BTreeSet::from([origin.to_string()]),
    });
    graph.insert_edge(Edge::new(run_node_id, EdgeKind::Contains, &id));
    id
}

/// Resolve an import target to an intra-run module.
///
/// Exact qualified-name match first; otherwise the lexicographically first
/// module whose qualified name ends with `.target`. Relative JS-style
/// targets are tried with their leading `./` stripped.
fn resolve_import(target: &str, modules: &BTreeMap<String, String>) -> Option<String> {
    let cleaned = target.trim_start_matches("./").replace('/', ".");
    if let Some(id) = modules.get(&cleaned) {
        return Some(id.clone());
    }
    let suffix = format!(".{cleaned}");
    modules
        .iter()
        .find(|(name, _)| name.ends_with(&suffix))
        .map(|(_, id)| id.clone())
}

/// Package a dependency target reduces to: the first path/dot segment.
fn import_package_name(target: &str) -> String {
    let first = target
        .trim_start_matches("./")
        .split(['.', '/'])
        .next()
        .unwrap_or(target);
    normalize_package_name(first)
}

/// A test named `test_x` is assumed to exercise a module whose qualified
/// name ends with `x`; otherwise its own module.
fn resolve_tested_module(
    test_name: &str,
    own_module: &str,
    modules: &BTreeMap<String, String>,
) -> Option<String> {
    let stripped = test_name.strip_prefix("test_")?;
    let suffix = format!(".{stripped}");
    modules
        .iter()
        .find(|(name, _)| {
            (name.as_str() == stripped || name.ends_with(&suffix))
                && name.as_str() != own_module
        })
        .map(|(_, id)| id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use repolens_extract::{DependencyScope, EVENT_BLOB_SCHEMA_VERSION};

    fn record(path: &str, language: &str) -> FileRecord {
        FileRecord {
            canonical_path: path.to_string(),
            absolute_path: camino::Utf8PathBuf::from("/scan").join(path),
            digest: format!("{:0>64}", path.len()),
            size_bytes: 10,
            mtime_ns: 0,
            line_count: 1,
            language: language.to_string(),
            cached: false,
            synopsis: None,
        }
    }

    fn blob(events: Vec<EntityEvent>) -> EventBlob {
        EventBlob {
            schema_version: EVENT_BLOB_SCHEMA_VERSION,
            synopsis: None,
            events,
            degraded: false,
        }
    }

    fn base_inputs<'a>(
        records: &'a [FileRecord],
        blobs: &'a BTreeMap<String, EventBlob>,
        deps: &'a [DependencyEvent],
        artifacts: &'a [ArtifactRef],
    ) -> GraphInputs<'a> {
        GraphInputs {
            run_id: "run-test",
            records,
            blobs,
            dependency_events: deps,
            artifacts,
            scope: GraphScope::Full,
            include_tests: true,
        }
    }

    #[test]
    fn single_file_produces_run_file_module_function_chain() {
        let records = vec![record("a.py", "python")];
        let mut blobs = BTreeMap::new();
        blobs.insert(
            "a.py".to_string(),
            blob(vec![
                EntityEvent::ModuleDeclared { name: "a".into() },
                EntityEvent::FunctionDeclared {
                    name: "f".into(),
                    line: 1,
                },
            ]),
        );
        let graph = build_graph(&base_inputs(&records, &blobs, &[], &[]));

        assert_eq!(graph.nodes_of_kind(NodeKind::Run).count(), 1);
        assert_eq!(graph.nodes_of_kind(NodeKind::File).count(), 1);
        assert_eq!(graph.nodes_of_kind(NodeKind::Module).count(), 1);
        assert_eq!(graph.nodes_of_kind(NodeKind::Function).count(), 1);
        assert_eq!(graph.edges_of_kind(EdgeKind::Contains).count(), 3);
    }

    #[test]
    fn intra_run_import_becomes_imports_edge() {
        let records = vec![record("a.py", "python"), record("b.py", "python")];
        let mut blobs = BTreeMap::new();
        blobs.insert(
            "a.py".to_string(),
            blob(vec![
                EntityEvent::ModuleDeclared { name: "a".into() },
                EntityEvent::ImportObserved { target: "b".into() },
            ]),
        );
        blobs.insert(
            "b.py".to_string(),
            blob(vec![EntityEvent::ModuleDeclared { name: "b".into() }]),
        );
        let graph = build_graph(&base_inputs(&records, &blobs, &[], &[]));

        assert_eq!(graph.edges_of_kind(EdgeKind::Imports).count(), 1);
        assert_eq!(graph.nodes_of_kind(NodeKind::Dependency).count(), 0);
    }

    #[test]
    fn unresolved_import_becomes_dependency() {
        let records = vec![record("a.py", "python")];
        let mut blobs = BTreeMap::new();
        blobs.insert(
            "a.py".to_string(),
            blob(vec![
                EntityEvent::ModuleDeclared { name: "a".into() },
                EntityEvent::ImportObserved {
                    target: "requests.adapters".into(),
                },
            ]),
        );
        let graph = build_graph(&base_inputs(&records, &blobs, &[], &[]));

        let deps: Vec<&Node> = graph.nodes_of_kind(NodeKind::Dependency).collect();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].label, "requests");
        assert_eq!(graph.edges_of_kind(EdgeKind::DependsOn).count(), 1);
    }

    #[test]
    fn dependency_events_attach_to_owning_module() {
        let records = vec![record("requirements.txt", "text")];
        let mut blobs = BTreeMap::new();
        blobs.insert(
            "requirements.txt".to_string(),
            blob(vec![EntityEvent::ModuleDeclared {
                name: "requirements".into(),
            }]),
        );
        let deps = vec![DependencyEvent {
            package: "flask".into(),
            version_spec: Some("==3.0".into()),
            scope: DependencyScope::Runtime,
            owning_module: "requirements".into(),
            manifest_path: "requirements.txt".into(),
        }];
        let graph = build_graph(&base_inputs(&records, &blobs, &deps, &[]));

        let dep_nodes: Vec<&Node> = graph.nodes_of_kind(NodeKind::Dependency).collect();
        assert_eq!(dep_nodes.len(), 1);
        assert_eq!(
            dep_nodes[0].attributes.get("version_spec"),
            Some(&AttrValue::from("==3.0".to_string()))
        );
        assert_eq!(graph.edges_of_kind(EdgeKind::DependsOn).count(), 1);
    }

    #[test]
    fn artifacts_get_produced_and_derive_edges() {
        let records = vec![record("a.py", "python")];
        let mut blobs = BTreeMap::new();
        blobs.insert(
            "a.py".to_string(),
            blob(vec![EntityEvent::ModuleDeclared { name: "a".into() }]),
        );
        let artifacts = vec![ArtifactRef {
            kind: "bundle".into(),
            relative_path: "bundles/all-0.txt".into(),
            derived_paths: vec!["a.py".into()],
        }];
        let graph = build_graph(&base_inputs(&records, &blobs, &[], &artifacts));

        assert_eq!(graph.nodes_of_kind(NodeKind::Artifact).count(), 1);
        assert_eq!(graph.edges_of_kind(EdgeKind::Produces).count(), 1);
        assert_eq!(graph.edges_of_kind(EdgeKind::Derives).count(), 1);
    }

    #[test]
    fn excluding_tests_dominates_tests_scope() {
        let records = vec![record("tests/test_a.py", "python")];
        let mut blobs = BTreeMap::new();
        blobs.insert(
            "tests/test_a.py".to_string(),
            blob(vec![
                EntityEvent::ModuleDeclared {
                    name: "tests.test_a".into(),
                },
                EntityEvent::TestDeclared {
                    name: "test_a".into(),
                    line: 1,
                },
            ]),
        );
        let mut inputs = base_inputs(&records, &blobs, &[], &[]);
        inputs.scope = GraphScope::Tests;
        inputs.include_tests = false;
        let graph = build_graph(&inputs);

        assert_eq!(graph.nodes_of_kind(NodeKind::Test).count(), 0);
    }

    #[test]
    fn test_nodes_link_to_tested_module() {
        let records = vec![
            record("app.py", "python"),
            record("tests/test_app.py", "python"),
        ];
        let mut blobs = BTreeMap::new();
        blobs.insert(
            "app.py".to_string(),
            blob(vec![EntityEvent::ModuleDeclared { name: "app".into() }]),
        );
        blobs.insert(
            "tests/test_app.py".to_string(),
            blob(vec![
                EntityEvent::ModuleDeclared {
                    name: "tests.test_app".into(),
                },
                EntityEvent::TestDeclared {
                    name: "test_app".into(),
                    line: 1,
                },
            ]),
        );
        let graph = build_graph(&base_inputs(&records, &blobs, &[], &[]));

        let tests_edges: Vec<&Edge> = graph.edges_of_kind(EdgeKind::Tests).collect();
        assert_eq!(tests_edges.len(), 1);
        let app_module = Node::make_id(NodeKind::Module, "app");
        assert_eq!(tests_edges[0].target_id, app_module);
    }
}
