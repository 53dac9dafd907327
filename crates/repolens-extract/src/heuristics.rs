//! Line-based structural heuristics per language.
//!
//! These are deliberately shallow: no ASTs, no content sniffing, one pass
//! over the lines. The vocabulary they feed is closed, so a language that
//! surfaces nothing still declares its module.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::events::{module_qualified_name, EntityEvent};

static PY_DEF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:async\s+)?def\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap());
static PY_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*class\s+([A-Za-z_][A-Za-z0-9_]*)\s*[(:]").unwrap());
static PY_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:from\s+([A-Za-z_][\w.]*)\s+import|import\s+([A-Za-z_][\w.]*))").unwrap());
static PY_FIXTURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*@(?:pytest\.)?fixture").unwrap());

static RS_FN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:unsafe\s+)?fn\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap()
});
static RS_TYPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?(?:struct|enum|trait)\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap()
});
static RS_USE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:pub\s+)?use\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap());
static RS_TEST_ATTR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*#\[(?:tokio::)?test\]").unwrap());

static JS_FN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:export\s+)?(?:async\s+)?function\s+([A-Za-z_$][A-Za-z0-9_$]*)").unwrap()
});
static JS_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:export\s+)?class\s+([A-Za-z_$][A-Za-z0-9_$]*)").unwrap());
static JS_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:from\s+|require\(\s*)["']([^"']+)["']"#).unwrap()
});
static JS_TEST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^\s*(?:it|test|describe)\(\s*["']([^"']+)["']"#).unwrap());

/// Extract events from one file's text.
///
/// The first event is always the module declaration; everything after it
/// follows source order.
#[must_use]
pub fn extract_events(canonical_path: &str, language: &str, content: &str) -> Vec<EntityEvent> {
    let module = module_qualified_name(canonical_path);
    let mut events = vec![EntityEvent::ModuleDeclared {
        name: module.clone(),
    }];

    let in_test_file = looks_like_test_path(canonical_path);
    match language {
        "python" => python_events(content, in_test_file, &mut events),
        "rust" => rust_events(content, &mut events),
        "javascript" | "typescript" => javascript_events(content, in_test_file, &mut events),
        _ => {}
    }

    events
}

fn looks_like_test_path(canonical_path: &str) -> bool {
    let file_name = canonical_path
        .rsplit('/')
        .next()
        .unwrap_or(canonical_path);
    canonical_path
        .split('/')
        .any(|seg| seg == "tests" || seg == "test")
        || file_name.starts_with("test_")
        || file_name.ends_with("_test.py")
        || file_name.ends_with("_test.rs")
        || file_name.ends_with(".test.js")
        || file_name.ends_with(".test.ts")
}

fn python_events(content: &str, in_test_file: bool, events: &mut Vec<EntityEvent>) {
    let mut pending_fixture = false;
    for (index, line) in content.lines().enumerate() {
        let line_no = index as u64 + 1;
        if PY_FIXTURE.is_match(line) {
            pending_fixture = true;
            continue;
        }
        if let Some(captures) = PY_DEF.captures(line) {
            let name = captures[1].to_string();
            if pending_fixture {
                events.push(EntityEvent::FixtureDeclared {
                    name,
                    line: line_no,
                });
            } else if name.starts_with("test_") || (in_test_file && name.starts_with("test")) {
                events.push(EntityEvent::TestDeclared {
                    name,
                    line: line_no,
                });
            } else {
                events.push(EntityEvent::FunctionDeclared {
                    name,
                    line: line_no,
                });
            }
            pending_fixture = false;
            continue;
        }
        if line.trim().starts_with('@') {
            // unrelated decorator between @fixture and def does not occur;
            // any other decorator resets nothing
            continue;
        }
        pending_fixture = false;
        if let Some(captures) = PY_CLASS.captures(line) {
            events.push(EntityEvent::ClassDeclared {
                name: captures[1].to_string(),
                line: line_no,
            });
            continue;
        }
        if let Some(captures) = PY_IMPORT.captures(line) {
            let target = captures
                .get(1)
                .or_else(|| captures.get(2))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default();
            if !target.is_empty() {
                events.push(EntityEvent::ImportObserved { target });
            }
        }
    }
}

fn rust_events(content: &str, events: &mut Vec<EntityEvent>) {
    let mut pending_test_attr = false;
    for (index, line) in content.lines().enumerate() {
        let line_no = index as u64 + 1;
        if RS_TEST_ATTR.is_match(line) {
            pending_test_attr = true;
            continue;
        }
        if let Some(captures) = RS_FN.captures(line) {
            let name = captures[1].to_string();
            if pending_test_attr {
                events.push(EntityEvent::TestDeclared {
                    name,
                    line: line_no,
                });
            } else {
                events.push(EntityEvent::FunctionDeclared {
                    name,
                    line: line_no,
                });
            }
            pending_test_attr = false;
            continue;
        }
        if line.trim().starts_with("#[") {
            continue;
        }
        pending_test_attr = false;
        if let Some(captures) = RS_TYPE.captures(line) {
            events.push(EntityEvent::ClassDeclared {
                name: captures[1].to_string(),
                line: line_no,
            });
            continue;
        }
        if let Some(captures) = RS_USE.captures(line) {
            let root = captures[1].to_string();
            if root != "crate" && root != "self" && root != "super" {
                events.push(EntityEvent::ImportObserved { target: root });
            }
        }
    }
}

fn javascript_events(content: &str, in_test_file: bool, events: &mut Vec<EntityEvent>) {
    for (index, line) in content.lines().enumerate() {
        let line_no = index as u64 + 1;
        if let Some(captures) = JS_TEST.captures(line) {
            if in_test_file {
                events.push(EntityEvent::TestDeclared {
                    name: captures[1].to_string(),
                    line: line_no,
                });
                continue;
            }
        }
        if let Some(captures) = JS_FN.captures(line) {
            events.push(EntityEvent::FunctionDeclared {
                name: captures[1].to_string(),
                line: line_no,
            });
            continue;
        }
        if let Some(captures) = JS_CLASS.captures(line) {
            events.push(EntityEvent::ClassDeclared {
                name: captures[1].to_string(),
                line: line_no,
            });
            continue;
        }
        if let Some(captures) = JS_IMPORT.captures(line) {
            events.push(EntityEvent::ImportObserved {
                target: captures[1].to_string(),
            });
        }
    }
}
