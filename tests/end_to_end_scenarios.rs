//! End-to-end scenarios pinned straight from the six literal examples the
//! spec's testable-properties section walks through: local JS aliasing,
//! cross-file JS inheritance, Python `super()`, Go entry-point dead-code
//! exclusion, the builtin-method filter, and stale-cache/forceRebuild
//! behavior. Each test builds a real on-disk fixture tree and drives the
//! public `SimpleIndexer`/`ResolutionEngine` API exactly as the CLI and
//! MCP surfaces do (see `src/mcp/mod.rs`'s own `indexer_over` fixture
//! helper, which this mirrors).

use std::sync::Arc;

use codebase_index::config::{ResolutionConfig, Settings};
use codebase_index::resolution::ResolutionEngine;
use codebase_index::SimpleIndexer;

fn write(dir: &std::path::Path, name: &str, contents: &str) {
    let full = dir.join(name);
    if let Some(parent) = full.parent() {
        std::fs::create_dir_all(parent).expect("create fixture dirs");
    }
    std::fs::write(full, contents).expect("write fixture file");
}

fn build_indexer(dir: &std::path::Path) -> SimpleIndexer {
    let settings = Arc::new(Settings::default());
    let mut idx = SimpleIndexer::new(dir, settings);
    idx.build(true).expect("initial build");
    idx
}

/// Scenario 1: a local alias (`const myParse = parse;`) still resolves
/// `findCallers('parse')` to include the call made through the alias.
#[test]
fn local_alias_call_resolves_to_caller() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "parser.js",
        r#"
function parse(text) {
    return text.length;
}

const myParse = parse;

function caller() {
    return myParse("hello");
}
"#,
    );

    let idx = build_indexer(dir.path());
    let config = ResolutionConfig::default();
    let engine = ResolutionEngine::new(&idx, &config);

    let callers = engine.find_callers("parse", true);
    assert!(
        callers.items.iter().any(|d| d.name.as_ref() == "caller"),
        "expected `caller` among callers of `parse` via the `myParse` alias, got {:?}",
        callers.items.iter().map(|d| d.name.to_string()).collect::<Vec<_>>()
    );
}

/// Scenario 2: cross-file inheritance — `class Child extends Base` defined
/// in another file still resolves `findCallees(process)` to include
/// `helper`, a method defined only on `Base`.
#[test]
fn cross_file_inheritance_resolves_inherited_method_call() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "base.js",
        r#"
class Base {
    helper() {
        return 1;
    }
}

module.exports = { Base };
"#,
    );
    write(
        dir.path(),
        "child.js",
        r#"
const { Base } = require("./base");

class Child extends Base {
    process() {
        return this.helper();
    }
}

module.exports = { Child };
"#,
    );

    let idx = build_indexer(dir.path());
    let config = ResolutionConfig::default();
    let engine = ResolutionEngine::new(&idx, &config);

    let process_def = idx
        .defs_by_name("process")
        .into_iter()
        .next()
        .expect("process method indexed");

    let callees = engine.find_callees(process_def.id, true);
    assert!(
        callees.items.iter().any(|d| d.name.as_ref() == "helper"),
        "expected `helper` (inherited from Base) among callees of `process`, got {:?}",
        callees.items.iter().map(|d| d.name.to_string()).collect::<Vec<_>>()
    );
}

/// Scenario 3: Python `super()` calls resolve up the MRO to the base
/// class's method rather than being dropped as unresolvable.
#[test]
fn python_super_call_resolves_to_base_method() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "shapes.py",
        r#"
class Shape:
    def describe(self):
        return "a shape"

class Circle(Shape):
    def describe(self):
        return super().describe() + ", circular"
"#,
    );

    let idx = build_indexer(dir.path());
    let config = ResolutionConfig::default();
    let engine = ResolutionEngine::new(&idx, &config);

    let describe_defs = idx.defs_by_name("describe");
    assert_eq!(describe_defs.len(), 2, "expected both Shape.describe and Circle.describe indexed");

    let circle_describe = describe_defs
        .iter()
        .find(|d| d.class_name.as_deref() == Some("Circle"))
        .expect("Circle.describe indexed");

    let callees = engine.find_callees(circle_describe.id, true);
    assert!(
        callees.items.iter().any(|d| d.name.as_ref() == "describe" && d.class_name.as_deref() == Some("Shape")),
        "expected super().describe() to resolve to Shape.describe, got {:?}",
        callees.items.iter().map(|d| (d.name.to_string(), d.class_name.clone())).collect::<Vec<_>>()
    );
}

/// Scenario 4: Go entry points (`main`, `init`) are excluded from dead
/// code, but an unreferenced helper function is reported.
#[test]
fn go_deadcode_excludes_entry_points() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "main.go",
        r#"
package main

func init() {
}

func unusedHelper() int {
    return 42
}

func main() {
}
"#,
    );

    let idx = build_indexer(dir.path());
    let config = ResolutionConfig::default();
    let engine = ResolutionEngine::new(&idx, &config);

    let dead = engine.deadcode(false);
    let dead_names: Vec<&str> = dead.iter().map(|d| d.name.as_ref()).collect();

    assert_eq!(dead_names, vec!["unusedHelper"], "expected only unusedHelper reported dead, got {dead_names:?}");
}

/// Scenario 5: `usages('process')` counts only the two real calls to the
/// project's own `process` function, filtering out the unrelated
/// `JSON.parse` builtin call that happens to share no name collision here
/// but exercises the same builtin-filter path as `.process(...)`-style
/// builtin array/string methods.
#[test]
fn usages_filters_out_builtin_method_calls() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "app.js",
        r#"
function process(x) {
    return x;
}

function callerA() {
    return process(1);
}

function callerB() {
    const arr = [1, 2, 3];
    // `.process` is never a real builtin, but `.map`/`.filter` etc. are —
    // exercise the same filter path with an actual builtin receiver call
    // that must NOT be counted as a usage of the project's `process`.
    const mapped = arr.map((n) => n + 1);
    return process(2) + mapped.length;
}
"#,
    );

    let idx = build_indexer(dir.path());
    let config = ResolutionConfig::default();
    let engine = ResolutionEngine::new(&idx, &config);

    let sites = engine.usages("process");
    assert_eq!(sites.len(), 2, "expected exactly 2 real usages of `process`, got {sites:?}");

    let map_sites = engine.usages("map");
    assert!(map_sites.is_empty(), "builtin `.map` call must not surface as a usage site, got {map_sites:?}");
}

/// Scenario 6: after rewriting an indexed file, `is_cache_stale()` reports
/// true, and a `build(force_rebuild: true)` replaces (not duplicates) the
/// symbol table for the changed file.
#[test]
fn stale_cache_forces_clean_rebuild() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "lib.rs", "fn sym() {}\n");

    let settings = Arc::new(Settings::default());
    let mut idx = SimpleIndexer::new(dir.path(), settings);
    idx.build(true).expect("initial build");
    idx.save_cache().expect("save cache");

    assert_eq!(idx.defs_by_name("sym").len(), 1);

    // Rewrite the file with different content so the cached mtime/hash is
    // stale. Staleness is decided by mtime first, falling back to a content
    // hash only when mtime differs — sleep past common filesystem mtime
    // granularity so the rewrite is observed as a genuine mtime change.
    std::thread::sleep(std::time::Duration::from_millis(1100));
    write(dir.path(), "lib.rs", "fn sym() {}\nfn sym2() {}\n");

    assert!(idx.is_cache_stale().expect("stale check"), "expected cache to be reported stale after rewrite");

    idx.build(true).expect("forced rebuild");

    assert_eq!(idx.defs_by_name("sym").len(), 1, "forceRebuild must not duplicate `sym`'s definition");
    assert_eq!(idx.defs_by_name("sym2").len(), 1, "forceRebuild must pick up the newly added `sym2`");
}
