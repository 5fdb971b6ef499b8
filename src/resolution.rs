//! Resolution engine (spec.md §4.C): turns the syntactic evidence the
//! index builder collected — call sites, aliases, inheritance edges — into
//! semantic answers, and layers the derived queries (`context`, `smart`,
//! `trace`, `impact`, `deadcode`, `verify`, `usages`) and the file-level
//! helpers (§4.F) on top.
//!
//! Grounded on the teacher's `language_behavior::resolve_method_call`
//! ordering (direct call, then alias, then receiver method with an
//! inheritance walk) generalized to a uniform, language-agnostic engine
//! that drives off [`crate::indexing::SimpleIndexer`]'s tables instead of
//! a per-language behavior trait.

use std::collections::HashSet;
use std::fs;

use crate::classifier::{self, PositionKind};
use crate::config::ResolutionConfig;
use crate::indexing::SimpleIndexer;
use crate::symbol::{CallSite, ExportRecord, ImportEdge, Receiver, SymbolDef};
use crate::types::{FileId, SymbolId, SymbolKind};

/// Receiver-qualified calls into well-known standard/runtime APIs. Rule 3
/// (spec.md §4.C) requires these never resolve to a same-named project
/// symbol; the check is name-only, so a project method named `parse`
/// behind an unrelated receiver is unaffected.
const BUILTIN_RECEIVER_METHODS: &[(&str, &str)] = &[
    ("JSON", "parse"),
    ("JSON", "stringify"),
    ("Array", "from"),
    ("Array", "isArray"),
    ("Object", "keys"),
    ("Object", "values"),
    ("Object", "entries"),
    ("Object", "assign"),
    ("Math", "max"),
    ("Math", "min"),
    ("Math", "floor"),
    ("Math", "round"),
    ("console", "log"),
    ("console", "error"),
    ("console", "warn"),
    ("path", "join"),
    ("path", "resolve"),
    ("path", "dirname"),
    ("path", "basename"),
    ("Promise", "resolve"),
    ("Promise", "all"),
    ("strings", "Join"),
    ("fmt", "Sprintf"),
    ("fmt", "Printf"),
    ("fmt", "Println"),
];

/// Receiver method names common enough across every supported language's
/// standard collection/string APIs that, behind *any* receiver, they are
/// far more likely to be a builtin than a project method of the same name.
const BUILTIN_BARE_METHODS: &[&str] = &[
    "map", "filter", "reduce", "forEach", "push", "pop", "slice", "splice", "join", "split",
    "toString", "valueOf", "hasOwnProperty", "append", "len", "sort", "reverse",
];

/// A resolved definition plus non-fatal notes about how it was resolved
/// (ambiguity, shadowing). Never an error — resolution always degrades to
/// an over-report rather than a failure.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ResolvedSymbol {
    pub def: SymbolDef,
    pub warnings: Vec<String>,
}

/// Generic result wrapper carrying the over-report contract's warnings
/// alongside the (possibly multi-valued) answer.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ResolvedQuery<T> {
    pub items: Vec<T>,
    pub warnings: Vec<String>,
}

impl<T> ResolvedQuery<T> {
    fn empty() -> Self {
        Self { items: Vec::new(), warnings: Vec::new() }
    }
}

/// `context(name)`'s answer shape depends on whether `name` names a
/// function-like symbol or a type.
#[derive(Debug, Clone, serde::Serialize)]
pub enum ContextResult {
    Function { def: SymbolDef, callers: Vec<SymbolDef>, callees: Vec<SymbolDef> },
    Type { def: SymbolDef, methods: Vec<SymbolDef> },
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SmartResult {
    pub def: SymbolDef,
    pub callees: Vec<SymbolDef>,
}

/// One node of a bounded call tree (`trace`).
#[derive(Debug, Clone, serde::Serialize)]
pub struct CallTreeNode {
    pub name: String,
    pub file: String,
    pub line: u32,
    pub children: Vec<CallTreeNode>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ImpactResult {
    pub def: SymbolDef,
    pub impacted: Vec<SymbolDef>,
    pub truncated: bool,
}

/// One non-builtin call site for `name`, independent of whether it resolves
/// to a project definition — the raw evidence `usages()` reports (spec.md
/// scenario 5: builtin-filtered call count, not deduped callers).
#[derive(Debug, Clone, serde::Serialize)]
pub struct UsageSite {
    pub file: String,
    pub line: u32,
    pub column: u16,
    pub containing: Option<String>,
}

/// One call site checked against `name`'s declared parameter list.
#[derive(Debug, Clone, serde::Serialize)]
pub struct VerifyIssue {
    pub caller_file: String,
    pub line: u32,
    pub declared_params: usize,
    pub apparent_args: Option<usize>,
    pub uncertain: bool,
    pub mismatch: bool,
}

/// A parsed stack-trace frame, matched back to an indexed file by
/// longest-suffix path match (spec.md §4.F `stacktrace`).
#[derive(Debug, Clone, serde::Serialize)]
pub struct StackFrame {
    pub raw: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub matched: bool,
}

/// Direction for `graph`'s bounded import traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphDirection {
    /// Files this file imports (outgoing edges).
    Dependencies,
    /// Files that import this file (incoming edges).
    Dependents,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct GraphNode {
    pub file: String,
    pub children: Vec<GraphNode>,
}

/// Walks [`SimpleIndexer`]'s tables to answer structural queries. Carries
/// no mutable state of its own — every call re-derives its answer from the
/// index, so two engines over the same index never disagree.
pub struct ResolutionEngine<'a> {
    index: &'a SimpleIndexer,
    config: &'a ResolutionConfig,
}

impl<'a> ResolutionEngine<'a> {
    pub fn new(index: &'a SimpleIndexer, config: &'a ResolutionConfig) -> Self {
        Self { index, config }
    }

    fn is_builtin_call(&self, call: &CallSite) -> bool {
        let name = call.name.as_ref();
        match &call.receiver {
            Some(Receiver::Named(r)) => {
                BUILTIN_RECEIVER_METHODS.iter().any(|(recv, m)| *recv == r.as_ref() && *m == name)
                    || BUILTIN_BARE_METHODS.contains(&name)
            }
            Some(Receiver::SelfRef) => false,
            None => false,
        }
    }

    /// Rule 2: file-local alias lookup. Only the first binding of a
    /// reassigned name is tracked (`AliasEdge`'s own contract), so this is
    /// always a single lookup, never a chain walk.
    fn resolve_alias(&self, file: FileId, local_name: &str) -> Option<String> {
        self.index
            .aliases_in_file(file)
            .iter()
            .find(|a| a.local_name.as_ref() == local_name)
            .map(|a| a.canonical_name.to_string())
    }

    /// Scope-disambiguates a name-only candidate set down to the call's
    /// true target(s): prefer the innermost enclosing def (shadowing),
    /// then a same-file def, then over-report every candidate.
    fn disambiguate<'b>(&self, candidates: &[&'b SymbolDef], call: &CallSite) -> Vec<&'b SymbolDef> {
        if candidates.len() <= 1 {
            return candidates.to_vec();
        }
        if let Some(inner) = candidates.iter().find(|d| d.file == call.file && d.range.contains_line(call.line)) {
            return vec![*inner];
        }
        let same_file: Vec<&SymbolDef> = candidates.iter().copied().filter(|d| d.file == call.file).collect();
        if same_file.len() == 1 {
            return same_file;
        }
        candidates.to_vec()
    }

    /// Rule 3, `self`/`this`/`cls` receiver: look up `method_name` on the
    /// call's enclosing type, walking the inheritance chain in MRO order
    /// (ascending `InheritanceEdge::order`) when the type itself doesn't
    /// define it. A visited-set guards against inheritance cycles.
    fn resolve_self_method(&self, method_name: &str, containing: &SymbolDef) -> Vec<&'a SymbolDef> {
        let owner = containing.class_name.as_deref().or(containing.receiver.as_deref());
        let Some(owner) = owner else { return Vec::new() };
        let mut visited = HashSet::new();
        self.resolve_method_on_type(method_name, owner, &mut visited)
    }

    fn resolve_method_on_type(&self, method_name: &str, type_name: &str, visited: &mut HashSet<String>) -> Vec<&'a SymbolDef> {
        if !visited.insert(type_name.to_string()) {
            return Vec::new();
        }
        let own: Vec<&SymbolDef> = self
            .index
            .defs_by_name(method_name)
            .into_iter()
            .filter(|d| d.class_name.as_deref() == Some(type_name) || d.receiver.as_deref() == Some(type_name))
            .collect();
        if !own.is_empty() {
            return own;
        }
        let mut parents: Vec<_> = self.index.inheritance_edges().iter().filter(|e| e.child.as_ref() == type_name).collect();
        parents.sort_by_key(|e| e.order);
        for parent in parents {
            let found = self.resolve_method_on_type(method_name, parent.parent.as_ref(), visited);
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }

    /// Python `super().method()` / Java `super.method()` / C#
    /// `base.Method()`: unlike the plain `self`/`this`/`cls` path, the
    /// call must skip the containing type's own definition and start the
    /// MRO walk at its parents directly — `super`/`base` always means
    /// "the next class up", never "myself again".
    fn resolve_super_method(&self, method_name: &str, containing: &SymbolDef) -> Vec<&'a SymbolDef> {
        let Some(owner) = containing.class_name.as_deref() else { return Vec::new() };
        let mut visited = HashSet::new();
        visited.insert(owner.to_string());
        let mut parents: Vec<_> = self.index.inheritance_edges().iter().filter(|e| e.child.as_ref() == owner).collect();
        parents.sort_by_key(|e| e.order);
        for parent in parents {
            let found = self.resolve_method_on_type(method_name, parent.parent.as_ref(), &mut visited);
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }

    /// Rule 3, named receiver (`svc.process()`, Go/Rust `r.Method()`).
    /// Without value-flow tracking (explicitly out of scope — see
    /// SPEC_FULL.md), the receiver's concrete type is unknown, so this
    /// degrades to "pick the same-file method of that name if there's
    /// exactly one, otherwise surface every method of that name" — the
    /// conflation spec.md §9 accepts for Go/Rust receivers by design.
    fn resolve_named_receiver_method(&self, method_name: &str, call_file: FileId) -> Vec<&'a SymbolDef> {
        let candidates: Vec<&SymbolDef> = self.index.defs_by_name(method_name).into_iter().filter(|d| d.is_method).collect();
        if candidates.is_empty() {
            return candidates;
        }
        let same_file: Vec<&SymbolDef> = candidates.iter().copied().filter(|d| d.file == call_file).collect();
        if same_file.len() == 1 {
            return same_file;
        }
        candidates
    }

    /// The four resolution policies, first hit wins. Returns an empty
    /// vector for a builtin call or a name nothing in the project defines;
    /// returns more than one def only as the documented over-report.
    fn resolve_call(&self, call: &CallSite) -> Vec<&'a SymbolDef> {
        if self.is_builtin_call(call) {
            return Vec::new();
        }

        if let Some(receiver) = &call.receiver {
            return match receiver {
                Receiver::SelfRef => call
                    .containing_def
                    .and_then(|id| self.index.symbol(id))
                    .map(|containing| self.resolve_self_method(call.name.as_ref(), containing))
                    .unwrap_or_default(),
                Receiver::Named(name) if name.as_ref() == "super" || name.as_ref() == "base" => call
                    .containing_def
                    .and_then(|id| self.index.symbol(id))
                    .map(|containing| self.resolve_super_method(call.name.as_ref(), containing))
                    .unwrap_or_default(),
                Receiver::Named(_) => self.resolve_named_receiver_method(call.name.as_ref(), call.file),
            };
        }

        let direct = self.index.defs_by_name(call.name.as_ref());
        if !direct.is_empty() {
            return self.disambiguate(&direct, call);
        }

        if let Some(canonical) = self.resolve_alias(call.file, call.name.as_ref()) {
            let aliased = self.index.defs_by_name(&canonical);
            if !aliased.is_empty() {
                return self.disambiguate(&aliased, call);
            }
        }

        Vec::new()
    }

    fn ambiguity_warning(name: &str, candidates: &[&SymbolDef]) -> Vec<String> {
        if candidates.len() > 1 {
            vec![format!("'{name}' has {} definitions in the project; returning all of them", candidates.len())]
        } else {
            Vec::new()
        }
    }

    fn def_containing_line(&self, file: FileId, line: u32) -> Option<&'a SymbolDef> {
        self.index
            .all_defs()
            .filter(|d| d.file == file && d.range.contains_line(line))
            .min_by_key(|d| d.range.end_line.saturating_sub(d.range.start_line))
    }

    /// `usages(name)`: every call site naming `name` that isn't filtered as
    /// a builtin, independent of whether it resolves to a project def.
    /// Unlike `find_callers`, nothing is deduped by enclosing definition —
    /// two calls inside the same function are two usages.
    pub fn usages(&self, name: &str) -> Vec<UsageSite> {
        self.index
            .all_calls()
            .filter(|c| c.name.as_ref() == name && !self.is_builtin_call(c))
            .map(|c| UsageSite {
                file: self.index.file(c.file).map(|f| f.relative_path.to_string()).unwrap_or_default(),
                line: c.line,
                column: c.column,
                containing: c.containing_def.and_then(|id| self.index.symbol(id)).map(|d| d.name.to_string()),
            })
            .collect()
    }

    /// Every caller of `name`: direct/aliased/receiver calls (rules 1-3)
    /// plus rule 4's function-argument callback detection. A def is never
    /// reported as its own caller.
    pub fn find_callers(&self, name: &str, include_methods: bool) -> ResolvedQuery<SymbolDef> {
        let targets = self.index.defs_by_name(name);
        if targets.is_empty() {
            return ResolvedQuery::empty();
        }
        let target_ids: HashSet<SymbolId> = targets.iter().map(|d| d.id).collect();
        let mut callers = Vec::new();
        let mut seen = HashSet::new();

        for call in self.index.all_calls() {
            // No literal-name prefilter here: an aliased call site
            // (`myParse(...)`) names `myParse`, not `parse`, and only
            // `resolve_call`'s rule 2 (alias lookup) connects it back to
            // `name` — filtering on `call.name` first would silently drop
            // every alias-resolved caller.
            let resolved = self.resolve_call(call);
            if !resolved.iter().any(|d| target_ids.contains(&d.id)) {
                continue;
            }
            let Some(caller_id) = call.containing_def else { continue };
            if target_ids.contains(&caller_id) || !seen.insert(caller_id) {
                continue;
            }
            if let Some(def) = self.index.symbol(caller_id) {
                if include_methods || !def.is_method {
                    callers.push(def.clone());
                }
            }
        }

        for file in self.index.files() {
            let Ok(code) = fs::read_to_string(&file.path) else { continue };
            for (ident, line, _col) in classifier::find_callback_candidates(file.language, &code) {
                if ident != name {
                    continue;
                }
                if classifier::classify_position(file.language, &code, line, 0) != PositionKind::Code {
                    continue;
                }
                let Some(containing) = self.def_containing_line(file.id, line) else { continue };
                if target_ids.contains(&containing.id) || !seen.insert(containing.id) {
                    continue;
                }
                if include_methods || !containing.is_method {
                    callers.push(containing.clone());
                }
            }
        }

        ResolvedQuery { items: callers, warnings: Self::ambiguity_warning(name, &targets) }
    }

    /// Every def that a call inside `def_id`'s body resolves to. A
    /// non-recursive function never appears in its own callees; a
    /// recursive one does, since its self-call resolves to itself.
    pub fn find_callees(&self, def_id: SymbolId, include_methods: bool) -> ResolvedQuery<SymbolDef> {
        let Some(def) = self.index.symbol(def_id) else { return ResolvedQuery::empty() };
        let mut callees = Vec::new();
        let mut seen = HashSet::new();
        for call in self.index.calls_in_file(def.file) {
            if !def.range.contains_line(call.line) {
                continue;
            }
            for resolved in self.resolve_call(call) {
                if (include_methods || !resolved.is_method) && seen.insert(resolved.id) {
                    callees.push(resolved.clone());
                }
            }
        }
        ResolvedQuery { items: callees, warnings: Vec::new() }
    }

    /// `context(name)`: callers/callees for a function-like def, or the
    /// method roster for a type.
    pub fn context(&self, name: &str) -> Option<ContextResult> {
        let defs = self.index.defs_by_name(name);
        let def = (*defs.first()?).clone();
        if def.kind.is_type_like() {
            let methods: Vec<SymbolDef> = self
                .index
                .all_defs()
                .filter(|d| d.is_method && (d.class_name.as_deref() == Some(name) || d.receiver.as_deref() == Some(name)))
                .cloned()
                .collect();
            Some(ContextResult::Type { def, methods })
        } else {
            let callers = self.find_callers(name, true).items;
            let callees = self.find_callees(def.id, true).items;
            Some(ContextResult::Function { def, callers, callees })
        }
    }

    /// `smart(name)`: the def plus its direct dependencies, excluding
    /// recursive self-reference from the dependency list.
    pub fn smart(&self, name: &str) -> Option<SmartResult> {
        let def = (*self.index.defs_by_name(name).first()?).clone();
        let callees = self.find_callees(def.id, true).items.into_iter().filter(|c| c.id != def.id).collect();
        Some(SmartResult { def, callees })
    }

    /// `trace(name, depth)`: bounded call tree. Negative depth behaves as
    /// zero; a cycle guard stops a recursive chain from looping forever.
    pub fn trace(&self, name: &str, depth: i64) -> Option<CallTreeNode> {
        let depth = (depth.max(0) as usize).min(self.config.trace_max_depth);
        let def = (*self.index.defs_by_name(name).first()?).clone();
        let mut visited = HashSet::new();
        Some(self.build_call_tree(&def, depth, &mut visited))
    }

    fn build_call_tree(&self, def: &SymbolDef, depth: usize, visited: &mut HashSet<SymbolId>) -> CallTreeNode {
        let file_path = self.index.file(def.file).map(|f| f.relative_path.to_string()).unwrap_or_default();
        let mut node = CallTreeNode {
            name: def.name.to_string(),
            file: file_path,
            line: def.range.start_line,
            children: Vec::new(),
        };
        if depth == 0 || !visited.insert(def.id) {
            return node;
        }
        for callee in self.find_callees(def.id, true).items {
            if !visited.contains(&callee.id) {
                node.children.push(self.build_call_tree(&callee, depth - 1, visited));
            }
        }
        visited.remove(&def.id);
        node
    }

    /// `impact(name)`: reverse-reachable callers within a bounded BFS,
    /// `impact_max_depth` layers deep. `None` only when `name` is unknown.
    pub fn impact(&self, name: &str) -> Option<ImpactResult> {
        let def = (*self.index.defs_by_name(name).first()?).clone();
        let max_depth = self.config.impact_max_depth;
        let mut seen = HashSet::new();
        seen.insert(def.id);
        let mut impacted = Vec::new();
        let mut frontier = vec![def.id];
        let mut truncated = false;

        for layer in 0..max_depth {
            let mut next = Vec::new();
            for id in &frontier {
                let Some(d) = self.index.symbol(*id) else { continue };
                for caller in self.find_callers(d.name.as_ref(), true).items {
                    if seen.insert(caller.id) {
                        next.push(caller.id);
                        impacted.push(caller);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            if layer + 1 == max_depth && !next.is_empty() {
                truncated = true;
            }
            frontier = next;
        }

        Some(ImpactResult { def, impacted, truncated })
    }

    /// `deadcode(include_exported)`: defs no call site, import, export, or
    /// rule-4 callback reference mentions anywhere, excluding recognized
    /// language entry points.
    pub fn deadcode(&self, include_exported: bool) -> Vec<SymbolDef> {
        let exported_names: HashSet<&str> = self.index.exports().iter().map(|e| e.exported_name.as_ref()).collect();
        let callback_names = self.all_callback_names();
        self.index
            .all_defs()
            .filter(|def| {
                if def.is_entry_point() {
                    return false;
                }
                if !include_exported && exported_names.contains(def.name.as_ref()) {
                    return false;
                }
                if callback_names.contains(def.name.as_ref()) {
                    return false;
                }
                !self.index.is_mentioned_anywhere(def.name.as_ref())
            })
            .cloned()
            .collect()
    }

    fn all_callback_names(&self) -> HashSet<String> {
        let mut names = HashSet::new();
        for file in self.index.files() {
            let Ok(code) = fs::read_to_string(&file.path) else { continue };
            for (ident, ..) in classifier::find_callback_candidates(file.language, &code) {
                names.insert(ident);
            }
        }
        names
    }

    /// `verify(name)`: for every call site resolving to `name`, compare
    /// the apparent argument count against the declared parameter count.
    /// Spread/variadic forms on either side are uncertain, never a
    /// mismatch.
    pub fn verify(&self, name: &str) -> Vec<VerifyIssue> {
        let Some(def) = self.index.defs_by_name(name).into_iter().next() else {
            return Vec::new();
        };
        let (declared, declared_uncertain) = count_declared_params(def.params.as_ref(), def.is_method);
        let mut issues = Vec::new();

        for call in self.index.all_calls() {
            if !self.resolve_call(call).iter().any(|d| d.id == def.id) {
                continue;
            }
            let Some(file) = self.index.file(call.file) else { continue };
            let Ok(code) = fs::read_to_string(&file.path) else { continue };
            let call_args = classifier::count_call_arguments(file.language, &code, call.line, call.column);
            let (apparent, call_uncertain) = match call_args {
                Some((count, uncertain)) => (Some(count), uncertain),
                None => (None, true),
            };
            let uncertain = declared_uncertain || call_uncertain || apparent.is_none();
            let mismatch = !uncertain && apparent != Some(declared);
            issues.push(VerifyIssue {
                caller_file: file.relative_path.to_string(),
                line: call.line,
                declared_params: declared,
                apparent_args: apparent,
                uncertain,
                mismatch,
            });
        }
        issues
    }

    /// `resolveSymbol(name)`: the first def by name, flagged if ambiguous.
    pub fn resolve_symbol(&self, name: &str) -> Option<ResolvedSymbol> {
        let defs = self.index.defs_by_name(name);
        let def = (*defs.first()?).clone();
        Some(ResolvedSymbol { def, warnings: Self::ambiguity_warning(name, &defs) })
    }

    /// `typedef(name)`: every type-like def (class/struct/interface/
    /// trait/enum/type alias) named `name`.
    pub fn typedef(&self, name: &str) -> Vec<SymbolDef> {
        self.index
            .defs_by_name(name)
            .into_iter()
            .filter(|d| d.kind.is_type_like() || d.kind == SymbolKind::TypeAlias)
            .cloned()
            .collect()
    }

    /// `imports(file)`: every import edge whose importing file matches.
    pub fn imports(&self, file: FileId) -> Vec<&ImportEdge> {
        self.index.imports().iter().filter(|e| e.importing_file == file).collect()
    }

    /// `exporters(file)`: files whose imports resolve to `file`.
    pub fn exporters(&self, file: FileId) -> Vec<&crate::indexing::FileRecord> {
        self.index
            .imports()
            .iter()
            .filter(|e| e.resolved_file == Some(file))
            .filter_map(|e| self.index.file(e.importing_file))
            .collect()
    }

    /// `fileExports(file)`: every export recorded for `file`.
    pub fn file_exports(&self, file: FileId) -> Vec<&ExportRecord> {
        self.index.exports().iter().filter(|e| e.file == file).collect()
    }

    /// `tests(name)`: defs that look like test functions whose body
    /// mentions `name` (usage-index membership), plus any test function
    /// whose own name textually references `name`.
    pub fn tests(&self, name: &str) -> Vec<SymbolDef> {
        self.index
            .all_defs()
            .filter(|d| is_test_def(d))
            .filter(|d| d.name.as_ref().contains(name) || !self.index.usage_lines(d.file, name).is_empty())
            .cloned()
            .collect()
    }

    /// `stacktrace(text)`: parse `file:line`-shaped frames out of free
    /// text and match each to an indexed file by longest path suffix.
    pub fn stacktrace(&self, text: &str) -> Vec<StackFrame> {
        text.lines().filter_map(|line| self.parse_stack_frame(line)).collect()
    }

    fn parse_stack_frame(&self, line: &str) -> Option<StackFrame> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }
        let (path_part, line_no) = extract_path_and_line(trimmed)?;
        let matched_file = self
            .index
            .files()
            .filter(|f| path_suffix_matches(f.relative_path.as_ref(), &path_part))
            .max_by_key(|f| f.relative_path.as_ref().len());
        Some(StackFrame {
            raw: trimmed.to_string(),
            file: matched_file.map(|f| f.relative_path.to_string()),
            line: line_no,
            matched: matched_file.is_some(),
        })
    }

    /// `graph(file, direction, depth)`: bounded import-reachability tree.
    /// Negative depth behaves as zero; a visited set prevents import
    /// cycles from recursing forever.
    pub fn graph(&self, file: FileId, direction: GraphDirection, depth: i64) -> Option<GraphNode> {
        let root = self.index.file(file)?;
        let depth = depth.max(0) as usize;
        let mut visited = HashSet::new();
        Some(self.build_graph_node(root.id, root.relative_path.to_string(), direction, depth, &mut visited))
    }

    fn build_graph_node(
        &self,
        file: FileId,
        path: String,
        direction: GraphDirection,
        depth: usize,
        visited: &mut HashSet<FileId>,
    ) -> GraphNode {
        let mut node = GraphNode { file: path, children: Vec::new() };
        if depth == 0 || !visited.insert(file) {
            return node;
        }
        let next_files: Vec<(FileId, String)> = match direction {
            GraphDirection::Dependencies => self
                .imports(file)
                .into_iter()
                .filter_map(|e| e.resolved_file)
                .filter_map(|fid| self.index.file(fid).map(|f| (fid, f.relative_path.to_string())))
                .collect(),
            GraphDirection::Dependents => self.exporters(file).into_iter().map(|f| (f.id, f.relative_path.to_string())).collect(),
        };
        for (fid, fpath) in next_files {
            if !visited.contains(&fid) {
                node.children.push(self.build_graph_node(fid, fpath, direction, depth - 1, visited));
            }
        }
        visited.remove(&file);
        node
    }
}

fn is_test_def(def: &SymbolDef) -> bool {
    def.modifiers.iter().any(|m| {
        let m = m.as_ref();
        m == "test" || m == "#[test]" || m.eq_ignore_ascii_case("@Test")
    }) || def.name.as_ref().starts_with("test_")
        || def.name.as_ref().starts_with("Test")
}

/// Declared parameter count from a raw, unparsed parameter-list string.
/// Bracket-depth-aware comma counting, tolerant of generics/defaults/type
/// annotations. A leading `self`/`cls` on a method is implicit at call
/// sites and is not counted. Detects `...`/`*args`/`**kwargs`/`params `
/// textually and flags the count as a lower bound rather than exact.
fn count_declared_params(params_text: &str, is_method: bool) -> (usize, bool) {
    let trimmed = params_text.trim();
    let inner = trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')).unwrap_or(trimmed).trim();
    if inner.is_empty() {
        return (0, false);
    }

    let uncertain = inner.contains("...") || inner.contains("*args") || inner.contains("**kwargs") || inner.contains("params ");

    let mut depth = 0i32;
    let mut parts = 1usize;
    for c in inner.chars() {
        match c {
            '(' | '[' | '<' | '{' => depth += 1,
            ')' | ']' | '>' | '}' => depth -= 1,
            ',' if depth == 0 => parts += 1,
            _ => {}
        }
    }

    if is_method {
        let first = inner.split(',').next().unwrap_or("").trim();
        let first_name = first.split(':').next().unwrap_or(first).trim().trim_start_matches('&').trim_start_matches("mut ").trim();
        if first_name == "self" || first_name == "cls" {
            parts = parts.saturating_sub(1);
        }
    }

    (parts, uncertain)
}

/// Pulls a `path:line` (or `path:line:col`, or `at path:line`) shape out
/// of a stack-trace line. Accepts the last colon-separated numeric group
/// as the line number.
fn extract_path_and_line(line: &str) -> Option<(String, Option<u32>)> {
    let candidate = line.rsplit(['(', ' ']).next().unwrap_or(line);
    let candidate = candidate.trim_end_matches(')');
    let mut segments: Vec<&str> = candidate.split(':').collect();
    if segments.len() < 2 {
        return None;
    }
    let mut line_no = None;
    // A trailing numeric segment might be a column (`path:line:col`); if
    // the segment before it is also numeric, that one is the real line.
    if let Ok(maybe_col) = segments.last().unwrap().parse::<u32>() {
        segments.pop();
        if segments.len() > 1 {
            if let Ok(n) = segments.last().unwrap().parse::<u32>() {
                line_no = Some(n);
                segments.pop();
            } else {
                line_no = Some(maybe_col);
            }
        } else {
            line_no = Some(maybe_col);
        }
    }
    let path = segments.join(":");
    if path.is_empty() || !path.contains(['/', '\\', '.']) {
        return None;
    }
    Some((path, line_no))
}

fn path_suffix_matches(indexed: &str, frame_path: &str) -> bool {
    let indexed = indexed.replace('\\', "/");
    let frame_path = frame_path.replace('\\', "/");
    indexed.ends_with(&frame_path) || frame_path.ends_with(&indexed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn build(dir: &TempDir) -> SimpleIndexer {
        let mut idx = SimpleIndexer::new(dir.path(), Arc::new(Settings::default()));
        idx.build(false).unwrap();
        idx
    }

    #[test]
    fn test_find_callers_direct_call() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("lib.rs"), "fn helper() {}\nfn caller() { helper(); }\n").unwrap();
        let idx = build(&dir);
        let config = ResolutionConfig::default();
        let engine = ResolutionEngine::new(&idx, &config);
        let result = engine.find_callers("helper", true);
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0].name.as_ref(), "caller");
    }

    #[test]
    fn test_find_callees_excludes_self_for_non_recursive() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("lib.rs"), "fn a() { b(); }\nfn b() {}\n").unwrap();
        let idx = build(&dir);
        let config = ResolutionConfig::default();
        let engine = ResolutionEngine::new(&idx, &config);
        let a = idx.defs_by_name("a")[0];
        let callees = engine.find_callees(a.id, true).items;
        assert!(callees.iter().all(|c| c.id != a.id));
        assert!(callees.iter().any(|c| c.name.as_ref() == "b"));
    }

    #[test]
    fn test_recursive_function_appears_in_own_callees() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("lib.rs"), "fn fact(n: u32) -> u32 { if n == 0 { 1 } else { n * fact(n - 1) } }\n").unwrap();
        let idx = build(&dir);
        let config = ResolutionConfig::default();
        let engine = ResolutionEngine::new(&idx, &config);
        let fact = idx.defs_by_name("fact")[0];
        let callees = engine.find_callees(fact.id, true).items;
        assert!(callees.iter().any(|c| c.id == fact.id));
    }

    #[test]
    fn test_trace_depth_zero_has_no_children() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("lib.rs"), "fn a() { b(); }\nfn b() {}\n").unwrap();
        let idx = build(&dir);
        let config = ResolutionConfig::default();
        let engine = ResolutionEngine::new(&idx, &config);
        let tree = engine.trace("a", 0).unwrap();
        assert!(tree.children.is_empty());
    }

    #[test]
    fn test_trace_negative_depth_behaves_as_zero() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("lib.rs"), "fn a() { b(); }\nfn b() {}\n").unwrap();
        let idx = build(&dir);
        let config = ResolutionConfig::default();
        let engine = ResolutionEngine::new(&idx, &config);
        let tree = engine.trace("a", -5).unwrap();
        assert!(tree.children.is_empty());
    }

    #[test]
    fn test_deadcode_excludes_entry_points_and_mentioned_symbols() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.rs"), "fn main() { used(); }\nfn used() {}\nfn orphan() {}\n").unwrap();
        let idx = build(&dir);
        let config = ResolutionConfig::default();
        let engine = ResolutionEngine::new(&idx, &config);
        let dead = engine.deadcode(false);
        assert!(dead.iter().any(|d| d.name.as_ref() == "orphan"));
        assert!(!dead.iter().any(|d| d.name.as_ref() == "main"));
        assert!(!dead.iter().any(|d| d.name.as_ref() == "used"));
    }

    #[test]
    fn test_verify_detects_argument_count_mismatch() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("lib.rs"), "fn needs_two(a: i32, b: i32) {}\nfn caller() { needs_two(1); }\n").unwrap();
        let idx = build(&dir);
        let config = ResolutionConfig::default();
        let engine = ResolutionEngine::new(&idx, &config);
        let issues = engine.verify("needs_two");
        assert_eq!(issues.len(), 1);
        assert!(issues[0].mismatch);
        assert_eq!(issues[0].declared_params, 2);
        assert_eq!(issues[0].apparent_args, Some(1));
    }

    #[test]
    fn test_verify_matching_call_is_not_a_mismatch() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("lib.rs"), "fn needs_two(a: i32, b: i32) {}\nfn caller() { needs_two(1, 2); }\n").unwrap();
        let idx = build(&dir);
        let config = ResolutionConfig::default();
        let engine = ResolutionEngine::new(&idx, &config);
        let issues = engine.verify("needs_two");
        assert_eq!(issues.len(), 1);
        assert!(!issues[0].mismatch);
    }

    #[test]
    fn test_count_declared_params_drops_leading_self() {
        let (count, uncertain) = count_declared_params("(&self, x: i32)", true);
        assert_eq!(count, 1);
        assert!(!uncertain);
    }

    #[test]
    fn test_count_declared_params_detects_variadic() {
        let (_, uncertain) = count_declared_params("(*args, **kwargs)", false);
        assert!(uncertain);
    }

    #[test]
    fn test_impact_unknown_symbol_is_none() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("lib.rs"), "fn a() {}\n").unwrap();
        let idx = build(&dir);
        let config = ResolutionConfig::default();
        let engine = ResolutionEngine::new(&idx, &config);
        assert!(engine.impact("nope").is_none());
    }

    #[test]
    fn test_usages_excludes_builtin_receiver_calls() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("app.js"),
            "function process(x) {}\nfunction caller(svc) { svc.process(); JSON.parse('{}'); process(1); }\n",
        )
        .unwrap();
        let idx = build(&dir);
        let config = ResolutionConfig::default();
        let engine = ResolutionEngine::new(&idx, &config);
        let sites = engine.usages("process");
        assert_eq!(sites.len(), 1);
    }

    #[test]
    fn test_stacktrace_matches_indexed_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("lib.rs"), "fn a() {}\n").unwrap();
        let idx = build(&dir);
        let config = ResolutionConfig::default();
        let engine = ResolutionEngine::new(&idx, &config);
        let frames = engine.stacktrace("  at lib.rs:1:5\nnot a frame at all");
        assert_eq!(frames.len(), 1);
        assert!(frames[0].matched);
        assert_eq!(frames[0].line, Some(1));
    }

    #[test]
    fn test_python_super_call_resolves_to_base_method() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("shapes.py"),
            "class Shape:\n    def describe(self):\n        return \"shape\"\n\nclass Circle(Shape):\n    def describe(self):\n        return super().describe()\n",
        )
        .unwrap();
        let idx = build(&dir);
        let config = ResolutionConfig::default();
        let engine = ResolutionEngine::new(&idx, &config);

        let circle_describe = idx
            .defs_by_name("describe")
            .into_iter()
            .find(|d| d.class_name.as_deref() == Some("Circle"))
            .unwrap();
        let callees = engine.find_callees(circle_describe.id, true);
        assert!(callees.items.iter().any(|d| d.class_name.as_deref() == Some("Shape")));
        assert!(!callees.items.iter().any(|d| d.class_name.as_deref() == Some("Circle")));
    }
}
