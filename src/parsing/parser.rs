//! Language parser trait.
//!
//! Defines the common interface every per-language extractor implements.
//! Unlike the tuple-returning extraction methods this crate's teacher used,
//! each method here returns the typed records from [`crate::symbol`]
//! directly, since the richer data model (receivers, generics, docstrings,
//! MRO order) doesn't fit cleanly into `(&str, &str, Range)` tuples.

use crate::parsing::Language;
use crate::symbol::{AliasEdge, CallSite, ExportRecord, ImportEdge, InheritanceEdge, SymbolDef};
use crate::types::{FileId, SymbolCounter};
use std::any::Any;
use std::collections::HashSet;
use tree_sitter::Node;

/// Common interface for all language parsers.
pub trait LanguageParser: Send + Sync {
    /// Parse source code and extract every top-level and nested symbol
    /// definition, assigning ids from `symbol_counter`.
    fn parse(
        &mut self,
        code: &str,
        file_id: FileId,
        relative_path: &str,
        symbol_counter: &mut SymbolCounter,
    ) -> Vec<SymbolDef>;

    /// Enable downcasting to concrete parser types.
    fn as_any(&self) -> &dyn Any;

    /// Extract the documentation comment immediately preceding a node, in
    /// this language's doc convention (`///`/`/** */` for Rust, the first
    /// string literal for Python, JSDoc for JS/TS, `///`/XML doc comments
    /// for C#, preceding `//`/`/* */` block for Go/Java).
    fn extract_doc_comment(&self, node: &Node, code: &str) -> Option<String>;

    /// Find call sites, with receiver information when the call is a method
    /// or attribute access (`obj.method()`, `self.method()`).
    fn find_calls(&mut self, code: &str, file_id: FileId) -> Vec<CallSite>;

    /// Find interface/trait implementations. Returns `(type_name, interface_name)`
    /// pairs textually, since the `SymbolId` linkage is resolved later by the
    /// index builder once all files are parsed.
    fn find_implementations(&mut self, code: &str) -> Vec<(String, String)>;

    /// Find class/struct inheritance (`extends`, Rust has none, Go has none).
    /// Returns `(child, parent, mro_order)` triples; `mro_order` is always 0
    /// outside Python, where it reflects left-to-right base class order.
    fn find_extends(&mut self, _code: &str) -> Vec<(String, String, u16)> {
        Vec::new()
    }

    /// Find import statements.
    fn find_imports(&mut self, code: &str, file_id: FileId) -> Vec<ImportEdge>;

    /// Find export/re-export declarations. Empty by default for languages
    /// without an explicit export surface (Rust uses `pub`, folded into
    /// `SymbolDef.modifiers` instead of a separate export record).
    fn find_exports(&mut self, _code: &str, _file_id: FileId) -> Vec<ExportRecord> {
        Vec::new()
    }

    /// Find local alias bindings (`const Foo = Bar`, `import {X as Y}`,
    /// Go's `type Alias = Original`). Only the first binding per local name
    /// within a file is meaningful; later reassignment is intentionally not
    /// tracked as a warning (spec Open Question: no alias-reassignment diagnostic).
    fn find_aliases(&mut self, _code: &str, _file_id: FileId) -> Vec<AliasEdge> {
        Vec::new()
    }

    /// Get the language this parser handles.
    fn language(&self) -> Language;
}

/// Trait for creating language parsers.
pub trait ParserFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn LanguageParser>, String>;
}

/// Information about a handled AST node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandledNode {
    pub name: String,
    pub id: u16,
}

/// Extension trait for tracking which AST node kinds a parser handles, so
/// audit tooling can report coverage without a hand-maintained static list.
pub trait NodeTracker {
    fn get_handled_nodes(&self) -> &HashSet<HandledNode>;
    fn register_handled_node(&mut self, node_kind: &str, node_id: u16);
}

#[derive(Debug, Default)]
pub struct NodeTrackingState {
    handled_nodes: HashSet<HandledNode>,
}

impl NodeTrackingState {
    pub fn new() -> Self {
        Self {
            handled_nodes: HashSet::new(),
        }
    }
}

impl NodeTracker for NodeTrackingState {
    fn get_handled_nodes(&self) -> &HashSet<HandledNode> {
        &self.handled_nodes
    }

    #[inline]
    fn register_handled_node(&mut self, node_kind: &str, node_id: u16) {
        self.handled_nodes.insert(HandledNode {
            name: node_kind.to_string(),
            id: node_id,
        });
    }
}

/// Safely truncate a UTF-8 string at a character boundary. Zero-cost:
/// returns a slice, no allocation.
#[inline]
pub fn safe_truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut boundary = max_bytes;
    while boundary > 0 && !s.is_char_boundary(boundary) {
        boundary -= 1;
    }
    &s[..boundary]
}

/// Maximum recursion depth for AST traversal, chosen so 500 stack frames at
/// ~4KB each stays within a 2MB default stack.
pub const MAX_AST_DEPTH: usize = 500;

/// Guard against stack overflow on deeply nested ASTs. Parsers call this at
/// the top of their recursive extraction functions and bail on `false`.
#[inline]
pub fn check_recursion_depth(depth: usize, node: Node) -> bool {
    if depth > MAX_AST_DEPTH {
        tracing::warn!(
            "maximum AST depth ({}) exceeded at line {}:{}, skipping subtree",
            MAX_AST_DEPTH,
            node.start_position().row + 1,
            node.start_position().column + 1
        );
        return false;
    }
    true
}

/// Safely extract a substring window ending at `end_byte`, respecting UTF-8
/// character boundaries (issue #29: naive byte slicing can split an emoji).
pub fn safe_substring_window(code: &str, end_byte: usize, window_size: usize) -> &str {
    let end = end_byte.min(code.len());
    let start_raw = end.saturating_sub(window_size);
    let start = if start_raw > 0 && !code.is_char_boundary(start_raw) {
        (start_raw..=start_raw.saturating_add(3).min(end))
            .find(|&i| code.is_char_boundary(i))
            .unwrap_or(end)
    } else {
        start_raw
    };
    &code[start..end]
}

/// Truncated preview with ellipsis, for signatures and display.
#[inline]
pub fn truncate_for_display(s: &str, max_bytes: usize) -> String {
    let truncated = safe_truncate_str(s, max_bytes);
    if truncated.len() < s.len() {
        format!("{truncated}...")
    } else {
        truncated.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_truncate_with_emoji() {
        let text = "Status: \u{1F50D} Active";
        let result = safe_truncate_str(text, 10);
        assert_eq!(result, "Status: ");
        assert!(result.len() <= 10);
    }

    #[test]
    fn test_safe_truncate_exact_boundary() {
        assert_eq!(safe_truncate_str("Hello, World!", 7), "Hello, ");
    }

    #[test]
    fn test_truncate_for_display() {
        let text = "This is a very long string that needs truncation";
        assert_eq!(truncate_for_display(text, 10), "This is a ...");
        assert_eq!(truncate_for_display("Short", 10), "Short");
    }

    #[test]
    fn test_safe_substring_window_respects_boundary() {
        let code = "let x = \u{1F50D}yz;";
        let window = safe_substring_window(code, code.len(), 5);
        assert!(code.ends_with(window) || window.is_empty());
    }
}
