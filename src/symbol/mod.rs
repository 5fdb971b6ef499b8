//! The symbol-level data model: definitions, call sites and the edges
//! (imports, exports, aliases, inheritance) the resolution engine walks.

use crate::types::{CompactString, FileId, Range, SymbolId, SymbolKind};
use serde::{Deserialize, Serialize};

/// A definition of a name: a function, method, type, or type alias.
///
/// `(file, start_line, name)` uniquely identifies a definition within one
/// build. A method carries exactly one of `receiver` (Go/Rust-style,
/// defined outside the type body) or `class_name` (JS/TS/Python/Java-style,
/// defined inside the type body) — never both, never neither.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolDef {
    pub id: SymbolId,
    pub name: CompactString,
    pub kind: SymbolKind,
    pub file: FileId,
    pub relative_path: CompactString,
    pub range: Range,
    /// Raw parameter list text, preserved verbatim (no truncation — object
    /// and generic parameter lists must round-trip byte-for-byte).
    pub params: CompactString,
    pub return_type: Option<CompactString>,
    pub generics: Option<CompactString>,
    pub modifiers: Vec<CompactString>,
    pub docstring: Option<CompactString>,
    /// Source column of the defining keyword; 0 means top-level.
    pub indent: u16,
    pub is_method: bool,
    /// Go/Rust: the method's receiver type, e.g. `*Server` or `&mut Index`.
    pub receiver: Option<CompactString>,
    /// JS/TS/Python/Java: the enclosing class name for an inline method.
    pub class_name: Option<CompactString>,
}

impl SymbolDef {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: SymbolId,
        name: impl Into<CompactString>,
        kind: SymbolKind,
        file: FileId,
        relative_path: impl Into<CompactString>,
        range: Range,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            file,
            relative_path: relative_path.into(),
            range,
            params: CompactString::from(""),
            return_type: None,
            generics: None,
            modifiers: Vec::new(),
            docstring: None,
            indent: 0,
            is_method: false,
            receiver: None,
            class_name: None,
        }
    }

    pub fn with_params(mut self, params: impl Into<CompactString>) -> Self {
        self.params = params.into();
        self
    }

    pub fn with_return_type(mut self, t: impl Into<CompactString>) -> Self {
        self.return_type = Some(t.into());
        self
    }

    pub fn with_modifiers(mut self, modifiers: Vec<CompactString>) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_docstring(mut self, doc: impl Into<CompactString>) -> Self {
        self.docstring = Some(doc.into());
        self
    }

    pub fn as_method_of_receiver(mut self, receiver: impl Into<CompactString>) -> Self {
        self.is_method = true;
        self.receiver = Some(receiver.into());
        self
    }

    pub fn as_method_of_class(mut self, class_name: impl Into<CompactString>) -> Self {
        self.is_method = true;
        self.class_name = Some(class_name.into());
        self
    }

    pub fn with_indent(mut self, indent: u16) -> Self {
        self.indent = indent;
        self
    }

    /// Whether `line` is a recognized language entry point invoked by the
    /// runtime without the code naming it, used by `deadcode`.
    pub fn is_entry_point(&self) -> bool {
        let name = self.name.as_ref();
        if name == "main" || name == "init" {
            return true;
        }
        if name.starts_with("__") && name.ends_with("__") {
            return true; // Python dunder methods: __init__, __call__, __enter__, ...
        }
        if self.modifiers.iter().any(|m| m.as_ref() == "test" || m.as_ref() == "#[test]") {
            return true;
        }
        false
    }
}

/// A normalized textual receiver on a call/method expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Receiver {
    /// `self` / `this` / `cls`.
    SelfRef,
    Named(CompactString),
}

impl Receiver {
    pub fn from_text(text: &str) -> Self {
        match text {
            "self" | "this" | "cls" => Receiver::SelfRef,
            other => Receiver::Named(other.into()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Receiver::SelfRef => "self",
            Receiver::Named(s) => s.as_ref(),
        }
    }
}

/// A syntactic call expression. `receiver` is never resolved to a type
/// here — resolution is the resolution engine's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSite {
    pub name: CompactString,
    pub file: FileId,
    pub line: u32,
    pub column: u16,
    pub receiver: Option<Receiver>,
    /// The enclosing `SymbolDef`, resolved by line-range containment, not
    /// by static scope.
    pub containing_def: Option<SymbolId>,
}

impl CallSite {
    pub fn new(name: impl Into<CompactString>, file: FileId, line: u32, column: u16) -> Self {
        Self {
            name: name.into(),
            file,
            line,
            column,
            receiver: None,
            containing_def: None,
        }
    }

    pub fn with_receiver(mut self, receiver: Receiver) -> Self {
        self.receiver = Some(receiver);
        self
    }
}

/// `(importingFile, module, importedNames, resolvedFile?, isExternal)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportEdge {
    pub importing_file: FileId,
    pub module: CompactString,
    pub imported_names: Vec<CompactString>,
    pub resolved_file: Option<FileId>,
    pub is_external: bool,
}

/// `(file, exportedName, kind)`. Re-exports (`export { X } from './other'`)
/// carry `reexported_from`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub file: FileId,
    pub exported_name: CompactString,
    pub kind: SymbolKind,
    pub reexported_from: Option<CompactString>,
}

/// File-local `localName -> canonicalName` binding. Only the first binding
/// of a reassigned alias is tracked; cross-file chains are never traversed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AliasEdge {
    pub file: FileId,
    pub local_name: CompactString,
    pub canonical_name: CompactString,
}

/// `childClass -> parentClass`, cross-file; parent is resolved through
/// import aliases by the index builder before this edge is recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InheritanceEdge {
    pub child: CompactString,
    pub child_file: FileId,
    pub parent: CompactString,
    /// Position in the child's `extends`/base-class list; first parent
    /// first, used for Python MRO-style traversal.
    pub order: u16,
}

/// One file's entry in the on-disk calls cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallsCacheEntry {
    pub file: CompactString,
    pub mtime: u64,
    pub sha256: CompactString,
    pub calls: Vec<CallSite>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FileId, Range, SymbolId};

    #[test]
    fn test_symbol_def_entry_point_detection() {
        let id = SymbolId::new(1).unwrap();
        let file = FileId::new(1).unwrap();
        let main_fn = SymbolDef::new(id, "main", SymbolKind::Function, file, "main.go", Range::new(1, 0, 3, 1));
        assert!(main_fn.is_entry_point());

        let dunder = SymbolDef::new(id, "__init__", SymbolKind::Method, file, "a.py", Range::new(1, 0, 3, 1));
        assert!(dunder.is_entry_point());

        let plain = SymbolDef::new(id, "helper", SymbolKind::Function, file, "a.py", Range::new(1, 0, 3, 1));
        assert!(!plain.is_entry_point());
    }

    #[test]
    fn test_receiver_normalizes_self_variants() {
        assert_eq!(Receiver::from_text("self"), Receiver::SelfRef);
        assert_eq!(Receiver::from_text("this"), Receiver::SelfRef);
        assert_eq!(Receiver::from_text("cls"), Receiver::SelfRef);
        assert_eq!(Receiver::from_text("svc"), Receiver::Named("svc".into()));
    }

    #[test]
    fn test_symbol_def_method_has_exactly_one_of_receiver_or_class() {
        let id = SymbolId::new(1).unwrap();
        let file = FileId::new(1).unwrap();
        let m = SymbolDef::new(id, "process", SymbolKind::Method, file, "a.rs", Range::new(1, 0, 1, 10))
            .as_method_of_receiver("*Server");
        assert!(m.receiver.is_some());
        assert!(m.class_name.is_none());
    }
}
