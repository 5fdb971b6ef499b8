//! Rust extractor: manual recursive-descent walk over the tree-sitter-rust
//! grammar. `pub`/`pub(crate)` visibility is folded into `SymbolDef.modifiers`
//! rather than a separate export record, since Rust has no distinct export
//! statement the way JS/TS do.

use crate::parsing::parser::{check_recursion_depth, LanguageParser, NodeTracker, NodeTrackingState};
use crate::parsing::Language;
use crate::symbol::{AliasEdge, CallSite, ImportEdge, Receiver, SymbolDef};
use crate::types::{CompactString, FileId, Range, SymbolCounter, SymbolKind};
use std::any::Any;
use tree_sitter::{Node, Parser};

pub struct RustParser {
    parser: Parser,
    tracking: NodeTrackingState,
}

impl RustParser {
    pub fn new() -> Result<Self, String> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_rust::LANGUAGE.into())
            .map_err(|e| format!("failed to set Rust language: {e}"))?;
        Ok(Self {
            parser,
            tracking: NodeTrackingState::new(),
        })
    }

    fn node_range(node: Node) -> Range {
        Range::new(
            node.start_position().row as u32,
            node.start_position().column as u16,
            node.end_position().row as u32,
            node.end_position().column as u16,
        )
    }

    fn extract_type_name(&self, node: Node, code: &str) -> Option<String> {
        match node.kind() {
            "type_identifier" | "primitive_type" | "scoped_type_identifier" => {
                Some(code[node.byte_range()].to_string())
            }
            "generic_type" => node
                .child_by_field_name("type")
                .and_then(|t| self.extract_type_name(t, code)),
            "reference_type" => node
                .child_by_field_name("type")
                .and_then(|t| self.extract_type_name(t, code)),
            _ => node
                .children(&mut node.walk())
                .find_map(|c| self.extract_type_name(c, code)),
        }
    }

    fn extract_doc_comments(&self, node: &Node, code: &str) -> Option<String> {
        let mut doc_lines = Vec::new();
        let mut current = node.prev_sibling();
        while let Some(sibling) = current {
            match sibling.kind() {
                "line_comment" => {
                    if let Ok(text) = sibling.utf8_text(code.as_bytes()) {
                        if text.starts_with("///") && !text.starts_with("////") {
                            doc_lines.push(text.trim_start_matches("///").trim().to_string());
                        } else {
                            break;
                        }
                    }
                }
                "block_comment" => {
                    if let Ok(text) = sibling.utf8_text(code.as_bytes()) {
                        if text.starts_with("/**") && !text.starts_with("/***") && text != "/**/" {
                            doc_lines.push(
                                text.trim_start_matches("/**")
                                    .trim_end_matches("*/")
                                    .trim()
                                    .to_string(),
                            );
                        } else {
                            break;
                        }
                    }
                }
                _ => break,
            }
            current = sibling.prev_sibling();
        }
        if doc_lines.is_empty() {
            None
        } else {
            doc_lines.reverse();
            Some(doc_lines.join("\n"))
        }
    }

    fn visibility_modifiers(node: Node, code: &str) -> Vec<CompactString> {
        let mut mods = Vec::new();
        if let Some(vis) = node
            .children(&mut node.walk())
            .find(|c| c.kind() == "visibility_modifier")
        {
            mods.push(CompactString::from(&code[vis.byte_range()]));
        }
        mods
    }

    fn params_text(node: Node, code: &str) -> CompactString {
        node.child_by_field_name("parameters")
            .map(|p| CompactString::from(&code[p.byte_range()]))
            .unwrap_or_else(|| CompactString::from("()"))
    }

    fn generics_text(node: Node, code: &str) -> Option<CompactString> {
        node.child_by_field_name("type_parameters")
            .map(|p| CompactString::from(&code[p.byte_range()]))
    }

    fn is_test_fn(node: Node, code: &str) -> bool {
        node.prev_sibling().is_some_and(|sib| {
            sib.kind() == "attribute_item"
                && code[sib.byte_range()].contains("test")
        })
    }

    fn extract_symbols_from_node(
        &mut self,
        node: Node,
        code: &str,
        file_id: FileId,
        relative_path: &str,
        symbols: &mut Vec<SymbolDef>,
        counter: &mut SymbolCounter,
        current_impl_type: Option<&str>,
        depth: usize,
    ) {
        if !check_recursion_depth(depth, node) {
            return;
        }

        match node.kind() {
            "function_item" => {
                self.tracking.register_handled_node("function_item", node.kind_id());
                if let Some(name_node) = node.child_by_field_name("name") {
                    let name = &code[name_node.byte_range()];
                    let is_method = current_impl_type.is_some();
                    let kind = if is_method { SymbolKind::Method } else { SymbolKind::Function };
                    let mut modifiers = Self::visibility_modifiers(node, code);
                    if Self::is_test_fn(node, code) || name == "main" && !is_method {
                        if Self::is_test_fn(node, code) {
                            modifiers.push(CompactString::from("#[test]"));
                        }
                    }
                    let mut def = SymbolDef::new(
                        counter.next(),
                        name,
                        kind,
                        file_id,
                        relative_path,
                        Self::node_range(node),
                    )
                    .with_params(Self::params_text(node, code))
                    .with_modifiers(modifiers)
                    .with_indent(node.start_position().column as u16);

                    if let Some(generics) = Self::generics_text(node, code) {
                        def.generics = Some(generics);
                    }
                    if let Some(ret) = node.child_by_field_name("return_type") {
                        if let Some(t) = self.extract_type_name(ret, code) {
                            def = def.with_return_type(t);
                        }
                    }
                    if let Some(doc) = self.extract_doc_comments(&node, code) {
                        def = def.with_docstring(doc);
                    }
                    if let Some(impl_type) = current_impl_type {
                        def = def.as_method_of_receiver(impl_type);
                    }
                    symbols.push(def);
                }
            }
            "struct_item" | "enum_item" | "trait_item" | "type_item" => {
                self.tracking.register_handled_node(node.kind(), node.kind_id());
                if let Some(name_node) = node.child_by_field_name("name") {
                    let kind = match node.kind() {
                        "struct_item" => SymbolKind::Struct,
                        "enum_item" => SymbolKind::Enum,
                        "trait_item" => SymbolKind::Trait,
                        _ => SymbolKind::TypeAlias,
                    };
                    let mut def = SymbolDef::new(
                        counter.next(),
                        &code[name_node.byte_range()],
                        kind,
                        file_id,
                        relative_path,
                        Self::node_range(node),
                    )
                    .with_modifiers(Self::visibility_modifiers(node, code))
                    .with_indent(node.start_position().column as u16);
                    if let Some(generics) = Self::generics_text(node, code) {
                        def.generics = Some(generics);
                    }
                    if let Some(doc) = self.extract_doc_comments(&node, code) {
                        def = def.with_docstring(doc);
                    }
                    symbols.push(def);
                }
                // descend for enum variants / trait methods handled generically below
                for child in node.children(&mut node.walk()) {
                    self.extract_symbols_from_node(
                        child, code, file_id, relative_path, symbols, counter, current_impl_type, depth + 1,
                    );
                }
                return;
            }
            "impl_item" => {
                self.tracking.register_handled_node("impl_item", node.kind_id());
                let impl_type = node
                    .child_by_field_name("type")
                    .and_then(|t| self.extract_type_name(t, code));
                let mut def_holder = None;
                if impl_type.is_none() {
                    // can't resolve type, fall through without attributing methods
                } else {
                    let impl_name = impl_type.clone().unwrap();
                    let def = SymbolDef::new(
                        counter.next(),
                        impl_name.clone(),
                        SymbolKind::Impl,
                        file_id,
                        relative_path,
                        Self::node_range(node),
                    );
                    def_holder = Some(def);
                }
                if let Some(def) = def_holder {
                    symbols.push(def);
                }
                let impl_type_ref = impl_type.as_deref();
                for child in node.children(&mut node.walk()) {
                    self.extract_symbols_from_node(
                        child, code, file_id, relative_path, symbols, counter, impl_type_ref, depth + 1,
                    );
                }
                return;
            }
            _ => {}
        }

        for child in node.children(&mut node.walk()) {
            self.extract_symbols_from_node(
                child, code, file_id, relative_path, symbols, counter, current_impl_type, depth + 1,
            );
        }
    }

    fn find_calls_in_node(&self, node: Node, code: &str, file_id: FileId, calls: &mut Vec<CallSite>) {
        if node.kind() == "call_expression" {
            if let Some(function_node) = node.child_by_field_name("function") {
                match function_node.kind() {
                    "identifier" => {
                        let name = &code[function_node.byte_range()];
                        let pos = node.start_position();
                        calls.push(CallSite::new(name, file_id, pos.row as u32, pos.column as u16));
                    }
                    "field_expression" => {
                        if let (Some(value), Some(field)) = (
                            function_node.child_by_field_name("value"),
                            function_node.child_by_field_name("field"),
                        ) {
                            let receiver_text = &code[value.byte_range()];
                            let method_name = &code[field.byte_range()];
                            let pos = node.start_position();
                            let site = CallSite::new(method_name, file_id, pos.row as u32, pos.column as u16)
                                .with_receiver(Receiver::from_text(receiver_text));
                            calls.push(site);
                        }
                    }
                    "scoped_identifier" => {
                        let name = &code[function_node.byte_range()];
                        let pos = node.start_position();
                        calls.push(CallSite::new(name, file_id, pos.row as u32, pos.column as u16));
                    }
                    _ => {}
                }
            }
        }
        for child in node.children(&mut node.walk()) {
            self.find_calls_in_node(child, code, file_id, calls);
        }
    }

    fn find_implementations_in_node(&self, node: Node, code: &str, out: &mut Vec<(String, String)>) {
        if node.kind() == "impl_item" {
            if let (Some(trait_node), Some(type_node)) =
                (node.child_by_field_name("trait"), node.child_by_field_name("type"))
            {
                if let (Some(trait_name), Some(type_name)) = (
                    self.extract_type_name(trait_node, code),
                    self.extract_type_name(type_node, code),
                ) {
                    out.push((type_name, trait_name));
                }
            }
        }
        for child in node.children(&mut node.walk()) {
            self.find_implementations_in_node(child, code, out);
        }
    }

    fn extract_use_tree(&self, node: Node, code: &str, file_id: FileId, prefix: String, imports: &mut Vec<ImportEdge>, aliases: &mut Vec<AliasEdge>) {
        if node.kind() != "use_tree" {
            return;
        }
        let mut path = prefix.clone();
        for child in node.children(&mut node.walk()) {
            match child.kind() {
                "identifier" | "scoped_identifier" | "crate" | "self" | "super" => {
                    let segment = &code[child.byte_range()];
                    if !path.is_empty() {
                        path.push_str("::");
                    }
                    path.push_str(segment);
                }
                "use_as_clause" => {
                    if let Some(alias_node) = child.child_by_field_name("alias") {
                        let alias = &code[alias_node.byte_range()];
                        let canonical = path
                            .rsplit("::")
                            .next()
                            .unwrap_or(path.as_str())
                            .to_string();
                        aliases.push(AliasEdge {
                            file: file_id,
                            local_name: CompactString::from(alias),
                            canonical_name: CompactString::from(canonical.as_str()),
                        });
                        imports.push(ImportEdge {
                            importing_file: file_id,
                            module: CompactString::from(path.as_str()),
                            imported_names: vec![CompactString::from(alias)],
                            resolved_file: None,
                            is_external: !path.starts_with("crate") && !path.starts_with("self"),
                        });
                        return;
                    }
                }
                "use_wildcard" => {
                    imports.push(ImportEdge {
                        importing_file: file_id,
                        module: CompactString::from(path.as_str()),
                        imported_names: vec![CompactString::from("*")],
                        resolved_file: None,
                        is_external: !path.starts_with("crate") && !path.starts_with("self"),
                    });
                    return;
                }
                "use_list" => {
                    for item in child.children(&mut child.walk()) {
                        if item.kind() == "use_tree" {
                            self.extract_use_tree(item, code, file_id, path.clone(), imports, aliases);
                        }
                    }
                    return;
                }
                _ => {}
            }
        }
        if !path.is_empty() && path != prefix {
            let name = path.rsplit("::").next().unwrap_or(path.as_str()).to_string();
            imports.push(ImportEdge {
                importing_file: file_id,
                module: CompactString::from(path.as_str()),
                imported_names: vec![CompactString::from(name.as_str())],
                resolved_file: None,
                is_external: !path.starts_with("crate") && !path.starts_with("self"),
            });
        }
    }

    fn extract_imports_from_node(&self, node: Node, code: &str, file_id: FileId, imports: &mut Vec<ImportEdge>, aliases: &mut Vec<AliasEdge>) {
        if node.kind() == "use_declaration" {
            if let Some(use_tree) = node.children(&mut node.walk()).find(|n| n.kind() == "use_tree") {
                self.extract_use_tree(use_tree, code, file_id, String::new(), imports, aliases);
            }
            return;
        }
        for child in node.children(&mut node.walk()) {
            self.extract_imports_from_node(child, code, file_id, imports, aliases);
        }
    }
}

impl LanguageParser for RustParser {
    fn parse(
        &mut self,
        code: &str,
        file_id: FileId,
        relative_path: &str,
        symbol_counter: &mut SymbolCounter,
    ) -> Vec<SymbolDef> {
        let tree = match self.parser.parse(code, None) {
            Some(t) => t,
            None => return Vec::new(),
        };
        let mut symbols = Vec::new();
        self.extract_symbols_from_node(
            tree.root_node(),
            code,
            file_id,
            relative_path,
            &mut symbols,
            symbol_counter,
            None,
            0,
        );
        symbols
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn extract_doc_comment(&self, node: &Node, code: &str) -> Option<String> {
        self.extract_doc_comments(node, code)
    }

    fn find_calls(&mut self, code: &str, file_id: FileId) -> Vec<CallSite> {
        let tree = match self.parser.parse(code, None) {
            Some(t) => t,
            None => return Vec::new(),
        };
        let mut calls = Vec::new();
        self.find_calls_in_node(tree.root_node(), code, file_id, &mut calls);
        calls
    }

    fn find_implementations(&mut self, code: &str) -> Vec<(String, String)> {
        let tree = match self.parser.parse(code, None) {
            Some(t) => t,
            None => return Vec::new(),
        };
        let mut out = Vec::new();
        self.find_implementations_in_node(tree.root_node(), code, &mut out);
        out
    }

    fn find_imports(&mut self, code: &str, file_id: FileId) -> Vec<ImportEdge> {
        let tree = match self.parser.parse(code, None) {
            Some(t) => t,
            None => return Vec::new(),
        };
        let mut imports = Vec::new();
        let mut aliases = Vec::new();
        self.extract_imports_from_node(tree.root_node(), code, file_id, &mut imports, &mut aliases);
        imports
    }

    fn find_aliases(&mut self, code: &str, file_id: FileId) -> Vec<AliasEdge> {
        let tree = match self.parser.parse(code, None) {
            Some(t) => t,
            None => return Vec::new(),
        };
        let mut imports = Vec::new();
        let mut aliases = Vec::new();
        self.extract_imports_from_node(tree.root_node(), code, file_id, &mut imports, &mut aliases);
        aliases
    }

    fn language(&self) -> Language {
        Language::Rust
    }
}

// Silences `unused` for the tracker field when audit tooling isn't wired up yet.
impl NodeTracker for RustParser {
    fn get_handled_nodes(&self) -> &std::collections::HashSet<crate::parsing::parser::HandledNode> {
        self.tracking.get_handled_nodes()
    }

    fn register_handled_node(&mut self, node_kind: &str, node_id: u16) {
        self.tracking.register_handled_node(node_kind, node_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FileId;

    fn counter() -> SymbolCounter {
        SymbolCounter::new()
    }

    #[test]
    fn test_parse_simple_function() {
        let mut parser = RustParser::new().unwrap();
        let code = "fn add(a: i32, b: i32) -> i32 { a + b }";
        let file_id = FileId::new(1).unwrap();
        let symbols = parser.parse(code, file_id, "lib.rs", &mut counter());
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name.as_ref(), "add");
        assert_eq!(symbols[0].kind, SymbolKind::Function);
        assert_eq!(symbols[0].return_type.as_deref(), Some("i32"));
    }

    #[test]
    fn test_parse_struct_and_impl_method() {
        let mut parser = RustParser::new().unwrap();
        let code = r#"
            pub struct Point { x: f64, y: f64 }

            impl Point {
                pub fn new(x: f64, y: f64) -> Self {
                    Self { x, y }
                }
            }
        "#;
        let file_id = FileId::new(1).unwrap();
        let symbols = parser.parse(code, file_id, "point.rs", &mut counter());

        let point = symbols.iter().find(|s| s.name.as_ref() == "Point" && s.kind == SymbolKind::Struct).unwrap();
        assert!(point.modifiers.iter().any(|m| m.as_ref() == "pub"));

        let new_fn = symbols.iter().find(|s| s.name.as_ref() == "new").unwrap();
        assert_eq!(new_fn.kind, SymbolKind::Method);
        assert!(new_fn.is_method);
        assert_eq!(new_fn.receiver.as_deref(), Some("Point"));
        assert!(new_fn.class_name.is_none());
    }

    #[test]
    fn test_find_calls_with_method_receiver() {
        let mut parser = RustParser::new().unwrap();
        let code = r#"
            fn process(index: &Index) {
                index.rebuild();
                helper();
            }
        "#;
        let file_id = FileId::new(1).unwrap();
        let calls = parser.find_calls(code, file_id);

        let method_call = calls.iter().find(|c| c.name.as_ref() == "rebuild").unwrap();
        assert_eq!(method_call.receiver, Some(Receiver::Named("index".into())));

        let plain_call = calls.iter().find(|c| c.name.as_ref() == "helper").unwrap();
        assert!(plain_call.receiver.is_none());
    }

    #[test]
    fn test_find_implementations() {
        let mut parser = RustParser::new().unwrap();
        let code = r#"
            trait Display { fn fmt(&self) -> String; }
            struct Point { x: i32, y: i32 }
            impl Display for Point {
                fn fmt(&self) -> String { format!("{}", self.x) }
            }
        "#;
        let impls = parser.find_implementations(code);
        assert_eq!(impls, vec![("Point".to_string(), "Display".to_string())]);
    }

    #[test]
    fn test_find_imports_with_alias_and_glob() {
        let mut parser = RustParser::new().unwrap();
        let code = r#"
            use std::collections::HashMap as Map;
            use crate::symbol::*;
            use crate::types::{FileId, SymbolId};
        "#;
        let file_id = FileId::new(1).unwrap();
        let imports = parser.find_imports(code, file_id);
        assert!(imports.iter().any(|i| i.module.as_ref() == "std::collections::HashMap"));
        assert!(imports.iter().any(|i| i.imported_names[0].as_ref() == "*"));
        assert!(imports.iter().any(|i| i.module.as_ref() == "crate::types::FileId"));

        let aliases = parser.find_aliases(code, file_id);
        assert_eq!(aliases.len(), 1);
        assert_eq!(aliases[0].local_name.as_ref(), "Map");
        assert_eq!(aliases[0].canonical_name.as_ref(), "HashMap");
    }

    #[test]
    fn test_doc_comment_extraction() {
        let mut parser = RustParser::new().unwrap();
        let code = r#"
/// Adds one to the given value.
pub fn increment(x: i32) -> i32 { x + 1 }

//// Not a doc comment.
fn undocumented() {}
        "#;
        let file_id = FileId::new(1).unwrap();
        let symbols = parser.parse(code, file_id, "lib.rs", &mut counter());

        let inc = symbols.iter().find(|s| s.name.as_ref() == "increment").unwrap();
        assert_eq!(inc.docstring.as_deref(), Some("Adds one to the given value."));

        let undoc = symbols.iter().find(|s| s.name.as_ref() == "undocumented").unwrap();
        assert!(undoc.docstring.is_none());
    }
}
