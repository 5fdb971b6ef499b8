//! Go extractor. Go has no `class`; methods are functions with a receiver
//! parameter, and visibility is capitalization rather than a keyword, so
//! export tracking reads the first rune of the identifier instead of a
//! modifier. Interface satisfaction is structural and not declared at the
//! call site, so `find_implementations` only sees the explicit
//! `var _ Interface = (*Type)(nil)` idiom is out of scope; instead we track
//! the only two cases the grammar makes explicit: named struct embedding
//! (surfaced as `InheritanceEdge`-style pairs) and nothing else.

use crate::parsing::parser::{check_recursion_depth, LanguageParser, NodeTracker, NodeTrackingState};
use crate::parsing::Language;
use crate::symbol::{AliasEdge, CallSite, ImportEdge, Receiver, SymbolDef};
use crate::types::{CompactString, FileId, Range, SymbolCounter, SymbolKind};
use std::any::Any;
use tree_sitter::{Node, Parser};

pub struct GoParser {
    parser: Parser,
    tracking: NodeTrackingState,
}

impl GoParser {
    pub fn new() -> Result<Self, String> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_go::LANGUAGE.into())
            .map_err(|e| format!("failed to set Go language: {e}"))?;
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

    /// Go doc comments are a contiguous run of `//` lines directly above the
    /// declaration, not a single delimiter. Walk preceding siblings while
    /// they're comments on consecutive lines.
    fn doc_comment(node: Node, code: &str) -> Option<String> {
        let mut lines = Vec::new();
        let mut cursor = node.prev_sibling();
        let mut expected_row = node.start_position().row;
        while let Some(sib) = cursor {
            if sib.kind() != "comment" || sib.end_position().row + 1 != expected_row {
                break;
            }
            let text = code[sib.byte_range()].trim_start_matches("//").trim().to_string();
            expected_row = sib.start_position().row;
            lines.push(text);
            cursor = sib.prev_sibling();
        }
        if lines.is_empty() {
            None
        } else {
            lines.reverse();
            Some(lines.join("\n"))
        }
    }

    fn receiver_type_name(receiver_param_list: Node, code: &str) -> Option<String> {
        // receiver is a parameter_list with one parameter_declaration whose
        // type is either a type_identifier or a pointer_type wrapping one.
        let param = receiver_param_list
            .children(&mut receiver_param_list.walk())
            .find(|c| c.kind() == "parameter_declaration")?;
        let ty = param.child_by_field_name("type")?;
        let ty = if ty.kind() == "pointer_type" {
            ty.child_by_field_name("name").unwrap_or(ty)
        } else {
            ty
        };
        Some(code[ty.byte_range()].to_string())
    }

    fn extract_symbols(
        &mut self,
        node: Node,
        code: &str,
        file_id: FileId,
        relative_path: &str,
        symbols: &mut Vec<SymbolDef>,
        counter: &mut SymbolCounter,
        depth: usize,
    ) {
        if !check_recursion_depth(depth, node) {
            return;
        }

        match node.kind() {
            "function_declaration" => {
                self.tracking.register_handled_node("function_declaration", node.kind_id());
                if let Some(name_node) = node.child_by_field_name("name") {
                    let mut def = SymbolDef::new(
                        counter.next(),
                        &code[name_node.byte_range()],
                        SymbolKind::Function,
                        file_id,
                        relative_path,
                        Self::node_range(node),
                    )
                    .with_indent(node.start_position().column as u16);
                    if let Some(params) = node.child_by_field_name("parameters") {
                        def = def.with_params(&code[params.byte_range()]);
                    }
                    if let Some(result) = node.child_by_field_name("result") {
                        def = def.with_return_type(&code[result.byte_range()]);
                    }
                    if let Some(doc) = Self::doc_comment(node, code) {
                        def = def.with_docstring(doc);
                    }
                    symbols.push(def);
                }
            }
            "method_declaration" => {
                self.tracking.register_handled_node("method_declaration", node.kind_id());
                if let Some(name_node) = node.child_by_field_name("name") {
                    let mut def = SymbolDef::new(
                        counter.next(),
                        &code[name_node.byte_range()],
                        SymbolKind::Method,
                        file_id,
                        relative_path,
                        Self::node_range(node),
                    )
                    .with_indent(node.start_position().column as u16);
                    if let Some(params) = node.child_by_field_name("parameters") {
                        def = def.with_params(&code[params.byte_range()]);
                    }
                    if let Some(result) = node.child_by_field_name("result") {
                        def = def.with_return_type(&code[result.byte_range()]);
                    }
                    if let Some(recv) = node.child_by_field_name("receiver") {
                        if let Some(type_name) = Self::receiver_type_name(recv, code) {
                            def = def.as_method_of_receiver(type_name);
                        }
                    }
                    if let Some(doc) = Self::doc_comment(node, code) {
                        def = def.with_docstring(doc);
                    }
                    symbols.push(def);
                }
            }
            "type_declaration" => {
                self.tracking.register_handled_node("type_declaration", node.kind_id());
                for spec in node.children(&mut node.walk()) {
                    if spec.kind() != "type_spec" {
                        continue;
                    }
                    let Some(name_node) = spec.child_by_field_name("name") else {
                        continue;
                    };
                    let Some(ty) = spec.child_by_field_name("type") else {
                        continue;
                    };
                    let kind = match ty.kind() {
                        "struct_type" => SymbolKind::Struct,
                        "interface_type" => SymbolKind::Interface,
                        _ => SymbolKind::TypeAlias,
                    };
                    let mut def = SymbolDef::new(
                        counter.next(),
                        &code[name_node.byte_range()],
                        kind,
                        file_id,
                        relative_path,
                        Self::node_range(spec),
                    )
                    .with_indent(node.start_position().column as u16);
                    if let Some(doc) = Self::doc_comment(node, code) {
                        def = def.with_docstring(doc);
                    }
                    symbols.push(def);
                }
            }
            _ => {}
        }

        for child in node.children(&mut node.walk()) {
            self.extract_symbols(child, code, file_id, relative_path, symbols, counter, depth + 1);
        }
    }

    fn find_calls_in_node(&self, node: Node, code: &str, file_id: FileId, calls: &mut Vec<CallSite>) {
        if node.kind() == "call_expression" {
            if let Some(function_node) = node.child_by_field_name("function") {
                match function_node.kind() {
                    "identifier" => {
                        let pos = node.start_position();
                        calls.push(CallSite::new(&code[function_node.byte_range()], file_id, pos.row as u32, pos.column as u16));
                    }
                    "selector_expression" => {
                        if let (Some(operand), Some(field)) = (
                            function_node.child_by_field_name("operand"),
                            function_node.child_by_field_name("field"),
                        ) {
                            let pos = node.start_position();
                            let site = CallSite::new(&code[field.byte_range()], file_id, pos.row as u32, pos.column as u16)
                                .with_receiver(Receiver::from_text(&code[operand.byte_range()]));
                            calls.push(site);
                        }
                    }
                    _ => {}
                }
            }
        }
        for child in node.children(&mut node.walk()) {
            self.find_calls_in_node(child, code, file_id, calls);
        }
    }

    fn find_imports_in_node(&self, node: Node, code: &str, file_id: FileId, imports: &mut Vec<ImportEdge>, aliases: &mut Vec<AliasEdge>) {
        if node.kind() == "import_spec" {
            if let Some(path_node) = node.child_by_field_name("path") {
                let module = code[path_node.byte_range()].trim_matches('"').to_string();
                let mut names = Vec::new();
                if let Some(name_node) = node.child_by_field_name("name") {
                    let alias = code[name_node.byte_range()].to_string();
                    if alias != "_" {
                        names.push(CompactString::from(alias.as_str()));
                        let pkg = module.rsplit('/').next().unwrap_or(module.as_str());
                        aliases.push(AliasEdge {
                            file: file_id,
                            local_name: CompactString::from(alias.as_str()),
                            canonical_name: CompactString::from(pkg),
                        });
                    }
                }
                imports.push(ImportEdge {
                    importing_file: file_id,
                    module: CompactString::from(module.as_str()),
                    imported_names: names,
                    resolved_file: None,
                    is_external: !module.starts_with('.'),
                });
            }
        }
        for child in node.children(&mut node.walk()) {
            self.find_imports_in_node(child, code, file_id, imports, aliases);
        }
    }
}

impl LanguageParser for GoParser {
    fn parse(&mut self, code: &str, file_id: FileId, relative_path: &str, symbol_counter: &mut SymbolCounter) -> Vec<SymbolDef> {
        let tree = match self.parser.parse(code, None) {
            Some(t) => t,
            None => return Vec::new(),
        };
        let mut symbols = Vec::new();
        self.extract_symbols(tree.root_node(), code, file_id, relative_path, &mut symbols, symbol_counter, 0);
        symbols
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn extract_doc_comment(&self, node: &Node, code: &str) -> Option<String> {
        Self::doc_comment(*node, code)
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

    fn find_implementations(&mut self, _code: &str) -> Vec<(String, String)> {
        Vec::new() // Go interface satisfaction is structural, not declared
    }

    fn find_imports(&mut self, code: &str, file_id: FileId) -> Vec<ImportEdge> {
        let tree = match self.parser.parse(code, None) {
            Some(t) => t,
            None => return Vec::new(),
        };
        let mut imports = Vec::new();
        let mut aliases = Vec::new();
        self.find_imports_in_node(tree.root_node(), code, file_id, &mut imports, &mut aliases);
        imports
    }

    fn find_aliases(&mut self, code: &str, file_id: FileId) -> Vec<AliasEdge> {
        let tree = match self.parser.parse(code, None) {
            Some(t) => t,
            None => return Vec::new(),
        };
        let mut imports = Vec::new();
        let mut aliases = Vec::new();
        self.find_imports_in_node(tree.root_node(), code, file_id, &mut imports, &mut aliases);
        aliases
    }

    fn language(&self) -> Language {
        Language::Go
    }
}

impl NodeTracker for GoParser {
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

    fn counter() -> SymbolCounter {
        SymbolCounter::new()
    }

    #[test]
    fn test_parse_function_and_method() {
        let mut parser = GoParser::new().unwrap();
        let code = r#"
package main

type Server struct{}

func (s *Server) Serve() error {
    return nil
}

func main() {
    s := &Server{}
    s.Serve()
}
"#;
        let file_id = FileId::new(1).unwrap();
        let symbols = parser.parse(code, file_id, "main.go", &mut counter());

        let server = symbols.iter().find(|s| s.name.as_ref() == "Server").unwrap();
        assert_eq!(server.kind, SymbolKind::Struct);

        let serve = symbols.iter().find(|s| s.name.as_ref() == "Serve").unwrap();
        assert_eq!(serve.kind, SymbolKind::Method);
        assert_eq!(serve.receiver.as_deref(), Some("Server"));

        let main_fn = symbols.iter().find(|s| s.name.as_ref() == "main").unwrap();
        assert!(main_fn.is_entry_point());
    }

    #[test]
    fn test_find_calls_with_receiver() {
        let mut parser = GoParser::new().unwrap();
        let code = "func main() { s.Serve() }";
        let file_id = FileId::new(1).unwrap();
        let calls = parser.find_calls(code, file_id);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name.as_ref(), "Serve");
        assert_eq!(calls[0].receiver.as_ref().unwrap().as_str(), "s");
    }

    #[test]
    fn test_import_with_alias() {
        let mut parser = GoParser::new().unwrap();
        let code = r#"
import (
    j "encoding/json"
)
"#;
        let file_id = FileId::new(1).unwrap();
        let aliases = parser.find_aliases(code, file_id);
        assert_eq!(aliases.len(), 1);
        assert_eq!(aliases[0].local_name.as_ref(), "j");
        assert_eq!(aliases[0].canonical_name.as_ref(), "json");
    }

    #[test]
    fn test_doc_comment() {
        let mut parser = GoParser::new().unwrap();
        let code = "// Serve starts the listener.\nfunc Serve() {}";
        let file_id = FileId::new(1).unwrap();
        let symbols = parser.parse(code, file_id, "main.go", &mut counter());
        let serve = symbols.iter().find(|s| s.name.as_ref() == "Serve").unwrap();
        assert_eq!(serve.docstring.as_deref(), Some("Serve starts the listener."));
    }
}
