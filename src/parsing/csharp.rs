//! C# extractor. Classes/interfaces/structs all use `base_list` for both
//! base class and interface list, so `find_extends` treats every entry
//! uniformly and the resolution engine relies on the over-report contract
//! when a listed name happens to be both.

use crate::parsing::parser::{check_recursion_depth, LanguageParser, NodeTracker, NodeTrackingState};
use crate::parsing::Language;
use crate::symbol::{AliasEdge, CallSite, ImportEdge, Receiver, SymbolDef};
use crate::types::{CompactString, FileId, Range, SymbolCounter, SymbolKind};
use std::any::Any;
use tree_sitter::{Node, Parser};

pub struct CSharpParser {
    parser: Parser,
    tracking: NodeTrackingState,
}

impl CSharpParser {
    pub fn new() -> Result<Self, String> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_c_sharp::LANGUAGE.into())
            .map_err(|e| format!("failed to set C# language: {e}"))?;
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

    /// `///` doc comments, possibly several consecutive lines.
    fn doc_comment(node: Node, code: &str) -> Option<String> {
        let mut lines = Vec::new();
        let mut cursor = node.prev_sibling();
        let mut expected_row = node.start_position().row;
        while let Some(sib) = cursor {
            let text = &code[sib.byte_range()];
            if sib.kind() != "comment" || !text.starts_with("///") || sib.end_position().row + 1 != expected_row {
                break;
            }
            lines.push(text.trim_start_matches("///").trim().to_string());
            expected_row = sib.start_position().row;
            cursor = sib.prev_sibling();
        }
        if lines.is_empty() {
            None
        } else {
            lines.reverse();
            Some(lines.join("\n"))
        }
    }

    fn modifiers_of(node: Node, code: &str) -> Vec<CompactString> {
        node.children(&mut node.walk())
            .filter(|c| matches!(c.kind(), "modifier"))
            .map(|c| CompactString::from(&code[c.byte_range()]))
            .collect()
    }

    fn extract_symbols(
        &mut self,
        node: Node,
        code: &str,
        file_id: FileId,
        relative_path: &str,
        symbols: &mut Vec<SymbolDef>,
        counter: &mut SymbolCounter,
        current_class: Option<&str>,
        depth: usize,
    ) {
        if !check_recursion_depth(depth, node) {
            return;
        }

        match node.kind() {
            "class_declaration" | "interface_declaration" | "struct_declaration" | "enum_declaration" => {
                self.tracking.register_handled_node(node.kind(), node.kind_id());
                if let Some(name_node) = node.child_by_field_name("name") {
                    let name = code[name_node.byte_range()].to_string();
                    let kind = match node.kind() {
                        "interface_declaration" => SymbolKind::Interface,
                        "struct_declaration" => SymbolKind::Struct,
                        "enum_declaration" => SymbolKind::Enum,
                        _ => SymbolKind::Class,
                    };
                    let mut def = SymbolDef::new(
                        counter.next(),
                        name.as_str(),
                        kind,
                        file_id,
                        relative_path,
                        Self::node_range(node),
                    )
                    .with_modifiers(Self::modifiers_of(node, code))
                    .with_indent(node.start_position().column as u16);
                    if let Some(doc) = Self::doc_comment(node, code) {
                        def = def.with_docstring(doc);
                    }
                    symbols.push(def);

                    if let Some(body) = node.child_by_field_name("body") {
                        for child in body.children(&mut body.walk()) {
                            self.extract_symbols(
                                child, code, file_id, relative_path, symbols, counter, Some(&name), depth + 1,
                            );
                        }
                    }
                }
                return;
            }
            "method_declaration" | "constructor_declaration" => {
                self.tracking.register_handled_node(node.kind(), node.kind_id());
                if let (Some(name_node), Some(class)) = (node.child_by_field_name("name"), current_class) {
                    let mut def = SymbolDef::new(
                        counter.next(),
                        &code[name_node.byte_range()],
                        SymbolKind::Method,
                        file_id,
                        relative_path,
                        Self::node_range(node),
                    )
                    .as_method_of_class(class)
                    .with_modifiers(Self::modifiers_of(node, code))
                    .with_indent(node.start_position().column as u16);
                    if let Some(params) = node.child_by_field_name("parameters") {
                        def = def.with_params(&code[params.byte_range()]);
                    }
                    if let Some(ret) = node.child_by_field_name("returns") {
                        def = def.with_return_type(&code[ret.byte_range()]);
                    } else if let Some(ret) = node.child_by_field_name("type") {
                        def = def.with_return_type(&code[ret.byte_range()]);
                    }
                    if let Some(doc) = Self::doc_comment(node, code) {
                        def = def.with_docstring(doc);
                    }
                    symbols.push(def);
                }
            }
            _ => {}
        }

        for child in node.children(&mut node.walk()) {
            self.extract_symbols(child, code, file_id, relative_path, symbols, counter, current_class, depth + 1);
        }
    }

    fn find_calls_in_node(&self, node: Node, code: &str, file_id: FileId, calls: &mut Vec<CallSite>) {
        if node.kind() == "invocation_expression" {
            if let Some(function_node) = node.child_by_field_name("function") {
                match function_node.kind() {
                    "identifier" => {
                        let pos = node.start_position();
                        calls.push(CallSite::new(&code[function_node.byte_range()], file_id, pos.row as u32, pos.column as u16));
                    }
                    "member_access_expression" => {
                        if let (Some(expr), Some(name)) = (
                            function_node.child_by_field_name("expression"),
                            function_node.child_by_field_name("name"),
                        ) {
                            let pos = node.start_position();
                            let site = CallSite::new(&code[name.byte_range()], file_id, pos.row as u32, pos.column as u16)
                                .with_receiver(Receiver::from_text(&code[expr.byte_range()]));
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

    fn find_extends_in_node(&self, node: Node, code: &str, out: &mut Vec<(String, String, u16)>) {
        if matches!(node.kind(), "class_declaration" | "interface_declaration" | "struct_declaration") {
            if let (Some(name_node), Some(base_list)) = (
                node.child_by_field_name("name"),
                node.children(&mut node.walk()).find(|c| c.kind() == "base_list"),
            ) {
                let child_name = code[name_node.byte_range()].to_string();
                for (order, base) in base_list.children(&mut base_list.walk()).filter(|c| c.is_named()).enumerate() {
                    out.push((child_name.clone(), code[base.byte_range()].to_string(), order as u16));
                }
            }
        }
        for child in node.children(&mut node.walk()) {
            self.find_extends_in_node(child, code, out);
        }
    }

    fn find_imports_in_node(&self, node: Node, code: &str, file_id: FileId, imports: &mut Vec<ImportEdge>, aliases: &mut Vec<AliasEdge>) {
        if node.kind() == "using_directive" {
            if let Some(name_node) = node.child_by_field_name("name") {
                let module = code[name_node.byte_range()].to_string();
                if let Some(alias_node) = node.children(&mut node.walk()).find(|c| c.kind() == "identifier" && c.byte_range() != name_node.byte_range()) {
                    aliases.push(AliasEdge {
                        file: file_id,
                        local_name: CompactString::from(&code[alias_node.byte_range()]),
                        canonical_name: CompactString::from(module.rsplit('.').next().unwrap_or(module.as_str())),
                    });
                }
                imports.push(ImportEdge {
                    importing_file: file_id,
                    module: CompactString::from(module.as_str()),
                    imported_names: vec![CompactString::from(module.rsplit('.').next().unwrap_or(module.as_str()))],
                    resolved_file: None,
                    is_external: !module.starts_with("This"),
                });
            }
        }
        for child in node.children(&mut node.walk()) {
            self.find_imports_in_node(child, code, file_id, imports, aliases);
        }
    }
}

impl LanguageParser for CSharpParser {
    fn parse(&mut self, code: &str, file_id: FileId, relative_path: &str, symbol_counter: &mut SymbolCounter) -> Vec<SymbolDef> {
        let tree = match self.parser.parse(code, None) {
            Some(t) => t,
            None => return Vec::new(),
        };
        let mut symbols = Vec::new();
        self.extract_symbols(tree.root_node(), code, file_id, relative_path, &mut symbols, symbol_counter, None, 0);
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

    fn find_implementations(&mut self, code: &str) -> Vec<(String, String)> {
        // base_list doesn't distinguish a base class from an interface, so
        // implementations are folded into find_extends; callers needing
        // only interface satisfaction must cross-reference symbol kinds.
        self.find_extends(code).into_iter().map(|(c, p, _)| (c, p)).collect()
    }

    fn find_extends(&mut self, code: &str) -> Vec<(String, String, u16)> {
        let tree = match self.parser.parse(code, None) {
            Some(t) => t,
            None => return Vec::new(),
        };
        let mut out = Vec::new();
        self.find_extends_in_node(tree.root_node(), code, &mut out);
        out
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
        Language::CSharp
    }
}

impl NodeTracker for CSharpParser {
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
    fn test_parse_class_with_method() {
        let mut parser = CSharpParser::new().unwrap();
        let code = r#"
public class Greeter {
    public string Greet(string name) {
        return "hi " + name;
    }
}
"#;
        let file_id = FileId::new(1).unwrap();
        let symbols = parser.parse(code, file_id, "Greeter.cs", &mut counter());

        let class = symbols.iter().find(|s| s.name.as_ref() == "Greeter").unwrap();
        assert_eq!(class.kind, SymbolKind::Class);

        let method = symbols.iter().find(|s| s.name.as_ref() == "Greet").unwrap();
        assert_eq!(method.class_name.as_deref(), Some("Greeter"));
    }

    #[test]
    fn test_base_list_extends() {
        let mut parser = CSharpParser::new().unwrap();
        let code = "class Dog : Animal, IRunnable {}";
        let extends = parser.find_extends(code);
        assert_eq!(extends.len(), 2);
        assert_eq!(extends[0], ("Dog".to_string(), "Animal".to_string(), 0));
        assert_eq!(extends[1], ("Dog".to_string(), "IRunnable".to_string(), 1));
    }

    #[test]
    fn test_member_access_call() {
        let mut parser = CSharpParser::new().unwrap();
        let code = "class A { void Run() { obj.DoWork(); } }";
        let file_id = FileId::new(1).unwrap();
        let calls = parser.find_calls(code, file_id);
        assert!(calls.iter().any(|c| c.name.as_ref() == "DoWork" && c.receiver.as_ref().unwrap().as_str() == "obj"));
    }
}
