//! Java extractor. Methods and fields live inside `class`/`interface`
//! bodies like JS/Python, so `as_method_of_class` is used rather than
//! `as_method_of_receiver`. `extends`/`implements` are both tracked as
//! extends edges; the resolution engine doesn't distinguish interface
//! inheritance from class inheritance once the edge exists.

use crate::parsing::parser::{check_recursion_depth, LanguageParser, NodeTracker, NodeTrackingState};
use crate::parsing::Language;
use crate::symbol::{AliasEdge, CallSite, ImportEdge, Receiver, SymbolDef};
use crate::types::{CompactString, FileId, Range, SymbolCounter, SymbolKind};
use std::any::Any;
use tree_sitter::{Node, Parser};

pub struct JavaParser {
    parser: Parser,
    tracking: NodeTrackingState,
}

impl JavaParser {
    pub fn new() -> Result<Self, String> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_java::LANGUAGE.into())
            .map_err(|e| format!("failed to set Java language: {e}"))?;
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

    fn doc_comment(node: Node, code: &str) -> Option<String> {
        let mut sib = node.prev_sibling()?;
        if sib.kind() == "modifiers" {
            sib = sib.prev_sibling()?;
        }
        if sib.kind() != "block_comment" {
            return None;
        }
        let text = &code[sib.byte_range()];
        if !text.starts_with("/**") {
            return None;
        }
        let cleaned: Vec<&str> = text
            .trim_start_matches("/**")
            .trim_end_matches("*/")
            .lines()
            .map(|l| l.trim().trim_start_matches('*').trim())
            .filter(|l| !l.is_empty())
            .collect();
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned.join("\n"))
        }
    }

    fn modifiers_of(node: Node, code: &str) -> Vec<CompactString> {
        node.children(&mut node.walk())
            .find(|c| c.kind() == "modifiers")
            .map(|m| {
                m.children(&mut m.walk())
                    .filter(|c| c.is_named() || matches!(c.kind(), "public" | "private" | "protected" | "static" | "final" | "abstract"))
                    .map(|c| CompactString::from(&code[c.byte_range()]))
                    .collect()
            })
            .unwrap_or_default()
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
            "class_declaration" | "interface_declaration" | "enum_declaration" => {
                self.tracking.register_handled_node(node.kind(), node.kind_id());
                if let Some(name_node) = node.child_by_field_name("name") {
                    let name = code[name_node.byte_range()].to_string();
                    let kind = match node.kind() {
                        "interface_declaration" => SymbolKind::Interface,
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
                    if let Some(ret) = node.child_by_field_name("type") {
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
        if node.kind() == "method_invocation" {
            if let Some(name_node) = node.child_by_field_name("name") {
                let pos = node.start_position();
                let mut site = CallSite::new(&code[name_node.byte_range()], file_id, pos.row as u32, pos.column as u16);
                if let Some(obj) = node.child_by_field_name("object") {
                    site = site.with_receiver(Receiver::from_text(&code[obj.byte_range()]));
                }
                calls.push(site);
            }
        }
        for child in node.children(&mut node.walk()) {
            self.find_calls_in_node(child, code, file_id, calls);
        }
    }

    fn find_extends_in_node(&self, node: Node, code: &str, out: &mut Vec<(String, String, u16)>) {
        if matches!(node.kind(), "class_declaration" | "interface_declaration") {
            if let Some(name_node) = node.child_by_field_name("name") {
                let child_name = code[name_node.byte_range()].to_string();
                let mut order = 0u16;
                if let Some(superclass) = node.child_by_field_name("superclass") {
                    let ty_text = superclass
                        .children(&mut superclass.walk())
                        .find(|c| c.is_named())
                        .map(|c| code[c.byte_range()].to_string())
                        .unwrap_or_else(|| code[superclass.byte_range()].trim_start_matches("extends").trim().to_string());
                    out.push((child_name.clone(), ty_text, order));
                    order += 1;
                }
                if let Some(interfaces) = node.child_by_field_name("interfaces") {
                    if let Some(list) = interfaces.children(&mut interfaces.walk()).find(|c| c.kind() == "type_list") {
                        for ty in list.children(&mut list.walk()).filter(|c| c.is_named()) {
                            out.push((child_name.clone(), code[ty.byte_range()].to_string(), order));
                            order += 1;
                        }
                    }
                }
            }
        }
        for child in node.children(&mut node.walk()) {
            self.find_extends_in_node(child, code, out);
        }
    }

    fn find_imports_in_node(&self, node: Node, code: &str, file_id: FileId, imports: &mut Vec<ImportEdge>) {
        if node.kind() == "import_declaration" {
            let is_wildcard = node.children(&mut node.walk()).any(|c| c.kind() == "asterisk");
            if let Some(path) = node.children(&mut node.walk()).find(|c| matches!(c.kind(), "scoped_identifier" | "identifier")) {
                let full = code[path.byte_range()].to_string();
                let imported = if is_wildcard {
                    CompactString::from("*")
                } else {
                    CompactString::from(full.rsplit('.').next().unwrap_or(full.as_str()))
                };
                imports.push(ImportEdge {
                    importing_file: file_id,
                    module: CompactString::from(full.as_str()),
                    imported_names: vec![imported],
                    resolved_file: None,
                    is_external: !full.starts_with("com.this") && !full.starts_with("org.this"),
                });
            }
        }
        for child in node.children(&mut node.walk()) {
            self.find_imports_in_node(child, code, file_id, imports);
        }
    }
}

impl LanguageParser for JavaParser {
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
        // Java's `implements` clause is folded into find_extends since the
        // edge representation doesn't distinguish interface satisfaction
        // from class inheritance; this keeps the two in sync without
        // re-walking the tree for a second, narrower query.
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
        self.find_imports_in_node(tree.root_node(), code, file_id, &mut imports);
        imports
    }

    fn find_aliases(&mut self, _code: &str, _file_id: FileId) -> Vec<AliasEdge> {
        Vec::new() // Java has no local rebinding syntax equivalent to `const x = y`
    }

    fn language(&self) -> Language {
        Language::Java
    }
}

impl NodeTracker for JavaParser {
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
        let mut parser = JavaParser::new().unwrap();
        let code = r#"
public class Greeter {
    public String greet(String name) {
        return "hi " + name;
    }
}
"#;
        let file_id = FileId::new(1).unwrap();
        let symbols = parser.parse(code, file_id, "Greeter.java", &mut counter());

        let class = symbols.iter().find(|s| s.name.as_ref() == "Greeter").unwrap();
        assert_eq!(class.kind, SymbolKind::Class);

        let method = symbols.iter().find(|s| s.name.as_ref() == "greet").unwrap();
        assert_eq!(method.class_name.as_deref(), Some("Greeter"));
    }

    #[test]
    fn test_extends_and_implements() {
        let mut parser = JavaParser::new().unwrap();
        let code = "class Dog extends Animal implements Runnable, Serializable {}";
        let extends = parser.find_extends(code);
        assert_eq!(extends.len(), 3);
        assert_eq!(extends[0], ("Dog".to_string(), "Animal".to_string(), 0));
        assert!(extends.iter().any(|(_, p, _)| p == "Runnable"));
    }

    #[test]
    fn test_method_invocation_with_receiver() {
        let mut parser = JavaParser::new().unwrap();
        let code = "class A { void run() { obj.doWork(); } }";
        let file_id = FileId::new(1).unwrap();
        let calls = parser.find_calls(code, file_id);
        assert!(calls.iter().any(|c| c.name.as_ref() == "doWork" && c.receiver.as_ref().unwrap().as_str() == "obj"));
    }
}
