//! Python extractor. Classes hold methods inline (`class_name`, not
//! `receiver`); inheritance comes from the class's argument list, in
//! left-to-right MRO order; the docstring is the first string-expression
//! statement inside a function/class body, not a preceding comment.

use crate::parsing::parser::{check_recursion_depth, LanguageParser, NodeTracker, NodeTrackingState};
use crate::parsing::Language;
use crate::symbol::{AliasEdge, CallSite, ImportEdge, Receiver, SymbolDef};
use crate::types::{CompactString, FileId, Range, SymbolCounter, SymbolKind};
use std::any::Any;
use tree_sitter::{Node, Parser};

pub struct PythonParser {
    parser: Parser,
    tracking: NodeTrackingState,
}

impl PythonParser {
    pub fn new() -> Result<Self, String> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| format!("failed to set Python language: {e}"))?;
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

    fn docstring_of_body(body: Node, code: &str) -> Option<String> {
        let first = body.children(&mut body.walk()).next()?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let string_node = first.children(&mut first.walk()).next()?;
        if string_node.kind() != "string" {
            return None;
        }
        let text = &code[string_node.byte_range()];
        let trimmed = text
            .trim_start_matches("\"\"\"")
            .trim_end_matches("\"\"\"")
            .trim_start_matches("'''")
            .trim_end_matches("'''")
            .trim_start_matches(['r', 'R', 'f', 'F'])
            .trim();
        Some(trimmed.to_string())
    }

    fn decorator_modifiers(node: Node, code: &str) -> Vec<CompactString> {
        let mut mods = Vec::new();
        let mut current = node.prev_sibling();
        while let Some(sib) = current {
            if sib.kind() == "decorator" {
                mods.push(CompactString::from(&code[sib.byte_range()]));
                current = sib.prev_sibling();
            } else {
                break;
            }
        }
        mods
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
            "function_definition" => {
                self.tracking.register_handled_node("function_definition", node.kind_id());
                if let Some(name_node) = node.child_by_field_name("name") {
                    let name = &code[name_node.byte_range()];
                    let is_method = current_class.is_some();
                    let kind = if is_method { SymbolKind::Method } else { SymbolKind::Function };
                    let mut def = SymbolDef::new(
                        counter.next(),
                        name,
                        kind,
                        file_id,
                        relative_path,
                        Self::node_range(node),
                    )
                    .with_modifiers(Self::decorator_modifiers(node, code))
                    .with_indent(node.start_position().column as u16);

                    if let Some(params) = node.child_by_field_name("parameters") {
                        def = def.with_params(&code[params.byte_range()]);
                    }
                    if let Some(ret) = node.child_by_field_name("return_type") {
                        def = def.with_return_type(&code[ret.byte_range()]);
                    }
                    if let Some(body) = node.child_by_field_name("body") {
                        if let Some(doc) = Self::docstring_of_body(body, code) {
                            def = def.with_docstring(doc);
                        }
                    }
                    if let Some(class) = current_class {
                        def = def.as_method_of_class(class);
                    }
                    symbols.push(def);
                }
                // don't descend into nested closures' bodies as methods of outer class
                if let Some(body) = node.child_by_field_name("body") {
                    for child in body.children(&mut body.walk()) {
                        self.extract_symbols(child, code, file_id, relative_path, symbols, counter, None, depth + 1);
                    }
                }
                return;
            }
            "class_definition" => {
                self.tracking.register_handled_node("class_definition", node.kind_id());
                if let Some(name_node) = node.child_by_field_name("name") {
                    let name = code[name_node.byte_range()].to_string();
                    let mut def = SymbolDef::new(
                        counter.next(),
                        name.as_str(),
                        SymbolKind::Class,
                        file_id,
                        relative_path,
                        Self::node_range(node),
                    )
                    .with_modifiers(Self::decorator_modifiers(node, code))
                    .with_indent(node.start_position().column as u16);
                    if let Some(body) = node.child_by_field_name("body") {
                        if let Some(doc) = Self::docstring_of_body(body, code) {
                            def = def.with_docstring(doc);
                        }
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
            _ => {}
        }

        for child in node.children(&mut node.walk()) {
            self.extract_symbols(child, code, file_id, relative_path, symbols, counter, current_class, depth + 1);
        }
    }

    fn find_extends_in_node(&self, node: Node, code: &str, out: &mut Vec<(String, String, u16)>) {
        if node.kind() == "class_definition" {
            if let (Some(name_node), Some(superclasses)) =
                (node.child_by_field_name("name"), node.child_by_field_name("superclasses"))
            {
                let child_name = &code[name_node.byte_range()];
                let mut order = 0u16;
                for arg in superclasses.children(&mut superclasses.walk()) {
                    if matches!(arg.kind(), "identifier" | "attribute") {
                        let parent_name = &code[arg.byte_range()];
                        if parent_name != "object" {
                            out.push((child_name.to_string(), parent_name.to_string(), order));
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

    fn find_calls_in_node(&self, node: Node, code: &str, file_id: FileId, calls: &mut Vec<CallSite>) {
        if node.kind() == "call" {
            if let Some(function_node) = node.child_by_field_name("function") {
                match function_node.kind() {
                    "identifier" => {
                        let pos = node.start_position();
                        calls.push(CallSite::new(
                            &code[function_node.byte_range()],
                            file_id,
                            pos.row as u32,
                            pos.column as u16,
                        ));
                    }
                    "attribute" => {
                        if let (Some(obj), Some(attr)) = (
                            function_node.child_by_field_name("object"),
                            function_node.child_by_field_name("attribute"),
                        ) {
                            let pos = node.start_position();
                            // `super().method()`: the object is a nested
                            // `super()` call, not a bare identifier — normalize
                            // it to the receiver text "super" so the resolution
                            // engine can recognize it without parsing call
                            // expressions itself.
                            let receiver_text = if obj.kind() == "call"
                                && obj.child_by_field_name("function").map(|f| &code[f.byte_range()]) == Some("super")
                            {
                                "super"
                            } else {
                                &code[obj.byte_range()]
                            };
                            let site = CallSite::new(
                                &code[attr.byte_range()],
                                file_id,
                                pos.row as u32,
                                pos.column as u16,
                            )
                            .with_receiver(Receiver::from_text(receiver_text));
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
        match node.kind() {
            "import_statement" => {
                for child in node.children(&mut node.walk()) {
                    match child.kind() {
                        "dotted_name" => {
                            let module = &code[child.byte_range()];
                            imports.push(ImportEdge {
                                importing_file: file_id,
                                module: CompactString::from(module),
                                imported_names: vec![CompactString::from(module)],
                                resolved_file: None,
                                is_external: true,
                            });
                        }
                        "aliased_import" => {
                            if let (Some(name_node), Some(alias_node)) =
                                (child.child_by_field_name("name"), child.child_by_field_name("alias"))
                            {
                                let module = &code[name_node.byte_range()];
                                let alias = &code[alias_node.byte_range()];
                                imports.push(ImportEdge {
                                    importing_file: file_id,
                                    module: CompactString::from(module),
                                    imported_names: vec![CompactString::from(alias)],
                                    resolved_file: None,
                                    is_external: true,
                                });
                                aliases.push(AliasEdge {
                                    file: file_id,
                                    local_name: CompactString::from(alias),
                                    canonical_name: CompactString::from(module),
                                });
                            }
                        }
                        _ => {}
                    }
                }
            }
            "import_from_statement" => {
                if let Some(module_node) = node.child_by_field_name("module_name") {
                    let module = code[module_node.byte_range()].to_string();
                    let mut names = Vec::new();
                    for child in node.children(&mut node.walk()) {
                        match child.kind() {
                            "dotted_name" if child != module_node => {
                                names.push(CompactString::from(&code[child.byte_range()]));
                            }
                            "aliased_import" => {
                                if let (Some(name_node), Some(alias_node)) =
                                    (child.child_by_field_name("name"), child.child_by_field_name("alias"))
                                {
                                    let original = &code[name_node.byte_range()];
                                    let alias = &code[alias_node.byte_range()];
                                    names.push(CompactString::from(alias));
                                    aliases.push(AliasEdge {
                                        file: file_id,
                                        local_name: CompactString::from(alias),
                                        canonical_name: CompactString::from(original),
                                    });
                                }
                            }
                            "wildcard_import" => names.push(CompactString::from("*")),
                            _ => {}
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
            _ => {}
        }
        for child in node.children(&mut node.walk()) {
            self.find_imports_in_node(child, code, file_id, imports, aliases);
        }
    }
}

impl LanguageParser for PythonParser {
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
        node.child_by_field_name("body").and_then(|b| Self::docstring_of_body(b, code))
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
        Vec::new() // Python has no separate trait-implementation syntax; see find_extends
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
        Language::Python
    }
}

impl NodeTracker for PythonParser {
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
    fn test_parse_class_with_methods() {
        let mut parser = PythonParser::new().unwrap();
        let code = r#"
class Animal:
    """A generic animal."""

    def __init__(self, name):
        self.name = name

    def speak(self):
        return "..."
"#;
        let file_id = FileId::new(1).unwrap();
        let symbols = parser.parse(code, file_id, "animal.py", &mut counter());

        let class = symbols.iter().find(|s| s.name.as_ref() == "Animal").unwrap();
        assert_eq!(class.kind, SymbolKind::Class);
        assert_eq!(class.docstring.as_deref(), Some("A generic animal."));

        let init = symbols.iter().find(|s| s.name.as_ref() == "__init__").unwrap();
        assert_eq!(init.class_name.as_deref(), Some("Animal"));
        assert!(init.receiver.is_none());
    }

    #[test]
    fn test_find_extends_multiple_bases_preserve_order() {
        let mut parser = PythonParser::new().unwrap();
        let code = "class Dog(Animal, Trainable):\n    pass\n";
        let extends = parser.find_extends(code);
        assert_eq!(extends, vec![
            ("Dog".to_string(), "Animal".to_string(), 0),
            ("Dog".to_string(), "Trainable".to_string(), 1),
        ]);
    }

    #[test]
    fn test_find_calls_self_receiver() {
        let mut parser = PythonParser::new().unwrap();
        let code = "def speak(self):\n    self.bark()\n    helper()\n";
        let file_id = FileId::new(1).unwrap();
        let calls = parser.find_calls(code, file_id);
        let bark = calls.iter().find(|c| c.name.as_ref() == "bark").unwrap();
        assert_eq!(bark.receiver, Some(Receiver::SelfRef));
    }

    #[test]
    fn test_find_calls_super_receiver_normalized() {
        let mut parser = PythonParser::new().unwrap();
        let code = "class Circle(Shape):\n    def describe(self):\n        return super().describe()\n";
        let file_id = FileId::new(1).unwrap();
        let calls = parser.find_calls(code, file_id);
        let describe_call = calls.iter().find(|c| c.name.as_ref() == "describe").unwrap();
        assert_eq!(describe_call.receiver, Some(Receiver::Named("super".into())));
    }

    #[test]
    fn test_find_imports_aliased() {
        let mut parser = PythonParser::new().unwrap();
        let code = "import numpy as np\nfrom os import path as p\n";
        let file_id = FileId::new(1).unwrap();
        let aliases = parser.find_aliases(code, file_id);
        assert!(aliases.iter().any(|a| a.local_name.as_ref() == "np" && a.canonical_name.as_ref() == "numpy"));
        assert!(aliases.iter().any(|a| a.local_name.as_ref() == "p" && a.canonical_name.as_ref() == "path"));
    }
}
