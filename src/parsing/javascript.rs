//! JavaScript extractor. Classes hold methods inline; `export` is a
//! distinct statement wrapping a declaration, so export records are
//! collected separately from the declarations they wrap.

use crate::parsing::parser::{check_recursion_depth, LanguageParser, NodeTracker, NodeTrackingState};
use crate::parsing::Language;
use crate::symbol::{AliasEdge, CallSite, ExportRecord, ImportEdge, Receiver, SymbolDef};
use crate::types::{CompactString, FileId, Range, SymbolCounter, SymbolKind};
use std::any::Any;
use tree_sitter::{Node, Parser};

pub struct JavaScriptParser {
    parser: Parser,
    tracking: NodeTrackingState,
}

impl JavaScriptParser {
    pub fn new() -> Result<Self, String> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_javascript::LANGUAGE.into())
            .map_err(|e| format!("failed to set JavaScript language: {e}"))?;
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

    fn jsdoc_comment(node: Node, code: &str) -> Option<String> {
        let sib = node.prev_sibling()?;
        if sib.kind() != "comment" {
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
            "function_declaration" | "generator_function_declaration" => {
                self.tracking.register_handled_node(node.kind(), node.kind_id());
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
                    if let Some(doc) = Self::jsdoc_comment(node, code) {
                        def = def.with_docstring(doc);
                    }
                    symbols.push(def);
                }
            }
            "method_definition" => {
                self.tracking.register_handled_node("method_definition", node.kind_id());
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
                    .with_indent(node.start_position().column as u16);
                    if let Some(params) = node.child_by_field_name("parameters") {
                        def = def.with_params(&code[params.byte_range()]);
                    }
                    if let Some(doc) = Self::jsdoc_comment(node, code) {
                        def = def.with_docstring(doc);
                    }
                    symbols.push(def);
                }
            }
            "class_declaration" => {
                self.tracking.register_handled_node("class_declaration", node.kind_id());
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
                    .with_indent(node.start_position().column as u16);
                    if let Some(doc) = Self::jsdoc_comment(node, code) {
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
            "variable_declarator" => {
                // const foo = function() {} / const foo = () => {}
                if let (Some(name_node), Some(value_node)) =
                    (node.child_by_field_name("name"), node.child_by_field_name("value"))
                {
                    if matches!(value_node.kind(), "arrow_function" | "function_expression") {
                        self.tracking.register_handled_node("variable_declarator", node.kind_id());
                        let mut def = SymbolDef::new(
                            counter.next(),
                            &code[name_node.byte_range()],
                            SymbolKind::Function,
                            file_id,
                            relative_path,
                            Self::node_range(node),
                        )
                        .with_indent(node.start_position().column as u16);
                        if let Some(params) = value_node.child_by_field_name("parameters") {
                            def = def.with_params(&code[params.byte_range()]);
                        }
                        symbols.push(def);
                    }
                }
            }
            _ => {}
        }

        for child in node.children(&mut node.walk()) {
            self.extract_symbols(child, code, file_id, relative_path, symbols, counter, current_class, depth + 1);
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
                    "member_expression" => {
                        if let (Some(obj), Some(prop)) = (
                            function_node.child_by_field_name("object"),
                            function_node.child_by_field_name("property"),
                        ) {
                            let pos = node.start_position();
                            let site = CallSite::new(&code[prop.byte_range()], file_id, pos.row as u32, pos.column as u16)
                                .with_receiver(Receiver::from_text(&code[obj.byte_range()]));
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
        if node.kind() == "class_declaration" {
            if let (Some(name_node), Some(heritage)) = (
                node.child_by_field_name("name"),
                node.children(&mut node.walk()).find(|c| c.kind() == "class_heritage"),
            ) {
                if let Some(parent) = heritage.children(&mut heritage.walk()).find(|c| {
                    matches!(c.kind(), "identifier" | "member_expression")
                }) {
                    out.push((
                        code[name_node.byte_range()].to_string(),
                        code[parent.byte_range()].to_string(),
                        0,
                    ));
                }
            }
        }
        for child in node.children(&mut node.walk()) {
            self.find_extends_in_node(child, code, out);
        }
    }

    fn find_imports_in_node(&self, node: Node, code: &str, file_id: FileId, imports: &mut Vec<ImportEdge>, aliases: &mut Vec<AliasEdge>) {
        if node.kind() == "import_statement" {
            if let Some(source) = node.children(&mut node.walk()).find(|c| c.kind() == "string") {
                let module = code[source.byte_range()].trim_matches(|c| c == '\'' || c == '"').to_string();
                let mut names = Vec::new();
                if let Some(clause) = node.children(&mut node.walk()).find(|c| c.kind() == "import_clause") {
                    self.collect_import_clause(clause, code, file_id, &module, &mut names, aliases);
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

    fn collect_import_clause(
        &self,
        clause: Node,
        code: &str,
        file_id: FileId,
        module: &str,
        names: &mut Vec<CompactString>,
        aliases: &mut Vec<AliasEdge>,
    ) {
        for child in clause.children(&mut clause.walk()) {
            match child.kind() {
                "identifier" => names.push(CompactString::from(&code[child.byte_range()])),
                "namespace_import" => names.push(CompactString::from("*")),
                "named_imports" => {
                    for spec in child.children(&mut child.walk()) {
                        if spec.kind() == "import_specifier" {
                            if let Some(alias_node) = spec.child_by_field_name("alias") {
                                let original = spec
                                    .child_by_field_name("name")
                                    .map(|n| code[n.byte_range()].to_string())
                                    .unwrap_or_default();
                                let alias = &code[alias_node.byte_range()];
                                names.push(CompactString::from(alias));
                                aliases.push(AliasEdge {
                                    file: file_id,
                                    local_name: CompactString::from(alias),
                                    canonical_name: CompactString::from(original.as_str()),
                                });
                            } else if let Some(name_node) = spec.child_by_field_name("name") {
                                names.push(CompactString::from(&code[name_node.byte_range()]));
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        let _ = module;
    }

    fn find_local_aliases_in_node(&self, node: Node, code: &str, file_id: FileId, out: &mut Vec<AliasEdge>) {
        if node.kind() == "variable_declarator" {
            if let (Some(name_node), Some(value_node)) =
                (node.child_by_field_name("name"), node.child_by_field_name("value"))
            {
                if value_node.kind() == "identifier" {
                    out.push(AliasEdge {
                        file: file_id,
                        local_name: CompactString::from(&code[name_node.byte_range()]),
                        canonical_name: CompactString::from(&code[value_node.byte_range()]),
                    });
                }
            }
        }
        for child in node.children(&mut node.walk()) {
            self.find_local_aliases_in_node(child, code, file_id, out);
        }
    }

    fn find_exports_in_node(&self, node: Node, code: &str, file_id: FileId, out: &mut Vec<ExportRecord>) {
        if node.kind() == "export_statement" {
            let from = node
                .children(&mut node.walk())
                .find(|c| c.kind() == "string")
                .map(|n| code[n.byte_range()].trim_matches(|c| c == '\'' || c == '"').to_string());

            if let Some(decl) = node.child_by_field_name("declaration") {
                let (name, kind) = match decl.kind() {
                    "function_declaration" => (decl.child_by_field_name("name"), SymbolKind::Function),
                    "class_declaration" => (decl.child_by_field_name("name"), SymbolKind::Class),
                    "lexical_declaration" | "variable_declaration" => {
                        let name = decl
                            .children(&mut decl.walk())
                            .find(|c| c.kind() == "variable_declarator")
                            .and_then(|d| d.child_by_field_name("name"));
                        (name, SymbolKind::Function)
                    }
                    _ => (None, SymbolKind::Function),
                };
                if let Some(name_node) = name {
                    out.push(ExportRecord {
                        file: file_id,
                        exported_name: CompactString::from(&code[name_node.byte_range()]),
                        kind,
                        reexported_from: from.clone().map(|s| CompactString::from(s.as_str())),
                    });
                }
            } else {
                for child in node.children(&mut node.walk()) {
                    if child.kind() == "export_clause" {
                        for spec in child.children(&mut child.walk()) {
                            if spec.kind() == "export_specifier" {
                                if let Some(name_node) = spec.child_by_field_name("name") {
                                    out.push(ExportRecord {
                                        file: file_id,
                                        exported_name: CompactString::from(&code[name_node.byte_range()]),
                                        kind: SymbolKind::Function,
                                        reexported_from: from.clone().map(|s| CompactString::from(s.as_str())),
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }
        for child in node.children(&mut node.walk()) {
            self.find_exports_in_node(child, code, file_id, out);
        }
    }
}

impl LanguageParser for JavaScriptParser {
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
        Self::jsdoc_comment(*node, code)
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
        Vec::new() // JS has no interface-implementation syntax distinct from class extension
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

    fn find_exports(&mut self, code: &str, file_id: FileId) -> Vec<ExportRecord> {
        let tree = match self.parser.parse(code, None) {
            Some(t) => t,
            None => return Vec::new(),
        };
        let mut out = Vec::new();
        self.find_exports_in_node(tree.root_node(), code, file_id, &mut out);
        out
    }

    fn find_aliases(&mut self, code: &str, file_id: FileId) -> Vec<AliasEdge> {
        let tree = match self.parser.parse(code, None) {
            Some(t) => t,
            None => return Vec::new(),
        };
        let mut imports = Vec::new();
        let mut aliases = Vec::new();
        self.find_imports_in_node(tree.root_node(), code, file_id, &mut imports, &mut aliases);
        self.find_local_aliases_in_node(tree.root_node(), code, file_id, &mut aliases);
        aliases
    }

    fn language(&self) -> Language {
        Language::JavaScript
    }
}

impl NodeTracker for JavaScriptParser {
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
    fn test_parse_class_with_methods_and_arrow_function() {
        let mut parser = JavaScriptParser::new().unwrap();
        let code = r#"
class Widget {
    render() { return null; }
}

const helper = (x) => x * 2;
"#;
        let file_id = FileId::new(1).unwrap();
        let symbols = parser.parse(code, file_id, "widget.js", &mut counter());

        let widget = symbols.iter().find(|s| s.name.as_ref() == "Widget").unwrap();
        assert_eq!(widget.kind, SymbolKind::Class);

        let render = symbols.iter().find(|s| s.name.as_ref() == "render").unwrap();
        assert_eq!(render.class_name.as_deref(), Some("Widget"));

        let helper = symbols.iter().find(|s| s.name.as_ref() == "helper").unwrap();
        assert_eq!(helper.kind, SymbolKind::Function);
    }

    #[test]
    fn test_find_extends() {
        let mut parser = JavaScriptParser::new().unwrap();
        let code = "class Dog extends Animal {}";
        let extends = parser.find_extends(code);
        assert_eq!(extends, vec![("Dog".to_string(), "Animal".to_string(), 0)]);
    }

    #[test]
    fn test_local_alias_import() {
        let mut parser = JavaScriptParser::new().unwrap();
        let code = "import { foo as bar } from './mod';";
        let file_id = FileId::new(1).unwrap();
        let aliases = parser.find_aliases(code, file_id);
        assert_eq!(aliases.len(), 1);
        assert_eq!(aliases[0].local_name.as_ref(), "bar");
        assert_eq!(aliases[0].canonical_name.as_ref(), "foo");
    }

    #[test]
    fn test_local_identifier_alias() {
        let mut parser = JavaScriptParser::new().unwrap();
        let code = "function parse(x) { return x; }\nconst myParse = parse;\nfunction caller() { myParse('a'); }";
        let file_id = FileId::new(1).unwrap();
        let aliases = parser.find_aliases(code, file_id);
        assert!(aliases.iter().any(|a| a.local_name.as_ref() == "myParse" && a.canonical_name.as_ref() == "parse"));
    }

    #[test]
    fn test_named_export() {
        let mut parser = JavaScriptParser::new().unwrap();
        let code = "export function widget() {}";
        let file_id = FileId::new(1).unwrap();
        let exports = parser.find_exports(code, file_id);
        assert_eq!(exports.len(), 1);
        assert_eq!(exports[0].exported_name.as_ref(), "widget");
    }
}
