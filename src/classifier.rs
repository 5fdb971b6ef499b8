//! AST classifier (spec.md §4.D): decides whether a (file, line, column)
//! falls inside a comment, a string, a template/interpolation expression,
//! or ordinary code, and classifies a name occurrence as a definition,
//! call, import, or plain reference.
//!
//! Every name-based filter in the resolution engine funnels through
//! [`classify_position`] rather than the naive "between quotes on one
//! line" test — that test misclassifies `'a' + fn() + 'b'` as the function
//! call sitting inside a string.

use crate::parsing::Language;
use tree_sitter::{Node, Parser, Tree};

/// What lexical category a source position falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionKind {
    Code,
    Comment,
    String,
}

/// How a name occurrence at a given position is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageKind {
    Definition,
    Call,
    Import,
    Reference,
}

fn ts_language(lang: Language) -> tree_sitter::Language {
    match lang {
        Language::Rust => tree_sitter_rust::LANGUAGE.into(),
        Language::Python => tree_sitter_python::LANGUAGE.into(),
        Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        Language::Go => tree_sitter_go::LANGUAGE.into(),
        Language::Java => tree_sitter_java::LANGUAGE.into(),
        Language::CSharp => tree_sitter_c_sharp::LANGUAGE.into(),
    }
}

/// Parse `code` with the grammar for `lang`. Returns `None` on a grammar
/// mismatch; never panics on malformed source (tree-sitter always returns
/// a best-effort tree with ERROR nodes).
pub fn parse_tree(lang: Language, code: &str) -> Option<Tree> {
    let mut parser = Parser::new();
    parser.set_language(&ts_language(lang)).ok()?;
    parser.parse(code, None)
}

/// Node kinds that are comments in this grammar.
fn comment_kinds(lang: Language) -> &'static [&'static str] {
    match lang {
        Language::Rust => &["line_comment", "block_comment"],
        Language::Python => &["comment"],
        Language::JavaScript | Language::TypeScript => &["comment"],
        Language::Go => &["comment"],
        Language::Java => &["line_comment", "block_comment"],
        Language::CSharp => &["comment"],
    }
}

/// Node kinds that are string literals in this grammar. Kinds listed in
/// [`code_inside_string_kinds`] are excluded even when nested under one of
/// these (template/interpolation expressions are code, not string data).
fn string_kinds(lang: Language) -> &'static [&'static str] {
    match lang {
        Language::Rust => &["string_literal", "raw_string_literal", "char_literal"],
        Language::Python => &["string", "string_content", "concatenated_string"],
        Language::JavaScript | Language::TypeScript => &["string", "string_fragment", "template_string"],
        Language::Go => &["interpreted_string_literal", "raw_string_literal", "rune_literal"],
        Language::Java => &["string_literal", "character_literal"],
        Language::CSharp => &["string_literal", "verbatim_string_literal", "interpolated_string_expression"],
    }
}

/// Node kinds that count as code even though they're lexically nested
/// inside a string-literal node (`${...}` in JS/TS template strings,
/// C# interpolation holes).
fn code_inside_string_kinds(lang: Language) -> &'static [&'static str] {
    match lang {
        Language::JavaScript | Language::TypeScript => &["template_substitution"],
        Language::CSharp => &["interpolation"],
        _ => &[],
    }
}

/// Smallest node in `tree` containing `(line, column)`, or the root if
/// nothing more specific matches.
fn node_at<'a>(tree: &'a Tree, line: u32, column: u16) -> Node<'a> {
    let point = tree_sitter::Point::new(line as usize, column as usize);
    tree.root_node()
        .descendant_for_point_range(point, point)
        .unwrap_or_else(|| tree.root_node())
}

/// Classify a single position. Walks from the smallest enclosing node
/// upward through ancestors: a `code_inside_string` kind short-circuits to
/// `Code` immediately (it's lexically inside a string node but
/// semantically an expression); otherwise the first comment or string kind
/// encountered wins.
pub fn classify_position(lang: Language, code: &str, line: u32, column: u16) -> PositionKind {
    let Some(tree) = parse_tree(lang, code) else {
        return PositionKind::Code;
    };
    let comments = comment_kinds(lang);
    let strings = string_kinds(lang);
    let code_holes = code_inside_string_kinds(lang);

    let mut current = Some(node_at(&tree, line, column));
    while let Some(node) = current {
        let kind = node.kind();
        if code_holes.contains(&kind) {
            return PositionKind::Code;
        }
        if comments.contains(&kind) {
            return PositionKind::Comment;
        }
        if strings.contains(&kind) {
            return PositionKind::String;
        }
        current = node.parent();
    }
    PositionKind::Code
}

/// Classify how `name` is used at `line` based on the smallest enclosing
/// node's kind and its immediate ancestors. Falls back to `Reference` when
/// no more specific shape matches.
pub fn classify_usage(lang: Language, code: &str, line: u32, name: &str) -> UsageKind {
    let Some(tree) = parse_tree(lang, code) else {
        return UsageKind::Reference;
    };
    let Some(node) = find_identifier_on_line(&tree, code, line, name) else {
        return UsageKind::Reference;
    };

    let def_kinds: &[&str] = match lang {
        Language::Rust => &["function_item", "struct_item", "enum_item", "trait_item", "impl_item", "type_item"],
        Language::Python => &["function_definition", "class_definition"],
        Language::JavaScript | Language::TypeScript => &[
            "function_declaration",
            "class_declaration",
            "method_definition",
            "interface_declaration",
            "type_alias_declaration",
        ],
        Language::Go => &["function_declaration", "method_declaration", "type_declaration"],
        Language::Java | Language::CSharp => &["method_declaration", "class_declaration", "interface_declaration"],
    };
    let call_kinds: &[&str] = &["call_expression", "call", "method_invocation", "invocation_expression"];
    let import_kinds: &[&str] = &[
        "use_declaration",
        "import_statement",
        "import_from_statement",
        "import_declaration",
        "using_directive",
    ];

    let mut current = Some(node);
    while let Some(n) = current {
        let kind = n.kind();
        if def_kinds.contains(&kind) {
            return UsageKind::Definition;
        }
        if call_kinds.contains(&kind) {
            return UsageKind::Call;
        }
        if import_kinds.contains(&kind) {
            return UsageKind::Import;
        }
        current = n.parent();
    }
    UsageKind::Reference
}

fn find_identifier_on_line<'a>(tree: &'a Tree, code: &str, line: u32, name: &str) -> Option<Node<'a>> {
    fn walk<'a>(node: Node<'a>, code: &str, line: u32, name: &str) -> Option<Node<'a>> {
        if node.start_position().row as u32 == line
            && (node.kind() == "identifier" || node.kind().ends_with("_identifier"))
            && node.utf8_text(code.as_bytes()).ok() == Some(name)
        {
            return Some(node);
        }
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if let Some(found) = walk(child, code, line, name) {
                return Some(found);
            }
        }
        None
    }
    walk(tree.root_node(), code, line, name)
}

/// Generic cross-language scan for §4.C rule 4's function-argument
/// callback detection: identifiers that appear either as a bare call
/// argument (`setTimeout(myFn)`) or as an object-literal property value
/// (`{onSuccess: handleSuccess}`). Grounded on the observation that every
/// supported grammar names its call-argument list node something
/// containing "argument" and its object/dict key-value node something
/// containing "pair" or "property" — so one substring-based walk covers
/// all seven languages without a per-language table.
pub fn find_callback_candidates(lang: Language, code: &str) -> Vec<(String, u32, u16)> {
    let Some(tree) = parse_tree(lang, code) else {
        return Vec::new();
    };
    let mut out = Vec::new();
    walk_for_callbacks(tree.root_node(), code, &mut out);
    out
}

fn walk_for_callbacks(node: Node, code: &str, out: &mut Vec<(String, u32, u16)>) {
    let kind = node.kind();
    if kind.contains("argument") {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "identifier" {
                push_identifier(child, code, out);
            }
        }
    }
    if kind.contains("pair") || kind.contains("property") {
        if let Some(value) = node.child_by_field_name("value") {
            if value.kind() == "identifier" {
                push_identifier(value, code, out);
            }
        }
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk_for_callbacks(child, code, out);
    }
}

fn push_identifier(node: Node, code: &str, out: &mut Vec<(String, u32, u16)>) {
    if let Ok(text) = node.utf8_text(code.as_bytes()) {
        let pos = node.start_position();
        out.push((text.to_string(), pos.row as u32, pos.column as u16));
    }
}

/// Argument count at a call site, for `verify`'s declared-vs-apparent
/// comparison. Returns `None` if no identifier sits at `(line, column)` or
/// no ancestor looks like a call. The second element is `true` when an
/// argument looks like a spread/splat/variadic form, in which case the
/// count is a lower bound rather than exact.
pub fn count_call_arguments(lang: Language, code: &str, line: u32, column: u16) -> Option<(usize, bool)> {
    let tree = parse_tree(lang, code)?;
    let callee = node_at(&tree, line, column);
    let mut current = Some(callee);
    while let Some(node) = current {
        if let Some(args) = find_argument_list(node) {
            let mut count = 0usize;
            let mut uncertain = false;
            let mut cursor = args.walk();
            for child in args.named_children(&mut cursor) {
                let kind = child.kind();
                if kind.contains("spread") || kind.contains("splat") || kind.contains("variadic") || kind.contains("rest") {
                    uncertain = true;
                }
                count += 1;
            }
            return Some((count, uncertain));
        }
        current = node.parent();
    }
    None
}

/// The node's own argument-list child, if it has one — the callee
/// identifier itself never contains "argument", so this stops at the first
/// call-shaped ancestor instead of walking into nested calls.
fn find_argument_list<'a>(node: Node<'a>) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).find(|c| c.kind().contains("argument"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_position_inside_comment() {
        let code = "// fn() is just a comment\nfn real() {}\n";
        let kind = classify_position(Language::Rust, code, 0, 5);
        assert_eq!(kind, PositionKind::Comment);
    }

    #[test]
    fn test_classify_position_inside_string_not_naive_quote_count() {
        // The naive "between quotes" test misclassifies this: there are
        // two single-quote-delimited strings around a real call.
        let code = "fn f() { let x = \"a\" ; real_call(); let y = \"b\"; }";
        let call_col = code.find("real_call").unwrap() as u16;
        let kind = classify_position(Language::Rust, code, 0, call_col);
        assert_eq!(kind, PositionKind::Code);

        let string_col = code.find("\"a\"").unwrap() as u16 + 1;
        let kind = classify_position(Language::Rust, code, 0, string_col);
        assert_eq!(kind, PositionKind::String);
    }

    #[test]
    fn test_template_substitution_is_code() {
        let code = "const s = `value: ${compute()}`;\n";
        let inner_col = code.find("compute").unwrap() as u16;
        let kind = classify_position(Language::JavaScript, code, 0, inner_col);
        assert_eq!(kind, PositionKind::Code);
    }

    #[test]
    fn test_classify_usage_detects_call_and_definition() {
        let code = "fn helper() {}\nfn caller() { helper(); }\n";
        assert_eq!(classify_usage(Language::Rust, code, 0, "helper"), UsageKind::Definition);
        assert_eq!(classify_usage(Language::Rust, code, 1, "helper"), UsageKind::Call);
    }

    #[test]
    fn test_find_callback_candidates_bare_argument_and_property() {
        let code = "function f() { setTimeout(handleTick); const o = {onSuccess: handleSuccess}; }";
        let candidates = find_callback_candidates(Language::JavaScript, code);
        assert!(candidates.iter().any(|(n, ..)| n == "handleTick"));
        assert!(candidates.iter().any(|(n, ..)| n == "handleSuccess"));
    }

    #[test]
    fn test_count_call_arguments() {
        let code = "fn caller() { helper(1, 2, 3); }\n";
        let col = code.find("helper").unwrap() as u16;
        let (count, uncertain) = count_call_arguments(Language::Rust, code, 0, col).unwrap();
        assert_eq!(count, 3);
        assert!(!uncertain);
    }

    #[test]
    fn test_count_call_arguments_no_args() {
        let code = "fn caller() { helper(); }\n";
        let col = code.find("helper").unwrap() as u16;
        let (count, uncertain) = count_call_arguments(Language::Rust, code, 0, col).unwrap();
        assert_eq!(count, 0);
        assert!(!uncertain);
    }
}
