//! TypeScript/TSX front end: parses source with tree-sitter and builds the
//! merge [`Tree`].
//!
//! Shape of the produced tree:
//! - `program` (unordered): one child per top-level unit.
//! - functions and classes become branches labelled with their name; the
//!   text up to the body is a `signature` / `class_heading` leaf.
//! - class members sit in an unordered `class_body`; method and function
//!   statements sit in an ordered `method_body` (or `constructor_body`).
//! - everything else is a leaf holding its source text, labelled by name
//!   when it declares one and left unlabelled otherwise.
//!
//! Labels are unique among unordered siblings: a repeated (kind, label)
//! pair gets a `#n` suffix. Unnamed statements of one kind are therefore
//! told apart by their position among each other, so an edit keeps its
//! place instead of reading as a deletion plus an addition.

use std::collections::HashMap;
use std::path::Path;

use tree_sitter::{Language, Node, Parser};
use tree_sitter_typescript::language_tsx;
use tree_sitter_typescript::language_typescript;

use crate::error::{MergeError, Result};
use crate::tree::{NodeId, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AstLanguage {
    TypeScript,
    Tsx,
}

impl AstLanguage {
    /// Detect the dialect from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "ts" | "mts" | "cts" => Some(Self::TypeScript),
            "tsx" => Some(Self::Tsx),
            _ => None,
        }
    }
}

fn ts_language(lang: AstLanguage) -> Language {
    match lang {
        AstLanguage::TypeScript => language_typescript(),
        AstLanguage::Tsx => language_tsx(),
    }
}

/// Parse `code` into a merge tree. Source with syntax errors is rejected.
pub fn parse_source(code: &str, lang: AstLanguage) -> Result<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(ts_language(lang))
        .map_err(|_| MergeError::Parse {
            side: None,
            cause: "failed to set TypeScript language".into(),
        })?;

    let ts_tree = parser.parse(code, None).ok_or_else(|| MergeError::Parse {
        side: None,
        cause: "tree-sitter parse returned None".into(),
    })?;

    let root = ts_tree.root_node();
    if root.has_error() {
        let cause = match first_error(root) {
            Some(n) => {
                let p = n.start_position();
                format!("syntax error at {}:{}", p.row + 1, p.column + 1)
            }
            None => "syntax error".to_string(),
        };
        return Err(MergeError::Parse { side: None, cause });
    }

    let mut tree = Tree::new("program", "");
    let program = tree.root();
    let builder = Builder { code };
    for i in 0..root.named_child_count() {
        if let Some(ch) = root.named_child(i) {
            builder.top_level(&mut tree, program, ch)?;
        }
    }
    dedupe_labels(&mut tree, program);
    Ok(tree)
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    (0..node.child_count())
        .filter_map(|i| node.child(i))
        .filter(|c| c.has_error())
        .find_map(first_error)
}

struct Builder<'c> {
    code: &'c str,
}

impl Builder<'_> {
    fn text(&self, node: Node) -> &str {
        &self.code[node.start_byte()..node.end_byte()]
    }

    fn top_level(&self, tree: &mut Tree, parent: NodeId, node: Node) -> Result<()> {
        match node.kind() {
            "function_declaration" | "generator_function_declaration" => {
                self.function(tree, parent, node, node.start_byte())
            }
            "class_declaration" | "abstract_class_declaration" => {
                self.class(tree, parent, node, node.start_byte())
            }
            "export_statement" => match node.child_by_field_name("declaration") {
                // keep `export` in the signature text
                Some(inner)
                    if matches!(
                        inner.kind(),
                        "function_declaration" | "generator_function_declaration"
                    ) =>
                {
                    self.function(tree, parent, inner, node.start_byte())
                }
                Some(inner)
                    if matches!(inner.kind(), "class_declaration" | "abstract_class_declaration") =>
                {
                    self.class(tree, parent, inner, node.start_byte())
                }
                Some(inner) => {
                    let label = extract_unit_name(&inner, self.code).unwrap_or_default();
                    tree.push_leaf(parent, inner.kind(), &label, self.text(node))?;
                    Ok(())
                }
                None => self.leaf(tree, parent, node),
            },
            _ => self.leaf(tree, parent, node),
        }
    }

    /// A leaf in an unordered context, labelled by name if it has one.
    fn leaf(&self, tree: &mut Tree, parent: NodeId, node: Node) -> Result<()> {
        let label = extract_unit_name(&node, self.code).unwrap_or_default();
        tree.push_leaf(parent, node.kind(), &label, self.text(node))?;
        Ok(())
    }

    fn function(&self, tree: &mut Tree, parent: NodeId, node: Node, start: usize) -> Result<()> {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n).to_string())
            .unwrap_or_default();
        let Some(body) = node.child_by_field_name("body") else {
            tree.push_leaf(parent, node.kind(), &name, &self.code[start..node.end_byte()])?;
            return Ok(());
        };
        let func = tree.push_branch(parent, "function_declaration", &name)?;
        tree.push_leaf(func, "signature", "", self.code[start..body.start_byte()].trim_end())?;
        self.statements(tree, func, body, "method_body")
    }

    fn class(&self, tree: &mut Tree, parent: NodeId, node: Node, start: usize) -> Result<()> {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n).to_string())
            .unwrap_or_default();
        let Some(body) = node.child_by_field_name("body") else {
            tree.push_leaf(parent, node.kind(), &name, &self.code[start..node.end_byte()])?;
            return Ok(());
        };
        let class = tree.push_branch(parent, node.kind(), &name)?;
        tree.push_leaf(class, "class_heading", "", self.code[start..body.start_byte()].trim_end())?;

        let members = tree.push_branch(class, "class_body", "")?;
        tree.set_delimiters(members, "{", "}");
        for i in 0..body.named_child_count() {
            let Some(member) = body.named_child(i) else {
                continue;
            };
            match member.kind() {
                "method_definition" => self.method(tree, members, member)?,
                "public_field_definition" => {
                    let label = member
                        .child_by_field_name("name")
                        .map(|n| self.text(n).to_string())
                        .unwrap_or_else(|| collapse(self.text(member)));
                    tree.push_leaf(members, "field", &label, self.text(member))?;
                }
                _ => self.leaf(tree, members, member)?,
            }
        }
        dedupe_labels(tree, members);
        Ok(())
    }

    fn method(&self, tree: &mut Tree, parent: NodeId, node: Node) -> Result<()> {
        // modifiers are part of the identity: `get x` and `set x` differ
        let name = node.child_by_field_name("name");
        let label = match name {
            Some(name) => collapse(&self.code[node.start_byte()..name.end_byte()]),
            None => collapse(self.text(node)),
        };
        let Some(body) = node.child_by_field_name("body") else {
            tree.push_leaf(parent, "method_signature", &label, self.text(node))?;
            return Ok(());
        };
        let method = tree.push_branch(parent, "method_definition", &label)?;
        tree.push_leaf(method, "signature", "", self.code[node.start_byte()..body.start_byte()].trim_end())?;
        let body_kind = if name.is_some_and(|n| self.text(n) == "constructor") {
            "constructor_body"
        } else {
            "method_body"
        };
        self.statements(tree, method, body, body_kind)
    }

    /// Statement block as an ordered branch: one unlabelled leaf per
    /// statement.
    fn statements(&self, tree: &mut Tree, parent: NodeId, block: Node, kind: &str) -> Result<()> {
        let body = tree.push_branch(parent, kind, "")?;
        tree.set_delimiters(body, "{", "}");
        for i in 0..block.named_child_count() {
            if let Some(stmt) = block.named_child(i) {
                tree.push_leaf(body, stmt.kind(), "", self.text(stmt))?;
            }
        }
        Ok(())
    }
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Suffix repeated (kind, label) pairs among the children of `parent` so
/// identity matching stays one-to-one.
fn dedupe_labels(tree: &mut Tree, parent: NodeId) {
    let mut seen: HashMap<(String, String), usize> = HashMap::new();
    for child in tree.children(parent).to_vec() {
        let node = tree.node(child);
        let key = (node.kind.clone(), node.label.clone());
        let count = seen.entry(key).or_insert(0);
        *count += 1;
        if *count > 1 {
            let suffix = format!("#{count}");
            tree.node_mut(child).label.push_str(&suffix);
        }
    }
}

fn extract_unit_name(node: &Node, code: &str) -> Option<String> {
    match node.kind() {
        // import ... from "module";
        "import_statement" => {
            for i in 0..node.child_count() {
                let c = node.child(i)?;
                let k = c.kind();
                if k == "string" || k == "string_literal" {
                    let raw = c.utf8_text(code.as_bytes()).ok()?.to_string();
                    return Some(raw.trim_matches(&['"', '\''][..]).to_string());
                }
            }
            None
        }

        // let/const foo = ..., or variable_declaration forms
        "lexical_declaration" | "variable_declaration" => {
            for i in 0..node.child_count() {
                let c = node.child(i)?;
                if c.kind() == "identifier" {
                    return c.utf8_text(code.as_bytes()).ok().map(|s| s.to_string());
                }
                if let Some(name) = extract_unit_name(&c, code) {
                    return Some(name);
                }
            }
            None
        }

        "variable_declarator" => node
            .child_by_field_name("name")
            .and_then(|n| n.utf8_text(code.as_bytes()).ok())
            .map(|s| s.to_string()),

        "interface_declaration" | "type_alias_declaration" | "enum_declaration" | "function_signature" => node
            .child_by_field_name("name")
            .and_then(|n| n.utf8_text(code.as_bytes()).ok())
            .map(|s| s.to_string()),

        _ => None,
    }
}
