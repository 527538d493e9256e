//! Renders a tree back to source text.
//!
//! Only structure is reproduced; indentation is left to an external
//! formatter.

use crate::tree::{NodeContent, NodeId, Tree};

pub fn render(tree: &Tree) -> String {
    let mut out = render_node(tree, tree.root());
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

pub fn render_node(tree: &Tree, id: NodeId) -> String {
    match &tree.node(id).content {
        NodeContent::Leaf { body } => body.clone(),
        NodeContent::Branch {
            children,
            open,
            close,
        } => {
            // blocks and the root hold one child per line; anything else is
            // a declaration whose parts sit on one line
            let block = id == tree.root() || !open.is_empty();
            let sep = if block { "\n" } else { " " };
            let inner = children
                .iter()
                .map(|&c| render_node(tree, c))
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
                .join(sep);

            let mut out = String::new();
            out.push_str(open);
            if !open.is_empty() && !inner.is_empty() {
                out.push('\n');
            }
            out.push_str(&inner);
            if !close.is_empty() {
                if !inner.is_empty() {
                    out.push('\n');
                }
                out.push_str(close);
            }
            out
        }
    }
}
