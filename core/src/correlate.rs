//! Read-only reporting pass linking conflicts to their enclosing
//! declaration.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MergeConfig;
use crate::conflict::{contains_conflict, parse_blocks, ConflictBlock};
use crate::printer::render_node;
use crate::tree::{NodeId, Tree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DifferenceKind {
    /// Conflict inside an ordered context: both sides touched the same slot.
    SamePosition,
    /// Conflict on a declaration matched by name.
    SameDeclaration,
}

/// Conflicts found inside one declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Difference {
    pub signature: String,
    pub kinds: Vec<DifferenceKind>,
    pub conflicts: Vec<ConflictBlock>,
    /// Merged text of the whole declaration.
    pub merged_body: String,
}

/// Record every conflict leaf of `tree` in `differences`, keyed by the
/// signature of the nearest enclosing declaration. Conflicts outside any
/// declaration are not recorded.
pub fn correlate_conflicts(tree: &Tree, config: &MergeConfig, differences: &mut Vec<Difference>) {
    for id in tree.preorder() {
        let Some(body) = tree.node(id).body() else {
            continue;
        };
        if !contains_conflict(body) {
            continue;
        }
        let Some(decl) = enclosing_declaration(tree, id, config) else {
            continue;
        };

        let merged_body = render_node(tree, decl);
        let signature = signature_of(&merged_body);
        let kind = match tree.parent(id) {
            Some(p) if config.is_ordered(&tree.node(p).kind) => DifferenceKind::SamePosition,
            _ => DifferenceKind::SameDeclaration,
        };
        debug!(%signature, ?kind, "conflict correlated");

        let entry = get_or_create(differences, &signature);
        entry.merged_body = merged_body;
        if !entry.kinds.contains(&kind) {
            entry.kinds.push(kind);
        }
        for block in parse_blocks(body) {
            if !entry.conflicts.contains(&block) {
                entry.conflicts.push(block);
            }
        }
    }
}

fn enclosing_declaration(tree: &Tree, id: NodeId, config: &MergeConfig) -> Option<NodeId> {
    let mut current = tree.parent(id);
    while let Some(p) = current {
        if config.is_declaration(&tree.node(p).kind) {
            return Some(p);
        }
        current = tree.parent(p);
    }
    None
}

/// Text before the body's opening brace, whitespace collapsed.
pub fn signature_of(declaration: &str) -> String {
    let head = declaration.split('{').next().unwrap_or(declaration);
    head.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn get_or_create<'d>(differences: &'d mut Vec<Difference>, signature: &str) -> &'d mut Difference {
    let index = match differences.iter().position(|d| d.signature == signature) {
        Some(i) => i,
        None => {
            differences.push(Difference {
                signature: signature.to_string(),
                kinds: Vec::new(),
                conflicts: Vec::new(),
                merged_body: String::new(),
            });
            differences.len() - 1
        }
    };
    &mut differences[index]
}
