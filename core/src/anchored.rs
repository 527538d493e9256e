//! Anchored pass: recursive reconciliation driven by the base tree.
//!
//! Unordered contexts match children by identity (kind and label); ordered
//! contexts match them by position and kind. Every input node handed to a
//! step is marked visited, whatever the step decides.

use tracing::trace;

use crate::config::MergeConfig;
use crate::conflict::{merge_text, ConflictBlock, TextMerge};
use crate::error::{MergeError, Result};
use crate::merge::{conflict_leaf, segment, Marks, Visited};
use crate::tree::{NodeId, Tree};

#[derive(Clone, Copy)]
enum Origin {
    Left,
    Right,
}

pub(crate) struct Anchored<'a> {
    left: &'a Tree,
    base: &'a Tree,
    right: &'a Tree,
    config: &'a MergeConfig,
    out: Tree,
    visited: Visited,
}

impl<'a> Anchored<'a> {
    pub(crate) fn new(left: &'a Tree, base: &'a Tree, right: &'a Tree, config: &'a MergeConfig) -> Self {
        Self {
            left,
            base,
            right,
            config,
            out: Tree::detached(),
            visited: Visited {
                left: Marks::new(left),
                base: Marks::new(base),
                right: Marks::new(right),
            },
        }
    }

    pub(crate) fn run(mut self) -> Result<(Tree, Visited)> {
        let (left, base, right) = (self.left, self.base, self.right);
        let root = self
            .merge_node(Some(left.root()), base.root(), Some(right.root()), 0)?
            .ok_or_else(|| MergeError::Invariant {
                context: "root merged to nothing".into(),
            })?;
        self.out.set_root(root);
        Ok((self.out, self.visited))
    }

    fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > self.config.max_depth {
            return Err(MergeError::DepthExceeded {
                limit: self.config.max_depth,
            });
        }
        Ok(())
    }

    fn mark(&mut self, left: Option<NodeId>, base: NodeId, right: Option<NodeId>) {
        if let Some(l) = left {
            self.visited.left.mark(l);
        }
        self.visited.base.mark(base);
        if let Some(r) = right {
            self.visited.right.mark(r);
        }
    }

    fn merge_node(
        &mut self,
        left: Option<NodeId>,
        base: NodeId,
        right: Option<NodeId>,
        depth: usize,
    ) -> Result<Option<NodeId>> {
        self.check_depth(depth)?;
        let (left_tree, base_tree, right_tree) = (self.left, self.base, self.right);
        let base_node = base_tree.node(base);

        if left.is_some() && right.is_some() && self.config.is_ordered(&base_node.kind) {
            return self.merge_ordered(left, base, right, depth);
        }
        self.mark(left, base, right);

        let left_match = left.filter(|&l| base_node.same_identity(left_tree.node(l)));
        let right_match = right.filter(|&r| base_node.same_identity(right_tree.node(r)));

        match (left_match, right_match) {
            (Some(l), Some(r)) => {
                let merged = self.out.clone_shallow_from(base_tree, base);
                if base_node.is_branch() && left_tree.node(l).is_branch() && right_tree.node(r).is_branch() {
                    for &base_child in base_tree.children(base) {
                        let probe = base_tree.node(base_child);
                        let left_child = left_tree.compatible_child(l, probe);
                        let right_child = right_tree.compatible_child(r, probe);
                        if let Some(m) = self.merge_node(left_child, base_child, right_child, depth + 1)? {
                            self.out.append_child(merged, m)?;
                        }
                    }
                    Ok(Some(merged))
                } else {
                    self.merge_leaves(l, base, r, merged)?;
                    Ok(Some(merged))
                }
            }
            (Some(l), None) => self.keep_if_unchanged(Origin::Left, l, base, right),
            (None, Some(r)) => self.keep_if_unchanged(Origin::Right, r, base, left),
            (None, None) => {
                if left.is_none() && right.is_none() {
                    trace!(kind = %base_node.kind, label = %base_node.label, "deleted on both sides");
                    Ok(None)
                } else {
                    Ok(Some(self.conflict(left, Some(base), right)))
                }
            }
        }
    }

    fn merge_ordered(
        &mut self,
        left: Option<NodeId>,
        base: NodeId,
        right: Option<NodeId>,
        depth: usize,
    ) -> Result<Option<NodeId>> {
        self.check_depth(depth)?;
        self.mark(left, base, right);
        let (left_tree, base_tree, right_tree) = (self.left, self.base, self.right);
        let base_node = base_tree.node(base);

        let left_match = left.filter(|&l| base_node.same_kind(left_tree.node(l)));
        let right_match = right.filter(|&r| base_node.same_kind(right_tree.node(r)));

        match (left_match, right_match) {
            (Some(l), Some(r)) => {
                let merged = self.out.clone_shallow_from(base_tree, base);
                if base_node.is_branch() && left_tree.node(l).is_branch() && right_tree.node(r).is_branch() {
                    for (i, &base_child) in base_tree.children(base).iter().enumerate() {
                        let left_child = left_tree.child_at(l, i);
                        let right_child = right_tree.child_at(r, i);
                        if let Some(m) = self.merge_ordered(left_child, base_child, right_child, depth + 1)? {
                            self.out.append_child(merged, m)?;
                        }
                    }
                    Ok(Some(merged))
                } else {
                    self.merge_leaves(l, base, r, merged)?;
                    Ok(Some(merged))
                }
            }
            (Some(l), None) => self.keep_if_unchanged(Origin::Left, l, base, right),
            (None, Some(r)) => self.keep_if_unchanged(Origin::Right, r, base, left),
            (None, None) => match (left, right) {
                // both sides replaced the same slot
                (Some(l), Some(r)) if left_tree.node(l).same_kind(right_tree.node(r)) => {
                    if left_tree.fingerprint(l) == right_tree.fingerprint(r) {
                        Ok(Some(self.out.clone_deep_from(left_tree, l)))
                    } else {
                        Ok(Some(self.conflict(left, Some(base), right)))
                    }
                }
                (None, None) => {
                    trace!(kind = %base_node.kind, "deleted on both sides");
                    Ok(None)
                }
                _ => Ok(Some(self.conflict(left, Some(base), right))),
            },
        }
    }

    /// Only `matched` still corresponds to base. If it is unchanged the other
    /// side's version (possibly a deletion) wins, otherwise the edit on
    /// `matched` collides with whatever happened on the other side.
    fn keep_if_unchanged(
        &mut self,
        matched_side: Origin,
        matched: NodeId,
        base: NodeId,
        other: Option<NodeId>,
    ) -> Result<Option<NodeId>> {
        let (matched_tree, other_tree) = match matched_side {
            Origin::Left => (self.left, self.right),
            Origin::Right => (self.right, self.left),
        };
        if self.base.fingerprint(base) == matched_tree.fingerprint(matched) {
            return Ok(other.map(|o| self.out.clone_deep_from(other_tree, o)));
        }
        let conflict = match matched_side {
            Origin::Left => self.conflict(Some(matched), Some(base), other),
            Origin::Right => self.conflict(other, Some(base), Some(matched)),
        };
        Ok(Some(conflict))
    }

    /// Three-way text merge of matched leaves into the shallow clone
    /// `merged`.
    fn merge_leaves(&mut self, left: NodeId, base: NodeId, right: NodeId, merged: NodeId) -> Result<()> {
        let (left_tree, base_tree, right_tree) = (self.left, self.base, self.right);
        let bodies = (
            left_tree.node(left).body(),
            base_tree.node(base).body(),
            right_tree.node(right).body(),
        );
        let (Some(l), Some(b), Some(r)) = bodies else {
            return Err(MergeError::Invariant {
                context: format!(
                    "`{}` is a leaf on some sides and a branch on others",
                    base_tree.node(base).kind
                ),
            });
        };
        match merge_text(l, b, r) {
            TextMerge::Clean(text) => self.out.set_body(merged, text),
            TextMerge::Conflict => {
                let block = ConflictBlock::new(format!("{l}\n"), Some(format!("{b}\n")), format!("{r}\n"));
                self.out.set_body(merged, &block.render(self.config.conflict_style))?;
                self.out.node_mut(merged).is_conflict = true;
                Ok(())
            }
        }
    }

    fn conflict(&mut self, left: Option<NodeId>, base: Option<NodeId>, right: Option<NodeId>) -> NodeId {
        let (left_tree, base_tree, right_tree) = (self.left, self.base, self.right);
        let block = ConflictBlock::new(
            left.map(|l| segment(left_tree, l)).unwrap_or_default(),
            base.map(|b| segment(base_tree, b)),
            right.map(|r| segment(right_tree, r)).unwrap_or_default(),
        );
        let source = base
            .map(|b| base_tree.node(b))
            .or_else(|| left.map(|l| left_tree.node(l)))
            .or_else(|| right.map(|r| right_tree.node(r)));
        let (kind, label) = source
            .map(|n| (n.kind.as_str(), n.label.as_str()))
            .unwrap_or(("merge_conflict", ""));
        trace!(kind, label, "conflict");
        conflict_leaf(&mut self.out, kind, label, &block, self.config.conflict_style)
    }
}
