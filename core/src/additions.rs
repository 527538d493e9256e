//! Addition pass: picks up subtrees one side added with no base
//! counterpart, which the anchored pass never reaches.
//!
//! Runs twice, scanning left against right and then right against left.
//! Content added on both sides is reconciled during the first scan only,
//! so nothing is inserted twice.

use tracing::trace;

use crate::config::MergeConfig;
use crate::conflict::ConflictBlock;
use crate::error::{MergeError, Result};
use crate::merge::{conflict_leaf, segment, Marks, Visited};
use crate::tree::{NodeId, Tree};

pub(crate) fn reconcile(
    out: &mut Tree,
    left: &Tree,
    base: &Tree,
    right: &Tree,
    visited: &Visited,
    config: &MergeConfig,
) -> Result<()> {
    // the scans flag what they insert; keep that off the anchored pass's state
    let mut left_marks = visited.left.clone();
    let mut right_marks = visited.right.clone();
    let merged_root = out.root();

    Additions {
        a: left,
        b: right,
        base,
        a_marks: &mut left_marks,
        b_marks: &mut right_marks,
        out: &mut *out,
        config,
        processing_right: false,
    }
    .scan(left.root(), Some(base.root()), Some(right.root()), merged_root, 0)?;

    Additions {
        a: right,
        b: left,
        base,
        a_marks: &mut right_marks,
        b_marks: &mut left_marks,
        out,
        config,
        processing_right: true,
    }
    .scan(right.root(), Some(base.root()), Some(left.root()), merged_root, 0)
}

struct Additions<'a> {
    a: &'a Tree, // side being scanned
    b: &'a Tree, // the other side
    base: &'a Tree,
    a_marks: &'a mut Marks,
    b_marks: &'a mut Marks,
    out: &'a mut Tree,
    config: &'a MergeConfig,
    processing_right: bool,
}

impl Additions<'_> {
    fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > self.config.max_depth {
            return Err(MergeError::DepthExceeded {
                limit: self.config.max_depth,
            });
        }
        Ok(())
    }

    fn scan(&mut self, a: NodeId, base: Option<NodeId>, b: Option<NodeId>, merged: NodeId, depth: usize) -> Result<()> {
        self.check_depth(depth)?;
        let (a_tree, b_tree, base_tree) = (self.a, self.b, self.base);
        if self.config.is_ordered(&a_tree.node(a).kind) {
            return self.scan_ordered(a, base, b, merged, depth);
        }
        let base = match base {
            Some(base) if self.a_marks.is_marked(a) => base,
            _ => return self.add_fresh(a, b, merged),
        };

        for &a_child in a_tree.children(a) {
            let probe = a_tree.node(a_child);
            let base_child = base_tree.compatible_child(base, probe);
            let b_child = b.and_then(|b| b_tree.compatible_child(b, probe));
            match (base_child, b_child) {
                (None, None) => {
                    trace!(kind = %probe.kind, label = %probe.label, right = self.processing_right, "one-sided addition");
                    self.append_copy(merged, a_child)?;
                    self.a_marks.mark(a_child);
                }
                (None, Some(_)) => {
                    if !self.processing_right {
                        self.scan(a_child, None, b_child, merged, depth + 1)?;
                    }
                }
                (Some(base_child), _) => match self.out.compatible_child(merged, probe) {
                    // deleted by the anchored pass
                    None => {}
                    Some(m) if self.out.node(m).is_conflict => {}
                    Some(m) => self.scan(a_child, Some(base_child), b_child, m, depth + 1)?,
                },
            }
        }
        Ok(())
    }

    fn scan_ordered(
        &mut self,
        a: NodeId,
        base: Option<NodeId>,
        b: Option<NodeId>,
        merged: NodeId,
        depth: usize,
    ) -> Result<()> {
        self.check_depth(depth)?;
        let (a_tree, b_tree, base_tree) = (self.a, self.b, self.base);
        let base = match base {
            Some(base) if self.a_marks.is_marked(a) => base,
            _ => return self.add_fresh(a, b, merged),
        };

        for (i, &a_child) in a_tree.children(a).iter().enumerate() {
            let base_child = base_tree.child_at(base, i);
            let b_child = b.and_then(|b| b_tree.child_at(b, i));
            match (base_child, b_child) {
                (None, None) => {
                    trace!(position = i, right = self.processing_right, "one-sided insertion");
                    self.append_copy(merged, a_child)?;
                    self.a_marks.mark(a_child);
                }
                (None, Some(_)) => {
                    if !self.processing_right {
                        self.scan_ordered(a_child, None, b_child, merged, depth + 1)?;
                    }
                }
                (Some(base_child), _) => match self.out.child_at(merged, i) {
                    None => {}
                    Some(m) if self.out.node(m).is_conflict => {}
                    Some(m) => {
                        if self.has_remaining_changes(a_child, base_child, m) {
                            self.scan_ordered(a_child, Some(base_child), b_child, m, depth + 1)?;
                        }
                    }
                },
            }
        }
        Ok(())
    }

    /// `a` differs from its base slot and from what the anchored pass put
    /// in the merged slot.
    fn has_remaining_changes(&self, a: NodeId, base: NodeId, merged: NodeId) -> bool {
        let text = self.a.fingerprint(a);
        text != self.base.fingerprint(base) && text != self.out.fingerprint(merged)
    }

    /// `a` has no anchored counterpart. Insert it once, or a conflict if the
    /// other side put something different in the same slot.
    fn add_fresh(&mut self, a: NodeId, b: Option<NodeId>, merged: NodeId) -> Result<()> {
        let (a_tree, b_tree) = (self.a, self.b);
        match b {
            Some(b) if a_tree.fingerprint(a) != b_tree.fingerprint(b) => {
                if self.out.node(merged).is_branch() {
                    let (mine, theirs) = (segment(a_tree, a), segment(b_tree, b));
                    // conflict blocks always read left then right
                    let block = if self.processing_right {
                        ConflictBlock::new(theirs, None, mine)
                    } else {
                        ConflictBlock::new(mine, None, theirs)
                    };
                    let node = a_tree.node(a);
                    trace!(kind = %node.kind, label = %node.label, "both sides added different content");
                    let conflict = conflict_leaf(self.out, &node.kind, &node.label, &block, self.config.conflict_style);
                    self.out.append_child(merged, conflict)?;
                }
            }
            _ => self.append_copy(merged, a)?,
        }
        self.a_marks.mark(a);
        if let Some(b) = b {
            self.b_marks.mark(b);
        }
        Ok(())
    }

    fn append_copy(&mut self, merged: NodeId, a: NodeId) -> Result<()> {
        // a conflict leaf already carries the text
        if !self.out.node(merged).is_branch() {
            return Ok(());
        }
        let copy = self.out.clone_deep_from(self.a, a);
        self.out.append_child(merged, copy)
    }
}
