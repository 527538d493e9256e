//! Three-way structured merge entry points.
//!
//! The anchored pass walks the base tree and reconciles every node that has
//! a base counterpart; the addition pass then walks left and right to pick
//! up what the anchored pass could not see. The visited side table is how
//! the first pass tells the second what it already handled.

use tracing::debug;

use crate::additions;
use crate::anchored::Anchored;
use crate::config::{ConflictStyle, MergeConfig};
use crate::conflict::ConflictBlock;
use crate::correlate::{correlate_conflicts, Difference};
use crate::error::{MergeError, Result};
use crate::printer::render_node;
use crate::tree::{NodeId, Tree};

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub tree: Tree,
    pub conflicts: usize,
}

impl MergeOutcome {
    pub fn is_clean(&self) -> bool {
        self.conflicts == 0
    }
}

/// Merge `left` and `right` against their common ancestor `base`.
///
/// The inputs are only read. The returned tree owns copies of everything
/// it contains.
pub fn merge(left: &Tree, base: &Tree, right: &Tree, config: &MergeConfig) -> Result<MergeOutcome> {
    // copies, fingerprints and rendering recurse over whole subtrees
    for tree in [left, base, right] {
        if tree.height(tree.root()) > config.max_depth {
            return Err(MergeError::DepthExceeded {
                limit: config.max_depth,
            });
        }
    }
    let (mut tree, visited) = Anchored::new(left, base, right, config).run()?;
    debug!(
        base_nodes = base.len(),
        base_visited = visited.base.count(),
        "anchored pass finished"
    );
    additions::reconcile(&mut tree, left, base, right, &visited, config)?;

    let conflicts = tree.conflict_count();
    debug!(nodes = tree.len(), conflicts, "structured merge finished");
    Ok(MergeOutcome { tree, conflicts })
}

/// [`merge`], then record every conflict against its enclosing declaration
/// in `differences`.
pub fn merge_with_report(
    left: &Tree,
    base: &Tree,
    right: &Tree,
    config: &MergeConfig,
    differences: &mut Vec<Difference>,
) -> Result<MergeOutcome> {
    let outcome = merge(left, base, right, config)?;
    correlate_conflicts(&outcome.tree, config, differences);
    Ok(outcome)
}

/// Per-tree visited flags, indexed by `NodeId`.
#[derive(Debug, Clone)]
pub(crate) struct Marks(Vec<bool>);

impl Marks {
    pub(crate) fn new(tree: &Tree) -> Self {
        Self(vec![false; tree.len()])
    }

    pub(crate) fn mark(&mut self, id: NodeId) {
        self.0[id.index()] = true;
    }

    pub(crate) fn is_marked(&self, id: NodeId) -> bool {
        self.0[id.index()]
    }

    pub(crate) fn count(&self) -> usize {
        self.0.iter().filter(|&&m| m).count()
    }
}

/// Nodes of each input reached by the anchored pass.
#[derive(Debug, Clone)]
pub(crate) struct Visited {
    pub left: Marks,
    pub base: Marks,
    pub right: Marks,
}

/// Conflict text for one side: leaf body or rendered subtree, newline
/// terminated.
pub(crate) fn segment(tree: &Tree, id: NodeId) -> String {
    let mut text = render_node(tree, id);
    text.push('\n');
    text
}

/// Allocate a detached conflict leaf in `out`.
pub(crate) fn conflict_leaf(
    out: &mut Tree,
    kind: &str,
    label: &str,
    block: &ConflictBlock,
    style: ConflictStyle,
) -> NodeId {
    let id = out.alloc_leaf(kind, label, &block.render(style));
    out.node_mut(id).is_conflict = true;
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(items: &[(&str, &str)]) -> Tree {
        let mut t = Tree::new("class_body", "");
        let root = t.root();
        for (label, body) in items {
            t.push_leaf(root, "field", label, body).unwrap();
        }
        t
    }

    /// `class_body > method_definition "run" > method_body > statements`
    fn method(statements: &[&str]) -> Tree {
        let mut t = Tree::new("class_body", "");
        let root = t.root();
        let m = t.push_branch(root, "method_definition", "run").unwrap();
        t.push_leaf(m, "signature", "", "run()").unwrap();
        let body = t.push_branch(m, "method_body", "").unwrap();
        t.set_delimiters(body, "{", "}");
        for s in statements {
            t.push_leaf(body, "expression_statement", "", s).unwrap();
        }
        t
    }

    fn method_body(tree: &Tree) -> NodeId {
        let m = tree.child_at(tree.root(), 0).unwrap();
        tree.child_at(m, 1).unwrap()
    }

    fn bodies(tree: &Tree, parent: NodeId) -> Vec<String> {
        tree.children(parent)
            .iter()
            .map(|&c| tree.node(c).body().unwrap_or_default().to_string())
            .collect()
    }

    fn labels(tree: &Tree) -> Vec<String> {
        tree.children(tree.root())
            .iter()
            .map(|&c| tree.node(c).label.clone())
            .collect()
    }

    fn run(left: &Tree, base: &Tree, right: &Tree) -> MergeOutcome {
        merge(left, base, right, &MergeConfig::default()).unwrap()
    }

    #[test]
    fn identical_inputs_merge_to_the_same_tree() {
        let t = method(&["a();", "b();"]);
        let out = run(&t, &t, &t);
        assert!(out.is_clean());
        assert!(out.tree.structurally_eq(&t));

        let f = fields(&[("x", "x = 1;"), ("y", "y = 2;")]);
        let out = run(&f, &f, &f);
        assert!(out.tree.structurally_eq(&f));
    }

    #[test]
    fn one_sided_edit_wins_unordered() {
        let base = fields(&[("x", "int x = 1;")]);
        let left = fields(&[("x", "int x = 2;")]);
        let out = run(&left, &base, &base);
        assert!(out.is_clean());
        assert_eq!(bodies(&out.tree, out.tree.root()), vec!["int x = 2;"]);

        let out = run(&base, &base, &left);
        assert_eq!(bodies(&out.tree, out.tree.root()), vec!["int x = 2;"]);
    }

    #[test]
    fn one_sided_edit_wins_ordered() {
        let base = method(&["a();", "b();"]);
        let right = method(&["a();", "c();"]);
        let out = run(&base, &base, &right);
        assert!(out.is_clean());
        assert_eq!(bodies(&out.tree, method_body(&out.tree)), vec!["a();", "c();"]);
    }

    #[test]
    fn convergent_edit_is_clean() {
        let base = fields(&[("x", "int x = 1;")]);
        let both = fields(&[("x", "int x = 5;")]);
        let out = run(&both, &base, &both);
        assert!(out.is_clean());
        assert_eq!(bodies(&out.tree, out.tree.root()), vec!["int x = 5;"]);
    }

    #[test]
    fn formatting_only_edit_is_not_a_change() {
        let base = fields(&[("x", "int x = 1;")]);
        let left = fields(&[("x", "int  x  =  1;")]);
        let right = fields(&[("x", "int x = 7;")]);
        let out = run(&left, &base, &right);
        assert!(out.is_clean());
        assert_eq!(bodies(&out.tree, out.tree.root()), vec!["int x = 7;"]);
    }

    #[test]
    fn mutual_deletion_leaves_nothing() {
        let base = fields(&[("x", "x = 1;"), ("y", "y = 2;")]);
        let both = fields(&[("x", "x = 1;")]);
        let out = run(&both, &base, &both);
        assert!(out.is_clean());
        assert_eq!(labels(&out.tree), vec!["x"]);
    }

    #[test]
    fn deletion_of_unchanged_member_wins() {
        let base = fields(&[("x", "x = 1;"), ("y", "y = 2;")]);
        let left = fields(&[("x", "x = 1;")]);
        let out = run(&left, &base, &base);
        assert!(out.is_clean());
        assert_eq!(labels(&out.tree), vec!["x"]);
    }

    #[test]
    fn deletion_against_edit_conflicts() {
        let base = fields(&[("x", "x = 1;"), ("y", "y = 2;")]);
        let left = fields(&[("x", "x = 1;")]);
        let right = fields(&[("x", "x = 1;"), ("y", "y = 3;")]);
        let out = run(&left, &base, &right);
        assert_eq!(out.conflicts, 1);

        let y = out.tree.child_at(out.tree.root(), 1).unwrap();
        let node = out.tree.node(y);
        assert!(node.is_conflict);
        let body = node.body().unwrap();
        assert!(body.contains("y = 2;"));
        assert!(body.contains("y = 3;"));
    }

    #[test]
    fn divergent_edits_produce_a_conflict_leaf() {
        let base = fields(&[("x", "int x = 1;")]);
        let left = fields(&[("x", "int x = 2;")]);
        let right = fields(&[("x", "int x = 3;")]);
        let out = run(&left, &base, &right);
        assert_eq!(out.conflicts, 1);

        let x = out.tree.child_at(out.tree.root(), 0).unwrap();
        let body = out.tree.node(x).body().unwrap();
        let (l, r) = (body.find("int x = 2;").unwrap(), body.find("int x = 3;").unwrap());
        assert!(l < r, "left segment must come first:\n{body}");
        assert!(body.contains("||||||| BASE\nint x = 1;"));
    }

    #[test]
    fn merge_style_omits_base_segment() {
        let base = fields(&[("x", "int x = 1;")]);
        let left = fields(&[("x", "int x = 2;")]);
        let right = fields(&[("x", "int x = 3;")]);
        let config = MergeConfig {
            conflict_style: ConflictStyle::Merge,
            ..MergeConfig::default()
        };
        let out = merge(&left, &base, &right, &config).unwrap();
        let x = out.tree.child_at(out.tree.root(), 0).unwrap();
        assert_eq!(
            out.tree.node(x).body(),
            Some("<<<<<<< MINE\nint x = 2;\n=======\nint x = 3;\n>>>>>>> YOURS")
        );
    }

    #[test]
    fn reordered_members_do_not_conflict() {
        let base = fields(&[("a", "a = 1;"), ("b", "b = 2;"), ("c", "c = 3;")]);
        let left = fields(&[("c", "c = 3;"), ("a", "a = 1;"), ("b", "b = 2;")]);
        let right = fields(&[("a", "a = 1;"), ("b", "b = 20;"), ("c", "c = 3;")]);
        let out = run(&left, &base, &right);
        assert!(out.is_clean());
        assert_eq!(labels(&out.tree), vec!["a", "b", "c"]);
        assert_eq!(bodies(&out.tree, out.tree.root())[1], "b = 20;");
    }

    #[test]
    fn one_sided_additions_are_appended_once() {
        let base = fields(&[("x", "x = 1;")]);
        let left = fields(&[("x", "x = 1;"), ("l", "l = 1;")]);
        let right = fields(&[("r", "r = 1;"), ("x", "x = 1;")]);
        let out = run(&left, &base, &right);
        assert!(out.is_clean());
        assert_eq!(labels(&out.tree), vec!["x", "l", "r"]);
    }

    #[test]
    fn identical_additions_appear_once() {
        let base = fields(&[("x", "x = 1;")]);
        let both = fields(&[("x", "x = 1;"), ("z", "z = 9;")]);
        let out = run(&both, &base, &both);
        assert!(out.is_clean());
        assert_eq!(labels(&out.tree), vec!["x", "z"]);
    }

    #[test]
    fn different_additions_with_same_name_conflict_once() {
        let base = fields(&[("x", "x = 1;")]);
        let left = fields(&[("x", "x = 1;"), ("z", "z = 1;")]);
        let right = fields(&[("x", "x = 1;"), ("z", "z = 2;")]);
        let out = run(&left, &base, &right);
        assert_eq!(out.conflicts, 1);
        assert_eq!(out.tree.children(out.tree.root()).len(), 2);

        let z = out.tree.child_at(out.tree.root(), 1).unwrap();
        let body = out.tree.node(z).body().unwrap();
        assert!(body.find("z = 1;").unwrap() < body.find("z = 2;").unwrap());
    }

    #[test]
    fn insertions_in_the_same_slot_conflict() {
        let base = method(&["a();"]);
        let left = method(&["a();", "fromLeft();"]);
        let right = method(&["a();", "fromRight();"]);
        let out = run(&left, &base, &right);
        assert_eq!(out.conflicts, 1);

        let body = method_body(&out.tree);
        assert_eq!(out.tree.children(body).len(), 2);
        let slot = out.tree.child_at(body, 1).unwrap();
        let text = out.tree.node(slot).body().unwrap();
        // the second scan never re-emits the same slot, so order is fixed
        assert!(text.find("fromLeft();").unwrap() < text.find("fromRight();").unwrap());
    }

    #[test]
    fn edits_in_different_slots_both_survive() {
        let base = method(&["a();", "b();"]);
        let left = method(&["a();", "b();", "c();"]);
        let right = method(&["a2();", "b();"]);
        let out = run(&left, &base, &right);
        assert!(out.is_clean());
        assert_eq!(bodies(&out.tree, method_body(&out.tree)), vec!["a2();", "b();", "c();"]);
    }

    #[test]
    fn both_sides_replacing_a_slot_with_the_same_kind() {
        let mut base = method(&["a();"]);
        let body = method_body(&base);
        let stmt = base.child_at(body, 0).unwrap();
        base.node_mut(stmt).kind = "return_statement".into();

        let out = run(&method(&["x();"]), &base, &method(&["x();"]));
        assert!(out.is_clean());
        assert_eq!(bodies(&out.tree, method_body(&out.tree)), vec!["x();"]);

        let out = run(&method(&["x();"]), &base, &method(&["y();"]));
        assert_eq!(out.conflicts, 1);
    }

    #[test]
    fn reordered_methods_with_addition_and_body_edit() {
        // base {A, B}; left reorders to {B, A} and adds C; right edits B
        fn class(members: &[(&str, &str)]) -> Tree {
            let mut t = Tree::new("class_body", "");
            let root = t.root();
            for (name, stmt) in members {
                let m = t.push_branch(root, "method_definition", name).unwrap();
                t.push_leaf(m, "signature", "", &format!("{name}()")).unwrap();
                let body = t.push_branch(m, "method_body", "").unwrap();
                t.push_leaf(body, "return_statement", "", stmt).unwrap();
            }
            t
        }
        let base = class(&[("A", "return 1;"), ("B", "return 2;")]);
        let left = class(&[("B", "return 2;"), ("A", "return 1;"), ("C", "return 3;")]);
        let right = class(&[("A", "return 1;"), ("B", "return 20;")]);

        let out = run(&left, &base, &right);
        assert!(out.is_clean());
        assert_eq!(labels(&out.tree), vec!["A", "B", "C"]);
        let b = out.tree.child_at(out.tree.root(), 1).unwrap();
        let b_body = out.tree.child_at(b, 1).unwrap();
        assert_eq!(bodies(&out.tree, b_body), vec!["return 20;"]);
    }

    #[test]
    fn inputs_are_not_modified() {
        let base = method(&["a();"]);
        let left = method(&["a();", "b();"]);
        let right = method(&["c();"]);
        let (l0, b0, r0) = (left.clone(), base.clone(), right.clone());
        run(&left, &base, &right);
        assert_eq!((left, base, right), (l0, b0, r0));
    }

    #[test]
    fn merge_is_deterministic() {
        let base = fields(&[("a", "a = 1;"), ("b", "b = 2;")]);
        let left = fields(&[("b", "b = 3;"), ("n", "n = 1;")]);
        let right = fields(&[("a", "a = 5;"), ("b", "b = 4;"), ("m", "m = 1;")]);
        let first = run(&left, &base, &right);
        let second = run(&left, &base, &right);
        assert_eq!(first.tree, second.tree);
    }

    #[test]
    fn depth_limit_aborts_the_merge() {
        let t = method(&["a();"]);
        let config = MergeConfig {
            max_depth: 1,
            ..MergeConfig::default()
        };
        let err = merge(&t, &t, &t, &config).unwrap_err();
        assert!(matches!(err, MergeError::DepthExceeded { limit: 1 }));
    }

    #[test]
    fn deep_addition_is_rejected_before_copying() {
        let base = Tree::new("program", "");
        let mut left = base.clone();
        let mut parent = left.root();
        for _ in 0..200_000 {
            parent = left.push_branch(parent, "block", "").unwrap();
        }
        let config = MergeConfig {
            max_depth: 64,
            ..MergeConfig::default()
        };
        let err = merge(&left, &base, &base, &config).unwrap_err();
        assert!(matches!(err, MergeError::DepthExceeded { limit: 64 }));
    }

    /// `method_body > block > statements`
    fn nested(block: &[&str]) -> Tree {
        let mut t = Tree::new("class_body", "");
        let root = t.root();
        let m = t.push_branch(root, "method_definition", "run").unwrap();
        t.push_leaf(m, "signature", "", "run()").unwrap();
        let body = t.push_branch(m, "method_body", "").unwrap();
        let inner = t.push_branch(body, "statement_block", "").unwrap();
        t.set_delimiters(inner, "{", "}");
        for s in block {
            t.push_leaf(inner, "expression_statement", "", s).unwrap();
        }
        t
    }

    fn nested_block(tree: &Tree) -> NodeId {
        tree.child_at(method_body(tree), 0).unwrap()
    }

    #[test]
    fn append_and_edit_inside_a_nested_block_both_survive() {
        let base = nested(&["a;"]);
        let left = nested(&["a;", "b;"]);
        let right = nested(&["a2;"]);
        let out = run(&left, &base, &right);
        assert!(out.is_clean());
        assert_eq!(bodies(&out.tree, nested_block(&out.tree)), vec!["a2;", "b;"]);

        let out = run(&right, &base, &left);
        assert!(out.is_clean());
        assert_eq!(bodies(&out.tree, nested_block(&out.tree)), vec!["a2;", "b;"]);
    }

    #[test]
    fn same_append_inside_a_nested_block_appears_once() {
        let base = nested(&["a;"]);
        let both = nested(&["a;", "b;"]);
        let out = run(&both, &base, &both);
        assert!(out.is_clean());
        assert_eq!(bodies(&out.tree, nested_block(&out.tree)), vec!["a;", "b;"]);
    }

    #[test]
    fn leaf_against_branch_is_an_invariant_failure() {
        let base = fields(&[("x", "x = 1;")]);
        let mut left = Tree::new("class_body", "");
        let root = left.root();
        let x = left.push_branch(root, "field", "x").unwrap();
        left.push_leaf(x, "initializer", "", "1").unwrap();
        let right = fields(&[("x", "x = 2;")]);
        let err = merge(&left, &base, &right, &MergeConfig::default()).unwrap_err();
        assert!(matches!(err, MergeError::Invariant { .. }));
    }

    #[test]
    fn incompatible_roots_collapse_into_one_conflict() {
        let base = Tree::new_leaf("statement", "", "a();");
        let left = Tree::new_leaf("expression", "", "b();");
        let right = Tree::new_leaf("declaration", "", "c();");
        let out = run(&left, &base, &right);
        assert_eq!(out.conflicts, 1);
        assert!(out.tree.node(out.tree.root()).is_conflict);
    }

    #[test]
    fn report_links_conflicts_to_declarations() {
        let mut base = Tree::new("program", "");
        let root = base.root();
        let m = base.push_branch(root, "method_definition", "run").unwrap();
        base.push_leaf(m, "signature", "", "run()").unwrap();
        let body = base.push_branch(m, "method_body", "").unwrap();
        base.set_delimiters(body, "{", "}");
        base.push_leaf(body, "expression_statement", "", "a = 1;").unwrap();

        let edit = |text: &str| {
            let mut t = base.clone();
            let stmt = t.child_at(body, 0).unwrap();
            t.set_body(stmt, text).unwrap();
            t
        };
        let (left, right) = (edit("a = 2;"), edit("a = 3;"));

        let mut differences = Vec::new();
        let out = merge_with_report(&left, &base, &right, &MergeConfig::default(), &mut differences).unwrap();
        assert_eq!(out.conflicts, 1);
        assert_eq!(differences.len(), 1);
        assert_eq!(differences[0].signature, "run()");
        assert_eq!(differences[0].conflicts[0].left, "a = 2;\n");
        assert_eq!(differences[0].conflicts[0].right, "a = 3;\n");
    }
}
