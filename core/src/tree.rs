//! Arena-backed syntax tree used by the structured merge.
//!
//! Nodes live in a `Vec` and refer to each other through [`NodeId`] indices.
//! A branch owns its children (by id) in source order; the parent link is a
//! plain index and never keeps anything alive.

use serde::{Deserialize, Serialize};

use crate::error::{MergeError, Result};

/// Index of a node inside its [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeContent {
    /// Terminal node carrying raw source text.
    Leaf { body: String },
    /// Inner node. `open`/`close` are delimiters the printer wraps around
    /// the children (`{` and `}` for blocks); they take no part in matching.
    Branch {
        children: Vec<NodeId>,
        open: String,
        close: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub kind: String,  // grammar construct, e.g. "method_definition"
    pub label: String, // name used for nominal matching, may be empty
    pub content: NodeContent,
    pub parent: Option<NodeId>,
    /// Set on synthesized conflict leaves only.
    pub is_conflict: bool,
}

impl Node {
    fn leaf(kind: &str, label: &str, body: &str) -> Self {
        Self {
            kind: kind.to_string(),
            label: label.to_string(),
            content: NodeContent::Leaf {
                body: body.to_string(),
            },
            parent: None,
            is_conflict: false,
        }
    }

    fn branch(kind: &str, label: &str) -> Self {
        Self {
            kind: kind.to_string(),
            label: label.to_string(),
            content: NodeContent::Branch {
                children: Vec::new(),
                open: String::new(),
                close: String::new(),
            },
            parent: None,
            is_conflict: false,
        }
    }

    /// Same grammar construct and same name: the nominal match used in
    /// unordered contexts.
    pub fn same_identity(&self, other: &Node) -> bool {
        self.kind == other.kind && self.label == other.label
    }

    /// Same grammar construct, name ignored: the positional match used in
    /// ordered contexts.
    pub fn same_kind(&self, other: &Node) -> bool {
        self.kind == other.kind
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.content, NodeContent::Leaf { .. })
    }

    pub fn is_branch(&self) -> bool {
        matches!(self.content, NodeContent::Branch { .. })
    }

    pub fn body(&self) -> Option<&str> {
        match &self.content {
            NodeContent::Leaf { body } => Some(body),
            NodeContent::Branch { .. } => None,
        }
    }

    pub fn children(&self) -> &[NodeId] {
        match &self.content {
            NodeContent::Leaf { .. } => &[],
            NodeContent::Branch { children, .. } => children,
        }
    }

    /// Copy of this node without children and with fresh flags.
    fn shallow(&self) -> Self {
        let content = match &self.content {
            NodeContent::Leaf { body } => NodeContent::Leaf { body: body.clone() },
            NodeContent::Branch { open, close, .. } => NodeContent::Branch {
                children: Vec::new(),
                open: open.clone(),
                close: close.clone(),
            },
        };
        Self {
            kind: self.kind.clone(),
            label: self.label.clone(),
            content,
            parent: None,
            is_conflict: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Tree {
    /// New tree whose root is a branch.
    pub fn new(kind: &str, label: &str) -> Self {
        Self {
            nodes: vec![Node::branch(kind, label)],
            root: NodeId(0),
        }
    }

    /// New tree consisting of a single leaf.
    pub fn new_leaf(kind: &str, label: &str, body: &str) -> Self {
        Self {
            nodes: vec![Node::leaf(kind, label, body)],
            root: NodeId(0),
        }
    }

    /// Empty arena for a tree assembled node by node; the caller must
    /// `set_root` before handing it out.
    pub(crate) fn detached() -> Self {
        Self {
            nodes: Vec::new(),
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub(crate) fn set_root(&mut self, id: NodeId) {
        self.root = id;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).children()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn child_at(&self, id: NodeId, position: usize) -> Option<NodeId> {
        self.children(id).get(position).copied()
    }

    /// First child of `parent` with the same identity as `probe`.
    pub fn compatible_child(&self, parent: NodeId, probe: &Node) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|&c| self.node(c).same_identity(probe))
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Allocate a detached leaf; attach it with [`Tree::append_child`].
    pub fn alloc_leaf(&mut self, kind: &str, label: &str, body: &str) -> NodeId {
        self.alloc(Node::leaf(kind, label, body))
    }

    pub fn push_leaf(&mut self, parent: NodeId, kind: &str, label: &str, body: &str) -> Result<NodeId> {
        let id = self.alloc_leaf(kind, label, body);
        self.append_child(parent, id)?;
        Ok(id)
    }

    pub fn push_branch(&mut self, parent: NodeId, kind: &str, label: &str) -> Result<NodeId> {
        let id = self.alloc(Node::branch(kind, label));
        self.append_child(parent, id)?;
        Ok(id)
    }

    /// Set the printer delimiters of a branch. No-op on leaves.
    pub fn set_delimiters(&mut self, id: NodeId, open_text: &str, close_text: &str) {
        if let NodeContent::Branch { open, close, .. } = &mut self.node_mut(id).content {
            *open = open_text.to_string();
            *close = close_text.to_string();
        }
    }

    pub fn set_body(&mut self, id: NodeId, text: &str) -> Result<()> {
        let node = self.node_mut(id);
        if let NodeContent::Leaf { body } = &mut node.content {
            *body = text.to_string();
            return Ok(());
        }
        Err(MergeError::TextualMerge {
            cause: format!("cannot store text in branch `{}`", node.kind),
        })
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let node = &mut self.nodes[parent.0];
        let NodeContent::Branch { children, .. } = &mut node.content else {
            return Err(MergeError::Invariant {
                context: format!("append to leaf `{}`", node.kind),
            });
        };
        children.push(child);
        self.nodes[child.0].parent = Some(parent);
        Ok(())
    }

    /// Copy `id` from `src` into this arena: kind, label, body and
    /// delimiters, no children, fresh flags.
    pub fn clone_shallow_from(&mut self, src: &Tree, id: NodeId) -> NodeId {
        self.alloc(src.node(id).shallow())
    }

    /// Copy the whole subtree under `id` from `src` into this arena.
    /// The returned node is detached.
    pub fn clone_deep_from(&mut self, src: &Tree, id: NodeId) -> NodeId {
        let copy = self.clone_shallow_from(src, id);
        self.node_mut(copy).is_conflict = src.node(id).is_conflict;
        for &child in src.children(id) {
            let child_copy = self.clone_deep_from(src, child);
            // `copy` is a branch whenever `id` has children
            if let NodeContent::Branch { children, .. } = &mut self.nodes[copy.0].content {
                children.push(child_copy);
            }
            self.nodes[child_copy.0].parent = Some(copy);
        }
        copy
    }

    /// Whitespace-free structural text of a subtree. Two subtrees with the
    /// same fingerprint are considered textually equal by the merge.
    pub fn fingerprint(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_fingerprint(id, &mut out);
        out
    }

    fn write_fingerprint(&self, id: NodeId, out: &mut String) {
        let node = self.node(id);
        out.push_str(&node.kind);
        out.push(':');
        out.push_str(&normalize(&node.label));
        match &node.content {
            NodeContent::Leaf { body } => {
                out.push('"');
                out.push_str(&normalize(body));
                out.push('"');
            }
            NodeContent::Branch { children, .. } => {
                out.push('[');
                for &child in children {
                    self.write_fingerprint(child, out);
                    out.push(';');
                }
                out.push(']');
            }
        }
    }

    /// Nodes reachable from the root, parents before children.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        if self.nodes.is_empty() {
            return out;
        }
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Depth of the deepest node below `id`, counting `id` itself as 0.
    pub fn height(&self, id: NodeId) -> usize {
        let mut deepest = 0;
        let mut stack = vec![(id, 0)];
        while let Some((id, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            stack.extend(self.children(id).iter().map(|&c| (c, depth + 1)));
        }
        deepest
    }

    pub fn conflict_count(&self) -> usize {
        self.preorder()
            .into_iter()
            .filter(|&id| self.node(id).is_conflict)
            .count()
    }

    /// Same shape, kinds, labels, bodies and conflict flags, ignoring how
    /// the nodes are laid out in the arenas.
    pub fn structurally_eq(&self, other: &Tree) -> bool {
        self.subtree_eq(self.root, other, other.root)
    }

    fn subtree_eq(&self, a: NodeId, other: &Tree, b: NodeId) -> bool {
        let (x, y) = (self.node(a), other.node(b));
        if !x.same_identity(y) || x.is_conflict != y.is_conflict || x.body() != y.body() {
            return false;
        }
        x.children().len() == y.children().len()
            && x
                .children()
                .iter()
                .zip(y.children())
                .all(|(&ca, &cb)| self.subtree_eq(ca, other, cb))
    }
}

/// Drops every whitespace character so formatting-only edits compare equal.
pub fn normalize(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}
