//! stmerge_core: three-way structured merge over syntax trees.
//!
//! Left and right are merged against their common ancestor by recursively
//! matching nodes (by name in unordered contexts, by position in ordered
//! ones) instead of diffing lines. Irreconcilable regions collapse into
//! conflict leaves.

mod additions;
mod anchored;
mod ast;
mod config;
mod conflict;
mod correlate;
mod error;
mod files;
mod merge;
mod printer;
mod tree;

pub use ast::{AstLanguage, parse_source};
pub use config::{ConflictStyle, DEFAULT_DECLARATION_KINDS, DEFAULT_ORDERED_KINDS, MergeConfig};
pub use conflict::{ConflictBlock, TextMerge, contains_conflict, merge_text, parse_blocks};
pub use correlate::{Difference, DifferenceKind, correlate_conflicts, signature_of};
pub use error::{MergeError, Result, Side};
pub use files::{FileMerge, merge_files, three_way_merge_source};
pub use merge::{MergeOutcome, merge, merge_with_report};
pub use printer::{render, render_node};
pub use tree::{Node, NodeContent, NodeId, Tree, normalize};
