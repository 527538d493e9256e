//! Leaf-level three-way text merge and conflict blocks.

use serde::{Deserialize, Serialize};

use crate::config::ConflictStyle;
use crate::tree::normalize;

pub const START_MARKER: &str = "<<<<<<< MINE";
pub const BASE_MARKER: &str = "||||||| BASE";
pub const SEPARATOR: &str = "=======";
pub const END_MARKER: &str = ">>>>>>> YOURS";

/// Outcome of merging three leaf bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextMerge<'a> {
    /// One side's text, with its original formatting.
    Clean(&'a str),
    /// Both sides changed the text differently.
    Conflict,
}

/// Three-way merge of leaf text. Whitespace is ignored when comparing but
/// the chosen body is returned untouched.
pub fn merge_text<'a>(left: &'a str, base: &str, right: &'a str) -> TextMerge<'a> {
    let (l, b, r) = (normalize(left), normalize(base), normalize(right));
    if l == r {
        TextMerge::Clean(left)
    } else if l == b {
        TextMerge::Clean(right)
    } else if r == b {
        TextMerge::Clean(left)
    } else {
        TextMerge::Conflict
    }
}

/// One `<<<<<<< ... >>>>>>>` region. Segments keep their trailing newline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictBlock {
    pub left: String,
    pub base: Option<String>,
    pub right: String,
}

impl ConflictBlock {
    pub fn new(left: String, base: Option<String>, right: String) -> Self {
        Self { left, base, right }
    }

    pub fn render(&self, style: ConflictStyle) -> String {
        let mut out = String::new();
        out.push_str(START_MARKER);
        out.push('\n');
        out.push_str(&self.left);
        if let (ConflictStyle::Diff3, Some(base)) = (style, &self.base) {
            out.push_str(BASE_MARKER);
            out.push('\n');
            out.push_str(base);
        }
        out.push_str(SEPARATOR);
        out.push('\n');
        out.push_str(&self.right);
        out.push_str(END_MARKER);
        out
    }
}

/// Whether `text` holds a conflict start marker once blank lines are
/// dropped.
pub fn contains_conflict(text: &str) -> bool {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .any(|line| line.trim_start().starts_with("<<<<<<<"))
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Section {
    Outside,
    Left,
    Base,
    Right,
}

/// Pull every conflict block out of `text`. Unterminated blocks are dropped.
pub fn parse_blocks(text: &str) -> Vec<ConflictBlock> {
    let mut blocks = Vec::new();
    let mut section = Section::Outside;
    let mut current = ConflictBlock::default();

    for line in text.lines() {
        let marker = line.trim_start();
        match section {
            Section::Outside if marker.starts_with("<<<<<<<") => {
                current = ConflictBlock::default();
                section = Section::Left;
            }
            Section::Outside => {}
            Section::Left | Section::Base if marker.starts_with("|||||||") => {
                current.base = Some(String::new());
                section = Section::Base;
            }
            Section::Left | Section::Base if marker.starts_with("=======") => {
                section = Section::Right;
            }
            Section::Right if marker.starts_with(">>>>>>>") => {
                blocks.push(std::mem::take(&mut current));
                section = Section::Outside;
            }
            Section::Left => push_line(&mut current.left, line),
            Section::Base => push_line(current.base.get_or_insert_with(String::new), line),
            Section::Right => push_line(&mut current.right, line),
        }
    }
    blocks
}

fn push_line(segment: &mut String, line: &str) {
    segment.push_str(line);
    segment.push('\n');
}
