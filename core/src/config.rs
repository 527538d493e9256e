//! Merge configuration, loadable from TOML.
//!
//! ```toml
//! ordered_kinds = ["method_body", "constructor_body", "field_declaration"]
//! declaration_kinds = ["method_definition", "function_declaration"]
//! conflict_style = "diff3"
//! max_depth = 512
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Kinds whose children are matched by position rather than by name.
pub const DEFAULT_ORDERED_KINDS: &[&str] = &["method_body", "constructor_body", "field_declaration"];

/// Kinds the conflict report treats as enclosing declarations.
pub const DEFAULT_DECLARATION_KINDS: &[&str] = &["method_definition", "function_declaration"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStyle {
    /// Left and right segments only.
    Merge,
    /// Left, base (when there is one) and right segments.
    #[default]
    Diff3,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MergeConfig {
    pub ordered_kinds: Vec<String>,
    pub declaration_kinds: Vec<String>,
    pub conflict_style: ConflictStyle,
    /// Deepest nesting the merge recurses into before giving up.
    pub max_depth: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            ordered_kinds: DEFAULT_ORDERED_KINDS.iter().map(|s| s.to_string()).collect(),
            declaration_kinds: DEFAULT_DECLARATION_KINDS.iter().map(|s| s.to_string()).collect(),
            conflict_style: ConflictStyle::default(),
            max_depth: 512,
        }
    }
}

impl MergeConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn is_ordered(&self, kind: &str) -> bool {
        self.ordered_kinds.iter().any(|k| k == kind)
    }

    pub fn is_declaration(&self, kind: &str) -> bool {
        self.declaration_kinds.iter().any(|k| k == kind)
    }
}
