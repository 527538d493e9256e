//! Error types for the structured merge.
//!
//! Every failure aborts the whole merge; no partial tree is returned.
//! [`MergeError::is_structural`] tells a caller when falling back to a
//! line-based merge makes sense.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which of the three merge inputs an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Base,
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Left => "left",
            Side::Base => "base",
            Side::Right => "right",
        })
    }
}

#[derive(Debug, Error)]
pub enum MergeError {
    /// The parser rejected one of the inputs.
    #[error("parse error{}: {cause}", side.map(|s| format!(" in {s} version")).unwrap_or_default())]
    Parse { side: Option<Side>, cause: String },

    /// One of the three versions of the file does not exist.
    #[error("The merged file was deleted in one version ({side}: {}).", path.display())]
    FileDeleted { side: Side, path: PathBuf },

    /// Leaf text could not be merged (bad encoding, or the merger was handed
    /// something that is not text).
    #[error("textual merge failed: {cause}")]
    TextualMerge { cause: String },

    /// Internal bug: nodes that must be compatible were not.
    #[error("merge invariant violated: {context}")]
    Invariant { context: String },

    #[error("tree nesting exceeds the configured limit of {limit}")]
    DepthExceeded { limit: usize },

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MergeError {
    /// Attach the input side to a parse error raised without one.
    pub fn on_side(self, side: Side) -> Self {
        match self {
            MergeError::Parse { side: None, cause } => MergeError::Parse {
                side: Some(side),
                cause,
            },
            other => other,
        }
    }

    /// Failures where the inputs could not be turned into trees; a caller
    /// should retry with a line-based merge.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            MergeError::Parse { .. } | MergeError::FileDeleted { .. } | MergeError::DepthExceeded { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, MergeError>;
