//! File-level driver: read, parse, merge and render three versions of a
//! source file.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::ast::{parse_source, AstLanguage};
use crate::config::MergeConfig;
use crate::correlate::Difference;
use crate::error::{MergeError, Result, Side};
use crate::merge::merge_with_report;
use crate::printer::render;

#[derive(Debug, Clone, Serialize)]
pub struct FileMerge {
    pub merged_code: String,
    pub conflicts: usize,
    pub differences: Vec<Difference>,
}

/// Structured three-way merge of source text.
pub fn three_way_merge_source(
    left_code: &str,
    base_code: &str,
    right_code: &str,
    lang: AstLanguage,
    config: &MergeConfig,
) -> Result<FileMerge> {
    let left = parse_source(left_code, lang).map_err(|e| e.on_side(Side::Left))?;
    let base = parse_source(base_code, lang).map_err(|e| e.on_side(Side::Base))?;
    let right = parse_source(right_code, lang).map_err(|e| e.on_side(Side::Right))?;
    debug!(
        left = left.len(),
        base = base.len(),
        right = right.len(),
        "parsed three versions"
    );

    let mut differences = Vec::new();
    let outcome = merge_with_report(&left, &base, &right, config, &mut differences)?;
    Ok(FileMerge {
        merged_code: render(&outcome.tree),
        conflicts: outcome.conflicts,
        differences,
    })
}

/// Structured three-way merge of three files on disk.
pub fn merge_files(
    left: &Path,
    base: &Path,
    right: &Path,
    lang: AstLanguage,
    config: &MergeConfig,
) -> Result<FileMerge> {
    let left_code = read_version(left, Side::Left)?;
    let base_code = read_version(base, Side::Base)?;
    let right_code = read_version(right, Side::Right)?;

    let merged = three_way_merge_source(&left_code, &base_code, &right_code, lang, config)?;
    info!(
        file = %base.display(),
        conflicts = merged.conflicts,
        "structured merge done"
    );
    Ok(merged)
}

fn read_version(path: &Path, side: Side) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => MergeError::FileDeleted {
            side,
            path: path.to_path_buf(),
        },
        _ => MergeError::Io(e),
    })?;
    String::from_utf8(bytes).map_err(|e| MergeError::TextualMerge {
        cause: format!("{side} version of {} is not valid UTF-8: {e}", path.display()),
    })
}
