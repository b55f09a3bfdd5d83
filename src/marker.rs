//! Do-not-build marker scan. Dropping the token `NOBUILD` anywhere in a
//! watched source tree stops the pipeline before it spawns a single
//! subprocess, so half-finished edits cannot end up in a linked module.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::context::BuildContext;
use crate::errors::{BuildError, MarkerError};

pub const MARKER: &str = "NOBUILD";

/// One marker hit. Line and column are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerOccurrence {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for MarkerOccurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}: {MARKER}", self.file.display(), self.line, self.column)
    }
}

fn scan_file(path: &Path, occurrences: &mut Vec<MarkerOccurrence>) {
    // Non-UTF-8 files (compiled blobs, images) cannot carry the marker.
    let Ok(text) = fs::read_to_string(path) else {
        return;
    };
    for (line_idx, line) in text.lines().enumerate() {
        let mut start = 0;
        while let Some(found) = line[start..].find(MARKER) {
            let column = start + found;
            occurrences.push(MarkerOccurrence {
                file: path.to_path_buf(),
                line: line_idx + 1,
                column: column + 1,
            });
            start = column + MARKER.len();
        }
    }
}

/// Walk every watched tree and collect all marker occurrences, sorted by
/// path then position so reports are stable.
pub fn scan_trees(trees: &[PathBuf]) -> Vec<MarkerOccurrence> {
    let mut occurrences = Vec::new();
    for tree in trees {
        for entry in WalkDir::new(tree).into_iter().filter_map(Result::ok) {
            if entry.file_type().is_file() {
                scan_file(entry.path(), &mut occurrences);
            }
        }
    }
    occurrences.sort_by(|a, b| {
        (&a.file, a.line, a.column).cmp(&(&b.file, b.line, b.column))
    });
    occurrences
}

/// Abort the invocation if the marker is present and the override is not
/// set. Runs before any stage starts.
pub fn check(ctx: &BuildContext) -> Result<(), BuildError> {
    if ctx.config.allow_nobuild {
        return Ok(());
    }
    let occurrences = scan_trees(&ctx.watched_trees());
    if occurrences.is_empty() {
        Ok(())
    } else {
        Err(MarkerError { occurrences }.into())
    }
}
