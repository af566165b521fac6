// SPDX-License-Identifier: MIT OR Apache-2.0
//! Expansion of traffic input arguments: files, directories, globs.

use flowspec_error::{ErrorCode, FlowError};
use globset::Glob;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Expand each `--traffic` argument into concrete files, preserving
/// argument order (and sorting within one expansion for determinism).
///
/// A literal file is taken as-is; a directory contributes every file the
/// ingestor [`supports`](flowspec_ingest::supports); a pattern with glob
/// metacharacters is expanded from its literal prefix. A missing literal
/// path is an immediate error.
pub fn expand_traffic_inputs(patterns: &[String]) -> Result<Vec<PathBuf>, FlowError> {
    let mut out = Vec::new();
    for pattern in patterns {
        let as_path = Path::new(pattern);
        if as_path.is_file() {
            out.push(as_path.to_path_buf());
            continue;
        }
        if as_path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(as_path)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| flowspec_ingest::supports(p))
                .collect();
            found.sort();
            if found.is_empty() {
                return Err(FlowError::new(
                    ErrorCode::InputMissingPath,
                    format!("directory {pattern} contains no supported traffic files"),
                ));
            }
            out.extend(found);
            continue;
        }

        // A literal path that is neither a file nor a directory is a typo,
        // not a glob; walking the filesystem for it would start at its
        // parent (the root, for an absolute path).
        if !has_glob_meta(pattern) {
            return Err(FlowError::new(
                ErrorCode::InputMissingPath,
                format!("traffic input {pattern} does not exist"),
            ));
        }

        let glob = Glob::new(pattern).map_err(|e| {
            FlowError::new(
                ErrorCode::UsageInvalidFlag,
                format!("invalid traffic glob {pattern:?}: {e}"),
            )
        })?;
        let matcher = glob.compile_matcher();
        let mut found: Vec<PathBuf> = WalkDir::new(literal_base(pattern))
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| matcher.is_match(p))
            .collect();
        found.sort();
        if found.is_empty() {
            return Err(FlowError::new(
                ErrorCode::InputMissingPath,
                format!("no traffic inputs match {pattern:?}"),
            ));
        }
        out.extend(found);
    }

    if out.is_empty() {
        return Err(FlowError::new(
            ErrorCode::InputMissingPath,
            "no traffic inputs given",
        ));
    }
    Ok(out)
}

const GLOB_META: [char; 4] = ['*', '?', '[', '{'];

fn has_glob_meta(pattern: &str) -> bool {
    pattern.contains(GLOB_META)
}

/// The directory to walk for a glob: everything before the first meta
/// character, truncated to the last path separator.
fn literal_base(pattern: &str) -> PathBuf {
    let meta = pattern.find(GLOB_META).unwrap_or(pattern.len());
    let prefix = &pattern[..meta];
    match prefix.rfind('/') {
        Some(i) => PathBuf::from(&prefix[..=i]),
        None => PathBuf::from("."),
    }
}
