// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reusable command logic shared by the binary and the end-to-end tests.

use flowspec_contract::{ContractError, ServiceSpec, from_yaml_file};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Load a contract from a file, or merge every `*.yaml`/`*.yml` in a
/// directory (sorted by filename, first file's identity wins).
pub fn load_contract_path(path: &Path) -> Result<ServiceSpec, ContractError> {
    if !path.is_dir() {
        return from_yaml_file(path);
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(path)
        .map_err(|source| ContractError::Io {
            path: path.display().to_string(),
            source,
        })?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .map(|ext| ext == "yaml" || ext == "yml")
                .unwrap_or(false)
        })
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(ContractError::Parse {
            reason: format!("no contract files (*.yaml, *.yml) in {}", path.display()),
        });
    }

    let mut specs = Vec::with_capacity(files.len());
    for file in &files {
        specs.push(from_yaml_file(file)?);
    }
    Ok(ServiceSpec::merge(specs).expect("at least one file was parsed"))
}

/// Parse a human duration: `500ms`, `30s`, `2m`, or bare seconds.
pub fn parse_duration(text: &str) -> Result<Duration, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err("empty duration".to_string());
    }
    let (number, unit): (&str, &str) = if let Some(v) = text.strip_suffix("ms") {
        (v, "ms")
    } else if let Some(v) = text.strip_suffix('s') {
        (v, "s")
    } else if let Some(v) = text.strip_suffix('m') {
        (v, "m")
    } else {
        (text, "s")
    };
    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration {text:?} (use e.g. 500ms, 30s, 2m)"))?;
    if value < 0.0 {
        return Err(format!("duration {text:?} must not be negative"));
    }
    Ok(match unit {
        "ms" => Duration::from_secs_f64(value / 1000.0),
        "m" => Duration::from_secs_f64(value * 60.0),
        _ => Duration::from_secs_f64(value),
    })
}
