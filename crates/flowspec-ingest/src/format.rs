// SPDX-License-Identifier: MIT OR Apache-2.0
//! Log-format presets and the fast `supports` probe.

use crate::decode;
use flowspec_error::{ErrorCode, FlowError};
use regex::Regex;
use std::io::BufRead;
use std::path::Path;
use std::sync::OnceLock;

/// Names of the built-in parsing strategies.
pub const SUPPORTED_PRESETS: &[&str] = &["combined", "common", "custom"];

/// Example line accepted by the `combined` preset.
pub const COMBINED_EXAMPLE: &str = r#"127.0.0.1 - alice [10/Aug/2025:12:00:00 +0000] "GET /api/users/1?include=profile HTTP/1.1" 200 512 "https://example.com/" "curl/8.4.0""#;

/// Example line accepted by the `common` preset.
pub const COMMON_EXAMPLE: &str =
    r#"127.0.0.1 - - [10/Aug/2025:12:00:00 +0000] "POST /api/orders HTTP/1.1" 201 -"#;

/// The parsing strategy for an ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    /// Apache/nginx combined format (with referer and user-agent).
    Combined,
    /// Common log format (combined minus referer/user-agent).
    Common,
    /// A user-supplied regular expression; capture groups map positionally
    /// to the combined preset's fields.
    Custom(String),
}

impl LogFormat {
    /// Resolve a preset name (plus optional custom regex) into a format.
    ///
    /// The failure message enumerates the supported presets and shows
    /// concrete example lines so a format mismatch is diagnosable.
    pub fn resolve(name: &str, custom_regex: Option<&str>) -> Result<Self, FlowError> {
        match name.to_ascii_lowercase().as_str() {
            "combined" => Ok(Self::Combined),
            "common" => Ok(Self::Common),
            "custom" => match custom_regex {
                Some(re) if !re.trim().is_empty() => Ok(Self::Custom(re.to_string())),
                _ => Err(FlowError::new(
                    ErrorCode::PresetUnknown,
                    "log format `custom` requires --regex with a non-empty pattern",
                )),
            },
            other => Err(FlowError::new(
                ErrorCode::PresetUnknown,
                unsupported_format_message(other),
            )),
        }
    }
}

/// Build the unsupported-format diagnostic: supported presets plus example
/// lines for each.
#[must_use]
pub fn unsupported_format_message(requested: &str) -> String {
    format!(
        "unsupported log format {requested:?}; supported presets: {}.\n\
         example (combined): {COMBINED_EXAMPLE}\n\
         example (common):   {COMMON_EXAMPLE}",
        SUPPORTED_PRESETS.join(", ")
    )
}

fn sniff_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"^\s*\d{1,3}(?:\.\d{1,3}){3}\s.*\[[^\]]+\]\s+"[A-Z]+ \S+ HTTP/[0-9.]+"\s+\d{3}"#,
        )
        .expect("sniff pattern is valid")
    })
}

/// Fast probe: does this path look like an access log we can ingest?
///
/// The filename is checked first; when it is inconclusive, up to five
/// non-empty lines are sniffed (through the decompressor, so `.gz`/`.zst`
/// logs are probed too).
#[must_use]
pub fn supports(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    if name.ends_with(".log") || name.ends_with(".log.gz") || name.ends_with(".log.zst") {
        return true;
    }
    if name.contains("access") {
        return true;
    }

    match decode::open_reader(path) {
        Ok(reader) => sniff_reader(reader),
        Err(_) => false,
    }
}

/// Content sniff: match up to five non-empty lines against the access-log
/// shape `<ipv4> … [<date>] "<METHOD> <path> HTTP/<ver>" <status>`.
fn sniff_reader(mut reader: Box<dyn BufRead + Send>) -> bool {
    let re = sniff_regex();
    let mut inspected = 0;
    while inspected < 5 {
        match decode::read_line_capped(reader.as_mut(), decode::MAX_LINE_BYTES) {
            Ok(decode::LineRead::Line(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                inspected += 1;
                if re.is_match(&line) {
                    return true;
                }
            }
            Ok(decode::LineRead::Eof) | Ok(decode::LineRead::TooLong) | Err(_) => break,
        }
    }
    false
}
