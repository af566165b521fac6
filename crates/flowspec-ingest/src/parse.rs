// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-line parsing: presets, custom regexes, timestamp layout.

use crate::format::LogFormat;
use chrono::{DateTime, Utc};
use flowspec_core::http::is_valid_status;
use flowspec_error::{ErrorCode, FlowError};
use regex::Regex;

/// The fixed timestamp layout shared by both presets (and reused for custom
/// regexes): `dd/MMM/yyyy:HH:mm:ss ±hhmm`.
pub const TIMESTAMP_LAYOUT: &str = "%d/%b/%Y:%H:%M:%S %z";

const COMBINED_PATTERN: &str = r#"^(\S+) (\S+) (\S+) \[([^\]]+)\] "(\S+) (\S+) (\S+)" (\d{3}) (\S+) "([^"]*)" "([^"]*)"\s*$"#;
const COMMON_PATTERN: &str =
    r#"^(\S+) (\S+) (\S+) \[([^\]]+)\] "(\S+) (\S+) (\S+)" (\d{3}) (\S+)\s*$"#;

/// Positional capture-group meaning, shared by presets and custom regexes.
mod group {
    pub const REMOTE_ADDR: usize = 1;
    pub const REMOTE_USER: usize = 3;
    pub const TIME: usize = 4;
    pub const METHOD: usize = 5;
    pub const REQUEST_URI: usize = 6;
    pub const STATUS: usize = 8;
    pub const BODY_BYTES: usize = 9;
    pub const REFERER: usize = 10;
    pub const USER_AGENT: usize = 11;

    /// Groups 1..=8 must exist for a line to be parseable at all.
    pub const MIN_GROUPS: usize = 8;
}

/// One successfully parsed line, before normalization.
#[derive(Debug, Clone)]
pub struct RawHit {
    /// Client address, as logged.
    pub remote_addr: String,
    /// Authenticated user, or `-`.
    pub remote_user: String,
    /// Request instant, converted to UTC.
    pub timestamp: DateTime<Utc>,
    /// HTTP verb, as logged.
    pub method: String,
    /// Request-URI including any query string.
    pub request_uri: String,
    /// Response status.
    pub status: u16,
    /// Body size; `0` when the log carried `-`.
    pub body_bytes: Option<u64>,
    /// Referer header, when the format captures it.
    pub referer: Option<String>,
    /// User-agent header, when the format captures it.
    pub user_agent: Option<String>,
}

/// Why a line was rejected. Recovered locally into metrics.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseRejection {
    /// The line did not match the configured pattern.
    #[error("line does not match the configured format")]
    NoMatch,
    /// The timestamp field did not match [`TIMESTAMP_LAYOUT`].
    #[error("unparseable timestamp {value:?}")]
    BadTimestamp {
        /// The offending field content.
        value: String,
    },
    /// The status field was not an integer in `100..=599`.
    #[error("invalid status code {value:?}")]
    BadStatus {
        /// The offending field content.
        value: String,
    },
}

/// Compiled line parser for one ingestion run.
#[derive(Debug)]
pub struct LineParser {
    re: Regex,
}

impl LineParser {
    /// Compile the parser for a format. An invalid custom regex (or one with
    /// too few capture groups) is a fatal error.
    pub fn new(format: &LogFormat) -> Result<Self, FlowError> {
        let pattern = match format {
            LogFormat::Combined => COMBINED_PATTERN,
            LogFormat::Common => COMMON_PATTERN,
            LogFormat::Custom(p) => p.as_str(),
        };
        let re = Regex::new(pattern).map_err(|e| {
            FlowError::new(
                ErrorCode::RegexInvalid,
                format!("invalid log regex: {e}"),
            )
            .with_context("pattern", pattern)
        })?;
        if re.captures_len() <= group::MIN_GROUPS {
            return Err(FlowError::new(
                ErrorCode::RegexInvalid,
                format!(
                    "log regex must capture at least {} groups (remote_addr, ident, user, \
                     time, method, request-uri, protocol, status), found {}",
                    group::MIN_GROUPS,
                    re.captures_len() - 1
                ),
            ));
        }
        Ok(Self { re })
    }

    /// Parse one line into a [`RawHit`].
    pub fn parse(&self, line: &str) -> Result<RawHit, ParseRejection> {
        let caps = self.re.captures(line).ok_or(ParseRejection::NoMatch)?;
        let field = |i: usize| caps.get(i).map(|m| m.as_str());

        let time_text = field(group::TIME).unwrap_or_default();
        let timestamp = DateTime::parse_from_str(time_text, TIMESTAMP_LAYOUT)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| ParseRejection::BadTimestamp {
                value: time_text.to_string(),
            })?;

        let status_text = field(group::STATUS).unwrap_or_default();
        let status: u16 = status_text
            .parse()
            .ok()
            .filter(|s| is_valid_status(*s))
            .ok_or_else(|| ParseRejection::BadStatus {
                value: status_text.to_string(),
            })?;

        let body_bytes = field(group::BODY_BYTES).map(parse_body_bytes);

        Ok(RawHit {
            remote_addr: field(group::REMOTE_ADDR).unwrap_or_default().to_string(),
            remote_user: field(group::REMOTE_USER).unwrap_or_default().to_string(),
            timestamp,
            method: field(group::METHOD).unwrap_or_default().to_string(),
            request_uri: field(group::REQUEST_URI).unwrap_or_default().to_string(),
            status,
            body_bytes,
            referer: field(group::REFERER).map(str::to_string).filter(meaningful),
            user_agent: field(group::USER_AGENT)
                .map(str::to_string)
                .filter(meaningful),
        })
    }
}

/// `-` means "no body"; anything unparseable degrades to 0.
fn parse_body_bytes(text: &str) -> u64 {
    if text == "-" { 0 } else { text.parse().unwrap_or(0) }
}

fn meaningful(value: &String) -> bool {
    !value.is_empty() && value != "-"
}
