// SPDX-License-Identifier: MIT OR Apache-2.0
//! The normalized request/response record emitted by traffic ingestion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One HTTP request/response pair extracted from an access-log line,
/// normalized for aggregation.
///
/// Invariants upheld by the ingestor before a record is emitted:
///
/// - `method` is uppercase.
/// - `path` starts with `/`, excludes the query string, is percent-decoded,
///   has no duplicate slashes, and carries no trailing slash unless it is
///   exactly `/`.
/// - `status` lies in `100..=599`.
/// - `query` and `headers` are always present (an empty mapping is fine).
/// - Sensitive keys have already been redacted per the configured policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Uppercase HTTP verb.
    pub method: String,
    /// Normalized request path (no query, percent-decoded, collapsed).
    pub path: String,
    /// Original request-URI as it appeared in the log, query included.
    pub raw_path: String,
    /// HTTP status code, `100..=599`.
    pub status: u16,
    /// Request instant, converted to UTC.
    pub timestamp: DateTime<Utc>,
    /// Query parameters; keys case-preserved, values in order of appearance.
    pub query: BTreeMap<String, Vec<String>>,
    /// Headers; keys lowercased, comma-delimited values split.
    pub headers: BTreeMap<String, Vec<String>>,
    /// Request host, when known (empty otherwise).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub host: String,
    /// URI scheme, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    /// Response body size in bytes; `None` when the log carried `-`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_bytes: Option<u64>,
}

impl NormalizedRecord {
    /// Number of path segments (root `/` has zero).
    #[must_use]
    pub fn segment_count(&self) -> usize {
        self.segments().count()
    }

    /// Iterate over the non-empty path segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|s| !s.is_empty())
    }

    /// Check the path invariants documented on this type.
    ///
    /// Returns the first violated invariant as a human-readable reason.
    pub fn check_path_invariants(&self) -> Result<(), String> {
        if !self.path.starts_with('/') {
            return Err(format!("path {:?} does not start with '/'", self.path));
        }
        if self.path.contains('?') {
            return Err(format!("path {:?} contains a query delimiter", self.path));
        }
        if self.path.contains("//") {
            return Err(format!("path {:?} contains duplicate slashes", self.path));
        }
        if self.path.len() > 1 && self.path.ends_with('/') {
            return Err(format!("path {:?} has a trailing slash", self.path));
        }
        Ok(())
    }
}
