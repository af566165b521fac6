// SPDX-License-Identifier: MIT OR Apache-2.0
//! HTTP method ordering and status-code classes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical ordering of HTTP methods for deterministic output.
///
/// Methods not in this list sort after it, lexicographically.
pub const CANONICAL_METHODS: &[&str] = &[
    "GET", "HEAD", "POST", "PUT", "PATCH", "DELETE", "OPTIONS", "TRACE", "CONNECT",
];

/// Sort key for an HTTP method under the canonical ordering.
#[must_use]
pub fn method_rank(method: &str) -> (usize, String) {
    let upper = method.to_ascii_uppercase();
    let rank = CANONICAL_METHODS
        .iter()
        .position(|m| *m == upper)
        .unwrap_or(CANONICAL_METHODS.len());
    (rank, upper)
}

/// The five HTTP status classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusClass {
    /// 100–199.
    #[serde(rename = "1xx")]
    Informational,
    /// 200–299.
    #[serde(rename = "2xx")]
    Success,
    /// 300–399.
    #[serde(rename = "3xx")]
    Redirection,
    /// 400–499.
    #[serde(rename = "4xx")]
    ClientError,
    /// 500–599.
    #[serde(rename = "5xx")]
    ServerError,
}

impl StatusClass {
    /// The `Nxx` label for this class.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Informational => "1xx",
            Self::Success => "2xx",
            Self::Redirection => "3xx",
            Self::ClientError => "4xx",
            Self::ServerError => "5xx",
        }
    }

    /// Parse a `Nxx` label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "1xx" => Some(Self::Informational),
            "2xx" => Some(Self::Success),
            "3xx" => Some(Self::Redirection),
            "4xx" => Some(Self::ClientError),
            "5xx" => Some(Self::ServerError),
            _ => None,
        }
    }

    /// Whether `code` falls inside this class.
    #[must_use]
    pub fn contains(self, code: u16) -> bool {
        status_class(code) == Some(self)
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Class of a status code, or `None` outside `100..=599`.
#[must_use]
pub fn status_class(code: u16) -> Option<StatusClass> {
    match code {
        100..=199 => Some(StatusClass::Informational),
        200..=299 => Some(StatusClass::Success),
        300..=399 => Some(StatusClass::Redirection),
        400..=499 => Some(StatusClass::ClientError),
        500..=599 => Some(StatusClass::ServerError),
        _ => None,
    }
}

/// Whether `code` is a valid HTTP status for FlowSpec purposes.
#[must_use]
pub fn is_valid_status(code: u16) -> bool {
    (100..=599).contains(&code)
}
