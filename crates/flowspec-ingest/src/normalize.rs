// SPDX-License-Identifier: MIT OR Apache-2.0
//! Path, query, and header normalization.

use percent_encoding::percent_decode_str;
use std::collections::BTreeMap;

/// Split a request-URI at the first `?` into path and raw query.
#[must_use]
pub fn split_request_uri(uri: &str) -> (&str, Option<&str>) {
    match uri.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (uri, None),
    }
}

/// Normalize a request path: percent-decode, collapse duplicate slashes,
/// strip the trailing slash (root excepted), ensure a leading slash.
#[must_use]
pub fn normalize_path(raw: &str) -> String {
    let decoded = percent_decode_str(raw).decode_utf8_lossy();

    let mut out = String::with_capacity(decoded.len() + 1);
    if !decoded.starts_with('/') {
        out.push('/');
    }
    let mut last_was_slash = out.ends_with('/');
    for ch in decoded.chars() {
        if ch == '/' {
            if last_was_slash {
                continue;
            }
            last_was_slash = true;
        } else {
            last_was_slash = false;
        }
        out.push(ch);
    }

    if out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

/// Parse a raw query string into an ordered multi-valued mapping.
///
/// Keys are case-preserved; both keys and values are percent-decoded. A
/// parameter without `=` gets an empty value.
#[must_use]
pub fn parse_query(raw: &str) -> BTreeMap<String, Vec<String>> {
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for part in raw.split('&') {
        if part.is_empty() {
            continue;
        }
        let (key, value) = match part.split_once('=') {
            Some((k, v)) => (k, v),
            None => (part, ""),
        };
        let key = percent_decode_str(key).decode_utf8_lossy().into_owned();
        let value = percent_decode_str(value).decode_utf8_lossy().into_owned();
        out.entry(key).or_default().push(value);
    }
    out
}

/// Build a header entry: lowercase the name, split comma-delimited values.
///
/// Returns `None` for empty or `-` values (the access-log "absent" marker).
#[must_use]
pub fn header_entry(name: &str, value: &str) -> Option<(String, Vec<String>)> {
    let value = value.trim();
    if value.is_empty() || value == "-" {
        return None;
    }
    let values: Vec<String> = value
        .split(',')
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    if values.is_empty() {
        return None;
    }
    Some((name.to_ascii_lowercase(), values))
}
