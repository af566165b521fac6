// SPDX-License-Identifier: MIT OR Apache-2.0
//! Operation-to-span matching.

use flowspec_contract::Operation;
use flowspec_trace::Span;
use serde_json::Value;

/// Span attribute keys consulted for the HTTP method, in priority order.
const METHOD_ATTRIBUTES: &[&str] = &["http.method", "http.request.method"];

/// Span attribute keys consulted for the request URL/path, in priority order.
const URL_ATTRIBUTES: &[&str] = &["http.url", "url.path", "http.target", "http.route"];

/// How an operation finds its spans, selected by contract shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationMatcher {
    /// Source-annotation contracts: match spans whose name equals the
    /// operation id.
    ById(String),
    /// YAML contracts: match spans by HTTP method attribute and a path
    /// template comparison.
    ByRoute {
        /// Uppercase HTTP method.
        method: String,
        /// Path template with `{var}` segments.
        template: String,
    },
}

impl OperationMatcher {
    /// Choose the strategy for one contract operation.
    #[must_use]
    pub fn for_operation(endpoint_path: &str, operation: &Operation) -> Self {
        match operation.operation_id.as_deref() {
            Some(id) if !id.is_empty() => Self::ById(id.to_string()),
            _ => Self::ByRoute {
                method: operation.method.to_ascii_uppercase(),
                template: endpoint_path.to_string(),
            },
        }
    }

    /// Whether the span belongs to this operation.
    #[must_use]
    pub fn matches(&self, span: &Span) -> bool {
        match self {
            Self::ById(id) => span.name == *id,
            Self::ByRoute { method, template } => {
                let Some(span_method) = span_http_method(span) else {
                    return false;
                };
                if span_method != *method {
                    return false;
                }
                match span_url_path(span) {
                    Some(path) => template_matches(template, &path),
                    None => false,
                }
            }
        }
    }
}

/// The span's HTTP method attribute, uppercased.
fn span_http_method(span: &Span) -> Option<String> {
    METHOD_ATTRIBUTES
        .iter()
        .find_map(|key| span.attribute(key))
        .and_then(Value::as_str)
        .map(str::to_ascii_uppercase)
}

/// The span's request path, extracted from its URL attribute.
fn span_url_path(span: &Span) -> Option<String> {
    let raw = URL_ATTRIBUTES
        .iter()
        .find_map(|key| span.attribute(key))
        .and_then(Value::as_str)?;
    Some(extract_path(raw))
}

/// Reduce a URL or request-target to its path: strip scheme and authority,
/// then the query string.
fn extract_path(raw: &str) -> String {
    let after_authority = match raw.find("://") {
        Some(scheme_end) => {
            let rest = &raw[scheme_end + 3..];
            match rest.find('/') {
                Some(slash) => &rest[slash..],
                None => "/",
            }
        }
        None => raw,
    };
    let path = after_authority
        .split_once('?')
        .map_or(after_authority, |(p, _)| p);
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Segment-wise template comparison: literal segments must match verbatim,
/// `{...}` placeholders match any non-empty segment.
#[must_use]
pub fn template_matches(template: &str, path: &str) -> bool {
    let template_segments: Vec<&str> = template.split('/').filter(|s| !s.is_empty()).collect();
    let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if template_segments.len() != path_segments.len() {
        return false;
    }
    template_segments
        .iter()
        .zip(&path_segments)
        .all(|(tmpl, seg)| {
            if tmpl.starts_with('{') && tmpl.ends_with('}') {
                !seg.is_empty()
            } else {
                tmpl == seg
            }
        })
}
