// SPDX-License-Identifier: MIT OR Apache-2.0
//! Span and trace value types.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Span status, normalized across input formats to `UNSET`/`OK`/`ERROR`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanStatus {
    /// Status code label.
    #[serde(default)]
    pub code: String,
    /// Optional status message.
    #[serde(default)]
    pub message: String,
}

/// A point-in-time event attached to a span.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpanEvent {
    /// Event name.
    #[serde(default)]
    pub name: String,
    /// Event instant in Unix nanoseconds, when known.
    #[serde(default)]
    pub timestamp_ns: Option<u64>,
    /// Event attributes.
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

/// One unit of traced work.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    /// Owning trace identifier.
    #[serde(default)]
    pub trace_id: String,
    /// Span identifier, unique within the trace.
    #[serde(default)]
    pub span_id: String,
    /// Parent span, absent for roots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    /// Span name (operation name for annotation-matched contracts).
    #[serde(default)]
    pub name: String,
    /// Start instant in Unix nanoseconds.
    #[serde(default)]
    pub start_time_ns: u64,
    /// End instant in Unix nanoseconds; never before the start.
    #[serde(default)]
    pub end_time_ns: u64,
    /// Normalized status.
    #[serde(default)]
    pub status: SpanStatus,
    /// String-keyed scalar attributes (resource/scope metadata merged in for
    /// OTLP input).
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
    /// Attached events.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SpanEvent>,
}

impl Span {
    /// Span duration in nanoseconds.
    #[must_use]
    pub fn duration_ns(&self) -> u64 {
        self.end_time_ns.saturating_sub(self.start_time_ns)
    }

    /// Look up an attribute by exact key.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// A loaded trace with its topology.
///
/// The span map is read-only after load; the alignment engine holds a view
/// of it and never mutates.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceData {
    /// Trace identifier.
    pub trace_id: String,
    /// Spans keyed by span id, for random access.
    pub spans: BTreeMap<String, Span>,
    /// Span ids in input order, for ordered iteration.
    pub span_order: Vec<String>,
    /// Children per span id (ids sorted), built at load time.
    pub children: BTreeMap<String, Vec<String>>,
    /// All root span ids, sorted lexicographically.
    pub roots: Vec<String>,
    /// The lexicographically first root.
    pub root_span: String,
}

impl TraceData {
    /// Look up a span by id.
    #[must_use]
    pub fn span(&self, id: &str) -> Option<&Span> {
        self.spans.get(id)
    }

    /// Iterate spans in input order.
    pub fn iter_ordered(&self) -> impl Iterator<Item = &Span> {
        self.span_order.iter().filter_map(|id| self.spans.get(id))
    }

    /// Number of spans in the trace.
    #[must_use]
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Whether the trace holds no spans (never true for a loaded trace).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}
