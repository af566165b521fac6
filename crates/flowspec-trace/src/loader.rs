// SPDX-License-Identifier: MIT OR Apache-2.0
//! Format detection and decoding of trace files.

use crate::model::{Span, SpanEvent, SpanStatus, TraceData};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Human-readable list of accepted trace formats, used in rejections.
pub const SUPPORTED_FORMATS: &str = "native FlowSpec trace JSON ({\"traceId\", \"spans\"}) \
     or OTLP JSON ({\"resourceSpans\": [...]})";

/// Pointer to the conversion documentation, for unsupported captures.
pub const MIGRATION_HINT: &str =
    "see docs/traces.md#converting-captures for converting other capture formats";

/// Errors surfaced while loading a trace.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// The file could not be read.
    #[error("cannot read trace {path}: {source}")]
    Io {
        /// Path that was requested.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The bytes are not valid JSON.
    #[error("trace is not valid JSON: {reason}")]
    Json {
        /// Parser detail.
        reason: String,
    },

    /// The JSON is valid but matches no supported trace shape.
    #[error(
        "unsupported trace format{variant}: expected {SUPPORTED_FORMATS}; {MIGRATION_HINT}",
        variant = match .detected {
            Some(name) => format!(" (detected: {name})"),
            None => String::new(),
        }
    )]
    UnrecognizedShape {
        /// The recognized-but-unsupported variant, when identifiable.
        detected: Option<String>,
    },

    /// The document carries no trace identifier.
    #[error("trace has no traceId")]
    MissingTraceId,

    /// The document carries no spans.
    #[error("trace has zero spans")]
    NoSpans,

    /// A span is malformed.
    #[error("invalid span {span_id:?}: {reason}")]
    InvalidSpan {
        /// Offending span id.
        span_id: String,
        /// What was wrong.
        reason: String,
    },

    /// The parent chain revisits a node.
    #[error("span parentage contains a cycle through {span_id:?}")]
    Cycle {
        /// A span on the cycle.
        span_id: String,
    },
}

/// Parse a trace from JSON text, detecting the format.
pub fn from_json_str(text: &str) -> Result<TraceData, TraceError> {
    let value: Value = serde_json::from_str(text).map_err(|e| TraceError::Json {
        reason: e.to_string(),
    })?;

    let Some(obj) = value.as_object() else {
        return Err(TraceError::UnrecognizedShape { detected: None });
    };

    if obj.contains_key("resourceSpans") {
        return build(decode_otlp(&value)?);
    }
    if obj.contains_key("traceId") && obj.contains_key("spans") {
        return build(decode_native(&value)?);
    }
    // Recognize common capture shapes so the rejection can name them.
    let detected = if obj.get("log").and_then(|l| l.get("entries")).is_some() {
        Some("HAR".to_string())
    } else if obj.contains_key("data") && obj.get("data").is_some_and(Value::is_array) {
        Some("Jaeger API response".to_string())
    } else {
        None
    };
    Err(TraceError::UnrecognizedShape { detected })
}

/// Read and parse a trace file.
pub fn from_json_file(path: &Path) -> Result<TraceData, TraceError> {
    let text = std::fs::read_to_string(path).map_err(|source| TraceError::Io {
        path: path.display().to_string(),
        source,
    })?;
    from_json_str(&text)
}

/// Decoded-but-unlinked spans, in input order.
struct DecodedTrace {
    trace_id: String,
    spans: Vec<Span>,
}

// ---------------------------------------------------------------------------
// Native format
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NativeDoc {
    trace_id: String,
    spans: NativeSpans,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NativeSpans {
    /// Ordered span array.
    List(Vec<Span>),
    /// Mapping from span id to span.
    Map(BTreeMap<String, Span>),
}

fn decode_native(value: &Value) -> Result<DecodedTrace, TraceError> {
    let doc: NativeDoc = serde_json::from_value(value.clone()).map_err(|e| TraceError::Json {
        reason: e.to_string(),
    })?;
    if doc.trace_id.is_empty() {
        return Err(TraceError::MissingTraceId);
    }

    let spans = match doc.spans {
        NativeSpans::List(spans) => spans,
        NativeSpans::Map(map) => map
            .into_iter()
            .map(|(id, mut span)| {
                if span.span_id.is_empty() {
                    span.span_id = id;
                }
                span
            })
            .collect(),
    };

    Ok(DecodedTrace {
        trace_id: doc.trace_id,
        spans,
    })
}

// ---------------------------------------------------------------------------
// OTLP format
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OtlpDoc {
    resource_spans: Vec<OtlpResourceSpans>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OtlpResourceSpans {
    #[serde(default)]
    resource: Option<OtlpResource>,
    #[serde(default)]
    scope_spans: Vec<OtlpScopeSpans>,
}

#[derive(Deserialize, Default)]
struct OtlpResource {
    #[serde(default)]
    attributes: Vec<OtlpKeyValue>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OtlpScopeSpans {
    #[serde(default)]
    scope: Option<OtlpScope>,
    #[serde(default)]
    spans: Vec<OtlpSpan>,
}

#[derive(Deserialize, Default)]
struct OtlpScope {
    #[serde(default)]
    name: String,
    #[serde(default)]
    version: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OtlpSpan {
    #[serde(default)]
    trace_id: String,
    #[serde(default)]
    span_id: String,
    #[serde(default)]
    parent_span_id: Option<String>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    start_time_unix_nano: Value,
    #[serde(default)]
    end_time_unix_nano: Value,
    #[serde(default)]
    status: Option<OtlpStatus>,
    #[serde(default)]
    attributes: Vec<OtlpKeyValue>,
    #[serde(default)]
    events: Vec<OtlpEvent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OtlpEvent {
    #[serde(default)]
    name: String,
    #[serde(default)]
    time_unix_nano: Value,
    #[serde(default)]
    attributes: Vec<OtlpKeyValue>,
}

#[derive(Deserialize)]
struct OtlpStatus {
    #[serde(default)]
    code: Value,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct OtlpKeyValue {
    key: String,
    #[serde(default)]
    value: OtlpAnyValue,
}

/// OTLP's typed-value representation; integers often arrive as strings.
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct OtlpAnyValue {
    #[serde(default)]
    string_value: Option<String>,
    #[serde(default)]
    int_value: Option<Value>,
    #[serde(default)]
    double_value: Option<f64>,
    #[serde(default)]
    bool_value: Option<bool>,
}

fn any_value_to_json(value: OtlpAnyValue) -> Value {
    if let Some(s) = value.string_value {
        return Value::String(s);
    }
    if let Some(i) = value.int_value {
        return match as_i64(&i) {
            Some(n) => Value::from(n),
            None => i,
        };
    }
    if let Some(d) = value.double_value {
        return serde_json::Number::from_f64(d).map_or(Value::Null, Value::Number);
    }
    if let Some(b) = value.bool_value {
        return Value::Bool(b);
    }
    Value::Null
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn as_u64(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::String(s) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

fn otlp_status(status: Option<OtlpStatus>) -> SpanStatus {
    let Some(status) = status else {
        return SpanStatus::default();
    };
    let code = match &status.code {
        Value::Number(n) => match n.as_u64() {
            Some(1) => "OK",
            Some(2) => "ERROR",
            _ => "UNSET",
        }
        .to_string(),
        Value::String(s) => match s.as_str() {
            "STATUS_CODE_OK" | "OK" => "OK".to_string(),
            "STATUS_CODE_ERROR" | "ERROR" => "ERROR".to_string(),
            _ => "UNSET".to_string(),
        },
        _ => "UNSET".to_string(),
    };
    SpanStatus {
        code,
        message: status.message,
    }
}

fn decode_otlp(value: &Value) -> Result<DecodedTrace, TraceError> {
    let doc: OtlpDoc = serde_json::from_value(value.clone()).map_err(|e| TraceError::Json {
        reason: e.to_string(),
    })?;

    let mut spans = Vec::new();
    let mut trace_id = String::new();

    for resource_spans in doc.resource_spans {
        let resource_attrs: BTreeMap<String, Value> = resource_spans
            .resource
            .unwrap_or_default()
            .attributes
            .into_iter()
            .map(|kv| (kv.key, any_value_to_json(kv.value)))
            .collect();

        for scope_spans in resource_spans.scope_spans {
            let scope = scope_spans.scope.unwrap_or_default();
            for span in scope_spans.spans {
                // Merged attribute view: resource first, scope metadata,
                // then the span's own attributes (which win on key clash).
                let mut attributes = resource_attrs.clone();
                if !scope.name.is_empty() {
                    attributes.insert("otel.scope.name".into(), Value::from(scope.name.clone()));
                }
                if !scope.version.is_empty() {
                    attributes.insert(
                        "otel.scope.version".into(),
                        Value::from(scope.version.clone()),
                    );
                }
                for kv in span.attributes {
                    attributes.insert(kv.key, any_value_to_json(kv.value));
                }

                if trace_id.is_empty() {
                    trace_id = span.trace_id.clone();
                }

                let events = span
                    .events
                    .into_iter()
                    .map(|ev| SpanEvent {
                        name: ev.name,
                        timestamp_ns: Some(as_u64(&ev.time_unix_nano)),
                        attributes: ev
                            .attributes
                            .into_iter()
                            .map(|kv| (kv.key, any_value_to_json(kv.value)))
                            .collect(),
                    })
                    .collect();

                spans.push(Span {
                    trace_id: span.trace_id,
                    span_id: span.span_id,
                    parent_span_id: span.parent_span_id.filter(|p| !p.is_empty()),
                    name: span.name,
                    start_time_ns: as_u64(&span.start_time_unix_nano),
                    end_time_ns: as_u64(&span.end_time_unix_nano),
                    status: otlp_status(span.status),
                    attributes,
                    events,
                });
            }
        }
    }

    if trace_id.is_empty() {
        return Err(TraceError::MissingTraceId);
    }
    Ok(DecodedTrace { trace_id, spans })
}

// ---------------------------------------------------------------------------
// Topology
// ---------------------------------------------------------------------------

/// Validate spans and build the parent/child topology.
fn build(decoded: DecodedTrace) -> Result<TraceData, TraceError> {
    if decoded.spans.is_empty() {
        return Err(TraceError::NoSpans);
    }

    let mut spans: BTreeMap<String, Span> = BTreeMap::new();
    let mut span_order = Vec::with_capacity(decoded.spans.len());
    for span in decoded.spans {
        if span.span_id.is_empty() {
            return Err(TraceError::InvalidSpan {
                span_id: String::new(),
                reason: "missing spanId".into(),
            });
        }
        if span.end_time_ns < span.start_time_ns {
            return Err(TraceError::InvalidSpan {
                span_id: span.span_id.clone(),
                reason: "endTime precedes startTime".into(),
            });
        }
        if !span_order.contains(&span.span_id) {
            span_order.push(span.span_id.clone());
        }
        spans.insert(span.span_id.clone(), span);
    }

    detect_cycles(&spans)?;

    let mut children: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut roots = Vec::new();
    for (id, span) in &spans {
        match span.parent_span_id.as_deref() {
            Some(parent) if spans.contains_key(parent) => {
                children.entry(parent.to_string()).or_default().push(id.clone());
            }
            // No parent, or the parent is missing from the capture: a root.
            _ => roots.push(id.clone()),
        }
    }
    for ids in children.values_mut() {
        ids.sort();
    }
    roots.sort();

    let root_span = roots.first().cloned().ok_or(TraceError::Cycle {
        span_id: span_order.first().cloned().unwrap_or_default(),
    })?;

    Ok(TraceData {
        trace_id: decoded.trace_id,
        spans,
        span_order,
        children,
        roots,
        root_span,
    })
}

/// Walk every parent chain; a revisited node means a cycle.
fn detect_cycles(spans: &BTreeMap<String, Span>) -> Result<(), TraceError> {
    let mut cleared: HashSet<&str> = HashSet::new();
    for start in spans.keys() {
        if cleared.contains(start.as_str()) {
            continue;
        }
        let mut chain: HashSet<&str> = HashSet::new();
        let mut current = start.as_str();
        loop {
            if cleared.contains(current) {
                break;
            }
            if !chain.insert(current) {
                return Err(TraceError::Cycle {
                    span_id: current.to_string(),
                });
            }
            match spans.get(current).and_then(|s| s.parent_span_id.as_deref()) {
                Some(parent) if spans.contains_key(parent) => current = parent,
                _ => break,
            }
        }
        cleared.extend(chain);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn native_span(span_id: &str, parent: Option<&str>) -> Value {
        json!({
            "traceId": "trace-1",
            "spanId": span_id,
            "parentSpanId": parent,
            "name": format!("op-{span_id}"),
            "startTimeNs": 1_000u64,
            "endTimeNs": 2_000u64,
            "status": {"code": "OK", "message": ""},
            "attributes": {"http.method": "GET"},
        })
    }

    #[test]
    fn native_array_form_loads() {
        let doc = json!({
            "traceId": "trace-1",
            "spans": [native_span("b", Some("a")), native_span("a", null)],
        });
        let trace = from_json_str(&doc.to_string()).unwrap();
        assert_eq!(trace.trace_id, "trace-1");
        assert_eq!(trace.len(), 2);
        assert_eq!(trace.span_order, vec!["b", "a"]);
        assert_eq!(trace.roots, vec!["a"]);
        assert_eq!(trace.root_span, "a");
        assert_eq!(trace.children["a"], vec!["b"]);
    }

    #[test]
    fn native_map_form_fills_span_ids_from_keys() {
        let doc = json!({
            "traceId": "trace-2",
            "spans": {
                "root": {"name": "main", "startTimeNs": 1, "endTimeNs": 5},
                "leaf": {"parentSpanId": "root", "name": "child",
                         "startTimeNs": 2, "endTimeNs": 3},
            },
        });
        let trace = from_json_str(&doc.to_string()).unwrap();
        assert_eq!(trace.span("root").unwrap().name, "main");
        assert_eq!(trace.span("leaf").unwrap().parent_span_id.as_deref(), Some("root"));
        assert_eq!(trace.root_span, "root");
    }

    #[test]
    fn missing_parent_becomes_root_and_first_root_wins() {
        let doc = json!({
            "traceId": "t",
            "spans": [
                native_span("zz", Some("gone")),
                native_span("aa", null),
            ],
        });
        let trace = from_json_str(&doc.to_string()).unwrap();
        assert_eq!(trace.roots, vec!["aa", "zz"]);
        assert_eq!(trace.root_span, "aa");
    }

    #[test]
    fn otlp_form_merges_resource_scope_and_span_attributes() {
        let doc = json!({
            "resourceSpans": [{
                "resource": {"attributes": [
                    {"key": "service.name", "value": {"stringValue": "orders"}},
                    {"key": "http.status_code", "value": {"intValue": "999"}},
                ]},
                "scopeSpans": [{
                    "scope": {"name": "flowspec-test", "version": "0.1"},
                    "spans": [{
                        "traceId": "otlp-trace",
                        "spanId": "s1",
                        "name": "createUser",
                        "startTimeUnixNano": "1000",
                        "endTimeUnixNano": "2000",
                        "status": {"code": 2, "message": "boom"},
                        "attributes": [
                            {"key": "http.method", "value": {"stringValue": "POST"}},
                            {"key": "http.status_code", "value": {"intValue": "201"}},
                            {"key": "retry", "value": {"boolValue": true}},
                        ],
                    }],
                }],
            }],
        });
        let trace = from_json_str(&doc.to_string()).unwrap();
        assert_eq!(trace.trace_id, "otlp-trace");
        let span = trace.span("s1").unwrap();
        assert_eq!(span.start_time_ns, 1000);
        assert_eq!(span.end_time_ns, 2000);
        assert_eq!(span.status.code, "ERROR");
        assert_eq!(span.attributes["service.name"], json!("orders"));
        assert_eq!(span.attributes["otel.scope.name"], json!("flowspec-test"));
        // The span's own value wins over the resource value.
        assert_eq!(span.attributes["http.status_code"], json!(201));
        assert_eq!(span.attributes["retry"], json!(true));
    }

    #[test]
    fn har_is_rejected_by_name() {
        let doc = json!({"log": {"version": "1.2", "entries": []}});
        let err = from_json_str(&doc.to_string()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("HAR"), "{msg}");
        assert!(msg.contains("resourceSpans"), "{msg}");
        assert!(msg.contains("docs/traces.md"), "{msg}");
    }

    #[test]
    fn unknown_shape_lists_supported_formats() {
        let err = from_json_str(r#"{"foo": 1}"#).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("traceId"), "{msg}");
        assert!(msg.contains("OTLP"), "{msg}");
    }

    #[test]
    fn non_object_json_is_rejected() {
        assert!(matches!(
            from_json_str("[1,2,3]").unwrap_err(),
            TraceError::UnrecognizedShape { detected: None }
        ));
    }

    #[test]
    fn invalid_json_is_a_json_error() {
        assert!(matches!(
            from_json_str("{nope").unwrap_err(),
            TraceError::Json { .. }
        ));
    }

    #[test]
    fn empty_trace_id_is_rejected() {
        let doc = json!({"traceId": "", "spans": [native_span("a", null)]});
        assert!(matches!(
            from_json_str(&doc.to_string()).unwrap_err(),
            TraceError::MissingTraceId
        ));
    }

    #[test]
    fn zero_spans_are_rejected() {
        let doc = json!({"traceId": "t", "spans": []});
        assert!(matches!(
            from_json_str(&doc.to_string()).unwrap_err(),
            TraceError::NoSpans
        ));
    }

    #[test]
    fn end_before_start_is_rejected() {
        let doc = json!({
            "traceId": "t",
            "spans": [{"spanId": "bad", "name": "x", "startTimeNs": 10, "endTimeNs": 3}],
        });
        match from_json_str(&doc.to_string()).unwrap_err() {
            TraceError::InvalidSpan { span_id, reason } => {
                assert_eq!(span_id, "bad");
                assert!(reason.contains("endTime"));
            }
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn parent_cycles_are_format_errors() {
        let doc = json!({
            "traceId": "t",
            "spans": [
                native_span("a", Some("b")),
                native_span("b", Some("a")),
            ],
        });
        assert!(matches!(
            from_json_str(&doc.to_string()).unwrap_err(),
            TraceError::Cycle { .. }
        ));
    }

    #[test]
    fn self_parent_is_a_cycle() {
        let doc = json!({
            "traceId": "t",
            "spans": [native_span("a", Some("a"))],
        });
        assert!(matches!(
            from_json_str(&doc.to_string()).unwrap_err(),
            TraceError::Cycle { .. }
        ));
    }

    #[test]
    fn ordered_iteration_follows_input_order() {
        let doc = json!({
            "traceId": "t",
            "spans": [
                native_span("c", null),
                native_span("a", Some("c")),
                native_span("b", Some("c")),
            ],
        });
        let trace = from_json_str(&doc.to_string()).unwrap();
        let names: Vec<&str> = trace.iter_ordered().map(|s| s.span_id.as_str()).collect();
        assert_eq!(names, vec!["c", "a", "b"]);
    }
}
