// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end verify pipeline: contract YAML + trace JSON → verdict.

use flowspec_align::{
    AlignConfig, AlignmentEngine, OperationStatus, TIMEOUT_REASON, Verdict,
};
use flowspec_cli::report::{self, RenderOptions};
use flowspec_contract::from_yaml_str;
use flowspec_core::Lang;
use flowspec_stream::CancellationToken;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const USERS_CONTRACT: &str = r#"
apiVersion: flowspec/v1alpha1
kind: ServiceSpec
metadata:
  name: users
  version: v1
spec:
  endpoints:
    - path: /api/users
      operations:
        - method: POST
          responses:
            statusRanges: ["2xx"]
            aggregation: range
          postConditions:
            status_created: {"in": [{"var": "span.attributes.http.status_code"}, [200, 201, 204]]}
"#;

fn create_user_trace(status_code: u64) -> Arc<flowspec_trace::TraceData> {
    let doc = json!({
        "traceId": "trace-users",
        "spans": [{
            "spanId": "span-1",
            "name": "createUser",
            "startTimeNs": 100,
            "endTimeNs": 250,
            "attributes": {
                "http.method": "POST",
                "http.url": "/api/users",
                "http.status_code": status_code,
            },
        }],
    });
    Arc::new(flowspec_trace::from_json_str(&doc.to_string()).unwrap())
}

async fn run(contract: &str, trace: Arc<flowspec_trace::TraceData>, config: AlignConfig) -> Verdict {
    let spec = from_yaml_str(contract).unwrap();
    AlignmentEngine::new(config)
        .evaluate(&spec, trace, CancellationToken::new())
        .await
}

#[tokio::test]
async fn alignment_success_scenario() {
    let verdict = run(USERS_CONTRACT, create_user_trace(201), AlignConfig::default()).await;

    assert!(verdict.passed());
    assert_eq!(verdict.exit_code(), 0);
    assert_eq!(verdict.summary.total, 1);
    assert_eq!(verdict.summary.success, 1);
    assert_eq!(verdict.summary.total_assertions, 1);
    assert_eq!(verdict.summary.failed_assertions, 0);
    assert_eq!(verdict.results[0].status, OperationStatus::Success);
}

#[tokio::test]
async fn alignment_timeout_scenario() {
    let verdict = run(
        USERS_CONTRACT,
        create_user_trace(201),
        AlignConfig {
            timeout: Duration::from_millis(1),
            eval_delay: Duration::from_millis(250),
            ..AlignConfig::default()
        },
    )
    .await;

    assert!(!verdict.passed());
    assert_eq!(verdict.exit_code(), 1);
    assert_eq!(verdict.results[0].status, OperationStatus::Failed);
    assert_eq!(verdict.results[0].note.as_deref(), Some(TIMEOUT_REASON));
}

#[tokio::test]
async fn alignment_reports_are_byte_identical_across_runs() {
    let options = RenderOptions {
        color: false,
        include_timing: false,
        lang: Lang::English,
    };

    let first = run(USERS_CONTRACT, create_user_trace(201), AlignConfig::default()).await;
    let second = run(USERS_CONTRACT, create_user_trace(201), AlignConfig::default()).await;

    assert_eq!(
        report::render_human("users", &first, options),
        report::render_human("users", &second, options)
    );
    assert_eq!(
        report::render_json("users", &first, options),
        report::render_json("users", &second, options)
    );
}

#[tokio::test]
async fn failed_postcondition_yields_exit_one() {
    let verdict = run(USERS_CONTRACT, create_user_trace(500), AlignConfig::default()).await;
    assert_eq!(verdict.exit_code(), 1);
    assert_eq!(verdict.summary.failed, 1);
    assert_eq!(verdict.summary.failed_assertions, 1);

    let text = report::render_human(
        "users",
        &verdict,
        RenderOptions {
            color: false,
            include_timing: false,
            lang: Lang::English,
        },
    );
    assert!(text.contains("[fail]"));
    assert!(text.contains("status_created"));
    assert!(text.contains("span.attributes.http.status_code=500"));
}

#[tokio::test]
async fn multiple_spans_each_yield_one_evaluation() {
    let doc = json!({
        "traceId": "trace-many",
        "spans": [
            {
                "spanId": "a",
                "name": "createUser",
                "startTimeNs": 1,
                "endTimeNs": 2,
                "attributes": {
                    "http.method": "POST",
                    "http.url": "/api/users",
                    "http.status_code": 201,
                },
            },
            {
                "spanId": "b",
                "name": "createUser",
                "startTimeNs": 3,
                "endTimeNs": 4,
                "attributes": {
                    "http.method": "POST",
                    "http.url": "/api/users",
                    "http.status_code": 500,
                },
            },
        ],
    });
    let trace = Arc::new(flowspec_trace::from_json_str(&doc.to_string()).unwrap());
    let verdict = run(USERS_CONTRACT, trace, AlignConfig::default()).await;

    let result = &verdict.results[0];
    assert_eq!(result.matched_spans, 2);
    assert_eq!(result.assertions.len(), 2);
    // One span satisfies the postcondition, the other does not: failed.
    assert_eq!(result.status, OperationStatus::Failed);
    assert_eq!(verdict.summary.failed_assertions, 1);
}

#[tokio::test]
async fn otlp_traces_align_too() {
    let doc = json!({
        "resourceSpans": [{
            "resource": {"attributes": [
                {"key": "service.name", "value": {"stringValue": "users"}},
            ]},
            "scopeSpans": [{
                "scope": {"name": "test"},
                "spans": [{
                    "traceId": "otlp-1",
                    "spanId": "s1",
                    "name": "createUser",
                    "startTimeUnixNano": "100",
                    "endTimeUnixNano": "200",
                    "attributes": [
                        {"key": "http.method", "value": {"stringValue": "POST"}},
                        {"key": "http.url", "value": {"stringValue": "https://svc/api/users"}},
                        {"key": "http.status_code", "value": {"intValue": "204"}},
                    ],
                }],
            }],
        }],
    });
    let trace = Arc::new(flowspec_trace::from_json_str(&doc.to_string()).unwrap());
    let verdict = run(USERS_CONTRACT, trace, AlignConfig::default()).await;
    assert!(verdict.passed());
    assert_eq!(verdict.summary.success, 1);
}
