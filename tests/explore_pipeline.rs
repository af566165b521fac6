// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end explore pipeline: log files → ingestion → induced contract.

use chrono::{TimeZone, Utc};
use flowspec_contract::Aggregation;
use flowspec_core::http::status_class;
use flowspec_core::{NormalizedRecord, RedactionConfig, RedactionPolicy, StatusClass};
use flowspec_explore::{ContractInducer, ExploreOptions, InducedContract};
use flowspec_ingest::{IngestOptions, LogFormat, TrafficIngestor};
use flowspec_stream::RecordIter;
use std::io::Write;
use std::path::PathBuf;

fn common_line(time: &str, method: &str, uri: &str, status: u16) -> String {
    format!(r#"10.0.0.1 - - [{time}] "{method} {uri} HTTP/1.1" {status} -"#)
}

fn combined_line(time: &str, method: &str, uri: &str, status: u16, user_agent: &str) -> String {
    format!(
        r#"10.0.0.1 - - [{time}] "{method} {uri} HTTP/1.1" {status} 128 "-" "{user_agent}""#
    )
}

fn write_log(lines: &[String]) -> tempfile::NamedTempFile {
    let mut f = tempfile::Builder::new().suffix(".log").tempfile().unwrap();
    for line in lines {
        writeln!(f, "{line}").unwrap();
    }
    f.flush().unwrap();
    f
}

async fn explore(
    ingest: IngestOptions,
    induce: ExploreOptions,
    inputs: Vec<PathBuf>,
) -> (TrafficIngestor, InducedContract) {
    let ingestor = TrafficIngestor::new(ingest);
    let mut records = ingestor.ingest(inputs).unwrap();
    let mut inducer = ContractInducer::new(induce);
    inducer.drain(&mut records).await.unwrap();
    let induced = inducer.emit();
    (ingestor, induced)
}

fn common_options() -> IngestOptions {
    IngestOptions {
        format: LogFormat::Common,
        ..IngestOptions::default()
    }
}

#[tokio::test]
async fn path_clustering_scenario() {
    // 30 lines, 10 each across three user ids, all 200.
    let mut lines = Vec::new();
    for id in 1..=3 {
        for _ in 0..10 {
            lines.push(common_line(
                "10/Aug/2025:12:00:00 +0000",
                "GET",
                &format!("/api/users/{id}"),
                200,
            ));
        }
    }
    let f = write_log(&lines);
    let (_, induced) = explore(
        common_options(),
        ExploreOptions::default(),
        vec![f.path().to_path_buf()],
    )
    .await;

    let endpoints = &induced.spec.spec.endpoints;
    assert_eq!(endpoints.len(), 1);
    assert_eq!(endpoints[0].path, "/api/users/{var}");
    let op = &endpoints[0].operations[0];
    assert_eq!(op.method, "GET");
    assert_eq!(op.responses.status_ranges, vec![StatusClass::Success]);
    assert_eq!(op.responses.aggregation, Aggregation::Range);
    assert!(op.required.is_empty());
    assert!(op.optional.is_empty());
    assert_eq!(op.stats.as_ref().unwrap().support_count, 30);
}

#[tokio::test]
async fn required_and_optional_fields_scenario() {
    // 100 requests to one literal path: 96 carry a user-agent header, 40 of
    // them also carry an `include` query parameter.
    let mut lines = Vec::new();
    for i in 0..100 {
        let uri = if i < 40 {
            "/api/v1/items?include=details"
        } else {
            "/api/v1/items"
        };
        if i < 96 {
            lines.push(combined_line(
                "10/Aug/2025:12:00:00 +0000",
                "GET",
                uri,
                200,
                "client/1.0",
            ));
        } else {
            lines.push(combined_line("10/Aug/2025:12:00:00 +0000", "GET", uri, 200, "-"));
        }
    }
    let f = write_log(&lines);
    let (_, induced) = explore(
        IngestOptions::default(),
        ExploreOptions::default(),
        vec![f.path().to_path_buf()],
    )
    .await;

    let endpoints = &induced.spec.spec.endpoints;
    assert_eq!(endpoints.len(), 1);
    assert_eq!(endpoints[0].path, "/api/v1/items");
    let op = &endpoints[0].operations[0];
    assert_eq!(op.required.headers, vec!["user-agent"]);
    assert!(op.required.query.is_empty());
    assert_eq!(op.optional.query, vec!["include"]);
    assert!(op.optional.headers.is_empty());
}

#[tokio::test]
async fn redaction_drop_scenario() {
    let lines = vec![common_line(
        "10/Aug/2025:12:00:00 +0000",
        "GET",
        "/api/items?token=abc&id=7",
        200,
    )];
    let f = write_log(&lines);
    let ingestor = TrafficIngestor::new(IngestOptions {
        redaction: RedactionConfig::uniform(&["token".into()], RedactionPolicy::Drop),
        ..common_options()
    });
    let mut iter = ingestor.ingest(vec![f.path().to_path_buf()]).unwrap();

    let mut emitted: Vec<NormalizedRecord> = Vec::new();
    while iter.advance().await {
        emitted.push(iter.current().clone());
    }
    assert_eq!(emitted.len(), 1);
    let query = &emitted[0].query;
    assert_eq!(query.len(), 1);
    assert_eq!(query["id"], vec!["7"]);
}

#[tokio::test]
async fn time_filter_scenario() {
    let times = [
        "10/Aug/2025:10:00:00 +0000",
        "10/Aug/2025:11:00:00 +0000",
        "10/Aug/2025:12:00:00 +0000",
        "10/Aug/2025:12:30:00 +0000",
        "10/Aug/2025:13:00:00 +0000",
        "10/Aug/2025:14:00:00 +0000",
    ];
    let lines: Vec<String> = times
        .iter()
        .map(|t| common_line(t, "GET", "/api/ping", 200))
        .collect();
    let f = write_log(&lines);

    let mut induce = ExploreOptions::default();
    induce.min_endpoint_samples = 1;
    let (ingestor, induced) = explore(
        IngestOptions {
            since: Some(Utc.with_ymd_and_hms(2025, 8, 10, 12, 0, 0).unwrap()),
            until: Some(Utc.with_ymd_and_hms(2025, 8, 10, 13, 30, 0).unwrap()),
            ..common_options()
        },
        induce,
        vec![f.path().to_path_buf()],
    )
    .await;

    // All six lines parsed; exactly the middle three survive the window.
    assert_eq!(ingestor.metrics().parsed_lines, 6);
    let stats = induced.spec.spec.endpoints[0].operations[0]
        .stats
        .as_ref()
        .unwrap();
    assert_eq!(stats.support_count, 3);
    assert_eq!(
        stats.first_seen,
        Utc.with_ymd_and_hms(2025, 8, 10, 12, 0, 0).unwrap()
    );
    assert_eq!(
        stats.last_seen,
        Utc.with_ymd_and_hms(2025, 8, 10, 13, 0, 0).unwrap()
    );
}

#[tokio::test]
async fn empty_input_emits_empty_contract() {
    let f = write_log(&[]);
    let (ingestor, induced) = explore(
        common_options(),
        ExploreOptions::default(),
        vec![f.path().to_path_buf()],
    )
    .await;

    let metrics = ingestor.metrics();
    assert_eq!(metrics.total_lines, 0);
    assert_eq!(metrics.error_rate(), 0.0);
    assert!(!metrics.is_incomplete());
    assert!(induced.spec.spec.endpoints.is_empty());
    assert!(induced.advisory.is_none());
    // The empty document still serializes as a well-formed contract.
    let yaml = flowspec_contract::to_yaml_string(&induced.spec).unwrap();
    assert!(yaml.contains("flowspec/v1alpha1"));
}

#[tokio::test]
async fn gzip_inputs_cluster_like_plain_ones() {
    let mut lines = Vec::new();
    for id in 0..5 {
        for _ in 0..5 {
            lines.push(common_line(
                "10/Aug/2025:12:00:00 +0000",
                "GET",
                &format!("/api/orders/{id}"),
                200,
            ));
        }
    }
    let mut f = tempfile::Builder::new().suffix(".log.gz").tempfile().unwrap();
    let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    for line in &lines {
        writeln!(enc, "{line}").unwrap();
    }
    f.write_all(&enc.finish().unwrap()).unwrap();
    f.flush().unwrap();

    let (_, induced) = explore(
        common_options(),
        ExploreOptions::default(),
        vec![f.path().to_path_buf()],
    )
    .await;
    assert_eq!(induced.spec.spec.endpoints[0].path, "/api/orders/{var}");
}

#[tokio::test]
async fn emitted_yaml_is_deterministic_and_valid() {
    let mut lines = Vec::new();
    for id in 0..3 {
        for _ in 0..10 {
            lines.push(common_line(
                "10/Aug/2025:12:00:00 +0000",
                "GET",
                &format!("/api/users/{id}"),
                200,
            ));
            lines.push(common_line(
                "10/Aug/2025:12:00:01 +0000",
                "DELETE",
                &format!("/api/users/{id}"),
                204,
            ));
        }
    }
    let f = write_log(&lines);

    let (_, first) = explore(
        common_options(),
        ExploreOptions::default(),
        vec![f.path().to_path_buf()],
    )
    .await;
    let (_, second) = explore(
        common_options(),
        ExploreOptions::default(),
        vec![f.path().to_path_buf()],
    )
    .await;

    let yaml_a = flowspec_contract::to_yaml_string(&first.spec).unwrap();
    let yaml_b = flowspec_contract::to_yaml_string(&second.spec).unwrap();
    assert_eq!(yaml_a, yaml_b);

    // Round-trips through the parser (including validation) unchanged.
    let reparsed = flowspec_contract::from_yaml_str(&yaml_a).unwrap();
    assert_eq!(flowspec_contract::to_yaml_string(&reparsed).unwrap(), yaml_a);

    // Methods in canonical order, every emitted code class valid.
    let ops = &first.spec.spec.endpoints[0].operations;
    assert_eq!(ops[0].method, "GET");
    assert_eq!(ops[1].method, "DELETE");
    for op in ops {
        for code in &op.responses.status_codes {
            assert!(status_class(*code).is_some());
        }
    }
}
