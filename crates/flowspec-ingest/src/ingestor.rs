// SPDX-License-Identifier: MIT OR Apache-2.0
//! The traffic ingestor: files in, a bounded stream of records out.

use crate::decode::{self, LineRead, MAX_LINE_BYTES};
use crate::format::LogFormat;
use crate::normalize;
use crate::parse::{LineParser, RawHit};
use chrono::{DateTime, Utc};
use flowspec_core::{IngestMetrics, NormalizedRecord, RedactionConfig};
use flowspec_error::{ErrorCode, FlowError};
use flowspec_stream::{ChannelIter, DEFAULT_BUFFER, RecordSender, StreamError};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{debug, warn};

/// Options for one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestOptions {
    /// Parsing strategy.
    pub format: LogFormat,
    /// Inclusive lower bound on record timestamps.
    pub since: Option<DateTime<Utc>>,
    /// Inclusive upper bound on record timestamps.
    pub until: Option<DateTime<Utc>>,
    /// Deterministic sampling rate in `0.0..=1.0`.
    pub sample_rate: f64,
    /// Sensitive-key redaction applied before emission.
    pub redaction: RedactionConfig,
    /// Bound on the record stream's in-flight buffer.
    pub buffer: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            format: LogFormat::Combined,
            since: None,
            until: None,
            sample_rate: 1.0,
            redaction: RedactionConfig::default(),
            buffer: DEFAULT_BUFFER,
        }
    }
}

/// Streaming access-log ingestor.
///
/// One ingestor owns the metrics for its runs; [`metrics`](Self::metrics)
/// returns a snapshot at any point during or after a run.
#[derive(Debug)]
pub struct TrafficIngestor {
    options: IngestOptions,
    metrics: Arc<Mutex<IngestMetrics>>,
}

impl TrafficIngestor {
    /// Create an ingestor with the given options.
    #[must_use]
    pub fn new(options: IngestOptions) -> Self {
        Self {
            options,
            metrics: Arc::new(Mutex::new(IngestMetrics::default())),
        }
    }

    /// Snapshot of the run's metrics.
    #[must_use]
    pub fn metrics(&self) -> IngestMetrics {
        self.metrics.lock().expect("metrics lock poisoned").clone()
    }

    /// Start ingesting `inputs`, in order, into a bounded record stream.
    ///
    /// Fatal configuration problems (bad regex, missing inputs) surface
    /// before any file is opened; runtime failures (unreadable file,
    /// over-long line) surface as the stream's terminal error.
    pub fn ingest(
        &self,
        inputs: Vec<PathBuf>,
    ) -> Result<ChannelIter<NormalizedRecord>, FlowError> {
        let parser = LineParser::new(&self.options.format)?;

        for path in &inputs {
            if !path.exists() {
                return Err(FlowError::new(
                    ErrorCode::InputMissingPath,
                    format!("traffic input {} does not exist", path.display()),
                )
                .with_context("file", path.display().to_string()));
            }
        }

        let (sender, iter) = flowspec_stream::channel(self.options.buffer);
        let options = self.options.clone();
        let metrics = Arc::clone(&self.metrics);
        tokio::spawn(run_producer(inputs, parser, options, metrics, sender));
        Ok(iter)
    }
}

/// The per-run producer: reads every input in order, driving the pipeline
/// for each line, and records metrics under the shared lock.
async fn run_producer(
    inputs: Vec<PathBuf>,
    parser: LineParser,
    options: IngestOptions,
    metrics: Arc<Mutex<IngestMetrics>>,
    sender: RecordSender<NormalizedRecord>,
) {
    let started = Instant::now();

    'files: for path in &inputs {
        let mut reader = match decode::open_reader(path) {
            Ok(r) => r,
            Err(e) => {
                sender
                    .fail(StreamError::terminal(format!(
                        "cannot read {}: {e}",
                        path.display()
                    )))
                    .await;
                break 'files;
            }
        };

        let mut line_number: u64 = 0;
        loop {
            let read = match decode::read_line_capped(reader.as_mut(), MAX_LINE_BYTES) {
                Ok(r) => r,
                Err(e) => {
                    sender
                        .fail(StreamError::terminal(format!(
                            "read error in {} after line {line_number}: {e}",
                            path.display()
                        )))
                        .await;
                    break 'files;
                }
            };
            match read {
                LineRead::Eof => break,
                LineRead::TooLong => {
                    sender
                        .fail(StreamError::terminal(format!(
                            "{} line {} exceeds the {MAX_LINE_BYTES}-byte scanner limit",
                            path.display(),
                            line_number + 1
                        )))
                        .await;
                    break 'files;
                }
                LineRead::Line(line) => {
                    line_number += 1;
                    if line.trim().is_empty() {
                        continue;
                    }
                    let total = {
                        let mut m = metrics.lock().expect("metrics lock poisoned");
                        m.total_lines += 1;
                        m.total_lines
                    };
                    match parser.parse(&line) {
                        Err(rejection) => {
                            metrics
                                .lock()
                                .expect("metrics lock poisoned")
                                .record_error(line_number, &line, rejection.to_string());
                        }
                        Ok(hit) => {
                            metrics.lock().expect("metrics lock poisoned").parsed_lines += 1;
                            let record = build_record(hit, &options);
                            if !within_window(record.timestamp, &options) {
                                continue;
                            }
                            if !keep_sample(total, options.sample_rate) {
                                continue;
                            }
                            if !sender.send(record).await {
                                // Consumer gone or cancelled.
                                break 'files;
                            }
                        }
                    }
                }
            }
        }
        debug!(file = %path.display(), lines = line_number, "ingested file");
    }

    let mut m = metrics.lock().expect("metrics lock poisoned");
    m.duration_ms = started.elapsed().as_millis() as u64;
    if m.is_incomplete() {
        warn!(
            error_rate = m.error_rate(),
            error_lines = m.error_lines,
            total_lines = m.total_lines,
            "ingestion incomplete: error rate above 10%"
        );
    }
}

/// Steps 2–6 of the per-line pipeline: normalization and redaction.
fn build_record(hit: RawHit, options: &IngestOptions) -> NormalizedRecord {
    let (raw_path, raw_query) = normalize::split_request_uri(&hit.request_uri);
    let path = normalize::normalize_path(raw_path);

    let mut query = raw_query
        .map(normalize::parse_query)
        .unwrap_or_default();

    let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
    if let Some(ref referer) = hit.referer
        && let Some((name, values)) = normalize::header_entry("Referer", referer)
    {
        headers.insert(name, values);
    }
    if let Some(ref ua) = hit.user_agent
        && let Some((name, values)) = normalize::header_entry("User-Agent", ua)
    {
        headers.insert(name, values);
    }

    options.redaction.apply(&mut query);
    options.redaction.apply(&mut headers);

    NormalizedRecord {
        method: hit.method.to_ascii_uppercase(),
        path,
        raw_path: hit.request_uri,
        status: hit.status,
        timestamp: hit.timestamp,
        query,
        headers,
        host: String::new(),
        scheme: None,
        body_bytes: hit.body_bytes,
    }
}

/// Step 7: the time filter, inclusive on both ends.
fn within_window(ts: DateTime<Utc>, options: &IngestOptions) -> bool {
    if let Some(since) = options.since
        && ts < since
    {
        return false;
    }
    if let Some(until) = options.until
        && ts > until
    {
        return false;
    }
    true
}

/// Step 8: deterministic sampling over the running line total.
///
/// Applied after total counting so metrics reflect attempted reads.
fn keep_sample(total_lines: u64, sample_rate: f64) -> bool {
    ((total_lines % 100) as f64) / 100.0 < sample_rate
}
