// SPDX-License-Identifier: MIT OR Apache-2.0
//! The parallel evaluation engine.

use crate::expr::{Expr, ExprError, Scope, truthy};
use crate::matcher::OperationMatcher;
use crate::verdict::{
    AssertionResult, OperationResult, OperationStatus, PerformanceInfo, Verdict, VerdictSummary,
};
use flowspec_contract::{ConditionSet, ServiceSpec};
use flowspec_core::http::method_rank;
use flowspec_stream::CancellationToken;
use flowspec_trace::{Span, TraceData};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::debug;

/// Failure note recorded when an operation's evaluation exceeds its deadline.
pub const TIMEOUT_REASON: &str = "timeout";

/// Note recorded for operations never evaluated because of cancellation.
pub const CANCELLED_NOTE: &str = "cancelled before evaluation";

/// Note recorded for operations with no matching span.
pub const NO_SPAN_NOTE: &str = "no matching span in trace";

/// Engine configuration. Plain values; no hidden state.
#[derive(Debug, Clone)]
pub struct AlignConfig {
    /// Fixed worker pool size.
    pub max_workers: usize,
    /// Per-operation evaluation deadline.
    pub timeout: Duration,
    /// Artificial delay injected into every operation evaluation.
    ///
    /// Zero in production; tests raise it to exercise the timeout path
    /// without wall-clock flakiness.
    pub eval_delay: Duration,
}

impl Default for AlignConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            timeout: Duration::from_secs(30),
            eval_delay: Duration::ZERO,
        }
    }
}

/// One queued unit of work: a contract operation with its parsed assertions.
struct AlignJob {
    index: usize,
    path: String,
    method: String,
    operation_id: Option<String>,
    matcher: OperationMatcher,
    assertions: Vec<ParsedAssertion>,
}

struct ParsedAssertion {
    name: String,
    expr: Result<Expr, ExprError>,
}

#[derive(Clone)]
struct JobMeta {
    index: usize,
    path: String,
    method: String,
    operation_id: Option<String>,
}

/// Variable resolution over one span's read-only attribute view.
pub struct SpanScope<'a> {
    span: &'a Span,
}

impl<'a> SpanScope<'a> {
    /// Wrap a span for evaluation.
    #[must_use]
    pub fn new(span: &'a Span) -> Self {
        Self { span }
    }
}

impl Scope for SpanScope<'_> {
    fn resolve(&self, path: &str) -> Value {
        if let Some(rest) = path.strip_prefix("span.attributes.") {
            // Attribute keys are dotted themselves; the exact key wins.
            if let Some(v) = self.span.attributes.get(rest) {
                return v.clone();
            }
            return resolve_nested(&self.span.attributes, rest);
        }
        match path {
            "span.name" => Value::from(self.span.name.clone()),
            "span.status.code" => Value::from(self.span.status.code.clone()),
            "span.status.message" => Value::from(self.span.status.message.clone()),
            _ => Value::Null,
        }
    }
}

/// Walk nested object values by dotted path.
fn resolve_nested(map: &BTreeMap<String, Value>, dotted: &str) -> Value {
    let mut parts = dotted.split('.');
    let Some(first) = parts.next() else {
        return Value::Null;
    };
    let mut current = match map.get(first) {
        Some(v) => v.clone(),
        None => return Value::Null,
    };
    for part in parts {
        current = match current.get(part) {
            Some(v) => v.clone(),
            None => return Value::Null,
        };
    }
    current
}

/// The trace-vs-contract alignment engine.
#[derive(Debug, Clone)]
pub struct AlignmentEngine {
    config: AlignConfig,
}

impl AlignmentEngine {
    /// Create an engine with the given configuration.
    #[must_use]
    pub fn new(config: AlignConfig) -> Self {
        Self { config }
    }

    /// Evaluate every contract operation against the trace.
    ///
    /// Operations are pulled from a shared queue by a fixed worker pool;
    /// each evaluation observes the per-operation timeout and the shared
    /// cancellation token. The returned verdict is deterministically sorted.
    pub async fn evaluate(
        &self,
        spec: &ServiceSpec,
        trace: Arc<TraceData>,
        cancel: CancellationToken,
    ) -> Verdict {
        let started = Instant::now();
        let jobs = build_jobs(spec);
        let metas: Vec<JobMeta> = jobs
            .iter()
            .map(|j| JobMeta {
                index: j.index,
                path: j.path.clone(),
                method: j.method.clone(),
                operation_id: j.operation_id.clone(),
            })
            .collect();

        let workers = self.config.max_workers.clamp(1, jobs.len().max(1));
        let (tx, rx) = mpsc::channel::<AlignJob>(jobs.len().max(1));
        for job in jobs {
            tx.send(job).await.expect("queue sized for all jobs");
        }
        drop(tx);

        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let accumulator: Arc<Mutex<Vec<(usize, OperationResult)>>> =
            Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let rx = Arc::clone(&rx);
            let accumulator = Arc::clone(&accumulator);
            let cancel = cancel.clone();
            let trace = Arc::clone(&trace);
            let timeout = self.config.timeout;
            let delay = self.config.eval_delay;
            handles.push(tokio::spawn(async move {
                loop {
                    let job = {
                        let mut rx = rx.lock().await;
                        tokio::select! {
                            // Cancellation wins over queued work.
                            biased;
                            _ = cancel.cancelled() => None,
                            job = rx.recv() => job,
                        }
                    };
                    let Some(job) = job else { break };
                    let result =
                        match tokio::time::timeout(timeout, evaluate_job(&job, &trace, delay))
                            .await
                        {
                            Ok(result) => result,
                            Err(_) => timeout_result(&job),
                        };
                    debug!(
                        path = %job.path,
                        method = %job.method,
                        status = ?result.status,
                        "operation evaluated"
                    );
                    accumulator
                        .lock()
                        .expect("verdict accumulator lock poisoned")
                        .push((job.index, result));
                }
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }

        let mut by_index: BTreeMap<usize, OperationResult> = accumulator
            .lock()
            .expect("verdict accumulator lock poisoned")
            .drain(..)
            .collect();

        // Operations the pool never reached (cancellation) are reported as
        // skipped rather than silently dropped.
        for meta in &metas {
            by_index.entry(meta.index).or_insert_with(|| OperationResult {
                path: meta.path.clone(),
                method: meta.method.clone(),
                operation_id: meta.operation_id.clone(),
                status: OperationStatus::Skipped,
                matched_spans: 0,
                assertions: Vec::new(),
                note: Some(CANCELLED_NOTE.to_string()),
            });
        }

        let mut results: Vec<OperationResult> = by_index.into_values().collect();
        results.sort_by_key(|r| {
            (
                r.path.clone(),
                method_rank(&r.method),
                r.operation_id.clone(),
            )
        });

        let summary = summarize(&results);
        Verdict {
            results,
            summary,
            performance: PerformanceInfo {
                duration_ms: started.elapsed().as_millis() as u64,
                workers,
            },
        }
    }
}

/// Materialize every operation's matcher and assertions once, up front.
fn build_jobs(spec: &ServiceSpec) -> Vec<AlignJob> {
    let mut jobs = Vec::new();
    for endpoint in &spec.spec.endpoints {
        for operation in &endpoint.operations {
            let mut assertions = Vec::new();
            collect_assertions(&operation.pre_conditions, &mut assertions);
            collect_assertions(&operation.post_conditions, &mut assertions);
            jobs.push(AlignJob {
                index: jobs.len(),
                path: endpoint.path.clone(),
                method: operation.method.to_ascii_uppercase(),
                operation_id: operation.operation_id.clone(),
                matcher: OperationMatcher::for_operation(&endpoint.path, operation),
                assertions,
            });
        }
    }
    jobs
}

fn collect_assertions(conditions: &Option<ConditionSet>, out: &mut Vec<ParsedAssertion>) {
    if let Some(set) = conditions {
        for (name, body) in set.iter() {
            out.push(ParsedAssertion {
                name: name.to_string(),
                expr: Expr::parse(body),
            });
        }
    }
}

async fn evaluate_job(job: &AlignJob, trace: &TraceData, delay: Duration) -> OperationResult {
    if delay > Duration::ZERO {
        tokio::time::sleep(delay).await;
    }

    let matched: Vec<&Span> = trace
        .iter_ordered()
        .filter(|span| job.matcher.matches(span))
        .collect();

    if matched.is_empty() {
        return OperationResult {
            path: job.path.clone(),
            method: job.method.clone(),
            operation_id: job.operation_id.clone(),
            status: OperationStatus::Skipped,
            matched_spans: 0,
            assertions: Vec::new(),
            note: Some(NO_SPAN_NOTE.to_string()),
        };
    }

    // Every matched span yields one evaluation of the full assertion list;
    // all assertions are evaluated and reported even after a failure.
    let mut assertions = Vec::new();
    for span in &matched {
        let scope = SpanScope::new(span);
        for assertion in &job.assertions {
            assertions.push(evaluate_assertion(assertion, &scope));
        }
    }

    let any_failed = assertions.iter().any(|a| !a.passed);
    OperationResult {
        path: job.path.clone(),
        method: job.method.clone(),
        operation_id: job.operation_id.clone(),
        status: if any_failed {
            OperationStatus::Failed
        } else {
            OperationStatus::Success
        },
        matched_spans: matched.len(),
        assertions,
        note: None,
    }
}

fn evaluate_assertion(assertion: &ParsedAssertion, scope: &SpanScope<'_>) -> AssertionResult {
    let expr = match &assertion.expr {
        Err(parse_error) => {
            return AssertionResult {
                name: assertion.name.clone(),
                passed: false,
                observed_values: BTreeMap::new(),
                failure_reason: Some(format!("invalid expression: {parse_error}")),
            };
        }
        Ok(expr) => expr,
    };

    let mut names = BTreeSet::new();
    expr.variables(&mut names);
    let observed_values: BTreeMap<String, Value> = names
        .into_iter()
        .map(|name| {
            let value = scope.resolve(&name);
            (name, value)
        })
        .collect();

    match expr.eval(scope) {
        Ok(value) if truthy(&value) => AssertionResult {
            name: assertion.name.clone(),
            passed: true,
            observed_values,
            failure_reason: None,
        },
        Ok(_) => AssertionResult {
            name: assertion.name.clone(),
            passed: false,
            observed_values,
            failure_reason: Some("assertion evaluated to false".to_string()),
        },
        Err(eval_error) => AssertionResult {
            name: assertion.name.clone(),
            passed: false,
            observed_values,
            failure_reason: Some(eval_error.to_string()),
        },
    }
}

fn timeout_result(job: &AlignJob) -> OperationResult {
    OperationResult {
        path: job.path.clone(),
        method: job.method.clone(),
        operation_id: job.operation_id.clone(),
        status: OperationStatus::Failed,
        matched_spans: 0,
        assertions: Vec::new(),
        note: Some(TIMEOUT_REASON.to_string()),
    }
}

fn summarize(results: &[OperationResult]) -> VerdictSummary {
    let mut summary = VerdictSummary {
        total: results.len(),
        ..VerdictSummary::default()
    };
    for result in results {
        match result.status {
            OperationStatus::Success => summary.success += 1,
            OperationStatus::Failed => summary.failed += 1,
            OperationStatus::Skipped => summary.skipped += 1,
        }
        summary.total_assertions += result.assertions.len();
        summary.failed_assertions += result.assertions.iter().filter(|a| !a.passed).count();
    }
    summary
}
