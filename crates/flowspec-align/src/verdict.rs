// SPDX-License-Identifier: MIT OR Apache-2.0
//! Verdict value types: per-assertion, per-operation, and aggregate results.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Outcome of evaluating one operation against the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    /// Every precondition and postcondition passed.
    Success,
    /// At least one assertion failed (or evaluation timed out).
    Failed,
    /// No span matched the operation.
    Skipped,
}

/// Result of one assertion evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResult {
    /// Assertion name, as declared in the contract.
    pub name: String,
    /// Whether the assertion held.
    pub passed: bool,
    /// Values of the variables the assertion referenced, for diagnostics.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub observed_values: BTreeMap<String, Value>,
    /// Why the assertion failed, when it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

/// Result for one contract operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    /// Endpoint path template.
    pub path: String,
    /// HTTP method.
    pub method: String,
    /// Operation id, for annotation-derived contracts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    /// The operation's verdict.
    pub status: OperationStatus,
    /// How many spans matched the operation.
    pub matched_spans: usize,
    /// Assertion results in declaration order (repeated per matched span).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<AssertionResult>,
    /// Additional context (skip reason, cancellation).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl OperationResult {
    /// Display identity: the operation id when present, else method + path.
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.operation_id {
            Some(id) => id.clone(),
            None => format!("{} {}", self.method, self.path),
        }
    }
}

/// Aggregated counters over every operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerdictSummary {
    /// Number of operations evaluated (or skipped).
    pub total: usize,
    /// Operations with every assertion passing.
    pub success: usize,
    /// Operations with at least one failing assertion.
    pub failed: usize,
    /// Operations with no matching span.
    pub skipped: usize,
    /// Assertion evaluations performed.
    pub total_assertions: usize,
    /// Assertion evaluations that failed.
    pub failed_assertions: usize,
}

/// Wall-clock information about the evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceInfo {
    /// Total evaluation duration in milliseconds.
    pub duration_ms: u64,
    /// Size of the worker pool used.
    pub workers: usize,
}

/// The complete, report-ready verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    /// Per-operation results, deterministically sorted.
    pub results: Vec<OperationResult>,
    /// Aggregate counters.
    pub summary: VerdictSummary,
    /// Evaluation timing.
    pub performance: PerformanceInfo,
}

impl Verdict {
    /// Success iff every operation is success or skipped.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.summary.failed == 0
    }

    /// The process exit code for this verdict.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.passed() { 0 } else { 1 }
    }
}
