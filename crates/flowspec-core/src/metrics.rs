// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-ingestor metrics with bounded error sampling.

use serde::{Deserialize, Serialize};

/// Error rate above which a traffic ingestion run is deemed incomplete.
pub const INCOMPLETE_ERROR_RATE: f64 = 0.10;

/// Maximum number of offending lines retained for diagnostics.
pub const ERROR_SAMPLE_CAPACITY: usize = 10;

/// One sampled per-line failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSample {
    /// 1-based line number within the offending file.
    pub line_number: u64,
    /// The raw line content (possibly truncated by the scanner).
    pub line: String,
    /// Why the line was rejected.
    pub reason: String,
}

/// Counters accumulated by a traffic ingestion run.
///
/// Mutated only by the ingestor; consumers read a snapshot after (or during)
/// the run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestMetrics {
    /// Lines read across all inputs, including rejected ones.
    pub total_lines: u64,
    /// Lines successfully parsed into records (before filtering/sampling).
    pub parsed_lines: u64,
    /// Lines rejected by parsing, timestamp, or status validation.
    pub error_lines: u64,
    /// Wall-clock duration of the run in milliseconds.
    pub duration_ms: u64,
    /// Bounded sample of rejected lines, capped at [`ERROR_SAMPLE_CAPACITY`].
    pub error_samples: Vec<ErrorSample>,
}

impl IngestMetrics {
    /// Record a per-line failure, sampling the offending line while capacity
    /// remains.
    pub fn record_error(&mut self, line_number: u64, line: &str, reason: impl Into<String>) {
        self.error_lines += 1;
        if self.error_samples.len() < ERROR_SAMPLE_CAPACITY {
            self.error_samples.push(ErrorSample {
                line_number,
                line: line.to_string(),
                reason: reason.into(),
            });
        }
    }

    /// Fraction of read lines that were rejected; `0.0` when nothing was read.
    #[must_use]
    pub fn error_rate(&self) -> f64 {
        if self.total_lines == 0 {
            return 0.0;
        }
        self.error_lines as f64 / self.total_lines as f64
    }

    /// A run is incomplete when its error rate exceeds
    /// [`INCOMPLETE_ERROR_RATE`].
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        self.error_rate() > INCOMPLETE_ERROR_RATE
    }
}
