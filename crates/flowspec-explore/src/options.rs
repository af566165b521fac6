// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tuning knobs for contract induction.

use flowspec_contract::Aggregation;
use flowspec_contract::model::{DEFAULT_SERVICE_NAME, DEFAULT_SERVICE_VERSION};

/// Options for one induction run. Plain values; no hidden state.
#[derive(Debug, Clone)]
pub struct ExploreOptions {
    /// Response summarization policy.
    pub status_aggregation: Aggregation,
    /// Presence ratio at or above which a field is required.
    pub required_threshold: f64,
    /// Minimum combined sample count for an endpoint to be emitted.
    pub min_endpoint_samples: u64,
    /// Distinct-value ratio strictly above which a segment position is
    /// parameterized.
    pub path_clustering_threshold: f64,
    /// Minimum record occurrences a position needs before it may be
    /// parameterized.
    pub min_sample_size: u64,
    /// Cap on tracked distinct values per position; overflow parameterizes
    /// the position unconditionally.
    pub max_unique_values: usize,
    /// Service name written into contract metadata.
    pub service_name: String,
    /// Service version written into contract metadata.
    pub service_version: String,
}

impl Default for ExploreOptions {
    fn default() -> Self {
        Self {
            status_aggregation: Aggregation::Auto,
            required_threshold: 0.95,
            min_endpoint_samples: 5,
            path_clustering_threshold: 0.8,
            min_sample_size: 20,
            max_unique_values: 10_000,
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            service_version: DEFAULT_SERVICE_VERSION.to_string(),
        }
    }
}
