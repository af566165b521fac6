// SPDX-License-Identifier: MIT OR Apache-2.0
//! Typed model of the `flowspec/v1alpha1 ServiceSpec` document.

use crate::conditions::ConditionSet;
use chrono::{DateTime, Utc};
use flowspec_core::StatusClass;
use serde::{Deserialize, Serialize};

/// The contract format version this crate reads and writes.
pub const API_VERSION: &str = "flowspec/v1alpha1";

/// The document kind.
pub const KIND: &str = "ServiceSpec";

/// Default service name when the caller supplies none.
pub const DEFAULT_SERVICE_NAME: &str = "generated-service";

/// Default service version when the caller supplies none.
pub const DEFAULT_SERVICE_VERSION: &str = "v1.0.0";

/// A complete service contract document.
///
/// Once emitted by the inducer (or parsed from disk) the document is a value
/// object: consumers never mutate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpec {
    /// Contract format version, [`API_VERSION`].
    pub api_version: String,
    /// Document kind, [`KIND`].
    pub kind: String,
    /// Service identity.
    pub metadata: Metadata,
    /// The contract body.
    pub spec: SpecBody,
}

impl ServiceSpec {
    /// Create an empty contract for the given service identity.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: Metadata {
                name: name.into(),
                version: version.into(),
            },
            spec: SpecBody {
                endpoints: Vec::new(),
            },
        }
    }

    /// Concatenate the endpoints of several documents under the identity of
    /// the first. Returns `None` for an empty input.
    #[must_use]
    pub fn merge(specs: Vec<ServiceSpec>) -> Option<ServiceSpec> {
        let mut iter = specs.into_iter();
        let mut merged = iter.next()?;
        for spec in iter {
            merged.spec.endpoints.extend(spec.spec.endpoints);
        }
        Some(merged)
    }

    /// Total number of operations across all endpoints.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.spec.endpoints.iter().map(|e| e.operations.len()).sum()
    }
}

/// Service identity carried in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Service name.
    pub name: String,
    /// Service version.
    pub version: String,
}

/// The `spec` body of the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecBody {
    /// Templated endpoints, sorted by path.
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

/// A templated path grouping one or more operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Path template with `{var}` segments.
    pub path: String,
    /// Operations on this path, sorted by canonical method order.
    pub operations: Vec<Operation>,
}

/// One operation: a method on a templated path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Uppercase HTTP method.
    pub method: String,
    /// Span name to match, for contracts derived from source annotations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    /// Observed response summary.
    pub responses: Responses,
    /// Fields present in at least the required-threshold share of samples.
    #[serde(default, skip_serializing_if = "FieldSet::is_empty")]
    pub required: FieldSet,
    /// Fields observed below the required threshold.
    #[serde(default, skip_serializing_if = "FieldSet::is_empty")]
    pub optional: FieldSet,
    /// Aggregation provenance, when induced from traffic.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<OperationStats>,
    /// Named assertions evaluated before the operation's span.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_conditions: Option<ConditionSet>,
    /// Named assertions evaluated after the operation's span.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_conditions: Option<ConditionSet>,
}

/// Response aggregation carried by an operation.
///
/// At least one of `status_codes` / `status_ranges` is non-empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Responses {
    /// Exact status codes, ascending.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub status_codes: Vec<u16>,
    /// Status classes (`1xx`..`5xx`), ascending.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub status_ranges: Vec<StatusClass>,
    /// The policy that produced this summary.
    #[serde(default)]
    pub aggregation: Aggregation,
}

impl Responses {
    /// Whether an observed status code satisfies this summary.
    #[must_use]
    pub fn permits(&self, code: u16) -> bool {
        self.status_codes.contains(&code)
            || self.status_ranges.iter().any(|r| r.contains(code))
    }
}

/// The policy used to summarize observed response status codes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// Unique observed codes.
    Exact,
    /// Status classes touched by the observations.
    Range,
    /// Choose between `exact` and `range` from the evidence.
    #[default]
    Auto,
}

/// Required/optional field groups for an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSet {
    /// Header names, lowercased, sorted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<String>,
    /// Query parameter names, case-preserved, sorted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query: Vec<String>,
}

impl FieldSet {
    /// Whether both groups are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.query.is_empty()
    }
}

/// Provenance statistics attached to an induced operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationStats {
    /// Number of samples that supported this operation.
    pub support_count: u64,
    /// Earliest observed timestamp.
    pub first_seen: DateTime<Utc>,
    /// Latest observed timestamp.
    pub last_seen: DateTime<Utc>,
}
