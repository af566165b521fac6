// SPDX-License-Identifier: MIT OR Apache-2.0
//! The online aggregator and its emission pass.

use crate::options::ExploreOptions;
use chrono::{DateTime, Utc};
use flowspec_contract::{
    Aggregation, Endpoint, FieldSet, Operation, OperationStats, Responses, ServiceSpec,
};
use flowspec_core::http::{method_rank, status_class};
use flowspec_core::{NormalizedRecord, StatusClass};
use flowspec_stream::{RecordIter, StreamError};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use tracing::debug;

/// Placeholder used for parameterized path segments.
pub const VAR_SEGMENT: &str = "{var}";

/// The induction result: a contract plus an optional advisory for the user.
#[derive(Debug, Clone)]
pub struct InducedContract {
    /// The emitted contract document.
    pub spec: ServiceSpec,
    /// Advice surfaced when the run produced no endpoints despite traffic.
    pub advisory: Option<String>,
}

/// One aggregation bucket, keyed by concrete `(path, method)`.
#[derive(Debug, Clone)]
struct Bucket {
    count: u64,
    statuses: BTreeMap<u16, u64>,
    headers: BTreeMap<String, u64>,
    query: BTreeMap<String, u64>,
    first_seen: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

impl Bucket {
    fn new(ts: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            statuses: BTreeMap::new(),
            headers: BTreeMap::new(),
            query: BTreeMap::new(),
            first_seen: ts,
            last_seen: ts,
        }
    }

    fn absorb(&mut self, other: &Bucket) {
        self.count += other.count;
        for (code, n) in &other.statuses {
            *self.statuses.entry(*code).or_insert(0) += n;
        }
        for (k, n) in &other.headers {
            *self.headers.entry(k.clone()).or_insert(0) += n;
        }
        for (k, n) in &other.query {
            *self.query.entry(k.clone()).or_insert(0) += n;
        }
        self.first_seen = self.first_seen.min(other.first_seen);
        self.last_seen = self.last_seen.max(other.last_seen);
    }
}

/// Distinct-value tracking for one `(depth, position)` slot.
#[derive(Debug, Default)]
struct SegmentStat {
    values: HashSet<String>,
    overflowed: bool,
    occurrences: u64,
}

/// Online, single-pass contract inducer.
///
/// Feed it records with [`observe`](Self::observe) (or drain a whole stream
/// with [`drain`](Self::drain)), then call [`emit`](Self::emit). Records are
/// never retained; memory is bounded by traffic diversity and the
/// per-position uniqueness cap.
#[derive(Debug)]
pub struct ContractInducer {
    options: ExploreOptions,
    buckets: BTreeMap<(String, String), Bucket>,
    segments: HashMap<(usize, usize), SegmentStat>,
}

impl ContractInducer {
    /// Create an inducer with the given options.
    #[must_use]
    pub fn new(options: ExploreOptions) -> Self {
        Self {
            options,
            buckets: BTreeMap::new(),
            segments: HashMap::new(),
        }
    }

    /// Total records observed so far.
    #[must_use]
    pub fn record_count(&self) -> u64 {
        self.buckets.values().map(|b| b.count).sum()
    }

    /// Fold one record into the aggregation state.
    pub fn observe(&mut self, record: &NormalizedRecord) {
        let method = record.method.to_ascii_uppercase();
        let key = (record.path.clone(), method);

        let bucket = self
            .buckets
            .entry(key)
            .or_insert_with(|| Bucket::new(record.timestamp));
        bucket.count += 1;
        *bucket.statuses.entry(record.status).or_insert(0) += 1;
        for name in record.headers.keys() {
            *bucket.headers.entry(name.clone()).or_insert(0) += 1;
        }
        for name in record.query.keys() {
            *bucket.query.entry(name.clone()).or_insert(0) += 1;
        }
        bucket.first_seen = bucket.first_seen.min(record.timestamp);
        bucket.last_seen = bucket.last_seen.max(record.timestamp);

        let segments: Vec<&str> = record.segments().collect();
        let depth = segments.len();
        for (pos, seg) in segments.iter().enumerate() {
            let stat = self.segments.entry((depth, pos)).or_default();
            stat.occurrences += 1;
            if !stat.overflowed {
                stat.values.insert((*seg).to_string());
                if stat.values.len() > self.options.max_unique_values {
                    stat.overflowed = true;
                    stat.values.clear();
                    stat.values.shrink_to_fit();
                }
            }
        }
    }

    /// Drain an entire record stream into the inducer.
    ///
    /// Returns the stream's terminal error, if it ended with one.
    pub async fn drain<I>(&mut self, iter: &mut I) -> Result<(), StreamError>
    where
        I: RecordIter<NormalizedRecord>,
    {
        while iter.advance().await {
            self.observe(iter.current());
        }
        match iter.error() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Emit the contract. The inducer state is left intact, so emission is
    /// repeatable and deterministic.
    #[must_use]
    pub fn emit(&self) -> InducedContract {
        let parameterized = self.parameterized_positions();

        // Remerge buckets that collapse to the same (template, method).
        let mut merged: BTreeMap<(String, String), Bucket> = BTreeMap::new();
        for ((path, method), bucket) in &self.buckets {
            let template = template_path(path, &parameterized);
            match merged.entry((template, method.clone())) {
                std::collections::btree_map::Entry::Vacant(slot) => {
                    slot.insert(bucket.clone());
                }
                std::collections::btree_map::Entry::Occupied(mut slot) => {
                    slot.get_mut().absorb(bucket);
                }
            }
        }

        // Admission, then grouping by template path.
        let mut by_path: BTreeMap<String, Vec<(String, &Bucket)>> = BTreeMap::new();
        let mut largest_support: u64 = 0;
        for ((template, method), bucket) in &merged {
            largest_support = largest_support.max(bucket.count);
            if bucket.count < self.options.min_endpoint_samples {
                debug!(
                    path = %template,
                    method = %method,
                    support = bucket.count,
                    "endpoint below min-samples, dropped"
                );
                continue;
            }
            by_path
                .entry(template.clone())
                .or_default()
                .push((method.clone(), bucket));
        }

        let mut endpoints = Vec::with_capacity(by_path.len());
        for (path, mut ops) in by_path {
            ops.sort_by(|(a, _), (b, _)| method_rank(a).cmp(&method_rank(b)));
            let operations = ops
                .into_iter()
                .map(|(method, bucket)| self.build_operation(method, bucket))
                .collect();
            endpoints.push(Endpoint { path, operations });
        }

        let advisory = if endpoints.is_empty() && !self.buckets.is_empty() {
            Some(format!(
                "no endpoint reached the {} sample minimum (largest observed support: \
                 {largest_support}); re-run with --min-samples {} or lower",
                self.options.min_endpoint_samples,
                largest_support.max(1)
            ))
        } else {
            None
        };

        let mut spec = ServiceSpec::new(
            self.options.service_name.clone(),
            self.options.service_version.clone(),
        );
        spec.spec.endpoints = endpoints;
        InducedContract { spec, advisory }
    }

    /// Decide which `(depth, position)` slots become `{var}`.
    ///
    /// A position is parameterized when its tracked value set overflowed, or
    /// when it has more than one distinct value, at least `min_sample_size`
    /// record occurrences, and a distinct-value ratio (distinct values over
    /// distinct concrete paths of that depth) strictly above the clustering
    /// threshold.
    fn parameterized_positions(&self) -> HashSet<(usize, usize)> {
        let mut unique_paths_by_depth: HashMap<usize, HashSet<&str>> = HashMap::new();
        for (path, _) in self.buckets.keys() {
            let depth = path.split('/').filter(|s| !s.is_empty()).count();
            unique_paths_by_depth
                .entry(depth)
                .or_default()
                .insert(path.as_str());
        }

        let mut parameterized = HashSet::new();
        for ((depth, pos), stat) in &self.segments {
            if stat.overflowed {
                parameterized.insert((*depth, *pos));
                continue;
            }
            let distinct = stat.values.len();
            if distinct <= 1 || stat.occurrences < self.options.min_sample_size {
                continue;
            }
            let unique_paths = unique_paths_by_depth
                .get(depth)
                .map_or(0, |paths| paths.len());
            if unique_paths == 0 {
                continue;
            }
            let ratio = distinct as f64 / unique_paths as f64;
            if ratio > self.options.path_clustering_threshold {
                parameterized.insert((*depth, *pos));
            }
        }
        parameterized
    }

    fn build_operation(&self, method: String, bucket: &Bucket) -> Operation {
        let responses = aggregate_responses(&bucket.statuses, self.options.status_aggregation);

        let (required_headers, optional_headers) =
            classify_fields(&bucket.headers, bucket.count, self.options.required_threshold);
        let (required_query, optional_query) =
            classify_fields(&bucket.query, bucket.count, self.options.required_threshold);

        Operation {
            method,
            operation_id: None,
            responses,
            required: FieldSet {
                headers: required_headers,
                query: required_query,
            },
            optional: FieldSet {
                headers: optional_headers,
                query: optional_query,
            },
            stats: Some(OperationStats {
                support_count: bucket.count,
                first_seen: bucket.first_seen,
                last_seen: bucket.last_seen,
            }),
            pre_conditions: None,
            post_conditions: None,
        }
    }
}

/// Rewrite a concrete path with `{var}` at the parameterized positions.
fn template_path(path: &str, parameterized: &HashSet<(usize, usize)>) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let depth = segments.len();
    if depth == 0 {
        return "/".to_string();
    }
    let mut out = String::new();
    for (pos, seg) in segments.iter().enumerate() {
        out.push('/');
        if parameterized.contains(&(depth, pos)) {
            out.push_str(VAR_SEGMENT);
        } else {
            out.push_str(seg);
        }
    }
    out
}

/// Summarize an observed status multiset under the requested policy.
///
/// Under `auto`, `range` is chosen when every status class present has at
/// least two samples; otherwise the exact codes are kept.
fn aggregate_responses(statuses: &BTreeMap<u16, u64>, policy: Aggregation) -> Responses {
    let chosen = match policy {
        Aggregation::Exact => Aggregation::Exact,
        Aggregation::Range => Aggregation::Range,
        Aggregation::Auto => {
            let mut class_samples: BTreeMap<StatusClass, u64> = BTreeMap::new();
            for (code, n) in statuses {
                if let Some(class) = status_class(*code) {
                    *class_samples.entry(class).or_insert(0) += n;
                }
            }
            if !class_samples.is_empty() && class_samples.values().all(|n| *n >= 2) {
                Aggregation::Range
            } else {
                Aggregation::Exact
            }
        }
    };

    match chosen {
        Aggregation::Exact => Responses {
            status_codes: statuses.keys().copied().collect(),
            status_ranges: Vec::new(),
            aggregation: Aggregation::Exact,
        },
        Aggregation::Range | Aggregation::Auto => {
            let classes: BTreeSet<StatusClass> = statuses
                .keys()
                .filter_map(|code| status_class(*code))
                .collect();
            Responses {
                status_codes: Vec::new(),
                status_ranges: classes.into_iter().collect(),
                aggregation: Aggregation::Range,
            }
        }
    }
}

/// Split observed field keys into required and optional by presence ratio.
///
/// `p >= threshold` puts a key into required; the sets are disjoint by
/// construction and each is sorted (`BTreeMap` iteration order).
fn classify_fields(
    presence: &BTreeMap<String, u64>,
    samples: u64,
    threshold: f64,
) -> (Vec<String>, Vec<String>) {
    let mut required = Vec::new();
    let mut optional = Vec::new();
    if samples == 0 {
        return (required, optional);
    }
    for (key, count) in presence {
        let ratio = *count as f64 / samples as f64;
        if ratio >= threshold {
            required.push(key.clone());
        } else {
            optional.push(key.clone());
        }
    }
    (required, optional)
}
