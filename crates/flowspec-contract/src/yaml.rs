// SPDX-License-Identifier: MIT OR Apache-2.0
//! YAML reading and writing, including the legacy flat contract shape.

use crate::model::{
    Aggregation, DEFAULT_SERVICE_VERSION, Endpoint, FieldSet, Operation, Responses, ServiceSpec,
};
use crate::validate;
use serde::Deserialize;
use std::path::Path;

/// Errors surfaced while reading or validating a contract document.
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    /// The file could not be read.
    #[error("cannot read contract {path}: {source}")]
    Io {
        /// Path that was requested.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid YAML or does not match the schema.
    #[error("failed to parse contract YAML: {reason}")]
    Parse {
        /// Parser detail, including the YAML location when available.
        reason: String,
    },

    /// A path template uses the legacy `:name` parameter syntax.
    #[error(
        "legacy path parameter `{segment}` in `{path}`: rewrite it as `{{{name}}}` (brace syntax)"
    )]
    LegacyPathParam {
        /// The offending endpoint path.
        path: String,
        /// The offending segment, colon included.
        segment: String,
        /// The parameter name to use inside braces.
        name: String,
    },

    /// Semantic validation failed with one or more reasons.
    #[error("contract validation failed: {reasons:?}")]
    Validation {
        /// Individual validation failure messages.
        reasons: Vec<String>,
    },
}

/// The legacy flat document: one endpoint, one method list, one code list.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyDocument {
    endpoint: LegacyEndpoint,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyEndpoint {
    path: String,
    methods: Vec<String>,
    #[serde(default)]
    status_codes: Vec<u16>,
}

/// Parse a contract from YAML text, normalizing the legacy shape, and run
/// semantic validation.
pub fn from_yaml_str(text: &str) -> Result<ServiceSpec, ContractError> {
    let doc: serde_yaml::Value = serde_yaml::from_str(text).map_err(parse_error)?;

    let spec = if doc.get("endpoint").is_some() {
        let legacy: LegacyDocument = serde_yaml::from_value(doc).map_err(parse_error)?;
        normalize_legacy(legacy)
    } else {
        serde_yaml::from_value(doc).map_err(parse_error)?
    };

    reject_legacy_params(&spec)?;
    validate::validate(&spec).map_err(|reasons| ContractError::Validation { reasons })?;
    Ok(spec)
}

/// Read and parse a contract file.
pub fn from_yaml_file(path: &Path) -> Result<ServiceSpec, ContractError> {
    let text = std::fs::read_to_string(path).map_err(|source| ContractError::Io {
        path: path.display().to_string(),
        source,
    })?;
    from_yaml_str(&text)
}

/// Serialize a contract to YAML.
///
/// Output is deterministic: field order follows the model and every list is
/// pre-sorted by the producer.
pub fn to_yaml_string(spec: &ServiceSpec) -> Result<String, ContractError> {
    serde_yaml::to_string(spec).map_err(parse_error)
}

fn parse_error(err: serde_yaml::Error) -> ContractError {
    ContractError::Parse {
        reason: err.to_string(),
    }
}

/// Re-read the legacy flat shape into the normalized operations shape: one
/// operation per method, `exact` aggregation over the flat code list.
fn normalize_legacy(doc: LegacyDocument) -> ServiceSpec {
    let mut codes = doc.endpoint.status_codes;
    codes.sort_unstable();
    codes.dedup();

    let operations = doc
        .endpoint
        .methods
        .iter()
        .map(|m| Operation {
            method: m.to_ascii_uppercase(),
            operation_id: None,
            responses: Responses {
                status_codes: codes.clone(),
                status_ranges: Vec::new(),
                aggregation: Aggregation::Exact,
            },
            required: FieldSet::default(),
            optional: FieldSet::default(),
            stats: None,
            pre_conditions: None,
            post_conditions: None,
        })
        .collect();

    let mut spec = ServiceSpec::new(
        doc.name.unwrap_or_else(|| "legacy-service".to_string()),
        doc.version
            .unwrap_or_else(|| DEFAULT_SERVICE_VERSION.to_string()),
    );
    spec.spec.endpoints.push(Endpoint {
        path: doc.endpoint.path,
        operations,
    });
    spec
}

/// Reject `:name` path parameters with a rewrite hint.
fn reject_legacy_params(spec: &ServiceSpec) -> Result<(), ContractError> {
    for endpoint in &spec.spec.endpoints {
        for segment in endpoint.path.split('/') {
            if let Some(name) = segment.strip_prefix(':')
                && !name.is_empty()
            {
                return Err(ContractError::LegacyPathParam {
                    path: endpoint.path.clone(),
                    segment: segment.to_string(),
                    name: name.to_string(),
                });
            }
        }
    }
    Ok(())
}
