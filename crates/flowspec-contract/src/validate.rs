// SPDX-License-Identifier: MIT OR Apache-2.0
//! Semantic validation of parsed contract documents.

use crate::model::{API_VERSION, KIND, Operation, ServiceSpec};
use flowspec_core::http::is_valid_status;

/// Validate a parsed document, returning every violated constraint.
///
/// An empty endpoint list is legal (an explore run over no traffic emits an
/// empty contract); an endpoint without operations is not.
pub fn validate(spec: &ServiceSpec) -> Result<(), Vec<String>> {
    let mut reasons = Vec::new();

    if spec.api_version != API_VERSION {
        reasons.push(format!(
            "unsupported apiVersion {:?}, expected {API_VERSION:?}",
            spec.api_version
        ));
    }
    if spec.kind != KIND {
        reasons.push(format!("unsupported kind {:?}, expected {KIND:?}", spec.kind));
    }

    for endpoint in &spec.spec.endpoints {
        let at = &endpoint.path;
        if !endpoint.path.starts_with('/') {
            reasons.push(format!("endpoint {at:?}: path must start with '/'"));
        }
        if endpoint.operations.is_empty() {
            reasons.push(format!("endpoint {at:?}: at least one operation is required"));
        }
        for op in &endpoint.operations {
            validate_operation(at, op, &mut reasons);
        }
    }

    if reasons.is_empty() { Ok(()) } else { Err(reasons) }
}

fn validate_operation(at: &str, op: &Operation, reasons: &mut Vec<String>) {
    let loc = format!("{at} {}", op.method);

    if op.method.trim().is_empty() {
        reasons.push(format!("{at}: operation method must not be empty"));
    }

    let responses = &op.responses;
    if responses.status_codes.is_empty() && responses.status_ranges.is_empty() {
        reasons.push(format!(
            "{loc}: responses need at least one status code or range"
        ));
    }
    for code in &responses.status_codes {
        if !is_valid_status(*code) {
            reasons.push(format!("{loc}: status code {code} outside 100..=599"));
        }
    }

    for name in overlap(&op.required.headers, &op.optional.headers) {
        reasons.push(format!("{loc}: header {name:?} is both required and optional"));
    }
    for name in overlap(&op.required.query, &op.optional.query) {
        reasons.push(format!(
            "{loc}: query parameter {name:?} is both required and optional"
        ));
    }
}

fn overlap<'a>(a: &'a [String], b: &'a [String]) -> Vec<&'a str> {
    a.iter()
        .filter(|x| b.contains(x))
        .map(String::as_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Aggregation, Endpoint, FieldSet, Responses};

    fn op_with(codes: Vec<u16>) -> Operation {
        Operation {
            method: "GET".into(),
            operation_id: None,
            responses: Responses {
                status_codes: codes,
                status_ranges: Vec::new(),
                aggregation: Aggregation::Exact,
            },
            required: FieldSet::default(),
            optional: FieldSet::default(),
            stats: None,
            pre_conditions: None,
            post_conditions: None,
        }
    }

    fn spec_with(endpoints: Vec<Endpoint>) -> ServiceSpec {
        let mut spec = ServiceSpec::new("svc", "v1");
        spec.spec.endpoints = endpoints;
        spec
    }

    #[test]
    fn empty_contract_is_valid() {
        assert!(validate(&spec_with(Vec::new())).is_ok());
    }

    #[test]
    fn endpoint_without_operations_is_rejected() {
        let spec = spec_with(vec![Endpoint {
            path: "/x".into(),
            operations: Vec::new(),
        }]);
        let reasons = validate(&spec).unwrap_err();
        assert!(reasons.iter().any(|r| r.contains("at least one operation")));
    }

    #[test]
    fn out_of_range_codes_are_rejected() {
        let spec = spec_with(vec![Endpoint {
            path: "/x".into(),
            operations: vec![op_with(vec![200, 999])],
        }]);
        let reasons = validate(&spec).unwrap_err();
        assert!(reasons.iter().any(|r| r.contains("999")));
    }

    #[test]
    fn empty_responses_are_rejected() {
        let spec = spec_with(vec![Endpoint {
            path: "/x".into(),
            operations: vec![op_with(Vec::new())],
        }]);
        let reasons = validate(&spec).unwrap_err();
        assert!(reasons.iter().any(|r| r.contains("at least one status")));
    }

    #[test]
    fn required_optional_overlap_is_rejected() {
        let mut op = op_with(vec![200]);
        op.required.headers = vec!["authorization".into()];
        op.optional.headers = vec!["authorization".into()];
        let spec = spec_with(vec![Endpoint {
            path: "/x".into(),
            operations: vec![op],
        }]);
        let reasons = validate(&spec).unwrap_err();
        assert!(
            reasons
                .iter()
                .any(|r| r.contains("both required and optional"))
        );
    }

    #[test]
    fn wrong_api_version_is_rejected() {
        let mut spec = spec_with(Vec::new());
        spec.api_version = "flowspec/v2".into();
        let reasons = validate(&spec).unwrap_err();
        assert!(reasons.iter().any(|r| r.contains("apiVersion")));
    }
}
