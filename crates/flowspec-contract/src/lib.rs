// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod conditions;
pub mod model;
pub mod validate;
pub mod yaml;

pub use conditions::ConditionSet;
pub use model::{
    API_VERSION, Aggregation, Endpoint, FieldSet, KIND, Metadata, Operation, OperationStats,
    Responses, ServiceSpec, SpecBody,
};
pub use validate::validate;
pub use yaml::{ContractError, from_yaml_file, from_yaml_str, to_yaml_string};
