// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod inducer;
pub mod options;

pub use inducer::{ContractInducer, InducedContract};
pub use options::ExploreOptions;
