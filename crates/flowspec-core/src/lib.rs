// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod http;
pub mod lang;
pub mod metrics;
pub mod record;
pub mod redact;

pub use http::{StatusClass, method_rank, status_class};
pub use lang::Lang;
pub use metrics::{ErrorSample, IngestMetrics};
pub use record::NormalizedRecord;
pub use redact::{RedactionConfig, RedactionPolicy, RedactionRule};
