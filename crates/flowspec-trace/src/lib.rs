// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod loader;
pub mod model;

pub use loader::{MIGRATION_HINT, SUPPORTED_FORMATS, TraceError, from_json_file, from_json_str};
pub use model::{Span, SpanEvent, SpanStatus, TraceData};
