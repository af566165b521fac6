// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod decode;
pub mod format;
pub mod ingestor;
pub mod normalize;
pub mod parse;

pub use format::{LogFormat, SUPPORTED_PRESETS, supports, unsupported_format_message};
pub use ingestor::{IngestOptions, TrafficIngestor};
pub use parse::{LineParser, ParseRejection, RawHit, TIMESTAMP_LAYOUT};
