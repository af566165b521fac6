// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod engine;
pub mod expr;
pub mod matcher;
pub mod verdict;

pub use engine::{
    AlignConfig, AlignmentEngine, CANCELLED_NOTE, NO_SPAN_NOTE, SpanScope, TIMEOUT_REASON,
};
pub use expr::{CmpOp, EvalError, Expr, ExprError, Scope, truthy};
pub use matcher::{OperationMatcher, template_matches};
pub use verdict::{
    AssertionResult, OperationResult, OperationStatus, PerformanceInfo, Verdict, VerdictSummary,
};
