//! Unified error taxonomy with stable error codes for FlowSpec.
//!
//! Every FlowSpec error carries an [`ErrorCode`] (a machine-readable, stable
//! string tag), a human-readable message, an optional cause chain, and
//! arbitrary key-value context. Use the builder returned by
//! [`FlowError::new`] to construct errors fluently. Each code maps onto the
//! process exit code the CLI must produce when the error terminates a run.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Exit codes
// ---------------------------------------------------------------------------

/// Process exit code: run succeeded.
pub const EXIT_SUCCESS: i32 = 0;
/// Process exit code: contract validation failed.
pub const EXIT_VALIDATION_FAILED: i32 = 1;
/// Process exit code: contract/YAML format error.
pub const EXIT_CONTRACT_FORMAT: i32 = 2;
/// Process exit code: trace or traffic parse error.
pub const EXIT_PARSE_ERROR: i32 = 3;
/// Process exit code: runtime or environment error.
pub const EXIT_RUNTIME_ERROR: i32 = 4;
/// Process exit code: usage error.
pub const EXIT_USAGE_ERROR: i32 = 64;

// ---------------------------------------------------------------------------
// ErrorCategory
// ---------------------------------------------------------------------------

/// Broad family that an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Missing paths, unreadable files, unsupported extensions.
    Input,
    /// Unrecognized trace shape, invalid contract schema, invalid regex.
    Format,
    /// Per-line parse, timestamp, or status failures (recovered locally).
    Content,
    /// Predicate type mismatch, missing variable, operation timeout.
    Evaluation,
    /// Scanner overflow, cancellation.
    Resource,
    /// Malformed command-line invocation.
    Usage,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Input => "input",
            Self::Format => "format",
            Self::Content => "content",
            Self::Evaluation => "evaluation",
            Self::Resource => "resource",
            Self::Usage => "usage",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// Machine-readable, stable error code.
///
/// Each variant serialises to a `SCREAMING_SNAKE_CASE` string that is
/// guaranteed not to change across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // -- Input --
    /// A requested input path does not exist.
    InputMissingPath,
    /// An input file exists but could not be opened or read.
    InputUnreadable,
    /// The input's extension or content is not a supported traffic format.
    InputUnsupportedFormat,

    // -- Format --
    /// Trace JSON does not match any supported shape.
    TraceUnrecognizedShape,
    /// Contract document failed schema validation.
    ContractInvalid,
    /// Contract uses the legacy `:name` path-parameter syntax.
    ContractLegacyPathParam,
    /// A user-supplied log regex failed to compile.
    RegexInvalid,
    /// A named log-format preset does not exist.
    PresetUnknown,

    // -- Content --
    /// A log line did not match the configured pattern.
    LineParseFailed,
    /// A timestamp field did not match the expected layout.
    TimestampParseFailed,
    /// A status code fell outside `100..=599`.
    StatusOutOfRange,

    // -- Evaluation --
    /// A predicate compared incompatible types.
    PredicateTypeMismatch,
    /// A predicate referenced a variable absent from the span.
    PredicateMissingVariable,
    /// Per-operation evaluation exceeded its deadline.
    EvaluationTimeout,

    // -- Resource --
    /// A log line exceeded the scanner buffer limit.
    ScannerOverflow,
    /// The run was cancelled.
    Cancelled,

    // -- Usage --
    /// A command-line flag had an invalid value.
    UsageInvalidFlag,
}

impl ErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InputMissingPath | Self::InputUnreadable | Self::InputUnsupportedFormat => {
                ErrorCategory::Input
            }

            Self::TraceUnrecognizedShape
            | Self::ContractInvalid
            | Self::ContractLegacyPathParam
            | Self::RegexInvalid
            | Self::PresetUnknown => ErrorCategory::Format,

            Self::LineParseFailed | Self::TimestampParseFailed | Self::StatusOutOfRange => {
                ErrorCategory::Content
            }

            Self::PredicateTypeMismatch
            | Self::PredicateMissingVariable
            | Self::EvaluationTimeout => ErrorCategory::Evaluation,

            Self::ScannerOverflow | Self::Cancelled => ErrorCategory::Resource,

            Self::UsageInvalidFlag => ErrorCategory::Usage,
        }
    }

    /// The process exit code produced when this error terminates a run.
    ///
    /// Contract shape problems exit 2; traffic and trace parse problems exit
    /// 3; environment problems exit 4; usage problems exit 64. Content codes
    /// are normally recovered into metrics and only surface here when a
    /// consumer promotes them to fatal.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ContractInvalid | Self::ContractLegacyPathParam => EXIT_CONTRACT_FORMAT,

            Self::TraceUnrecognizedShape
            | Self::RegexInvalid
            | Self::PresetUnknown
            | Self::InputUnsupportedFormat
            | Self::LineParseFailed
            | Self::TimestampParseFailed
            | Self::StatusOutOfRange
            | Self::ScannerOverflow => EXIT_PARSE_ERROR,

            Self::InputMissingPath
            | Self::InputUnreadable
            | Self::PredicateTypeMismatch
            | Self::PredicateMissingVariable
            | Self::EvaluationTimeout
            | Self::Cancelled => EXIT_RUNTIME_ERROR,

            Self::UsageInvalidFlag => EXIT_USAGE_ERROR,
        }
    }

    /// Stable `&'static str` representation of the code (e.g.
    /// `"TRACE_UNRECOGNIZED_SHAPE"`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InputMissingPath => "INPUT_MISSING_PATH",
            Self::InputUnreadable => "INPUT_UNREADABLE",
            Self::InputUnsupportedFormat => "INPUT_UNSUPPORTED_FORMAT",
            Self::TraceUnrecognizedShape => "TRACE_UNRECOGNIZED_SHAPE",
            Self::ContractInvalid => "CONTRACT_INVALID",
            Self::ContractLegacyPathParam => "CONTRACT_LEGACY_PATH_PARAM",
            Self::RegexInvalid => "REGEX_INVALID",
            Self::PresetUnknown => "PRESET_UNKNOWN",
            Self::LineParseFailed => "LINE_PARSE_FAILED",
            Self::TimestampParseFailed => "TIMESTAMP_PARSE_FAILED",
            Self::StatusOutOfRange => "STATUS_OUT_OF_RANGE",
            Self::PredicateTypeMismatch => "PREDICATE_TYPE_MISMATCH",
            Self::PredicateMissingVariable => "PREDICATE_MISSING_VARIABLE",
            Self::EvaluationTimeout => "EVALUATION_TIMEOUT",
            Self::ScannerOverflow => "SCANNER_OVERFLOW",
            Self::Cancelled => "CANCELLED",
            Self::UsageInvalidFlag => "USAGE_INVALID_FLAG",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// FlowError
// ---------------------------------------------------------------------------

/// Unified FlowSpec error.
///
/// Carries a stable [`ErrorCode`], a human-readable message, an optional
/// source error for cause-chaining, and arbitrary structured context.
///
/// # Builder usage
///
/// ```
/// use flowspec_error::{ErrorCode, FlowError};
///
/// let err = FlowError::new(ErrorCode::InputUnreadable, "cannot open access log")
///     .with_context("file", "logs/access.log.gz")
///     .with_context("line", 0);
/// ```
pub struct FlowError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl FlowError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a key-value pair to the diagnostic context.
    ///
    /// The value is converted via [`serde_json::to_value`]; if serialisation
    /// fails, the entry is silently skipped.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.category()`.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Shorthand for `self.code.exit_code()`.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        self.code.exit_code()
    }
}

impl fmt::Debug for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("FlowError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for FlowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            // Deterministic output thanks to BTreeMap.
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for FlowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

// ---------------------------------------------------------------------------
// Serialization support
// ---------------------------------------------------------------------------

/// Serialisable snapshot of a [`FlowError`] (without the opaque source).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlowErrorDto {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    pub context: BTreeMap<String, serde_json::Value>,
    /// String representation of the source error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message: Option<String>,
}

impl From<&FlowError> for FlowErrorDto {
    fn from(err: &FlowError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            context: err.context.clone(),
            source_message: err.source.as_ref().map(|s| s.to_string()),
        }
    }
}

impl From<FlowErrorDto> for FlowError {
    fn from(dto: FlowErrorDto) -> Self {
        Self {
            code: dto.code,
            message: dto.message,
            source: None,
            context: dto.context,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
