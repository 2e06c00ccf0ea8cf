//! Error types for the cmetrics data model and codecs.

use thiserror::Error;

use crate::metric::MetricKind;

/// The main error type for all cmetrics operations.
///
/// Each variant wraps the error enum of one concern: sample mutation and
/// lookup, binary decoding, or encoding.
#[derive(Error, Debug)]
pub enum CmetricsError {
    /// Error while creating a metric or mutating/querying its samples.
    #[error("metric error: {0}")]
    Metric(#[from] MetricError),

    /// The binary buffer is malformed.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Encoding failed.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// A configuration value is invalid.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl CmetricsError {
    /// Returns `true` if the label-value tuple had the wrong length.
    pub fn is_invalid_arity(&self) -> bool {
        matches!(self, Self::Metric(MetricError::InvalidArity { .. }))
    }

    /// Returns `true` if a lookup found no sample for the tuple.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Metric(MetricError::NotFound { .. }))
    }

    /// Returns `true` for any structural violation in a binary buffer.
    pub fn is_decode_malformed(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

/// Errors raised by metric creation and sample operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    /// The label-value tuple is neither empty nor of full dimension arity.
    #[error("expected 0 or {expected} label values, got {got}")]
    InvalidArity {
        /// The metric's dimension count.
        expected: usize,
        /// The number of values supplied.
        got: usize,
    },

    /// No sample exists for the label values.
    #[error("no sample for label values {values:?}")]
    NotFound {
        /// The label values that were looked up.
        values: Vec<String>,
    },

    /// The metric handle does not belong to this context.
    #[error("invalid metric handle: {handle}")]
    InvalidHandle {
        /// The handle index.
        handle: usize,
    },

    /// The metric identity is unusable.
    #[error("invalid metric name: {reason}")]
    InvalidName {
        /// Why the name was rejected.
        reason: String,
    },

    /// A counter was asked to go down.
    #[error("counter cannot decrease from {current} to {requested}")]
    Decreasing {
        /// The value currently held.
        current: f64,
        /// The value the operation would have produced.
        requested: f64,
    },

    /// The operation is not defined for this metric kind.
    #[error("{operation} is not supported on {kind} metrics")]
    UnsupportedOperation {
        /// The metric kind.
        kind: MetricKind,
        /// The rejected operation.
        operation: &'static str,
    },
}

/// Structural violations found while decoding a binary record.
///
/// `offset` fields are byte positions relative to the start of the buffer
/// passed to the decoder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The decode cursor points past the end of the buffer.
    #[error("cursor {cursor} is beyond buffer length {len}")]
    CursorOutOfBounds {
        /// The cursor position.
        cursor: usize,
        /// The buffer length.
        len: usize,
    },

    /// The buffer ended before `field` was complete.
    #[error("buffer truncated while reading {field} at offset {offset}")]
    Truncated {
        /// The field being read.
        field: &'static str,
        /// Where reading stopped.
        offset: usize,
    },

    /// A value of the wrong MessagePack type was found.
    #[error("unexpected {found} for {field} at offset {offset}")]
    UnexpectedType {
        /// The field being read.
        field: &'static str,
        /// Debug rendering of the marker encountered.
        found: String,
        /// Where the marker was found.
        offset: usize,
    },

    /// An integer did not fit the target type.
    #[error("{field} out of range at offset {offset}")]
    OutOfRange {
        /// The field being read.
        field: &'static str,
        /// Where the integer was found.
        offset: usize,
    },

    /// A declared length is larger than the bytes left in the buffer.
    #[error("{field} declares length {declared} but only {remaining} bytes remain")]
    LengthExceedsBuffer {
        /// The field being read.
        field: &'static str,
        /// The declared length.
        declared: usize,
        /// Bytes remaining at that point.
        remaining: usize,
    },

    /// A string is not valid UTF-8.
    #[error("{field} is not valid UTF-8 at offset {offset}")]
    InvalidUtf8 {
        /// The field being read.
        field: &'static str,
        /// Where the string payload started.
        offset: usize,
    },

    /// A map contained a key this format does not define.
    #[error("unknown field '{key}' in {container}")]
    UnknownField {
        /// The enclosing map.
        container: &'static str,
        /// The offending key.
        key: String,
    },

    /// A required map entry was absent.
    #[error("missing field '{field}' in {container}")]
    MissingField {
        /// The enclosing map.
        container: &'static str,
        /// The absent key.
        field: &'static str,
    },

    /// A map key appeared twice.
    #[error("duplicate field '{field}' in {container}")]
    DuplicateField {
        /// The enclosing map.
        container: &'static str,
        /// The repeated key.
        field: &'static str,
    },

    /// A sample tuple does not match the metric's dimension count.
    #[error("sample of metric '{metric}' has {got} label values, expected 0 or {expected}")]
    ArityMismatch {
        /// Fully-qualified metric name.
        metric: String,
        /// The metric's dimension count.
        expected: usize,
        /// Values found in the sample.
        got: usize,
    },

    /// Two samples of one metric carry the same tuple.
    #[error("metric '{metric}' repeats label values {values:?}")]
    DuplicateSeries {
        /// Fully-qualified metric name.
        metric: String,
        /// The repeated tuple.
        values: Vec<String>,
    },

    /// The decoded identity is not a valid metric.
    #[error("invalid metric: {reason}")]
    InvalidMetric {
        /// Why the metric was rejected.
        reason: String,
    },

    /// The metric kind code is not known.
    #[error("unknown metric kind code {code}")]
    UnknownKind {
        /// The code found in the buffer.
        code: u64,
    },

    /// A configured decode limit was exceeded.
    #[error("{what} count {count} exceeds limit {limit}")]
    LimitExceeded {
        /// What was being counted.
        what: &'static str,
        /// The declared count.
        count: usize,
        /// The configured cap.
        limit: usize,
    },
}

/// Errors raised while producing an encoded buffer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// The underlying writer rejected the data.
    #[error("failed to write {field}: {reason}")]
    Write {
        /// The field being written.
        field: &'static str,
        /// The writer's error message.
        reason: String,
    },

    /// A collection is too large for the wire format's 32-bit lengths.
    #[error("{field} has {len} entries, more than the format allows")]
    TooLarge {
        /// The field being written.
        field: &'static str,
        /// The collection length.
        len: usize,
    },
}

/// Errors raised when validating configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A limit was set to zero.
    #[error("{field} must be greater than zero")]
    ZeroLimit {
        /// The offending setting.
        field: &'static str,
    },
}

/// Type alias for `Result<T, CmetricsError>`.
pub type Result<T> = std::result::Result<T, CmetricsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_predicates() {
        let err: CmetricsError = MetricError::InvalidArity { expected: 2, got: 1 }.into();
        assert!(err.is_invalid_arity());
        assert!(!err.is_not_found());

        let err: CmetricsError = DecodeError::Truncated { field: "metrics", offset: 3 }.into();
        assert!(err.is_decode_malformed());
        assert!(!err.is_invalid_arity());
    }

    #[test]
    fn test_display_messages() {
        let err: CmetricsError = MetricError::InvalidArity { expected: 2, got: 1 }.into();
        assert_eq!(err.to_string(), "metric error: expected 0 or 2 label values, got 1");

        let err = MetricError::UnsupportedOperation {
            kind: MetricKind::Counter,
            operation: "decrement",
        };
        assert_eq!(err.to_string(), "decrement is not supported on counter metrics");
    }
}
