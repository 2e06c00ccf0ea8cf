//! MessagePack binary encoding of a [`Context`].
//!
//! One call to [`encode`] produces one self-describing record:
//!
//! ```text
//! { "static_labels": [[key, value], ...],
//!   "metrics": [ { "namespace": str, "subsystem": str, "name": str,
//!                  "help": str, "kind": uint,
//!                  "dimension_keys": [str, ...],
//!                  "samples": [ { "values": [str, ...],
//!                                 "value": f64,
//!                                 "timestamp": uint } ] } ] }
//! ```
//!
//! # Canonical output
//!
//! Every sequence is written from the insertion-ordered storage of the
//! model, values are always 64-bit floats, and integers and lengths use
//! the smallest MessagePack form. Encoding a decoded record therefore
//! reproduces the original bytes exactly.
//!
//! # Untrusted input
//!
//! [`decode`] treats the buffer as hostile. Every declared length is
//! compared against the bytes that remain before anything is allocated,
//! strings are validated as UTF-8, each map must carry exactly the known
//! fields, and every sample tuple is checked against its metric's
//! dimension count. On error nothing is returned and the cursor is left
//! where it was.
//!
//! # Concatenated records
//!
//! A buffer may hold several records back to back. [`decode`] reads the one
//! starting at `*cursor` and moves the cursor past it; [`Records`] wraps
//! that loop as an iterator.

use rmp::decode::{NumValueReadError, ValueReadError};

use crate::config::DecodeConfig;
use crate::context::Context;
use crate::error::{DecodeError, EncodeError, Result};
use crate::metric::{Metric, MetricKind, MetricOpts, Sample};

const STATIC_LABELS: &str = "static_labels";
const METRICS: &str = "metrics";

const NAMESPACE: &str = "namespace";
const SUBSYSTEM: &str = "subsystem";
const NAME: &str = "name";
const HELP: &str = "help";
const KIND: &str = "kind";
const DIMENSION_KEYS: &str = "dimension_keys";
const SAMPLES: &str = "samples";

const VALUES: &str = "values";
const VALUE: &str = "value";
const TIMESTAMP: &str = "timestamp";

/// Smallest encodings of each element kind, used to cap up-front
/// allocations by what the remaining bytes could actually hold.
const MIN_STATIC_LABEL_LEN: usize = 3;
/// Map header, seven keys, empty strings, a fixint kind and two empty arrays.
const MIN_METRIC_LEN: usize = 66;
/// Map header, three keys, empty array, f64 and a fixint timestamp.
const MIN_SAMPLE_LEN: usize = 35;
const MIN_STRING_LEN: usize = 1;

/// Encodes `ctx` as a single binary record.
///
/// # Errors
///
/// Returns [`EncodeError`] if a collection exceeds the format's 32-bit
/// length fields or the writer fails.
pub fn encode(ctx: &Context) -> Result<Vec<u8>> {
    let mut wr = Writer::default();

    wr.map_len("record", 2)?;

    wr.str("record key", STATIC_LABELS)?;
    wr.array_len(STATIC_LABELS, ctx.static_labels().len())?;
    for label in ctx.static_labels() {
        wr.array_len("static label", 2)?;
        wr.str("static label key", &label.key)?;
        wr.str("static label value", &label.value)?;
    }

    wr.str("record key", METRICS)?;
    wr.array_len(METRICS, ctx.metrics().len())?;
    for metric in ctx.metrics() {
        write_metric(&mut wr, metric)?;
    }

    Ok(wr.buf)
}

fn write_metric(wr: &mut Writer, metric: &Metric) -> Result<()> {
    let opts = metric.opts();

    wr.map_len("metric", 7)?;
    wr.str("metric key", NAMESPACE)?;
    wr.str(NAMESPACE, &opts.namespace)?;
    wr.str("metric key", SUBSYSTEM)?;
    wr.str(SUBSYSTEM, &opts.subsystem)?;
    wr.str("metric key", NAME)?;
    wr.str(NAME, &opts.name)?;
    wr.str("metric key", HELP)?;
    wr.str(HELP, &opts.help)?;
    wr.str("metric key", KIND)?;
    wr.uint(KIND, metric.kind().code())?;

    wr.str("metric key", DIMENSION_KEYS)?;
    wr.array_len(DIMENSION_KEYS, metric.dimension_keys().len())?;
    for key in metric.dimension_keys() {
        wr.str(DIMENSION_KEYS, key)?;
    }

    wr.str("metric key", SAMPLES)?;
    wr.array_len(SAMPLES, metric.samples().len())?;
    for sample in metric.samples() {
        wr.map_len("sample", 3)?;
        wr.str("sample key", VALUES)?;
        wr.array_len(VALUES, sample.label_values.len())?;
        for value in &sample.label_values {
            wr.str(VALUES, value)?;
        }
        wr.str("sample key", VALUE)?;
        wr.f64(VALUE, sample.value)?;
        wr.str("sample key", TIMESTAMP)?;
        wr.uint(TIMESTAMP, sample.timestamp)?;
    }

    Ok(())
}

/// Thin wrapper mapping `rmp` write errors onto [`EncodeError`].
#[derive(Default)]
struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn map_len(&mut self, field: &'static str, len: usize) -> std::result::Result<(), EncodeError> {
        let len = u32::try_from(len).map_err(|_| EncodeError::TooLarge { field, len })?;
        rmp::encode::write_map_len(&mut self.buf, len).map_err(|e| write_error(field, &e))?;
        Ok(())
    }

    fn array_len(&mut self, field: &'static str, len: usize) -> std::result::Result<(), EncodeError> {
        let len = u32::try_from(len).map_err(|_| EncodeError::TooLarge { field, len })?;
        rmp::encode::write_array_len(&mut self.buf, len).map_err(|e| write_error(field, &e))?;
        Ok(())
    }

    fn str(&mut self, field: &'static str, value: &str) -> std::result::Result<(), EncodeError> {
        if u32::try_from(value.len()).is_err() {
            return Err(EncodeError::TooLarge {
                field,
                len: value.len(),
            });
        }
        rmp::encode::write_str(&mut self.buf, value).map_err(|e| write_error(field, &e))
    }

    fn f64(&mut self, field: &'static str, value: f64) -> std::result::Result<(), EncodeError> {
        rmp::encode::write_f64(&mut self.buf, value).map_err(|e| write_error(field, &e))
    }

    fn uint(&mut self, field: &'static str, value: u64) -> std::result::Result<(), EncodeError> {
        rmp::encode::write_uint(&mut self.buf, value).map_err(|e| write_error(field, &e))?;
        Ok(())
    }
}

fn write_error(field: &'static str, err: &impl std::fmt::Display) -> EncodeError {
    EncodeError::Write {
        field,
        reason: err.to_string(),
    }
}

/// Decodes the record at `*cursor` with default limits.
///
/// # Errors
///
/// Returns [`DecodeError`] for any structural problem. The cursor is not
/// moved on error.
pub fn decode(buf: &[u8], cursor: &mut usize) -> Result<Context> {
    decode_with(buf, cursor, &DecodeConfig::default())
}

/// Decodes the record at `*cursor` under `config` limits.
///
/// On success the cursor points to the first byte after the record.
///
/// # Errors
///
/// Returns [`DecodeError`] for any structural problem or exceeded limit,
/// and [`crate::error::ConfigError`] if `config` itself is invalid. The
/// cursor is not moved on error.
pub fn decode_with(buf: &[u8], cursor: &mut usize, config: &DecodeConfig) -> Result<Context> {
    config.validate()?;

    let Some(rest) = buf.get(*cursor..) else {
        return Err(DecodeError::CursorOutOfBounds {
            cursor: *cursor,
            len: buf.len(),
        }
        .into());
    };

    let mut reader = Reader { buf, rest, config };
    match reader.read_record() {
        Ok(ctx) => {
            let end = reader.offset();
            tracing::debug!(
                start = *cursor,
                end,
                metrics = ctx.metrics().len(),
                "decoded record"
            );
            *cursor = end;
            Ok(ctx)
        }
        Err(err) => {
            tracing::debug!(start = *cursor, error = %err, "record decode failed");
            Err(err.into())
        }
    }
}

/// Iterator over every record in a buffer of concatenated records.
///
/// Stops after the last byte is consumed or after the first error.
pub struct Records<'a> {
    buf: &'a [u8],
    cursor: usize,
    config: DecodeConfig,
    failed: bool,
}

impl<'a> Records<'a> {
    /// Iterates `buf` from the start with default limits.
    pub fn new(buf: &'a [u8]) -> Self {
        Self::with_config(buf, DecodeConfig::default())
    }

    /// Iterates `buf` from the start under `config` limits.
    pub fn with_config(buf: &'a [u8], config: DecodeConfig) -> Self {
        Self {
            buf,
            cursor: 0,
            config,
            failed: false,
        }
    }

    /// Byte offset of the next record.
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

impl Iterator for Records<'_> {
    type Item = Result<Context>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor >= self.buf.len() {
            return None;
        }
        let result = decode_with(self.buf, &mut self.cursor, &self.config);
        self.failed = result.is_err();
        Some(result)
    }
}

type DecodeResult<T> = std::result::Result<T, DecodeError>;

struct Reader<'a> {
    /// Whole input, kept for absolute offsets.
    buf: &'a [u8],
    /// Unread tail of `buf`.
    rest: &'a [u8],
    config: &'a DecodeConfig,
}

impl<'a> Reader<'a> {
    fn offset(&self) -> usize {
        self.buf.len() - self.rest.len()
    }

    fn read_record(&mut self) -> DecodeResult<Context> {
        let entries = self.map_len("record")?;

        let mut static_labels = None;
        let mut metrics = None;
        for _ in 0..entries {
            let key = self.string("record key")?;
            match key.as_str() {
                STATIC_LABELS => {
                    ensure_unset(&static_labels, "record", STATIC_LABELS)?;
                    static_labels = Some(self.read_static_labels()?);
                }
                METRICS => {
                    ensure_unset(&metrics, "record", METRICS)?;
                    metrics = Some(self.read_metrics()?);
                }
                _ => {
                    return Err(DecodeError::UnknownField {
                        container: "record",
                        key,
                    });
                }
            }
        }

        let static_labels = required(static_labels, "record", STATIC_LABELS)?;
        let metrics = required(metrics, "record", METRICS)?;

        let mut ctx = Context::new();
        for (key, value) in static_labels {
            ctx.static_labels_mut().push(key, value);
        }
        for metric in metrics {
            ctx.push_metric(metric);
        }
        Ok(ctx)
    }

    fn read_static_labels(&mut self) -> DecodeResult<Vec<(String, String)>> {
        let count = self.array_len(STATIC_LABELS)?;
        let mut labels = Vec::with_capacity(self.capacity(count, MIN_STATIC_LABEL_LEN));
        for _ in 0..count {
            let at = self.offset();
            let pair_len = self.array_len("static label")?;
            if pair_len != 2 {
                return Err(DecodeError::UnexpectedType {
                    field: "static label",
                    found: format!("array of {pair_len}"),
                    offset: at,
                });
            }
            let key = self.string("static label key")?;
            let value = self.string("static label value")?;
            labels.push((key, value));
        }
        Ok(labels)
    }

    fn read_metrics(&mut self) -> DecodeResult<Vec<Metric>> {
        let count = self.array_len(METRICS)?;
        if count > self.config.max_metrics {
            return Err(DecodeError::LimitExceeded {
                what: METRICS,
                count,
                limit: self.config.max_metrics,
            });
        }

        let mut metrics = Vec::with_capacity(self.capacity(count, MIN_METRIC_LEN));
        for _ in 0..count {
            metrics.push(self.read_metric()?);
        }
        Ok(metrics)
    }

    fn read_metric(&mut self) -> DecodeResult<Metric> {
        let entries = self.map_len("metric")?;

        let mut namespace = None;
        let mut subsystem = None;
        let mut name = None;
        let mut help = None;
        let mut kind = None;
        let mut dimension_keys = None;
        let mut samples = None;

        for _ in 0..entries {
            let key = self.string("metric key")?;
            match key.as_str() {
                NAMESPACE => {
                    ensure_unset(&namespace, "metric", NAMESPACE)?;
                    namespace = Some(self.string(NAMESPACE)?);
                }
                SUBSYSTEM => {
                    ensure_unset(&subsystem, "metric", SUBSYSTEM)?;
                    subsystem = Some(self.string(SUBSYSTEM)?);
                }
                NAME => {
                    ensure_unset(&name, "metric", NAME)?;
                    name = Some(self.string(NAME)?);
                }
                HELP => {
                    ensure_unset(&help, "metric", HELP)?;
                    help = Some(self.string(HELP)?);
                }
                KIND => {
                    ensure_unset(&kind, "metric", KIND)?;
                    let code = self.uint(KIND)?;
                    kind = Some(
                        MetricKind::from_code(code).ok_or(DecodeError::UnknownKind { code })?,
                    );
                }
                DIMENSION_KEYS => {
                    ensure_unset(&dimension_keys, "metric", DIMENSION_KEYS)?;
                    dimension_keys = Some(self.string_array(DIMENSION_KEYS)?);
                }
                SAMPLES => {
                    ensure_unset(&samples, "metric", SAMPLES)?;
                    samples = Some(self.read_samples()?);
                }
                _ => {
                    return Err(DecodeError::UnknownField {
                        container: "metric",
                        key,
                    });
                }
            }
        }

        let opts = MetricOpts::new(
            required(namespace, "metric", NAMESPACE)?,
            required(subsystem, "metric", SUBSYSTEM)?,
            required(name, "metric", NAME)?,
            required(help, "metric", HELP)?,
        );
        let kind = required(kind, "metric", KIND)?;
        let dimension_keys = required(dimension_keys, "metric", DIMENSION_KEYS)?;
        let samples = required(samples, "metric", SAMPLES)?;

        let mut metric = Metric::new(opts, kind, dimension_keys).map_err(|e| {
            DecodeError::InvalidMetric {
                reason: e.to_string(),
            }
        })?;

        let arity = metric.dimension_keys().len();
        for sample in samples {
            let got = sample.label_values.len();
            if got != 0 && got != arity {
                return Err(DecodeError::ArityMismatch {
                    metric: metric.opts().fqname().to_string(),
                    expected: arity,
                    got,
                });
            }
            if let Err(sample) = metric.samples_mut().insert(sample) {
                return Err(DecodeError::DuplicateSeries {
                    metric: metric.opts().fqname().to_string(),
                    values: sample.label_values,
                });
            }
        }

        Ok(metric)
    }

    fn read_samples(&mut self) -> DecodeResult<Vec<Sample>> {
        let count = self.array_len(SAMPLES)?;
        if count > self.config.max_samples_per_metric {
            return Err(DecodeError::LimitExceeded {
                what: SAMPLES,
                count,
                limit: self.config.max_samples_per_metric,
            });
        }

        let mut samples = Vec::with_capacity(self.capacity(count, MIN_SAMPLE_LEN));
        for _ in 0..count {
            samples.push(self.read_sample()?);
        }
        Ok(samples)
    }

    fn read_sample(&mut self) -> DecodeResult<Sample> {
        let entries = self.map_len("sample")?;

        let mut label_values = None;
        let mut value = None;
        let mut timestamp = None;
        for _ in 0..entries {
            let key = self.string("sample key")?;
            match key.as_str() {
                VALUES => {
                    ensure_unset(&label_values, "sample", VALUES)?;
                    label_values = Some(self.string_array(VALUES)?);
                }
                VALUE => {
                    ensure_unset(&value, "sample", VALUE)?;
                    value = Some(self.float(VALUE)?);
                }
                TIMESTAMP => {
                    ensure_unset(&timestamp, "sample", TIMESTAMP)?;
                    timestamp = Some(self.uint(TIMESTAMP)?);
                }
                _ => {
                    return Err(DecodeError::UnknownField {
                        container: "sample",
                        key,
                    });
                }
            }
        }

        Ok(Sample {
            label_values: required(label_values, "sample", VALUES)?,
            value: required(value, "sample", VALUE)?,
            timestamp: required(timestamp, "sample", TIMESTAMP)?,
        })
    }

    fn string_array(&mut self, field: &'static str) -> DecodeResult<Vec<String>> {
        let count = self.array_len(field)?;
        let mut values = Vec::with_capacity(self.capacity(count, MIN_STRING_LEN));
        for _ in 0..count {
            values.push(self.string(field)?);
        }
        Ok(values)
    }

    /// Reads a map header. Each entry needs at least two bytes.
    fn map_len(&mut self, field: &'static str) -> DecodeResult<usize> {
        let at = self.offset();
        let len = rmp::decode::read_map_len(&mut self.rest).map_err(|e| value_error(field, at, e))?;
        let len = len as usize;
        self.check_remaining(field, len.saturating_mul(2))?;
        Ok(len)
    }

    /// Reads an array header. Each element needs at least one byte.
    fn array_len(&mut self, field: &'static str) -> DecodeResult<usize> {
        let at = self.offset();
        let len = rmp::decode::read_array_len(&mut self.rest).map_err(|e| value_error(field, at, e))?;
        let len = len as usize;
        self.check_remaining(field, len)?;
        Ok(len)
    }

    fn string(&mut self, field: &'static str) -> DecodeResult<String> {
        let at = self.offset();
        let len = rmp::decode::read_str_len(&mut self.rest).map_err(|e| value_error(field, at, e))?;
        let len = len as usize;
        if len > self.config.max_string_len {
            return Err(DecodeError::LimitExceeded {
                what: field,
                count: len,
                limit: self.config.max_string_len,
            });
        }
        self.check_remaining(field, len)?;

        let payload_at = self.offset();
        let unread: &'a [u8] = self.rest;
        let (bytes, rest) = unread.split_at(len);
        self.rest = rest;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8 {
                field,
                offset: payload_at,
            })
    }

    fn float(&mut self, field: &'static str) -> DecodeResult<f64> {
        let at = self.offset();
        rmp::decode::read_f64(&mut self.rest).map_err(|e| value_error(field, at, e))
    }

    fn uint(&mut self, field: &'static str) -> DecodeResult<u64> {
        let at = self.offset();
        rmp::decode::read_int::<u64, _>(&mut self.rest).map_err(|e| match e {
            NumValueReadError::TypeMismatch(marker) => DecodeError::UnexpectedType {
                field,
                found: format!("{marker:?}"),
                offset: at,
            },
            NumValueReadError::OutOfRange => DecodeError::OutOfRange { field, offset: at },
            _ => DecodeError::Truncated { field, offset: at },
        })
    }

    /// Initial capacity for `count` elements of at least `min_len` bytes each.
    fn capacity(&self, count: usize, min_len: usize) -> usize {
        bounded_capacity(count, self.rest.len(), min_len)
    }

    fn check_remaining(&self, field: &'static str, needed: usize) -> DecodeResult<()> {
        if needed > self.rest.len() {
            return Err(DecodeError::LengthExceedsBuffer {
                field,
                declared: needed,
                remaining: self.rest.len(),
            });
        }
        Ok(())
    }
}

fn bounded_capacity(count: usize, remaining: usize, min_len: usize) -> usize {
    count.min(remaining / min_len.max(1))
}

fn value_error(field: &'static str, offset: usize, err: ValueReadError<std::io::Error>) -> DecodeError {
    match err {
        ValueReadError::TypeMismatch(marker) => DecodeError::UnexpectedType {
            field,
            found: format!("{marker:?}"),
            offset,
        },
        _ => DecodeError::Truncated { field, offset },
    }
}

fn ensure_unset<T>(slot: &Option<T>, container: &'static str, field: &'static str) -> DecodeResult<()> {
    if slot.is_some() {
        return Err(DecodeError::DuplicateField { container, field });
    }
    Ok(())
}

fn required<T>(slot: Option<T>, container: &'static str, field: &'static str) -> DecodeResult<T> {
    slot.ok_or(DecodeError::MissingField { container, field })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CmetricsError;

    fn sample_context() -> Context {
        let mut ctx = Context::new();
        let c = ctx
            .create_counter("kubernetes", "network", "load", "Network load", &["hostname", "app"])
            .unwrap();
        ctx.increment(c, 0, &[]).unwrap();
        ctx.add(c, 0, 2.0, &[]).unwrap();
        ctx.increment(c, 0, &["localhost", "cmetrics"]).unwrap();
        ctx.add(c, 0, 10.55, &["localhost", "test"]).unwrap();
        ctx.set(c, 0, 12.15, &["localhost", "test"]).unwrap();
        ctx
    }

    fn decode_err(buf: &[u8]) -> DecodeError {
        let mut cursor = 0;
        match decode(buf, &mut cursor) {
            Err(CmetricsError::Decode(err)) => err,
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    /// Hand-assembles a record with the given metric body written by `f`.
    fn record_with_metric(f: impl FnOnce(&mut Writer)) -> Vec<u8> {
        let mut wr = Writer::default();
        wr.map_len("record", 2).unwrap();
        wr.str("k", STATIC_LABELS).unwrap();
        wr.array_len("a", 0).unwrap();
        wr.str("k", METRICS).unwrap();
        wr.array_len("a", 1).unwrap();
        f(&mut wr);
        wr.buf
    }

    fn metric_header(wr: &mut Writer, dims: &[&str]) {
        wr.map_len("m", 7).unwrap();
        for (key, value) in [(NAMESPACE, "ns"), (SUBSYSTEM, "sub"), (NAME, "n"), (HELP, "h")] {
            wr.str("k", key).unwrap();
            wr.str("v", value).unwrap();
        }
        wr.str("k", KIND).unwrap();
        wr.uint("v", 0).unwrap();
        wr.str("k", DIMENSION_KEYS).unwrap();
        wr.array_len("a", dims.len()).unwrap();
        for dim in dims {
            wr.str("v", dim).unwrap();
        }
    }

    fn write_sample(wr: &mut Writer, values: &[&str]) {
        wr.map_len("s", 3).unwrap();
        wr.str("k", VALUES).unwrap();
        wr.array_len("a", values.len()).unwrap();
        for value in values {
            wr.str("v", value).unwrap();
        }
        wr.str("k", VALUE).unwrap();
        wr.f64("v", 1.0).unwrap();
        wr.str("k", TIMESTAMP).unwrap();
        wr.uint("v", 7).unwrap();
    }

    #[test]
    fn test_round_trip_is_byte_identical() {
        let first = encode(&sample_context()).unwrap();
        let mut cursor = 0;
        let decoded = decode(&first, &mut cursor).unwrap();
        let second = encode(&decoded).unwrap();

        assert_eq!(cursor, first.len());
        assert_eq!(first, second);
    }

    #[test]
    fn test_round_trip_preserves_model() {
        let mut original = sample_context();
        original.add_static_label("dev", "Calyptia");
        let buf = encode(&original).unwrap();
        let decoded = decode(&buf, &mut 0).unwrap();

        assert_eq!(decoded.static_labels(), original.static_labels());
        assert_eq!(decoded.metrics().len(), 1);
        let (a, b) = (&original.metrics()[0], &decoded.metrics()[0]);
        assert_eq!(a.opts(), b.opts());
        assert_eq!(a.kind(), b.kind());
        assert_eq!(a.dimension_keys(), b.dimension_keys());
        let a_samples: Vec<_> = a.samples().iter().collect();
        let b_samples: Vec<_> = b.samples().iter().collect();
        assert_eq!(a_samples, b_samples);
    }

    #[test]
    fn test_empty_context_round_trip() {
        let buf = encode(&Context::new()).unwrap();
        let mut cursor = 0;
        let ctx = decode(&buf, &mut cursor).unwrap();
        assert!(ctx.metrics().is_empty());
        assert_eq!(cursor, buf.len());
    }

    #[test]
    fn test_concatenated_records() {
        let mut other = Context::new();
        let g = other.create_gauge("node", "mem", "free", "Free", &[]).unwrap();
        other.set(g, 99, 512.0, &[]).unwrap();

        let mut buf = encode(&sample_context()).unwrap();
        let first_len = buf.len();
        buf.extend(encode(&other).unwrap());

        let mut cursor = 0;
        let first = decode(&buf, &mut cursor).unwrap();
        assert_eq!(cursor, first_len);
        let second = decode(&buf, &mut cursor).unwrap();
        assert_eq!(cursor, buf.len());

        assert_eq!(first.metrics()[0].opts().fqname(), "kubernetes_network_load");
        assert_eq!(second.metrics()[0].kind(), MetricKind::Gauge);

        let all: Vec<_> = Records::new(&buf).collect::<Result<_>>().unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_every_truncation_fails_cleanly() {
        let buf = encode(&sample_context()).unwrap();
        for len in 0..buf.len() {
            let mut cursor = 0;
            let result = decode(&buf[..len], &mut cursor);
            assert!(result.is_err(), "prefix of {len} bytes decoded");
            assert!(result.unwrap_err().is_decode_malformed());
            assert_eq!(cursor, 0);
        }
    }

    #[test]
    fn test_cursor_out_of_bounds() {
        let buf = encode(&Context::new()).unwrap();
        let mut cursor = buf.len() + 1;
        let err = decode(&buf, &mut cursor).unwrap_err();
        assert!(matches!(
            err,
            CmetricsError::Decode(DecodeError::CursorOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_wrong_top_level_type() {
        let mut buf = Vec::new();
        rmp::encode::write_array_len(&mut buf, 0).unwrap();
        assert!(matches!(
            decode_err(&buf),
            DecodeError::UnexpectedType { field: "record", offset: 0, .. }
        ));
    }

    #[test]
    fn test_declared_length_beyond_buffer() {
        let mut buf = Vec::new();
        rmp::encode::write_map_len(&mut buf, 1).unwrap();
        rmp::encode::write_str(&mut buf, METRICS).unwrap();
        rmp::encode::write_array_len(&mut buf, u32::MAX).unwrap();
        assert!(matches!(
            decode_err(&buf),
            DecodeError::LengthExceedsBuffer { field: METRICS, .. }
        ));
    }

    #[test]
    fn test_oversized_string_length() {
        let mut buf = Vec::new();
        rmp::encode::write_map_len(&mut buf, 1).unwrap();
        rmp::encode::write_str_len(&mut buf, 5000).unwrap();
        buf.extend_from_slice(b"short");
        assert!(matches!(
            decode_err(&buf),
            DecodeError::LengthExceedsBuffer { .. }
        ));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let mut buf = Vec::new();
        rmp::encode::write_map_len(&mut buf, 1).unwrap();
        rmp::encode::write_str(&mut buf, "bogus").unwrap();
        rmp::encode::write_nil(&mut buf).unwrap();
        assert!(matches!(
            decode_err(&buf),
            DecodeError::UnknownField { container: "record", .. }
        ));
    }

    #[test]
    fn test_missing_field_rejected() {
        let mut buf = Vec::new();
        rmp::encode::write_map_len(&mut buf, 1).unwrap();
        rmp::encode::write_str(&mut buf, METRICS).unwrap();
        rmp::encode::write_array_len(&mut buf, 0).unwrap();
        assert!(matches!(
            decode_err(&buf),
            DecodeError::MissingField { field: STATIC_LABELS, .. }
        ));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let mut buf = Vec::new();
        rmp::encode::write_map_len(&mut buf, 1).unwrap();
        rmp::encode::write_str_len(&mut buf, 2).unwrap();
        buf.extend_from_slice(&[0xff, 0xfe]);
        assert!(matches!(
            decode_err(&buf),
            DecodeError::InvalidUtf8 { offset: 2, .. }
        ));
    }

    #[test]
    fn test_sample_arity_mismatch() {
        let buf = record_with_metric(|wr| {
            metric_header(wr, &["host", "app"]);
            wr.str("k", SAMPLES).unwrap();
            wr.array_len("a", 1).unwrap();
            write_sample(wr, &["only-host"]);
        });
        assert!(matches!(
            decode_err(&buf),
            DecodeError::ArityMismatch { expected: 2, got: 1, .. }
        ));
    }

    #[test]
    fn test_duplicate_series_rejected() {
        let buf = record_with_metric(|wr| {
            metric_header(wr, &["host"]);
            wr.str("k", SAMPLES).unwrap();
            wr.array_len("a", 2).unwrap();
            write_sample(wr, &["a"]);
            write_sample(wr, &["a"]);
        });
        assert!(matches!(
            decode_err(&buf),
            DecodeError::DuplicateSeries { .. }
        ));
    }

    #[test]
    fn test_hand_built_record_decodes() {
        let buf = record_with_metric(|wr| {
            metric_header(wr, &["host"]);
            wr.str("k", SAMPLES).unwrap();
            wr.array_len("a", 2).unwrap();
            write_sample(wr, &[]);
            write_sample(wr, &["web1"]);
        });
        let ctx = decode(&buf, &mut 0).unwrap();
        let metric = &ctx.metrics()[0];
        assert_eq!(metric.samples().len(), 2);
        assert_eq!(metric.get_value(&["web1"]).unwrap(), 1.0);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let mut buf = Vec::new();
        let mut wr = Writer::default();
        wr.map_len("record", 2).unwrap();
        wr.str("k", STATIC_LABELS).unwrap();
        wr.array_len("a", 0).unwrap();
        wr.str("k", METRICS).unwrap();
        wr.array_len("a", 1).unwrap();
        wr.map_len("m", 1).unwrap();
        wr.str("k", KIND).unwrap();
        wr.uint("v", 42).unwrap();
        buf.extend(wr.buf);
        assert_eq!(decode_err(&buf), DecodeError::UnknownKind { code: 42 });
    }

    #[test]
    fn test_float_required_for_value() {
        let buf = record_with_metric(|wr| {
            metric_header(wr, &[]);
            wr.str("k", SAMPLES).unwrap();
            wr.array_len("a", 1).unwrap();
            wr.map_len("s", 1).unwrap();
            wr.str("k", VALUE).unwrap();
            wr.uint("v", 1).unwrap();
        });
        assert!(matches!(
            decode_err(&buf),
            DecodeError::UnexpectedType { field: VALUE, .. }
        ));
    }

    #[test]
    fn test_limits_enforced() {
        let buf = encode(&sample_context()).unwrap();
        let config = DecodeConfig::default().with_max_samples_per_metric(2);
        let err = decode_with(&buf, &mut 0, &config).unwrap_err();
        assert!(matches!(
            err,
            CmetricsError::Decode(DecodeError::LimitExceeded { what: SAMPLES, count: 3, limit: 2 })
        ));
    }

    #[test]
    fn test_max_metrics_enforced() {
        let mut ctx = sample_context();
        ctx.create_gauge("node", "mem", "free", "Free", &[]).unwrap();
        let buf = encode(&ctx).unwrap();

        let config = DecodeConfig::default().with_max_metrics(1);
        let mut cursor = 0;
        let err = decode_with(&buf, &mut cursor, &config).unwrap_err();
        assert!(matches!(
            err,
            CmetricsError::Decode(DecodeError::LimitExceeded { what: METRICS, count: 2, limit: 1 })
        ));
        assert_eq!(cursor, 0);

        let config = DecodeConfig::default().with_max_metrics(2);
        assert_eq!(decode_with(&buf, &mut cursor, &config).unwrap().metrics().len(), 2);
    }

    #[test]
    fn test_max_string_len_enforced() {
        let mut ctx = Context::new();
        ctx.add_static_label("dev", "x".repeat(64));
        let buf = encode(&ctx).unwrap();

        let config = DecodeConfig::default().with_max_string_len(32);
        let err = decode_with(&buf, &mut 0, &config).unwrap_err();
        assert!(matches!(
            err,
            CmetricsError::Decode(DecodeError::LimitExceeded {
                what: "static label value",
                count: 64,
                limit: 32,
            })
        ));

        let config = DecodeConfig::default().with_max_string_len(64);
        assert!(decode_with(&buf, &mut 0, &config).is_ok());
    }

    #[test]
    fn test_declared_sample_count_does_not_size_allocation() {
        let declared = 1usize << 20;
        let buf = record_with_metric(|wr| {
            metric_header(wr, &[]);
            wr.str("k", SAMPLES).unwrap();
            wr.array_len("a", declared).unwrap();
            wr.buf.extend(std::iter::repeat_n(0xc0, declared));
        });

        assert!(matches!(
            decode_err(&buf),
            DecodeError::UnexpectedType { field: "sample", .. }
        ));
        assert_eq!(bounded_capacity(declared, declared, MIN_SAMPLE_LEN), declared / MIN_SAMPLE_LEN);
        assert_eq!(bounded_capacity(3, 1000, MIN_SAMPLE_LEN), 3);
        assert_eq!(bounded_capacity(5, 0, MIN_METRIC_LEN), 0);
    }

    #[test]
    fn test_records_stop_after_error() {
        let mut buf = encode(&sample_context()).unwrap();
        buf.push(0xc1); // never-used marker
        let results: Vec<_> = Records::new(&buf).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }
}
