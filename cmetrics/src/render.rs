//! Formatting rules shared by the text encoders.
//!
//! Label order and numeric formatting live here so the Prometheus, text and
//! Influx renderers cannot drift apart: static labels always come first in
//! insertion order, followed by the sample's dimension labels in declaration
//! order.

use std::fmt::Write;

use crate::labels::Labels;
use crate::metric::{Metric, Sample};

/// All labels of one series: static labels, then `dimension_key=value`
/// pairs. The unlabeled instance contributes no dimension pairs.
pub(crate) fn series_labels<'a>(
    static_labels: &'a Labels,
    metric: &'a Metric,
    sample: &'a Sample,
) -> impl Iterator<Item = (&'a str, &'a str)> {
    static_labels.pairs().chain(
        metric
            .dimension_keys()
            .iter()
            .zip(&sample.label_values)
            .map(|(key, value)| (key.as_str(), value.as_str())),
    )
}

/// Writes `{k="v",...}`, or nothing for an empty label set.
pub(crate) fn write_braced_labels<'a>(
    out: &mut String,
    mut labels: impl Iterator<Item = (&'a str, &'a str)>,
) {
    let Some((key, value)) = labels.next() else {
        return;
    };

    out.push('{');
    write_quoted_pair(out, key, value);
    for (key, value) in labels {
        out.push(',');
        write_quoted_pair(out, key, value);
    }
    out.push('}');
}

fn write_quoted_pair(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push_str("=\"");
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Writes `,k=v,...` with Influx tag escaping, or nothing for no labels.
pub(crate) fn write_tag_labels<'a>(
    out: &mut String,
    labels: impl Iterator<Item = (&'a str, &'a str)>,
) {
    for (key, value) in labels {
        out.push(',');
        write_influx_escaped(out, key, true);
        out.push('=');
        write_influx_escaped(out, value, true);
    }
}

/// Backslash-escapes commas and spaces, and `=` when `escape_equals`.
pub(crate) fn write_influx_escaped(out: &mut String, text: &str, escape_equals: bool) {
    for c in text.chars() {
        if c == ',' || c == ' ' || (escape_equals && c == '=') {
            out.push('\\');
        }
        out.push(c);
    }
}

/// Writes a sample value.
///
/// Integral values print without a fractional part; anything else prints
/// the shortest decimal that parses back to the same `f64`. Non-finite
/// values use the Prometheus spellings.
pub(crate) fn write_value(out: &mut String, value: f64) {
    if value.is_nan() {
        out.push_str("NaN");
    } else if value.is_infinite() {
        out.push_str(if value > 0.0 { "+Inf" } else { "-Inf" });
    } else {
        // Writing into a String cannot fail.
        let _ = write!(out, "{value}");
    }
}

/// Writes an unsigned integer.
pub(crate) fn write_u64(out: &mut String, value: u64) {
    let _ = write!(out, "{value}");
}
