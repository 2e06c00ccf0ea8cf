//! Generic human-readable text format.
//!
//! One line per series, prefixed by its RFC3339 UTC timestamp with
//! nanosecond precision:
//!
//! ```text
//! 1970-01-01T00:00:00.000000000Z kubernetes_network_load{hostname="localhost",app="test"} = 12.15
//! ```

use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::config::TextConfig;
use crate::context::Context;
use crate::render;

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Renders `ctx` in the generic text format.
pub fn encode(ctx: &Context, config: &TextConfig) -> String {
    let mut out = String::new();
    for metric in ctx.metrics() {
        let fqname = metric.opts().fqname();
        for sample in metric.samples() {
            if config.timestamps {
                write_rfc3339(&mut out, sample.timestamp);
                out.push(' ');
            }
            out.push_str(fqname);
            render::write_braced_labels(
                &mut out,
                render::series_labels(ctx.static_labels(), metric, sample),
            );
            out.push_str(" = ");
            render::write_value(&mut out, sample.value);
            out.push('\n');
        }
    }
    out
}

/// Writes `YYYY-MM-DDTHH:MM:SS.nnnnnnnnnZ`.
fn write_rfc3339(out: &mut String, timestamp: u64) {
    let secs = i64::try_from(timestamp / NANOS_PER_SEC).unwrap_or(i64::MAX);
    let nanos = u32::try_from(timestamp % NANOS_PER_SEC).unwrap_or(0);
    match DateTime::<Utc>::from_timestamp(secs, nanos) {
        Some(datetime) => {
            let _ = write!(out, "{}", datetime.format("%Y-%m-%dT%H:%M:%S%.9fZ"));
        }
        // u64 nanoseconds end in 2554, well inside chrono's range.
        None => render::write_u64(out, timestamp),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rfc3339(ts: u64) -> String {
        let mut out = String::new();
        write_rfc3339(&mut out, ts);
        out
    }

    #[test]
    fn test_rfc3339_formatting() {
        assert_eq!(rfc3339(0), "1970-01-01T00:00:00.000000000Z");
        assert_eq!(rfc3339(1_435_658_235_000_000_123), "2015-06-30T09:57:15.000000123Z");
        assert_eq!(rfc3339(u64::MAX), "2554-07-21T23:34:33.709551615Z");
    }

    #[test]
    fn test_lines_with_and_without_static_labels() {
        let mut ctx = Context::new();
        let c = ctx
            .create_counter("cmt", "labels", "test", "Static labels test", &["host", "app"])
            .unwrap();
        ctx.increment(c, 0, &[]).unwrap();
        ctx.increment(c, 0, &["calyptia.com", "cmetrics"]).unwrap();
        ctx.increment(c, 0, &["calyptia.com", "cmetrics"]).unwrap();

        let expected = "1970-01-01T00:00:00.000000000Z cmt_labels_test = 1\n\
                        1970-01-01T00:00:00.000000000Z cmt_labels_test{host=\"calyptia.com\",app=\"cmetrics\"} = 2\n";
        assert_eq!(encode(&ctx, &TextConfig::default()), expected);

        ctx.add_static_label("dev", "Calyptia");
        ctx.add_static_label("lang", "C");
        let expected = "1970-01-01T00:00:00.000000000Z cmt_labels_test{dev=\"Calyptia\",lang=\"C\"} = 1\n\
                        1970-01-01T00:00:00.000000000Z cmt_labels_test{dev=\"Calyptia\",lang=\"C\",host=\"calyptia.com\",app=\"cmetrics\"} = 2\n";
        assert_eq!(encode(&ctx, &TextConfig::default()), expected);
    }

    #[test]
    fn test_without_timestamps() {
        let mut ctx = Context::new();
        let g = ctx.create_gauge("a", "b", "c", "h", &[]).unwrap();
        ctx.set(g, 5, 0.25, &[]).unwrap();

        let out = encode(&ctx, &TextConfig::default().with_timestamps(false));
        assert_eq!(out, "a_b_c = 0.25\n");
    }
}
