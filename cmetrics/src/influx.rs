//! InfluxDB line protocol.
//!
//! The measurement is `namespace_subsystem`, the metric name becomes the
//! field key, and labels become the tag set:
//!
//! ```text
//! cmt_labels,host=calyptia.com,app=cmetrics test=2 1435658235000000123
//! ```
//!
//! Tag values are written unquoted, with commas, spaces and `=` escaped.
//! Timestamps are the stored nanoseconds, unconverted.

use crate::context::Context;
use crate::render;

/// Renders `ctx` as InfluxDB line protocol.
pub fn encode(ctx: &Context) -> String {
    let mut out = String::new();
    for metric in ctx.metrics() {
        let measurement = metric.opts().measurement();
        for sample in metric.samples() {
            render::write_influx_escaped(&mut out, &measurement, false);
            render::write_tag_labels(
                &mut out,
                render::series_labels(ctx.static_labels(), metric, sample),
            );
            out.push(' ');
            render::write_influx_escaped(&mut out, &metric.opts().name, true);
            out.push('=');
            render::write_value(&mut out, sample.value);
            out.push(' ');
            render::write_u64(&mut out, sample.timestamp);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const TS: u64 = 1_435_658_235_000_000_123;

    #[test]
    fn test_lines_with_and_without_static_labels() {
        let mut ctx = Context::new();
        let c = ctx
            .create_counter("cmt", "labels", "test", "Static labels test", &["host", "app"])
            .unwrap();
        ctx.increment(c, TS, &[]).unwrap();
        ctx.increment(c, TS, &["calyptia.com", "cmetrics"]).unwrap();
        ctx.increment(c, TS, &["calyptia.com", "cmetrics"]).unwrap();

        let expected = "cmt_labels test=1 1435658235000000123\n\
                        cmt_labels,host=calyptia.com,app=cmetrics test=2 1435658235000000123\n";
        assert_eq!(encode(&ctx), expected);

        ctx.add_static_label("dev", "Calyptia");
        ctx.add_static_label("lang", "C");
        let expected = "cmt_labels,dev=Calyptia,lang=C test=1 1435658235000000123\n\
                        cmt_labels,dev=Calyptia,lang=C,host=calyptia.com,app=cmetrics test=2 1435658235000000123\n";
        assert_eq!(encode(&ctx), expected);
    }

    #[test]
    fn test_fractional_value() {
        let mut ctx = Context::new();
        let c = ctx.create_counter("k", "net", "load", "h", &[]).unwrap();
        ctx.set(c, 7, 12.15, &[]).unwrap();
        assert_eq!(encode(&ctx), "k_net load=12.15 7\n");
    }

    #[test]
    fn test_escaped_measurement_and_tags() {
        let mut ctx = Context::new();
        let c = ctx.create_counter("my ns", "sub", "hits", "h", &["path"]).unwrap();
        ctx.increment(c, 1, &["/a,b"]).unwrap();
        assert_eq!(encode(&ctx), "my\\ ns_sub,path=/a\\,b hits=1 1\n");
    }
}
