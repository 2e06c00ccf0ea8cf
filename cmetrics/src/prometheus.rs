//! Prometheus text exposition format.
//!
//! Each metric renders a `# HELP` and a `# TYPE` line followed by one line
//! per series:
//!
//! ```text
//! # HELP cmt_labels_test Static labels test
//! # TYPE cmt_labels_test counter
//! cmt_labels_test 1 0
//! cmt_labels_test{host="calyptia.com",app="cmetrics"} 2 0
//! ```
//!
//! Timestamps are optional (see [`PrometheusConfig`]) and are rendered in
//! milliseconds, truncated from the stored nanoseconds.

use crate::config::PrometheusConfig;
use crate::context::Context;
use crate::metric::Metric;
use crate::render;

const NANOS_PER_MILLI: u64 = 1_000_000;

/// Renders `ctx` in Prometheus exposition format.
pub fn encode(ctx: &Context, config: &PrometheusConfig) -> String {
    let mut out = String::new();
    for metric in ctx.metrics() {
        write_metric(&mut out, ctx, metric, config);
    }
    out
}

fn write_metric(out: &mut String, ctx: &Context, metric: &Metric, config: &PrometheusConfig) {
    let fqname = metric.opts().fqname();

    out.push_str("# HELP ");
    out.push_str(fqname);
    out.push(' ');
    write_help(out, &metric.opts().help);
    out.push('\n');

    out.push_str("# TYPE ");
    out.push_str(fqname);
    out.push(' ');
    out.push_str(metric.kind().as_str());
    out.push('\n');

    for sample in metric.samples() {
        out.push_str(fqname);
        render::write_braced_labels(out, render::series_labels(ctx.static_labels(), metric, sample));
        out.push(' ');
        render::write_value(out, sample.value);
        if config.timestamps {
            out.push(' ');
            render::write_u64(out, sample.timestamp / NANOS_PER_MILLI);
        }
        out.push('\n');
    }
}

fn write_help(out: &mut String, help: &str) {
    for c in help.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
}
