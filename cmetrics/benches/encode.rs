//! Microbenchmarks for the encoders and the binary decoder.
//!
//! Run with: `cargo bench -p cmetrics -- encode`

#![allow(missing_docs, clippy::cast_precision_loss)]

use cmetrics::{Context, PrometheusConfig, TextConfig};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

/// Builds a context with one counter holding `series` labeled series.
fn setup_context(series: u32) -> Context {
    let mut ctx = Context::new();
    ctx.add_static_label("cluster", "bench");
    let c = ctx
        .create_counter("bench", "http", "requests", "Requests served", &["host", "code"])
        .unwrap();

    let base_time = 1_700_000_000_000_000_000u64;
    for i in 0..series {
        let host = format!("host-{i}");
        ctx.add(c, base_time + u64::from(i), f64::from(i) * 0.5, &[host.as_str(), "200"])
            .unwrap();
    }
    ctx
}

fn bench_msgpack(c: &mut Criterion) {
    let mut group = c.benchmark_group("msgpack");
    for series in [10u32, 1_000] {
        let ctx = setup_context(series);
        let buf = ctx.to_msgpack().unwrap();

        group.bench_with_input(BenchmarkId::new("encode", series), &ctx, |b, ctx| {
            b.iter(|| black_box(ctx.to_msgpack().unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("decode", series), &buf, |b, buf| {
            b.iter(|| black_box(cmetrics::msgpack::decode(buf, &mut 0).unwrap()));
        });
    }
    group.finish();
}

fn bench_text(c: &mut Criterion) {
    let ctx = setup_context(1_000);

    c.bench_function("encode/prometheus", |b| {
        b.iter(|| black_box(ctx.to_prometheus(&PrometheusConfig::default())));
    });
    c.bench_function("encode/text", |b| {
        b.iter(|| black_box(ctx.to_text(&TextConfig::default())));
    });
    c.bench_function("encode/influx", |b| {
        b.iter(|| black_box(ctx.to_influx()));
    });
}

criterion_group!(benches, bench_msgpack, bench_text);
criterion_main!(benches);
