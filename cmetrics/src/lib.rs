//! # cmetrics
//!
//! Metrics data model with binary and text codecs.
//!
//! cmetrics accumulates counter, gauge and untyped measurements keyed by a
//! fixed set of dimension labels, and emits them as a compact MessagePack
//! record for transport between processes, or as Prometheus exposition
//! text, a generic debug text form, or InfluxDB line protocol.
//!
//! **Status**: This crate is in early development. The API is not yet stable.
//!
//! ## Key Properties
//!
//! - Canonical binary encoding: encode, decode, encode again is byte-identical
//! - Decoding of untrusted buffers with every length checked before use
//! - Concatenated records read back one at a time through a cursor
//! - Deterministic text output in insertion order, static labels first
//!
//! ## Quick Start
//!
//! ```rust
//! use cmetrics::{Context, PrometheusConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! cmetrics::initialize();
//!
//! let mut ctx = Context::new();
//! let requests = ctx.create_counter("cmt", "labels", "test", "Static labels test", &["host", "app"])?;
//!
//! ctx.increment(requests, 0, &[])?;
//! ctx.increment(requests, 0, &["calyptia.com", "cmetrics"])?;
//!
//! // Ship it as a binary record...
//! let buf = ctx.to_msgpack()?;
//! let mut cursor = 0;
//! let decoded = cmetrics::msgpack::decode(&buf, &mut cursor)?;
//!
//! // ...and render it on the other side.
//! let text = decoded.to_prometheus(&PrometheusConfig::default());
//! assert!(text.contains("cmt_labels_test{host=\"calyptia.com\",app=\"cmetrics\"} 1 0\n"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`Context`]: Root container; owns metrics and static labels
//! - [`MetricHandle`]: `Copy` handle used for every sample update
//! - [`Metric`]: Identity, kind, dimension keys and sample table
//!
//! ## Modules
//!
//! - [`context`]: Context lifecycle and handle-based operations
//! - [`metric`]: Metric descriptors and sample tables
//! - [`labels`]: Ordered label sets
//! - [`msgpack`]: Binary encoder and decoder
//! - [`prometheus`]: Prometheus exposition renderer
//! - [`text`]: Generic text renderer
//! - [`influx`]: InfluxDB line protocol renderer
//! - [`config`]: Renderer and decoder options
//! - [`error`]: Error types

pub mod config;
pub mod context;
pub mod error;
pub mod influx;
pub mod labels;
pub mod metric;
pub mod msgpack;
pub mod prometheus;
mod render;
pub mod text;

use std::sync::Once;
use std::time::{SystemTime, UNIX_EPOCH};

// Re-export primary API types at crate root for convenience.
pub use config::{DecodeConfig, PrometheusConfig, TextConfig};
pub use context::{Context, MetricHandle};
pub use error::{CmetricsError, Result};
pub use labels::{Label, Labels};
pub use metric::{Metric, MetricKind, MetricOpts, Sample};

static INIT: Once = Once::new();

/// One-time process setup. Safe to call any number of times.
///
/// Nothing in the crate depends on it having run: all mutable state lives
/// in a [`Context`]. It exists so embedders have a single start-up hook.
pub fn initialize() {
    INIT.call_once(|| {
        tracing::debug!(version = env!("CARGO_PKG_VERSION"), "cmetrics initialized");
    });
}

/// Current wall-clock time in nanoseconds since the Unix epoch.
///
/// Returns 0 if the clock reads earlier than the epoch.
pub fn time_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
}
