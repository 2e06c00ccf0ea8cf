//! The metrics context: root container for metrics and static labels.
//!
//! A [`Context`] owns every [`Metric`] created in it plus a single static
//! [`Labels`] set. It is the unit handed to encoders and returned by the
//! binary decoder. Dropping a context releases everything it owns.
//!
//! Metrics are addressed through [`MetricHandle`], a `Copy` index returned
//! at creation time, the same way a storage handle is kept by a writer and
//! passed back on every update.
//!
//! # Example
//!
//! ```rust
//! use cmetrics::Context;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut ctx = Context::new();
//! let load = ctx.create_counter("kubernetes", "network", "load", "Network load", &["hostname", "app"])?;
//!
//! ctx.increment(load, 0, &[])?;
//! ctx.add(load, 0, 10.55, &["localhost", "test"])?;
//! ctx.add_static_label("dev", "Calyptia");
//!
//! assert_eq!(ctx.get_value(load, &["localhost", "test"])?, 10.55);
//! # Ok(())
//! # }
//! ```

use serde::Serialize;

use crate::config::{DecodeConfig, PrometheusConfig, TextConfig};
use crate::error::{MetricError, Result};
use crate::labels::Labels;
use crate::metric::{Metric, MetricKind, MetricOpts};
use crate::{influx, msgpack, prometheus, text};

/// Opaque handle to a metric inside a [`Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MetricHandle(usize);

impl MetricHandle {
    /// Position of the metric in its context.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Root aggregate owning metrics and static labels.
///
/// # Thread Safety
///
/// A context has no internal synchronization. Mutation needs `&mut self`;
/// share it across threads behind a lock held for the whole
/// mutate-then-encode sequence.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Context {
    static_labels: Labels,
    metrics: Vec<Metric>,
}

impl Context {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a counter and returns its handle.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::InvalidName`] if `name` or a dimension key is
    /// empty.
    pub fn create_counter(
        &mut self,
        namespace: &str,
        subsystem: &str,
        name: &str,
        help: &str,
        dimension_keys: &[&str],
    ) -> Result<MetricHandle> {
        self.create(MetricKind::Counter, namespace, subsystem, name, help, dimension_keys)
    }

    /// Creates a gauge and returns its handle.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::InvalidName`] if `name` or a dimension key is
    /// empty.
    pub fn create_gauge(
        &mut self,
        namespace: &str,
        subsystem: &str,
        name: &str,
        help: &str,
        dimension_keys: &[&str],
    ) -> Result<MetricHandle> {
        self.create(MetricKind::Gauge, namespace, subsystem, name, help, dimension_keys)
    }

    /// Creates an untyped metric and returns its handle.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::InvalidName`] if `name` or a dimension key is
    /// empty.
    pub fn create_untyped(
        &mut self,
        namespace: &str,
        subsystem: &str,
        name: &str,
        help: &str,
        dimension_keys: &[&str],
    ) -> Result<MetricHandle> {
        self.create(MetricKind::Untyped, namespace, subsystem, name, help, dimension_keys)
    }

    fn create(
        &mut self,
        kind: MetricKind,
        namespace: &str,
        subsystem: &str,
        name: &str,
        help: &str,
        dimension_keys: &[&str],
    ) -> Result<MetricHandle> {
        let opts = MetricOpts::new(namespace, subsystem, name, help);
        let keys = dimension_keys.iter().map(|k| (*k).to_string()).collect();
        let metric = Metric::new(opts, kind, keys)?;
        tracing::trace!(
            fqname = metric.opts().fqname(),
            %kind,
            dimensions = dimension_keys.len(),
            "metric created"
        );
        Ok(self.push_metric(metric))
    }

    pub(crate) fn push_metric(&mut self, metric: Metric) -> MetricHandle {
        self.metrics.push(metric);
        MetricHandle(self.metrics.len() - 1)
    }

    /// Appends a static label rendered ahead of every series.
    ///
    /// No deduplication happens: adding a key twice renders it twice.
    pub fn add_static_label(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        tracing::trace!(key = %key, "static label added");
        self.static_labels.push(key, value);
    }

    /// Static labels in insertion order.
    pub fn static_labels(&self) -> &Labels {
        &self.static_labels
    }

    pub(crate) fn static_labels_mut(&mut self) -> &mut Labels {
        &mut self.static_labels
    }

    /// All metrics in creation order.
    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    /// Returns the metric behind `handle`.
    pub fn metric(&self, handle: MetricHandle) -> Option<&Metric> {
        self.metrics.get(handle.0)
    }

    /// Returns the metric behind `handle` for mutation.
    pub fn metric_mut(&mut self, handle: MetricHandle) -> Option<&mut Metric> {
        self.metrics.get_mut(handle.0)
    }

    fn resolve(&self, handle: MetricHandle) -> Result<&Metric> {
        self.metric(handle)
            .ok_or_else(|| MetricError::InvalidHandle { handle: handle.0 }.into())
    }

    fn resolve_mut(&mut self, handle: MetricHandle) -> Result<&mut Metric> {
        self.metric_mut(handle)
            .ok_or_else(|| MetricError::InvalidHandle { handle: handle.0 }.into())
    }

    /// Adds 1 to a series. See [`Metric::increment`].
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::InvalidHandle`] for a foreign handle, otherwise
    /// whatever the metric operation returns.
    pub fn increment(&mut self, handle: MetricHandle, timestamp: u64, values: &[&str]) -> Result<()> {
        self.resolve_mut(handle)?.increment(timestamp, values)
    }

    /// Adds `delta` to a series. See [`Metric::add`].
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::InvalidHandle`] for a foreign handle, otherwise
    /// whatever the metric operation returns.
    pub fn add(&mut self, handle: MetricHandle, timestamp: u64, delta: f64, values: &[&str]) -> Result<()> {
        self.resolve_mut(handle)?.add(timestamp, delta, values)
    }

    /// Replaces the value of a series. See [`Metric::set`].
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::InvalidHandle`] for a foreign handle, otherwise
    /// whatever the metric operation returns.
    pub fn set(&mut self, handle: MetricHandle, timestamp: u64, value: f64, values: &[&str]) -> Result<()> {
        self.resolve_mut(handle)?.set(timestamp, value, values)
    }

    /// Subtracts 1 from a gauge series. See [`Metric::decrement`].
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::InvalidHandle`] for a foreign handle, otherwise
    /// whatever the metric operation returns.
    pub fn decrement(&mut self, handle: MetricHandle, timestamp: u64, values: &[&str]) -> Result<()> {
        self.resolve_mut(handle)?.decrement(timestamp, values)
    }

    /// Subtracts `delta` from a gauge series. See [`Metric::sub`].
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::InvalidHandle`] for a foreign handle, otherwise
    /// whatever the metric operation returns.
    pub fn sub(&mut self, handle: MetricHandle, timestamp: u64, delta: f64, values: &[&str]) -> Result<()> {
        self.resolve_mut(handle)?.sub(timestamp, delta, values)
    }

    /// Reads the value of a series. See [`Metric::get_value`].
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::InvalidHandle`] for a foreign handle,
    /// [`MetricError::InvalidArity`] or [`MetricError::NotFound`].
    pub fn get_value(&self, handle: MetricHandle, values: &[&str]) -> Result<f64> {
        self.resolve(handle)?.get_value(values)
    }

    /// Encodes the context as one binary record.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::EncodeError`] if the record cannot be written.
    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        msgpack::encode(self)
    }

    /// Decodes the record at `*cursor` and advances the cursor past it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::DecodeError`] if the record is malformed.
    pub fn from_msgpack(buf: &[u8], cursor: &mut usize) -> Result<Self> {
        msgpack::decode_with(buf, cursor, &DecodeConfig::default())
    }

    /// Renders Prometheus text exposition format.
    pub fn to_prometheus(&self, config: &PrometheusConfig) -> String {
        prometheus::encode(self, config)
    }

    /// Renders the generic text format.
    pub fn to_text(&self, config: &TextConfig) -> String {
        text::encode(self, config)
    }

    /// Renders InfluxDB line protocol.
    pub fn to_influx(&self) -> String {
        influx::encode(self)
    }
}
