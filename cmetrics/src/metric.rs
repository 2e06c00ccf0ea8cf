//! Metric descriptors and their per-series sample tables.
//!
//! A [`Metric`] carries its identity ([`MetricOpts`]), its [`MetricKind`], the
//! ordered dimension keys declared at creation time, and a [`SampleMap`]
//! holding one [`Sample`] per distinct label-value tuple.
//!
//! # Label-value tuples
//!
//! Every sample operation takes a slice of label values. Position `i` binds
//! to dimension key `i`. The slice must be empty (the unlabeled instance) or
//! exactly as long as the dimension list; anything else fails with
//! [`MetricError::InvalidArity`] before any sample is touched.
//!
//! # Ordering
//!
//! Samples are stored in an insertion-ordered arena with a hash index on the
//! side. Lookups go through the index; iteration and rendering walk the
//! arena, so output order is always creation order.

use std::collections::HashMap;
use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};

use serde::Serialize;

use crate::error::{MetricError, Result};

/// The type of a metric.
///
/// Wire codes are part of the binary format and must not be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Monotonically increasing value.
    Counter,
    /// Value that can go up and down.
    Gauge,
    /// Value with no declared semantics.
    Untyped,
}

impl MetricKind {
    /// Returns the code used for this kind in the binary format.
    pub fn code(self) -> u64 {
        match self {
            Self::Counter => 0,
            Self::Gauge => 1,
            Self::Untyped => 2,
        }
    }

    /// Maps a binary-format code back to a kind.
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::Counter),
            1 => Some(Self::Gauge),
            2 => Some(Self::Untyped),
            _ => None,
        }
    }

    /// The name used in Prometheus `# TYPE` lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Untyped => "untyped",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricOpts {
    /// Namespace, e.g. `kubernetes`.
    pub namespace: String,
    /// Subsystem, e.g. `network`.
    pub subsystem: String,
    /// Metric name, e.g. `load`.
    pub name: String,
    /// Help text.
    pub help: String,
    #[serde(skip)]
    fqname: String,
}

impl MetricOpts {
    /// Builds the identity and its fully-qualified name.
    ///
    /// The fully-qualified name joins namespace, subsystem and name with `_`,
    /// skipping empty parts.
    pub fn new(
        namespace: impl Into<String>,
        subsystem: impl Into<String>,
        name: impl Into<String>,
        help: impl Into<String>,
    ) -> Self {
        let namespace = namespace.into();
        let subsystem = subsystem.into();
        let name = name.into();
        let fqname = join_nonempty(&[&namespace, &subsystem, &name]);
        Self {
            namespace,
            subsystem,
            name,
            help: help.into(),
            fqname,
        }
    }

    /// `namespace_subsystem_name`.
    pub fn fqname(&self) -> &str {
        &self.fqname
    }

    /// `namespace_subsystem`, used as the Influx measurement.
    pub fn measurement(&self) -> String {
        join_nonempty(&[&self.namespace, &self.subsystem])
    }
}

fn join_nonempty(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

/// One series: a label-value tuple with its current value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    /// Values bound positionally to the metric's dimension keys.
    pub label_values: Vec<String>,
    /// Current value.
    pub value: f64,
    /// Last update time in nanoseconds since the Unix epoch.
    pub timestamp: u64,
}

/// Insertion-ordered sample table with hashed tuple lookup.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct SampleMap {
    samples: Vec<Sample>,
    /// Tuple hash to positions in `samples`.
    #[serde(skip)]
    index: HashMap<u64, Vec<usize>>,
}

impl SampleMap {
    /// Number of series.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` when no series exist.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Iterates samples in creation order.
    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    /// Looks up the sample for a tuple.
    pub fn get<S: AsRef<str>>(&self, values: &[S]) -> Option<&Sample> {
        self.position(values).map(|pos| &self.samples[pos])
    }

    fn position<S: AsRef<str>>(&self, values: &[S]) -> Option<usize> {
        self.index
            .get(&tuple_hash(values))?
            .iter()
            .copied()
            .find(|&pos| tuple_eq(&self.samples[pos].label_values, values))
    }

    /// Returns the sample for `values`, creating it with value 0 if absent.
    fn get_or_insert(&mut self, values: &[&str]) -> &mut Sample {
        let pos = match self.position(values) {
            Some(pos) => pos,
            None => self.push(Sample {
                label_values: values.iter().map(|v| (*v).to_string()).collect(),
                value: 0.0,
                timestamp: 0,
            }),
        };
        &mut self.samples[pos]
    }

    /// Inserts a fully-formed sample. Hands it back if the tuple exists.
    pub(crate) fn insert(&mut self, sample: Sample) -> std::result::Result<(), Sample> {
        if self.position(&sample.label_values).is_some() {
            return Err(sample);
        }
        self.push(sample);
        Ok(())
    }

    fn push(&mut self, sample: Sample) -> usize {
        let pos = self.samples.len();
        self.index
            .entry(tuple_hash(&sample.label_values))
            .or_default()
            .push(pos);
        self.samples.push(sample);
        pos
    }
}

impl<'a> IntoIterator for &'a SampleMap {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn tuple_hash<S: AsRef<str>>(values: &[S]) -> u64 {
    let mut hasher = DefaultHasher::new();
    values.len().hash(&mut hasher);
    for value in values {
        value.as_ref().hash(&mut hasher);
    }
    hasher.finish()
}

fn tuple_eq<S: AsRef<str>>(stored: &[String], values: &[S]) -> bool {
    stored.len() == values.len()
        && stored
            .iter()
            .zip(values)
            .all(|(a, b)| a.as_str() == b.as_ref())
}

/// A metric descriptor and its samples.
#[derive(Debug, Clone, Serialize)]
pub struct Metric {
    #[serde(flatten)]
    opts: MetricOpts,
    kind: MetricKind,
    dimension_keys: Vec<String>,
    samples: SampleMap,
}

impl Metric {
    /// Creates a metric with no samples.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::InvalidName`] if the name or a dimension key is
    /// empty.
    pub fn new(opts: MetricOpts, kind: MetricKind, dimension_keys: Vec<String>) -> Result<Self> {
        if opts.name.is_empty() {
            return Err(MetricError::InvalidName {
                reason: "name cannot be empty".to_string(),
            }
            .into());
        }
        if dimension_keys.iter().any(String::is_empty) {
            return Err(MetricError::InvalidName {
                reason: format!("empty dimension key in {dimension_keys:?}"),
            }
            .into());
        }

        Ok(Self {
            opts,
            kind,
            dimension_keys,
            samples: SampleMap::default(),
        })
    }

    /// The metric identity.
    pub fn opts(&self) -> &MetricOpts {
        &self.opts
    }

    /// The metric kind.
    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Declared dimension keys, in order.
    pub fn dimension_keys(&self) -> &[String] {
        &self.dimension_keys
    }

    /// The sample table.
    pub fn samples(&self) -> &SampleMap {
        &self.samples
    }

    pub(crate) fn samples_mut(&mut self) -> &mut SampleMap {
        &mut self.samples
    }

    /// Checks that a tuple has length 0 or the dimension count.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::InvalidArity`] otherwise.
    pub fn check_arity(&self, count: usize) -> Result<()> {
        if count == 0 || count == self.dimension_keys.len() {
            Ok(())
        } else {
            Err(MetricError::InvalidArity {
                expected: self.dimension_keys.len(),
                got: count,
            }
            .into())
        }
    }

    /// Adds 1 to the series for `values` and stamps it with `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::InvalidArity`] for a bad tuple length.
    pub fn increment(&mut self, timestamp: u64, values: &[&str]) -> Result<()> {
        self.add(timestamp, 1.0, values)
    }

    /// Adds `delta` to the series for `values`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::InvalidArity`] for a bad tuple length.
    pub fn add(&mut self, timestamp: u64, delta: f64, values: &[&str]) -> Result<()> {
        self.check_arity(values.len())?;

        let sample = self.samples.get_or_insert(values);
        sample.value += delta;
        sample.timestamp = timestamp;
        Ok(())
    }

    /// Replaces the value of the series for `values`.
    ///
    /// The series is created first, so a rejected counter `set` still leaves
    /// it registered at its current value.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::InvalidArity`] for a bad tuple length, or
    /// [`MetricError::Decreasing`] when a counter would go down.
    pub fn set(&mut self, timestamp: u64, value: f64, values: &[&str]) -> Result<()> {
        self.check_arity(values.len())?;

        let kind = self.kind;
        let sample = self.samples.get_or_insert(values);
        if kind == MetricKind::Counter && value < sample.value {
            return Err(MetricError::Decreasing {
                current: sample.value,
                requested: value,
            }
            .into());
        }
        sample.value = value;
        sample.timestamp = timestamp;
        Ok(())
    }

    /// Subtracts 1 from the series for `values`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::UnsupportedOperation`] on counters and
    /// [`MetricError::InvalidArity`] for a bad tuple length.
    pub fn decrement(&mut self, timestamp: u64, values: &[&str]) -> Result<()> {
        self.sub_inner("decrement", timestamp, 1.0, values)
    }

    /// Subtracts `delta` from the series for `values`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::UnsupportedOperation`] on counters and
    /// [`MetricError::InvalidArity`] for a bad tuple length.
    pub fn sub(&mut self, timestamp: u64, delta: f64, values: &[&str]) -> Result<()> {
        self.sub_inner("sub", timestamp, delta, values)
    }

    fn sub_inner(
        &mut self,
        operation: &'static str,
        timestamp: u64,
        delta: f64,
        values: &[&str],
    ) -> Result<()> {
        if self.kind == MetricKind::Counter {
            return Err(MetricError::UnsupportedOperation {
                kind: self.kind,
                operation,
            }
            .into());
        }
        self.check_arity(values.len())?;

        let sample = self.samples.get_or_insert(values);
        sample.value -= delta;
        sample.timestamp = timestamp;
        Ok(())
    }

    /// Returns the value of the series for `values` without creating it.
    ///
    /// # Errors
    ///
    /// Returns [`MetricError::InvalidArity`] for a bad tuple length, or
    /// [`MetricError::NotFound`] if the series does not exist.
    pub fn get_value(&self, values: &[&str]) -> Result<f64> {
        self.check_arity(values.len())?;
        self.samples
            .get(values)
            .map(|sample| sample.value)
            .ok_or_else(|| {
                MetricError::NotFound {
                    values: values.iter().map(|v| (*v).to_string()).collect(),
                }
                .into()
            })
    }
}
