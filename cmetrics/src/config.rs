//! Encoder and decoder configuration.
//!
//! All settings derive `Serialize`/`Deserialize` with field defaults, so an
//! embedding application can load them from its own config file and omit
//! anything it does not care about.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Default cap on metrics per decoded record.
pub const DEFAULT_MAX_METRICS: usize = 1 << 16;

/// Default cap on samples per decoded metric.
pub const DEFAULT_MAX_SAMPLES_PER_METRIC: usize = 1 << 20;

/// Default cap on the byte length of any decoded string.
pub const DEFAULT_MAX_STRING_LEN: usize = 1 << 20;

/// Options for the Prometheus text renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrometheusConfig {
    /// Append the sample timestamp (milliseconds) to each line.
    pub timestamps: bool,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self { timestamps: true }
    }
}

impl PrometheusConfig {
    /// Sets whether timestamps are rendered.
    #[must_use]
    pub fn with_timestamps(mut self, timestamps: bool) -> Self {
        self.timestamps = timestamps;
        self
    }
}

/// Options for the generic text renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    /// Prefix each line with its RFC3339 timestamp.
    pub timestamps: bool,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self { timestamps: true }
    }
}

impl TextConfig {
    /// Sets whether timestamps are rendered.
    #[must_use]
    pub fn with_timestamps(mut self, timestamps: bool) -> Self {
        self.timestamps = timestamps;
        self
    }
}

/// Limits applied while decoding untrusted binary input.
///
/// These are checked in addition to the buffer-length checks the decoder
/// always performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Maximum metrics in one record.
    pub max_metrics: usize,
    /// Maximum samples in one metric.
    pub max_samples_per_metric: usize,
    /// Maximum byte length of any string.
    pub max_string_len: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            max_metrics: DEFAULT_MAX_METRICS,
            max_samples_per_metric: DEFAULT_MAX_SAMPLES_PER_METRIC,
            max_string_len: DEFAULT_MAX_STRING_LEN,
        }
    }
}

impl DecodeConfig {
    /// Sets the metric cap.
    #[must_use]
    pub fn with_max_metrics(mut self, max_metrics: usize) -> Self {
        self.max_metrics = max_metrics;
        self
    }

    /// Sets the per-metric sample cap.
    #[must_use]
    pub fn with_max_samples_per_metric(mut self, max_samples: usize) -> Self {
        self.max_samples_per_metric = max_samples;
        self
    }

    /// Sets the string length cap.
    #[must_use]
    pub fn with_max_string_len(mut self, max_string_len: usize) -> Self {
        self.max_string_len = max_string_len;
        self
    }

    /// Validates the limits.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroLimit`] if any cap is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_metrics == 0 {
            return Err(ConfigError::ZeroLimit { field: "max_metrics" }.into());
        }
        if self.max_samples_per_metric == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "max_samples_per_metric",
            }
            .into());
        }
        if self.max_string_len == 0 {
            return Err(ConfigError::ZeroLimit {
                field: "max_string_len",
            }
            .into());
        }
        Ok(())
    }
}
