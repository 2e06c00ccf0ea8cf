//! Ordered key/value label sets.
//!
//! A [`Labels`] set keeps pairs in the order they were appended. Order is
//! significant: renderers emit labels exactly as stored, and the set is never
//! sorted or deduplicated behind the caller's back.

use serde::Serialize;

/// A single `key=value` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Label {
    /// Label name.
    pub key: String,
    /// Label value.
    pub value: String,
}

/// Append-only, insertion-ordered list of labels.
///
/// Used for the context-wide static labels that are prepended to every
/// rendered series.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Labels {
    entries: Vec<Label>,
}

impl Labels {
    /// Creates an empty label set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a label. Existing entries are left untouched, even when one
    /// already uses `key`.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push(Label {
            key: key.into(),
            value: value.into(),
        });
    }

    /// Number of labels in the set.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the set holds no labels.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates labels in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Label> {
        self.entries.iter()
    }

    /// Iterates `(key, value)` string pairs in insertion order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|label| (label.key.as_str(), label.value.as_str()))
    }
}

impl<'a> IntoIterator for &'a Labels {
    type Item = &'a Label;
    type IntoIter = std::slice::Iter<'a, Label>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Labels {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut labels = Self::new();
        for (key, value) in iter {
            labels.push(key, value);
        }
        labels
    }
}
