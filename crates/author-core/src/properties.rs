//! Hierarchical key/value storage for plugin-derived metadata.
//!
//! Plugins keep derived state (word counts, type tallies, ...) on blocks and on the project
//! itself. Keys are [`HierarchicalPath`]s so every plugin can own a subtree, for example
//! `Word Counter/Words` or `Word Counter/Types/Chapter`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A `/`-separated path used as a property key.
///
/// Leading, trailing and repeated separators are ignored, so `"/a//b/"` and `"a/b"` are the
/// same path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HierarchicalPath {
    segments: Vec<String>,
}

impl HierarchicalPath {
    /// The empty (root) path.
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from individual segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments
                .into_iter()
                .map(Into::into)
                .filter(|s: &String| !s.is_empty())
                .collect(),
        }
    }

    /// Append a segment, returning the child path.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        let segment = segment.into();
        if !segment.is_empty() {
            segments.push(segment);
        }
        Self { segments }
    }

    /// The path segments in order.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The final segment, if any.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// `true` when `prefix` is this path or one of its ancestors.
    pub fn starts_with(&self, prefix: &HierarchicalPath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// `true` for the root path.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for HierarchicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl FromStr for HierarchicalPath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_segments(s.split('/')))
    }
}

impl From<&str> for HierarchicalPath {
    fn from(s: &str) -> Self {
        Self::from_segments(s.split('/'))
    }
}

impl Serialize for HierarchicalPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HierarchicalPath {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(HierarchicalPath::from(raw.as_str()))
    }
}

/// Ordered property map keyed by [`HierarchicalPath`].
///
/// Values are stored as strings; typed access parses on read.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertiesDictionary {
    values: BTreeMap<HierarchicalPath, String>,
}

impl PropertiesDictionary {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw string value at `path`.
    pub fn get_str(&self, path: &HierarchicalPath) -> Option<&str> {
        self.values.get(path).map(String::as_str)
    }

    /// Parse the value at `path`. Returns `None` if missing or unparsable.
    pub fn get<T: FromStr>(&self, path: &HierarchicalPath) -> Option<T> {
        self.values.get(path).and_then(|v| v.parse().ok())
    }

    /// Integer value at `path`, defaulting to zero.
    pub fn get_i64(&self, path: &HierarchicalPath) -> i64 {
        self.get(path).unwrap_or(0)
    }

    /// Store `value` at `path`, returning the previous value.
    pub fn set(&mut self, path: HierarchicalPath, value: impl ToString) -> Option<String> {
        self.values.insert(path, value.to_string())
    }

    /// Add `delta` to the integer at `path` (missing counts as zero) and return the new value.
    ///
    /// A result of zero removes the entry so that balanced increments leave no residue.
    pub fn increment(&mut self, path: &HierarchicalPath, delta: i64) -> i64 {
        let value = self.get_i64(path) + delta;
        if value == 0 {
            self.values.remove(path);
        } else {
            self.values.insert(path.clone(), value.to_string());
        }
        value
    }

    /// Remove the value at `path`.
    pub fn remove(&mut self, path: &HierarchicalPath) -> Option<String> {
        self.values.remove(path)
    }

    /// Remove every value at or below `prefix`. Returns the number of removed entries.
    pub fn remove_prefix(&mut self, prefix: &HierarchicalPath) -> usize {
        let before = self.values.len();
        self.values.retain(|k, _| !k.starts_with(prefix));
        before - self.values.len()
    }

    /// Iterate over entries at or below `prefix`.
    pub fn iter_prefix<'a>(
        &'a self,
        prefix: &'a HierarchicalPath,
    ) -> impl Iterator<Item = (&'a HierarchicalPath, &'a str)> + 'a {
        self.values
            .range(prefix.clone()..)
            .take_while(move |(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k, v.as_str()))
    }

    /// Iterate over all entries in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&HierarchicalPath, &str)> {
        self.values.iter().map(|(k, v)| (k, v.as_str()))
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `true` when no values are stored.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.values.clear();
    }
}
