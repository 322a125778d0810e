//! Plugin-owned annotations over character ranges of a block.

use serde::{Deserialize, Serialize};

/// A half-open character range `[start, stop)` annotated by a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSpan {
    /// Inclusive start character index.
    pub start: usize,
    /// Exclusive stop character index.
    pub stop: usize,
    /// Key of the plugin that owns this span.
    pub owner: String,
    /// Optional plugin payload (for example spelling suggestions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl TextSpan {
    /// Create a span without payload.
    pub fn new(start: usize, stop: usize, owner: impl Into<String>) -> Self {
        Self {
            start,
            stop,
            owner: owner.into(),
            data: None,
        }
    }

    /// Attach a payload.
    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Character length of the span.
    pub fn len(&self) -> usize {
        self.stop.saturating_sub(self.start)
    }

    /// `true` for zero-length spans.
    pub fn is_empty(&self) -> bool {
        self.stop <= self.start
    }

    /// `true` if `index` lies inside the span.
    pub fn contains(&self, index: usize) -> bool {
        self.start <= index && index < self.stop
    }
}

/// The annotations attached to one block, kept ordered by start index.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TextSpanCollection {
    spans: Vec<TextSpan>,
}

impl TextSpanCollection {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a span, keeping start order.
    pub fn add(&mut self, span: TextSpan) {
        let at = self.spans.partition_point(|s| s.start <= span.start);
        self.spans.insert(at, span);
    }

    /// Remove every span owned by `owner`. Returns the number removed.
    pub fn remove_owned_by(&mut self, owner: &str) -> usize {
        let before = self.spans.len();
        self.spans.retain(|s| s.owner != owner);
        before - self.spans.len()
    }

    /// Replace all spans owned by `owner` with `spans`.
    pub fn replace_owned_by(&mut self, owner: &str, spans: impl IntoIterator<Item = TextSpan>) {
        self.remove_owned_by(owner);
        for span in spans {
            self.add(span);
        }
    }

    /// Spans covering `index`.
    pub fn spans_at(&self, index: usize) -> impl Iterator<Item = &TextSpan> {
        self.spans.iter().filter(move |s| s.contains(index))
    }

    /// Spans owned by `owner`.
    pub fn owned_by<'a>(&'a self, owner: &'a str) -> impl Iterator<Item = &'a TextSpan> + 'a {
        self.spans.iter().filter(move |s| s.owner == owner)
    }

    /// All spans in start order.
    pub fn iter(&self) -> impl Iterator<Item = &TextSpan> {
        self.spans.iter()
    }

    /// Number of spans.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// `true` when there are no spans.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Remove every span.
    pub fn clear(&mut self) {
        self.spans.clear();
    }

    /// Shift spans after an edit that removed `removed` characters at `index` and inserted
    /// `inserted` characters in their place.
    ///
    /// Spans entirely before the edit are kept, spans entirely after are shifted, and spans
    /// that overlap the edited region are dropped (their owner will recompute them).
    pub fn adjust_for_edit(&mut self, index: usize, removed: usize, inserted: usize) {
        let edit_end = index + removed;
        self.spans.retain_mut(|span| {
            if span.stop <= index {
                return true;
            }
            if span.start >= edit_end {
                span.start = span.start - removed + inserted;
                span.stop = span.stop - removed + inserted;
                return true;
            }
            false
        });
    }
}
