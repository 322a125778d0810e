//! Versioned paragraph blocks and their locks.
//!
//! A [`Block`] is one unit of text (a paragraph, a chapter heading, ...). Its mutable state
//! lives in a [`BlockState`] behind a reader/writer lock:
//!
//! - any number of readers, or one writer
//! - the lock is **not** reentrant: never acquire a block's lock twice on one call stack
//! - every text or type mutation bumps [`BlockState::version`] by exactly one
//!
//! Background work captures the version while reading and calls [`BlockState::is_stale`]
//! again before writing results back. A stale result is silently dropped.
//!
//! ```rust
//! use author_core::{Block, BlockTypeSupervisor};
//!
//! let types = BlockTypeSupervisor::new();
//! let block = Block::new(types.paragraph(), "Hello");
//!
//! let captured = block.read().version();
//! block.write().set_text("Hello, World");
//! assert!(block.read().is_stale(captured));
//! ```

use crate::block_type::BlockType;
use crate::error::CommandError;
use crate::properties::PropertiesDictionary;
use crate::text_spans::TextSpanCollection;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_BLOCK_KEY: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a block.
///
/// Keys are never reused and stay stable while blocks move around the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockKey(u64);

impl BlockKey {
    /// Allocate a fresh key.
    pub fn next() -> Self {
        Self(NEXT_BLOCK_KEY.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the underlying numeric id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:x}", self.0)
    }
}

/// A cursor position: a block and a character index inside its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockPosition {
    /// The block holding the cursor.
    pub block_key: BlockKey,
    /// Character index within the block text.
    pub text_index: usize,
}

impl BlockPosition {
    /// Create a new position.
    pub fn new(block_key: BlockKey, text_index: usize) -> Self {
        Self {
            block_key,
            text_index,
        }
    }
}

/// Lock-protected state of a [`Block`].
pub struct BlockState {
    block_type: Arc<BlockType>,
    text: String,
    version: u64,
    parent: Option<Weak<Block>>,
    properties: PropertiesDictionary,
    text_spans: TextSpanCollection,
}

impl BlockState {
    /// Current block type.
    pub fn block_type(&self) -> &Arc<BlockType> {
        &self.block_type
    }

    /// Current text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Text length in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Current version.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// `true` if the block changed since `captured_version` was read.
    pub fn is_stale(&self, captured_version: u64) -> bool {
        self.version != captured_version
    }

    /// The outline parent, if the block is nested below a structural block.
    pub fn parent(&self) -> Option<Arc<Block>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Plugin-derived properties.
    pub fn properties(&self) -> &PropertiesDictionary {
        &self.properties
    }

    /// Mutable plugin-derived properties. Does not change the version.
    pub fn properties_mut(&mut self) -> &mut PropertiesDictionary {
        &mut self.properties
    }

    /// Plugin-owned text annotations.
    pub fn text_spans(&self) -> &TextSpanCollection {
        &self.text_spans
    }

    /// Mutable plugin-owned text annotations. Does not change the version.
    pub fn text_spans_mut(&mut self) -> &mut TextSpanCollection {
        &mut self.text_spans
    }

    /// Replace the whole text. Returns the previous text.
    pub fn set_text(&mut self, text: impl Into<String>) -> String {
        let previous = std::mem::replace(&mut self.text, text.into());
        self.text_spans.clear();
        self.touch();
        previous
    }

    /// Insert `text` at character index `index`.
    pub fn insert_text(
        &mut self,
        key: BlockKey,
        index: usize,
        text: &str,
    ) -> Result<(), CommandError> {
        let byte = self.byte_index(key, index)?;
        self.text.insert_str(byte, text);
        self.text_spans
            .adjust_for_edit(index, 0, text.chars().count());
        self.touch();
        Ok(())
    }

    /// Delete the character range `range`, returning the removed text.
    pub fn delete_text(
        &mut self,
        key: BlockKey,
        range: Range<usize>,
    ) -> Result<String, CommandError> {
        self.replace_text(key, range, "")
    }

    /// Replace the character range `range` with `text`, returning the removed text.
    pub fn replace_text(
        &mut self,
        key: BlockKey,
        range: Range<usize>,
        text: &str,
    ) -> Result<String, CommandError> {
        let bytes = self.byte_range(key, range.clone())?;
        let removed = self.text[bytes.clone()].to_string();
        self.text.replace_range(bytes, text);
        self.text_spans
            .adjust_for_edit(range.start, range.len(), text.chars().count());
        self.touch();
        Ok(removed)
    }

    /// Change the block type, returning the previous one.
    pub fn set_block_type(&mut self, block_type: Arc<BlockType>) -> Arc<BlockType> {
        let previous = std::mem::replace(&mut self.block_type, block_type);
        self.touch();
        previous
    }

    /// Bump the version without changing text or type.
    ///
    /// Used when a block enters or leaves the collection so in-flight analyses of it go stale.
    pub fn touch(&mut self) {
        self.version += 1;
    }

    pub(crate) fn set_parent(&mut self, parent: Option<&Arc<Block>>) {
        self.parent = parent.map(Arc::downgrade);
    }

    /// Validate a character range against the text.
    pub fn check_range(&self, key: BlockKey, range: Range<usize>) -> Result<(), CommandError> {
        self.byte_range(key, range).map(|_| ())
    }

    fn byte_index(&self, key: BlockKey, index: usize) -> Result<usize, CommandError> {
        if index == 0 {
            return Ok(0);
        }
        let mut chars = self.text.char_indices();
        match chars.nth(index) {
            Some((byte, _)) => Ok(byte),
            None if index == self.char_len() => Ok(self.text.len()),
            None => Err(CommandError::InvalidTextIndex {
                key,
                index,
                len: self.char_len(),
            }),
        }
    }

    fn byte_range(&self, key: BlockKey, range: Range<usize>) -> Result<Range<usize>, CommandError> {
        let invalid = || CommandError::InvalidRange {
            key,
            start: range.start,
            end: range.end,
        };
        if range.start > range.end {
            return Err(invalid());
        }
        let start = self.byte_index(key, range.start).map_err(|_| invalid())?;
        let end = self.byte_index(key, range.end).map_err(|_| invalid())?;
        Ok(start..end)
    }
}

impl fmt::Debug for BlockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockState")
            .field("block_type", &self.block_type.name())
            .field("text", &self.text)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// A single paragraph-like unit of text.
pub struct Block {
    key: BlockKey,
    state: RwLock<BlockState>,
}

impl Block {
    /// Create a detached block with a fresh key.
    pub fn new(block_type: Arc<BlockType>, text: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            key: BlockKey::next(),
            state: RwLock::new(BlockState {
                block_type,
                text: text.into(),
                version: 1,
                parent: None,
                properties: PropertiesDictionary::new(),
                text_spans: TextSpanCollection::new(),
            }),
        })
    }

    /// The immutable key.
    pub fn key(&self) -> BlockKey {
        self.key
    }

    /// Acquire a shared read lock.
    pub fn read(&self) -> RwLockReadGuard<'_, BlockState> {
        self.state.read()
    }

    /// Acquire the exclusive write lock.
    pub fn write(&self) -> RwLockWriteGuard<'_, BlockState> {
        self.state.write()
    }

    /// Current version (takes the read lock briefly).
    pub fn version(&self) -> u64 {
        self.read().version()
    }

    /// Staleness check that takes the read lock briefly.
    pub fn is_stale(&self, captured_version: u64) -> bool {
        self.read().is_stale(captured_version)
    }

    /// Copy of the current text (takes the read lock briefly).
    pub fn text(&self) -> String {
        self.read().text().to_string()
    }

    /// Ancestors from the direct parent up to the outline root.
    ///
    /// Each parent link is read under that block's own read lock; no two locks are held at once.
    pub fn ancestors(&self) -> Vec<Arc<Block>> {
        let mut chain = Vec::new();
        let mut next = self.read().parent();
        while let Some(block) = next {
            next = block.read().parent();
            chain.push(block);
        }
        chain
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block").field("key", &self.key).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_type::BlockTypeSupervisor;

    #[test]
    fn test_keys_are_unique_and_increasing() {
        let a = BlockKey::next();
        let b = BlockKey::next();
        assert!(b > a);
    }

    #[test]
    fn test_version_increments_once_per_set_text() {
        let types = BlockTypeSupervisor::new();
        let block = Block::new(types.paragraph(), "");
        let mut last = block.version();
        for i in 0..20 {
            block.write().set_text(format!("text {i}"));
            let version = block.version();
            assert_eq!(version, last + 1);
            last = version;
        }
    }

    #[test]
    fn test_char_indexed_edits_on_multibyte_text() {
        let types = BlockTypeSupervisor::new();
        let block = Block::new(types.paragraph(), "héllo");
        let key = block.key();
        {
            let mut state = block.write();
            state.insert_text(key, 5, " wörld").unwrap();
            assert_eq!(state.text(), "héllo wörld");
            let removed = state.delete_text(key, 1..2).unwrap();
            assert_eq!(removed, "é");
            assert_eq!(state.replace_text(key, 0..1, "H").unwrap(), "h");
            assert_eq!(state.text(), "Hllo wörld");
        }
        assert_eq!(block.version(), 4);
    }

    #[test]
    fn test_invalid_indices_do_not_mutate() {
        let types = BlockTypeSupervisor::new();
        let block = Block::new(types.paragraph(), "abc");
        let key = block.key();
        let mut state = block.write();
        assert!(matches!(
            state.insert_text(key, 4, "x"),
            Err(CommandError::InvalidTextIndex { index: 4, len: 3, .. })
        ));
        assert!(state.delete_text(key, 2..5).is_err());
        #[allow(clippy::reversed_empty_ranges)]
        let reversed = state.delete_text(key, 2..1);
        assert!(reversed.is_err());
        assert_eq!(state.text(), "abc");
        assert_eq!(state.version(), 1);
    }

    #[test]
    fn test_type_change_bumps_version() {
        let types = BlockTypeSupervisor::new();
        let block = Block::new(types.chapter(), "One");
        let previous = block.write().set_block_type(types.paragraph());
        assert_eq!(previous.name(), "Chapter");
        assert_eq!(block.read().block_type().name(), "Paragraph");
        assert_eq!(block.version(), 2);
    }
}
