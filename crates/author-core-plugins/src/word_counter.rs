//! Word, character and block-type tallies rolled up the outline.
//!
//! Every analyzed block stores its own contribution under `Word Counter/Self/...` and an
//! aggregate (itself plus its outline descendants) under:
//!
//! - `Word Counter/Words`
//! - `Word Counter/Characters`
//! - `Word Counter/Non-Whitespace Characters`
//! - `Word Counter/Types/<Block Type>`
//!
//! The project properties hold the same aggregate paths for the whole manuscript.
//!
//! Changes travel as deltas: block, then each ancestor, then the project, one lock at a time.
//! Analysis holds the collection read lock for the whole propagation so the outline cannot
//! change underneath it; the relationship callbacks run under the collection write lock.

use author_core::{
    Block, BlockAnalyzerPlugin, BlockRelationshipPlugin, BlockType, HierarchicalPath,
    PluginError, Project, ProjectError, ProjectPluginController, ProjectPluginProvider,
    ProjectSettings, PropertiesDictionary,
};
use log::trace;
use std::collections::BTreeMap;
use std::sync::Arc;
use unicode_segmentation::UnicodeSegmentation;

/// Plugin name.
pub const WORD_COUNTER: &str = "Word Counter";

const WORDS: &str = "Words";
const CHARACTERS: &str = "Characters";
const NON_WHITESPACE: &str = "Non-Whitespace Characters";
const TYPES: &str = "Types";
const SELF: &str = "Self";
const TYPE: &str = "Type";

/// Property paths used by the word counter.
pub mod paths {
    use super::*;

    /// Aggregate word count.
    pub fn words() -> HierarchicalPath {
        HierarchicalPath::from_segments([WORD_COUNTER, WORDS])
    }

    /// Aggregate character count.
    pub fn characters() -> HierarchicalPath {
        HierarchicalPath::from_segments([WORD_COUNTER, CHARACTERS])
    }

    /// Aggregate non-whitespace character count.
    pub fn non_whitespace_characters() -> HierarchicalPath {
        HierarchicalPath::from_segments([WORD_COUNTER, NON_WHITESPACE])
    }

    /// Number of blocks of `block_type` in the aggregate.
    pub fn block_type(block_type: &str) -> HierarchicalPath {
        types().child(block_type)
    }

    pub(super) fn types() -> HierarchicalPath {
        HierarchicalPath::from_segments([WORD_COUNTER, TYPES])
    }

    pub(super) fn own() -> HierarchicalPath {
        HierarchicalPath::from_segments([WORD_COUNTER, SELF])
    }
}

/// Counts for one piece of text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WordCounts {
    /// Unicode words (UAX #29).
    pub words: i64,
    /// Characters (Unicode scalar values).
    pub characters: i64,
    /// Characters that are not whitespace.
    pub non_whitespace_characters: i64,
}

impl WordCounts {
    /// Count `text`.
    ///
    /// ```rust
    /// use author_core_plugins::WordCounts;
    ///
    /// let counts = WordCounts::count("Line 1");
    /// assert_eq!(counts.words, 2);
    /// assert_eq!(counts.characters, 6);
    /// assert_eq!(counts.non_whitespace_characters, 5);
    /// ```
    pub fn count(text: &str) -> Self {
        let mut counts = Self {
            words: text.unicode_words().count() as i64,
            ..Self::default()
        };
        for ch in text.chars() {
            counts.characters += 1;
            if !ch.is_whitespace() {
                counts.non_whitespace_characters += 1;
            }
        }
        counts
    }

    /// Aggregate counts stored in `properties`.
    pub fn aggregate(properties: &PropertiesDictionary) -> Self {
        Self::read(properties, &HierarchicalPath::from(WORD_COUNTER))
    }

    fn read(properties: &PropertiesDictionary, base: &HierarchicalPath) -> Self {
        Self {
            words: properties.get_i64(&base.child(WORDS)),
            characters: properties.get_i64(&base.child(CHARACTERS)),
            non_whitespace_characters: properties.get_i64(&base.child(NON_WHITESPACE)),
        }
    }
}

/// What one block contributes by itself.
#[derive(Debug, Default, PartialEq)]
struct OwnRecord {
    counts: WordCounts,
    block_type: Option<String>,
}

impl OwnRecord {
    fn read(properties: &PropertiesDictionary) -> Self {
        let own = paths::own();
        Self {
            counts: WordCounts::read(properties, &own),
            block_type: properties.get_str(&own.child(TYPE)).map(str::to_string),
        }
    }

    fn write(&self, properties: &mut PropertiesDictionary) {
        let own = paths::own();
        properties.remove_prefix(&own);
        let counts = self.counts;
        for (name, value) in [
            (WORDS, counts.words),
            (CHARACTERS, counts.characters),
            (NON_WHITESPACE, counts.non_whitespace_characters),
        ] {
            properties.increment(&own.child(name), value);
        }
        if let Some(block_type) = &self.block_type {
            properties.set(own.child(TYPE), block_type);
        }
    }
}

/// A signed change to aggregate tallies.
#[derive(Debug, Default, Clone, PartialEq)]
struct Delta {
    counts: WordCounts,
    types: BTreeMap<String, i64>,
}

impl Delta {
    /// The change from `before` to `after`.
    fn between(before: &OwnRecord, after: &OwnRecord) -> Self {
        let mut delta = Self {
            counts: WordCounts {
                words: after.counts.words - before.counts.words,
                characters: after.counts.characters - before.counts.characters,
                non_whitespace_characters: after.counts.non_whitespace_characters
                    - before.counts.non_whitespace_characters,
            },
            types: BTreeMap::new(),
        };
        if before.block_type != after.block_type {
            if let Some(old) = &before.block_type {
                delta.add_type(old, -1);
            }
            if let Some(new) = &after.block_type {
                delta.add_type(new, 1);
            }
        }
        delta
    }

    /// The whole aggregate stored in `properties`.
    fn aggregate(properties: &PropertiesDictionary) -> Self {
        let types_path = paths::types();
        let types = properties
            .iter_prefix(&types_path)
            .filter_map(|(path, value)| {
                let name = path.name()?.to_string();
                Some((name, value.parse().ok()?))
            })
            .collect();
        Self {
            counts: WordCounts::aggregate(properties),
            types,
        }
    }

    fn add_type(&mut self, block_type: &str, delta: i64) {
        let entry = self.types.entry(block_type.to_string()).or_default();
        *entry += delta;
        if *entry == 0 {
            self.types.remove(block_type);
        }
    }

    fn negated(&self) -> Self {
        Self {
            counts: WordCounts {
                words: -self.counts.words,
                characters: -self.counts.characters,
                non_whitespace_characters: -self.counts.non_whitespace_characters,
            },
            types: self.types.iter().map(|(k, v)| (k.clone(), -v)).collect(),
        }
    }

    fn is_empty(&self) -> bool {
        self.counts == WordCounts::default() && self.types.is_empty()
    }

    fn apply(&self, properties: &mut PropertiesDictionary) {
        let counts = self.counts;
        for (path, value) in [
            (paths::words(), counts.words),
            (paths::characters(), counts.characters),
            (paths::non_whitespace_characters(), counts.non_whitespace_characters),
        ] {
            if value != 0 {
                properties.increment(&path, value);
            }
        }
        for (block_type, value) in &self.types {
            properties.increment(&paths::block_type(block_type), *value);
        }
    }

    /// Apply to each block in `chain`, locking one at a time.
    fn apply_to_chain(&self, chain: &[Arc<Block>]) {
        for block in chain {
            self.apply(block.write().properties_mut());
        }
    }
}

/// Per-project word counter.
#[derive(Debug, Default)]
pub struct WordCounter;

impl WordCounter {
    /// Create a word counter.
    pub fn new() -> Self {
        Self
    }

    /// Apply `delta` to the block's ancestors and the project.
    fn propagate(project: &Project, block: &Block, delta: &Delta) {
        delta.apply_to_chain(&block.ancestors());
        delta.apply(&mut project.properties_mut());
    }
}

impl BlockAnalyzerPlugin for WordCounter {
    fn analyze_block(
        &self,
        project: &Project,
        block: &Arc<Block>,
        block_version: u64,
    ) -> Result<(), PluginError> {
        let collection = project.blocks().read();
        if collection.get(block.key()).is_none() {
            return Ok(());
        }

        let delta = {
            let mut state = block.write();
            if state.is_stale(block_version) {
                trace!("word count of block {} is stale", block.key());
                return Ok(());
            }
            let current = OwnRecord {
                counts: WordCounts::count(state.text()),
                block_type: Some(state.block_type().name().to_string()),
            };
            let previous = OwnRecord::read(state.properties());
            let delta = Delta::between(&previous, &current);
            if delta.is_empty() {
                return Ok(());
            }
            current.write(state.properties_mut());
            delta.apply(state.properties_mut());
            delta
        };

        Self::propagate(project, block, &delta);
        drop(collection);
        Ok(())
    }
}

impl BlockRelationshipPlugin for WordCounter {
    fn change_block_parent(
        &self,
        _project: &Project,
        block: &Arc<Block>,
        old_parent: Option<&Arc<Block>>,
    ) {
        let moved = Delta::aggregate(block.read().properties());
        if moved.is_empty() {
            return;
        }
        if let Some(old_parent) = old_parent {
            let mut old_chain = vec![old_parent.clone()];
            old_chain.extend(old_parent.ancestors());
            moved.negated().apply_to_chain(&old_chain);
        }
        moved.apply_to_chain(&block.ancestors());
    }

    fn change_block_type(&self, project: &Project, block: &Arc<Block>, _old_type: &Arc<BlockType>) {
        let delta = {
            let mut state = block.write();
            let previous = OwnRecord::read(state.properties());
            if previous.block_type.is_none() {
                // Not analyzed yet; the pending analysis records the type.
                return;
            }
            let current = OwnRecord {
                counts: previous.counts,
                block_type: Some(state.block_type().name().to_string()),
            };
            let delta = Delta::between(&previous, &current);
            current.write(state.properties_mut());
            delta.apply(state.properties_mut());
            delta
        };
        Self::propagate(project, block, &delta);
    }

    fn remove_block(&self, project: &Project, block: &Arc<Block>) {
        let delta = {
            let mut state = block.write();
            let previous = OwnRecord::read(state.properties());
            let delta = Delta::between(&previous, &OwnRecord::default());
            state.properties_mut().remove_prefix(&paths::own());
            delta.apply(state.properties_mut());
            delta
        };
        if !delta.is_empty() {
            Self::propagate(project, block, &delta);
        }
    }
}

/// Provider for [`WordCounter`].
#[derive(Debug, Default)]
pub struct WordCounterProvider;

impl ProjectPluginProvider for WordCounterProvider {
    fn key(&self) -> &str {
        WORD_COUNTER
    }

    fn get_project_plugin(
        &self,
        _project: &Project,
        _settings: &ProjectSettings,
    ) -> Result<ProjectPluginController, ProjectError> {
        let counter = Arc::new(WordCounter::new());
        Ok(ProjectPluginController::new(WORD_COUNTER)
            .with_block_analyzer(counter.clone())
            .with_block_relationships(counter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_multibyte_and_whitespace() {
        let counts = WordCounts::count("Naïve café,  déjà vu!");
        assert_eq!(counts.words, 4);
        assert_eq!(counts.characters, 21);
        assert_eq!(counts.non_whitespace_characters, 17);
        assert_eq!(WordCounts::count(""), WordCounts::default());
    }

    #[test]
    fn test_delta_tracks_type_changes() {
        let before = OwnRecord {
            counts: WordCounts::count("one two"),
            block_type: Some("Chapter".into()),
        };
        let after = OwnRecord {
            counts: before.counts,
            block_type: Some("Paragraph".into()),
        };
        let delta = Delta::between(&before, &after);
        assert_eq!(delta.counts, WordCounts::default());
        assert_eq!(delta.types.get("Chapter"), Some(&-1));
        assert_eq!(delta.types.get("Paragraph"), Some(&1));

        let mut properties = PropertiesDictionary::new();
        Delta::between(&OwnRecord::default(), &before).apply(&mut properties);
        delta.apply(&mut properties);
        assert_eq!(properties.get_i64(&paths::words()), 2);
        assert_eq!(properties.get_i64(&paths::block_type("Chapter")), 0);
        assert_eq!(properties.get_i64(&paths::block_type("Paragraph")), 1);
    }

    #[test]
    fn test_own_record_round_trip() {
        let record = OwnRecord {
            counts: WordCounts::count("Line 1"),
            block_type: Some("Paragraph".into()),
        };
        let mut properties = PropertiesDictionary::new();
        record.write(&mut properties);
        assert_eq!(OwnRecord::read(&properties), record);
        assert!(Delta::aggregate(&properties).is_empty());
    }
}
