use super::{SpellingEngine, SpellingEngineRef, SpellingState};
use author_core::{
    Project, ProjectError, ProjectPluginController, ProjectPluginProvider, ProjectSettings,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Plugin name of [`LocalWords`].
pub const LOCAL_WORDS: &str = "Local Words";

/// Plugin name of [`WordListSpelling`].
pub const WORD_LIST_SPELLING: &str = "Word List Spelling";

/// Settings section shared by both engines: a list of words.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WordListSettings {
    /// The words, in any case.
    pub words: Vec<String>,
}

fn lowercase_set(words: impl IntoIterator<Item = impl AsRef<str>>) -> BTreeSet<String> {
    words
        .into_iter()
        .map(|word| word.as_ref().to_lowercase())
        .collect()
}

/// Project-specific words (character names, invented places).
///
/// Only ever says [`SpellingState::Correct`]; everything else is left to other engines.
#[derive(Debug, Default)]
pub struct LocalWords {
    words: BTreeSet<String>,
}

impl LocalWords {
    /// Create an engine accepting `words`, case-insensitively.
    pub fn new(words: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        Self {
            words: lowercase_set(words),
        }
    }
}

impl SpellingEngine for LocalWords {
    fn check(&self, word: &str) -> SpellingState {
        if self.words.contains(&word.to_lowercase()) {
            SpellingState::Correct
        } else {
            SpellingState::Unknown
        }
    }
}

/// Dictionary engine: words in the list are correct, all others incorrect.
#[derive(Debug, Default)]
pub struct WordListSpelling {
    words: BTreeSet<String>,
}

impl WordListSpelling {
    /// Maximum edit distance of a suggestion.
    pub const MAX_DISTANCE: usize = 2;

    /// Create an engine from a word list, matched case-insensitively.
    pub fn new(words: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        Self {
            words: lowercase_set(words),
        }
    }
}

impl SpellingEngine for WordListSpelling {
    fn check(&self, word: &str) -> SpellingState {
        if self.words.contains(&word.to_lowercase()) {
            SpellingState::Correct
        } else {
            SpellingState::Incorrect
        }
    }

    /// Listed words within [`WordListSpelling::MAX_DISTANCE`] edits, closest first, then
    /// alphabetical.
    fn suggestions(&self, word: &str) -> Vec<String> {
        let word = word.to_lowercase();
        let mut found: Vec<(usize, &String)> = self
            .words
            .iter()
            .filter_map(|candidate| {
                let distance = edit_distance(&word, candidate);
                (distance > 0 && distance <= Self::MAX_DISTANCE).then_some((distance, candidate))
            })
            .collect();
        found.sort();
        found.into_iter().map(|(_, word)| word.clone()).collect()
    }
}

/// Levenshtein distance over characters.
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == *cb {
                diagonal
            } else {
                1 + diagonal.min(above).min(row[j])
            };
            diagonal = above;
        }
    }
    row[b.len()]
}

/// Provider for [`LocalWords`], reading its words from the `Local Words` settings section.
#[derive(Debug, Default)]
pub struct LocalWordsProvider;

impl ProjectPluginProvider for LocalWordsProvider {
    fn key(&self) -> &str {
        LOCAL_WORDS
    }

    fn allow_multiple(&self) -> bool {
        true
    }

    fn get_project_plugin(
        &self,
        _project: &Project,
        settings: &ProjectSettings,
    ) -> Result<ProjectPluginController, ProjectError> {
        let settings: WordListSettings = settings.plugin_settings(LOCAL_WORDS)?;
        let engine = SpellingEngineRef(Arc::new(LocalWords::new(settings.words)));
        Ok(ProjectPluginController::new(LOCAL_WORDS).with_extension(Arc::new(engine)))
    }
}

/// Provider for [`WordListSpelling`], reading its dictionary from the `Word List Spelling`
/// settings section.
#[derive(Debug, Default)]
pub struct WordListSpellingProvider;

impl ProjectPluginProvider for WordListSpellingProvider {
    fn key(&self) -> &str {
        WORD_LIST_SPELLING
    }

    fn allow_multiple(&self) -> bool {
        true
    }

    fn get_project_plugin(
        &self,
        _project: &Project,
        settings: &ProjectSettings,
    ) -> Result<ProjectPluginController, ProjectError> {
        let settings: WordListSettings = settings.plugin_settings(WORD_LIST_SPELLING)?;
        let engine = SpellingEngineRef(Arc::new(WordListSpelling::new(settings.words)));
        Ok(ProjectPluginController::new(WORD_LIST_SPELLING).with_extension(Arc::new(engine)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("", ""), 0);
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("teh", "the"), 2);
        assert_eq!(edit_distance("cafe", "café"), 1);
        assert_eq!(edit_distance("", "abc"), 3);
    }

    #[test]
    fn test_word_list_is_case_insensitive() {
        let engine = WordListSpelling::new(["Whale", "sea"]);
        assert_eq!(engine.check("whale"), SpellingState::Correct);
        assert_eq!(engine.check("SEA"), SpellingState::Correct);
        assert_eq!(engine.check("wale"), SpellingState::Incorrect);

        let local = LocalWords::new(["Queequeg"]);
        assert_eq!(local.check("queequeg"), SpellingState::Correct);
        assert_eq!(local.check("whale"), SpellingState::Unknown);
    }

    #[test]
    fn test_suggestions_sorted_by_distance() {
        let engine = WordListSpelling::new(["the", "then", "tea", "ten", "whale"]);
        assert_eq!(engine.suggestions("teh"), vec!["tea", "ten", "the", "then"]);
        assert!(engine.suggestions("the").contains(&"then".to_string()));
        assert!(engine.suggestions("zzzzzz").is_empty());
    }
}
