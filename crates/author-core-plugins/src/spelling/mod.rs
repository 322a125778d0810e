//! Spell checking.
//!
//! The spelling framework is the only analyzer; spelling engines are ordinary plugins that
//! expose a [`SpellingEngineRef`] extension on their controller. The framework collects
//! engines as they are added and marks misspelled words with text spans owned by
//! [`SPELLING_FRAMEWORK`].
//!
//! A word is misspelled when at least one engine reports [`SpellingState::Incorrect`] and no
//! engine reports [`SpellingState::Correct`]. Engines added after text was analyzed take
//! effect on the next analysis (see [`Project::reanalyze_all`]).

mod engines;

pub use engines::{
    LOCAL_WORDS, LocalWords, LocalWordsProvider, WORD_LIST_SPELLING, WordListSettings,
    WordListSpelling, WordListSpellingProvider,
};

use author_core::{
    Block, BlockAnalyzerPlugin, PluginError, PluginFrameworkPlugin, Project, ProjectError,
    ProjectPluginController, ProjectPluginProvider, ProjectSettings, TextSpan,
};
use log::debug;
use parking_lot::RwLock;
use regex::Regex;
use std::sync::{Arc, LazyLock};

/// Plugin name, also the owner of the spans marking misspelled words.
pub const SPELLING_FRAMEWORK: &str = "Spelling Framework";

/// Letters, with apostrophes allowed inside the word ("don't", "o’clock").
static WORD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\p{L}[\p{L}\p{M}]*(?:['’]\p{L}[\p{L}\p{M}]*)*")
        .unwrap_or_else(|err| panic!("invalid word pattern: {err}"))
});

/// An engine's verdict on one word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpellingState {
    /// The engine knows the word is spelled correctly.
    Correct,
    /// The engine believes the word is misspelled.
    Incorrect,
    /// The engine has no opinion.
    Unknown,
}

/// A source of spelling verdicts and suggestions.
pub trait SpellingEngine: Send + Sync {
    /// Judge `word`.
    fn check(&self, word: &str) -> SpellingState;

    /// Replacement candidates for `word`, best first.
    fn suggestions(&self, _word: &str) -> Vec<String> {
        Vec::new()
    }
}

/// Controller extension through which engines announce themselves.
#[derive(Clone)]
pub struct SpellingEngineRef(pub Arc<dyn SpellingEngine>);

/// Words of `text` as `(start, stop, word)`, with character indexes.
pub fn words(text: &str) -> Vec<(usize, usize, &str)> {
    let mut out = Vec::new();
    let mut byte_cursor = 0;
    let mut char_cursor = 0;
    for found in WORD_PATTERN.find_iter(text) {
        char_cursor += text[byte_cursor..found.start()].chars().count();
        let len = found.as_str().chars().count();
        out.push((char_cursor, char_cursor + len, found.as_str()));
        char_cursor += len;
        byte_cursor = found.end();
    }
    out
}

/// The framework: collects engines and checks blocks against them.
#[derive(Default)]
pub struct SpellingFramework {
    engines: RwLock<Vec<Arc<SpellingEngineRef>>>,
}

impl SpellingFramework {
    /// Create a framework with no engines.
    pub fn new() -> Self {
        Self::default()
    }

    /// The framework loaded into `project`, if any.
    pub fn for_project(project: &Project) -> Option<Arc<Self>> {
        project
            .plugins()
            .controllers()
            .iter()
            .find_map(|controller| controller.extension::<Self>())
    }

    /// Number of registered engines.
    pub fn engine_count(&self) -> usize {
        self.engines.read().len()
    }

    /// `true` if `word` is misspelled according to the registered engines.
    pub fn is_misspelled(&self, word: &str) -> bool {
        Self::judge(&self.engines.read(), word)
    }

    /// Suggestions from every engine, in engine order, without duplicates.
    pub fn suggestions(&self, word: &str) -> Vec<String> {
        let engines = self.engines.read().clone();
        let mut out: Vec<String> = Vec::new();
        for engine in &engines {
            for suggestion in engine.0.suggestions(word) {
                if !out.contains(&suggestion) {
                    out.push(suggestion);
                }
            }
        }
        out
    }

    /// Misspelled words currently marked on `block`.
    pub fn misspelled_words(block: &Block) -> Vec<String> {
        let state = block.read();
        let chars: Vec<char> = state.text().chars().collect();
        state
            .text_spans()
            .owned_by(SPELLING_FRAMEWORK)
            .filter_map(|span| chars.get(span.start..span.stop))
            .map(|word| word.iter().collect())
            .collect()
    }

    fn judge(engines: &[Arc<SpellingEngineRef>], word: &str) -> bool {
        let mut incorrect = false;
        for engine in engines {
            match engine.0.check(word) {
                SpellingState::Correct => return false,
                SpellingState::Incorrect => incorrect = true,
                SpellingState::Unknown => {}
            }
        }
        incorrect
    }

    fn register(&self, controller: &ProjectPluginController) {
        if let Some(engine) = controller.extension::<SpellingEngineRef>() {
            debug!("spelling engine '{}' registered", controller.key());
            self.engines.write().push(engine);
        }
    }
}

impl BlockAnalyzerPlugin for SpellingFramework {
    fn analyze_block(
        &self,
        _project: &Project,
        block: &Arc<Block>,
        block_version: u64,
    ) -> Result<(), PluginError> {
        let text = {
            let state = block.read();
            if state.is_stale(block_version) {
                return Ok(());
            }
            state.text().to_string()
        };

        let engines = self.engines.read().clone();
        let spans: Vec<TextSpan> = words(&text)
            .into_iter()
            .filter(|(_, _, word)| Self::judge(&engines, word))
            .map(|(start, stop, _)| TextSpan::new(start, stop, SPELLING_FRAMEWORK))
            .collect();

        let mut state = block.write();
        if state.is_stale(block_version) {
            return Ok(());
        }
        state
            .text_spans_mut()
            .replace_owned_by(SPELLING_FRAMEWORK, spans);
        Ok(())
    }
}

impl PluginFrameworkPlugin for SpellingFramework {
    fn initialize_plugin_framework(
        &self,
        _project: &Project,
        controllers: &[Arc<ProjectPluginController>],
    ) {
        for controller in controllers {
            self.register(controller);
        }
    }

    fn handle_added_controller(&self, _project: &Project, controller: &Arc<ProjectPluginController>) {
        self.register(controller);
    }

    fn handle_removed_controller(
        &self,
        _project: &Project,
        controller: &Arc<ProjectPluginController>,
    ) {
        if let Some(engine) = controller.extension::<SpellingEngineRef>() {
            self.engines.write().retain(|e| !Arc::ptr_eq(e, &engine));
        }
    }
}

/// Provider for [`SpellingFramework`].
///
/// The framework controller carries the framework itself as its extension, so callers can
/// reach [`SpellingFramework::suggestions`].
#[derive(Debug, Default)]
pub struct SpellingFrameworkProvider;

impl ProjectPluginProvider for SpellingFrameworkProvider {
    fn key(&self) -> &str {
        SPELLING_FRAMEWORK
    }

    fn get_project_plugin(
        &self,
        _project: &Project,
        _settings: &ProjectSettings,
    ) -> Result<ProjectPluginController, ProjectError> {
        let framework = Arc::new(SpellingFramework::new());
        Ok(ProjectPluginController::new(SPELLING_FRAMEWORK)
            .with_block_analyzer(framework.clone())
            .with_framework(framework.clone())
            .with_extension(framework))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(SpellingState);

    impl SpellingEngine for Fixed {
        fn check(&self, _word: &str) -> SpellingState {
            self.0
        }
    }

    fn framework(states: &[SpellingState]) -> SpellingFramework {
        let framework = SpellingFramework::new();
        for state in states {
            framework
                .engines
                .write()
                .push(Arc::new(SpellingEngineRef(Arc::new(Fixed(*state)))));
        }
        framework
    }

    #[test]
    fn test_words_are_char_indexed() {
        let found = words("Ça va? Don't—o’clock 42 naïve");
        let ranges: Vec<_> = found.iter().map(|(a, b, w)| (*a, *b, *w)).collect();
        assert_eq!(
            ranges,
            vec![
                (0, 2, "Ça"),
                (3, 5, "va"),
                (7, 12, "Don't"),
                (13, 20, "o’clock"),
                (24, 29, "naïve"),
            ]
        );
    }

    #[test]
    fn test_correct_verdict_wins() {
        use SpellingState::*;
        assert!(!framework(&[]).is_misspelled("word"));
        assert!(!framework(&[Unknown]).is_misspelled("word"));
        assert!(framework(&[Unknown, Incorrect]).is_misspelled("word"));
        assert!(!framework(&[Incorrect, Correct]).is_misspelled("word"));
    }
}
