#![warn(missing_docs)]
//! Built-in plugins for `author-core`.
//!
//! - [`word_counter`] - word, character and block-type tallies rolled up the outline
//! - [`immediate_correction`] - auto-correction of typos as the writer types
//! - [`spelling`] - a spelling framework plus two engines
//!
//! [`builtin_registry`] returns a registry holding every provider in this crate:
//!
//! ```rust
//! use author_core::{Project, ProjectSettings};
//! use author_core_plugins::{WORD_COUNTER, WordCounts, builtin_registry};
//! use std::sync::Arc;
//!
//! let settings = ProjectSettings::new().with_plugin(WORD_COUNTER);
//! let project = Project::with_settings(Arc::new(builtin_registry()), settings).unwrap();
//! let key = project.blocks().first().key();
//! project
//!     .do_command(author_core::SetText::new(key, "Line 1"))
//!     .unwrap();
//! project.wait_for_block_analyzers();
//!
//! assert_eq!(WordCounts::aggregate(&project.properties()).words, 2);
//! ```

pub mod immediate_correction;
pub mod spelling;
pub mod word_counter;

pub use immediate_correction::{
    IMMEDIATE_CORRECTION, ImmediateCorrection, ImmediateCorrectionProvider,
    ImmediateCorrectionSettings, Substitution,
};
pub use spelling::{
    LOCAL_WORDS, LocalWords, LocalWordsProvider, SPELLING_FRAMEWORK, SpellingEngine,
    SpellingEngineRef, SpellingFramework, SpellingFrameworkProvider, SpellingState,
    WORD_LIST_SPELLING, WordListSettings, WordListSpelling, WordListSpellingProvider,
};
pub use word_counter::{WORD_COUNTER, WordCounter, WordCounterProvider, WordCounts};

use author_core::PluginRegistry;
use std::sync::Arc;

/// A registry with every plugin provider in this crate.
pub fn builtin_registry() -> PluginRegistry {
    PluginRegistry::new()
        .with(Arc::new(WordCounterProvider))
        .with(Arc::new(ImmediateCorrectionProvider))
        .with(Arc::new(SpellingFrameworkProvider))
        .with(Arc::new(LocalWordsProvider))
        .with(Arc::new(WordListSpellingProvider))
}
