//! Auto-correction of common typos as the writer types.
//!
//! When the character just typed ends a word, the text before it is checked against the
//! substitution table and replaced through a deferred [`ReplaceText`] that leaves the cursor
//! where it was.

use author_core::{
    DoTypes, ImmediateEdit, ImmediateEditorPlugin, Project, ProjectError, ProjectPluginController,
    ProjectPluginProvider, ProjectSettings, ReplaceText,
};
use log::trace;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Plugin name.
pub const IMMEDIATE_CORRECTION: &str = "Immediate Correction";

fn default_whole_word() -> bool {
    true
}

/// One entry of the substitution table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substitution {
    /// Text to look for.
    pub search: String,
    /// Replacement text.
    pub replacement: String,
    /// Only replace a complete word (`true`), or any text ending at the trigger.
    #[serde(default = "default_whole_word")]
    pub whole_word: bool,
}

impl Substitution {
    /// A whole-word substitution.
    pub fn word(search: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            replacement: replacement.into(),
            whole_word: true,
        }
    }

    /// A substitution matching any text that ends at the trigger.
    pub fn text(search: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            whole_word: false,
            ..Self::word(search, replacement)
        }
    }
}

/// Settings section for [`IMMEDIATE_CORRECTION`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImmediateCorrectionSettings {
    /// Substitutions, tried in order.
    pub substitutions: Vec<Substitution>,
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '\'' || ch == '’'
}

/// Immediate editor applying [`Substitution`]s.
#[derive(Debug, Default)]
pub struct ImmediateCorrection {
    substitutions: Vec<Substitution>,
}

impl ImmediateCorrection {
    /// Create a corrector with the given table.
    pub fn new(substitutions: Vec<Substitution>) -> Self {
        Self { substitutions }
    }

    /// Find the substitution for text typed before a word boundary.
    ///
    /// `before` is the text up to (not including) the boundary character. Returns the
    /// replaced character count and the replacement.
    fn find(&self, before: &[char]) -> Option<(usize, &str)> {
        let word_start = before
            .iter()
            .rposition(|ch| !is_word_char(*ch))
            .map_or(0, |i| i + 1);
        let word = &before[word_start..];

        self.substitutions.iter().find_map(|substitution| {
            let search: Vec<char> = substitution.search.chars().collect();
            let matched = if substitution.whole_word {
                !word.is_empty() && word == search.as_slice()
            } else {
                !search.is_empty() && before.ends_with(&search)
            };
            matched.then_some((search.len(), substitution.replacement.as_str()))
        })
    }
}

impl ImmediateEditorPlugin for ImmediateCorrection {
    fn process_immediate_edits(&self, edit: &ImmediateEdit<'_>) {
        let index = edit.text_index();
        if index == 0 || self.substitutions.is_empty() {
            return;
        }
        let chars: Vec<char> = edit.text().chars().take(index).collect();
        if chars.len() != index {
            return;
        }
        let boundary = index - 1;
        if is_word_char(chars[boundary]) {
            return;
        }

        let Some((len, replacement)) = self.find(&chars[..boundary]) else {
            return;
        };
        let start = boundary - len;
        trace!(
            "correcting {:?} to {replacement:?} in block {}",
            chars[start..boundary].iter().collect::<String>(),
            edit.block().key()
        );
        edit.deferred_do(
            ReplaceText::new(edit.block().key(), start..boundary, replacement)
                .with_text_position_updates(DoTypes::UNDO | DoTypes::REDO),
        );
    }
}

/// Provider for [`ImmediateCorrection`], configured from the plugin's settings section.
#[derive(Debug, Default)]
pub struct ImmediateCorrectionProvider;

impl ProjectPluginProvider for ImmediateCorrectionProvider {
    fn key(&self) -> &str {
        IMMEDIATE_CORRECTION
    }

    fn get_project_plugin(
        &self,
        _project: &Project,
        settings: &ProjectSettings,
    ) -> Result<ProjectPluginController, ProjectError> {
        let settings: ImmediateCorrectionSettings =
            settings.plugin_settings(IMMEDIATE_CORRECTION)?;
        Ok(ProjectPluginController::new(IMMEDIATE_CORRECTION)
            .with_immediate_editor(Arc::new(ImmediateCorrection::new(settings.substitutions))))
    }
}
