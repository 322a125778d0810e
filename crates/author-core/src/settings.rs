//! Project configuration.

use crate::error::ProjectError;
use crate::supervisor::DEFAULT_UNDO_LIMIT;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Settings a project is built from.
///
/// ```rust
/// use author_core::ProjectSettings;
///
/// let settings: ProjectSettings = serde_json::from_str(
///     r#"{ "plugins": ["Word Counter"], "plugin_settings": { "Word Counter": {} } }"#,
/// )
/// .unwrap();
/// assert_eq!(settings.plugins, vec!["Word Counter".to_string()]);
/// assert_eq!(settings.undo_limit, 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectSettings {
    /// Plugins to load, in order.
    pub plugins: Vec<String>,
    /// Maximum number of undo entries.
    pub undo_limit: usize,
    /// Per-plugin settings sections, keyed by plugin name.
    pub plugin_settings: BTreeMap<String, serde_json::Value>,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            plugins: Vec::new(),
            undo_limit: DEFAULT_UNDO_LIMIT,
            plugin_settings: BTreeMap::new(),
        }
    }
}

impl ProjectSettings {
    /// Default settings with no plugins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a plugin to load.
    pub fn with_plugin(mut self, name: impl Into<String>) -> Self {
        self.plugins.push(name.into());
        self
    }

    /// Deserialize the settings section of `plugin`; a missing section gives `T::default()`.
    pub fn plugin_settings<T>(&self, plugin: &str) -> Result<T, ProjectError>
    where
        T: DeserializeOwned + Default,
    {
        match self.plugin_settings.get(plugin) {
            Some(value) => {
                T::deserialize(value).map_err(|source| ProjectError::PluginSettings {
                    plugin: plugin.to_string(),
                    source,
                })
            }
            None => Ok(T::default()),
        }
    }

    /// Store the settings section of `plugin`.
    pub fn set_plugin_settings<T: Serialize>(
        &mut self,
        plugin: &str,
        value: &T,
    ) -> Result<(), ProjectError> {
        let value = serde_json::to_value(value).map_err(|source| ProjectError::PluginSettings {
            plugin: plugin.to_string(),
            source,
        })?;
        self.plugin_settings.insert(plugin.to_string(), value);
        Ok(())
    }

    /// Builder form of [`ProjectSettings::set_plugin_settings`].
    pub fn with_plugin_settings<T: Serialize>(
        mut self,
        plugin: &str,
        value: &T,
    ) -> Result<Self, ProjectError> {
        self.set_plugin_settings(plugin, value)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Words {
        words: Vec<String>,
    }

    #[test]
    fn test_missing_section_is_default() {
        let settings = ProjectSettings::new();
        let words: Words = settings.plugin_settings("Local Words").unwrap();
        assert_eq!(words, Words::default());
    }

    #[test]
    fn test_section_round_trip_and_bad_section() {
        let settings = ProjectSettings::new()
            .with_plugin_settings(
                "Local Words",
                &Words {
                    words: vec!["Ellandra".into()],
                },
            )
            .unwrap();
        let words: Words = settings.plugin_settings("Local Words").unwrap();
        assert_eq!(words.words, vec!["Ellandra".to_string()]);

        let mut broken = settings.clone();
        broken
            .plugin_settings
            .insert("Local Words".into(), serde_json::json!({ "words": 3 }));
        assert!(matches!(
            broken.plugin_settings::<Words>("Local Words"),
            Err(ProjectError::PluginSettings { .. })
        ));
    }
}
