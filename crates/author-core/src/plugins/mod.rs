//! Project plugins.
//!
//! A plugin is described by a [`ProjectPluginProvider`] registered by name in a
//! [`PluginRegistry`]. When a project adds the plugin, the provider builds a
//! [`ProjectPluginController`]: the plugin key plus one handler per capability it implements.
//!
//! | capability | handler | runs |
//! |---|---|---|
//! | [`PluginCapabilities::BLOCK_ANALYZER`] | [`BlockAnalyzerPlugin`] | background thread, after edits |
//! | [`PluginCapabilities::IMMEDIATE_EDITOR`] | [`ImmediateEditorPlugin`] | synchronously, block write lock held |
//! | [`PluginCapabilities::BLOCK_RELATIONSHIPS`] | [`BlockRelationshipPlugin`] | synchronously, collection write lock held |
//! | [`PluginCapabilities::FRAMEWORK`] | [`PluginFrameworkPlugin`] | when controllers are added or removed |
//!
//! Framework plugins discover their collaborators through the typed
//! [`ProjectPluginController::extension`] of other controllers.

mod analyzer;
mod supervisor;

pub use analyzer::BlockAnalyzer;
pub use supervisor::PluginSupervisor;

use crate::block::{Block, BlockState};
use crate::block_type::BlockType;
use crate::commands::BlockCommand;
use crate::error::{PluginError, ProjectError};
use crate::project::Project;
use crate::settings::ProjectSettings;
use bitflags::bitflags;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

bitflags! {
    /// The hooks a plugin controller implements.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PluginCapabilities: u8 {
        /// Analyzes blocks in the background after they change.
        const BLOCK_ANALYZER = 0b0001;
        /// Reacts to edits while the edited block is still locked.
        const IMMEDIATE_EDITOR = 0b0010;
        /// Observes outline, type and membership changes.
        const BLOCK_RELATIONSHIPS = 0b0100;
        /// Coordinates other plugins.
        const FRAMEWORK = 0b1000;
    }
}

/// Background analysis of a single block.
pub trait BlockAnalyzerPlugin: Send + Sync {
    /// Analyze `block`, which was at `block_version` when the analysis was scheduled.
    ///
    /// Called without any lock held. Implementations must take the block write lock and check
    /// [`BlockState::is_stale`] before writing results back, and drop them if stale.
    fn analyze_block(
        &self,
        project: &Project,
        block: &Arc<Block>,
        block_version: u64,
    ) -> Result<(), PluginError>;
}

/// An edit reported to immediate editors.
///
/// The edited block's write lock is held for the lifetime of this value, so further changes
/// must go through [`ImmediateEdit::deferred_do`].
pub struct ImmediateEdit<'a> {
    project: &'a Project,
    block: &'a Arc<Block>,
    state: &'a BlockState,
    text_index: usize,
}

impl<'a> ImmediateEdit<'a> {
    pub(crate) fn new(
        project: &'a Project,
        block: &'a Arc<Block>,
        state: &'a BlockState,
        text_index: usize,
    ) -> Self {
        Self {
            project,
            block,
            state,
            text_index,
        }
    }

    /// The project being edited.
    pub fn project(&self) -> &'a Project {
        self.project
    }

    /// The edited block.
    pub fn block(&self) -> &'a Arc<Block> {
        self.block
    }

    /// The edited block's state, as of after the edit.
    pub fn state(&self) -> &'a BlockState {
        self.state
    }

    /// The edited block's text.
    pub fn text(&self) -> &'a str {
        self.state.text()
    }

    /// Cursor character index after the edit.
    pub fn text_index(&self) -> usize {
        self.text_index
    }

    /// Queue a command to run once the current command has released its locks.
    pub fn deferred_do(&self, command: impl BlockCommand + 'static) {
        self.project.commands().deferred_do(Box::new(command));
    }
}

/// Synchronous reaction to text edits.
pub trait ImmediateEditorPlugin: Send + Sync {
    /// Inspect an edit. Must not lock the edited block or the collection.
    fn process_immediate_edits(&self, edit: &ImmediateEdit<'_>);
}

/// Observer of outline structure, block type and membership changes.
///
/// Every method is called with the collection write lock held and no block lock held.
/// Implementations may lock blocks one at a time but must not touch the collection lock.
pub trait BlockRelationshipPlugin: Send + Sync {
    /// `block` moved in the outline; its new parent is already set.
    fn change_block_parent(
        &self,
        _project: &Project,
        _block: &Arc<Block>,
        _old_parent: Option<&Arc<Block>>,
    ) {
    }

    /// `block` changed type; it already carries the new type.
    fn change_block_type(&self, _project: &Project, _block: &Arc<Block>, _old_type: &Arc<BlockType>) {}

    /// `block` left the collection. Its parent link still points to its former parent.
    fn remove_block(&self, _project: &Project, _block: &Arc<Block>) {}
}

/// A plugin that coordinates other plugins.
pub trait PluginFrameworkPlugin: Send + Sync {
    /// The framework was added to a project that already has `controllers`.
    fn initialize_plugin_framework(
        &self,
        project: &Project,
        controllers: &[Arc<ProjectPluginController>],
    );

    /// Another controller was added after the framework.
    fn handle_added_controller(&self, _project: &Project, _controller: &Arc<ProjectPluginController>) {
    }

    /// Another controller was removed.
    fn handle_removed_controller(
        &self,
        _project: &Project,
        _controller: &Arc<ProjectPluginController>,
    ) {
    }
}

/// A project-scoped plugin instance.
#[derive(Clone)]
pub struct ProjectPluginController {
    key: String,
    block_analyzer: Option<Arc<dyn BlockAnalyzerPlugin>>,
    immediate_editor: Option<Arc<dyn ImmediateEditorPlugin>>,
    block_relationships: Option<Arc<dyn BlockRelationshipPlugin>>,
    framework: Option<Arc<dyn PluginFrameworkPlugin>>,
    extension: Option<Arc<dyn Any + Send + Sync>>,
}

impl ProjectPluginController {
    /// Create a controller with no capabilities.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            block_analyzer: None,
            immediate_editor: None,
            block_relationships: None,
            framework: None,
            extension: None,
        }
    }

    /// Add the block analyzer capability.
    pub fn with_block_analyzer(mut self, handler: Arc<dyn BlockAnalyzerPlugin>) -> Self {
        self.block_analyzer = Some(handler);
        self
    }

    /// Add the immediate editor capability.
    pub fn with_immediate_editor(mut self, handler: Arc<dyn ImmediateEditorPlugin>) -> Self {
        self.immediate_editor = Some(handler);
        self
    }

    /// Add the block relationship capability.
    pub fn with_block_relationships(mut self, handler: Arc<dyn BlockRelationshipPlugin>) -> Self {
        self.block_relationships = Some(handler);
        self
    }

    /// Add the framework capability.
    pub fn with_framework(mut self, handler: Arc<dyn PluginFrameworkPlugin>) -> Self {
        self.framework = Some(handler);
        self
    }

    /// Attach a typed extension for framework plugins to discover.
    pub fn with_extension<T: Any + Send + Sync>(mut self, extension: Arc<T>) -> Self {
        self.extension = Some(extension);
        self
    }

    /// The plugin key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The capabilities this controller implements.
    pub fn capabilities(&self) -> PluginCapabilities {
        let mut capabilities = PluginCapabilities::empty();
        capabilities.set(PluginCapabilities::BLOCK_ANALYZER, self.block_analyzer.is_some());
        capabilities.set(PluginCapabilities::IMMEDIATE_EDITOR, self.immediate_editor.is_some());
        capabilities.set(
            PluginCapabilities::BLOCK_RELATIONSHIPS,
            self.block_relationships.is_some(),
        );
        capabilities.set(PluginCapabilities::FRAMEWORK, self.framework.is_some());
        capabilities
    }

    /// The block analyzer handler.
    pub fn block_analyzer(&self) -> Option<&Arc<dyn BlockAnalyzerPlugin>> {
        self.block_analyzer.as_ref()
    }

    /// The immediate editor handler.
    pub fn immediate_editor(&self) -> Option<&Arc<dyn ImmediateEditorPlugin>> {
        self.immediate_editor.as_ref()
    }

    /// The block relationship handler.
    pub fn block_relationships(&self) -> Option<&Arc<dyn BlockRelationshipPlugin>> {
        self.block_relationships.as_ref()
    }

    /// The framework handler.
    pub fn framework(&self) -> Option<&Arc<dyn PluginFrameworkPlugin>> {
        self.framework.as_ref()
    }

    /// The extension, if one of type `T` is attached. Returns the attached `Arc` itself.
    pub fn extension<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.extension.clone()?.downcast::<T>().ok()
    }
}

impl fmt::Debug for ProjectPluginController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProjectPluginController")
            .field("key", &self.key)
            .field("capabilities", &self.capabilities())
            .finish_non_exhaustive()
    }
}

/// Factory for project-scoped plugin controllers.
pub trait ProjectPluginProvider: Send + Sync {
    /// Unique plugin name.
    fn key(&self) -> &str;

    /// Whether a project may hold several instances of this plugin.
    fn allow_multiple(&self) -> bool {
        false
    }

    /// Build a fresh controller for `project`, configured from `settings`.
    fn get_project_plugin(
        &self,
        project: &Project,
        settings: &ProjectSettings,
    ) -> Result<ProjectPluginController, ProjectError>;
}

/// Named plugin providers available to projects.
#[derive(Default, Clone)]
pub struct PluginRegistry {
    providers: BTreeMap<String, Arc<dyn ProjectPluginProvider>>,
}

impl PluginRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` under its key, returning any provider it replaced.
    pub fn register(
        &mut self,
        provider: Arc<dyn ProjectPluginProvider>,
    ) -> Option<Arc<dyn ProjectPluginProvider>> {
        self.providers.insert(provider.key().to_string(), provider)
    }

    /// Builder form of [`PluginRegistry::register`].
    pub fn with(mut self, provider: Arc<dyn ProjectPluginProvider>) -> Self {
        self.register(provider);
        self
    }

    /// Look up a provider by name.
    pub fn try_get_project_plugin(&self, name: &str) -> Option<Arc<dyn ProjectPluginProvider>> {
        self.providers.get(name).cloned()
    }

    /// Registered plugin names, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.providers.keys()).finish()
    }
}
