//! The project: blocks, block types, command history and plugins.

use crate::block::{Block, BlockKey, BlockPosition};
use crate::block_type::BlockTypeSupervisor;
use crate::collection::BlockOwnerCollection;
use crate::commands::{BlockCommand, BlockCommandContext};
use crate::error::{CommandError, ProjectError};
use crate::plugins::{PluginRegistry, PluginSupervisor};
use crate::properties::PropertiesDictionary;
use crate::settings::ProjectSettings;
use crate::supervisor::BlockCommandSupervisor;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of [`Project::undo`] and [`Project::redo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryStep {
    /// The stack was empty; nothing changed.
    Empty,
    /// A command was undone or redone, leaving the cursor at the given position.
    Applied(Option<BlockPosition>),
}

impl HistoryStep {
    /// `true` if a command was applied.
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied(_))
    }

    /// The cursor after the step, if one was applied and it set a cursor.
    pub fn position(self) -> Option<BlockPosition> {
        match self {
            Self::Applied(position) => position,
            Self::Empty => None,
        }
    }
}

/// One document being written.
///
/// Projects are shared as `Arc<Project>`: commands and background analyses hold a reference.
///
/// The project property lock is a leaf: take it last and do not acquire other locks while
/// holding it.
pub struct Project {
    block_types: BlockTypeSupervisor,
    blocks: BlockOwnerCollection,
    commands: BlockCommandSupervisor,
    plugins: PluginSupervisor,
    properties: RwLock<PropertiesDictionary>,
    settings: RwLock<ProjectSettings>,
}

impl Project {
    /// Create an empty project (one empty paragraph) with no plugins.
    pub fn new(registry: Arc<PluginRegistry>) -> Arc<Self> {
        Self::build(registry, ProjectSettings::default())
    }

    /// Create a project and add every plugin named in `settings`, in order.
    pub fn with_settings(
        registry: Arc<PluginRegistry>,
        settings: ProjectSettings,
    ) -> Result<Arc<Self>, ProjectError> {
        let plugins = settings.plugins.clone();
        let project = Self::build(registry, settings);
        for name in &plugins {
            project.add_plugin(name)?;
        }
        Ok(project)
    }

    fn build(registry: Arc<PluginRegistry>, settings: ProjectSettings) -> Arc<Self> {
        let block_types = BlockTypeSupervisor::new();
        let blocks = BlockOwnerCollection::new(block_types.paragraph());
        Arc::new(Self {
            block_types,
            blocks,
            commands: BlockCommandSupervisor::new(settings.undo_limit),
            plugins: PluginSupervisor::new(registry),
            properties: RwLock::new(PropertiesDictionary::new()),
            settings: RwLock::new(settings),
        })
    }

    /// The block type registry.
    pub fn block_types(&self) -> &BlockTypeSupervisor {
        &self.block_types
    }

    /// The ordered blocks.
    pub fn blocks(&self) -> &BlockOwnerCollection {
        &self.blocks
    }

    /// The command supervisor.
    pub fn commands(&self) -> &BlockCommandSupervisor {
        &self.commands
    }

    /// The plugin supervisor.
    pub fn plugins(&self) -> &PluginSupervisor {
        &self.plugins
    }

    /// Project-level plugin properties (e.g. total word counts).
    pub fn properties(&self) -> RwLockReadGuard<'_, PropertiesDictionary> {
        self.properties.read()
    }

    /// Mutable project-level properties.
    pub fn properties_mut(&self) -> RwLockWriteGuard<'_, PropertiesDictionary> {
        self.properties.write()
    }

    /// The settings the project was built from.
    pub fn settings(&self) -> RwLockReadGuard<'_, ProjectSettings> {
        self.settings.read()
    }

    /// Mutable settings. Changes apply to plugins added afterwards.
    pub fn settings_mut(&self) -> RwLockWriteGuard<'_, ProjectSettings> {
        self.settings.write()
    }

    /// A fresh command context for this project.
    pub fn context(self: &Arc<Self>) -> BlockCommandContext {
        BlockCommandContext::new(self.clone())
    }

    /// Execute `command`, returning the resulting cursor position.
    pub fn do_command(
        self: &Arc<Self>,
        command: impl BlockCommand + 'static,
    ) -> Result<Option<BlockPosition>, CommandError> {
        let mut context = self.context();
        self.commands.do_command(Box::new(command), &mut context)?;
        Ok(context.position())
    }

    /// Undo the last command.
    pub fn undo(self: &Arc<Self>) -> Result<HistoryStep, CommandError> {
        let mut context = self.context();
        Ok(if self.commands.undo(&mut context)? {
            HistoryStep::Applied(context.position())
        } else {
            HistoryStep::Empty
        })
    }

    /// Redo the last undone command.
    pub fn redo(self: &Arc<Self>) -> Result<HistoryStep, CommandError> {
        let mut context = self.context();
        Ok(if self.commands.redo(&mut context)? {
            HistoryStep::Applied(context.position())
        } else {
            HistoryStep::Empty
        })
    }

    /// Add a plugin by name. See [`PluginSupervisor::add`].
    pub fn add_plugin(&self, name: &str) -> Result<bool, ProjectError> {
        self.plugins.add(self, name)
    }

    /// Remove a plugin by name. See [`PluginSupervisor::remove`].
    pub fn remove_plugin(&self, name: &str) -> bool {
        self.plugins.remove(self, name)
    }

    /// Copy of a block's text.
    pub fn block_text(&self, key: BlockKey) -> Option<String> {
        self.blocks.get(key).map(|block| block.text())
    }

    /// Texts of all blocks in document order.
    pub fn texts(&self) -> Vec<String> {
        self.blocks.to_vec().iter().map(|block| block.text()).collect()
    }

    /// Schedule analysis of every block.
    pub fn reanalyze_all(self: &Arc<Self>) {
        for block in self.blocks.to_vec() {
            self.plugins.process_block_analysis(self, &block);
        }
    }

    /// Block until every scheduled analysis has finished.
    pub fn wait_for_block_analyzers(&self) {
        self.plugins.wait_for_block_analyzers();
    }

    /// Like [`Project::wait_for_block_analyzers`], giving up after `timeout`.
    pub fn wait_for_block_analyzers_timeout(&self, timeout: Duration) -> bool {
        self.plugins.wait_for_block_analyzers_timeout(timeout)
    }

    /// Recompute the outline structure, notifying relationship plugins of changes.
    pub fn update_structure(&self) {
        let mut guard = self.blocks.write();
        guard.update_structure(|block, old_parent| {
            self.plugins
                .change_block_parent(self, block, old_parent.as_ref());
        });
    }

    /// Replace every block, bypassing the command history.
    ///
    /// Used when loading. The history is cleared, the previous blocks are reported as removed
    /// and the outline is rebuilt. Analysis is not scheduled.
    pub fn replace_blocks(&self, blocks: Vec<Arc<Block>>) -> Result<(), CommandError> {
        let mut guard = self.blocks.write();
        let previous = guard.replace_all(blocks)?;
        guard.update_structure(|block, old_parent| {
            self.plugins
                .change_block_parent(self, block, old_parent.as_ref());
        });
        for block in &previous {
            block.write().touch();
            self.plugins.remove_block(self, block);
            guard.detach(block);
        }
        drop(guard);
        self.commands.clear();
        Ok(())
    }
}

impl fmt::Debug for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Project")
            .field("blocks", &self.blocks.len())
            .field("commands", &self.commands)
            .field("plugins", &self.plugins)
            .finish_non_exhaustive()
    }
}
