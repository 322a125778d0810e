//! Per-project plugin bookkeeping and dispatch.

use super::analyzer::{AnalysisTracker, BlockAnalyzer};
use super::{
    BlockAnalyzerPlugin, BlockRelationshipPlugin, ImmediateEdit, ImmediateEditorPlugin,
    PluginFrameworkPlugin, PluginRegistry, ProjectPluginController,
};
use crate::block::Block;
use crate::block_type::BlockType;
use crate::error::ProjectError;
use crate::project::Project;
use log::{debug, error};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Controllers in registration order plus the handler lists derived from them.
#[derive(Default)]
struct PluginTables {
    controllers: Vec<Arc<ProjectPluginController>>,
    block_analyzers: Vec<(String, Arc<dyn BlockAnalyzerPlugin>)>,
    immediate_editors: Vec<Arc<dyn ImmediateEditorPlugin>>,
    block_relationships: Vec<Arc<dyn BlockRelationshipPlugin>>,
    frameworks: Vec<Arc<dyn PluginFrameworkPlugin>>,
}

impl PluginTables {
    fn contains(&self, key: &str) -> bool {
        self.controllers.iter().any(|c| c.key() == key)
    }

    fn update_plugins(&mut self) {
        self.block_analyzers = self
            .controllers
            .iter()
            .filter_map(|c| {
                c.block_analyzer()
                    .map(|handler| (c.key().to_string(), handler.clone()))
            })
            .collect();
        self.immediate_editors = self
            .controllers
            .iter()
            .filter_map(|c| c.immediate_editor().cloned())
            .collect();
        self.block_relationships = self
            .controllers
            .iter()
            .filter_map(|c| c.block_relationships().cloned())
            .collect();
        self.frameworks = self
            .controllers
            .iter()
            .filter_map(|c| c.framework().cloned())
            .collect();
    }
}

/// The plugins active in one project.
///
/// Handlers are dispatched from snapshots of the tables, so plugins may query the supervisor
/// from inside a callback.
pub struct PluginSupervisor {
    registry: Arc<PluginRegistry>,
    tables: RwLock<PluginTables>,
    tracker: Arc<AnalysisTracker>,
}

impl PluginSupervisor {
    /// Create a supervisor resolving plugin names through `registry`.
    pub fn new(registry: Arc<PluginRegistry>) -> Self {
        Self {
            registry,
            tables: RwLock::new(PluginTables::default()),
            tracker: Arc::new(AnalysisTracker::default()),
        }
    }

    /// The registry plugin names are resolved against.
    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    /// Add the plugin `name` to `project`.
    ///
    /// Returns `Ok(false)` without changing anything if the plugin is single-instance and
    /// already present. Unknown names fail with [`ProjectError::UnknownPlugin`].
    pub fn add(&self, project: &Project, name: &str) -> Result<bool, ProjectError> {
        let provider = self
            .registry
            .try_get_project_plugin(name)
            .ok_or_else(|| ProjectError::UnknownPlugin(name.to_string()))?;
        let single = !provider.allow_multiple();
        if single && self.contains(name) {
            debug!("plugin '{name}' is already loaded");
            return Ok(false);
        }

        let settings = project.settings().clone();
        let controller = Arc::new(provider.get_project_plugin(project, &settings)?);

        let (frameworks, existing) = {
            let mut tables = self.tables.write();
            if single && tables.contains(name) {
                return Ok(false);
            }
            let frameworks = tables.frameworks.clone();
            let existing = tables.controllers.clone();
            tables.controllers.push(controller.clone());
            tables.update_plugins();
            (frameworks, existing)
        };

        for framework in &frameworks {
            framework.handle_added_controller(project, &controller);
        }
        if let Some(framework) = controller.framework() {
            framework.initialize_plugin_framework(project, &existing);
        }

        debug!(
            "added plugin '{name}' with capabilities {:?}",
            controller.capabilities()
        );
        Ok(true)
    }

    /// Remove the most recently added controller named `name`.
    ///
    /// Returns `false` if no such controller exists.
    pub fn remove(&self, project: &Project, name: &str) -> bool {
        let (removed, frameworks) = {
            let mut tables = self.tables.write();
            let Some(index) = tables.controllers.iter().rposition(|c| c.key() == name) else {
                return false;
            };
            let removed = tables.controllers.remove(index);
            tables.update_plugins();
            (removed, tables.frameworks.clone())
        };

        for framework in &frameworks {
            framework.handle_removed_controller(project, &removed);
        }
        debug!("removed plugin '{name}'");
        true
    }

    /// `true` if a controller named `name` is loaded.
    pub fn contains(&self, name: &str) -> bool {
        self.tables.read().contains(name)
    }

    /// Loaded controllers in registration order.
    pub fn controllers(&self) -> Vec<Arc<ProjectPluginController>> {
        self.tables.read().controllers.clone()
    }

    /// Run every immediate editor, in registration order.
    pub fn process_immediate_edits(&self, edit: &ImmediateEdit<'_>) {
        let editors = self.tables.read().immediate_editors.clone();
        for editor in &editors {
            editor.process_immediate_edits(edit);
        }
    }

    /// Schedule a background analysis of `block` at its current version.
    ///
    /// Does nothing when no analyzer is loaded. Must be called without holding the block lock.
    pub fn process_block_analysis(&self, project: &Arc<Project>, block: &Arc<Block>) {
        let analyzers = self.tables.read().block_analyzers.clone();
        if analyzers.is_empty() {
            return;
        }

        let block_version = block.version();
        let ticket = self.tracker.begin();
        let analyzer = BlockAnalyzer::new(project.clone(), block.clone(), block_version, analyzers);
        debug!(
            "scheduling analysis of block {} at version {block_version}",
            block.key()
        );

        let spawned = thread::Builder::new()
            .name(format!("block-analyzer-{}", block.key()))
            .spawn(move || {
                let _ticket = ticket;
                analyzer.run();
            });
        if let Err(err) = spawned {
            error!("failed to spawn analyzer thread for block {}: {err}", block.key());
        }
    }

    /// Block until every scheduled analysis has finished.
    ///
    /// Must not be called from an analyzer.
    pub fn wait_for_block_analyzers(&self) {
        self.tracker.wait();
    }

    /// Like [`PluginSupervisor::wait_for_block_analyzers`], giving up after `timeout`.
    ///
    /// Returns `true` if all analyses finished.
    pub fn wait_for_block_analyzers_timeout(&self, timeout: Duration) -> bool {
        self.tracker.wait_timeout(timeout)
    }

    /// Number of analyses scheduled and not yet finished.
    pub fn running_analyzers(&self) -> usize {
        self.tracker.running()
    }

    /// Notify relationship plugins that `block` moved in the outline.
    pub fn change_block_parent(
        &self,
        project: &Project,
        block: &Arc<Block>,
        old_parent: Option<&Arc<Block>>,
    ) {
        let observers = self.tables.read().block_relationships.clone();
        for observer in &observers {
            observer.change_block_parent(project, block, old_parent);
        }
    }

    /// Notify relationship plugins that `block` changed type.
    pub fn change_block_type(&self, project: &Project, block: &Arc<Block>, old_type: &Arc<BlockType>) {
        let observers = self.tables.read().block_relationships.clone();
        for observer in &observers {
            observer.change_block_type(project, block, old_type);
        }
    }

    /// Notify relationship plugins that `block` left the collection.
    pub fn remove_block(&self, project: &Project, block: &Arc<Block>) {
        let observers = self.tables.read().block_relationships.clone();
        for observer in &observers {
            observer.remove_block(project, block);
        }
    }
}

impl fmt::Debug for PluginSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tables = self.tables.read();
        f.debug_struct("PluginSupervisor")
            .field("controllers", &tables.controllers)
            .field("running_analyzers", &self.tracker.running())
            .finish()
    }
}
