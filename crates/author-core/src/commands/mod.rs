//! Undoable block commands.
//!
//! Every mutation of a project's blocks goes through a [`BlockCommand`] executed by the
//! [`BlockCommandSupervisor`](crate::BlockCommandSupervisor). A command captures enough state
//! (block key, range, inserted/removed text) to apply itself and exactly reverse itself.
//!
//! Commands declare a [`LockScope`]. The supervisor acquires that lock before calling the
//! command and hands it the held guard through a [`CommandTarget`]:
//!
//! - [`LockScope::Block`]: the write lock of one block (text edits)
//! - [`LockScope::Collection`]: the collection write lock (structural edits); block locks are
//!   then taken one at a time through [`CommandTarget::with_block`]
//!
//! Side effects that the supervisor must react to after the command (analysis scheduling,
//! type-change and outline notifications) are recorded on the [`BlockCommandContext`].
//!
//! # Example
//!
//! ```rust
//! use author_core::{BlockPosition, InsertText, PluginRegistry, Project};
//! use std::sync::Arc;
//!
//! let project = Project::new(Arc::new(PluginRegistry::new()));
//! let key = project.blocks().first().key();
//!
//! let position = project
//!     .do_command(InsertText::new(BlockPosition::new(key, 0), "Once upon a time"))
//!     .unwrap();
//! assert_eq!(position, Some(BlockPosition::new(key, 16)));
//!
//! project.undo().unwrap();
//! assert_eq!(project.blocks().first().text(), "");
//! ```

mod composite;
mod structure;
mod text;

pub use composite::CompositeCommand;
pub use structure::{ChangeBlockType, DeleteBlock, InsertBlock, InsertMultilineText, SplitBlock};
pub use text::{DeleteText, InsertText, ReplaceText, SetText};

use crate::block::{Block, BlockKey, BlockPosition, BlockState};
use crate::block_type::BlockType;
use crate::collection::BlockCollectionWriteGuard;
use crate::error::CommandError;
use crate::project::Project;
use bitflags::bitflags;
use std::fmt;
use std::sync::Arc;

bitflags! {
    /// The operations for which a command moves the cursor to its own edit.
    ///
    /// For operations not in the set, an existing cursor in the same block is only shifted by
    /// the length delta of the edit (used by corrections that must not move the caret).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DoTypes: u8 {
        /// Initial execution.
        const DO = 0b001;
        /// Undo.
        const UNDO = 0b010;
        /// Redo.
        const REDO = 0b100;
    }
}

/// Which lock a command needs while it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockScope {
    /// The write lock of a single block.
    Block(BlockKey),
    /// The write lock of the whole block collection.
    Collection,
}

/// The operation being performed on a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// First execution.
    Do,
    /// Reverse a previous execution.
    Undo,
    /// Re-apply after an undo.
    Redo,
}

impl Operation {
    pub(crate) fn flag(self) -> DoTypes {
        match self {
            Operation::Do => DoTypes::DO,
            Operation::Undo => DoTypes::UNDO,
            Operation::Redo => DoTypes::REDO,
        }
    }

    pub(crate) fn apply(
        self,
        command: &mut dyn BlockCommand,
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
    ) -> Result<(), CommandError> {
        match self {
            Operation::Do => command.do_command(target, context),
            Operation::Undo => command.undo_command(target, context),
            Operation::Redo => command.redo_command(target, context),
        }
    }
}

/// The lock guard a command runs under.
pub enum CommandTarget<'a, 'g> {
    /// A single block, write-locked.
    Block {
        /// The locked block.
        block: &'a Arc<Block>,
        /// Its write-locked state.
        state: &'a mut BlockState,
    },
    /// The write-locked collection.
    Collection(&'a mut BlockCollectionWriteGuard<'g>),
}

impl<'g> CommandTarget<'_, 'g> {
    /// Run `f` with write access to the block `key`.
    ///
    /// Under a block scope the block must be the locked one. Under the collection scope the
    /// block's write lock is acquired for the duration of `f`.
    pub fn with_block<R>(
        &mut self,
        key: BlockKey,
        f: impl FnOnce(&Arc<Block>, &mut BlockState) -> Result<R, CommandError>,
    ) -> Result<R, CommandError> {
        match self {
            CommandTarget::Block { block, state } => {
                if block.key() != key {
                    return Err(CommandError::ScopeMismatch {
                        expected: key,
                        actual: block.key(),
                    });
                }
                f(*block, &mut **state)
            }
            CommandTarget::Collection(guard) => {
                let block = guard.require(key)?;
                let mut state = block.write();
                f(&block, &mut state)
            }
        }
    }

    /// The collection guard. Fails for block-scoped targets.
    pub fn collection(&mut self) -> Result<&mut BlockCollectionWriteGuard<'g>, CommandError> {
        match self {
            CommandTarget::Collection(guard) => Ok(&mut **guard),
            CommandTarget::Block { .. } => Err(CommandError::CollectionScopeRequired),
        }
    }
}

/// A reversible mutation of a project's blocks.
pub trait BlockCommand: Send + fmt::Debug {
    /// The lock the supervisor must hold while the command runs.
    fn lock_scope(&self) -> LockScope;

    /// Whether the command is recorded on the undo stack.
    fn is_undoable(&self) -> bool {
        true
    }

    /// Whether a successful do runs the immediate editors at the resulting cursor.
    ///
    /// Only typed insertions do, so deletions and edits made by immediate editors themselves
    /// never trigger a correction.
    fn triggers_immediate_edits(&self) -> bool {
        false
    }

    /// Apply the command. Must either fully apply or leave the blocks untouched on error.
    fn do_command(
        &mut self,
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
    ) -> Result<(), CommandError>;

    /// Reverse a successful [`BlockCommand::do_command`] or [`BlockCommand::redo_command`].
    fn undo_command(
        &mut self,
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
    ) -> Result<(), CommandError>;

    /// Re-apply after an undo.
    fn redo_command(
        &mut self,
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
    ) -> Result<(), CommandError> {
        self.do_command(target, context)
    }
}

#[derive(Default)]
pub(crate) struct CommandEffects {
    pub(crate) changed: Vec<Arc<Block>>,
    pub(crate) type_changes: Vec<(Arc<Block>, Arc<BlockType>)>,
    pub(crate) removed: Vec<Arc<Block>>,
    pub(crate) structure_dirty: bool,
}

impl CommandEffects {
    pub(crate) fn needs_structure_update(&self) -> bool {
        self.structure_dirty || !self.type_changes.is_empty() || !self.removed.is_empty()
    }
}

/// Per-invocation state for one do/undo/redo call.
///
/// Carries the owning project, the resulting cursor position, and the side effects commands
/// report while running. Create a fresh context for each operation.
pub struct BlockCommandContext {
    project: Arc<Project>,
    position: Option<BlockPosition>,
    effects: CommandEffects,
}

impl BlockCommandContext {
    /// Create a context for `project` with no cursor position.
    pub fn new(project: Arc<Project>) -> Self {
        Self {
            project,
            position: None,
            effects: CommandEffects::default(),
        }
    }

    /// Create a context with a starting cursor position.
    pub fn with_position(project: Arc<Project>, position: BlockPosition) -> Self {
        let mut context = Self::new(project);
        context.position = Some(position);
        context
    }

    /// The owning project.
    pub fn project(&self) -> &Arc<Project> {
        &self.project
    }

    /// The cursor position after the last operation, if any command set one.
    pub fn position(&self) -> Option<BlockPosition> {
        self.position
    }

    /// Set the resulting cursor position.
    pub fn set_position(&mut self, position: BlockPosition) {
        self.position = Some(position);
    }

    /// Move the cursor to `position` if `operation` is in `update`, otherwise shift an existing
    /// cursor in the same block to account for an edit at `index` that replaced `removed`
    /// characters with `inserted` characters.
    pub fn update_position(
        &mut self,
        update: DoTypes,
        operation: Operation,
        position: BlockPosition,
        index: usize,
        removed: usize,
        inserted: usize,
    ) {
        if update.contains(operation.flag()) {
            self.position = Some(position);
            return;
        }
        if let Some(current) = self.position.as_mut()
            && current.block_key == position.block_key
        {
            if current.text_index >= index + removed {
                current.text_index = current.text_index - removed + inserted;
            } else if current.text_index > index {
                current.text_index = index + inserted;
            }
        }
    }

    /// Record that a block's text or type changed and needs re-analysis.
    pub fn block_changed(&mut self, block: &Arc<Block>) {
        if !self.effects.changed.iter().any(|b| Arc::ptr_eq(b, block)) {
            self.effects.changed.push(block.clone());
        }
    }

    /// Record a block type change (the block must already carry the new type).
    pub fn block_type_changed(&mut self, block: &Arc<Block>, old_type: Arc<BlockType>) {
        self.effects.type_changes.push((block.clone(), old_type));
        self.block_changed(block);
    }

    /// Record that a block joined the collection.
    pub fn block_inserted(&mut self, block: &Arc<Block>) {
        self.effects.removed.retain(|b| !Arc::ptr_eq(b, block));
        self.effects.structure_dirty = true;
        self.block_changed(block);
    }

    /// Record that a block left the collection.
    pub fn block_removed(&mut self, block: &Arc<Block>) {
        self.effects.changed.retain(|b| !Arc::ptr_eq(b, block));
        self.effects.removed.push(block.clone());
        self.effects.structure_dirty = true;
    }

    /// Record that the outline may have changed.
    pub fn structure_changed(&mut self) {
        self.effects.structure_dirty = true;
    }

    pub(crate) fn effects_mut(&mut self) -> &mut CommandEffects {
        &mut self.effects
    }

    pub(crate) fn take_changed(&mut self) -> Vec<Arc<Block>> {
        std::mem::take(&mut self.effects.changed)
    }
}

impl fmt::Debug for BlockCommandContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockCommandContext")
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}
