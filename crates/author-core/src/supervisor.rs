//! Command execution and undo/redo history.
//!
//! [`BlockCommandSupervisor`] is the only way block commands are applied. For each operation it:
//!
//! 1. acquires the command's [`LockScope`] (one block, or the whole collection)
//! 2. applies the command through a [`CommandTarget`]
//! 3. while the lock is still held, runs immediate-edit plugins (block-scope insertions, `Do`
//!    only) or the structural notifications (collection scope)
//! 4. releases the lock and schedules background analysis for every changed block
//! 5. records the command in the history and drains commands deferred by plugins
//!
//! Deferred commands run after the outermost `do_command` has released all of its locks. Each
//! becomes its own undo entry.

use crate::collection::BlockCollectionWriteGuard;
use crate::commands::{BlockCommand, BlockCommandContext, CommandTarget, LockScope, Operation};
use crate::error::CommandError;
use crate::plugins::ImmediateEdit;
use crate::project::Project;
use log::{debug, trace};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default maximum number of undo entries.
pub const DEFAULT_UNDO_LIMIT: usize = 1000;

/// Linear undo/redo history of executed commands.
struct UndoRedoManager {
    undo_stack: Vec<Box<dyn BlockCommand>>,
    redo_stack: Vec<Box<dyn BlockCommand>>,
    max_undo: usize,
    /// Saved position in the linear history, as an `undo_stack.len()`.
    /// When `redo_stack` is non-empty, `clean_index` may be greater than `undo_stack.len()`.
    clean_index: Option<usize>,
}

impl UndoRedoManager {
    fn new(max_undo: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_undo,
            clean_index: Some(0),
        }
    }

    fn is_clean(&self) -> bool {
        self.clean_index == Some(self.undo_stack.len())
    }

    fn mark_clean(&mut self) {
        self.clean_index = Some(self.undo_stack.len());
    }

    fn clear_redo_and_adjust_clean(&mut self) {
        if self.redo_stack.is_empty() {
            return;
        }

        // A clean point in the redo area becomes unreachable.
        if let Some(clean_index) = self.clean_index
            && clean_index > self.undo_stack.len()
        {
            self.clean_index = None;
        }

        self.redo_stack.clear();
    }

    fn trim_to_limit(&mut self) {
        while self.undo_stack.len() > self.max_undo {
            self.undo_stack.remove(0);
            self.clean_index = match self.clean_index {
                Some(0) | None => None,
                Some(clean_index) => Some(clean_index - 1),
            };
        }
    }

    /// Record a freshly executed command.
    fn push(&mut self, command: Box<dyn BlockCommand>) {
        self.clear_redo_and_adjust_clean();
        self.undo_stack.push(command);
        self.trim_to_limit();
    }

    fn set_max_undo(&mut self, max_undo: usize) {
        self.max_undo = max_undo;
        self.trim_to_limit();
    }

    fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.clean_index = None;
    }
}

/// Applies commands under the right locks and keeps the undo/redo history.
pub struct BlockCommandSupervisor {
    history: Mutex<UndoRedoManager>,
    deferred: Mutex<VecDeque<Box<dyn BlockCommand>>>,
    depth: AtomicUsize,
}

impl BlockCommandSupervisor {
    /// Create a supervisor keeping at most `undo_limit` undo entries.
    pub fn new(undo_limit: usize) -> Self {
        Self {
            history: Mutex::new(UndoRedoManager::new(undo_limit)),
            deferred: Mutex::new(VecDeque::new()),
            depth: AtomicUsize::new(0),
        }
    }

    /// Execute `command` and record it for undo.
    ///
    /// Clears the redo stack. Commands deferred while it runs are executed before this returns,
    /// unless this call is itself nested inside another `do_command`.
    pub fn do_command(
        &self,
        mut command: Box<dyn BlockCommand>,
        context: &mut BlockCommandContext,
    ) -> Result<(), CommandError> {
        self.depth.fetch_add(1, Ordering::SeqCst);
        let result = self.execute(command.as_mut(), context, Operation::Do);
        let outermost = self.depth.fetch_sub(1, Ordering::SeqCst) == 1;

        match result {
            Ok(()) => {
                if command.is_undoable() {
                    self.history.lock().push(command);
                }
                if outermost {
                    self.drain_deferred(context)?;
                }
                Ok(())
            }
            Err(err) => {
                if outermost {
                    let dropped = std::mem::take(&mut *self.deferred.lock());
                    if !dropped.is_empty() {
                        debug!("dropping {} deferred commands after failure", dropped.len());
                    }
                }
                Err(err)
            }
        }
    }

    /// Queue `command` to run once the outermost in-progress `do_command` releases its locks.
    ///
    /// Immediate-edit plugins use this since they run while a block write lock is held.
    pub fn deferred_do(&self, command: Box<dyn BlockCommand>) {
        self.deferred.lock().push_back(command);
    }

    /// Run every queued deferred command, in order.
    pub fn drain_deferred(&self, context: &mut BlockCommandContext) -> Result<(), CommandError> {
        loop {
            let next = self.deferred.lock().pop_front();
            let Some(command) = next else {
                return Ok(());
            };
            trace!("running deferred {command:?}");
            self.do_command(command, context)?;
        }
    }

    /// Undo the most recent command. Returns `Ok(false)` if there is nothing to undo.
    ///
    /// If the undo fails the command stays on the undo stack.
    pub fn undo(&self, context: &mut BlockCommandContext) -> Result<bool, CommandError> {
        let Some(mut command) = self.history.lock().undo_stack.pop() else {
            return Ok(false);
        };
        trace!("undo {command:?}");
        match self.execute(command.as_mut(), context, Operation::Undo) {
            Ok(()) => {
                self.history.lock().redo_stack.push(command);
                Ok(true)
            }
            Err(err) => {
                self.history.lock().undo_stack.push(command);
                Err(err)
            }
        }
    }

    /// Redo the most recently undone command. Returns `Ok(false)` if there is nothing to redo.
    ///
    /// If the redo fails the command stays on the redo stack.
    pub fn redo(&self, context: &mut BlockCommandContext) -> Result<bool, CommandError> {
        let Some(mut command) = self.history.lock().redo_stack.pop() else {
            return Ok(false);
        };
        trace!("redo {command:?}");
        match self.execute(command.as_mut(), context, Operation::Redo) {
            Ok(()) => {
                self.history.lock().undo_stack.push(command);
                Ok(true)
            }
            Err(err) => {
                self.history.lock().redo_stack.push(command);
                Err(err)
            }
        }
    }

    /// Whether there is something to undo.
    pub fn can_undo(&self) -> bool {
        !self.history.lock().undo_stack.is_empty()
    }

    /// Whether there is something to redo.
    pub fn can_redo(&self) -> bool {
        !self.history.lock().redo_stack.is_empty()
    }

    /// Number of undo entries.
    pub fn undo_depth(&self) -> usize {
        self.history.lock().undo_stack.len()
    }

    /// Number of redo entries.
    pub fn redo_depth(&self) -> usize {
        self.history.lock().redo_stack.len()
    }

    /// Change the undo limit, dropping the oldest entries if needed.
    pub fn set_undo_limit(&self, undo_limit: usize) {
        self.history.lock().set_max_undo(undo_limit);
    }

    /// `true` if the history is at the point last marked clean (e.g. saved).
    pub fn is_clean(&self) -> bool {
        self.history.lock().is_clean()
    }

    /// Mark the current history position as clean.
    pub fn mark_clean(&self) {
        self.history.lock().mark_clean();
    }

    /// Drop all history and pending deferred commands.
    pub fn clear(&self) {
        self.history.lock().clear();
        self.deferred.lock().clear();
    }

    fn execute(
        &self,
        command: &mut dyn BlockCommand,
        context: &mut BlockCommandContext,
        operation: Operation,
    ) -> Result<(), CommandError> {
        let project = context.project().clone();

        let result = match command.lock_scope() {
            LockScope::Block(key) => {
                let block = project
                    .blocks()
                    .get(key)
                    .ok_or(CommandError::UnknownBlock(key))?;
                let mut state = block.write();
                let result = {
                    let mut target = CommandTarget::Block {
                        block: &block,
                        state: &mut *state,
                    };
                    operation.apply(command, &mut target, context)
                };
                if result.is_ok()
                    && operation == Operation::Do
                    && command.triggers_immediate_edits()
                    && let Some(position) = context.position()
                    && position.block_key == key
                {
                    let edit = ImmediateEdit::new(&project, &block, &state, position.text_index);
                    project.plugins().process_immediate_edits(&edit);
                }
                result
            }
            LockScope::Collection => {
                let mut guard = project.blocks().write();
                let result = {
                    let mut target = CommandTarget::Collection(&mut guard);
                    operation.apply(command, &mut target, context)
                };
                // A failed command may still have recorded effects while rolling back.
                apply_structural_effects(&project, &mut guard, context);
                result
            }
        };

        for block in context.take_changed() {
            project.plugins().process_block_analysis(&project, &block);
        }
        result
    }
}

/// Notify relationship plugins of type changes, outline changes and removals.
///
/// Runs with the collection write lock held and no block lock held.
fn apply_structural_effects(
    project: &Project,
    guard: &mut BlockCollectionWriteGuard<'_>,
    context: &mut BlockCommandContext,
) {
    let effects = context.effects_mut();
    if !effects.needs_structure_update() {
        return;
    }
    let type_changes = std::mem::take(&mut effects.type_changes);
    let removed = std::mem::take(&mut effects.removed);
    effects.structure_dirty = false;

    let plugins = project.plugins();
    for (block, old_type) in &type_changes {
        plugins.change_block_type(project, block, old_type);
    }

    guard.update_structure(|block, old_parent| {
        plugins.change_block_parent(project, block, old_parent.as_ref());
    });

    for block in &removed {
        if guard.get(block.key()).is_none() {
            plugins.remove_block(project, block);
            guard.detach(block);
        }
    }
}

impl Default for BlockCommandSupervisor {
    fn default() -> Self {
        Self::new(DEFAULT_UNDO_LIMIT)
    }
}

impl fmt::Debug for BlockCommandSupervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let history = self.history.lock();
        f.debug_struct("BlockCommandSupervisor")
            .field("undo_depth", &history.undo_stack.len())
            .field("redo_depth", &history.redo_stack.len())
            .field("max_undo", &history.max_undo)
            .finish_non_exhaustive()
    }
}
