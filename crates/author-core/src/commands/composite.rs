//! Ordered groups of commands that undo and redo as one step.

use super::{BlockCommand, BlockCommandContext, CommandTarget, LockScope, Operation};
use crate::error::CommandError;

/// An ordered list of commands applied as a unit.
///
/// Do and redo run the children in order, undo in reverse. If a child fails, the children
/// already applied in this pass are reverted and the error is returned, leaving the blocks as
/// they were.
#[derive(Debug, Default)]
pub struct CompositeCommand {
    commands: Vec<Box<dyn BlockCommand>>,
}

impl CompositeCommand {
    /// Create an empty composite.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a child command.
    pub fn push(&mut self, command: impl BlockCommand + 'static) {
        self.commands.push(Box::new(command));
    }

    /// Builder form of [`CompositeCommand::push`].
    pub fn with(mut self, command: impl BlockCommand + 'static) -> Self {
        self.push(command);
        self
    }

    /// Number of child commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// `true` if there are no child commands.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl From<Vec<Box<dyn BlockCommand>>> for CompositeCommand {
    fn from(commands: Vec<Box<dyn BlockCommand>>) -> Self {
        Self { commands }
    }
}

impl BlockCommand for CompositeCommand {
    fn lock_scope(&self) -> LockScope {
        let mut scopes = self.commands.iter().map(|c| c.lock_scope());
        match scopes.next() {
            Some(LockScope::Block(key))
                if scopes.all(|scope| scope == LockScope::Block(key)) =>
            {
                LockScope::Block(key)
            }
            _ => LockScope::Collection,
        }
    }

    fn is_undoable(&self) -> bool {
        self.commands.iter().all(|c| c.is_undoable())
    }

    fn triggers_immediate_edits(&self) -> bool {
        self.commands.iter().any(|c| c.triggers_immediate_edits())
    }

    fn do_command(
        &mut self,
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
    ) -> Result<(), CommandError> {
        forward(&mut self.commands, Operation::Do, target, context)
    }

    fn undo_command(
        &mut self,
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
    ) -> Result<(), CommandError> {
        for i in (0..self.commands.len()).rev() {
            if let Err(source) = self.commands[i].undo_command(target, context) {
                // Put back what this pass already undid.
                for command in &mut self.commands[i + 1..] {
                    if let Err(rollback) = command.redo_command(target, context) {
                        return Err(CommandError::Rollback {
                            source: Box::new(source),
                            rollback: Box::new(rollback),
                        });
                    }
                }
                return Err(source);
            }
        }
        Ok(())
    }

    fn redo_command(
        &mut self,
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
    ) -> Result<(), CommandError> {
        forward(&mut self.commands, Operation::Redo, target, context)
    }
}

fn forward(
    commands: &mut [Box<dyn BlockCommand>],
    operation: Operation,
    target: &mut CommandTarget<'_, '_>,
    context: &mut BlockCommandContext,
) -> Result<(), CommandError> {
    for i in 0..commands.len() {
        if let Err(source) = operation.apply(commands[i].as_mut(), target, context) {
            return Err(roll_back(&mut commands[..i], target, context, source));
        }
    }
    Ok(())
}

/// Undo `applied` in reverse after `source` interrupted a forward pass.
///
/// Returns `source`, or [`CommandError::Rollback`] if one of the undos fails too.
pub(super) fn roll_back(
    applied: &mut [Box<dyn BlockCommand>],
    target: &mut CommandTarget<'_, '_>,
    context: &mut BlockCommandContext,
    source: CommandError,
) -> CommandError {
    for command in applied.iter_mut().rev() {
        if let Err(rollback) = command.undo_command(target, context) {
            return CommandError::Rollback {
                source: Box::new(source),
                rollback: Box::new(rollback),
            };
        }
    }
    source
}
