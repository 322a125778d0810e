//! Block-scoped text edits.

use super::{BlockCommand, BlockCommandContext, CommandTarget, DoTypes, LockScope, Operation};
use crate::block::{BlockKey, BlockPosition};
use crate::error::CommandError;
use std::ops::Range;

/// Insert text at a position.
#[derive(Debug, Clone)]
pub struct InsertText {
    position: BlockPosition,
    text: String,
    update_text_position: DoTypes,
}

impl InsertText {
    /// Insert `text` at `position`; the cursor ends after the inserted text.
    pub fn new(position: BlockPosition, text: impl Into<String>) -> Self {
        Self {
            position,
            text: text.into(),
            update_text_position: DoTypes::all(),
        }
    }

    /// Restrict the operations that move the cursor.
    pub fn with_text_position_updates(mut self, update: DoTypes) -> Self {
        self.update_text_position = update;
        self
    }

    fn insert(
        &self,
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
        operation: Operation,
    ) -> Result<(), CommandError> {
        let BlockPosition {
            block_key: key,
            text_index: index,
        } = self.position;
        let inserted = self.text.chars().count();
        target.with_block(key, |block, state| {
            state.insert_text(key, index, &self.text)?;
            context.block_changed(block);
            Ok(())
        })?;
        context.update_position(
            self.update_text_position,
            operation,
            BlockPosition::new(key, index + inserted),
            index,
            0,
            inserted,
        );
        Ok(())
    }
}

impl BlockCommand for InsertText {
    fn lock_scope(&self) -> LockScope {
        LockScope::Block(self.position.block_key)
    }

    fn triggers_immediate_edits(&self) -> bool {
        true
    }

    fn do_command(
        &mut self,
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
    ) -> Result<(), CommandError> {
        self.insert(target, context, Operation::Do)
    }

    fn undo_command(
        &mut self,
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
    ) -> Result<(), CommandError> {
        let BlockPosition {
            block_key: key,
            text_index: index,
        } = self.position;
        let inserted = self.text.chars().count();
        target.with_block(key, |block, state| {
            state.delete_text(key, index..index + inserted)?;
            context.block_changed(block);
            Ok(())
        })?;
        context.update_position(
            self.update_text_position,
            Operation::Undo,
            self.position,
            index,
            inserted,
            0,
        );
        Ok(())
    }

    fn redo_command(
        &mut self,
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
    ) -> Result<(), CommandError> {
        self.insert(target, context, Operation::Redo)
    }
}

/// Delete a character range of one block.
#[derive(Debug, Clone)]
pub struct DeleteText {
    block_key: BlockKey,
    range: Range<usize>,
    removed: Option<String>,
}

impl DeleteText {
    /// Delete `range` (character indices) from the block `block_key`.
    pub fn new(block_key: BlockKey, range: Range<usize>) -> Self {
        Self {
            block_key,
            range,
            removed: None,
        }
    }
}

impl BlockCommand for DeleteText {
    fn lock_scope(&self) -> LockScope {
        LockScope::Block(self.block_key)
    }

    fn do_command(
        &mut self,
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
    ) -> Result<(), CommandError> {
        let key = self.block_key;
        let range = self.range.clone();
        let removed = target.with_block(key, |block, state| {
            let removed = state.delete_text(key, range.clone())?;
            context.block_changed(block);
            Ok(removed)
        })?;
        self.removed = Some(removed);
        context.set_position(BlockPosition::new(key, range.start));
        Ok(())
    }

    fn undo_command(
        &mut self,
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
    ) -> Result<(), CommandError> {
        let key = self.block_key;
        let Some(removed) = self.removed.as_deref() else {
            return Ok(());
        };
        let start = self.range.start;
        target.with_block(key, |block, state| {
            state.insert_text(key, start, removed)?;
            context.block_changed(block);
            Ok(())
        })?;
        context.set_position(BlockPosition::new(key, start + removed.chars().count()));
        Ok(())
    }
}

/// Replace a character range of one block with new text.
#[derive(Debug, Clone)]
pub struct ReplaceText {
    block_key: BlockKey,
    range: Range<usize>,
    text: String,
    removed: Option<String>,
    update_text_position: DoTypes,
}

impl ReplaceText {
    /// Replace `range` in `block_key` with `text`; the cursor ends after the new text.
    pub fn new(block_key: BlockKey, range: Range<usize>, text: impl Into<String>) -> Self {
        Self {
            block_key,
            range,
            text: text.into(),
            removed: None,
            update_text_position: DoTypes::all(),
        }
    }

    /// Restrict the operations that move the cursor.
    pub fn with_text_position_updates(mut self, update: DoTypes) -> Self {
        self.update_text_position = update;
        self
    }

    fn replace(
        &mut self,
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
        operation: Operation,
    ) -> Result<(), CommandError> {
        let key = self.block_key;
        let range = self.range.clone();
        let text = self.text.as_str();
        let removed = target.with_block(key, |block, state| {
            let removed = state.replace_text(key, range.clone(), text)?;
            context.block_changed(block);
            Ok(removed)
        })?;
        let inserted = self.text.chars().count();
        context.update_position(
            self.update_text_position,
            operation,
            BlockPosition::new(key, range.start + inserted),
            range.start,
            range.len(),
            inserted,
        );
        self.removed = Some(removed);
        Ok(())
    }
}

impl BlockCommand for ReplaceText {
    fn lock_scope(&self) -> LockScope {
        LockScope::Block(self.block_key)
    }

    fn do_command(
        &mut self,
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
    ) -> Result<(), CommandError> {
        self.replace(target, context, Operation::Do)
    }

    fn undo_command(
        &mut self,
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
    ) -> Result<(), CommandError> {
        let key = self.block_key;
        let Some(removed) = self.removed.as_deref() else {
            return Ok(());
        };
        let start = self.range.start;
        let inserted = self.text.chars().count();
        let restored = removed.chars().count();
        target.with_block(key, |block, state| {
            state.replace_text(key, start..start + inserted, removed)?;
            context.block_changed(block);
            Ok(())
        })?;
        context.update_position(
            self.update_text_position,
            Operation::Undo,
            BlockPosition::new(key, start + restored),
            start,
            inserted,
            restored,
        );
        Ok(())
    }

    fn redo_command(
        &mut self,
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
    ) -> Result<(), CommandError> {
        self.replace(target, context, Operation::Redo)
    }
}

/// Replace the whole text of a block.
#[derive(Debug, Clone)]
pub struct SetText {
    block_key: BlockKey,
    text: String,
    previous: Option<String>,
}

impl SetText {
    /// Set the text of `block_key` to `text`.
    pub fn new(block_key: BlockKey, text: impl Into<String>) -> Self {
        Self {
            block_key,
            text: text.into(),
            previous: None,
        }
    }
}

impl BlockCommand for SetText {
    fn lock_scope(&self) -> LockScope {
        LockScope::Block(self.block_key)
    }

    fn do_command(
        &mut self,
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
    ) -> Result<(), CommandError> {
        let key = self.block_key;
        let text = self.text.clone();
        let previous = target.with_block(key, |block, state| {
            let previous = state.set_text(text);
            context.block_changed(block);
            Ok(previous)
        })?;
        self.previous = Some(previous);
        context.set_position(BlockPosition::new(key, self.text.chars().count()));
        Ok(())
    }

    fn undo_command(
        &mut self,
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
    ) -> Result<(), CommandError> {
        let key = self.block_key;
        let Some(previous) = self.previous.clone() else {
            return Ok(());
        };
        let len = previous.chars().count();
        target.with_block(key, |block, state| {
            state.set_text(previous);
            context.block_changed(block);
            Ok(())
        })?;
        context.set_position(BlockPosition::new(key, len));
        Ok(())
    }
}
