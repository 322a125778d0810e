//! Collection-scoped commands that change which blocks exist, their order or their type.

use super::composite::{CompositeCommand, roll_back};
use super::{BlockCommand, BlockCommandContext, CommandTarget, InsertText, LockScope};
use crate::block::{Block, BlockKey, BlockPosition};
use crate::block_type::BlockType;
use crate::error::CommandError;
use std::sync::Arc;

/// Insert a new block at a collection index.
#[derive(Debug)]
pub struct InsertBlock {
    index: usize,
    block: Arc<Block>,
}

impl InsertBlock {
    /// Create the block now; it joins the collection when the command runs.
    pub fn new(index: usize, block_type: Arc<BlockType>, text: impl Into<String>) -> Self {
        Self {
            index,
            block: Block::new(block_type, text),
        }
    }

    /// Key of the block this command inserts.
    pub fn block_key(&self) -> BlockKey {
        self.block.key()
    }
}

impl BlockCommand for InsertBlock {
    fn lock_scope(&self) -> LockScope {
        LockScope::Collection
    }

    fn do_command(
        &mut self,
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
    ) -> Result<(), CommandError> {
        let guard = target.collection()?;
        guard.insert(self.index, self.block.clone())?;
        self.block.write().touch();
        context.block_inserted(&self.block);
        context.set_position(BlockPosition::new(self.block.key(), 0));
        Ok(())
    }

    fn undo_command(
        &mut self,
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
    ) -> Result<(), CommandError> {
        let guard = target.collection()?;
        let key = self.block.key();
        let index = guard.index_of(key).ok_or(CommandError::UnknownBlock(key))?;
        let block = guard.remove(index)?;
        block.write().touch();
        context.block_removed(&block);
        context.set_position(neighbour_position(guard, index));
        Ok(())
    }
}

/// Remove a block from the collection.
#[derive(Debug)]
pub struct DeleteBlock {
    block_key: BlockKey,
    removed: Option<(usize, Arc<Block>)>,
}

impl DeleteBlock {
    /// Remove the block `block_key`.
    pub fn new(block_key: BlockKey) -> Self {
        Self {
            block_key,
            removed: None,
        }
    }
}

impl BlockCommand for DeleteBlock {
    fn lock_scope(&self) -> LockScope {
        LockScope::Collection
    }

    fn do_command(
        &mut self,
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
    ) -> Result<(), CommandError> {
        let guard = target.collection()?;
        let key = self.block_key;
        let index = guard.index_of(key).ok_or(CommandError::UnknownBlock(key))?;
        let block = guard.remove(index)?;
        block.write().touch();
        context.block_removed(&block);
        context.set_position(neighbour_position(guard, index));
        self.removed = Some((index, block));
        Ok(())
    }

    fn undo_command(
        &mut self,
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
    ) -> Result<(), CommandError> {
        let Some((index, block)) = self.removed.clone() else {
            return Ok(());
        };
        let guard = target.collection()?;
        guard.insert(index, block.clone())?;
        block.write().touch();
        context.block_inserted(&block);
        context.set_position(BlockPosition::new(block.key(), 0));
        Ok(())
    }
}

/// Cursor at the start of the block now at `index`, or at the end of the last block.
fn neighbour_position(blocks: &[Arc<Block>], index: usize) -> BlockPosition {
    match blocks.get(index) {
        Some(block) => BlockPosition::new(block.key(), 0),
        None => {
            let last = &blocks[blocks.len() - 1];
            BlockPosition::new(last.key(), last.read().char_len())
        }
    }
}

/// Change the type of a block.
///
/// Runs under the collection lock because the outline structure may change with it.
#[derive(Debug)]
pub struct ChangeBlockType {
    block_key: BlockKey,
    new_type: Arc<BlockType>,
    old_type: Option<Arc<BlockType>>,
}

impl ChangeBlockType {
    /// Change `block_key` to `new_type`.
    pub fn new(block_key: BlockKey, new_type: Arc<BlockType>) -> Self {
        Self {
            block_key,
            new_type,
            old_type: None,
        }
    }

    fn set(
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
        key: BlockKey,
        block_type: Arc<BlockType>,
    ) -> Result<Arc<BlockType>, CommandError> {
        target.collection()?;
        target.with_block(key, |block, state| {
            let previous = state.set_block_type(block_type);
            context.block_type_changed(block, previous.clone());
            Ok(previous)
        })
    }
}

impl BlockCommand for ChangeBlockType {
    fn lock_scope(&self) -> LockScope {
        LockScope::Collection
    }

    fn do_command(
        &mut self,
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
    ) -> Result<(), CommandError> {
        let previous = Self::set(target, context, self.block_key, self.new_type.clone())?;
        self.old_type = Some(previous);
        context.set_position(BlockPosition::new(self.block_key, 0));
        Ok(())
    }

    fn undo_command(
        &mut self,
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
    ) -> Result<(), CommandError> {
        let Some(old_type) = self.old_type.clone() else {
            return Ok(());
        };
        Self::set(target, context, self.block_key, old_type)?;
        context.set_position(BlockPosition::new(self.block_key, 0));
        Ok(())
    }
}

/// Split a block at a position, moving the tail into a new block after it.
///
/// The new block keeps the source type, except that splitting a structural block (a chapter
/// heading) continues with a paragraph.
#[derive(Debug)]
pub struct SplitBlock {
    position: BlockPosition,
    created: Option<Arc<Block>>,
}

impl SplitBlock {
    /// Split at `position`.
    pub fn new(position: BlockPosition) -> Self {
        Self {
            position,
            created: None,
        }
    }

    /// Key of the block created by the split, once it ran.
    pub fn created_key(&self) -> Option<BlockKey> {
        self.created.as_ref().map(|b| b.key())
    }
}

impl BlockCommand for SplitBlock {
    fn lock_scope(&self) -> LockScope {
        LockScope::Collection
    }

    fn do_command(
        &mut self,
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
    ) -> Result<(), CommandError> {
        let BlockPosition {
            block_key: key,
            text_index: split_at,
        } = self.position;
        let guard = target.collection()?;
        let index = guard.index_of(key).ok_or(CommandError::UnknownBlock(key))?;
        let source = guard.require(key)?;

        let (tail, source_type) = {
            let mut state = source.write();
            let len = state.char_len();
            let tail = state.delete_text(key, split_at..len)?;
            (tail, state.block_type().clone())
        };
        context.block_changed(&source);

        let created = match &self.created {
            Some(block) => {
                block.write().set_text(tail);
                block.clone()
            }
            None => {
                let block_type = if source_type.is_structural() {
                    context.project().block_types().paragraph()
                } else {
                    source_type
                };
                Block::new(block_type, tail)
            }
        };

        guard.insert(index + 1, created.clone())?;
        created.write().touch();
        context.block_inserted(&created);
        context.set_position(BlockPosition::new(created.key(), 0));
        self.created = Some(created);
        Ok(())
    }

    fn undo_command(
        &mut self,
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
    ) -> Result<(), CommandError> {
        let Some(created) = self.created.clone() else {
            return Ok(());
        };
        let key = self.position.block_key;
        let guard = target.collection()?;
        let source = guard.require(key)?;
        let index = guard
            .index_of(created.key())
            .ok_or(CommandError::UnknownBlock(created.key()))?;

        let tail = created.text();
        source
            .write()
            .insert_text(key, self.position.text_index, &tail)?;
        context.block_changed(&source);

        let removed = guard.remove(index)?;
        removed.write().touch();
        context.block_removed(&removed);
        context.set_position(self.position);
        Ok(())
    }
}

/// Insert text that may contain line breaks, splitting blocks at each break.
///
/// The first execution builds the equivalent list of [`InsertText`] and [`SplitBlock`]
/// commands; undo and redo replay that list.
#[derive(Debug)]
pub struct InsertMultilineText {
    position: BlockPosition,
    text: String,
    commands: Option<CompositeCommand>,
}

impl InsertMultilineText {
    /// Insert `text` at `position`.
    pub fn new(position: BlockPosition, text: impl Into<String>) -> Self {
        Self {
            position,
            text: text.into(),
            commands: None,
        }
    }

    fn build(
        &self,
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
        applied: &mut Vec<Box<dyn BlockCommand>>,
    ) -> Result<(), CommandError> {
        let mut position = self.position;
        for (line_number, line) in self.text.split('\n').enumerate() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line_number > 0 {
                let mut split = SplitBlock::new(position);
                split.do_command(target, context)?;
                let created = split.created_key();
                applied.push(Box::new(split));
                match created {
                    Some(key) => position = BlockPosition::new(key, 0),
                    None => return Err(CommandError::UnknownBlock(position.block_key)),
                }
            }
            if !line.is_empty() {
                let mut insert = InsertText::new(position, line);
                insert.do_command(target, context)?;
                applied.push(Box::new(insert));
                position.text_index += line.chars().count();
            }
        }
        context.set_position(position);
        Ok(())
    }
}

impl BlockCommand for InsertMultilineText {
    fn lock_scope(&self) -> LockScope {
        LockScope::Collection
    }

    fn do_command(
        &mut self,
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
    ) -> Result<(), CommandError> {
        if let Some(commands) = self.commands.as_mut() {
            return commands.redo_command(target, context);
        }
        let mut applied = Vec::new();
        if let Err(err) = self.build(target, context, &mut applied) {
            return Err(roll_back(&mut applied, target, context, err));
        }
        self.commands = Some(CompositeCommand::from(applied));
        Ok(())
    }

    fn undo_command(
        &mut self,
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
    ) -> Result<(), CommandError> {
        match self.commands.as_mut() {
            Some(commands) => {
                commands.undo_command(target, context)?;
                context.set_position(self.position);
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn redo_command(
        &mut self,
        target: &mut CommandTarget<'_, '_>,
        context: &mut BlockCommandContext,
    ) -> Result<(), CommandError> {
        self.do_command(target, context)
    }
}
