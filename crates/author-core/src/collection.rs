//! The ordered block collection of a project and its outline structure.
//!
//! The collection has its own reader/writer lock, coarser than the per-block locks:
//!
//! - structural edits (insert, remove, reorder, outline changes) hold the **write** lock
//! - code that walks the outline (ancestor roll-ups) holds the **read** lock
//!
//! Lock order is always collection first, then at most one block at a time. Never acquire the
//! collection lock while holding a block lock.
//!
//! # Outline
//!
//! A block's parent is the nearest preceding structural block with a smaller outline depth.
//! Non-structural blocks (paragraphs, epigraphs) are always leaves. With the system types this
//! gives `Chapter > Scene > Paragraph`.

use crate::block::{Block, BlockKey};
use crate::block_type::BlockType;
use crate::error::CommandError;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::ops::Deref;
use std::sync::Arc;

/// Ordered blocks of one project. Never empty.
#[derive(Debug)]
pub struct BlockOwnerCollection {
    blocks: RwLock<Vec<Arc<Block>>>,
}

impl BlockOwnerCollection {
    /// Create a collection holding one empty block of `initial_type`.
    pub fn new(initial_type: Arc<BlockType>) -> Self {
        Self {
            blocks: RwLock::new(vec![Block::new(initial_type, "")]),
        }
    }

    /// Acquire the collection read lock.
    pub fn read(&self) -> BlockCollectionReadGuard<'_> {
        BlockCollectionReadGuard {
            blocks: self.blocks.read(),
        }
    }

    /// Acquire the collection write lock.
    pub fn write(&self) -> BlockCollectionWriteGuard<'_> {
        BlockCollectionWriteGuard {
            blocks: self.blocks.write(),
        }
    }

    /// Find a block by key (takes the read lock briefly).
    pub fn get(&self, key: BlockKey) -> Option<Arc<Block>> {
        self.read().get(key).cloned()
    }

    /// Block at `index` (takes the read lock briefly).
    pub fn at(&self, index: usize) -> Option<Arc<Block>> {
        self.read().blocks.get(index).cloned()
    }

    /// Position of the block with `key` (takes the read lock briefly).
    pub fn index_of(&self, key: BlockKey) -> Option<usize> {
        self.read().index_of(key)
    }

    /// The first block. The collection is never empty.
    pub fn first(&self) -> Arc<Block> {
        self.read()[0].clone()
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Keys in document order.
    pub fn keys(&self) -> Vec<BlockKey> {
        self.read().iter().map(|b| b.key()).collect()
    }

    /// Snapshot of the blocks in document order.
    pub fn to_vec(&self) -> Vec<Arc<Block>> {
        self.read().blocks.clone()
    }
}

/// Shared access to the block list.
pub struct BlockCollectionReadGuard<'a> {
    blocks: RwLockReadGuard<'a, Vec<Arc<Block>>>,
}

impl BlockCollectionReadGuard<'_> {
    /// Find a block by key.
    pub fn get(&self, key: BlockKey) -> Option<&Arc<Block>> {
        self.blocks.iter().find(|b| b.key() == key)
    }

    /// Position of the block with `key`.
    pub fn index_of(&self, key: BlockKey) -> Option<usize> {
        self.blocks.iter().position(|b| b.key() == key)
    }
}

impl Deref for BlockCollectionReadGuard<'_> {
    type Target = [Arc<Block>];

    fn deref(&self) -> &Self::Target {
        &self.blocks
    }
}

/// Exclusive access to the block list.
pub struct BlockCollectionWriteGuard<'a> {
    blocks: RwLockWriteGuard<'a, Vec<Arc<Block>>>,
}

impl BlockCollectionWriteGuard<'_> {
    /// Find a block by key.
    pub fn get(&self, key: BlockKey) -> Option<&Arc<Block>> {
        self.blocks.iter().find(|b| b.key() == key)
    }

    /// Find a block by key, failing with [`CommandError::UnknownBlock`].
    pub fn require(&self, key: BlockKey) -> Result<Arc<Block>, CommandError> {
        self.get(key)
            .cloned()
            .ok_or(CommandError::UnknownBlock(key))
    }

    /// Position of the block with `key`.
    pub fn index_of(&self, key: BlockKey) -> Option<usize> {
        self.blocks.iter().position(|b| b.key() == key)
    }

    /// Insert `block` at `index` (which may equal the length).
    pub fn insert(&mut self, index: usize, block: Arc<Block>) -> Result<(), CommandError> {
        if index > self.blocks.len() {
            return Err(CommandError::InvalidBlockIndex {
                index,
                len: self.blocks.len(),
            });
        }
        self.blocks.insert(index, block);
        Ok(())
    }

    /// Remove and return the block at `index`. Refuses to remove the last block.
    pub fn remove(&mut self, index: usize) -> Result<Arc<Block>, CommandError> {
        if index >= self.blocks.len() {
            return Err(CommandError::InvalidBlockIndex {
                index,
                len: self.blocks.len(),
            });
        }
        if self.blocks.len() == 1 {
            return Err(CommandError::LastBlock);
        }
        Ok(self.blocks.remove(index))
    }

    /// Replace every block, returning the previous list.
    ///
    /// Used by loaders: a fresh collection starts with one placeholder block which the loaded
    /// blocks replace. An empty replacement is refused.
    pub fn replace_all(
        &mut self,
        blocks: Vec<Arc<Block>>,
    ) -> Result<Vec<Arc<Block>>, CommandError> {
        if blocks.is_empty() {
            return Err(CommandError::LastBlock);
        }
        Ok(std::mem::replace(&mut *self.blocks, blocks))
    }

    /// Recompute every block's outline parent.
    ///
    /// Changes are applied one block at a time and `on_change(block, old_parent)` is called
    /// right after each one, with no block lock held, so observers can walk and update the
    /// ancestor chain of the new structure.
    pub fn update_structure<F>(&mut self, mut on_change: F)
    where
        F: FnMut(&Arc<Block>, Option<Arc<Block>>),
    {
        // Open structural blocks, outermost first.
        let mut open: Vec<(u8, Arc<Block>)> = Vec::new();

        for block in self.blocks.iter() {
            let depth = block.read().block_type().outline_depth();

            if let Some(depth) = depth {
                while open.last().is_some_and(|(d, _)| *d >= depth) {
                    open.pop();
                }
            }
            let parent = open.last().map(|(_, b)| b.clone());

            let old_parent = {
                let mut state = block.write();
                let old_parent = state.parent();
                let unchanged = match (&old_parent, &parent) {
                    (None, None) => true,
                    (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                    _ => false,
                };
                if unchanged {
                    None
                } else {
                    state.set_parent(parent.as_ref());
                    Some(old_parent)
                }
            };

            if let Some(old_parent) = old_parent {
                on_change(block, old_parent);
            }

            if let Some(depth) = depth {
                open.push((depth, block.clone()));
            }
        }
    }

    /// Clear the parent link of a block that left the collection.
    pub fn detach(&self, block: &Arc<Block>) {
        block.write().set_parent(None);
    }
}

impl Deref for BlockCollectionWriteGuard<'_> {
    type Target = [Arc<Block>];

    fn deref(&self) -> &Self::Target {
        &self.blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_type::BlockTypeSupervisor;

    fn parent_key(block: &Arc<Block>) -> Option<BlockKey> {
        block.read().parent().map(|p| p.key())
    }

    #[test]
    fn test_collection_is_never_empty() {
        let types = BlockTypeSupervisor::new();
        let collection = BlockOwnerCollection::new(types.paragraph());
        assert_eq!(collection.len(), 1);

        let mut guard = collection.write();
        assert!(matches!(guard.remove(0), Err(CommandError::LastBlock)));
        assert!(matches!(guard.replace_all(Vec::new()), Err(CommandError::LastBlock)));
        assert!(matches!(
            guard.insert(3, Block::new(types.paragraph(), "")),
            Err(CommandError::InvalidBlockIndex { index: 3, len: 1 })
        ));
    }

    #[test]
    fn test_first_follows_the_front_block() {
        let types = BlockTypeSupervisor::new();
        let collection = BlockOwnerCollection::new(types.paragraph());
        let initial = collection.first();
        assert_eq!(collection.keys(), vec![initial.key()]);

        let front = Block::new(types.chapter(), "Front");
        collection.write().insert(0, front.clone()).unwrap();
        assert!(Arc::ptr_eq(&collection.first(), &front));
        assert_eq!(collection.at(1).map(|b| b.key()), Some(initial.key()));
    }

    #[test]
    fn test_outline_parents_follow_structural_depth() {
        let types = BlockTypeSupervisor::new();
        let collection = BlockOwnerCollection::new(types.paragraph());
        let chapter = Block::new(types.chapter(), "Chapter 1");
        let scene = Block::new(types.scene(), "Scene 1");
        let para = Block::new(types.paragraph(), "Text");
        let chapter2 = Block::new(types.chapter(), "Chapter 2");
        let para2 = Block::new(types.paragraph(), "More");

        let mut changes = Vec::new();
        {
            let mut guard = collection.write();
            guard
                .replace_all(vec![
                    chapter.clone(),
                    scene.clone(),
                    para.clone(),
                    chapter2.clone(),
                    para2.clone(),
                ])
                .unwrap();
            guard.update_structure(|block, old| changes.push((block.key(), old.map(|b| b.key()))));
        }

        assert_eq!(parent_key(&chapter), None);
        assert_eq!(parent_key(&scene), Some(chapter.key()));
        assert_eq!(parent_key(&para), Some(scene.key()));
        assert_eq!(parent_key(&chapter2), None);
        assert_eq!(parent_key(&para2), Some(chapter2.key()));
        assert_eq!(changes.len(), 3);

        let ancestors: Vec<BlockKey> = para.ancestors().iter().map(|b| b.key()).collect();
        assert_eq!(ancestors, vec![scene.key(), chapter.key()]);

        // Nothing changes on a second pass.
        let mut again = 0;
        collection.write().update_structure(|_, _| again += 1);
        assert_eq!(again, 0);
    }
}
