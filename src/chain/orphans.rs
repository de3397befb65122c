//! Orphan block buffer
//!
//! Blocks whose parent is unknown wait here, indexed by the parent they need.

use std::collections::HashMap;

use crate::consensus::Block;
use crate::crypto::Hash;

#[derive(Debug, Default)]
pub(crate) struct OrphanBuffer {
    blocks: HashMap<Hash, Block>,
    by_parent: HashMap<Hash, Vec<Hash>>,
}

impl OrphanBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer a block; returns false if it was already buffered
    pub fn insert(&mut self, hash: Hash, block: Block) -> bool {
        if self.blocks.contains_key(&hash) {
            return false;
        }
        self.by_parent.entry(block.header.prev_hash).or_default().push(hash);
        self.blocks.insert(hash, block);
        true
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.blocks.contains_key(hash)
    }

    /// Remove and return the buffered children of `parent`, in arrival order
    pub fn take_children(&mut self, parent: &Hash) -> Vec<Block> {
        self.by_parent
            .remove(parent)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|hash| self.blocks.remove(&hash))
            .collect()
    }

    /// Drop every buffered descendant of `parent`; returns how many went
    pub fn remove_descendants(&mut self, parent: &Hash) -> usize {
        let mut removed = 0;
        let mut pending = vec![*parent];

        while let Some(hash) = pending.pop() {
            for child in self.take_children(&hash) {
                pending.push(child.hash());
                removed += 1;
            }
        }

        removed
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Earliest buffered ancestor of `hash`
    ///
    /// Its parent is the block that has to arrive before any of the chain
    /// can connect. Returns None when `hash` is not buffered.
    pub fn orphan_root(&self, hash: &Hash) -> Option<&Block> {
        let mut cursor = self.blocks.get(hash)?;
        while let Some(parent) = self.blocks.get(&cursor.header.prev_hash) {
            cursor = parent;
        }
        Some(cursor)
    }
}
