//! Block store
//!
//! Headers are kept together with their height and the total work of the chain
//! ending at them. The store also holds the single chain head pointer.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::consensus::{work_from_target, BlockHeader, NetworkParams};
use crate::crypto::Hash;

/// Storage failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sled(#[from] sled::Error),
    #[error("encoding error: {0}")]
    Codec(#[from] bincode::Error),
    #[error("chain head is not in the store")]
    MissingChainHead,
    #[error("corrupt store: {0}")]
    Corrupt(String),
}

/// A header placed in the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredBlock {
    pub header: BlockHeader,
    /// Distance from genesis, which has height 0
    pub height: u64,
    /// Sum of the work of every block from genesis up to and including this one
    pub chain_work: BigUint,
}

impl StoredBlock {
    /// The stored form of a network's genesis block
    pub fn genesis(params: &NetworkParams) -> Self {
        let header = params.genesis_block.header.clone();
        let chain_work = work_from_target(&header.target());
        Self {
            header,
            height: 0,
            chain_work,
        }
    }

    /// Derive the stored form of a child header
    pub fn build(&self, header: BlockHeader) -> StoredBlock {
        let chain_work = &self.chain_work + work_from_target(&header.target());
        StoredBlock {
            header,
            height: self.height + 1,
            chain_work,
        }
    }

    pub fn hash(&self) -> Hash {
        self.header.hash()
    }
}

/// Persistence of stored blocks and the chain head
///
/// Implementations must already contain the genesis block, with the head
/// pointing at it, when handed to a chain.
pub trait BlockStore: Send {
    fn put(&mut self, block: StoredBlock) -> Result<(), StoreError>;

    fn get(&self, hash: &Hash) -> Result<Option<StoredBlock>, StoreError>;

    fn chain_head(&self) -> Result<StoredBlock, StoreError>;

    fn set_chain_head(&mut self, block: &StoredBlock) -> Result<(), StoreError>;
}

impl<S: BlockStore + ?Sized> BlockStore for Box<S> {
    fn put(&mut self, block: StoredBlock) -> Result<(), StoreError> {
        (**self).put(block)
    }

    fn get(&self, hash: &Hash) -> Result<Option<StoredBlock>, StoreError> {
        (**self).get(hash)
    }

    fn chain_head(&self) -> Result<StoredBlock, StoreError> {
        (**self).chain_head()
    }

    fn set_chain_head(&mut self, block: &StoredBlock) -> Result<(), StoreError> {
        (**self).set_chain_head(block)
    }
}

/// Block store held entirely in memory
#[derive(Debug)]
pub struct MemoryBlockStore {
    blocks: HashMap<Hash, StoredBlock>,
    head: Hash,
}

impl MemoryBlockStore {
    /// Create a store holding only the genesis block
    pub fn new(params: &NetworkParams) -> Self {
        let genesis = StoredBlock::genesis(params);
        let head = genesis.hash();
        let mut blocks = HashMap::new();
        blocks.insert(head, genesis);
        Self { blocks, head }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl BlockStore for MemoryBlockStore {
    fn put(&mut self, block: StoredBlock) -> Result<(), StoreError> {
        self.blocks.insert(block.hash(), block);
        Ok(())
    }

    fn get(&self, hash: &Hash) -> Result<Option<StoredBlock>, StoreError> {
        Ok(self.blocks.get(hash).cloned())
    }

    fn chain_head(&self) -> Result<StoredBlock, StoreError> {
        self.blocks
            .get(&self.head)
            .cloned()
            .ok_or(StoreError::MissingChainHead)
    }

    fn set_chain_head(&mut self, block: &StoredBlock) -> Result<(), StoreError> {
        self.head = block.hash();
        Ok(())
    }
}
