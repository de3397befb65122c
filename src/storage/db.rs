//! Database persistence layer using Sled
//!
//! Stored blocks live in the `blocks` tree keyed by hash; the chain head hash
//! lives in the `metadata` tree.

use sled::{Db, Tree};
use std::path::Path;

use crate::consensus::NetworkParams;
use crate::crypto::Hash;
use crate::storage::{BlockStore, StoreError, StoredBlock};

const TIP_KEY: &str = "tip_hash";

/// Block store backed by a sled database
#[derive(Debug, Clone)]
pub struct SledBlockStore {
    db: Db,
    blocks_tree: Tree,
    metadata_tree: Tree,
}

impl SledBlockStore {
    /// Open or create the database
    ///
    /// A fresh database is seeded with the network's genesis block.
    pub fn open<P: AsRef<Path>>(path: P, params: &NetworkParams) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        let blocks_tree = db.open_tree("blocks")?;
        let metadata_tree = db.open_tree("metadata")?;

        let mut store = Self {
            db,
            blocks_tree,
            metadata_tree,
        };

        if store.metadata_tree.get(TIP_KEY)?.is_none() {
            let genesis = StoredBlock::genesis(params);
            store.put(genesis.clone())?;
            store.set_chain_head(&genesis)?;
            tracing::debug!(genesis = %genesis.hash(), "initialised new block store");
        }

        Ok(store)
    }

    fn load_tip(&self) -> Result<Hash, StoreError> {
        let bytes = self
            .metadata_tree
            .get(TIP_KEY)?
            .ok_or(StoreError::MissingChainHead)?;

        let hash: [u8; 32] = bytes
            .as_ref()
            .try_into()
            .map_err(|_| StoreError::Corrupt(format!("tip hash has {} bytes", bytes.len())))?;

        Ok(Hash(hash))
    }
}

impl BlockStore for SledBlockStore {
    fn put(&mut self, block: StoredBlock) -> Result<(), StoreError> {
        let key = block.hash().0;
        let value = bincode::serialize(&block)?;
        self.blocks_tree.insert(key, value)?;
        self.db.flush()?;
        Ok(())
    }

    fn get(&self, hash: &Hash) -> Result<Option<StoredBlock>, StoreError> {
        match self.blocks_tree.get(hash.0)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn chain_head(&self) -> Result<StoredBlock, StoreError> {
        let tip = self.load_tip()?;
        self.get(&tip)?.ok_or(StoreError::MissingChainHead)
    }

    fn set_chain_head(&mut self, block: &StoredBlock) -> Result<(), StoreError> {
        self.metadata_tree.insert(TIP_KEY, block.hash().0.as_ref())?;
        self.db.flush()?;
        Ok(())
    }
}
