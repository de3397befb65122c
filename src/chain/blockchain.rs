//! Block acceptance
//!
//! `BlockChain::add` decides whether a block extends the best chain. Header
//! checks come first, then duplicates and unknown parents are filtered out,
//! then the block is checked against its parent and committed. Any buffered
//! orphans that were waiting for it are connected afterwards.
//!
//! Everything mutable sits behind one mutex, so `add` calls are serialised
//! and a failing call leaves the chain exactly as it found it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::futures::{HeightFuture, HeightFutures};
use super::listener::{any_relevant, dispatch, ChainObserver, NewBlockType};
use super::orphans::OrphanBuffer;
use crate::constants::ESTIMATED_BLOCK_SPACING_SECS;
use crate::consensus::{
    check_structure, compute_next_target, encode_compact_bits, should_adjust_difficulty,
    verify_difficulty_bits, verify_header, verify_merkle_root, Block, BlockHeader, NetworkParams,
    VerificationError,
};
use crate::crypto::Hash;
use crate::storage::{BlockStore, StoreError, StoredBlock};

/// Errors returned by the chain
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("block verification failed: {0}")]
    Verification(#[from] VerificationError),
    #[error("block store error: {0}")]
    Store(#[from] StoreError),
    #[error("chain was dropped before the height was reached")]
    Cancelled,
}

/// The best chain as seen by a light client
pub struct BlockChain<S: BlockStore> {
    params: Arc<NetworkParams>,
    state: Mutex<ChainState<S>>,
}

struct ChainState<S> {
    store: S,
    orphans: OrphanBuffer,
    futures: HeightFutures,
    observers: Vec<Arc<dyn ChainObserver>>,
}

impl<S: BlockStore> BlockChain<S> {
    /// Create a chain over a store that already holds at least the genesis block
    pub fn new(params: Arc<NetworkParams>, store: S) -> Self {
        Self {
            params,
            state: Mutex::new(ChainState {
                store,
                orphans: OrphanBuffer::new(),
                futures: HeightFutures::new(),
                observers: Vec::new(),
            }),
        }
    }

    /// Create a chain with one observer already registered
    pub fn with_wallet(params: Arc<NetworkParams>, wallet: Arc<dyn ChainObserver>, store: S) -> Self {
        let chain = Self::new(params, store);
        chain.add_wallet(wallet);
        chain
    }

    /// Register an observer; it sees blocks accepted from now on
    pub fn add_wallet(&self, observer: Arc<dyn ChainObserver>) {
        self.lock().observers.push(observer);
    }

    pub fn params(&self) -> &NetworkParams {
        &self.params
    }

    /// Process a block received from the network or a miner
    ///
    /// Returns true when the chain head advanced, either to this block or to
    /// an orphan it allowed to connect. Orphans, duplicates and side-chain
    /// blocks return false. Invalid blocks return an error and change nothing.
    pub fn add(&self, block: Block) -> Result<bool, ChainError> {
        let hash = block.hash();
        let result = self.try_add(block, hash);
        if let Err(err) = &result {
            warn!(%hash, error = %err, "rejected block");
        }
        result
    }

    fn try_add(&self, block: Block, hash: Hash) -> Result<bool, ChainError> {
        check_structure(&block, &hash)?;
        verify_header(&self.params, &block.header)?;

        let mut state = self.lock();

        if state.store.get(&hash)?.is_some() || state.orphans.contains(&hash) {
            debug!(%hash, "already have block");
            return Ok(false);
        }

        let Some(parent) = state.store.get(block.prev_hash())? else {
            debug!(%hash, prev = %block.header.prev_hash, "block does not connect, buffering as orphan");
            state.orphans.insert(hash, block);
            return Ok(false);
        };

        let previous_height = state.store.chain_head()?.height;

        state.connect(&self.params, &block, &parent)?;
        state.connect_orphans(&self.params, hash)?;

        Ok(state.store.chain_head()?.height > previous_height)
    }

    pub fn chain_head(&self) -> Result<StoredBlock, ChainError> {
        Ok(self.lock().store.chain_head()?)
    }

    pub fn best_chain_height(&self) -> Result<u64, ChainError> {
        Ok(self.chain_head()?.height)
    }

    pub fn get_block(&self, hash: &Hash) -> Result<Option<StoredBlock>, ChainError> {
        Ok(self.lock().store.get(hash)?)
    }

    pub fn orphan_count(&self) -> usize {
        self.lock().orphans.len()
    }

    pub fn is_orphan(&self, hash: &Hash) -> bool {
        self.lock().orphans.contains(hash)
    }

    /// The earliest buffered ancestor of an orphan
    ///
    /// Its parent is the block to request from peers next.
    pub fn get_orphan_root(&self, hash: &Hash) -> Option<Block> {
        self.lock().orphans.orphan_root(hash).cloned()
    }

    /// Future that completes once the chain head reaches `height`
    pub fn get_height_future(&self, height: u64) -> Result<HeightFuture, ChainError> {
        let mut state = self.lock();
        let head = state.store.chain_head()?;
        Ok(state.futures.register(height, &head))
    }

    /// Rough timestamp at which the chain will reach `height`
    pub fn estimate_block_time(&self, height: u64) -> Result<u64, ChainError> {
        let head = self.chain_head()?;
        let blocks = i128::from(height) - i128::from(head.height);
        let estimate = i128::from(head.header.timestamp) + blocks * i128::from(ESTIMATED_BLOCK_SPACING_SECS);
        Ok(u64::try_from(estimate.max(0)).unwrap_or(u64::MAX))
    }

    /// Compact target the block after the current head must carry
    pub fn next_difficulty_target(&self) -> Result<u32, ChainError> {
        let state = self.lock();
        let head = state.store.chain_head()?;

        if !should_adjust_difficulty(head.height + 1, self.params.interval) {
            return Ok(head.header.difficulty_target);
        }

        let first = state.retarget_window_start(&self.params, &head)?;
        let next = compute_next_target(&self.params, &first.header, &head.header);
        Ok(encode_compact_bits(&next))
    }

    fn lock(&self) -> MutexGuard<'_, ChainState<S>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<S: BlockStore> ChainState<S> {
    /// Verify a block against its known parent and store it
    ///
    /// Nothing is written until every check has passed.
    fn connect(
        &mut self,
        params: &NetworkParams,
        block: &Block,
        parent: &StoredBlock,
    ) -> Result<(), ChainError> {
        self.check_difficulty_transition(params, parent, &block.header)?;

        // Only blocks carrying something we care about need consistent contents.
        if any_relevant(&self.observers, &block.transactions) {
            verify_merkle_root(block)?;
        }

        let stored = parent.build(block.header.clone());
        let head = self.store.chain_head()?;
        self.store.put(stored.clone())?;

        if stored.height <= head.height {
            debug!(hash = %stored.hash(), height = stored.height, "stored side chain block");
            return Ok(());
        }

        if stored.header.prev_hash != head.hash() {
            warn!(
                hash = %stored.hash(),
                old_head = %head.hash(),
                "new best block does not extend the old head"
            );
        }

        self.store.set_chain_head(&stored)?;
        info!(hash = %stored.hash(), height = stored.height, "new chain head");

        self.futures.resolve(&stored);
        dispatch(&self.observers, &block.transactions, &stored, NewBlockType::BestChain);

        Ok(())
    }

    /// Connect every buffered descendant of a block that was just committed
    fn connect_orphans(&mut self, params: &NetworkParams, committed: Hash) -> Result<(), ChainError> {
        let mut queue = VecDeque::from([committed]);

        while let Some(parent_hash) = queue.pop_front() {
            let children = self.orphans.take_children(&parent_hash);
            if children.is_empty() {
                continue;
            }

            let Some(parent) = self.store.get(&parent_hash)? else {
                continue;
            };

            for orphan in children {
                let hash = orphan.hash();
                match self.connect(params, &orphan, &parent) {
                    Ok(()) => {
                        debug!(%hash, "connected orphan block");
                        queue.push_back(hash);
                    }
                    Err(ChainError::Verification(err)) => {
                        // Descendants of a rejected block can never connect.
                        let descendants = self.orphans.remove_descendants(&hash);
                        warn!(%hash, descendants, error = %err, "dropping invalid orphan block");
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        Ok(())
    }

    fn check_difficulty_transition(
        &self,
        params: &NetworkParams,
        parent: &StoredBlock,
        next: &BlockHeader,
    ) -> Result<(), ChainError> {
        let height = parent.height + 1;

        if !should_adjust_difficulty(height, params.interval) {
            if next.difficulty_target != parent.header.difficulty_target {
                return Err(VerificationError::DifficultyTransition(format!(
                    "Unexpected change in difficulty at height {height}: {:x} vs {:x}",
                    next.difficulty_target, parent.header.difficulty_target
                ))
                .into());
            }
            return Ok(());
        }

        let first = self.retarget_window_start(params, parent)?;
        let calculated = compute_next_target(params, &first.header, &parent.header);
        verify_difficulty_bits(&calculated, next.difficulty_target)?;

        info!(
            height,
            bits = %format!("{:08x}", next.difficulty_target),
            "difficulty transition"
        );
        Ok(())
    }

    /// First block of the retarget window that ends at `last`
    ///
    /// The first retarget measures from genesis, `interval - 1` blocks back.
    /// Later windows reach one block further, onto the last block of the
    /// previous window, so every retarget spans a full `interval` of time.
    fn retarget_window_start(
        &self,
        params: &NetworkParams,
        last: &StoredBlock,
    ) -> Result<StoredBlock, ChainError> {
        let blocks_back = if last.height + 1 == params.interval {
            params.interval - 1
        } else {
            params.interval
        };

        let mut cursor = last.clone();
        for _ in 0..blocks_back {
            cursor = self.store.get(&cursor.header.prev_hash)?.ok_or_else(|| {
                VerificationError::DifficultyTransition(
                    "Difficulty transition point but we did not find a way back to the genesis block"
                        .to_string(),
                )
            })?;
        }

        Ok(cursor)
    }
}
