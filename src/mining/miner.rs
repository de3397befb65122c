//! Block miner implementation
//!
//! Assembles candidate blocks on top of a parent and performs PoW.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use num_traits::Zero;

use crate::consensus::{block_subsidy, Block, BlockHeader, NetworkParams};
use crate::crypto::{Hash, PubKeyHash};
use crate::validation::Transaction;

/// Mining result
#[derive(Debug)]
pub enum MiningResult {
    /// Successfully mined a block
    Success(Block),
    /// Mining was interrupted
    Interrupted,
    /// The block's target cannot be met by any hash
    NoWork,
}

/// Block miner
#[derive(Debug, Clone)]
pub struct Miner {
    /// Receiver of the coinbase output
    coinbase_to: PubKeyHash,
    /// Stop signal
    stop_signal: Arc<AtomicBool>,
}

impl Miner {
    /// Create a new miner
    pub fn new(coinbase_to: PubKeyHash) -> Self {
        Self {
            coinbase_to,
            stop_signal: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get a stop signal handle
    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop_signal)
    }

    /// Stop mining
    pub fn stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Reset stop signal
    pub fn reset(&self) {
        self.stop_signal.store(false, Ordering::SeqCst);
    }

    /// Assemble an unsolved block at `height` on top of `parent`
    ///
    /// The coinbase claims the subsidy for `height` and carries the height in
    /// its script so that every coinbase hash is unique.
    pub fn assemble_block(
        &self,
        params: &NetworkParams,
        parent: &BlockHeader,
        height: u64,
        timestamp: u64,
        difficulty_target: u32,
        transactions: Vec<Transaction>,
    ) -> Block {
        let reward = block_subsidy(height, params.subsidy_decrease_block_count);
        let coinbase = Transaction::coinbase(height, reward, self.coinbase_to);

        let header = BlockHeader::new(
            1,
            parent.hash(),
            Hash::zero(),
            timestamp,
            difficulty_target,
            0,
        );

        let mut block = Block::new(header, Vec::new());
        block.add_transaction(coinbase);
        for tx in transactions {
            block.add_transaction(tx);
        }
        block
    }

    /// Solved child of `parent` that keeps the parent's difficulty
    ///
    /// `timestamp` defaults to the parent's time plus the target spacing.
    pub fn next_block(
        &self,
        params: &NetworkParams,
        parent: &BlockHeader,
        parent_height: u64,
        timestamp: Option<u64>,
        transactions: Vec<Transaction>,
    ) -> Block {
        let timestamp = timestamp.unwrap_or(parent.timestamp + params.target_spacing());
        let mut block = self.assemble_block(
            params,
            parent,
            parent_height + 1,
            timestamp,
            parent.difficulty_target,
            transactions,
        );
        block.solve();
        block
    }

    /// Mine a block (find valid nonce)
    ///
    /// This performs the PoW loop, incrementing the nonce until
    /// a valid hash is found or mining is interrupted.
    pub fn mine_block(&self, mut block: Block) -> MiningResult {
        let target = block.header.target();
        if target.is_zero() {
            return MiningResult::NoWork;
        }

        loop {
            // Check stop signal
            if self.stop_signal.load(Ordering::SeqCst) {
                return MiningResult::Interrupted;
            }

            if block.header.work_hash() <= target {
                return MiningResult::Success(block);
            }

            block.header.nonce = block.header.nonce.wrapping_add(1);

            // If nonce wrapped, update timestamp
            if block.header.nonce == 0 {
                block.header.timestamp = now_secs();
            }
        }
    }
}

/// Current Unix time in seconds
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}
