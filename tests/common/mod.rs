//! Helpers shared by the integration tests

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use spv_core::chain::{BlockChain, ChainObserver, NewBlockType};
use spv_core::consensus::{Block, NetworkId, NetworkParams};
use spv_core::crypto::{Hash, PubKeyHash};
use spv_core::mining::Miner;
use spv_core::storage::{MemoryBlockStore, StoredBlock};
use spv_core::validation::{OutPoint, Transaction};
use spv_core::wallet::Wallet;

/// Key hash nobody in the tests owns
pub const NOBODY: PubKeyHash = PubKeyHash([0xEE; 20]);

pub fn unit_params() -> Arc<NetworkParams> {
    NetworkParams::get(NetworkId::UnitTest)
}

pub fn unit_chain() -> BlockChain<MemoryBlockStore> {
    let params = unit_params();
    let store = MemoryBlockStore::new(&params);
    BlockChain::new(params, store)
}

/// A chain with one registered wallet holding one key
pub fn chain_with_wallet() -> (BlockChain<MemoryBlockStore>, Arc<Wallet>, PubKeyHash) {
    let params = unit_params();
    let wallet = Arc::new(Wallet::new(Arc::clone(&params)));
    let key = wallet.generate_key().pubkey_hash();
    let store = MemoryBlockStore::new(&params);
    let chain = BlockChain::with_wallet(params, wallet.clone(), store);
    (chain, wallet, key)
}

/// Solved child of `prev` at `height` with the given time, bits and transactions
pub fn block_with(
    prev: &Block,
    height: u64,
    coinbase_to: PubKeyHash,
    timestamp: u64,
    bits: u32,
    transactions: Vec<Transaction>,
) -> Block {
    let mut block = Miner::new(coinbase_to).assemble_block(
        &unit_params(),
        &prev.header,
        height,
        timestamp,
        bits,
        transactions,
    );
    block.solve();
    block
}

/// Solved child of `prev` one second later, keeping its difficulty
pub fn next_block(prev: &Block, height: u64) -> Block {
    next_block_to(prev, height, NOBODY, Vec::new())
}

pub fn next_block_to(prev: &Block, height: u64, coinbase_to: PubKeyHash, transactions: Vec<Transaction>) -> Block {
    block_with(
        prev,
        height,
        coinbase_to,
        prev.header.timestamp + 1,
        prev.header.difficulty_target,
        transactions,
    )
}

/// A chain of `len` blocks on top of `from`, which sits at `from_height`
pub fn build_chain(from: &Block, from_height: u64, len: u64) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    for i in 1..=len {
        let prev = blocks.last().unwrap_or(from);
        let block = next_block(prev, from_height + i);
        blocks.push(block);
    }
    blocks
}

/// Transaction paying `amount` to `to` from an outpoint nothing else uses
pub fn fake_tx(to: PubKeyHash, amount: u64) -> Transaction {
    static NEXT: AtomicU32 = AtomicU32::new(1);
    let mut txid = [0xAA; 32];
    txid[..4].copy_from_slice(&NEXT.fetch_add(1, Ordering::SeqCst).to_le_bytes());

    let mut tx = Transaction::new(vec![], vec![]);
    tx.add_input(OutPoint::new(Hash(txid), 0));
    tx.add_output(amount, to);
    tx
}

/// Observer that records every delivery it receives
pub struct RecordingObserver {
    keys: HashSet<PubKeyHash>,
    pub received: Mutex<Vec<(Hash, u64, usize)>>,
    pub best_blocks: Mutex<Vec<StoredBlock>>,
}

impl RecordingObserver {
    pub fn new(keys: &[PubKeyHash]) -> Self {
        Self {
            keys: keys.iter().copied().collect(),
            received: Mutex::new(Vec::new()),
            best_blocks: Mutex::new(Vec::new()),
        }
    }

    pub fn received(&self) -> Vec<(Hash, u64, usize)> {
        self.received.lock().unwrap().clone()
    }

    pub fn best_heights(&self) -> Vec<u64> {
        self.best_blocks.lock().unwrap().iter().map(|b| b.height).collect()
    }
}

impl ChainObserver for RecordingObserver {
    fn is_transaction_relevant(&self, tx: &Transaction) -> bool {
        tx.outputs.iter().any(|output| self.keys.contains(&output.pubkey_hash))
    }

    fn receive_from_block(&self, tx: &Transaction, block: &StoredBlock, block_type: NewBlockType, offset: usize) {
        assert_eq!(block_type, NewBlockType::BestChain);
        self.received.lock().unwrap().push((tx.hash(), block.height, offset));
    }

    fn notify_new_best_block(&self, block: &StoredBlock) {
        self.best_blocks.lock().unwrap().push(block.clone());
    }
}
