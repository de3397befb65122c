//! Wallet implementation
//!
//! Holds keys and tracks the outputs paid to them as blocks arrive. The wallet
//! does not affect consensus; it only decides which transactions it wants to
//! see and keeps its own books.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::chain::{ChainObserver, NewBlockType};
use crate::consensus::NetworkParams;
use crate::crypto::{Address, EcKey, Hash, PubKeyHash};
use crate::storage::StoredBlock;
use crate::validation::{OutPoint, Transaction};

/// Which outputs a balance query counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceType {
    /// Everything unspent, including coinbase outputs not yet spendable
    Estimated,
    /// Only outputs that may be spent now
    Available,
}

/// An unspent output owned by one of the wallet's keys
#[derive(Debug, Clone, PartialEq, Eq)]
struct OwnedOutput {
    amount: u64,
    /// Height of the block that created it
    height: u64,
    coinbase: bool,
}

/// A transaction the wallet received from a block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletTransaction {
    pub tx: Transaction,
    pub height: u64,
    /// Position among the transactions of its block delivered to this wallet
    pub offset: usize,
}

#[derive(Debug, Default)]
struct WalletState {
    keys: Vec<EcKey>,
    key_hashes: HashSet<PubKeyHash>,
    unspent: HashMap<OutPoint, OwnedOutput>,
    transactions: HashMap<Hash, WalletTransaction>,
    best_height: u64,
}

impl WalletState {
    fn depth(&self, height: u64) -> u64 {
        (self.best_height + 1).saturating_sub(height)
    }

    fn spendable(&self, output: &OwnedOutput, maturity: u64) -> bool {
        !output.coinbase || self.depth(output.height) >= maturity
    }
}

/// A key-holding chain observer
#[derive(Debug)]
pub struct Wallet {
    params: Arc<NetworkParams>,
    state: Mutex<WalletState>,
}

impl Wallet {
    /// Create a new empty wallet
    pub fn new(params: Arc<NetworkParams>) -> Self {
        Self {
            params,
            state: Mutex::new(WalletState::default()),
        }
    }

    /// Add a key; returns its address on this wallet's network
    pub fn add_key(&self, key: EcKey) -> Address {
        let address = key.to_address(self.params.address_header);
        let mut state = self.lock();
        if state.key_hashes.insert(key.pubkey_hash()) {
            state.keys.push(key);
        }
        address
    }

    /// Generate a new key and add it to the wallet
    pub fn generate_key(&self) -> Address {
        self.add_key(EcKey::generate())
    }

    pub fn keys(&self) -> Vec<EcKey> {
        self.lock().keys.clone()
    }

    pub fn addresses(&self) -> Vec<Address> {
        let header = self.params.address_header;
        self.lock().keys.iter().map(|key| key.to_address(header)).collect()
    }

    pub fn is_mine(&self, pubkey_hash: &PubKeyHash) -> bool {
        self.lock().key_hashes.contains(pubkey_hash)
    }

    pub fn balance(&self, balance_type: BalanceType) -> u64 {
        let state = self.lock();
        let maturity = self.params.spendable_coinbase_depth;

        state
            .unspent
            .values()
            .filter(|output| match balance_type {
                BalanceType::Estimated => true,
                BalanceType::Available => state.spendable(output, maturity),
            })
            .fold(0u64, |total, output| total.saturating_add(output.amount))
    }

    /// Outpoints the wallet could spend right now
    pub fn spendable_outputs(&self) -> Vec<(OutPoint, u64)> {
        let state = self.lock();
        let maturity = self.params.spendable_coinbase_depth;

        state
            .unspent
            .iter()
            .filter(|(_, output)| state.spendable(output, maturity))
            .map(|(outpoint, output)| (*outpoint, output.amount))
            .collect()
    }

    /// Whether a received transaction's outputs may be spent
    ///
    /// Coinbase outputs need `spendable_coinbase_depth` confirmations, the
    /// including block counting as the first. Unknown transactions are not
    /// mature.
    pub fn is_mature(&self, txid: &Hash) -> bool {
        let state = self.lock();
        match state.transactions.get(txid) {
            Some(received) if received.tx.is_coinbase() => {
                state.depth(received.height) >= self.params.spendable_coinbase_depth
            }
            Some(_) => true,
            None => false,
        }
    }

    pub fn get_transaction(&self, txid: &Hash) -> Option<WalletTransaction> {
        self.lock().transactions.get(txid).cloned()
    }

    pub fn transaction_count(&self) -> usize {
        self.lock().transactions.len()
    }

    /// Height of the last best block the wallet was told about
    pub fn best_height(&self) -> u64 {
        self.lock().best_height
    }

    fn lock(&self) -> MutexGuard<'_, WalletState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ChainObserver for Wallet {
    fn is_transaction_relevant(&self, tx: &Transaction) -> bool {
        let state = self.lock();
        tx.outputs.iter().any(|output| state.key_hashes.contains(&output.pubkey_hash))
            || tx
                .inputs
                .iter()
                .any(|input| state.unspent.contains_key(&input.previous_output))
    }

    fn receive_from_block(
        &self,
        tx: &Transaction,
        block: &StoredBlock,
        _block_type: NewBlockType,
        relativity_offset: usize,
    ) {
        let mut state = self.lock();
        let txid = tx.hash();

        if !tx.is_coinbase() {
            for input in &tx.inputs {
                state.unspent.remove(&input.previous_output);
            }
        }

        for (index, output) in tx.outputs.iter().enumerate() {
            if state.key_hashes.contains(&output.pubkey_hash) {
                state.unspent.insert(
                    OutPoint::new(txid, index as u32),
                    OwnedOutput {
                        amount: output.amount,
                        height: block.height,
                        coinbase: tx.is_coinbase(),
                    },
                );
            }
        }

        state.transactions.insert(
            txid,
            WalletTransaction {
                tx: tx.clone(),
                height: block.height,
                offset: relativity_offset,
            },
        );
        state.best_height = state.best_height.max(block.height);

        tracing::debug!(%txid, height = block.height, "wallet received transaction");
    }

    fn notify_new_best_block(&self, block: &StoredBlock) {
        self.lock().best_height = block.height;
    }
}
