//! Block structure
//!
//! Defines the block header, whose double-SHA-256 is both the block id and the
//! proof-of-work value, and the full block carrying its transactions.

use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::consensus::decode_compact_bits;
use crate::crypto::{compute_merkle_root, double_sha256, Hash};
use crate::validation::Transaction;

/// Block header containing all metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockHeader {
    /// Protocol version
    pub version: u32,
    /// Hash of the previous block
    pub prev_hash: Hash,
    /// Merkle root of all transactions
    pub merkle_root: Hash,
    /// Block timestamp (seconds since Unix epoch)
    pub timestamp: u64,
    /// Difficulty target (compact representation)
    pub difficulty_target: u32,
    /// Nonce used for PoW
    pub nonce: u64,
}

impl BlockHeader {
    /// Create a new block header
    pub fn new(
        version: u32,
        prev_hash: Hash,
        merkle_root: Hash,
        timestamp: u64,
        difficulty_target: u32,
        nonce: u64,
    ) -> Self {
        Self {
            version,
            prev_hash,
            merkle_root,
            timestamp,
            difficulty_target,
            nonce,
        }
    }

    /// Serialize the header for hashing
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(88);
        bytes.extend_from_slice(&self.version.to_le_bytes());
        bytes.extend_from_slice(&self.prev_hash.0);
        bytes.extend_from_slice(&self.merkle_root.0);
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        bytes.extend_from_slice(&self.difficulty_target.to_le_bytes());
        bytes.extend_from_slice(&self.nonce.to_le_bytes());
        bytes
    }

    /// Calculate the hash of this header
    pub fn hash(&self) -> Hash {
        double_sha256(&self.to_bytes())
    }

    /// The full-precision target encoded in `difficulty_target`
    pub fn target(&self) -> BigUint {
        decode_compact_bits(self.difficulty_target)
    }

    /// The header hash read as a big-endian 256-bit integer
    pub fn work_hash(&self) -> BigUint {
        BigUint::from_bytes_be(&self.hash().0)
    }

    /// Whether the hash satisfies the header's own target
    pub fn meets_target(&self) -> bool {
        let target = self.target();
        !target.is_zero() && self.work_hash() <= target
    }
}

/// A complete block containing header and transactions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    /// Block header
    pub header: BlockHeader,
    /// List of transactions in this block
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Create a new block
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Self { header, transactions }
    }

    /// Get the block hash
    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    pub fn prev_hash(&self) -> &Hash {
        &self.header.prev_hash
    }

    /// Copy of this block without its transactions
    pub fn header_only(&self) -> Block {
        Block::new(self.header.clone(), Vec::new())
    }

    /// Merkle root computed from the transaction list
    pub fn calculate_merkle_root(&self) -> Hash {
        let tx_hashes: Vec<Hash> = self.transactions.iter().map(|tx| tx.hash()).collect();
        compute_merkle_root(&tx_hashes)
    }

    /// Recompute the merkle root after the transaction list changed
    pub fn add_transaction(&mut self, tx: Transaction) {
        self.transactions.push(tx);
        self.header.merkle_root = self.calculate_merkle_root();
    }

    /// Increment the nonce until the header satisfies its own target
    ///
    /// Does nothing for a zero or negative target, which no hash can meet.
    pub fn solve(&mut self) {
        let target = self.header.target();
        if target.is_zero() {
            return;
        }
        while self.header.work_hash() > target {
            self.header.nonce = self.header.nonce.wrapping_add(1);
        }
    }
}
