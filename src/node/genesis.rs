//! Genesis block generation
//!
//! Every network starts from a single coinbase carrying the launch headline.
//! The header fields that differ between networks are passed in; everything
//! else is fixed so the same inputs always produce the same block.

use crate::consensus::{Block, BlockHeader, INITIAL_SUBSIDY};
use crate::crypto::{Hash, PubKeyHash};
use crate::validation::Transaction;

/// Headline embedded in the genesis coinbase
pub const GENESIS_MESSAGE: &str = "NY Times 05/Oct/2011 Steve Jobs, Apple\u{2019}s Visionary, Dies at 56";

/// Genesis block version
const GENESIS_VERSION: u32 = 1;

/// Create the genesis block of a network
///
/// The genesis output pays an unspendable all-zero key hash.
pub fn create_genesis_block(timestamp: u64, difficulty_target: u32, nonce: u64) -> Block {
    let coinbase = Transaction::coinbase_with_data(
        GENESIS_MESSAGE.as_bytes().to_vec(),
        INITIAL_SUBSIDY,
        PubKeyHash([0u8; 20]),
    );

    let header = BlockHeader::new(
        GENESIS_VERSION,
        Hash::zero(),
        Hash::zero(),
        timestamp,
        difficulty_target,
        nonce,
    );

    let mut block = Block::new(header, Vec::new());
    block.add_transaction(coinbase);
    block
}
