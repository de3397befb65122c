//! SPV chain core
//!
//! Block acceptance for a light client of a Litecoin-family network: proof of
//! work and difficulty retargeting, orphan buffering, height notifications and
//! delivery of relevant transactions to wallets.

pub mod chain;
pub mod consensus;
pub mod crypto;
pub mod validation;
pub mod storage;
pub mod mining;
pub mod wallet;
pub mod node;

/// Protocol constants
pub mod constants {
    /// Base units per coin (8 decimal places)
    pub const COIN: u64 = 100_000_000;

    /// Block spacing assumed when projecting when a height will be reached
    pub const ESTIMATED_BLOCK_SPACING_SECS: u64 = 600;
}
