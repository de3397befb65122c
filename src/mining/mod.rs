//! Mining module - Block assembly and proof-of-work search

mod miner;

pub use miner::*;
