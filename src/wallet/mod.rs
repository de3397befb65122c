//! Wallet module - Key management and received-transaction bookkeeping

mod wallet;

pub use wallet::*;
