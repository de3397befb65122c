//! Transactions as seen by the chain core

mod transaction;

pub use transaction::*;
