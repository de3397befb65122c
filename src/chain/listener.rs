//! Chain observers
//!
//! Wallets and other interested parties register a `ChainObserver` with the
//! chain. After a block joins the best chain its transactions are offered to
//! every observer in block order.

use std::sync::Arc;

use crate::storage::StoredBlock;
use crate::validation::Transaction;

/// Where a delivered block sits relative to the chain head
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum NewBlockType {
    /// The block is the new chain head
    BestChain,
}

/// Receiver of transactions from accepted blocks
pub trait ChainObserver: Send + Sync {
    /// Whether `tx` pays to, or spends from, something this observer controls
    fn is_transaction_relevant(&self, tx: &Transaction) -> bool;

    /// Deliver a relevant transaction
    ///
    /// `relativity_offset` is the number of transactions from the same block
    /// already delivered to this observer.
    fn receive_from_block(
        &self,
        tx: &Transaction,
        block: &StoredBlock,
        block_type: NewBlockType,
        relativity_offset: usize,
    );

    /// Called once the chain head has moved to `block`
    fn notify_new_best_block(&self, _block: &StoredBlock) {}
}

/// True when any observer cares about any of the transactions
pub(crate) fn any_relevant(observers: &[Arc<dyn ChainObserver>], transactions: &[Transaction]) -> bool {
    transactions
        .iter()
        .any(|tx| observers.iter().any(|observer| observer.is_transaction_relevant(tx)))
}

/// Hand each transaction to every observer that finds it relevant
///
/// Relevance is asked at delivery time, after earlier transactions of the
/// block have been delivered, so a spend of an output created earlier in the
/// same block is recognised.
pub(crate) fn dispatch(
    observers: &[Arc<dyn ChainObserver>],
    transactions: &[Transaction],
    block: &StoredBlock,
    block_type: NewBlockType,
) {
    let mut delivered = vec![0usize; observers.len()];

    for tx in transactions {
        for (observer, count) in observers.iter().zip(delivered.iter_mut()) {
            if observer.is_transaction_relevant(tx) {
                observer.receive_from_block(tx, block, block_type, *count);
                *count += 1;
            }
        }
    }

    for observer in observers {
        observer.notify_new_best_block(block);
    }
}
