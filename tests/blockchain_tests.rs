//! Block acceptance scenarios
//!
//! Chains are built on the unit test network, where the retarget window is
//! ten blocks and almost any hash meets the proof-of-work limit.

mod common;

use std::sync::Arc;

use num_bigint::BigUint;
use num_traits::One;
use spv_core::chain::{BlockChain, ChainError};
use spv_core::consensus::{
    compute_next_target, encode_compact_bits, Block, NetworkId, NetworkParams, VerificationError,
};
use spv_core::constants::COIN;
use spv_core::crypto::Hash;
use spv_core::storage::{MemoryBlockStore, SledBlockStore};
use spv_core::validation::Transaction;
use spv_core::wallet::{BalanceType, Wallet};

use common::*;

fn verification_error(err: ChainError) -> VerificationError {
    match err {
        ChainError::Verification(inner) => inner,
        other => panic!("expected a verification error, got {other:?}"),
    }
}

// ============================================================================
// CHAINING
// ============================================================================

#[test]
fn test_basic_chaining() {
    let (chain, _wallet, _) = chain_with_wallet();
    let genesis = unit_params().genesis_block.clone();
    let mut height_future = chain.get_height_future(2).unwrap();

    let b1 = next_block(&genesis, 1);
    assert!(chain.add(b1.clone()).unwrap());
    assert!(!height_future.is_done());

    // Search for a nonce that fails proof of work.
    let mut bad = next_block(&b1, 2);
    while bad.header.meets_target() {
        bad.header.nonce += 1;
    }
    let err = verification_error(chain.add(bad).unwrap_err());
    assert!(err.to_string().contains("Hash is higher than target"), "{err}");
    assert!(!height_future.is_done());

    let b2 = next_block(&b1, 2);
    assert!(chain.add(b2.clone()).unwrap());

    let reached = height_future.try_get().unwrap();
    assert_eq!(reached.height, 2);
    assert_eq!(reached.hash(), b2.hash());
    assert_eq!(chain.chain_head().unwrap().hash(), b2.hash());
}

#[test]
fn test_unconnected_blocks() {
    let chain = unit_chain();
    let genesis = unit_params().genesis_block.clone();
    let blocks = build_chain(&genesis, 0, 3);

    assert!(chain.add(blocks[0].clone()).unwrap());
    assert!(!chain.add(blocks[2].clone()).unwrap());
    assert_eq!(chain.best_chain_height().unwrap(), 1);
    assert!(chain.is_orphan(&blocks[2].hash()));

    assert!(chain.add(blocks[1].clone()).unwrap());
    assert_eq!(chain.chain_head().unwrap().hash(), blocks[2].hash());
    assert_eq!(chain.orphan_count(), 0);
}

#[test]
fn test_multi_level_orphan_cascade() {
    let chain = unit_chain();
    let genesis = unit_params().genesis_block.clone();
    let blocks = build_chain(&genesis, 0, 4);

    for block in blocks[1..].iter().rev() {
        assert!(!chain.add(block.clone()).unwrap());
    }
    assert_eq!(chain.orphan_count(), 3);
    assert_eq!(chain.get_orphan_root(&blocks[3].hash()), Some(blocks[1].clone()));
    assert_eq!(chain.get_orphan_root(&blocks[1].hash()), Some(blocks[1].clone()));
    assert_eq!(chain.get_orphan_root(&genesis.hash()), None);

    assert!(chain.add(blocks[0].clone()).unwrap());
    assert_eq!(chain.best_chain_height().unwrap(), 4);
    assert_eq!(chain.chain_head().unwrap().hash(), blocks[3].hash());
    assert_eq!(chain.orphan_count(), 0);
}

#[test]
fn test_duplicates() {
    let chain = unit_chain();
    let observer = Arc::new(RecordingObserver::new(&[NOBODY]));
    chain.add_wallet(observer.clone());

    let genesis = unit_params().genesis_block.clone();
    let blocks = build_chain(&genesis, 0, 3);

    assert!(chain.add(blocks[0].clone()).unwrap());
    assert!(!chain.add(blocks[0].clone()).unwrap());
    assert_eq!(observer.received().len(), 1);
    assert_eq!(observer.best_heights(), vec![1]);

    assert!(!chain.add(blocks[2].clone()).unwrap());
    assert!(!chain.add(blocks[2].clone()).unwrap());
    assert_eq!(chain.orphan_count(), 1);

    assert!(chain.add(blocks[1].clone()).unwrap());
    assert_eq!(chain.best_chain_height().unwrap(), 3);
    assert_eq!(observer.received().len(), 3);
    assert_eq!(observer.best_heights(), vec![1, 2, 3]);
    assert!(!chain.is_orphan(&blocks[2].hash()));
}

#[test]
fn test_side_chain_block_not_delivered() {
    let chain = unit_chain();
    let observer = Arc::new(RecordingObserver::new(&[NOBODY]));
    chain.add_wallet(observer.clone());
    let genesis = unit_params().genesis_block.clone();

    let b1 = next_block(&genesis, 1);
    let fork = block_with(&genesis, 1, NOBODY, genesis.header.timestamp + 9, genesis.header.difficulty_target, vec![]);

    assert!(chain.add(b1.clone()).unwrap());
    assert!(!chain.add(fork.clone()).unwrap());

    assert_eq!(chain.chain_head().unwrap().hash(), b1.hash());
    assert_eq!(chain.get_block(&fork.hash()).unwrap().unwrap().height, 1);
    assert_eq!(observer.received().len(), 1);
}

#[test]
fn test_self_referential_block_rejected() {
    let chain = unit_chain();
    let mut block = next_block(&unit_params().genesis_block, 1);
    block.header.prev_hash = block.hash();

    let err = verification_error(chain.add(block).unwrap_err());
    assert!(matches!(err, VerificationError::Structural(_)));
    assert_eq!(chain.orphan_count(), 0);
}

// ============================================================================
// WALLET DELIVERY
// ============================================================================

#[test]
fn test_receive_coins() {
    let (chain, wallet, key) = chain_with_wallet();
    let genesis = unit_params().genesis_block.clone();

    let tx = fake_tx(key, 10 * COIN);
    let b1 = next_block_to(&genesis, 1, NOBODY, vec![tx.clone()]);
    assert!(chain.add(b1).unwrap());

    assert_eq!(wallet.balance(BalanceType::Estimated), 10 * COIN);
    assert_eq!(wallet.balance(BalanceType::Available), 10 * COIN);
    assert_eq!(wallet.get_transaction(&tx.hash()).unwrap().height, 1);
}

#[test]
fn test_merkle_roots() {
    let (chain, wallet, key) = chain_with_wallet();
    let genesis = unit_params().genesis_block.clone();

    // A relevant block must have a consistent merkle root.
    let mut relevant = next_block_to(&genesis, 1, NOBODY, vec![fake_tx(key, COIN)]);
    relevant.header.merkle_root = Hash([1u8; 32]);
    relevant.solve();
    let err = verification_error(chain.add(relevant.clone()).unwrap_err());
    assert!(matches!(err, VerificationError::MerkleRootMismatch { .. }));
    assert_eq!(chain.best_chain_height().unwrap(), 0);
    assert!(chain.get_block(&relevant.hash()).unwrap().is_none());
    assert_eq!(wallet.balance(BalanceType::Estimated), 0);

    // Nobody cares about this one, so its contents are not checked.
    let mut irrelevant = next_block_to(&genesis, 1, NOBODY, vec![fake_tx(NOBODY, COIN)]);
    irrelevant.header.merkle_root = Hash([1u8; 32]);
    irrelevant.solve();
    assert!(chain.add(irrelevant).unwrap());
    assert_eq!(chain.best_chain_height().unwrap(), 1);
}

#[test]
fn test_header_only_block_connects() {
    let (chain, wallet, key) = chain_with_wallet();
    let genesis = unit_params().genesis_block.clone();
    let full = next_block_to(&genesis, 1, key, vec![]);

    // Stripped of its coinbase the block is irrelevant, and its declared merkle
    // root no longer matches the empty transaction list.
    let header = full.header_only();
    assert_ne!(header.calculate_merkle_root(), header.header.merkle_root);
    assert!(chain.add(header).unwrap());
    assert_eq!(chain.chain_head().unwrap().hash(), full.hash());
    assert_eq!(wallet.transaction_count(), 0);
}

#[test]
fn test_intra_block_dependencies() {
    let (chain, wallet, key) = chain_with_wallet();
    let genesis = unit_params().genesis_block.clone();

    let t1 = fake_tx(key, COIN);
    let mut t2 = Transaction::new(vec![], vec![]);
    t2.add_input(t1.outpoint(0));
    t2.add_output(COIN, NOBODY);

    let b1 = next_block_to(&genesis, 1, NOBODY, vec![t1.clone(), t2.clone()]);
    assert!(chain.add(b1).unwrap());

    assert_eq!(wallet.transaction_count(), 2);
    assert_eq!(wallet.get_transaction(&t1.hash()).unwrap().offset, 0);
    assert_eq!(wallet.get_transaction(&t2.hash()).unwrap().offset, 1);
    assert_eq!(wallet.balance(BalanceType::Estimated), 0);
}

#[test]
fn test_relativity_offsets_per_block() {
    let chain = unit_chain();
    let mine = spv_core::crypto::PubKeyHash([0x11; 20]);
    let observer = Arc::new(RecordingObserver::new(&[mine]));
    chain.add_wallet(observer.clone());
    let genesis = unit_params().genesis_block.clone();

    let txs = vec![fake_tx(mine, 1), fake_tx(NOBODY, 1), fake_tx(mine, 2)];
    let b1 = next_block_to(&genesis, 1, NOBODY, txs.clone());
    let b2 = next_block_to(&b1, 2, mine, vec![]);
    assert!(chain.add(b1).unwrap());
    assert!(chain.add(b2.clone()).unwrap());

    assert_eq!(
        observer.received(),
        vec![
            (txs[0].hash(), 1, 0),
            (txs[2].hash(), 1, 1),
            (b2.transactions[0].hash(), 2, 0),
        ]
    );
}

#[test]
fn test_coinbase_transaction_availability() {
    let (chain, wallet, key) = chain_with_wallet();
    let params = unit_params();
    let genesis = params.genesis_block.clone();

    let wallet2 = Arc::new(Wallet::new(Arc::clone(&params)));
    let key2 = wallet2.generate_key().pubkey_hash();
    chain.add_wallet(wallet2.clone());

    let b1 = next_block_to(&genesis, 1, key, vec![]);
    let coinbase = b1.transactions[0].clone();
    assert!(chain.add(b1.clone()).unwrap());
    assert_eq!(wallet.balance(BalanceType::Estimated), 50 * COIN);
    assert_eq!(wallet.balance(BalanceType::Available), 0);
    assert!(!wallet.is_mature(&coinbase.hash()));

    let mut prev = b1;
    for height in 2..params.spendable_coinbase_depth {
        prev = next_block(&prev, height);
        assert!(chain.add(prev.clone()).unwrap());
        assert!(!wallet.is_mature(&coinbase.hash()));
        assert_eq!(wallet.balance(BalanceType::Available), 0);
    }

    prev = next_block(&prev, params.spendable_coinbase_depth);
    assert!(chain.add(prev.clone()).unwrap());
    assert!(wallet.is_mature(&coinbase.hash()));
    assert_eq!(wallet.balance(BalanceType::Available), 50 * COIN);

    let mut spend = Transaction::new(vec![], vec![]);
    spend.add_input(coinbase.outpoint(0));
    spend.add_output(49 * COIN, key2);
    spend.add_output(COIN, key);
    let next = next_block_to(&prev, params.spendable_coinbase_depth + 1, NOBODY, vec![spend]);
    assert!(chain.add(next).unwrap());

    assert_eq!(wallet.balance(BalanceType::Available), COIN);
    assert_eq!(wallet2.balance(BalanceType::Estimated), 49 * COIN);
    assert_eq!(wallet2.balance(BalanceType::Available), 49 * COIN);
}

// ============================================================================
// DIFFICULTY
// ============================================================================

#[test]
fn test_difficulty_transitions() {
    let chain = unit_chain();
    let params = unit_params();
    let genesis = params.genesis_block.clone();
    let bits = genesis.header.difficulty_target;

    // Two seconds per block, far faster than the network expects.
    let mut prev = genesis.clone();
    for height in 1..params.interval {
        let time = genesis.header.timestamp + 2 * height;
        prev = block_with(&prev, height, NOBODY, time, bits, vec![]);
        assert!(chain.add(prev.clone()).unwrap());
    }

    let time = genesis.header.timestamp + 2 * params.interval;
    let unchanged = block_with(&prev, params.interval, NOBODY, time, bits, vec![]);
    let err = verification_error(chain.add(unchanged).unwrap_err());
    assert!(matches!(err, VerificationError::DifficultyTransition(_)));
    assert!(err.to_string().contains("do not match what was calculated"), "{err}");
    assert_eq!(chain.best_chain_height().unwrap(), params.interval - 1);

    assert_eq!(chain.next_difficulty_target().unwrap(), 0x201fffff);
    let retargeted = block_with(&prev, params.interval, NOBODY, time, 0x201fffff, vec![]);
    assert!(chain.add(retargeted.clone()).unwrap());

    // Between retargets the new target has to be kept.
    let reverted = block_with(&retargeted, params.interval + 1, NOBODY, time + 2, bits, vec![]);
    let err = verification_error(chain.add(reverted).unwrap_err());
    assert!(err.to_string().contains("Unexpected change in difficulty"), "{err}");

    let kept = block_with(&retargeted, params.interval + 1, NOBODY, time + 2, 0x201fffff, vec![]);
    assert!(chain.add(kept).unwrap());
}

#[test]
fn test_bad_difficulty() {
    let genesis = unit_params().genesis_block.clone();
    let easier = block_with(&genesis, 1, NOBODY, genesis.header.timestamp + 1, 0x2100ffff, vec![]);

    let chain = unit_chain();
    let err = verification_error(chain.add(easier.clone()).unwrap_err());
    assert!(matches!(err, VerificationError::ProofOfWork(_)));
    assert!(err.to_string().contains("Difficulty target is bad"), "{err}");

    // With the limit lifted the header passes, but the target still may not
    // change between retargets.
    let limit = (BigUint::one() << 256usize) - 1u32;
    let params = NetworkParams::builder(NetworkId::UnitTest)
        .proof_of_work_limit(limit)
        .build();
    let store = MemoryBlockStore::new(&params);
    let relaxed = BlockChain::new(params, store);

    let err = verification_error(relaxed.add(easier).unwrap_err());
    assert!(err.to_string().contains("Unexpected change in difficulty"), "{err}");
}

#[test]
fn test_failed_block_leaves_state_unchanged() {
    let chain = unit_chain();
    let genesis = unit_params().genesis_block.clone();
    let b1 = next_block(&genesis, 1);
    assert!(chain.add(b1.clone()).unwrap());
    let mut future = chain.get_height_future(2).unwrap();

    let bad = block_with(&b1, 2, NOBODY, b1.header.timestamp + 1, 0x207ffffe, vec![]);
    assert!(chain.add(bad.clone()).is_err());

    assert_eq!(chain.chain_head().unwrap().hash(), b1.hash());
    assert!(chain.get_block(&bad.hash()).unwrap().is_none());
    assert_eq!(chain.orphan_count(), 0);
    assert!(!future.is_done());
}

#[test]
fn test_invalid_orphan_dropped_during_cascade() {
    let chain = unit_chain();
    let genesis = unit_params().genesis_block.clone();
    let b1 = next_block(&genesis, 1);
    let bad = block_with(&b1, 2, NOBODY, b1.header.timestamp + 1, 0x207ffffe, vec![]);
    let above_bad = next_block(&bad, 3);
    let above_that = next_block(&above_bad, 4);

    assert!(!chain.add(bad.clone()).unwrap());
    assert!(!chain.add(above_that.clone()).unwrap());
    assert!(!chain.add(above_bad.clone()).unwrap());
    assert_eq!(chain.orphan_count(), 3);

    assert!(chain.add(b1.clone()).unwrap());
    assert_eq!(chain.chain_head().unwrap().hash(), b1.hash());
    assert!(chain.get_block(&bad.hash()).unwrap().is_none());

    // Nothing built on the rejected block can ever connect.
    assert_eq!(chain.orphan_count(), 0);
    assert!(!chain.is_orphan(&above_bad.hash()));
    assert!(!chain.is_orphan(&above_that.hash()));
}

#[test]
fn test_later_retargets_span_a_full_interval() {
    let params = NetworkParams::builder(NetworkId::UnitTest)
        .target_timespan(100)
        .build();
    let interval = params.interval;
    let store = MemoryBlockStore::new(&params);
    let chain = BlockChain::new(Arc::clone(&params), store);

    let mut blocks: Vec<Block> = vec![params.genesis_block.clone()];
    let mut bits = params.genesis_block.header.difficulty_target;

    let extend = |blocks: &mut Vec<Block>, bits: u32, gap: u64| {
        let prev = blocks.last().unwrap().clone();
        let height = blocks.len() as u64;
        let block = block_with(&prev, height, NOBODY, prev.header.timestamp + gap, bits, vec![]);
        assert!(chain.add(block.clone()).unwrap(), "block {height} rejected");
        blocks.push(block);
    };

    // First window: five seconds a block, measured from genesis.
    for _ in 1..interval {
        extend(&mut blocks, bits, 5);
    }
    let first = compute_next_target(&params, &blocks[0].header, &blocks[interval as usize - 1].header);
    bits = encode_compact_bits(&first);
    assert_eq!(chain.next_difficulty_target().unwrap(), bits);

    // A long pause before the first block of the second window.
    extend(&mut blocks, bits, 50);
    for _ in 1..interval {
        extend(&mut blocks, bits, 5);
    }

    let last = &blocks[2 * interval as usize - 1].header;
    let full_window = encode_compact_bits(&compute_next_target(&params, &blocks[interval as usize - 1].header, last));
    let short_window = encode_compact_bits(&compute_next_target(&params, &blocks[interval as usize].header, last));
    assert_ne!(full_window, short_window);
    assert_eq!(chain.next_difficulty_target().unwrap(), full_window);

    let prev = blocks.last().unwrap();
    let time = prev.header.timestamp + 5;
    let wrong = block_with(prev, 2 * interval, NOBODY, time, short_window, vec![]);
    let err = verification_error(chain.add(wrong).unwrap_err());
    assert!(err.to_string().contains("do not match what was calculated"), "{err}");

    let right = block_with(prev, 2 * interval, NOBODY, time, full_window, vec![]);
    assert!(chain.add(right).unwrap());
    assert_eq!(chain.best_chain_height().unwrap(), 2 * interval);
}

// ============================================================================
// HEIGHT FUTURES AND ESTIMATES
// ============================================================================

#[test]
fn test_height_future_already_reached() {
    let chain = unit_chain();
    let mut future = chain.get_height_future(0).unwrap();
    assert!(future.is_done());
    assert_eq!(future.try_get().unwrap().hash(), unit_params().genesis_hash());
}

#[test]
fn test_several_futures_for_one_height() {
    let chain = unit_chain();
    let genesis = unit_params().genesis_block.clone();
    let first = chain.get_height_future(1).unwrap();
    let second = chain.get_height_future(1).unwrap();
    let mut later = chain.get_height_future(3).unwrap();

    let b1 = next_block(&genesis, 1);
    chain.add(b1.clone()).unwrap();

    assert_eq!(first.blocking_get().unwrap().hash(), b1.hash());
    assert_eq!(second.blocking_get().unwrap().hash(), b1.hash());
    assert!(!later.is_done());
}

#[test]
fn test_dropped_chain_cancels_future() {
    let chain = unit_chain();
    let future = chain.get_height_future(5).unwrap();
    drop(chain);
    assert!(matches!(future.blocking_get(), Err(ChainError::Cancelled)));
}

#[tokio::test]
async fn test_await_height_from_another_task() {
    let chain = Arc::new(unit_chain());
    let genesis = unit_params().genesis_block.clone();
    let blocks = build_chain(&genesis, 0, 3);
    let future = chain.get_height_future(3).unwrap();

    let feeder = {
        let chain = Arc::clone(&chain);
        tokio::task::spawn_blocking(move || {
            for block in blocks {
                chain.add(block).unwrap();
            }
        })
    };

    let reached = future.await.unwrap();
    assert_eq!(reached.height, 3);
    feeder.await.unwrap();
}

#[test]
fn test_estimated_block_time() {
    let params = NetworkParams::get(NetworkId::MainNet);
    let store = MemoryBlockStore::new(&params);
    let chain = BlockChain::new(params, store);

    assert_eq!(chain.estimate_block_time(200_000).unwrap(), 1437972665);
    assert_eq!(chain.estimate_block_time(0).unwrap(), 1317972665);
}

#[test]
fn test_estimated_block_time_far_future() {
    let params = NetworkParams::get(NetworkId::MainNet);
    let store = MemoryBlockStore::new(&params);
    let chain = BlockChain::new(params, store);

    let far = 1u64 << 60;
    assert_eq!(chain.estimate_block_time(far).unwrap(), u64::MAX);
    assert_eq!(chain.estimate_block_time(u64::MAX).unwrap(), u64::MAX);
    assert_eq!(chain.estimate_block_time(1 << 40).unwrap(), 1317972665 + (1 << 40) * 600);
}

// ============================================================================
// STORES AND CONCURRENCY
// ============================================================================

#[test]
fn test_sled_backed_chain_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let params = unit_params();
    let genesis = params.genesis_block.clone();
    let blocks = build_chain(&genesis, 0, 3);

    {
        let store = SledBlockStore::open(dir.path(), &params).unwrap();
        let chain = BlockChain::new(Arc::clone(&params), store);
        for block in &blocks {
            assert!(chain.add(block.clone()).unwrap());
        }
    }

    let store = SledBlockStore::open(dir.path(), &params).unwrap();
    let chain = BlockChain::new(Arc::clone(&params), store);
    assert_eq!(chain.best_chain_height().unwrap(), 3);
    assert!(!chain.add(blocks[1].clone()).unwrap());

    let next = next_block(&blocks[2], 4);
    assert!(chain.add(next).unwrap());
}

#[test]
fn test_concurrent_adds_serialise() {
    let chain = Arc::new(unit_chain());
    let genesis = unit_params().genesis_block.clone();
    let blocks = build_chain(&genesis, 0, 12);

    let handles: Vec<_> = blocks
        .chunks(3)
        .rev()
        .map(|chunk| {
            let chain = Arc::clone(&chain);
            let chunk = chunk.to_vec();
            std::thread::spawn(move || {
                for block in chunk {
                    chain.add(block).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(chain.best_chain_height().unwrap(), 12);
    assert_eq!(chain.orphan_count(), 0);
}
