//! SPV node demo
//!
//! Mines blocks on the configured network and feeds them through the chain,
//! with a wallet observer collecting the coinbase outputs.

use spv_core::chain::{BlockChain, ChainError};
use spv_core::consensus::NetworkParams;
use spv_core::mining::{now_secs, Miner, MiningResult};
use spv_core::node::{init_logging, NodeConfig};
use spv_core::storage::{BlockStore, MemoryBlockStore, SledBlockStore};
use spv_core::wallet::{BalanceType, Wallet};
use std::sync::Arc;
use tracing::{info, warn};

type Chain = BlockChain<Box<dyn BlockStore>>;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = NodeConfig::resolve(std::env::args().nth(1))?;
    init_logging(&config.log_filter);

    let params = NetworkParams::get(config.network);
    info!(network = %params.id, genesis = %params.genesis_hash(), "starting node");

    let store: Box<dyn BlockStore> = match &config.data_dir {
        Some(dir) => Box::new(SledBlockStore::open(dir, &params)?),
        None => Box::new(MemoryBlockStore::new(&params)),
    };

    let wallet = Arc::new(Wallet::new(Arc::clone(&params)));
    let address = wallet.generate_key();
    let chain: Arc<Chain> = Arc::new(BlockChain::with_wallet(
        Arc::clone(&params),
        wallet.clone(),
        store,
    ));

    let start_height = chain.best_chain_height()?;
    let target_height = start_height + config.blocks_to_mine;
    info!(%address, start_height, target_height, "mining");

    let reached = chain.get_height_future(target_height)?;
    let miner = Miner::new(address.pubkey_hash());

    let mining = {
        let chain = Arc::clone(&chain);
        let miner = miner.clone();
        tokio::spawn(async move { mine_until(chain, miner, target_height).await })
    };

    tokio::select! {
        result = reached => {
            let head = result?;
            info!(height = head.height, hash = %head.hash(), "target height reached");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, stopping miner");
        }
    }

    miner.stop();
    mining.await??;

    info!(
        available = wallet.balance(BalanceType::Available),
        estimated = wallet.balance(BalanceType::Estimated),
        transactions = wallet.transaction_count(),
        "wallet balance"
    );

    Ok(())
}

/// Mine on top of the chain head until it reaches `target_height`
async fn mine_until(chain: Arc<Chain>, miner: Miner, target_height: u64) -> Result<(), ChainError> {
    loop {
        let head = chain.chain_head()?;
        if head.height >= target_height {
            return Ok(());
        }

        let bits = chain.next_difficulty_target()?;
        let timestamp = now_secs().max(head.header.timestamp + 1);
        let template = miner.assemble_block(
            chain.params(),
            &head.header,
            head.height + 1,
            timestamp,
            bits,
            Vec::new(),
        );

        let worker = miner.clone();
        match tokio::task::spawn_blocking(move || worker.mine_block(template)).await {
            Ok(MiningResult::Success(block)) => {
                chain.add(block)?;
            }
            Ok(MiningResult::Interrupted) => return Ok(()),
            Ok(MiningResult::NoWork) => {
                warn!(bits = %format!("{bits:08x}"), "target cannot be met");
                return Ok(());
            }
            Err(err) => {
                warn!(error = %err, "mining task failed");
                return Ok(());
            }
        }
    }
}
