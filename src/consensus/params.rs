//! Network consensus parameters
//!
//! Each network is described by one immutable `NetworkParams` value, shared
//! through an `Arc` and looked up by `NetworkId`. Tests that need different
//! rules derive a separate value through `NetworkParams::builder`.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::consensus::{decode_compact_bits, Block};
use crate::crypto::Hash;
use crate::node::create_genesis_block;

/// Retarget window length in seconds (3.5 days)
pub const TARGET_TIMESPAN: u64 = 302_400;

/// Target seconds between blocks
pub const TARGET_SPACING: u64 = 150;

/// Blocks per retarget window
pub const INTERVAL: u64 = TARGET_TIMESPAN / TARGET_SPACING;

/// Identity of a network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkId {
    MainNet,
    TestNet3,
    /// Retired test network, kept because some fixtures are built on it
    TestNet2,
    /// Local network with a ten-block retarget window and trivial proof of work
    UnitTest,
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NetworkId::MainNet => "mainnet",
            NetworkId::TestNet3 => "testnet3",
            NetworkId::TestNet2 => "testnet2",
            NetworkId::UnitTest => "unittest",
        };
        f.write_str(name)
    }
}

/// Consensus constants of one network
#[derive(Debug, Clone)]
pub struct NetworkParams {
    pub id: NetworkId,
    /// Message start bytes on the wire
    pub packet_magic: u32,
    pub port: u16,
    /// Version byte of pay-to-pubkey-hash addresses
    pub address_header: u8,
    pub p2sh_header: u8,
    pub dumped_private_key_header: u8,
    /// Blocks between difficulty retargets
    pub interval: u64,
    /// Expected duration of one retarget window, in seconds
    pub target_timespan: u64,
    /// Easiest target any block may declare
    pub proof_of_work_limit: BigUint,
    pub genesis_block: Block,
    /// Confirmations before a coinbase output may be spent
    pub spendable_coinbase_depth: u64,
    /// Blocks per subsidy halving era
    pub subsidy_decrease_block_count: u64,
}

impl NetworkParams {
    /// The shared parameters of a network
    pub fn get(id: NetworkId) -> Arc<NetworkParams> {
        static MAIN_NET: OnceLock<Arc<NetworkParams>> = OnceLock::new();
        static TEST_NET3: OnceLock<Arc<NetworkParams>> = OnceLock::new();
        static TEST_NET2: OnceLock<Arc<NetworkParams>> = OnceLock::new();
        static UNIT_TEST: OnceLock<Arc<NetworkParams>> = OnceLock::new();

        let cell = match id {
            NetworkId::MainNet => &MAIN_NET,
            NetworkId::TestNet3 => &TEST_NET3,
            NetworkId::TestNet2 => &TEST_NET2,
            NetworkId::UnitTest => &UNIT_TEST,
        };

        Arc::clone(cell.get_or_init(|| Arc::new(Self::for_network(id))))
    }

    /// Start from a network's parameters and override individual rules
    pub fn builder(id: NetworkId) -> NetworkParamsBuilder {
        NetworkParamsBuilder {
            params: Self::for_network(id),
        }
    }

    pub fn genesis_hash(&self) -> Hash {
        self.genesis_block.hash()
    }

    /// Seconds one block is expected to take
    pub fn target_spacing(&self) -> u64 {
        self.target_timespan / self.interval.max(1)
    }

    fn for_network(id: NetworkId) -> Self {
        match id {
            NetworkId::MainNet => Self {
                id,
                packet_magic: 0xfbc0_b6db,
                port: 9333,
                address_header: 48,
                p2sh_header: 5,
                dumped_private_key_header: 128,
                interval: INTERVAL,
                target_timespan: TARGET_TIMESPAN,
                proof_of_work_limit: decode_compact_bits(0x1e0ffff0),
                genesis_block: create_genesis_block(1317972665, 0x1e0ffff0, 2084524493),
                spendable_coinbase_depth: 100,
                subsidy_decrease_block_count: 840_000,
            },
            NetworkId::TestNet3 => Self {
                id,
                packet_magic: 0xfcc1_b7dc,
                port: 19333,
                address_header: 111,
                p2sh_header: 196,
                dumped_private_key_header: 239,
                interval: INTERVAL,
                target_timespan: TARGET_TIMESPAN,
                proof_of_work_limit: decode_compact_bits(0x1e0ffff0),
                genesis_block: create_genesis_block(1320884152, 0x1d018ea7, 3562614017),
                spendable_coinbase_depth: 100,
                subsidy_decrease_block_count: 840_000,
            },
            NetworkId::TestNet2 => Self {
                id,
                packet_magic: 0xfcc1_b7dc,
                port: 19333,
                address_header: 111,
                p2sh_header: 196,
                dumped_private_key_header: 239,
                interval: INTERVAL,
                target_timespan: TARGET_TIMESPAN,
                proof_of_work_limit: decode_compact_bits(0x1d0fffff),
                genesis_block: create_genesis_block(1320884152, 0x1d018ea7, 3562614017),
                spendable_coinbase_depth: 100,
                subsidy_decrease_block_count: 840_000,
            },
            NetworkId::UnitTest => Self {
                id,
                packet_magic: 0x0b11_0907,
                port: 18333,
                address_header: 111,
                p2sh_header: 196,
                dumped_private_key_header: 239,
                interval: 10,
                target_timespan: 200_000_000,
                proof_of_work_limit: decode_compact_bits(0x207fffff),
                genesis_block: create_genesis_block(1320884152, 0x207fffff, 0),
                spendable_coinbase_depth: 5,
                subsidy_decrease_block_count: 100,
            },
        }
    }
}

/// Builds a modified copy of a network's parameters
#[derive(Debug)]
pub struct NetworkParamsBuilder {
    params: NetworkParams,
}

impl NetworkParamsBuilder {
    pub fn proof_of_work_limit(mut self, limit: BigUint) -> Self {
        self.params.proof_of_work_limit = limit;
        self
    }

    pub fn interval(mut self, interval: u64) -> Self {
        self.params.interval = interval;
        self
    }

    pub fn target_timespan(mut self, seconds: u64) -> Self {
        self.params.target_timespan = seconds;
        self
    }

    pub fn spendable_coinbase_depth(mut self, depth: u64) -> Self {
        self.params.spendable_coinbase_depth = depth;
        self
    }

    pub fn build(self) -> Arc<NetworkParams> {
        Arc::new(self.params)
    }
}
