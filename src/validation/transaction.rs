//! Transaction structure
//!
//! UTXO-style transactions. Scripts are carried as opaque bytes; the only
//! structure the chain core relies on is the outpoint an input spends and the
//! public key hash an output pays.

use serde::{Deserialize, Serialize};
use crate::crypto::{double_sha256, Hash, PubKeyHash};

/// Output index used by the null outpoint of a coinbase input
pub const COINBASE_OUTPUT_INDEX: u32 = 0xFFFF_FFFF;

/// Reference to an output of a previous transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    /// Hash of the transaction containing the output
    pub txid: Hash,
    /// Index of the output in that transaction
    pub index: u32,
}

impl OutPoint {
    pub fn new(txid: Hash, index: u32) -> Self {
        Self { txid, index }
    }

    /// The outpoint spent by a coinbase input
    pub fn null() -> Self {
        Self {
            txid: Hash::zero(),
            index: COINBASE_OUTPUT_INDEX,
        }
    }

    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.index == COINBASE_OUTPUT_INDEX
    }
}

/// A transaction input referencing a previous output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// The output being spent
    pub previous_output: OutPoint,
    /// Unlocking script; arbitrary data for a coinbase
    pub script_sig: Vec<u8>,
}

/// A transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Amount in base units
    pub amount: u64,
    /// Public key hash of the recipient
    pub pubkey_hash: PubKeyHash,
}

/// A complete transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction version
    pub version: u32,
    /// Transaction inputs
    pub inputs: Vec<TxInput>,
    /// Transaction outputs
    pub outputs: Vec<TxOutput>,
    /// Lock time (block height or timestamp)
    pub lock_time: u32,
}

impl Transaction {
    /// Create a new transaction
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        Self {
            version: 1,
            inputs,
            outputs,
            lock_time: 0,
        }
    }

    /// Create a coinbase transaction paying `reward` to `to`
    ///
    /// The height goes into the coinbase script so that coinbases of
    /// different blocks never share a hash.
    pub fn coinbase(height: u64, reward: u64, to: PubKeyHash) -> Self {
        Self::coinbase_with_data(height.to_le_bytes().to_vec(), reward, to)
    }

    /// Coinbase carrying arbitrary script data
    pub fn coinbase_with_data(script_sig: Vec<u8>, reward: u64, to: PubKeyHash) -> Self {
        Self::new(
            vec![TxInput {
                previous_output: OutPoint::null(),
                script_sig,
            }],
            vec![TxOutput {
                amount: reward,
                pubkey_hash: to,
            }],
        )
    }

    /// Check if this is a coinbase transaction
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
    }

    /// Append an input spending `previous_output`
    pub fn add_input(&mut self, previous_output: OutPoint) {
        self.inputs.push(TxInput {
            previous_output,
            script_sig: Vec::new(),
        });
    }

    pub fn add_output(&mut self, amount: u64, pubkey_hash: PubKeyHash) {
        self.outputs.push(TxOutput { amount, pubkey_hash });
    }

    /// Outpoint of this transaction's output at `index`
    pub fn outpoint(&self, index: u32) -> OutPoint {
        OutPoint::new(self.hash(), index)
    }

    /// Calculate transaction hash
    pub fn hash(&self) -> Hash {
        double_sha256(&self.to_bytes())
    }

    /// Total value of all outputs
    pub fn output_value(&self) -> u64 {
        self.outputs.iter().map(|o| o.amount).sum()
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();

        bytes.extend_from_slice(&self.version.to_le_bytes());

        bytes.extend_from_slice(&(self.inputs.len() as u32).to_le_bytes());
        for input in &self.inputs {
            bytes.extend_from_slice(&input.previous_output.txid.0);
            bytes.extend_from_slice(&input.previous_output.index.to_le_bytes());
            bytes.extend_from_slice(&(input.script_sig.len() as u32).to_le_bytes());
            bytes.extend_from_slice(&input.script_sig);
        }

        bytes.extend_from_slice(&(self.outputs.len() as u32).to_le_bytes());
        for output in &self.outputs {
            bytes.extend_from_slice(&output.amount.to_le_bytes());
            bytes.extend_from_slice(&output.pubkey_hash.0);
        }

        bytes.extend_from_slice(&self.lock_time.to_le_bytes());

        bytes
    }
}
