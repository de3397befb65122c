//! Block header and contents verification
//!
//! Checks a block can make without knowing where it sits in the chain.

use num_traits::Zero;
use thiserror::Error;

use crate::consensus::{Block, BlockHeader, NetworkParams};
use crate::crypto::Hash;

/// Reasons a block is rejected
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerificationError {
    /// Hash above target, or a target outside the permitted range
    #[error("{0}")]
    ProofOfWork(String),
    /// Retarget mismatch, or a target change between retargets
    #[error("{0}")]
    DifficultyTransition(String),
    #[error("Merkle hashes do not match: {calculated} vs {declared}")]
    MerkleRootMismatch { calculated: Hash, declared: Hash },
    /// Malformed block detected before any consensus check
    #[error("{0}")]
    Structural(String),
}

/// Reject blocks whose shape makes them impossible to place in a chain
pub fn check_structure(block: &Block, hash: &Hash) -> Result<(), VerificationError> {
    if block.header.prev_hash == *hash {
        return Err(VerificationError::Structural(format!(
            "Block {hash} claims to be its own parent"
        )));
    }
    Ok(())
}

/// Validate proof of work
///
/// The target must be positive and no easier than the network limit, and the
/// header hash must not exceed it.
pub fn verify_header(params: &NetworkParams, header: &BlockHeader) -> Result<(), VerificationError> {
    let target = header.target();

    if target.is_zero() || target > params.proof_of_work_limit {
        return Err(VerificationError::ProofOfWork(format!(
            "Difficulty target is bad: {target}"
        )));
    }

    let hash = header.work_hash();
    if hash > target {
        return Err(VerificationError::ProofOfWork(format!(
            "Hash is higher than target: {} vs {target:x}",
            header.hash()
        )));
    }

    Ok(())
}

/// Validate merkle root matches transactions
pub fn verify_merkle_root(block: &Block) -> Result<(), VerificationError> {
    let calculated = block.calculate_merkle_root();

    if calculated != block.header.merkle_root {
        return Err(VerificationError::MerkleRootMismatch {
            calculated,
            declared: block.header.merkle_root,
        });
    }

    Ok(())
}
