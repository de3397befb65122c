//! Merkle tree root computation
//!
//! Used for computing and checking transaction merkle roots in blocks.

use super::{hash_pair, Hash};

/// Compute the merkle root of a list of hashes
///
/// If the list is empty, returns zero hash.
/// If a level has an odd number of elements, the last one is paired with itself.
pub fn compute_merkle_root(hashes: &[Hash]) -> Hash {
    if hashes.is_empty() {
        return Hash::zero();
    }

    let mut current_level: Vec<Hash> = hashes.to_vec();

    while current_level.len() > 1 {
        let mut next_level = Vec::with_capacity((current_level.len() + 1) / 2);

        for chunk in current_level.chunks(2) {
            let right = chunk.get(1).unwrap_or(&chunk[0]);
            next_level.push(hash_pair(&chunk[0], right));
        }

        current_level = next_level;
    }

    current_level[0]
}
