//! Block subsidy schedule
//!
//! The coinbase may claim a subsidy that starts at 50 coins and halves every
//! `subsidy_decrease_block_count` blocks.

use crate::constants::COIN;

/// Subsidy of the first halving era (in base units)
pub const INITIAL_SUBSIDY: u64 = 50 * COIN;

/// Calculate the block subsidy for a given height
///
/// # Arguments
/// * `height` - Height of the block whose coinbase claims the subsidy
/// * `subsidy_decrease_block_count` - Blocks per halving era
pub fn block_subsidy(height: u64, subsidy_decrease_block_count: u64) -> u64 {
    if subsidy_decrease_block_count == 0 {
        return INITIAL_SUBSIDY;
    }

    let halvings = height / subsidy_decrease_block_count;
    if halvings >= 64 {
        return 0;
    }

    INITIAL_SUBSIDY >> halvings
}
