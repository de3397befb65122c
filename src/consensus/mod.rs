//! Consensus module - Block structure, validation, difficulty, rewards and network parameters

mod block;
mod validation;
mod difficulty;
mod params;
mod rewards;

pub use block::*;
pub use validation::*;
pub use difficulty::*;
pub use params::*;
pub use rewards::*;
