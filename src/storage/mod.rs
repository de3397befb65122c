//! Storage module - Stored blocks, the block store trait and its backends

mod store;
pub mod db;

pub use store::*;
pub use db::SledBlockStore;
