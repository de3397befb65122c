//! Chain module - Block acceptance, orphan handling, height futures and observers

mod blockchain;
mod futures;
mod listener;
mod orphans;

pub use blockchain::*;
pub use futures::HeightFuture;
pub use listener::{ChainObserver, NewBlockType};
