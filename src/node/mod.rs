//! Node module - Genesis blocks, configuration and logging setup

mod config;
mod genesis;
mod logging;

pub use config::*;
pub use genesis::*;
pub use logging::init_logging;
