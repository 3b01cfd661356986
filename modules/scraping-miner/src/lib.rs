//! Miner node for the scraping subnet: serves Twitter and Reddit scrape
//! requests from validators over an axon and stores the results.

pub mod axon;
pub mod batcher;
pub mod bus;
pub mod config;
pub mod keywords;
pub mod metagraph;
pub mod miner;
pub mod plugin;
pub mod queries;
pub mod queue;
pub mod registry;
pub mod sources;
pub mod synapse;
pub mod update;
pub mod wallet;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{Cli, FileConfig};
pub use miner::Miner;
