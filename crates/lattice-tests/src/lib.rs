//! # lattice-tests
//!
//! Cross-crate scenario tests: each module exercises one end-to-end
//! behavior of the node core, built on the shared generators.

pub mod generators;

#[cfg(test)]
mod chain_scenarios;
#[cfg(test)]
mod mempool_scenarios;
#[cfg(test)]
mod mining_scenarios;
#[cfg(test)]
mod network_scenarios;
