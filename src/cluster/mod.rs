//! Cluster Layout Module
//!
//! Everything that is fixed at startup and identical on every process.
//!
//! ## Core Concepts
//! - **Configuration**: block size, block count and transport timeouts (`SystemConfig`).
//! - **Directory**: the a-priori table of process ids and addresses (`ProcessDirectory`).
//! - **Ownership**: block `b` is owned by process `b mod N` (`OwnershipMap`).
//! - **Addressing**: linear positions map to `(block, offset)` pairs; accesses never span blocks.

pub mod addressing;
pub mod ownership;
pub mod types;

#[cfg(test)]
mod tests;
