//! Distributed Shared Memory Library
//!
//! A fixed-size byte address space split into equal blocks and spread over N cooperating
//! processes. Every process can read any byte; only the owner of a block may write it.
//! Remote blocks are cached on first read and kept coherent with a write-invalidate protocol.
//! It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! - **`cluster`**: Static cluster description. Configuration, the process directory,
//!   block ownership (`block mod N`) and position-to-block translation.
//! - **`storage`**: Per-process block state. The owned blocks (`LocalBlockStore`) and the
//!   validity-tracked copies of everyone else's blocks (`BlockCache`).
//! - **`transport`**: Peer-to-peer messaging. Fixed-size binary records and one-exchange
//!   TCP connections with bounded connect and I/O timeouts.
//! - **`coherence`**: The protocol itself. Read and write paths, the block server answering
//!   peers, and the process-wide counters.
//! - **`api`**: `DsmNode`, the handle applications use, plus an optional HTTP debug surface.

pub mod api;
pub mod cluster;
pub mod coherence;
pub mod error;
pub mod storage;
pub mod transport;

pub use api::node::DsmNode;
pub use cluster::types::{ProcessDescriptor, ProcessDirectory, SystemConfig};
pub use coherence::stats::{InvalidationReport, StatsSnapshot};
pub use error::{DsmError, Result};
pub use storage::cache::CacheState;
