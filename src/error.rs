//! Error taxonomy for the DSM core.
//!
//! Validation errors (`InvalidArgument`, `OutOfRange`, `CrossBlock`, `NotOwner`)
//! are returned synchronously and never retried. Transport errors raised on a
//! read miss are wrapped in `RemoteFetch`; transport errors raised during the
//! invalidation broadcast never reach the caller.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DsmError>;

#[derive(Debug, Error)]
pub enum DsmError {
    #[error("DSM node is not initialized (or has been shut down)")]
    NotInitialized,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Access out of range: position {position} + length {length} exceeds {capacity} bytes")]
    OutOfRange {
        position: u64,
        length: usize,
        capacity: u64,
    },

    #[error(
        "Access crosses block boundary: offset {offset} + length {length} > block size {block_size}"
    )]
    CrossBlock {
        offset: usize,
        length: usize,
        block_size: usize,
    },

    #[error("Block {block_id} is owned by process {owner}, not by process {local}")]
    NotOwner {
        block_id: u32,
        owner: usize,
        local: usize,
    },

    #[error("Invalid message target {target} (local process {local}, {num_processes} processes)")]
    InvalidTarget {
        target: usize,
        local: usize,
        num_processes: usize,
    },

    #[error("Process {target} at {addr} is unavailable: {reason}")]
    PeerUnavailable {
        target: usize,
        addr: String,
        reason: String,
    },

    #[error("Peer closed the connection before sending a message")]
    PeerClosed,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Failed to fetch block {block_id} from process {owner}: {source}")]
    RemoteFetch {
        block_id: u32,
        owner: usize,
        #[source]
        source: Box<DsmError>,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

impl DsmError {
    /// True for errors caused by the caller's arguments rather than the cluster.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DsmError::InvalidArgument(_)
                | DsmError::OutOfRange { .. }
                | DsmError::CrossBlock { .. }
                | DsmError::NotOwner { .. }
        )
    }

    pub fn is_peer_unavailable(&self) -> bool {
        matches!(self, DsmError::PeerUnavailable { .. })
    }
}
