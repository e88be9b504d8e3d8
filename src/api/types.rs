//! Debug Surface DTOs
//!
//! JSON bodies served by the optional HTTP debug surface of a node.

use crate::coherence::stats::{InvalidationReport, StatsSnapshot};
use serde::{Deserialize, Serialize};

pub const ENDPOINT_STATS: &str = "/stats";
pub const ENDPOINT_CACHE: &str = "/cache";
pub const ENDPOINT_READ: &str = "/read/:position/:length";
pub const ENDPOINT_WRITE: &str = "/write";

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub process: usize,
    pub stats: StatsSnapshot,
    /// Percentage of remote reads served from cache.
    pub hit_rate: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CacheResponse {
    pub process: usize,
    /// Non-owned blocks with a currently valid cached copy.
    pub valid_blocks: Vec<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadResponse {
    pub success: bool,
    /// Bytes rendered as text, non-printable bytes as `[xx]`.
    pub data: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WriteRequest {
    pub position: u64,
    /// Written as UTF-8 followed by a terminating NUL byte.
    pub data: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WriteResponse {
    pub success: bool,
    pub report: Option<InvalidationReport>,
    pub error: Option<String>,
}

/// Printable ASCII as-is, everything else as `[xx]`.
pub fn render_bytes(data: &[u8]) -> String {
    data.iter()
        .map(|&b| {
            if (32..=126).contains(&b) {
                (b as char).to_string()
            } else {
                format!("[{:02x}]", b)
            }
        })
        .collect()
}
