//! Coherence Module
//!
//! Write-invalidate protocol over the local store, the cache and the peer transport.
//!
//! ## Submodules
//! - **`engine`**: read (hit / miss + fetch) and write (local update + invalidation broadcast),
//!   plus the server-side handling of `RequestBlock` and `InvalidateBlock`.
//! - **`server`**: accept loop; one short-lived task per inbound connection.
//! - **`stats`**: hit / miss / invalidation counters and the per-write invalidation report.

pub mod engine;
pub mod server;
pub mod stats;
