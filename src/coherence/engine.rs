//! Write-Invalidate Coherence Engine
//!
//! Owns the per-process state (local store, cache, counters) and implements
//! both sides of the protocol:
//!
//! - **Read**: owned blocks come from the local store. Remote blocks come from the
//!   cache; on a miss the entry stays locked while the block is fetched from its
//!   owner, so concurrent readers of one cold block share a single fetch.
//! - **Write**: only the owner may write. The local copy is updated under the block
//!   lock, then every other process is told to drop its cached copy.
//!
//! ## Consistency
//! The writer does not wait for `AckInvalidate`. Until a peer has processed the
//! invalidation, readers on that peer may still hit their stale cached copy, so the
//! cross-process view is eventually consistent rather than sequentially consistent.
//! Making it strict would need the writer to collect acknowledgements before
//! returning, which is a protocol change.

use super::stats::{DsmStats, InvalidationReport};
use crate::cluster::addressing::translate;
use crate::cluster::ownership::OwnershipMap;
use crate::cluster::types::{ProcessDirectory, SystemConfig};
use crate::error::{DsmError, Result};
use crate::storage::cache::{BlockCache, CacheState};
use crate::storage::local::LocalBlockStore;
use crate::transport::client::PeerTransport;
use crate::transport::protocol::Message;

use std::sync::Arc;

pub struct CoherenceEngine {
    config: SystemConfig,
    ownership: OwnershipMap,
    local: LocalBlockStore,
    cache: BlockCache,
    transport: PeerTransport,
    stats: DsmStats,
}

impl CoherenceEngine {
    pub fn new(local_id: usize, directory: Arc<ProcessDirectory>, config: SystemConfig) -> Self {
        let ownership = OwnershipMap::new(directory.len(), config.block_count, local_id);
        let local = LocalBlockStore::new(ownership, config.block_size);
        let cache = BlockCache::new(config.block_count, config.block_size);
        let transport = PeerTransport::new(local_id, directory, &config);

        Self {
            config,
            ownership,
            local,
            cache,
            transport,
            stats: DsmStats::default(),
        }
    }

    pub fn local_id(&self) -> usize {
        self.ownership.local()
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn ownership(&self) -> &OwnershipMap {
        &self.ownership
    }

    pub fn stats(&self) -> &DsmStats {
        &self.stats
    }

    pub async fn cache_snapshot(&self) -> Vec<(u32, CacheState)> {
        self.cache.snapshot(&self.ownership).await
    }

    // ============================================================
    // APPLICATION SIDE
    // ============================================================

    pub async fn read(&self, position: u64, length: usize) -> Result<Vec<u8>> {
        let addr = translate(&self.config, position, length)?;
        let local_id = self.local_id();

        if self.ownership.is_local(addr.block_id) {
            tracing::debug!(process = local_id, "Reading local block {}", addr.block_id);
            return self.local.read(addr.block_id, addr.offset, length);
        }

        let mut entry = self.cache.lock(addr.block_id).await?;

        if entry.is_valid() {
            self.stats.record_hit();
            tracing::debug!(process = local_id, "Cache hit for block {}", addr.block_id);
            return entry
                .read(addr.offset, length)
                .ok_or_else(|| DsmError::CrossBlock {
                    offset: addr.offset,
                    length,
                    block_size: self.config.block_size,
                });
        }

        self.stats.record_miss();
        tracing::debug!(process = local_id, "Cache miss for block {}", addr.block_id);

        let owner = self.ownership.owner(addr.block_id);
        let block = match self.fetch_block(addr.block_id, owner).await {
            Ok(block) => block,
            Err(e) => {
                tracing::error!(
                    process = local_id,
                    "Failed to fetch block {} from process {}: {}",
                    addr.block_id,
                    owner,
                    e
                );
                return Err(DsmError::RemoteFetch {
                    block_id: addr.block_id,
                    owner,
                    source: Box::new(e),
                });
            }
        };

        let data = block[addr.offset..addr.offset + length].to_vec();
        entry.fill(block);
        tracing::debug!(
            process = local_id,
            "Block {} loaded into cache from process {}",
            addr.block_id,
            owner
        );

        Ok(data)
    }

    /// Round trip to the owner; returns the full decoded block.
    async fn fetch_block(&self, block_id: u32, owner: usize) -> Result<Vec<u8>> {
        tracing::debug!(
            process = self.local_id(),
            "Requesting block {} from process {}",
            block_id,
            owner
        );

        let reply = self
            .transport
            .request(owner, &Message::RequestBlock { block_id })
            .await?;

        match reply {
            Message::ResponseBlock {
                block_id: got,
                payload,
            } if got == block_id => {
                if payload.len() != self.config.block_size {
                    return Err(DsmError::Protocol(format!(
                        "block {} response carried {} bytes, expected {}",
                        block_id,
                        payload.len(),
                        self.config.block_size
                    )));
                }
                Ok(payload)
            }
            Message::ProtocolError { .. } => Err(DsmError::Protocol(format!(
                "process {} rejected request for block {}",
                owner, block_id
            ))),
            other => Err(DsmError::Protocol(format!(
                "unexpected reply {} to request for block {}",
                other, block_id
            ))),
        }
    }

    pub async fn write(&self, position: u64, data: &[u8]) -> Result<InvalidationReport> {
        let addr = translate(&self.config, position, data.len())?;

        if !self.ownership.is_local(addr.block_id) {
            let owner = self.ownership.owner(addr.block_id);
            tracing::warn!(
                process = self.local_id(),
                "Rejected write to block {} owned by process {}",
                addr.block_id,
                owner
            );
            return Err(DsmError::NotOwner {
                block_id: addr.block_id,
                owner,
                local: self.local_id(),
            });
        }

        self.local.write(addr.block_id, addr.offset, data)?;
        tracing::debug!(
            process = self.local_id(),
            "Wrote {} bytes to local block {}",
            data.len(),
            addr.block_id
        );

        Ok(self.broadcast_invalidation(addr.block_id).await)
    }

    /// Tells every other process to drop its copy of `block_id`.
    ///
    /// Never fails: unreachable peers are tallied as skipped.
    async fn broadcast_invalidation(&self, block_id: u32) -> InvalidationReport {
        let local_id = self.local_id();
        let msg = Message::InvalidateBlock { block_id };
        let mut report = InvalidationReport::default();

        for peer in self.ownership.peers() {
            report.attempted += 1;
            match self.transport.notify(peer, &msg).await {
                Ok(()) => {
                    report.notified += 1;
                    self.stats.record_invalidation_sent();
                }
                Err(e) if e.is_peer_unavailable() => {
                    report.skipped += 1;
                    tracing::warn!(
                        process = local_id,
                        "Skipped invalidation of block {} on process {}: {}",
                        block_id,
                        peer,
                        e
                    );
                }
                Err(e) => {
                    report.skipped += 1;
                    tracing::warn!(
                        process = local_id,
                        "Invalidation of block {} on process {} failed: {}",
                        block_id,
                        peer,
                        e
                    );
                }
            }
        }

        if report.notified > 0 {
            tracing::debug!(
                process = local_id,
                "Invalidations for block {} sent to {} of {} processes",
                block_id,
                report.notified,
                report.attempted
            );
        } else if report.attempted > 0 {
            tracing::debug!(
                process = local_id,
                "No process available for invalidation of block {}",
                block_id
            );
        }

        report
    }

    // ============================================================
    // SERVER SIDE
    // ============================================================

    /// Produces the reply for one inbound message.
    pub async fn handle_message(&self, msg: Message) -> Message {
        match msg {
            Message::RequestBlock { block_id } => self.serve_block(block_id),
            Message::InvalidateBlock { block_id } => self.apply_invalidation(block_id).await,
            other => {
                tracing::warn!(
                    process = self.local_id(),
                    "Unexpected message {} from peer",
                    other
                );
                Message::ProtocolError {
                    block_id: other.block_id(),
                }
            }
        }
    }

    fn serve_block(&self, block_id: u32) -> Message {
        let local_id = self.local_id();
        if !self.ownership.contains(block_id) || !self.ownership.is_local(block_id) {
            tracing::warn!(
                process = local_id,
                "Request for block {} which is not owned here",
                block_id
            );
            return Message::ProtocolError { block_id };
        }

        match self.local.snapshot(block_id) {
            Ok(payload) => {
                tracing::debug!(process = local_id, "Serving block {}", block_id);
                Message::ResponseBlock { block_id, payload }
            }
            Err(e) => {
                tracing::error!(process = local_id, "Failed to read block {}: {}", block_id, e);
                Message::ProtocolError { block_id }
            }
        }
    }

    async fn apply_invalidation(&self, block_id: u32) -> Message {
        let local_id = self.local_id();
        if let Err(e) = self.cache.invalidate(block_id).await {
            tracing::warn!(process = local_id, "Bad invalidation for block {}: {}", block_id, e);
            return Message::ProtocolError { block_id };
        }

        self.stats.record_invalidation_received();
        tracing::debug!(process = local_id, "Invalidated cached block {}", block_id);

        Message::AckInvalidate { block_id }
    }
}
