use crate::cluster::types::{ProcessDirectory, SystemConfig};
use crate::coherence::engine::CoherenceEngine;
use crate::coherence::server::{BlockServer, ServerHandle, ServerState};
use crate::coherence::stats::{InvalidationReport, StatsSnapshot};
use crate::error::{DsmError, Result};
use crate::storage::cache::CacheState;

use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpListener;

/// One participant of the shared address space.
///
/// Created by `initialize` (or `with_listener`), destroyed by `shutdown`. Several
/// nodes can live in one process, which is how the cluster tests run.
pub struct DsmNode {
    engine: Arc<CoherenceEngine>,
    server: Mutex<Option<ServerHandle>>,
    initialized: AtomicBool,
    local_addr: SocketAddr,
}

impl DsmNode {
    /// Binds the address advertised for `local_id` and starts serving peers.
    pub async fn initialize(
        local_id: usize,
        directory: ProcessDirectory,
        config: SystemConfig,
    ) -> Result<Self> {
        let addr = directory
            .get(local_id)
            .map(|process| process.addr())
            .ok_or_else(|| {
                DsmError::InvalidConfig(format!(
                    "process {} not in directory of {}",
                    local_id,
                    directory.len()
                ))
            })?;

        let bound = TcpListener::bind(addr.as_str()).await;
        let listener = bound.map_err(|source| DsmError::Bind { addr, source })?;

        Self::with_listener(local_id, directory, config, listener).await
    }

    /// Starts a node on an already bound listener.
    pub async fn with_listener(
        local_id: usize,
        directory: ProcessDirectory,
        config: SystemConfig,
        listener: TcpListener,
    ) -> Result<Self> {
        config.validate()?;
        if local_id >= directory.len() {
            return Err(DsmError::InvalidConfig(format!(
                "process {} not in directory of {}",
                local_id,
                directory.len()
            )));
        }

        let engine = Arc::new(CoherenceEngine::new(local_id, Arc::new(directory), config));
        let server = BlockServer::spawn(engine.clone(), listener).map_err(|e| {
            DsmError::Transport(format!("listener has no local address: {}", e))
        })?;
        let local_addr = server.local_addr();

        tracing::info!(process = local_id, "DSM node initialized");
        tracing::info!(
            process = local_id,
            "Process owns {} blocks, serving on {}",
            engine.ownership().owned_count(),
            local_addr
        );

        Ok(Self {
            engine,
            server: Mutex::new(Some(server)),
            initialized: AtomicBool::new(true),
            local_addr,
        })
    }

    /// Stops the block server and waits for it; later calls fail with `NotInitialized`.
    pub async fn shutdown(&self) -> Result<()> {
        if !self.initialized.swap(false, Ordering::SeqCst) {
            return Err(DsmError::NotInitialized);
        }

        tracing::info!(process = self.local_id(), "Shutting down DSM node");
        let server = self.server.lock().take();
        if let Some(server) = server {
            server.stop().await;
        }
        tracing::info!(process = self.local_id(), "DSM node shut down");
        Ok(())
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DsmError::NotInitialized)
        }
    }

    /// Reads `length` bytes at `position`; the span must lie within one block.
    pub async fn read(&self, position: u64, length: usize) -> Result<Vec<u8>> {
        self.ensure_initialized()?;
        if length == 0 {
            return Err(DsmError::InvalidArgument(
                "read length must be positive".to_string(),
            ));
        }
        self.engine.read(position, length).await
    }

    /// Like `read`, filling `buffer` entirely.
    pub async fn read_into(&self, position: u64, buffer: &mut [u8]) -> Result<()> {
        let data = self.read(position, buffer.len()).await?;
        buffer.copy_from_slice(&data);
        Ok(())
    }

    /// Writes `data` at `position`, which must fall in a block owned by this node.
    ///
    /// Succeeds once the local copy is updated, however many peers could be told
    /// to invalidate their cached copies.
    pub async fn write(&self, position: u64, data: &[u8]) -> Result<InvalidationReport> {
        self.ensure_initialized()?;
        if data.is_empty() {
            return Err(DsmError::InvalidArgument(
                "write buffer must not be empty".to_string(),
            ));
        }
        self.engine.write(position, data).await
    }

    pub fn local_id(&self) -> usize {
        self.engine.local_id()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn config(&self) -> &SystemConfig {
        self.engine.config()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn server_state(&self) -> ServerState {
        if self.server.lock().is_some() {
            ServerState::Listening
        } else {
            ServerState::Stopped
        }
    }

    pub fn num_processes(&self) -> usize {
        self.engine.ownership().num_processes()
    }

    pub fn owner_of(&self, block_id: u32) -> usize {
        self.engine.ownership().owner(block_id)
    }

    pub fn owned_blocks(&self) -> Vec<u32> {
        self.engine.ownership().owned_blocks().collect()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.engine.stats().snapshot()
    }

    pub fn cache_hits(&self) -> u64 {
        self.engine.stats().cache_hits()
    }

    pub fn cache_misses(&self) -> u64 {
        self.engine.stats().cache_misses()
    }

    pub fn invalidations_sent(&self) -> u64 {
        self.engine.stats().invalidations_sent()
    }

    pub fn invalidations_received(&self) -> u64 {
        self.engine.stats().invalidations_received()
    }

    /// Validity of every cached (non-owned) block.
    pub async fn cache_snapshot(&self) -> Vec<(u32, CacheState)> {
        self.engine.cache_snapshot().await
    }

    pub async fn valid_cache_blocks(&self) -> Vec<u32> {
        self.cache_snapshot()
            .await
            .into_iter()
            .filter(|(_, state)| *state == CacheState::Valid)
            .map(|(block_id, _)| block_id)
            .collect()
    }
}
