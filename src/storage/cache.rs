use crate::cluster::ownership::OwnershipMap;
use crate::error::{DsmError, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};

/// Coherence state of a cached copy of a remote block.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CacheState {
    Valid,
    Invalid,
}

/// Cached copy of one remote block.
///
/// `data` is only meaningful while `valid` is set. Invalidation keeps the bytes
/// in place; they must not be read until the entry is filled again.
#[derive(Debug, Default)]
pub struct CacheEntry {
    valid: bool,
    data: Vec<u8>,
}

impl CacheEntry {
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn state(&self) -> CacheState {
        if self.valid {
            CacheState::Valid
        } else {
            CacheState::Invalid
        }
    }

    /// Slice of a valid entry; `None` on an invalid one or an out-of-bounds span.
    pub fn read(&self, offset: usize, length: usize) -> Option<Vec<u8>> {
        if !self.valid {
            return None;
        }
        self.data.get(offset..offset.checked_add(length)?).map(<[u8]>::to_vec)
    }

    pub fn fill(&mut self, data: Vec<u8>) {
        self.data = data;
        self.valid = true;
    }

    pub fn invalidate(&mut self) {
        self.valid = false;
    }
}

pub type CacheGuard<'a> = MutexGuard<'a, CacheEntry>;

/// Per-process cache of blocks owned elsewhere.
///
/// One entry exists for every block id so lookups are a plain index; entries
/// for locally owned blocks are never touched. Entry locks are async because
/// the read-miss path keeps the entry locked across the remote fetch, which
/// guarantees at most one outstanding fetch per block.
pub struct BlockCache {
    block_size: usize,
    entries: Vec<Mutex<CacheEntry>>,
}

impl BlockCache {
    pub fn new(block_count: u32, block_size: usize) -> Self {
        let entries = (0..block_count)
            .map(|_| Mutex::new(CacheEntry::default()))
            .collect();

        Self {
            block_size,
            entries,
        }
    }

    fn entry(&self, block_id: u32) -> Result<&Mutex<CacheEntry>> {
        self.entries.get(block_id as usize).ok_or_else(|| {
            DsmError::InvalidArgument(format!(
                "block {} outside of {} cache entries",
                block_id,
                self.entries.len()
            ))
        })
    }

    /// Locks an entry; the caller decides hit or miss under the guard.
    pub async fn lock(&self, block_id: u32) -> Result<CacheGuard<'_>> {
        Ok(self.entry(block_id)?.lock().await)
    }

    /// Full block copy if the entry is valid.
    pub async fn lookup(&self, block_id: u32) -> Result<Option<Vec<u8>>> {
        let entry = self.lock(block_id).await?;
        Ok(entry.read(0, self.block_size))
    }

    pub async fn store(&self, block_id: u32, data: Vec<u8>) -> Result<()> {
        if data.len() != self.block_size {
            return Err(DsmError::InvalidArgument(format!(
                "cached block must be {} bytes, got {}",
                self.block_size,
                data.len()
            )));
        }
        self.lock(block_id).await?.fill(data);
        Ok(())
    }

    pub async fn invalidate(&self, block_id: u32) -> Result<()> {
        self.lock(block_id).await?.invalidate();
        Ok(())
    }

    /// State of every block not owned by this process, in block order.
    ///
    /// Entries are locked one at a time, so a block with a fetch in flight holds the
    /// snapshot up for as long as that fetch takes (at most the I/O timeout).
    pub async fn snapshot(&self, ownership: &OwnershipMap) -> Vec<(u32, CacheState)> {
        let mut states = Vec::new();
        for (block_id, entry) in (0u32..).zip(self.entries.iter()) {
            if ownership.is_local(block_id) {
                continue;
            }
            states.push((block_id, entry.lock().await.state()));
        }
        states
    }
}
