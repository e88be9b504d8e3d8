use crate::cluster::ownership::OwnershipMap;
use crate::error::{DsmError, Result};
use parking_lot::Mutex;

/// Authoritative storage for the blocks this process owns.
///
/// Every block sits behind its own lock. The owning process's writers and the
/// server task serving remote fetches both go through it, so a fetch can never
/// observe a partially applied write. Locks are only held for a memory copy,
/// never across an await point.
pub struct LocalBlockStore {
    ownership: OwnershipMap,
    block_size: usize,
    /// Indexed by `OwnershipMap::local_index`.
    blocks: Vec<Mutex<Box<[u8]>>>,
}

impl LocalBlockStore {
    /// Allocates a zeroed buffer for every owned block.
    pub fn new(ownership: OwnershipMap, block_size: usize) -> Self {
        let blocks = (0..ownership.owned_count())
            .map(|_| Mutex::new(vec![0u8; block_size].into_boxed_slice()))
            .collect();

        Self {
            ownership,
            block_size,
            blocks,
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    fn slot(&self, block_id: u32) -> Result<&Mutex<Box<[u8]>>> {
        if !self.ownership.contains(block_id) {
            return Err(DsmError::InvalidArgument(format!(
                "block {} outside of {} blocks",
                block_id,
                self.ownership.block_count()
            )));
        }
        if !self.ownership.is_local(block_id) {
            return Err(DsmError::NotOwner {
                block_id,
                owner: self.ownership.owner(block_id),
                local: self.ownership.local(),
            });
        }
        self.blocks
            .get(self.ownership.local_index(block_id))
            .ok_or_else(|| DsmError::InvalidArgument(format!("block {} not allocated", block_id)))
    }

    fn check_span(&self, offset: usize, length: usize) -> Result<()> {
        if offset
            .checked_add(length)
            .is_none_or(|end| end > self.block_size)
        {
            return Err(DsmError::CrossBlock {
                offset,
                length,
                block_size: self.block_size,
            });
        }
        Ok(())
    }

    pub fn read(&self, block_id: u32, offset: usize, length: usize) -> Result<Vec<u8>> {
        let slot = self.slot(block_id)?;
        self.check_span(offset, length)?;

        let block = slot.lock();
        Ok(block[offset..offset + length].to_vec())
    }

    pub fn write(&self, block_id: u32, offset: usize, data: &[u8]) -> Result<()> {
        let slot = self.slot(block_id)?;
        self.check_span(offset, data.len())?;

        let mut block = slot.lock();
        block[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Copies the whole block, as sent in a `ResponseBlock`.
    pub fn snapshot(&self, block_id: u32) -> Result<Vec<u8>> {
        let slot = self.slot(block_id)?;
        let block = slot.lock();
        Ok(block.to_vec())
    }
}
