use super::types::SystemConfig;
use crate::error::{DsmError, Result};

/// Location of an access inside the shared address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockAddress {
    pub block_id: u32,
    pub offset: usize,
}

/// Maps a linear `position` to the block holding it.
///
/// An access must fit inside one block: anything spilling past the end of the
/// block is rejected with `CrossBlock` instead of being split or truncated.
pub fn translate(config: &SystemConfig, position: u64, length: usize) -> Result<BlockAddress> {
    let capacity = config.capacity();
    let end = position.checked_add(length as u64);
    if end.is_none_or(|end| end > capacity) {
        return Err(DsmError::OutOfRange {
            position,
            length,
            capacity,
        });
    }

    let block_size = config.block_size as u64;
    let block_id = (position / block_size) as u32;
    let offset = (position % block_size) as usize;

    if offset + length > config.block_size {
        return Err(DsmError::CrossBlock {
            offset,
            length,
            block_size: config.block_size,
        });
    }

    Ok(BlockAddress { block_id, offset })
}
