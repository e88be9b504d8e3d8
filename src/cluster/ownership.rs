/// Static block-to-process assignment: block `b` belongs to process `b mod N`.
///
/// Never mutated after construction; shared freely between the server task and
/// application tasks without locking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnershipMap {
    num_processes: usize,
    block_count: u32,
    local: usize,
}

impl OwnershipMap {
    pub fn new(num_processes: usize, block_count: u32, local: usize) -> Self {
        debug_assert!(num_processes > 0);
        Self {
            num_processes,
            block_count,
            local,
        }
    }

    pub fn num_processes(&self) -> usize {
        self.num_processes
    }

    pub fn block_count(&self) -> u32 {
        self.block_count
    }

    pub fn local(&self) -> usize {
        self.local
    }

    pub fn owner(&self, block_id: u32) -> usize {
        block_id as usize % self.num_processes
    }

    pub fn is_local(&self, block_id: u32) -> bool {
        self.owner(block_id) == self.local
    }

    pub fn contains(&self, block_id: u32) -> bool {
        block_id < self.block_count
    }

    /// Dense index of an owned block inside the local store.
    pub fn local_index(&self, block_id: u32) -> usize {
        block_id as usize / self.num_processes
    }

    pub fn owned_blocks(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.block_count).filter(move |&block_id| self.is_local(block_id))
    }

    pub fn owned_count(&self) -> usize {
        let total = self.block_count as usize;
        if self.local >= total {
            return 0;
        }
        (total - self.local).div_ceil(self.num_processes)
    }

    pub fn peers(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.num_processes).filter(move |&id| id != self.local)
    }
}
