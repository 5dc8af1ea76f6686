//! Fixed-size block pool on top of a [`Region`].
//!
//! Blocks are carved from the pool's own region and tracked in a slot table.
//! Freed blocks go onto a LIFO stack of slot indices, so the most recently
//! freed block is the next one handed out. Memory only goes back to the
//! system when the pool is released or dropped.

use std::fmt;
use std::ptr::NonNull;
use std::slice;

use crate::error::PoolError;
use crate::memory::region::Region;

/// Smallest block the pool hands out, in bytes.
pub const MIN_BLOCK_SIZE: usize = 16;

/// Handle to a block issued by a [`Pool`].
///
/// Every hand-out gets a new generation, so a handle kept past `free` or
/// `release` is rejected even after its slot is reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId {
    index: usize,
    generation: u64,
}

impl BlockId {
    /// Index of the block in the pool's slot table.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

struct Slot {
    ptr: NonNull<u8>,
    live: bool,
    generation: u64,
}

/// Allocator of equally sized blocks with free-list reuse.
pub struct Pool {
    block_size: usize,
    region: Region,
    slots: Vec<Slot>,
    free: Vec<usize>,
    next_generation: u64,
}

// SAFETY: the slot pointers only refer into `region`, which the pool owns
// exclusively and which moves with it.
unsafe impl Send for Pool {}

impl Pool {
    /// Create a pool of `block_size`-byte blocks with room for `count` blocks
    /// before its region has to grow. Block sizes below
    /// [`MIN_BLOCK_SIZE`] are rounded up.
    pub fn new(block_size: usize, count: usize) -> Self {
        let block_size = block_size.max(MIN_BLOCK_SIZE);
        Pool {
            block_size,
            region: Region::new(block_size.saturating_mul(count)),
            slots: Vec::with_capacity(count),
            free: Vec::new(),
            next_generation: 0,
        }
    }

    /// Hand out a block, reusing the most recently freed one if any.
    pub fn alloc(&mut self) -> BlockId {
        let generation = self.next_generation;
        self.next_generation += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.live = true;
            slot.generation = generation;
            return BlockId { index, generation };
        }
        let ptr = NonNull::from(self.region.alloc(self.block_size)).cast::<u8>();
        self.slots.push(Slot {
            ptr,
            live: true,
            generation,
        });
        BlockId {
            index: self.slots.len() - 1,
            generation,
        }
    }

    /// Return a block to the free list.
    pub fn free(&mut self, block: BlockId) -> Result<(), PoolError> {
        let slot = self.live_slot(block)?;
        self.slots[slot].live = false;
        self.free.push(slot);
        Ok(())
    }

    /// Contents of a live block.
    pub fn get(&self, block: BlockId) -> Result<&[u8], PoolError> {
        let slot = self.live_slot(block)?;
        // SAFETY: live slots point at `block_size` committed bytes of
        // `self.region`, which is only released together with the slot table.
        Ok(unsafe { slice::from_raw_parts(self.slots[slot].ptr.as_ptr(), self.block_size) })
    }

    /// Mutable contents of a live block.
    pub fn get_mut(&mut self, block: BlockId) -> Result<&mut [u8], PoolError> {
        let slot = self.live_slot(block)?;
        // SAFETY: as in `get`; blocks never overlap and `&mut self` rules out
        // any other view of this one.
        Ok(unsafe {
            slice::from_raw_parts_mut(self.slots[slot].ptr.as_ptr(), self.block_size)
        })
    }

    /// Invalidate every block and rewind the region for reuse.
    pub fn release(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.region.release();
    }

    /// Size of every block in bytes.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Blocks currently handed out.
    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// The region blocks are carved from.
    pub fn region(&self) -> &Region {
        &self.region
    }

    fn live_slot(&self, block: BlockId) -> Result<usize, PoolError> {
        let index = block.index;
        match self.slots.get(index) {
            None => Err(PoolError::UnknownBlock { block: index }),
            Some(slot) if slot.generation != block.generation => {
                Err(PoolError::Stale { block: index })
            }
            Some(slot) if !slot.live => Err(PoolError::NotLive { block: index }),
            Some(_) => Ok(index),
        }
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("block_size", &self.block_size)
            .field("live", &self.live_count())
            .field("free", &self.free.len())
            .field("region", &self.region)
            .finish()
    }
}
