//! Fixed-size chunks of memory that back a [`WriteBuffer`](super::write_buffer::WriteBuffer),
//! along with the allocators that hand them out.
//!
//! A [`BlockAllocatorProvider`] may be shared freely between threads. The allocators it vends
//! and the blocks those allocators produce belong to a single writer.

use std::fmt;
use std::mem;
use std::sync::{Arc, LazyLock, Mutex};

use crossbeam_queue::ArrayQueue;
use rustc_hash::FxHashMap;

/// The upper bound on the number of bytes a single pool will hold onto while its blocks are not
/// in use. Blocks released beyond this budget are returned to the system allocator.
const MAX_RETAINED_BYTES_PER_POOL: usize = 64 * 1024 * 1024;

/// The upper bound on the number of blocks a single pool will hold onto, whatever their size.
const MAX_FREE_BLOCKS_PER_POOL: usize = 2048;

/// A contiguous, fixed-capacity region of memory along with the number of bytes in use.
///
/// When a block that came from a pool is dropped (or [closed](Block::close)), its memory is
/// returned to that pool so a later allocation can reuse it.
pub struct Block {
    data: Box<[u8]>,
    limit: usize,
    pool: Option<Arc<BlockPool>>,
}

impl Block {
    fn new(data: Box<[u8]>, pool: Option<Arc<BlockPool>>) -> Self {
        Block {
            data,
            limit: 0,
            pool,
        }
    }

    /// The total number of bytes this block can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The number of bytes that have been written to this block.
    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    #[inline]
    pub(crate) fn set_limit(&mut self, limit: usize) {
        debug_assert!(limit <= self.capacity());
        self.limit = limit;
    }

    /// The number of bytes that can still be appended to this block.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.limit
    }

    /// Marks the block as empty. Its previous contents are left in place and will be overwritten.
    pub fn reset(&mut self) {
        self.limit = 0;
    }

    /// The bytes that have been written to this block.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.limit]
    }

    #[inline]
    pub(crate) fn data(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Releases this block. Pooled blocks go back to their allocator's free list.
    pub fn close(self) {}
}

impl Drop for Block {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.release(mem::take(&mut self.data));
        }
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("capacity", &self.capacity())
            .field("limit", &self.limit)
            .field("pooled", &self.pool.is_some())
            .finish()
    }
}

/// Hands out [`Block`]s of a single, fixed size.
pub trait BlockAllocator: Send + fmt::Debug {
    /// The capacity of every block this allocator produces.
    fn block_size(&self) -> usize;

    /// Returns an empty block that belongs to the caller until it is dropped or closed.
    fn allocate_block(&self) -> Block;
}

/// A thread-safe factory for [`BlockAllocator`]s.
pub trait BlockAllocatorProvider: Send + Sync + fmt::Debug {
    fn vend_allocator(&self, block_size: usize) -> Box<dyn BlockAllocator>;
}

/// An allocator that requests fresh memory for every block and frees it on release. Useful for
/// short-lived writers that should not hold on to pooled memory.
#[derive(Debug, Clone, Copy)]
pub struct BasicBlockAllocator {
    block_size: usize,
}

impl BasicBlockAllocator {
    pub fn new(block_size: usize) -> Self {
        BasicBlockAllocator { block_size }
    }
}

impl BlockAllocator for BasicBlockAllocator {
    fn block_size(&self) -> usize {
        self.block_size
    }

    fn allocate_block(&self) -> Block {
        Block::new(vec![0u8; self.block_size].into_boxed_slice(), None)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BasicBlockAllocatorProvider;

impl BlockAllocatorProvider for BasicBlockAllocatorProvider {
    fn vend_allocator(&self, block_size: usize) -> Box<dyn BlockAllocator> {
        Box::new(BasicBlockAllocator::new(block_size))
    }
}

// The free list for one block size. Acquiring and releasing blocks never takes a lock.
struct BlockPool {
    block_size: usize,
    free: ArrayQueue<Box<[u8]>>,
}

impl BlockPool {
    fn new(block_size: usize) -> Self {
        let max_free_blocks =
            (MAX_RETAINED_BYTES_PER_POOL / block_size.max(1)).clamp(1, MAX_FREE_BLOCKS_PER_POOL);
        Self::with_max_free_blocks(block_size, max_free_blocks)
    }

    fn with_max_free_blocks(block_size: usize, max_free_blocks: usize) -> Self {
        BlockPool {
            block_size,
            free: ArrayQueue::new(max_free_blocks),
        }
    }

    fn max_free_blocks(&self) -> usize {
        self.free.capacity()
    }

    fn acquire(&self) -> Option<Box<[u8]>> {
        self.free.pop()
    }

    fn release(&self, data: Box<[u8]>) {
        if data.len() != self.block_size {
            return;
        }
        // A full queue hands the block back; dropping it frees the memory.
        let _ = self.free.push(data);
    }

    fn free_count(&self) -> usize {
        self.free.len()
    }
}

impl fmt::Debug for BlockPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockPool")
            .field("block_size", &self.block_size)
            .field("free", &self.free_count())
            .finish()
    }
}

/// An allocator that recycles blocks through a free list shared with every other allocator the
/// same provider vended for this block size.
#[derive(Debug, Clone)]
pub struct PooledBlockAllocator {
    pool: Arc<BlockPool>,
}

impl BlockAllocator for PooledBlockAllocator {
    fn block_size(&self) -> usize {
        self.pool.block_size
    }

    fn allocate_block(&self) -> Block {
        let data = self
            .pool
            .acquire()
            .unwrap_or_else(|| vec![0u8; self.pool.block_size].into_boxed_slice());
        Block::new(data, Some(Arc::clone(&self.pool)))
    }
}

/// Keeps one free list per block size. Only vending an allocator consults the shared map of
/// pools; the blocks themselves move through the lock-free free lists.
#[derive(Debug, Default)]
pub struct PooledBlockAllocatorProvider {
    pools: Mutex<FxHashMap<usize, Arc<BlockPool>>>,
}

impl PooledBlockAllocatorProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of released blocks of `block_size` bytes currently waiting to be reused.
    pub fn free_blocks(&self, block_size: usize) -> usize {
        let pools = self.pools.lock().unwrap_or_else(|e| e.into_inner());
        pools.get(&block_size).map_or(0, |pool| pool.free_count())
    }
}

impl BlockAllocatorProvider for PooledBlockAllocatorProvider {
    fn vend_allocator(&self, block_size: usize) -> Box<dyn BlockAllocator> {
        let mut pools = self.pools.lock().unwrap_or_else(|e| e.into_inner());
        let pool = pools.entry(block_size).or_insert_with(|| {
            log::trace!("creating block pool for {block_size}-byte blocks");
            Arc::new(BlockPool::new(block_size))
        });
        Box::new(PooledBlockAllocator {
            pool: Arc::clone(pool),
        })
    }
}

static POOLED_PROVIDER: LazyLock<Arc<PooledBlockAllocatorProvider>> =
    LazyLock::new(|| Arc::new(PooledBlockAllocatorProvider::new()));

/// The process-wide pooled provider used by writers that do not configure their own.
pub fn pooled_block_allocator_provider() -> Arc<dyn BlockAllocatorProvider> {
    Arc::clone(&*POOLED_PROVIDER) as Arc<dyn BlockAllocatorProvider>
}
