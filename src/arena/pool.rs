//! Pool - growth-list arena
//!
//! Design: a chain of fixed-size blocks obtained from a backing allocator.
//! Small requests bump an offset inside the current block; requests larger
//! than a block get a dedicated oversized block. `reset` rewinds to the first
//! block and keeps every normal block, so steady-state frames allocate nothing.

use super::bump::{align_up, bump};
use crate::allocator::{copy_into, Allocator, AllocatorRef};
use crate::config;
use crate::context;
use crate::error::{AllocError, Result};
use crate::logging::{log_block_acquired, log_oversized, log_pool_reset};
use core::cell::RefCell;
use core::ptr::NonNull;
use std::rc::Rc;

/// Alignment of every address handed out by a `Pool`
pub const POOL_ALIGNMENT: usize = 16;

/// Position inside a pool: a block in the normal chain and an offset into its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolMark {
    block: Option<usize>,
    offset: usize,
}

impl PoolMark {
    const START: Self = Self { block: None, offset: 0 };

    /// Index of the block in the normal chain (`None` before the first block exists)
    #[inline]
    pub fn block(&self) -> Option<usize> {
        self.block
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }
}

/// Block header: raw memory from the backing allocator and the link to the next block
#[derive(Debug)]
struct Block {
    memory: NonNull<u8>,
    next: Option<usize>,
}

impl Block {
    /// First aligned payload address
    #[inline]
    fn payload(&self) -> usize {
        align_up(self.memory.as_ptr() as usize, POOL_ALIGNMENT)
    }
}

struct PoolState {
    backing: AllocatorRef,
    mark: PoolMark,
    /// Normal blocks, linked from `head` through `Block::next`
    blocks: Vec<Block>,
    head: Option<usize>,
    /// One-off blocks for requests larger than `block_size`, newest first
    oversized: Vec<Block>,
    oversized_head: Option<usize>,
}

pub struct Pool {
    block_size: usize,
    poison: Option<u8>,
    state: RefCell<PoolState>,
}

impl Pool {
    /// Pool with `block_size`-byte blocks obtained from `backing`.
    ///
    /// An unset `backing` binds to the context allocator on first use.
    pub fn new(block_size: usize, backing: AllocatorRef) -> Self {
        let config = config::current();
        let block_size = if block_size == 0 { config.pool_block_size } else { block_size };

        Self {
            block_size,
            poison: config.poison_on_reset.then_some(config.poison_byte),
            state: RefCell::new(PoolState {
                backing,
                mark: PoolMark::START,
                blocks: Vec::new(),
                head: None,
                oversized: Vec::new(),
                oversized_head: None,
            }),
        }
    }

    /// Override the reset poisoning behaviour (`None` disables it)
    pub fn with_poison(mut self, poison: Option<u8>) -> Self {
        self.poison = poison;
        self
    }

    /// Expose a shared pool as a generic allocator
    pub fn allocator(self: &Rc<Self>) -> AllocatorRef {
        AllocatorRef::new(self.clone())
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of normal blocks in the chain
    pub fn block_count(&self) -> usize {
        self.state.borrow().blocks.len()
    }

    /// Number of live oversized blocks
    pub fn oversized_count(&self) -> usize {
        self.state.borrow().oversized.len()
    }

    /// Bytes consumed in the block the cursor points at
    pub fn used_in_current_block(&self) -> usize {
        self.state.borrow().mark.offset
    }

    /// Current position of the bump cursor
    pub fn mark(&self) -> PoolMark {
        self.state.borrow().mark
    }

    /// Get `size` bytes aligned to `POOL_ALIGNMENT`; exhausting the backing allocator is fatal
    #[track_caller]
    pub fn get(&self, size: usize) -> NonNull<u8> {
        match self.try_get(size) {
            Ok(ptr) => ptr,
            Err(err) => context::fatal(err),
        }
    }

    pub fn try_get(&self, size: usize) -> Result<NonNull<u8>> {
        if !self.state.borrow().backing.is_set() {
            self.bind_backing();
        }
        let mut state = self.state.borrow_mut();

        if size > self.block_size {
            return self.get_oversized(&mut state, size);
        }

        let current = match state.mark.block {
            Some(current) => current,
            None => {
                let first = state.acquire_block(self.block_size)?;
                state.head = Some(first);
                state.mark = PoolMark { block: Some(first), offset: 0 };
                first
            }
        };

        let base = state.blocks[current].payload();
        if let Some(bumped) = bump(base, state.mark.offset, self.block_size, size, POOL_ALIGNMENT) {
            state.mark.offset = bumped.end_offset;
            return Ok(address(bumped.address));
        }

        // Cycle in the next block, reusing one retained from before a reset
        let next = match state.blocks[current].next {
            Some(next) => next,
            None => {
                let next = state.acquire_block(self.block_size)?;
                state.blocks[current].next = Some(next);
                next
            }
        };

        let base = state.blocks[next].payload();
        let bumped = bump(base, 0, self.block_size, size, POOL_ALIGNMENT)
            .ok_or(AllocError::OutOfSpace { allocator: "Pool", requested: size, remaining: self.block_size })?;
        state.mark = PoolMark { block: Some(next), offset: bumped.end_offset };
        Ok(address(bumped.address))
    }

    fn get_oversized(&self, state: &mut PoolState, size: usize) -> Result<NonNull<u8>> {
        let memory = state.backing.try_allocate(with_alignment_slack(size)?)?;
        let block = Block { memory, next: state.oversized_head };
        let payload = block.payload();

        state.oversized.push(block);
        state.oversized_head = Some(state.oversized.len() - 1);

        log_oversized(size, state.oversized.len());
        Ok(address(payload))
    }

    #[track_caller]
    fn bind_backing(&self) {
        let backing = context::allocator();

        // Binding to ourselves would recurse forever on the first block
        if backing.is_same_object(self as *const Self as *const u8) {
            context::fatal("a Pool cannot be its own backing allocator");
        }
        self.state.borrow_mut().backing = backing;
    }

    /// Rewind to the first block and free every oversized block.
    ///
    /// Normal blocks are kept (and poisoned when enabled).
    pub fn reset(&mut self) {
        let poison = self.poison;
        let block_size = self.block_size;
        let state = self.state.get_mut();

        state.mark = PoolMark { block: state.head, offset: 0 };

        let oversized_freed = state.oversized.len();
        state.dispose_oversized();

        if let Some(byte) = poison {
            for block in &state.blocks {
                unsafe { core::ptr::write_bytes(block.payload() as *mut u8, byte, block_size) };
            }
        }

        log_pool_reset(state.blocks.len(), oversized_freed, poison.is_some());
    }

    /// Move the cursor back to a previously taken mark.
    ///
    /// Oversized blocks are only reclaimed by `reset`. A mark that does not
    /// belong to this pool is fatal.
    #[track_caller]
    pub fn rewind(&mut self, mark: PoolMark) {
        if !self.try_rewind(mark) {
            context::fatal(format!("mark {:?} does not belong to this pool", mark));
        }
    }

    /// `rewind`, reporting an invalid mark as `false` instead
    pub fn try_rewind(&mut self, mark: PoolMark) -> bool {
        let block_size = self.block_size;
        let state = self.state.get_mut();

        let valid = match mark.block {
            Some(block) => block < state.blocks.len() && mark.offset <= block_size,
            None => mark.offset == 0,
        };
        if valid {
            state.mark = match mark.block {
                Some(_) => mark,
                None => PoolMark { block: state.head, offset: 0 },
            };
        }
        valid
    }

    /// Free every block, normal and oversized
    pub fn dispose(&mut self) {
        let state = self.state.get_mut();
        state.dispose_oversized();

        for block in state.blocks.drain(..) {
            unsafe { state.backing.dispose(block.memory) };
        }
        state.head = None;
        state.mark = PoolMark::START;
    }
}

impl PoolState {
    fn acquire_block(&mut self, block_size: usize) -> Result<usize> {
        let memory = self.backing.try_allocate(with_alignment_slack(block_size)?)?;
        self.blocks.push(Block { memory, next: None });

        let index = self.blocks.len() - 1;
        log_block_acquired(index, block_size);
        Ok(index)
    }

    fn dispose_oversized(&mut self) {
        let mut cursor = self.oversized_head.take();
        while let Some(index) = cursor {
            let block = &self.oversized[index];
            cursor = block.next;
            unsafe { self.backing.dispose(block.memory) };
        }
        self.oversized.clear();
    }
}

/// Bytes to request so an aligned payload of `size` fits
#[inline]
fn with_alignment_slack(size: usize) -> Result<usize> {
    size.checked_add(POOL_ALIGNMENT - 1).ok_or(AllocError::InvalidLayout { size })
}

#[inline]
fn address(addr: usize) -> NonNull<u8> {
    // Block payloads are never null
    unsafe { NonNull::new_unchecked(addr as *mut u8) }
}

impl Default for Pool {
    fn default() -> Self {
        Self::new(0, AllocatorRef::unset())
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Allocator for Pool {
    fn name(&self) -> &'static str {
        "Pool"
    }

    fn allocate(&self, size: usize) -> Result<NonNull<u8>> {
        self.try_get(size)
    }

    unsafe fn resize(&self, ptr: NonNull<u8>, old_size: usize, new_size: usize) -> Result<NonNull<u8>> {
        let new = self.try_get(new_size)?;
        Ok(copy_into(new, ptr, old_size, new_size))
    }

    /// Freeing is bulk only
    unsafe fn dispose(&self, _ptr: NonNull<u8>) {}
}

impl core::fmt::Debug for Pool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Pool")
            .field("block_size", &self.block_size)
            .field("blocks", &state.blocks.len())
            .field("oversized", &state.oversized.len())
            .field("mark", &state.mark)
            .field("backing", &state.backing)
            .finish()
    }
}
