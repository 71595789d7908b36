//! FixedPool - compile-time-sized bump arena
//!
//! Design: an inline byte buffer and a count, no backing allocator and no
//! growth. Meant for scripts with a hard memory ceiling, so running out is an
//! immediate fatal error rather than silent growth.

use super::bump::bump;
use crate::allocator::{copy_into, Allocator, AllocatorRef};
use crate::context;
use crate::error::{AllocError, Result};
use core::cell::{Cell, UnsafeCell};
use core::ptr::NonNull;
use std::alloc::{alloc_zeroed, handle_alloc_error, Layout};
use std::rc::Rc;

/// Every address handed out is aligned to a pointer
const FIXED_POOL_ALIGNMENT: usize = core::mem::align_of::<usize>();

#[repr(C, align(16))]
struct Storage<const N: usize>([u8; N]);

pub struct FixedPool<const N: usize> {
    storage: UnsafeCell<Storage<N>>,
    count: Cell<usize>,
}

impl<const N: usize> FixedPool<N> {
    /// Build the pool by value. The buffer lives inline, so large `N` belongs
    /// in `new_boxed` instead of on the stack.
    pub const fn new() -> Self {
        Self {
            storage: UnsafeCell::new(Storage([0; N])),
            count: Cell::new(0),
        }
    }

    /// Build the pool directly on the heap, never materialising `[u8; N]`
    /// on the stack
    pub fn new_boxed() -> Box<Self> {
        let layout = Layout::new::<Self>();
        // Never zero-sized: `count` is always present
        let raw = unsafe { alloc_zeroed(layout) } as *mut Self;
        if raw.is_null() {
            handle_alloc_error(layout);
        }
        // All-zero bytes are an empty pool
        unsafe { Box::from_raw(raw) }
    }

    /// Expose a shared pool as a generic allocator
    pub fn allocator(self: &Rc<Self>) -> AllocatorRef {
        AllocatorRef::new(self.clone())
    }

    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    #[inline]
    pub fn used(&self) -> usize {
        self.count.get()
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        N - self.count.get()
    }

    /// Get `size` bytes; exceeding the capacity is fatal
    #[track_caller]
    pub fn get(&self, size: usize) -> NonNull<u8> {
        match self.try_get(size) {
            Ok(ptr) => ptr,
            Err(err) => context::fatal(err),
        }
    }

    pub fn try_get(&self, size: usize) -> Result<NonNull<u8>> {
        let base = self.storage.get() as usize;

        match bump(base, self.count.get(), N, size, FIXED_POOL_ALIGNMENT) {
            Some(bumped) => {
                self.count.set(bumped.end_offset);
                // Inside the inline buffer, never null
                Ok(unsafe { NonNull::new_unchecked(bumped.address as *mut u8) })
            }
            None => Err(AllocError::OutOfSpace {
                allocator: "FixedPool",
                requested: size,
                remaining: self.remaining(),
            }),
        }
    }

    pub fn reset(&mut self) {
        self.count.set(0);
    }
}

impl<const N: usize> Default for FixedPool<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Allocator for FixedPool<N> {
    fn name(&self) -> &'static str {
        "FixedPool"
    }

    fn allocate(&self, size: usize) -> Result<NonNull<u8>> {
        self.try_get(size)
    }

    unsafe fn resize(&self, ptr: NonNull<u8>, old_size: usize, new_size: usize) -> Result<NonNull<u8>> {
        let new = self.try_get(new_size)?;
        Ok(copy_into(new, ptr, old_size, new_size))
    }

    unsafe fn dispose(&self, _ptr: NonNull<u8>) {}
}

impl<const N: usize> core::fmt::Debug for FixedPool<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FixedPool")
            .field("capacity", &N)
            .field("used", &self.used())
            .finish()
    }
}
