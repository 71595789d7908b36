//! FlatPool - virtual-memory-backed bump arena
//!
//! Design: reserve one large address range up front and commit pages only as
//! the bump pointer crosses into them. No block chain and no pointer chasing;
//! memory is never reused until the whole reservation is released.

use super::bump::align_up;
use super::pages;
use crate::allocator::{copy_into, Allocator, AllocatorRef};
use crate::context;
use crate::error::{AllocError, Result};
use crate::logging::log_commit;
use core::cell::Cell;
use core::ptr::NonNull;
use std::rc::Rc;

/// Alignment of every address handed out by a `FlatPool`
pub const FLAT_POOL_ALIGNMENT: usize = 16;

pub struct FlatPool {
    /// `None` once the reservation has been released
    base: Option<NonNull<u8>>,
    start: usize,
    current_point: Cell<usize>,
    first_uncommitted_page: Cell<usize>,
    address_limit: usize,
}

impl FlatPool {
    /// Reserve `reservation` bytes (rounded up to whole pages); failure is fatal
    #[track_caller]
    pub fn new(reservation: usize) -> Self {
        match Self::try_new(reservation) {
            Ok(pool) => pool,
            Err(err) => context::fatal(err),
        }
    }

    pub fn try_new(reservation: usize) -> Result<Self> {
        let size = align_up(reservation.max(1), pages::page_size());
        let base = pages::reserve(size)?;
        let start = base.as_ptr() as usize;

        tracing::debug!(target: "ncz::flat", reserved_bytes = size, "reserved address space");

        Ok(Self {
            base: Some(base),
            start,
            current_point: Cell::new(start),
            first_uncommitted_page: Cell::new(start),
            address_limit: start + size,
        })
    }

    pub fn allocator(self: &Rc<Self>) -> AllocatorRef {
        AllocatorRef::new(self.clone())
    }

    /// Bytes handed out so far (including alignment padding)
    pub fn used(&self) -> usize {
        self.current_point.get() - self.start
    }

    /// Bytes backed by committed pages
    pub fn committed(&self) -> usize {
        self.first_uncommitted_page.get() - self.start
    }

    /// Size of the reservation
    pub fn capacity(&self) -> usize {
        self.address_limit - self.start
    }

    #[track_caller]
    pub fn get(&self, size: usize) -> NonNull<u8> {
        match self.try_get(size) {
            Ok(ptr) => ptr,
            Err(err) => context::fatal(err),
        }
    }

    pub fn try_get(&self, size: usize) -> Result<NonNull<u8>> {
        let current = self.current_point.get();
        let remaining = if self.base.is_some() { self.address_limit - current } else { 0 };
        let out_of_space = AllocError::OutOfSpace { allocator: "FlatPool", requested: size, remaining };
        if self.base.is_none() {
            return Err(out_of_space);
        }

        let aligned = align_up(current, FLAT_POOL_ALIGNMENT);
        let end = match aligned.checked_add(size) {
            Some(end) if end <= self.address_limit => end,
            _ => return Err(out_of_space),
        };

        let uncommitted = self.first_uncommitted_page.get();
        if end > uncommitted {
            // address_limit is page aligned, so this never passes it
            let new_boundary = align_up(end, pages::page_size());
            unsafe {
                pages::commit(NonNull::new_unchecked(uncommitted as *mut u8), new_boundary - uncommitted)?;
            }
            self.first_uncommitted_page.set(new_boundary);
            log_commit(self.committed(), self.capacity());
        }

        self.current_point.set(end);
        Ok(unsafe { NonNull::new_unchecked(aligned as *mut u8) })
    }

    /// Unsupported: a flat pool only grows until it is disposed
    pub fn reset(&mut self) -> Result<()> {
        Err(AllocError::ResetUnsupported { allocator: "FlatPool" })
    }

    /// Release the whole reservation; later requests fail as out of space
    pub fn dispose(&mut self) {
        if let Some(base) = self.base.take() {
            let size = self.address_limit - self.start;
            unsafe { pages::release(base, size) };

            tracing::debug!(target: "ncz::flat", released_bytes = size, "released reservation");
            self.current_point.set(self.start);
            self.first_uncommitted_page.set(self.start);
        }
    }
}

impl Drop for FlatPool {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Allocator for FlatPool {
    fn name(&self) -> &'static str {
        "FlatPool"
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

impl core::fmt::Debug for FlatPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FlatPool")
            .field("used", &self.used())
            .field("committed", &self.committed())
            .field("capacity", &self.capacity())
            .finish()
    }
}
