//! System heap allocator
//!
//! Uses the standard allocator for portability; every block carries an
//! `AllocationHeader` so disposal needs no size.

use super::{Allocator, AllocationHeader};
use crate::error::{AllocError, Result};
use crate::logging::{log_allocation, log_deallocation};
use core::ptr::NonNull;
use std::alloc::{alloc, dealloc, realloc};

/// Allocator backed by the process heap
#[derive(Debug, Default, Clone, Copy)]
pub struct Heap;

impl Allocator for Heap {
    fn name(&self) -> &'static str {
        "Heap"
    }

    fn allocate(&self, size: usize) -> Result<NonNull<u8>> {
        let layout = AllocationHeader::layout_for(size)?;

        let block = NonNull::new(unsafe { alloc(layout) })
            .ok_or(AllocError::HeapExhausted { size })?;
        let payload = unsafe { AllocationHeader::write(block, size) };

        log_allocation(size, payload.as_ptr());
        Ok(payload)
    }

    unsafe fn resize(&self, ptr: NonNull<u8>, _old_size: usize, new_size: usize) -> Result<NonNull<u8>> {
        let header = AllocationHeader::read(ptr);
        let old_layout = AllocationHeader::layout_for(header.size)?;
        let new_layout = AllocationHeader::layout_for(new_size)?;

        let block = AllocationHeader::block_of(ptr);
        let moved = NonNull::new(realloc(block.as_ptr(), old_layout, new_layout.size()))
            .ok_or(AllocError::HeapExhausted { size: new_size })?;

        Ok(AllocationHeader::write(moved, new_size))
    }

    unsafe fn dispose(&self, ptr: NonNull<u8>) {
        let header = AllocationHeader::read(ptr);
        log_deallocation(header.size, ptr.as_ptr());

        // Layout was valid when the block was allocated
        if let Ok(layout) = AllocationHeader::layout_for(header.size) {
            dealloc(AllocationHeader::block_of(ptr).as_ptr(), layout);
        }
    }
}
