//! Allocation header - size prefix for heap blocks
//!
//! Design: 16-byte header placed before every heap payload so `dispose`
//! and `resize` can recover the block layout from the payload pointer alone.

use super::MAX_ALIGN;
use crate::error::{AllocError, Result};
use core::ptr::NonNull;
use std::alloc::Layout;

/// Header (16 bytes) prefixed before every heap allocation
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationHeader {
    pub size: usize,
}

impl AllocationHeader {
    pub const SIZE: usize = core::mem::size_of::<Self>();

    /// Layout of a whole block (header + payload)
    #[inline]
    pub fn layout_for(size: usize) -> Result<Layout> {
        let total = size
            .checked_add(Self::SIZE)
            .ok_or(AllocError::InvalidLayout { size })?;
        Layout::from_size_align(total, MAX_ALIGN).map_err(|_| AllocError::InvalidLayout { size })
    }

    /// Write a header at the start of `block`, returning the payload pointer
    ///
    /// # Safety
    /// `block` must be valid for at least `Self::SIZE` bytes and 16-aligned.
    #[inline]
    pub unsafe fn write(block: NonNull<u8>, size: usize) -> NonNull<u8> {
        block.as_ptr().cast::<Self>().write(Self { size });
        NonNull::new_unchecked(block.as_ptr().add(Self::SIZE))
    }

    /// Get the block start from a payload pointer (header is 16 bytes before)
    ///
    /// # Safety
    /// `payload` must have been returned by `write`.
    #[inline]
    pub unsafe fn block_of(payload: NonNull<u8>) -> NonNull<u8> {
        NonNull::new_unchecked(payload.as_ptr().sub(Self::SIZE))
    }

    /// Read the header belonging to a payload pointer
    ///
    /// # Safety
    /// `payload` must have been returned by `write`.
    #[inline]
    pub unsafe fn read(payload: NonNull<u8>) -> Self {
        Self::block_of(payload).as_ptr().cast::<Self>().read()
    }
}
