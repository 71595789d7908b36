//! OS page primitives - reserve address space, commit it lazily, release it
//!
//! Unix reserves with `mmap(PROT_NONE)` and commits with `mprotect`; Windows
//! uses `VirtualAlloc` with `MEM_RESERVE` then `MEM_COMMIT`.

use crate::error::{AllocError, Result};
use core::ptr::NonNull;
use once_cell::sync::Lazy;

static PAGE_SIZE: Lazy<usize> = Lazy::new(os::page_size);

/// Size of a virtual memory page
#[inline]
pub fn page_size() -> usize {
    *PAGE_SIZE
}

/// Reserve `size` bytes of address space without committing memory.
///
/// `size` must be a multiple of the page size.
pub fn reserve(size: usize) -> Result<NonNull<u8>> {
    debug_assert_eq!(size % page_size(), 0, "reservation must be page aligned");
    os::reserve(size)
}

/// Make `[ptr, ptr + size)` readable and writable.
///
/// # Safety
/// The range must be page aligned and lie inside a live reservation.
pub unsafe fn commit(ptr: NonNull<u8>, size: usize) -> Result<()> {
    os::commit(ptr, size)
}

/// Return a whole reservation to the OS.
///
/// # Safety
/// `ptr` and `size` must describe exactly one reservation from `reserve`,
/// and no memory inside it may be used afterwards.
pub unsafe fn release(ptr: NonNull<u8>, size: usize) {
    os::release(ptr, size)
}

#[cfg(unix)]
mod os {
    use super::*;

    pub fn page_size() -> usize {
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size < 1 { 4096 } else { size as usize }
    }

    pub fn reserve(size: usize) -> Result<NonNull<u8>> {
        let memory = unsafe {
            libc::mmap(
                core::ptr::null_mut(),
                size,
                libc::PROT_NONE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };

        if memory == libc::MAP_FAILED {
            return Err(AllocError::ReserveFailed { size });
        }
        NonNull::new(memory.cast()).ok_or(AllocError::ReserveFailed { size })
    }

    pub unsafe fn commit(ptr: NonNull<u8>, size: usize) -> Result<()> {
        let rc = libc::mprotect(ptr.as_ptr().cast(), size, libc::PROT_READ | libc::PROT_WRITE);
        if rc == 0 { Ok(()) } else { Err(AllocError::CommitFailed { size }) }
    }

    pub unsafe fn release(ptr: NonNull<u8>, size: usize) {
        libc::munmap(ptr.as_ptr().cast(), size);
    }
}

#[cfg(windows)]
mod os {
    use super::*;
    use winapi::um::memoryapi::{VirtualAlloc, VirtualFree};
    use winapi::um::sysinfoapi::{GetSystemInfo, SYSTEM_INFO};
    use winapi::um::winnt::{MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_NOACCESS, PAGE_READWRITE};

    pub fn page_size() -> usize {
        let mut info: SYSTEM_INFO = unsafe { core::mem::zeroed() };
        unsafe { GetSystemInfo(&mut info) };
        info.dwPageSize as usize
    }

    pub fn reserve(size: usize) -> Result<NonNull<u8>> {
        let memory = unsafe { VirtualAlloc(core::ptr::null_mut(), size, MEM_RESERVE, PAGE_NOACCESS) };
        NonNull::new(memory.cast()).ok_or(AllocError::ReserveFailed { size })
    }

    pub unsafe fn commit(ptr: NonNull<u8>, size: usize) -> Result<()> {
        let memory = VirtualAlloc(ptr.as_ptr().cast(), size, MEM_COMMIT, PAGE_READWRITE);
        if memory.is_null() { Err(AllocError::CommitFailed { size }) } else { Ok(()) }
    }

    pub unsafe fn release(ptr: NonNull<u8>, _size: usize) {
        VirtualFree(ptr.as_ptr().cast(), 0, MEM_RELEASE);
    }
}

#[cfg(not(any(unix, windows)))]
mod os {
    use super::*;

    pub fn page_size() -> usize {
        4096
    }

    pub fn reserve(size: usize) -> Result<NonNull<u8>> {
        Err(AllocError::ReserveFailed { size })
    }

    pub unsafe fn commit(_ptr: NonNull<u8>, size: usize) -> Result<()> {
        Err(AllocError::CommitFailed { size })
    }

    pub unsafe fn release(_ptr: NonNull<u8>, _size: usize) {}
}
