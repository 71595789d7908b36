//! Allocator capability - one interface for every memory source
//!
//! Design: a minimal three-operation capability (allocate, resize, dispose)
//! implemented by the system heap and by every arena. Containers hold an
//! `AllocatorRef`, never a concrete allocator type.
//!
//! Arenas implement `dispose` as a no-op: their memory is reclaimed in bulk by
//! `reset`/`dispose` of the whole arena.

mod header;
mod heap;


pub use header::AllocationHeader;
pub use heap::Heap;

use crate::context;
use crate::error::Result;
use core::fmt;
use core::ptr::NonNull;
use std::rc::Rc;

/// Alignment guaranteed by the heap and the pooling arenas
pub const MAX_ALIGN: usize = 16;

/// Operation requested through `Allocator::invoke`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocatorMode {
    Allocate = 0,
    Resize = 1,
    Dispose = 2,
}

/// The allocation capability.
///
/// Implementations use interior mutability: allocators are shared between
/// containers on one thread and are deliberately `!Sync`.
pub trait Allocator {
    /// Short name used in diagnostics
    fn name(&self) -> &'static str;

    /// Obtain `size` bytes
    fn allocate(&self, size: usize) -> Result<NonNull<u8>>;

    /// Grow or move an allocation, preserving the first `min(old_size, new_size)` bytes.
    ///
    /// # Safety
    /// `ptr` must come from this allocator and be at least `old_size` bytes long.
    unsafe fn resize(&self, ptr: NonNull<u8>, old_size: usize, new_size: usize) -> Result<NonNull<u8>>;

    /// Release an allocation. Size information is not required.
    ///
    /// # Safety
    /// `ptr` must come from this allocator and must not be used afterwards.
    unsafe fn dispose(&self, ptr: NonNull<u8>);

    /// Dispatch on `mode`, the single entry point of the capability.
    ///
    /// `Resize` without an old pointer behaves like `Allocate`; `Dispose`
    /// always returns `Ok(None)`.
    ///
    /// # Safety
    /// Same contract as `resize` and `dispose` for `old_ptr`.
    unsafe fn invoke(
        &self,
        mode: AllocatorMode,
        size: usize,
        old_size: usize,
        old_ptr: Option<NonNull<u8>>,
    ) -> Result<Option<NonNull<u8>>> {
        match mode {
            AllocatorMode::Allocate => self.allocate(size).map(Some),
            AllocatorMode::Resize => match old_ptr {
                Some(ptr) => self.resize(ptr, old_size, size).map(Some),
                None => self.allocate(size).map(Some),
            },
            AllocatorMode::Dispose => {
                if let Some(ptr) = old_ptr {
                    self.dispose(ptr);
                }
                Ok(None)
            }
        }
    }
}

/// Resize for bump allocators: take fresh memory and copy the old contents over.
///
/// # Safety
/// `old` must be valid for `old_size` bytes and must not overlap `new`.
#[inline]
pub(crate) unsafe fn copy_into(new: NonNull<u8>, old: NonNull<u8>, old_size: usize, new_size: usize) -> NonNull<u8> {
    core::ptr::copy_nonoverlapping(old.as_ptr(), new.as_ptr(), old_size.min(new_size));
    new
}

/// Shared handle to an allocator.
///
/// Cloning shares the underlying allocator. The default value is *unset* and
/// binds to the context allocator the first time a container needs memory.
#[derive(Clone, Default)]
pub struct AllocatorRef {
    inner: Option<Rc<dyn Allocator>>,
}

impl AllocatorRef {
    pub const fn unset() -> Self {
        Self { inner: None }
    }

    pub fn new(allocator: Rc<dyn Allocator>) -> Self {
        Self { inner: Some(allocator) }
    }

    /// A handle to the system heap
    pub fn heap() -> Self {
        Self::new(Rc::new(Heap))
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.inner.is_some()
    }

    pub fn name(&self) -> &'static str {
        self.inner.as_ref().map_or("unset", |a| a.name())
    }

    /// Resolve an unset handle to the current context allocator
    pub fn bind(&mut self) {
        if self.inner.is_none() {
            *self = context::allocator();
        }
    }

    /// Whether both handles share the same allocator instance
    pub fn same_as(&self, other: &AllocatorRef) -> bool {
        match (&self.inner, &other.inner) {
            (Some(a), Some(b)) => Rc::as_ptr(a) as *const u8 == Rc::as_ptr(b) as *const u8,
            (None, None) => true,
            _ => false,
        }
    }

    /// Run `f` against this handle's allocator; an unset handle uses the
    /// context allocator of the moment
    fn with_resolved<R>(&self, f: impl FnOnce(&dyn Allocator) -> R) -> R {
        match &self.inner {
            Some(allocator) => f(allocator.as_ref()),
            None => match context::allocator().inner {
                Some(allocator) => f(allocator.as_ref()),
                // The context always holds a set allocator
                None => f(&Heap),
            },
        }
    }

    pub fn try_allocate(&self, size: usize) -> Result<NonNull<u8>> {
        self.with_resolved(|allocator| allocator.allocate(size))
    }

    /// Allocate `size` bytes; exhaustion is fatal
    #[track_caller]
    pub fn allocate(&self, size: usize) -> NonNull<u8> {
        match self.try_allocate(size) {
            Ok(ptr) => ptr,
            Err(err) => context::fatal(err),
        }
    }

    /// # Safety
    /// `ptr`, when present, must come from the allocator this handle resolves
    /// to and be `old_size` bytes long.
    #[track_caller]
    pub unsafe fn resize(&self, ptr: Option<NonNull<u8>>, old_size: usize, new_size: usize) -> NonNull<u8> {
        match self.with_resolved(|allocator| allocator.invoke(AllocatorMode::Resize, new_size, old_size, ptr)) {
            Ok(Some(ptr)) => ptr,
            Ok(None) => context::fatal("resize returned no memory"),
            Err(err) => context::fatal(err),
        }
    }

    /// # Safety
    /// `ptr` must come from the allocator this handle resolves to and must
    /// not be used afterwards.
    pub unsafe fn dispose(&self, ptr: NonNull<u8>) {
        self.with_resolved(|allocator| allocator.dispose(ptr))
    }

    /// Whether this handle refers to the allocator living at `object`
    pub(crate) fn is_same_object(&self, object: *const u8) -> bool {
        self.inner
            .as_ref()
            .map_or(false, |a| Rc::as_ptr(a) as *const u8 == object)
    }
}

impl fmt::Debug for AllocatorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AllocatorRef").field(&self.name()).finish()
    }
}

impl<A: Allocator + 'static> From<Rc<A>> for AllocatorRef {
    fn from(allocator: Rc<A>) -> Self {
        Self::new(allocator)
    }
}

/// Allocate from the context allocator
#[track_caller]
pub fn allocate(size: usize) -> NonNull<u8> {
    context::allocator().allocate(size)
}

/// Resize through the context allocator
///
/// # Safety
/// `ptr` must come from the current context allocator.
#[track_caller]
pub unsafe fn resize(ptr: NonNull<u8>, size: usize, old_size: usize) -> NonNull<u8> {
    context::allocator().resize(Some(ptr), old_size, size)
}

/// Dispose through the context allocator
///
/// # Safety
/// `ptr` must come from the current context allocator.
#[track_caller]
pub unsafe fn dispose(ptr: NonNull<u8>) {
    context::allocator().dispose(ptr)
}
