//! List - growable array over an `AllocatorRef`
//!
//! Unlike `Vec`, the backing memory comes from whichever allocator the list
//! holds (the context allocator by default), so a list built inside a
//! temporary-storage scope costs nothing to throw away.

use crate::allocator::{AllocatorRef, MAX_ALIGN};
use crate::config;
use crate::context;
use core::fmt;
use core::marker::PhantomData;
use core::mem;
use core::ops::{Deref, DerefMut};
use core::ptr::{self, NonNull};

pub struct List<T> {
    data: Option<NonNull<T>>,
    len: usize,
    capacity: usize,
    allocator: AllocatorRef,
    _owns: PhantomData<T>,
}

impl<T> List<T> {
    /// Empty list bound to the context allocator on first growth
    pub const fn new() -> Self {
        Self::new_in(AllocatorRef::unset())
    }

    pub const fn new_in(allocator: AllocatorRef) -> Self {
        Self {
            data: None,
            len: 0,
            capacity: 0,
            allocator,
            _owns: PhantomData,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn allocator(&self) -> &AllocatorRef {
        &self.allocator
    }

    pub fn push(&mut self, value: T) {
        if self.len == self.capacity {
            self.grow();
        }
        unsafe { ptr::write(self.ptr().add(self.len), value) };
        self.len += 1;
    }

    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        Some(unsafe { ptr::read(self.ptr().add(self.len)) })
    }

    /// Remove the item at `index`, moving the last item into its place
    #[track_caller]
    pub fn swap_remove(&mut self, index: usize) -> T {
        if index >= self.len {
            context::fatal(format!("swap_remove index {} out of bounds (len {})", index, self.len));
        }
        let last = self.len - 1;
        self.as_mut_slice().swap(index, last);
        self.len = last;
        unsafe { ptr::read(self.ptr().add(self.len)) }
    }

    /// Drop every item, keeping the memory
    pub fn clear(&mut self) {
        let items: *mut [T] = self.as_mut_slice();
        self.len = 0;
        unsafe { ptr::drop_in_place(items) };
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        unsafe { core::slice::from_raw_parts(self.ptr(), self.len) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        unsafe { core::slice::from_raw_parts_mut(self.ptr(), self.len) }
    }

    #[inline]
    fn ptr(&self) -> *mut T {
        self.data.unwrap_or(NonNull::dangling()).as_ptr()
    }

    #[track_caller]
    fn grow(&mut self) {
        if mem::size_of::<T>() == 0 {
            self.capacity = usize::MAX;
            return;
        }
        if mem::align_of::<T>() > MAX_ALIGN {
            context::fatal(format!("List items need alignment {}, more than {}", mem::align_of::<T>(), MAX_ALIGN));
        }

        self.allocator.bind();
        let new_capacity = match self.capacity {
            0 => config::current().list_capacity,
            n => n * 2,
        };
        let old_bytes = self.capacity * mem::size_of::<T>();
        let new_bytes = match new_capacity.checked_mul(mem::size_of::<T>()) {
            Some(bytes) => bytes,
            None => context::fatal(format!("List capacity {} overflows", new_capacity)),
        };

        let memory = unsafe { self.allocator.resize(self.data.map(NonNull::cast), old_bytes, new_bytes) };
        if memory.as_ptr() as usize % mem::align_of::<T>() != 0 {
            context::fatal(format!("{} returned memory misaligned for List items", self.allocator.name()));
        }

        self.data = Some(memory.cast());
        self.capacity = new_capacity;
    }
}

impl<T: Clone> List<T> {
    pub fn extend_from_slice(&mut self, items: &[T]) {
        while self.len + items.len() > self.capacity {
            self.grow();
        }
        for item in items {
            unsafe { ptr::write(self.ptr().add(self.len), item.clone()) };
            self.len += 1;
        }
    }
}

impl<T> Drop for List<T> {
    fn drop(&mut self) {
        self.clear();
        if let Some(data) = self.data.take() {
            if mem::size_of::<T>() != 0 {
                unsafe { self.allocator.dispose(data.cast()) };
            }
        }
    }
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Deref for List<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T> DerefMut for List<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<'a, T> IntoIterator for &'a List<T> {
    type Item = &'a T;
    type IntoIter = core::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

impl<'a, T> IntoIterator for &'a mut List<T> {
    type Item = &'a mut T;
    type IntoIter = core::slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_mut_slice().iter_mut()
    }
}

impl<T> Extend<T> for List<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push(item);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for List<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Growable UTF-8 text over an `AllocatorRef`
#[derive(Default)]
pub struct StringBuilder {
    bytes: List<u8>,
}

impl StringBuilder {
    pub const fn new() -> Self {
        Self { bytes: List::new() }
    }

    pub const fn new_in(allocator: AllocatorRef) -> Self {
        Self { bytes: List::new_in(allocator) }
    }

    pub fn push_str(&mut self, text: &str) {
        self.bytes.extend_from_slice(text.as_bytes());
    }

    pub fn push(&mut self, c: char) {
        let mut buf = [0u8; 4];
        self.push_str(c.encode_utf8(&mut buf));
    }

    pub fn as_str(&self) -> &str {
        // Only whole `str`s are ever appended
        unsafe { core::str::from_utf8_unchecked(self.bytes.as_slice()) }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn allocator(&self) -> &AllocatorRef {
        self.bytes.allocator()
    }
}

impl fmt::Write for StringBuilder {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_str(s);
        Ok(())
    }
}

impl Deref for StringBuilder {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for StringBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for StringBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.as_str(), f)
    }
}

/// Format into memory from the context allocator
pub fn sprint(args: fmt::Arguments<'_>) -> StringBuilder {
    print_in(AllocatorRef::unset(), args)
}

/// Format into temporary storage; valid until the scratch pool is reset or rewound
pub fn tprint(args: fmt::Arguments<'_>) -> StringBuilder {
    print_in(context::temp(), args)
}

fn print_in(allocator: AllocatorRef, args: fmt::Arguments<'_>) -> StringBuilder {
    let mut sb = StringBuilder::new_in(allocator);
    // Writing into a StringBuilder never fails
    let _ = fmt::Write::write_fmt(&mut sb, args);
    sb
}
