//! BucketArray - slot-recycling store with stable indices
//!
//! Design: items live in fixed-size buckets that are never moved once
//! created, so a `BucketIndex` (and any reference obtained through it) stays
//! valid until the slot is released. Each bucket is one allocation holding an
//! occupancy bitmap followed by its item slots:
//!
//! ```text
//! [ u64 x K/64 occupancy words ][ pad ][ T x K ]
//! ```
//!
//! Buckets with at least one free slot are listed in `unfull_buckets`, so
//! finding a slot is a bit scan over at most K/64 words. Both bucket lists
//! are `List`s over the array's own allocator, so an array inside an arena
//! keeps all of its memory there.

use crate::allocator::{AllocatorRef, MAX_ALIGN};
use crate::arena::align_up;
use super::list::List;
use crate::context;
use crate::logging::log_bucket_created;
use core::fmt;
use core::marker::PhantomData;
use core::mem;
use core::ops::{Index, IndexMut};
use core::ptr::{self, NonNull};

const WORD_BITS: usize = u64::BITS as usize;

/// Stable handle to an occupied slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketIndex {
    pub bucket: usize,
    pub item: usize,
}

impl BucketIndex {
    pub const fn new(bucket: usize, item: usize) -> Self {
        Self { bucket, item }
    }
}

impl fmt::Display for BucketIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}, {}}}", self.bucket, self.item)
    }
}

struct Bucket {
    memory: NonNull<u8>,
    count: usize,
}

impl Bucket {
    #[inline]
    fn words(&self) -> *mut u64 {
        self.memory.as_ptr().cast()
    }

    #[inline]
    fn is_occupied(&self, item: usize) -> bool {
        let word = unsafe { *self.words().add(item / WORD_BITS) };
        word & (1u64 << (item % WORD_BITS)) != 0
    }
}

pub struct BucketArray<T, const K: usize> {
    allocator: AllocatorRef,
    all_buckets: List<Bucket>,
    /// Indices into `all_buckets` of every bucket with a free slot
    unfull_buckets: List<usize>,
    count: usize,
    _owns: PhantomData<T>,
}

impl<T, const K: usize> BucketArray<T, K> {
    const VALID: () = assert!(K > 0 && K % WORD_BITS == 0, "items per bucket must be a non-zero multiple of 64");
    const WORDS: usize = K / WORD_BITS;
    const ITEMS_OFFSET: usize = align_up(Self::WORDS * mem::size_of::<u64>(), mem::align_of::<T>());
    const BUCKET_BYTES: usize = Self::ITEMS_OFFSET + K * mem::size_of::<T>();

    /// Buckets come from the context allocator
    pub const fn new() -> Self {
        Self::new_in(AllocatorRef::unset())
    }

    pub const fn new_in(allocator: AllocatorRef) -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::VALID;

        Self {
            all_buckets: List::new_in(AllocatorRef::unset()),
            unfull_buckets: List::new_in(AllocatorRef::unset()),
            allocator,
            count: 0,
            _owns: PhantomData,
        }
    }

    /// Number of occupied slots
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn bucket_count(&self) -> usize {
        self.all_buckets.len()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.all_buckets.len() * K
    }

    #[inline]
    pub const fn items_per_bucket(&self) -> usize {
        K
    }

    /// Occupy a slot holding `T::default()`
    pub fn acquire(&mut self) -> BucketIndex
    where
        T: Default,
    {
        self.insert(T::default())
    }

    /// Occupy a slot holding `value`
    pub fn insert(&mut self, value: T) -> BucketIndex {
        let index = self.take_slot();
        unsafe { ptr::write(self.slot(index), value) };
        index
    }

    fn take_slot(&mut self) -> BucketIndex {
        if self.unfull_buckets.is_empty() {
            self.add_bucket();
        }

        let bucket_index = self.unfull_buckets[0];
        let bucket = &mut self.all_buckets[bucket_index];

        let mut free = None;
        for i in 0..Self::WORDS {
            let word = unsafe { &mut *bucket.words().add(i) };
            if *word != u64::MAX {
                let n = (!*word).trailing_zeros() as usize;
                *word |= 1u64 << n;
                free = Some(i * WORD_BITS + n);
                break;
            }
        }
        let item = match free {
            Some(item) => item,
            None => context::fatal(format!("bucket {} is listed as unfull but has no free slot", bucket_index)),
        };

        bucket.count += 1;
        self.count += 1;
        if bucket.count == K {
            self.unfull_buckets.swap_remove(0);
        }

        BucketIndex { bucket: bucket_index, item }
    }

    #[track_caller]
    fn add_bucket(&mut self) {
        if mem::align_of::<T>() > MAX_ALIGN {
            context::fatal(format!("BucketArray items need alignment {}, more than {}", mem::align_of::<T>(), MAX_ALIGN));
        }

        self.allocator.bind();
        self.adopt_allocator();
        let memory = self.allocator.allocate(Self::BUCKET_BYTES);
        if memory.as_ptr() as usize % mem::align_of::<T>().max(mem::align_of::<u64>()) != 0 {
            context::fatal(format!("{} returned memory misaligned for bucket items", self.allocator.name()));
        }
        unsafe { ptr::write_bytes(memory.as_ptr(), 0, Self::WORDS * mem::size_of::<u64>()) };

        let bucket_index = self.all_buckets.len();
        self.all_buckets.push(Bucket { memory, count: 0 });
        self.unfull_buckets.push(bucket_index);

        log_bucket_created(bucket_index, K);
    }

    /// Point the still-empty bucket lists at the array's allocator
    fn adopt_allocator(&mut self) {
        if self.all_buckets.capacity() == 0 {
            self.all_buckets = List::new_in(self.allocator.clone());
        }
        if self.unfull_buckets.capacity() == 0 {
            self.unfull_buckets = List::new_in(self.allocator.clone());
        }
    }

    /// Free the slot at `index` and move its value out
    #[track_caller]
    pub fn release(&mut self, index: BucketIndex) -> T {
        self.check_occupied(index);

        let value = unsafe { ptr::read(self.slot(index)) };
        let bucket = &mut self.all_buckets[index.bucket];
        unsafe { *bucket.words().add(index.item / WORD_BITS) &= !(1u64 << (index.item % WORD_BITS)) };

        let was_full = bucket.count == K;
        bucket.count -= 1;
        self.count -= 1;

        if was_full {
            debug_assert!(
                !self.unfull_buckets.contains(&index.bucket),
                "full bucket {} was already listed as unfull",
                index.bucket
            );
            self.unfull_buckets.push(index.bucket);
        }
        value
    }

    /// Whether `index` names an occupied slot
    pub fn contains(&self, index: BucketIndex) -> bool {
        index.item < K
            && self
                .all_buckets
                .get(index.bucket)
                .map_or(false, |bucket| bucket.is_occupied(index.item))
    }

    #[track_caller]
    pub fn lookup(&self, index: BucketIndex) -> &T {
        self.check_occupied(index);
        unsafe { &*self.slot(index) }
    }

    #[track_caller]
    pub fn lookup_mut(&mut self, index: BucketIndex) -> &mut T {
        self.check_occupied(index);
        unsafe { &mut *self.slot(index) }
    }

    #[track_caller]
    fn check_occupied(&self, index: BucketIndex) {
        if index.bucket >= self.all_buckets.len() {
            context::fatal(format!("bucket index {} out of range ({} buckets)", index, self.all_buckets.len()));
        }
        if index.item >= K {
            context::fatal(format!("item index {} out of range ({} items per bucket)", index, K));
        }
        if !self.all_buckets[index.bucket].is_occupied(index.item) {
            context::fatal(format!("slot {} is not occupied", index));
        }
    }

    #[inline]
    fn slot(&self, index: BucketIndex) -> *mut T {
        slot_ptr::<T, K>(&self.all_buckets[index.bucket], index.item)
    }

    /// Occupied items in bucket-major, slot-minor order
    pub fn iter(&self) -> Iter<'_, T, K> {
        Iter { buckets: &self.all_buckets, cursor: BucketIndex::new(0, 0), _items: PhantomData }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, T, K> {
        IterMut { buckets: &self.all_buckets, cursor: BucketIndex::new(0, 0), _items: PhantomData }
    }

    /// Occupied items with their indices
    pub fn indexed(&self) -> impl Iterator<Item = (BucketIndex, &T)> + '_ {
        let mut cursor = BucketIndex::new(0, 0);
        core::iter::from_fn(move || {
            let index = next_occupied::<K>(&self.all_buckets, &mut cursor)?;
            Some((index, unsafe { &*self.slot(index) }))
        })
    }

    /// Drop every item and mark every slot free, keeping the buckets
    pub fn reset(&mut self) {
        self.drop_items();

        for bucket in &mut self.all_buckets {
            unsafe { ptr::write_bytes(bucket.words(), 0, Self::WORDS) };
            bucket.count = 0;
        }
        let buckets = self.all_buckets.len();
        self.unfull_buckets.clear();
        self.unfull_buckets.extend(0..buckets);
        self.count = 0;
    }

    /// Drop every item and give every bucket back to the allocator
    pub fn dispose(&mut self) {
        self.drop_items();

        for bucket in self.all_buckets.iter() {
            unsafe { self.allocator.dispose(bucket.memory) };
        }
        // Dropping the old lists hands their memory back too
        self.all_buckets = List::new_in(self.allocator.clone());
        self.unfull_buckets = List::new_in(self.allocator.clone());
        self.count = 0;
    }

    fn drop_items(&mut self) {
        if !mem::needs_drop::<T>() {
            return;
        }
        let mut cursor = BucketIndex::new(0, 0);
        while let Some(index) = next_occupied::<K>(&self.all_buckets, &mut cursor) {
            unsafe { ptr::drop_in_place(self.slot(index)) };
        }
    }
}

#[inline]
fn slot_ptr<T, const K: usize>(bucket: &Bucket, item: usize) -> *mut T {
    unsafe {
        bucket
            .memory
            .as_ptr()
            .add(BucketArray::<T, K>::ITEMS_OFFSET)
            .cast::<T>()
            .add(item)
    }
}

/// Advance `cursor` to the next occupied slot, skipping empty buckets and empty words
fn next_occupied<const K: usize>(buckets: &[Bucket], cursor: &mut BucketIndex) -> Option<BucketIndex> {
    while let Some(bucket) = buckets.get(cursor.bucket) {
        if bucket.count > 0 {
            while cursor.item < K {
                let word_index = cursor.item / WORD_BITS;
                let word = unsafe { *bucket.words().add(word_index) } >> (cursor.item % WORD_BITS);
                if word == 0 {
                    cursor.item = (word_index + 1) * WORD_BITS;
                    continue;
                }

                let item = cursor.item + word.trailing_zeros() as usize;
                cursor.item = item + 1;
                return Some(BucketIndex { bucket: cursor.bucket, item });
            }
        }
        cursor.bucket += 1;
        cursor.item = 0;
    }
    None
}

pub struct Iter<'a, T, const K: usize> {
    buckets: &'a [Bucket],
    cursor: BucketIndex,
    _items: PhantomData<&'a T>,
}

impl<'a, T, const K: usize> Iterator for Iter<'a, T, K> {
    type Item = &'a T;

    fn next(&mut self) -> Option<&'a T> {
        let index = next_occupied::<K>(self.buckets, &mut self.cursor)?;
        Some(unsafe { &*slot_ptr::<T, K>(&self.buckets[index.bucket], index.item) })
    }
}

pub struct IterMut<'a, T, const K: usize> {
    buckets: &'a [Bucket],
    cursor: BucketIndex,
    _items: PhantomData<&'a mut T>,
}

impl<'a, T, const K: usize> Iterator for IterMut<'a, T, K> {
    type Item = &'a mut T;

    fn next(&mut self) -> Option<&'a mut T> {
        let index = next_occupied::<K>(self.buckets, &mut self.cursor)?;
        // Each slot is yielded at most once
        Some(unsafe { &mut *slot_ptr::<T, K>(&self.buckets[index.bucket], index.item) })
    }
}

impl<'a, T, const K: usize> IntoIterator for &'a BucketArray<T, K> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T, K>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T, const K: usize> IntoIterator for &'a mut BucketArray<T, K> {
    type Item = &'a mut T;
    type IntoIter = IterMut<'a, T, K>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

impl<T, const K: usize> Index<BucketIndex> for BucketArray<T, K> {
    type Output = T;

    #[track_caller]
    fn index(&self, index: BucketIndex) -> &T {
        self.lookup(index)
    }
}

impl<T, const K: usize> IndexMut<BucketIndex> for BucketArray<T, K> {
    #[track_caller]
    fn index_mut(&mut self, index: BucketIndex) -> &mut T {
        self.lookup_mut(index)
    }
}

impl<T, const K: usize> Default for BucketArray<T, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const K: usize> Drop for BucketArray<T, K> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<T: fmt::Debug, const K: usize> fmt::Debug for BucketArray<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.indexed()).finish()
    }
}
