use super::*;
use crate::allocator::{Allocator, AllocatorRef};
use crate::error::AllocError;
use std::rc::Rc;

fn addr(ptr: core::ptr::NonNull<u8>) -> usize {
    ptr.as_ptr() as usize
}

// ============================================================================
// Pool
// ============================================================================

#[test]
fn pool_allocates_lazily() {
    let pool = Pool::new(128, AllocatorRef::heap());
    assert_eq!(pool.block_count(), 0);
    assert_eq!(pool.mark().block(), None);

    let _ = pool.get(8);
    assert_eq!(pool.block_count(), 1);
    assert_eq!(pool.mark().block(), Some(0));
}

#[test]
fn pool_addresses_are_aligned() {
    let pool = Pool::new(256, AllocatorRef::heap());
    for size in [1, 3, 17, 31, 64] {
        assert_eq!(addr(pool.get(size)) % POOL_ALIGNMENT, 0);
    }
}

#[test]
fn pool_cycles_blocks_when_full() {
    let pool = Pool::new(64, AllocatorRef::heap());
    let _ = pool.get(40);
    let _ = pool.get(40);
    assert_eq!(pool.block_count(), 2);
    assert_eq!(pool.mark().block(), Some(1));
    assert_eq!(pool.used_in_current_block(), 40);
}

#[test]
fn pool_exact_fit_stays_in_block() {
    let pool = Pool::new(64, AllocatorRef::heap());
    let a = pool.get(32);
    let b = pool.get(32);
    assert_eq!(addr(b), addr(a) + 32);
    assert_eq!(pool.block_count(), 1);
}

#[test]
fn pool_reset_rewinds_and_frees_oversized() {
    let mut pool = Pool::new(64, AllocatorRef::heap()).with_poison(Some(0xCD));
    let first = pool.get(8);
    unsafe { first.as_ptr().write(1) };
    let _ = pool.get(1000);
    assert_eq!(pool.oversized_count(), 1);

    pool.reset();
    assert_eq!(pool.oversized_count(), 0);
    assert_eq!(pool.block_count(), 1);
    assert_eq!(unsafe { *first.as_ptr() }, 0xCD);
    assert_eq!(addr(pool.get(8)), addr(first));
}

#[test]
fn pool_reset_without_poison_keeps_bytes() {
    let mut pool = Pool::new(64, AllocatorRef::heap()).with_poison(None);
    let first = pool.get(8);
    unsafe { first.as_ptr().write(42) };

    pool.reset();
    assert_eq!(unsafe { *first.as_ptr() }, 42);
}

#[test]
fn pool_rewind_reuses_memory() {
    let mut pool = Pool::new(64, AllocatorRef::heap());
    let _ = pool.get(16);
    let mark = pool.mark();

    let a = pool.get(40);
    let _ = pool.get(40);
    assert_eq!(pool.block_count(), 2);

    pool.rewind(mark);
    assert_eq!(pool.mark(), mark);
    assert_eq!(addr(pool.get(40)), addr(a));
    assert_eq!(pool.block_count(), 2);
}

#[test]
fn pool_rejects_foreign_mark() {
    let mut big = Pool::new(64, AllocatorRef::heap());
    let _ = big.get(40);
    let _ = big.get(40);
    let _ = big.get(40);
    let foreign = big.mark();

    let mut small = Pool::new(64, AllocatorRef::heap());
    let _ = small.get(8);
    assert!(!small.try_rewind(foreign));
}

#[test]
fn pool_dispose_frees_everything() {
    let mut pool = Pool::new(64, AllocatorRef::heap());
    let _ = pool.get(40);
    let _ = pool.get(40);
    let _ = pool.get(500);

    Pool::dispose(&mut pool);
    assert_eq!(pool.block_count(), 0);
    assert_eq!(pool.oversized_count(), 0);
    assert_eq!(pool.mark().block(), None);

    // Usable again afterwards
    let _ = pool.get(8);
    assert_eq!(pool.block_count(), 1);
}

#[test]
fn pool_over_pool() {
    let backing = Rc::new(Pool::new(1024, AllocatorRef::heap()));
    let pool = Pool::new(64, backing.allocator());

    let _ = pool.get(40);
    let _ = pool.get(40);
    assert_eq!(pool.block_count(), 2);
    assert_eq!(backing.block_count(), 1);
}

#[test]
fn pool_binds_unset_backing_to_context() {
    let pool = Pool::new(64, AllocatorRef::unset());
    let _ = pool.get(8);
    assert_eq!(pool.block_count(), 1);
}

#[test]
fn pool_default_uses_configured_block_size() {
    let pool = Pool::default();
    assert_eq!(pool.block_size(), crate::config::current().pool_block_size);
}

#[test]
fn pool_backed_by_exhausted_fixed_pool_reports_error() {
    let backing = Rc::new(FixedPool::<64>::new());
    let pool = Pool::new(128, backing.allocator());
    assert!(matches!(pool.try_get(8), Err(AllocError::OutOfSpace { allocator: "FixedPool", .. })));
}

#[test]
fn pool_rejects_sizes_that_overflow_alignment_slack() {
    let pool = Pool::new(64, AllocatorRef::heap());
    assert_eq!(pool.try_get(usize::MAX - 5), Err(AllocError::InvalidLayout { size: usize::MAX - 5 }));
    assert!(pool.try_get(usize::MAX - 20).is_err());

    // Nothing was handed out and small requests still work
    assert_eq!(pool.oversized_count(), 0);
    let _ = pool.get(8);
    assert_eq!(pool.block_count(), 1);
}

#[test]
#[should_panic(expected = "no valid layout")]
fn pool_get_with_overflowing_size_is_fatal() {
    let pool = Pool::new(64, AllocatorRef::heap());
    let _ = pool.get(usize::MAX);
}

// ============================================================================
// FlatPool
// ============================================================================

#[test]
fn flat_pool_rounds_reservation_to_pages() {
    let pool = FlatPool::new(1);
    assert_eq!(pool.capacity(), pages::page_size());
    assert_eq!(pool.committed(), 0);
}

#[test]
fn flat_pool_commits_on_demand() {
    let page = pages::page_size();
    let pool = FlatPool::new(page * 8);

    let a = pool.get(10);
    assert_eq!(pool.committed(), page);
    unsafe { a.as_ptr().write_bytes(0xAB, 10) };

    let b = pool.get(page + 1);
    assert!(addr(b) >= addr(a) + 10);
    assert_eq!(addr(b) % FLAT_POOL_ALIGNMENT, 0);
    assert_eq!(pool.committed(), 2 * page);
    unsafe { b.as_ptr().add(page).write(1) };
}

#[test]
fn flat_pool_fails_past_reservation() {
    let page = pages::page_size();
    let pool = FlatPool::new(page);
    let _ = pool.get(page - 16);

    let err = pool.try_get(32).unwrap_err();
    assert_eq!(
        err,
        AllocError::OutOfSpace { allocator: "FlatPool", requested: 32, remaining: 16 }
    );
}

#[test]
fn flat_pool_reset_is_unsupported() {
    let mut pool = FlatPool::new(4096);
    assert_eq!(pool.reset(), Err(AllocError::ResetUnsupported { allocator: "FlatPool" }));
}

#[test]
fn flat_pool_dispose_releases_reservation() {
    let mut pool = FlatPool::new(4096);
    let _ = pool.get(64);
    FlatPool::dispose(&mut pool);

    assert_eq!(pool.used(), 0);
    assert!(pool.try_get(1).is_err());
    FlatPool::dispose(&mut pool);
}

#[test]
fn flat_pool_as_allocator() {
    let pool = Rc::new(FlatPool::new(1 << 20));
    let allocator = pool.allocator();
    let _ = allocator.allocate(100);
    assert!(pool.used() >= 100);
    assert_eq!(pool.name(), "FlatPool");
}

// ============================================================================
// FixedPool
// ============================================================================

#[test]
fn fixed_pool_bumps_with_pointer_alignment() {
    let pool = FixedPool::<64>::new();
    let a = pool.get(3);
    let b = pool.get(8);
    assert_eq!(addr(b), addr(a) + core::mem::align_of::<usize>());
    assert_eq!(pool.remaining(), 64 - pool.used());
}

#[test]
fn fixed_pool_reports_remaining_on_overflow() {
    let pool = FixedPool::<128>::new();
    let _ = pool.get(100);
    assert_eq!(pool.remaining(), 28);

    let err = pool.try_get(50).unwrap_err();
    assert_eq!(
        err,
        AllocError::OutOfSpace { allocator: "FixedPool", requested: 50, remaining: 28 }
    );
    // Failed requests consume nothing
    assert_eq!(pool.used(), 100);
}

#[test]
fn boxed_fixed_pool_starts_empty() {
    let pool = FixedPool::<{ 4 << 20 }>::new_boxed();
    assert_eq!(pool.used(), 0);
    assert_eq!(pool.remaining(), 4 << 20);

    let ptr = pool.get(100);
    assert_eq!(ptr.as_ptr() as usize % core::mem::align_of::<usize>(), 0);
    assert_eq!(pool.used(), 100);
}

#[test]
fn fixed_pool_reset_zeroes_count() {
    let mut pool = FixedPool::<32>::new();
    let first = pool.get(32);
    pool.reset();
    assert_eq!(pool.used(), 0);
    assert_eq!(pool.get(8), first);
}
