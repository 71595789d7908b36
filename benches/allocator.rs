//! Allocator benchmarks
//!
//! Compares bump arenas against the heap for small allocations and measures
//! bucket array churn.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ncz::{Allocator, AllocatorRef, BucketArray, FlatPool, Heap, List, Pool};
use std::rc::Rc;

fn bench_small_allocations(c: &mut Criterion) {
    let mut group = c.benchmark_group("small_allocations");

    for size in [16usize, 64, 256].iter() {
        group.bench_with_input(BenchmarkId::new("heap", size), size, |b, &size| {
            let heap = Heap;
            b.iter(|| {
                for _ in 0..1000 {
                    let ptr = heap.allocate(black_box(size)).unwrap();
                    unsafe { heap.dispose(ptr) };
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("pool", size), size, |b, &size| {
            let mut pool = Pool::new(64 * 1024, AllocatorRef::heap()).with_poison(None);
            b.iter(|| {
                for _ in 0..1000 {
                    black_box(pool.get(black_box(size)));
                }
                pool.reset();
            });
        });

        group.bench_with_input(BenchmarkId::new("flat_pool", size), size, |b, &size| {
            b.iter_with_large_drop(|| {
                let pool = FlatPool::new(1 << 20);
                for _ in 0..1000 {
                    black_box(pool.get(black_box(size)));
                }
                pool
            });
        });
    }

    group.finish();
}

fn bench_list_growth(c: &mut Criterion) {
    let mut group = c.benchmark_group("list_growth");

    group.bench_function("heap", |b| {
        b.iter(|| {
            let mut list = List::new_in(AllocatorRef::heap());
            list.extend(0..10_000u32);
            black_box(list.len())
        });
    });

    group.bench_function("pool", |b| {
        let mut pool = Rc::new(Pool::new(64 * 1024, AllocatorRef::heap()).with_poison(None));
        b.iter(|| {
            {
                let mut list = List::new_in(pool.allocator());
                list.extend(0..10_000u32);
                black_box(list.len());
            }
            if let Some(pool) = Rc::get_mut(&mut pool) {
                pool.reset();
            }
        });
    });

    group.finish();
}

fn bench_bucket_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("bucket_churn");

    for live in [64usize, 1024, 8192].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(live), live, |b, &live| {
            let mut array: BucketArray<[u64; 4], 64> = BucketArray::new_in(AllocatorRef::heap());
            let mut indices: Vec<_> = (0..live).map(|_| array.acquire()).collect();

            b.iter(|| {
                for i in (0..indices.len()).step_by(3) {
                    let value = array.release(indices[i]);
                    indices[i] = array.insert(black_box(value));
                }
            });
        });
    }

    group.bench_function("iterate_8192", |b| {
        let mut array: BucketArray<u64, 64> = BucketArray::new_in(AllocatorRef::heap());
        for i in 0..8192 {
            array.insert(i);
        }
        b.iter(|| black_box(array.iter().sum::<u64>()));
    });

    group.finish();
}

criterion_group!(benches, bench_small_allocations, bench_list_growth, bench_bucket_churn);
criterion_main!(benches);
