use ncz::{AllocatorRef, BucketArray, BucketIndex};
use proptest::prelude::*;
use std::collections::HashMap;

type Items = BucketArray<u64, 64>;

fn heap_array() -> Items {
    BucketArray::new_in(AllocatorRef::heap())
}

#[derive(Debug, Clone)]
enum Op {
    Acquire(u64),
    Release(usize),
    Write(usize, u64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<u64>().prop_map(Op::Acquire),
        2 => any::<usize>().prop_map(Op::Release),
        1 => (any::<usize>(), any::<u64>()).prop_map(|(i, v)| Op::Write(i, v)),
    ]
}

proptest! {
    #[test]
    fn test_count_and_values_track_live_slots(ops in prop::collection::vec(op(), 0..400)) {
        let mut array = heap_array();
        let mut live: HashMap<BucketIndex, u64> = HashMap::new();
        let mut order: Vec<BucketIndex> = Vec::new();

        for op in ops {
            match op {
                Op::Acquire(value) => {
                    let index = array.acquire();
                    prop_assert_eq!(array[index], 0);
                    array[index] = value;
                    prop_assert!(live.insert(index, value).is_none(), "slot {} handed out twice", index);
                    order.push(index);
                }
                Op::Release(pick) if !order.is_empty() => {
                    let index = order.swap_remove(pick % order.len());
                    let expected = live.remove(&index).unwrap();
                    prop_assert_eq!(array.release(index), expected);
                }
                Op::Write(pick, value) if !order.is_empty() => {
                    let index = order[pick % order.len()];
                    *array.lookup_mut(index) = value;
                    live.insert(index, value);
                }
                _ => {}
            }

            prop_assert_eq!(array.len(), live.len());
            for (index, value) in &live {
                prop_assert_eq!(array.lookup(*index), value);
            }
        }

        prop_assert_eq!(array.iter().count(), live.len());
    }
}

#[test]
fn test_indices_stay_in_first_bucket_until_full() {
    let mut array = heap_array();
    for item in 0..63 {
        assert_eq!(array.acquire(), BucketIndex::new(0, item));
    }
    assert_eq!(array.bucket_count(), 1);

    assert_eq!(array.acquire(), BucketIndex::new(0, 63));
    let overflow = array.acquire();
    assert_eq!(overflow.bucket, 1);
    assert_eq!(array.bucket_count(), 2);
}

#[test]
fn test_sixty_fifth_acquire_opens_bucket_one() {
    let mut array = heap_array();
    let indices: Vec<_> = (0..64).map(|_| array.acquire()).collect();
    assert!(indices.iter().all(|index| index.bucket == 0));

    assert_eq!(array.acquire(), BucketIndex::new(1, 0));
}

#[test]
fn test_release_makes_full_bucket_available_again() {
    let mut array = heap_array();
    let indices: Vec<_> = (0..64).map(|_| array.acquire()).collect();

    array.release(indices[17]);
    assert_eq!(array.acquire(), BucketIndex::new(0, 17));
    assert_eq!(array.bucket_count(), 1);
}

#[test]
fn test_released_bucket_rejoins_candidates() {
    let mut array = heap_array();
    for _ in 0..64 {
        array.acquire();
    }
    // Bucket 0 full, bucket 1 partially used
    let _ = array.acquire();

    array.release(BucketIndex::new(0, 5));
    let next: Vec<_> = (0..64).map(|_| array.acquire()).collect();
    assert!(next.contains(&BucketIndex::new(0, 5)));
    assert_eq!(array.bucket_count(), 2);
}

#[test]
fn test_iteration_is_bucket_major_and_complete() {
    let mut array = heap_array();
    let k = 150;
    let indices: Vec<_> = (0..k).map(|i| array.insert(i as u64)).collect();

    let values: Vec<u64> = array.iter().copied().collect();
    assert_eq!(values, (0..k as u64).collect::<Vec<_>>());

    let visited: Vec<BucketIndex> = array.indexed().map(|(index, _)| index).collect();
    let mut sorted = visited.clone();
    sorted.sort();
    assert_eq!(visited, sorted);
    assert_eq!(visited, indices);

    let released = indices[70];
    array.release(released);
    let after: Vec<BucketIndex> = array.indexed().map(|(index, _)| index).collect();
    assert_eq!(after.len(), k - 1);
    assert!(!after.contains(&released));
}

#[test]
fn test_iteration_restarts() {
    let mut array = heap_array();
    for i in 0..10 {
        array.insert(i);
    }
    let first: u64 = array.iter().sum();
    let second: u64 = (&array).into_iter().sum();
    assert_eq!(first, 45);
    assert_eq!(first, second);
}

#[test]
fn test_references_stay_put_across_growth() {
    let mut array = heap_array();
    let index = array.insert(7);
    let before = array.lookup(index) as *const u64;

    for i in 0..500 {
        array.insert(i);
    }
    assert_eq!(array.lookup(index) as *const u64, before);
    assert_eq!(array[index], 7);
}
