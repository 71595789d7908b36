//! Arenas - bump allocators that free in bulk
//!
//! - `Pool`: chain of fixed-size blocks over a backing allocator
//! - `FlatPool`: one virtual memory reservation, pages committed on demand
//! - `FixedPool`: inline buffer with a hard ceiling

mod bump;
mod fixed;
mod flat;
pub mod pages;
mod pool;

#[cfg(test)]
mod tests;

pub use bump::align_up;
pub use fixed::FixedPool;
pub use flat::{FlatPool, FLAT_POOL_ALIGNMENT};
pub use pool::{Pool, PoolMark, POOL_ALIGNMENT};
