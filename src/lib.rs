//! ncz - arena allocators and a scoped allocation context
//!
//! Every dynamic allocation goes through the `Allocator` capability of
//! whichever allocator is installed in the thread's `Context`. Arenas hand out
//! memory by bumping an offset and reclaim it in bulk; the scratch pool in the
//! context is reset once per frame or task.

// Core modules
pub mod allocator;
pub mod arena;
pub mod config;
pub mod containers;
pub mod context;
pub mod error;
pub mod logging;

// Re-export commonly used items
pub use allocator::{Allocator, AllocatorMode, AllocatorRef, Heap, MAX_ALIGN};
pub use arena::{FixedPool, FlatPool, Pool, PoolMark};
pub use config::Config;
pub use containers::{sprint, tprint, BucketArray, BucketIndex, FixedList, List, StringBuilder};
pub use context::{
    push_allocator, push_label, push_logger, reset_temporary_storage, save_temporary_mark, temp,
    use_global_arena,
};
pub use error::{AllocError, Result};
pub use logging::{LogLevel, LogType, Logger};
