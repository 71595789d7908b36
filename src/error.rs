//! Allocation errors
//!
//! Capacity exhaustion is fatal for the plain `get`/`allocate` entry points; the
//! `try_*` variants surface it as an `AllocError` so callers can report it.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocError {
    #[error("{allocator} is out of space: requested {requested} bytes, {remaining} remaining")]
    OutOfSpace {
        allocator: &'static str,
        requested: usize,
        remaining: usize,
    },

    #[error("system heap failed to provide {size} bytes")]
    HeapExhausted { size: usize },

    #[error("failed to reserve {size} bytes of address space")]
    ReserveFailed { size: usize },

    #[error("failed to commit {size} bytes of reserved memory")]
    CommitFailed { size: usize },

    #[error("no valid layout for {size} bytes")]
    InvalidLayout { size: usize },

    #[error("{allocator} does not support reset")]
    ResetUnsupported { allocator: &'static str },
}

pub type Result<T, E = AllocError> = std::result::Result<T, E>;
