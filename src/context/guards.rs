//! Scoped override guards
//!
//! Each guard holds the value it displaced and puts it back on drop. Values
//! swapped out of the context are dropped after the context borrow ends.

use super::try_with;
use crate::allocator::AllocatorRef;
use crate::arena::PoolMark;
use crate::logging::Logger;
use core::mem;
use std::rc::Rc;

/// Restores the previous context allocator on drop
#[derive(Debug)]
pub struct AllocatorGuard {
    previous: Option<AllocatorRef>,
}

impl AllocatorGuard {
    pub(super) fn new(previous: AllocatorRef) -> Self {
        Self { previous: Some(previous) }
    }
}

impl Drop for AllocatorGuard {
    fn drop(&mut self) {
        if let Some(mut previous) = self.previous.take() {
            try_with(|context| mem::swap(&mut context.allocator, &mut previous));
            // `previous` now holds the allocator being uninstalled
            drop(previous);
        }
    }
}

/// Restores the previous context logger on drop
#[derive(Debug)]
pub struct LoggerGuard {
    previous: Logger,
}

impl LoggerGuard {
    pub(super) fn new(previous: Logger) -> Self {
        Self { previous }
    }
}

impl Drop for LoggerGuard {
    fn drop(&mut self) {
        let previous = self.previous;
        try_with(|context| context.logger = previous);
    }
}

/// Rewinds temporary storage to a saved mark on drop.
///
/// Rewinding needs exclusive access to the scratch pool; while another handle
/// to it is alive the rewind is skipped and the memory is only reclaimed by
/// the next reset.
#[derive(Debug)]
pub struct TemporaryMarkGuard {
    mark: PoolMark,
}

impl TemporaryMarkGuard {
    pub(super) fn new(mark: PoolMark) -> Self {
        Self { mark }
    }

    pub fn mark(&self) -> PoolMark {
        self.mark
    }
}

impl Drop for TemporaryMarkGuard {
    fn drop(&mut self) {
        let mark = self.mark;
        let rewound = try_with(|context| match Rc::get_mut(&mut context.temporary_storage) {
            Some(pool) => pool.try_rewind(mark),
            None => false,
        });

        if rewound == Some(false) {
            tracing::trace!(target: "ncz::context", ?mark, "temporary storage still shared, rewind skipped");
        }
    }
}
