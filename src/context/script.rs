//! Script arena - a hard memory ceiling for short-lived tools

use super::guards::AllocatorGuard;
use crate::arena::FixedPool;
use std::rc::Rc;

/// A `FixedPool<N>` installed as the context allocator.
///
/// Dropping it restores the previous allocator and logs how much of the
/// arena the script used.
pub struct ScriptArena<const N: usize> {
    restore: Option<AllocatorGuard>,
    arena: Rc<FixedPool<N>>,
}

impl<const N: usize> ScriptArena<N> {
    pub fn arena(&self) -> &FixedPool<N> {
        &self.arena
    }

    pub fn used(&self) -> usize {
        self.arena.used()
    }
}

/// Route every context allocation through an `N`-byte `FixedPool` until the
/// returned guard drops; exceeding `N` bytes is fatal.
#[must_use = "the previous allocator is restored when the arena drops"]
pub fn use_global_arena<const N: usize>() -> ScriptArena<N> {
    // Heap-placed from the start; `N` may be far larger than the stack
    let arena: Rc<FixedPool<N>> = Rc::from(FixedPool::<N>::new_boxed());
    let restore = super::push_allocator(arena.allocator());
    ScriptArena { restore: Some(restore), arena }
}

impl<const N: usize> Drop for ScriptArena<N> {
    fn drop(&mut self) {
        drop(self.restore.take());
        crate::log!("script used {} bytes.", self.arena.used());
    }
}
