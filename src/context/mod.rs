//! Context - the per-thread ambient state every allocation site consults
//!
//! Design: one `Context` per thread holding the current allocator, the
//! current logger and a scratch `Pool` (temporary storage). Fields are
//! overridden through guards that restore the previous value when dropped,
//! so every exit path (including unwinding) puts things back.
//!
//! The thread-local is only ever borrowed for the duration of a field read or
//! write. Nothing that can allocate, log or panic runs while it is borrowed.

mod guards;
mod script;


pub use guards::{AllocatorGuard, LoggerGuard, TemporaryMarkGuard};
pub use script::{use_global_arena, ScriptArena};

use crate::allocator::AllocatorRef;
use crate::arena::Pool;
use crate::config;
use crate::logging::Logger;
use core::cell::RefCell;
use core::fmt::Display;
use core::mem;
use core::panic::Location;
use std::rc::Rc;

struct Context {
    allocator: AllocatorRef,
    logger: Logger,
    temporary_storage: Rc<Pool>,
    handling_assert: bool,
}

impl Context {
    fn new() -> Self {
        let config = config::current();

        Self {
            allocator: AllocatorRef::heap(),
            logger: Logger::default(),
            temporary_storage: Rc::new(Pool::new(config.temporary_storage_block_size, AllocatorRef::heap())),
            handling_assert: false,
        }
    }
}

thread_local! {
    static CONTEXT: RefCell<Context> = RefCell::new(Context::new());
}

#[inline]
fn with<R>(f: impl FnOnce(&mut Context) -> R) -> R {
    CONTEXT.with(|context| f(&mut context.borrow_mut()))
}

/// Like `with`, but gives up quietly while the thread is shutting down
fn try_with<R>(f: impl FnOnce(&mut Context) -> R) -> Option<R> {
    CONTEXT
        .try_with(|context| context.try_borrow_mut().ok().map(|mut context| f(&mut context)))
        .ok()
        .flatten()
}

// ============================================================================
// Allocator
// ============================================================================

/// The allocator containers bind to when created without one
pub fn allocator() -> AllocatorRef {
    with(|context| context.allocator.clone())
}

/// Install `allocator` and return the previous one.
///
/// An unset handle installs the heap.
pub fn set_allocator(allocator: AllocatorRef) -> AllocatorRef {
    let mut allocator = if allocator.is_set() { allocator } else { AllocatorRef::heap() };
    with(|context| mem::swap(&mut context.allocator, &mut allocator));
    allocator
}

/// Install `allocator` until the guard drops
#[must_use = "the previous allocator is restored when the guard drops"]
pub fn push_allocator(allocator: AllocatorRef) -> AllocatorGuard {
    AllocatorGuard::new(set_allocator(allocator))
}

// ============================================================================
// Logger
// ============================================================================

pub fn logger() -> Logger {
    with(|context| context.logger)
}

/// Install `logger` and return the previous one
pub fn set_logger(logger: Logger) -> Logger {
    with(|context| mem::replace(&mut context.logger, logger))
}

/// Install `logger` until the guard drops
#[must_use = "the previous logger is restored when the guard drops"]
pub fn push_logger(logger: Logger) -> LoggerGuard {
    LoggerGuard::new(set_logger(logger))
}

/// Prefix messages with `[label] ` until the guard drops
#[must_use = "the previous label is restored when the guard drops"]
pub fn push_label(label: &'static str) -> LoggerGuard {
    let labelled = logger().with_label(label);
    push_logger(labelled)
}

// ============================================================================
// Temporary storage
// ============================================================================

/// This thread's scratch pool
pub fn temporary_storage() -> Rc<Pool> {
    with(|context| context.temporary_storage.clone())
}

/// The scratch pool as an allocator
pub fn temp() -> AllocatorRef {
    AllocatorRef::from(temporary_storage())
}

/// Reclaim every scratch allocation in O(1).
///
/// Fatal while anything (a list, a builder, an `Rc<Pool>`) still refers to
/// the scratch pool.
#[track_caller]
pub fn reset_temporary_storage() {
    let outstanding = with(|context| match Rc::get_mut(&mut context.temporary_storage) {
        Some(pool) => {
            pool.reset();
            None
        }
        None => Some(Rc::strong_count(&context.temporary_storage) - 1),
    });

    if let Some(handles) = outstanding {
        fatal(format!("temporary storage reset while {} handles to it are alive", handles));
    }
}

/// Rewind temporary storage to the current position when the guard drops
#[must_use = "temporary storage is rewound when the guard drops"]
pub fn save_temporary_mark() -> TemporaryMarkGuard {
    TemporaryMarkGuard::new(with(|context| context.temporary_storage.mark()))
}

// ============================================================================
// Assertions
// ============================================================================

/// Report a failed assertion through the context logger, then panic.
///
/// A failure raised while the report itself is being written skips the
/// report.
#[track_caller]
pub fn handle_failed_assertion(repr: &str) -> ! {
    let location = Location::caller();
    report(location, format_args!("Assertion `{}` Failed!", repr));
    panic!("assertion failed: {}", repr);
}

/// Unrecoverable failure: report like a failed assertion, then panic
#[track_caller]
pub fn fatal(message: impl Display) -> ! {
    let location = Location::caller();
    report(location, format_args!("{}", message));
    panic!("{}", message);
}

fn report(location: &Location<'_>, message: core::fmt::Arguments<'_>) {
    let already_handling = try_with(|context| mem::replace(&mut context.handling_assert, true)).unwrap_or(true);
    if already_handling {
        return;
    }

    struct Handled;
    impl Drop for Handled {
        fn drop(&mut self) {
            try_with(|context| context.handling_assert = false);
        }
    }
    let _handled = Handled;

    crate::log_error!("{}:{}: {}", location.file(), location.line(), message);
}
