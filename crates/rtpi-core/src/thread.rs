//! Kernel thread identity of the caller.
//!
//! PI futex words hold the owner's kernel tid, so every lock/unlock needs
//! it. The value is cached per thread; a fork child handler clears the
//! cache because the child's only thread has a new tid.

use std::cell::Cell;
use std::sync::Once;

use crate::syscall;

thread_local! {
    static CACHED_TID: Cell<u32> = const { Cell::new(0) };
}

static ATFORK: Once = Once::new();

extern "C" fn clear_cached_tid_in_child() {
    let _ = CACHED_TID.try_with(|slot| slot.set(0));
}

fn register_fork_handler() {
    ATFORK.call_once(|| {
        // SAFETY: the handler only touches this thread's TLS slot.
        #[allow(unsafe_code)]
        let rc = unsafe { libc::pthread_atfork(None, None, Some(clear_cached_tid_in_child)) };
        if rc != 0 {
            log::warn!("pthread_atfork failed ({rc}); forked children must not reuse cached tids");
        }
    });
}

/// The calling thread's kernel tid.
#[inline]
pub fn current_tid() -> u32 {
    CACHED_TID
        .try_with(|slot| {
            let cached = slot.get();
            if cached != 0 {
                return cached;
            }
            register_fork_handler();
            let tid = syscall::sys_gettid();
            slot.set(tid);
            tid
        })
        // TLS already torn down (thread exit path): ask the kernel.
        .unwrap_or_else(|_| syscall::sys_gettid())
}
