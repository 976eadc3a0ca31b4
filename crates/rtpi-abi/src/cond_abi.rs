//! ABI layer for `pi_cond_*`.
//!
//! Timed waits take an absolute `CLOCK_MONOTONIC` deadline. Null object
//! pointers are `EINVAL`; everything else is the errno of the
//! [`rtpi_core::PiError`] the operation returned.

use std::ffi::c_int;

use rtpi_core::{Timespec, errno};

use super::{pi_cond_t, pi_mutex_t, to_errno};

/// Heap-allocate an idle process-private condition variable. Release with
/// [`pi_cond_free`].
#[unsafe(no_mangle)]
pub extern "C" fn pi_cond_alloc() -> *mut pi_cond_t {
    Box::into_raw(Box::new(pi_cond_t::INIT))
}

/// # Safety
///
/// `cond` must be null or come from [`pi_cond_alloc`] and not be in use.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pi_cond_free(cond: *mut pi_cond_t) {
    if cond.is_null() {
        return;
    }
    // SAFETY: allocated by Box::into_raw in pi_cond_alloc.
    unsafe { drop(Box::from_raw(cond)) };
}

/// Write a fresh idle condition variable into `cond`, which may be
/// uninitialized.
///
/// # Safety
///
/// `cond` must be null or valid for writes of `sizeof(pi_cond_t)` bytes,
/// 64-byte aligned, and unused by other threads.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pi_cond_init(cond: *mut pi_cond_t, flags: u32) -> c_int {
    // SAFETY: forwarded caller contract; null is rejected inside.
    to_errno(unsafe { pi_cond_t::init_at(cond, flags) })
}

/// # Safety
///
/// `cond` must be null or point to an initialized condition variable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pi_cond_destroy(cond: *mut pi_cond_t) -> c_int {
    // SAFETY: caller guarantees a live object or null.
    match unsafe { cond.as_ref() } {
        Some(c) => to_errno(c.destroy()),
        None => errno::EINVAL,
    }
}

/// # Safety
///
/// Both pointers must be null or point to initialized objects.
unsafe fn pair<'a>(
    cond: *mut pi_cond_t,
    mutex: *mut pi_mutex_t,
) -> Option<(&'a pi_cond_t, &'a pi_mutex_t)> {
    // SAFETY: caller guarantees live objects or null.
    unsafe { Some((cond.as_ref()?, mutex.as_ref()?)) }
}

/// # Safety
///
/// Both pointers must be null or point to initialized objects, and the
/// caller must hold `mutex`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pi_cond_wait(cond: *mut pi_cond_t, mutex: *mut pi_mutex_t) -> c_int {
    // SAFETY: caller guarantees live objects or null.
    match unsafe { pair(cond, mutex) } {
        Some((c, m)) => to_errno(c.wait(m)),
        None => errno::EINVAL,
    }
}

/// `ETIMEDOUT` returns without `mutex` held.
///
/// # Safety
///
/// Pointers must be null or point to initialized objects, and the caller
/// must hold `mutex`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pi_cond_timedwait(
    cond: *mut pi_cond_t,
    mutex: *mut pi_mutex_t,
    abstime: *const libc::timespec,
) -> c_int {
    // SAFETY: caller guarantees live objects or null.
    let Some((c, m)) = (unsafe { pair(cond, mutex) }) else {
        return errno::EINVAL;
    };
    // SAFETY: caller guarantees a readable timespec or null.
    let Some(ts) = (unsafe { abstime.as_ref() }) else {
        return errno::EINVAL;
    };
    let deadline = Timespec::new(i64::from(ts.tv_sec), i64::from(ts.tv_nsec));
    to_errno(c.timedwait(m, &deadline))
}

/// # Safety
///
/// Both pointers must be null or point to initialized objects.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pi_cond_signal(cond: *mut pi_cond_t, mutex: *mut pi_mutex_t) -> c_int {
    // SAFETY: caller guarantees live objects or null.
    match unsafe { pair(cond, mutex) } {
        Some((c, m)) => to_errno(c.signal(m)),
        None => errno::EINVAL,
    }
}

/// # Safety
///
/// Both pointers must be null or point to initialized objects.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pi_cond_broadcast(cond: *mut pi_cond_t, mutex: *mut pi_mutex_t) -> c_int {
    // SAFETY: caller guarantees live objects or null.
    match unsafe { pair(cond, mutex) } {
        Some((c, m)) => to_errno(c.broadcast(m)),
        None => errno::EINVAL,
    }
}
