//! ABI layer for `pi_mutex_*`.
//!
//! Null pointers are `EINVAL` and `trylock` on a held mutex is `EBUSY`.
//! Other failures are the errno of the [`rtpi_core::PiError`] returned.

use std::ffi::c_int;

use rtpi_core::errno;

use super::{pi_mutex_t, to_errno};

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Heap-allocate an unlocked process-private mutex. Release with
/// [`pi_mutex_free`].
#[unsafe(no_mangle)]
pub extern "C" fn pi_mutex_alloc() -> *mut pi_mutex_t {
    Box::into_raw(Box::new(pi_mutex_t::INIT))
}

/// # Safety
///
/// `mutex` must be null or come from [`pi_mutex_alloc`] and not be in use.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pi_mutex_free(mutex: *mut pi_mutex_t) {
    if mutex.is_null() {
        return;
    }
    // SAFETY: allocated by Box::into_raw in pi_mutex_alloc.
    unsafe { drop(Box::from_raw(mutex)) };
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Write a fresh unlocked mutex into `mutex`, which may be uninitialized.
///
/// # Safety
///
/// `mutex` must be null or valid for writes of `sizeof(pi_mutex_t)` bytes,
/// 64-byte aligned, and unused by other threads.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pi_mutex_init(mutex: *mut pi_mutex_t, flags: u32) -> c_int {
    // SAFETY: forwarded caller contract; null is rejected inside.
    to_errno(unsafe { pi_mutex_t::init_at(mutex, flags) })
}

/// # Safety
///
/// `mutex` must be null or point to an initialized mutex.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pi_mutex_destroy(mutex: *mut pi_mutex_t) -> c_int {
    // SAFETY: caller guarantees a live object or null.
    match unsafe { mutex.as_ref() } {
        Some(m) => to_errno(m.destroy()),
        None => errno::EINVAL,
    }
}

// ---------------------------------------------------------------------------
// Locking
// ---------------------------------------------------------------------------

/// # Safety
///
/// `mutex` must be null or point to an initialized mutex.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pi_mutex_lock(mutex: *mut pi_mutex_t) -> c_int {
    // SAFETY: caller guarantees a live object or null.
    match unsafe { mutex.as_ref() } {
        Some(m) => to_errno(m.lock()),
        None => errno::EINVAL,
    }
}

/// `EBUSY` when the mutex is held, including by the caller.
///
/// # Safety
///
/// `mutex` must be null or point to an initialized mutex.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pi_mutex_trylock(mutex: *mut pi_mutex_t) -> c_int {
    // SAFETY: caller guarantees a live object or null.
    let Some(m) = (unsafe { mutex.as_ref() }) else {
        return errno::EINVAL;
    };
    match m.try_lock() {
        Ok(true) => 0,
        Ok(false) => errno::EBUSY,
        Err(err) => err.errno(),
    }
}

/// # Safety
///
/// `mutex` must be null or point to an initialized mutex.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn pi_mutex_unlock(mutex: *mut pi_mutex_t) -> c_int {
    // SAFETY: caller guarantees a live object or null.
    match unsafe { mutex.as_ref() } {
        Some(m) => to_errno(m.unlock()),
        None => errno::EINVAL,
    }
}
