//! Futex gateway: the four PI futex operations the mutex and condition
//! variable are built from.
//!
//! Each call is one `futex(2)` trap. The op code gets `FUTEX_PRIVATE_FLAG`
//! unless the owning object is process-shared. Results come back raw:
//! `Ok(kernel return)` or `Err(errno)`. Nothing here retries.

use core::sync::atomic::AtomicU32;
use std::sync::OnceLock;

use crate::errno;
use crate::flags::PiFlags;
use crate::syscall;
use crate::time::Timespec;

// ---------------------------------------------------------------------------
// Kernel constants (<linux/futex.h>)
// ---------------------------------------------------------------------------

pub const FUTEX_LOCK_PI: i32 = 6;
pub const FUTEX_UNLOCK_PI: i32 = 7;
pub const FUTEX_WAIT_REQUEUE_PI: i32 = 11;
pub const FUTEX_CMP_REQUEUE_PI: i32 = 12;
pub const FUTEX_PRIVATE_FLAG: i32 = 128;

/// Set by the kernel in a PI word once a waiter is queued.
pub const FUTEX_WAITERS: u32 = 0x8000_0000;
/// Set by the kernel when a robust owner exits; unused by this library.
pub const FUTEX_OWNER_DIED: u32 = 0x4000_0000;
/// Owner tid portion of a PI word.
pub const FUTEX_TID_MASK: u32 = 0x3fff_ffff;

/// Owner tid encoded in a PI futex word (0 when unlocked).
#[must_use]
pub const fn owner_tid(word: u32) -> u32 {
    word & FUTEX_TID_MASK
}

/// Full op code for `op` on an object configured with `flags`.
#[must_use]
pub const fn op_code(op: i32, flags: PiFlags) -> i32 {
    if flags.futex_private() {
        op | FUTEX_PRIVATE_FLAG
    } else {
        op
    }
}

#[inline]
fn word_ptr(word: &AtomicU32) -> *const u32 {
    word.as_ptr().cast_const()
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Block until the PI futex `word` is owned by the caller. The kernel
/// boosts the current owner to the caller's priority while it waits.
///
/// Fails with `EDEADLK` if the caller already owns `word`.
#[allow(unsafe_code)]
pub fn lock_pi(word: &AtomicU32, flags: PiFlags) -> Result<usize, i32> {
    // SAFETY: `word` is a live aligned u32; no timeout, no second address.
    unsafe {
        syscall::sys_futex(
            word_ptr(word),
            op_code(FUTEX_LOCK_PI, flags),
            0,
            0,
            core::ptr::null(),
            0,
        )
    }
}

/// Release the PI futex `word`, handing it to the highest-priority waiter.
///
/// Fails with `EPERM` if the caller is not the owner.
#[allow(unsafe_code)]
pub fn unlock_pi(word: &AtomicU32, flags: PiFlags) -> Result<usize, i32> {
    // SAFETY: `word` is a live aligned u32.
    unsafe {
        syscall::sys_futex(
            word_ptr(word),
            op_code(FUTEX_UNLOCK_PI, flags),
            0,
            0,
            core::ptr::null(),
            0,
        )
    }
}

/// Sleep on `cond_word` if it still reads `expected`, prepared to be
/// requeued onto the PI futex `target`.
///
/// `Ok` means the caller was requeued and now owns `target`. `deadline` is
/// an absolute `CLOCK_MONOTONIC` time. Typical failures: `EAGAIN` (value
/// changed before sleeping), `ETIMEDOUT`, `EINVAL`.
#[allow(unsafe_code)]
pub fn wait_requeue_pi(
    cond_word: &AtomicU32,
    expected: u32,
    deadline: Option<&Timespec>,
    target: &AtomicU32,
    flags: PiFlags,
) -> Result<usize, i32> {
    let kernel_ts = deadline.map(|ts| ts.to_kernel());
    let ts_arg = kernel_ts.as_ref().map_or(0, |ts| ts.as_ptr() as usize);
    // SAFETY: both words are live aligned u32s; `kernel_ts` outlives the call.
    unsafe {
        syscall::sys_futex(
            word_ptr(cond_word),
            op_code(FUTEX_WAIT_REQUEUE_PI, flags),
            expected,
            ts_arg,
            word_ptr(target),
            0,
        )
    }
}

/// If `cond_word` still reads `expected`, wake or requeue one waiter to
/// `target` and requeue up to `nr_requeue` more.
///
/// Returns the number of waiters woken plus requeued. `EAGAIN` means the
/// value moved on.
#[allow(unsafe_code)]
pub fn cmp_requeue_pi(
    cond_word: &AtomicU32,
    expected: u32,
    nr_requeue: u32,
    target: &AtomicU32,
    flags: PiFlags,
) -> Result<usize, i32> {
    // The kernel requires nr_wake == 1 for requeue-PI; the timeout slot
    // carries the requeue count.
    // SAFETY: both words are live aligned u32s.
    unsafe {
        syscall::sys_futex(
            word_ptr(cond_word),
            op_code(FUTEX_CMP_REQUEUE_PI, flags),
            1,
            nr_requeue as usize,
            word_ptr(target),
            expected,
        )
    }
}

/// Whether the running kernel implements the PI futex ops. Probed once.
pub fn pi_futex_supported() -> bool {
    static SUPPORTED: OnceLock<bool> = OnceLock::new();
    *SUPPORTED.get_or_init(|| {
        // Unlocking a word nobody owns is EPERM on a PI-capable kernel.
        let probe = AtomicU32::new(0);
        match unlock_pi(&probe, PiFlags::empty()) {
            Err(errno::ENOSYS) => {
                log::warn!("kernel lacks PI futex support");
                false
            }
            _ => true,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::current_tid;
    use core::sync::atomic::Ordering;

    #[test]
    fn op_code_private_by_default() {
        assert_eq!(op_code(FUTEX_LOCK_PI, PiFlags::empty()), 6 | 128);
        assert_eq!(op_code(FUTEX_LOCK_PI, PiFlags::PSHARED), 6);
        assert_eq!(
            op_code(FUTEX_CMP_REQUEUE_PI, PiFlags::empty()),
            FUTEX_CMP_REQUEUE_PI | FUTEX_PRIVATE_FLAG
        );
    }

    #[test]
    fn owner_tid_strips_state_bits() {
        assert_eq!(owner_tid(FUTEX_WAITERS | 1234), 1234);
        assert_eq!(owner_tid(FUTEX_OWNER_DIED | FUTEX_WAITERS), 0);
    }

    #[test]
    fn probe_reports_support() {
        assert!(pi_futex_supported());
    }

    #[test]
    fn kernel_lock_and_unlock_uncontended_word() {
        let word = AtomicU32::new(0);
        assert_eq!(lock_pi(&word, PiFlags::empty()), Ok(0));
        assert_eq!(owner_tid(word.load(Ordering::Relaxed)), current_tid());
        assert_eq!(unlock_pi(&word, PiFlags::empty()), Ok(0));
        assert_eq!(word.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn kernel_detects_self_deadlock() {
        let word = AtomicU32::new(0);
        lock_pi(&word, PiFlags::empty()).unwrap();
        assert_eq!(lock_pi(&word, PiFlags::empty()), Err(errno::EDEADLK));
        unlock_pi(&word, PiFlags::empty()).unwrap();
    }

    #[test]
    fn unlock_by_non_owner_is_eperm() {
        let word = AtomicU32::new(0);
        assert_eq!(unlock_pi(&word, PiFlags::empty()), Err(errno::EPERM));
    }

    #[test]
    fn wait_requeue_value_mismatch_is_eagain() {
        let cond = AtomicU32::new(5);
        let target = AtomicU32::new(0);
        let ret = wait_requeue_pi(&cond, 4, None, &target, PiFlags::empty());
        assert_eq!(ret, Err(errno::EAGAIN));
    }

    #[test]
    fn wait_requeue_same_address_is_einval() {
        let word = AtomicU32::new(0);
        let ret = wait_requeue_pi(&word, 0, None, &word, PiFlags::empty());
        assert_eq!(ret, Err(errno::EINVAL));
    }

    #[test]
    fn wait_requeue_past_deadline_times_out() {
        let cond = AtomicU32::new(0);
        let target = AtomicU32::new(0);
        let ret = wait_requeue_pi(&cond, 0, Some(&Timespec::ZERO), &target, PiFlags::empty());
        assert_eq!(ret, Err(errno::ETIMEDOUT));
    }

    #[test]
    fn cmp_requeue_without_waiters() {
        let cond = AtomicU32::new(3);
        let target = AtomicU32::new(0);
        assert_eq!(cmp_requeue_pi(&cond, 3, 0, &target, PiFlags::empty()), Ok(0));
        assert_eq!(
            cmp_requeue_pi(&cond, 2, 0, &target, PiFlags::empty()),
            Err(errno::EAGAIN)
        );
    }
}
