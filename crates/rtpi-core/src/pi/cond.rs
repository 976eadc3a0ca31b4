//! Priority-inheritance condition variable.
//!
//! Waiters sleep with `FUTEX_WAIT_REQUEUE_PI` on the sequence word `cond`
//! and are moved by `FUTEX_CMP_REQUEUE_PI` straight onto the caller's
//! [`PiMutex`] futex, so a woken waiter never runs without the mutex and
//! always inherits through it.
//!
//! Counter bookkeeping lives behind a private PI lock (`priv_mut`):
//!
//! - `pending_wait`: registered waiters that have not returned yet.
//! - `pending_wake`: wake grants not yet consumed, `<= pending_wait`.
//! - `wake_id`: sequence value published by the latest grant. A waiter
//!   registered at `seq` is covered by it when `wake_id` has reached `seq`.
//!
//! Lock order is `mutex` then `priv_mut`. Nothing blocks on a user mutex
//! while holding `priv_mut`.

use core::ptr;
use core::sync::atomic::{AtomicU32, Ordering};
use core::time::Duration;

use crate::errno;
use crate::error::{PiError, PiResult};
use crate::flags::PiFlags;
use crate::futex;
use crate::time::{self, Timespec};

use super::layout::COND_RESERVED;
use super::mutex::{PiMutex, RawPiMutex};

/// Requeue count for broadcast. The kernel reads it as a signed int.
const REQUEUE_ALL: u32 = i32::MAX as u32;

/// `a` is at or past `b` on the wrapping sequence line.
#[inline]
const fn seq_reached(a: u32, b: u32) -> bool {
    (a.wrapping_sub(b) as i32) >= 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WakeMode {
    One,
    All,
}

impl WakeMode {
    /// `nr_wake` is always 1; this is the count moved beyond it. Zero still
    /// moves the top waiter when the mutex cannot be taken on its behalf.
    const fn nr_requeue(self) -> u32 {
        match self {
            Self::One => 0,
            Self::All => REQUEUE_ALL,
        }
    }
}

/// A two cache line PI condition variable.
///
/// The mutex is passed on every call instead of being bound at init, so one
/// object can serve several mutexes over its lifetime (one at a time).
#[repr(C, align(64))]
pub struct PiCond {
    cond: AtomicU32,
    flags: AtomicU32,
    priv_mut: RawPiMutex,
    wake_id: AtomicU32,
    pending_wake: AtomicU32,
    pending_wait: AtomicU32,
    _reserved: [u8; COND_RESERVED],
}

// The sequence word leads the object.
const _: () = assert!(core::mem::offset_of!(PiCond, cond) == 0);

/// Holds `priv_mut`; counters are only touched through it.
struct Bookkeeping<'a> {
    cv: &'a PiCond,
}

impl Bookkeeping<'_> {
    fn seq(&self) -> u32 {
        self.cv.cond.load(Ordering::Relaxed)
    }

    fn advance(&self) -> u32 {
        let next = self.seq().wrapping_add(1);
        self.cv.cond.store(next, Ordering::Release);
        next
    }

    fn waiting(&self) -> u32 {
        self.cv.pending_wait.load(Ordering::Relaxed)
    }

    fn granted(&self) -> u32 {
        self.cv.pending_wake.load(Ordering::Relaxed)
    }

    /// New waiter; returns its sequence epoch.
    fn register(&self) -> u32 {
        self.cv
            .pending_wait
            .store(self.waiting().wrapping_add(1), Ordering::Relaxed);
        self.advance()
    }

    /// Publish a fresh wake epoch. `None` when there is nobody to wake or,
    /// for a single wake, every waiter already holds a grant.
    fn post(&self, mode: WakeMode) -> Option<u32> {
        let waiting = self.waiting();
        if waiting == 0 {
            return None;
        }
        let granted = match mode {
            WakeMode::One if self.granted() >= waiting => return None,
            WakeMode::One => self.granted() + 1,
            WakeMode::All => waiting,
        };
        self.cv.pending_wake.store(granted, Ordering::Relaxed);
        let seq = self.advance();
        self.cv.wake_id.store(seq, Ordering::Relaxed);
        Some(seq)
    }

    /// After a stale compare: a new epoch if a grant is still outstanding.
    fn repost(&self) -> Option<u32> {
        if self.granted() == 0 || self.waiting() == 0 {
            return None;
        }
        let seq = self.advance();
        self.cv.wake_id.store(seq, Ordering::Relaxed);
        Some(seq)
    }

    fn consume(&self) {
        self.cv
            .pending_wake
            .store(self.granted() - 1, Ordering::Relaxed);
        self.cv
            .pending_wait
            .store(self.waiting() - 1, Ordering::Relaxed);
    }

    /// Take a grant, whichever waiter it was aimed at.
    fn consume_any(&self) -> bool {
        if self.granted() == 0 {
            return false;
        }
        self.consume();
        true
    }

    /// Take a grant only if it was published after `seq` registered.
    fn consume_covering(&self, seq: u32) -> bool {
        if self.granted() == 0 || !seq_reached(self.cv.wake_id.load(Ordering::Relaxed), seq) {
            return false;
        }
        self.consume();
        true
    }

    /// Deregister without a grant; keeps `pending_wake <= pending_wait`.
    fn leave(&self) {
        let waiting = self.waiting().saturating_sub(1);
        self.cv.pending_wait.store(waiting, Ordering::Relaxed);
        if self.granted() > waiting {
            self.cv.pending_wake.store(waiting, Ordering::Relaxed);
        }
    }
}

impl Drop for Bookkeeping<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.cv.priv_mut.unlock() {
            log::error!("condvar {:p}: private lock release failed: {err}", self.cv);
        }
    }
}

#[allow(clippy::declare_interior_mutable_const)]
impl PiCond {
    /// Statically initialized process-private condition variable.
    pub const INIT: Self = Self::new(PiFlags::empty());
    /// Statically initialized process-shared condition variable.
    pub const INIT_PSHARED: Self = Self::new(PiFlags::PSHARED);

    #[must_use]
    pub const fn new(flags: PiFlags) -> Self {
        Self {
            cond: AtomicU32::new(0),
            flags: AtomicU32::new(flags.bits()),
            priv_mut: RawPiMutex::new(flags),
            wake_id: AtomicU32::new(0),
            pending_wake: AtomicU32::new(0),
            pending_wait: AtomicU32::new(0),
            _reserved: [0; COND_RESERVED],
        }
    }

    /// Idle condition variable from raw init flags; unknown bits are rejected.
    pub const fn with_raw_flags(raw_flags: u32) -> PiResult<Self> {
        match PiFlags::from_raw(raw_flags) {
            Ok(flags) => Ok(Self::new(flags)),
            Err(err) => Err(err),
        }
    }

    /// Re-initialize in place. On error the object is left untouched.
    ///
    /// [`PiError::Busy`] while waiters are registered; the caller must also
    /// ensure nobody is about to wait on or signal it.
    pub fn init(&self, raw_flags: u32) -> PiResult<()> {
        let flags = PiFlags::from_raw(raw_flags)?;
        self.ensure_idle()?;
        self.reset(flags);
        Ok(())
    }

    /// Initialize caller-provided storage, e.g. inside a shared mapping.
    ///
    /// # Safety
    ///
    /// `slot` must be valid for writes of `size_of::<PiCond>()` bytes and
    /// aligned to 64, and no other thread may be using it.
    #[allow(unsafe_code)]
    pub unsafe fn init_at(slot: *mut Self, raw_flags: u32) -> PiResult<()> {
        if slot.is_null() {
            return Err(PiError::InvalidArgument);
        }
        let cv = Self::with_raw_flags(raw_flags)?;
        // SAFETY: caller guarantees `slot` is writable, aligned, and unshared.
        unsafe { ptr::write(slot, cv) };
        Ok(())
    }

    /// Zero the object. [`PiError::Busy`] while anyone is registered as a
    /// waiter or inside the bookkeeping section.
    pub fn destroy(&self) -> PiResult<()> {
        self.ensure_idle()?;
        self.reset(PiFlags::empty());
        Ok(())
    }

    fn ensure_idle(&self) -> PiResult<()> {
        if self.pending_wait.load(Ordering::Acquire) != 0 || self.priv_mut.owner() != 0 {
            return Err(PiError::Busy);
        }
        Ok(())
    }

    fn reset(&self, flags: PiFlags) {
        self.cond.store(0, Ordering::Relaxed);
        self.wake_id.store(0, Ordering::Relaxed);
        self.pending_wake.store(0, Ordering::Relaxed);
        self.pending_wait.store(0, Ordering::Relaxed);
        self.priv_mut.init(flags);
        self.flags.store(flags.bits(), Ordering::Release);
    }

    #[must_use]
    pub fn flags(&self) -> PiFlags {
        PiFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn is_pshared(&self) -> bool {
        self.flags().is_pshared()
    }

    /// Registered waiters right now. A snapshot, stale as soon as it returns.
    #[must_use]
    pub fn waiters(&self) -> u32 {
        self.pending_wait.load(Ordering::Acquire)
    }

    /// Block until signalled. The caller must hold `mutex`; it is released
    /// while waiting and held again on `Ok`. On `Err` it is not held.
    ///
    /// May return `Ok` without a matching signal (a grant taken by another
    /// waiter, an interrupted sleep), so re-check the predicate in a loop:
    /// `while !ready { cond.wait(&mutex)?; }`.
    ///
    /// If the private bookkeeping lock cannot be taken after wakeup the
    /// error is returned with `mutex` released, but the waiter stays
    /// registered and the object reports [`PiError::Busy`] to `init` and
    /// `destroy` from then on.
    pub fn wait(&self, mutex: &PiMutex) -> PiResult<()> {
        self.wait_until(mutex, None)
    }

    /// [`wait`](Self::wait) with an absolute `CLOCK_MONOTONIC` deadline.
    ///
    /// Returns [`PiError::TimedOut`] without the mutex once the deadline
    /// passes. If a wake aimed at this waiter is pending when the timeout is
    /// observed, the wake wins: the grant is consumed, the mutex reacquired,
    /// and `Ok` returned.
    pub fn timedwait(&self, mutex: &PiMutex, deadline: &Timespec) -> PiResult<()> {
        if !deadline.is_valid() {
            return Err(PiError::InvalidArgument);
        }
        self.wait_until(mutex, Some(deadline))
    }

    /// [`timedwait`](Self::timedwait) with a deadline `timeout` from now.
    pub fn wait_timeout(&self, mutex: &PiMutex, timeout: Duration) -> PiResult<()> {
        let deadline = time::deadline_after(timeout)?;
        self.wait_until(mutex, Some(&deadline))
    }

    /// Wake one waiter by moving it onto `mutex`.
    pub fn signal(&self, mutex: &PiMutex) -> PiResult<()> {
        self.wake(mutex, WakeMode::One)
    }

    /// Wake every registered waiter by moving them all onto `mutex`.
    pub fn broadcast(&self, mutex: &PiMutex) -> PiResult<()> {
        self.wake(mutex, WakeMode::All)
    }

    /// Both futexes take part in one requeue op, so they must agree on the
    /// private flag.
    fn check_pairing(&self, mutex: &PiMutex) -> PiResult<PiFlags> {
        let flags = self.flags();
        if !flags.same_sharing(mutex.flags()) {
            log::debug!(
                "condvar {:p}: pshared mismatch with mutex {:p}",
                self,
                mutex
            );
            return Err(PiError::InvalidArgument);
        }
        Ok(flags)
    }

    fn bookkeeping(&self) -> PiResult<Bookkeeping<'_>> {
        self.priv_mut.lock()?;
        Ok(Bookkeeping { cv: self })
    }

    fn wait_until(&self, mutex: &PiMutex, deadline: Option<&Timespec>) -> PiResult<()> {
        let flags = self.check_pairing(mutex)?;
        let seq = self.enqueue(mutex)?;
        self.sleep(mutex, seq, deadline, flags)
    }

    /// Release `mutex` and register; returns the waiter's epoch.
    fn enqueue(&self, mutex: &PiMutex) -> PiResult<u32> {
        let book = self.bookkeeping()?;
        mutex.unlock()?;
        Ok(book.register())
    }

    fn sleep(
        &self,
        mutex: &PiMutex,
        seq: u32,
        deadline: Option<&Timespec>,
        flags: PiFlags,
    ) -> PiResult<()> {
        let mut expected = seq;
        loop {
            let ret =
                futex::wait_requeue_pi(&self.cond, expected, deadline, mutex.raw().word(), flags);
            match self.settle(mutex, seq, ret)? {
                Some(next) => expected = next,
                None => return Ok(()),
            }
        }
    }

    /// Resolve one kernel return for the waiter registered at `seq`.
    ///
    /// `Ok(None)`: done, `mutex` held. `Ok(Some(seq))`: sleep again on that
    /// sequence value. `Err`: done, `mutex` not held.
    fn settle(
        &self,
        mutex: &PiMutex,
        seq: u32,
        ret: Result<usize, i32>,
    ) -> PiResult<Option<u32>> {
        let book = match self.bookkeeping() {
            Ok(book) => book,
            Err(err) => {
                // The waiter stays counted in `pending_wait`.
                log::error!("condvar {:p}: private lock failed after wakeup: {err}", self);
                if ret.is_ok() {
                    if let Err(unlock_err) = mutex.unlock() {
                        log::debug!("condvar {:p}: releasing mutex failed: {unlock_err}", self);
                    }
                }
                return Err(err);
            }
        };
        match ret {
            // Requeued and woken: the kernel already made us the owner.
            Ok(_) => {
                if book.consume_any() {
                    return Ok(None);
                }
                log::trace!("condvar {:p}: stale requeue, waiting again", self);
                if let Err(err) = mutex.unlock() {
                    book.leave();
                    return Err(err);
                }
            }
            Err(errno::EAGAIN | errno::EINTR) => {
                if book.consume_covering(seq) {
                    drop(book);
                    return mutex.lock().map(|()| None);
                }
                log::trace!("condvar {:p}: sequence moved, waiting again", self);
            }
            Err(errno::ETIMEDOUT) => {
                if book.consume_covering(seq) {
                    drop(book);
                    return mutex.lock().map(|()| None);
                }
                book.leave();
                return Err(PiError::TimedOut);
            }
            Err(code) => {
                book.leave();
                let err = PiError::from_errno(code);
                log::debug!("condvar {:p}: wait failed: {err}", self);
                return Err(err);
            }
        }
        Ok(Some(book.seq()))
    }

    fn wake(&self, mutex: &PiMutex, mode: WakeMode) -> PiResult<()> {
        let flags = self.check_pairing(mutex)?;
        let Some(mut seq) = self.bookkeeping()?.post(mode) else {
            return Ok(());
        };

        loop {
            match futex::cmp_requeue_pi(&self.cond, seq, mode.nr_requeue(), mutex.raw().word(), flags)
            {
                // Zero moved means every covered waiter is still on its way
                // to sleep; it will see the new sequence and take the grant.
                Ok(moved) => {
                    log::trace!("condvar {:p}: {mode:?} moved {moved} waiter(s)", self);
                    return Ok(());
                }
                Err(errno::EAGAIN) => {
                    let Some(next) = self.bookkeeping()?.repost() else {
                        return Ok(());
                    };
                    log::trace!("condvar {:p}: requeue raced, retrying at {next}", self);
                    seq = next;
                }
                Err(code) => {
                    let err = PiError::from_errno(code);
                    log::debug!("condvar {:p}: requeue failed: {err}", self);
                    return Err(err);
                }
            }
        }
    }
}

impl Default for PiCond {
    fn default() -> Self {
        Self::INIT
    }
}

impl core::fmt::Debug for PiCond {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PiCond")
            .field("seq", &self.cond.load(Ordering::Relaxed))
            .field("waiters", &self.pending_wait.load(Ordering::Relaxed))
            .field("pending_wake", &self.pending_wake.load(Ordering::Relaxed))
            .field("flags", &self.flags())
            .finish()
    }
}
