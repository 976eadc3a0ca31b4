//! Priority-inheritance mutex.
//!
//! The futex word is 0 when free and the owner's kernel tid when held.
//! Uncontended lock/unlock are a single CAS. Once a waiter queues, the
//! kernel sets `FUTEX_WAITERS` in the word, the owner's release CAS fails,
//! and `FUTEX_UNLOCK_PI` hands the lock to the top-priority waiter.

use core::ptr;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::error::{PiError, PiResult};
use crate::errno;
use crate::flags::PiFlags;
use crate::futex;
use crate::thread::current_tid;

use super::layout::MUTEX_RESERVED;

/// The 8-byte lock core shared by [`PiMutex`] and the condition variable's
/// private bookkeeping lock.
#[repr(C)]
#[derive(Debug)]
pub(crate) struct RawPiMutex {
    futex: AtomicU32,
    flags: AtomicU32,
}

impl RawPiMutex {
    pub(crate) const fn new(flags: PiFlags) -> Self {
        Self {
            futex: AtomicU32::new(0),
            flags: AtomicU32::new(flags.bits()),
        }
    }

    pub(crate) fn init(&self, flags: PiFlags) {
        self.futex.store(0, Ordering::Relaxed);
        self.flags.store(flags.bits(), Ordering::Release);
    }

    pub(crate) fn clear(&self) {
        self.futex.store(0, Ordering::Relaxed);
        self.flags.store(0, Ordering::Release);
    }

    #[inline]
    pub(crate) fn word(&self) -> &AtomicU32 {
        &self.futex
    }

    #[inline]
    pub(crate) fn flags(&self) -> PiFlags {
        PiFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn try_lock(&self) -> bool {
        self.futex
            .compare_exchange(0, current_tid(), Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    #[inline]
    pub(crate) fn lock(&self) -> PiResult<()> {
        if self.try_lock() {
            return Ok(());
        }
        self.lock_slow()
    }

    #[cold]
    fn lock_slow(&self) -> PiResult<()> {
        let flags = self.flags();
        loop {
            match futex::lock_pi(&self.futex, flags) {
                Ok(_) => return Ok(()),
                // EAGAIN: the owner is mid-exit; the kernel asks us to retry.
                Err(errno::EINTR | errno::EAGAIN) => {
                    log::trace!("FUTEX_LOCK_PI retry on {:p}", &self.futex);
                    std::thread::yield_now();
                }
                Err(code) => return Err(PiError::from_errno(code)),
            }
        }
    }

    #[inline]
    pub(crate) fn unlock(&self) -> PiResult<()> {
        if self
            .futex
            .compare_exchange(current_tid(), 0, Ordering::Release, Ordering::Relaxed)
            .is_ok()
        {
            return Ok(());
        }
        self.unlock_slow()
    }

    #[cold]
    fn unlock_slow(&self) -> PiResult<()> {
        log::trace!("FUTEX_UNLOCK_PI on {:p}", &self.futex);
        futex::unlock_pi(&self.futex, self.flags())
            .map(|_| ())
            .map_err(PiError::from_errno)
    }

    #[inline]
    pub(crate) fn owner(&self) -> u32 {
        futex::owner_tid(self.futex.load(Ordering::Relaxed))
    }
}

/// A cache-line sized PI mutex.
///
/// Plain data with no pointers, so it can live in a static, on the heap, or
/// in a shared memory segment mapped at different addresses in different
/// processes (with [`PiFlags::PSHARED`]).
#[repr(C, align(64))]
pub struct PiMutex {
    raw: RawPiMutex,
    _reserved: [u8; MUTEX_RESERVED],
}

#[allow(clippy::declare_interior_mutable_const)]
impl PiMutex {
    /// Statically initialized process-private mutex.
    pub const INIT: Self = Self::new(PiFlags::empty());
    /// Statically initialized process-shared mutex.
    pub const INIT_PSHARED: Self = Self::new(PiFlags::PSHARED);

    /// Unlocked mutex with `flags`.
    #[must_use]
    pub const fn new(flags: PiFlags) -> Self {
        Self {
            raw: RawPiMutex::new(flags),
            _reserved: [0; MUTEX_RESERVED],
        }
    }

    /// Unlocked mutex from raw init flags; unknown bits are rejected.
    pub const fn with_raw_flags(raw_flags: u32) -> PiResult<Self> {
        match PiFlags::from_raw(raw_flags) {
            Ok(flags) => Ok(Self::new(flags)),
            Err(err) => Err(err),
        }
    }

    /// Re-initialize in place. On error the object is left untouched.
    ///
    /// [`PiError::Busy`] while held; the caller must also ensure nobody is
    /// about to lock it.
    pub fn init(&self, raw_flags: u32) -> PiResult<()> {
        let flags = PiFlags::from_raw(raw_flags)?;
        if self.is_locked() {
            return Err(PiError::Busy);
        }
        self.raw.init(flags);
        Ok(())
    }

    /// Initialize caller-provided storage, e.g. inside a shared mapping.
    ///
    /// # Safety
    ///
    /// `slot` must be valid for writes of `size_of::<PiMutex>()` bytes and
    /// aligned to 64, and no other thread may be using it.
    #[allow(unsafe_code)]
    pub unsafe fn init_at(slot: *mut Self, raw_flags: u32) -> PiResult<()> {
        if slot.is_null() {
            return Err(PiError::InvalidArgument);
        }
        let mutex = Self::with_raw_flags(raw_flags)?;
        // SAFETY: caller guarantees `slot` is writable, aligned, and unshared.
        unsafe { ptr::write(slot, mutex) };
        Ok(())
    }

    /// Acquire without blocking. `Ok(false)` means someone else holds it;
    /// this path never detects self-deadlock.
    #[inline]
    pub fn try_lock(&self) -> PiResult<bool> {
        Ok(self.raw.try_lock())
    }

    /// Acquire, blocking with priority inheritance if contended.
    ///
    /// Returns [`PiError::Deadlock`] if the caller already holds it.
    #[inline]
    pub fn lock(&self) -> PiResult<()> {
        self.raw.lock()
    }

    /// Release. [`PiError::NotOwner`] if the caller does not hold it.
    #[inline]
    pub fn unlock(&self) -> PiResult<()> {
        self.raw.unlock()
    }

    /// Zero the object. [`PiError::Busy`] while it is held.
    pub fn destroy(&self) -> PiResult<()> {
        if self.raw.word().load(Ordering::Acquire) != 0 {
            return Err(PiError::Busy);
        }
        self.raw.clear();
        Ok(())
    }

    #[must_use]
    pub fn flags(&self) -> PiFlags {
        self.raw.flags()
    }

    #[must_use]
    pub fn is_pshared(&self) -> bool {
        self.flags().is_pshared()
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.raw.word().load(Ordering::Relaxed) != 0
    }

    #[must_use]
    pub fn is_owned_by_current_thread(&self) -> bool {
        self.raw.owner() == current_tid()
    }

    #[inline]
    pub(crate) fn raw(&self) -> &RawPiMutex {
        &self.raw
    }
}

// The futex word leads the object, so `&mutex` is also the futex address.
const _: () = assert!(core::mem::offset_of!(PiMutex, raw) == 0);

impl Default for PiMutex {
    fn default() -> Self {
        Self::INIT
    }
}

impl core::fmt::Debug for PiMutex {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PiMutex")
            .field("owner", &self.raw.owner())
            .field("flags", &self.flags())
            .finish()
    }
}
