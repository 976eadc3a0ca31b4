//! Monotonic deadlines for timed condition waits.
//!
//! Every condition variable times out against `CLOCK_MONOTONIC`, so wall
//! clock steps never shorten or stretch a wait.

use core::time::Duration;

use crate::error::{PiError, PiResult};
use crate::syscall;

pub const CLOCK_MONOTONIC: i32 = 1;

const NSEC_PER_SEC: i64 = 1_000_000_000;

/// Seconds + nanoseconds, laid out like the kernel's 64-bit `timespec`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timespec {
    /// Seconds.
    pub tv_sec: i64,
    /// Nanoseconds (0 to 999_999_999).
    pub tv_nsec: i64,
}

impl Timespec {
    pub const ZERO: Self = Self::new(0, 0);

    #[must_use]
    pub const fn new(tv_sec: i64, tv_nsec: i64) -> Self {
        Self { tv_sec, tv_nsec }
    }

    /// Whether the kernel will accept this as an absolute timeout.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.tv_sec >= 0 && valid_timespec_nsec(self.tv_nsec)
    }

    /// `self + d`, or `None` on overflow or if `self` is malformed.
    #[must_use]
    pub fn checked_add(self, d: Duration) -> Option<Self> {
        if !valid_timespec_nsec(self.tv_nsec) {
            return None;
        }
        let secs = i64::try_from(d.as_secs()).ok()?;
        let mut tv_sec = self.tv_sec.checked_add(secs)?;
        let mut tv_nsec = self.tv_nsec + i64::from(d.subsec_nanos());
        if tv_nsec >= NSEC_PER_SEC {
            tv_nsec -= NSEC_PER_SEC;
            tv_sec = tv_sec.checked_add(1)?;
        }
        Some(Self { tv_sec, tv_nsec })
    }

    /// Time left until `self` as seen from `now`; zero once passed.
    #[must_use]
    pub fn saturating_duration_since(self, now: Self) -> Duration {
        if self <= now {
            return Duration::ZERO;
        }
        let mut secs = self.tv_sec - now.tv_sec;
        let mut nsec = self.tv_nsec - now.tv_nsec;
        if nsec < 0 {
            nsec += NSEC_PER_SEC;
            secs -= 1;
        }
        Duration::new(secs as u64, nsec as u32)
    }

    pub(crate) const fn to_kernel(self) -> [i64; 2] {
        [self.tv_sec, self.tv_nsec]
    }
}

/// `tv_nsec` must lie in `[0, 999_999_999]`.
#[must_use]
pub const fn valid_timespec_nsec(tv_nsec: i64) -> bool {
    tv_nsec >= 0 && tv_nsec < NSEC_PER_SEC
}

/// Current `CLOCK_MONOTONIC` reading.
pub fn monotonic_now() -> PiResult<Timespec> {
    let mut ts = [0i64; 2];
    syscall::sys_clock_gettime(CLOCK_MONOTONIC, &mut ts).map_err(PiError::from_errno)?;
    Ok(Timespec::new(ts[0], ts[1]))
}

/// Absolute monotonic deadline `timeout` from now. Saturates far in the
/// future instead of overflowing.
pub fn deadline_after(timeout: Duration) -> PiResult<Timespec> {
    let now = monotonic_now()?;
    Ok(now
        .checked_add(timeout)
        .unwrap_or(Timespec::new(i64::MAX, NSEC_PER_SEC - 1)))
}
