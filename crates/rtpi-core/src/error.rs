//! Typed failure taxonomy for the PI primitives.

use core::fmt;

use crate::errno;

/// Why a PI mutex or condition variable operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PiError {
    /// Unrecognized flag bits, a malformed deadline, or a shared/private
    /// mismatch between a condition variable and the mutex used with it.
    InvalidArgument,
    /// The caller already owns the mutex it tried to lock.
    Deadlock,
    /// A timed wait's deadline passed before a wake was attributed to it.
    TimedOut,
    /// The blocking call was interrupted and could not be resumed.
    Interrupted,
    /// The object is held (trylock) or still in use (destroy).
    Busy,
    /// The caller does not own the mutex it tried to release.
    NotOwner,
    /// The kernel does not implement the PI futex operations.
    KernelUnavailable,
    /// Any other kernel errno, passed through untouched.
    Os(i32),
}

/// Convenience alias used by every public operation.
pub type PiResult<T> = Result<T, PiError>;

impl PiError {
    /// Classify a kernel errno.
    #[must_use]
    pub const fn from_errno(code: i32) -> Self {
        match code {
            errno::EINVAL => Self::InvalidArgument,
            errno::EDEADLK => Self::Deadlock,
            errno::ETIMEDOUT => Self::TimedOut,
            errno::EINTR => Self::Interrupted,
            errno::EBUSY => Self::Busy,
            errno::EPERM => Self::NotOwner,
            errno::ENOSYS => Self::KernelUnavailable,
            other => Self::Os(other),
        }
    }

    /// The errno value reported across the C ABI.
    #[must_use]
    pub const fn errno(self) -> i32 {
        match self {
            Self::InvalidArgument => errno::EINVAL,
            Self::Deadlock => errno::EDEADLK,
            Self::TimedOut => errno::ETIMEDOUT,
            Self::Interrupted => errno::EINTR,
            Self::Busy => errno::EBUSY,
            Self::NotOwner => errno::EPERM,
            Self::KernelUnavailable => errno::ENOSYS,
            Self::Os(code) => code,
        }
    }
}

impl fmt::Display for PiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Os(code) => write!(f, "{} (errno {code})", errno::strerror_message(*code)),
            other => f.write_str(errno::strerror_message(other.errno())),
        }
    }
}

impl std::error::Error for PiError {}
