//! Error number definitions.
//!
//! The subset of Linux `<errno.h>` values the futex calls and the PI
//! primitives can produce, plus the message table used for `Display`.

pub const EPERM: i32 = 1;
pub const ESRCH: i32 = 3;
pub const EINTR: i32 = 4;
pub const EAGAIN: i32 = 11;
pub const ENOMEM: i32 = 12;
pub const EFAULT: i32 = 14;
pub const EBUSY: i32 = 16;
pub const EINVAL: i32 = 22;
pub const EDEADLK: i32 = 35;
pub const ENOSYS: i32 = 38;
pub const ETIMEDOUT: i32 = 110;
pub const EOWNERDEAD: i32 = 130;

/// Returns the message string for `errnum`, or `"Unknown error"`.
pub fn strerror_message(errnum: i32) -> &'static str {
    match errnum {
        0 => "Success",
        EPERM => "Operation not permitted",
        ESRCH => "No such process",
        EINTR => "Interrupted system call",
        EAGAIN => "Resource temporarily unavailable",
        ENOMEM => "Cannot allocate memory",
        EFAULT => "Bad address",
        EBUSY => "Device or resource busy",
        EINVAL => "Invalid argument",
        EDEADLK => "Resource deadlock avoided",
        ENOSYS => "Function not implemented",
        ETIMEDOUT => "Connection timed out",
        EOWNERDEAD => "Owner died",
        _ => "Unknown error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strerror_known() {
        assert_eq!(strerror_message(EINVAL), "Invalid argument");
        assert_eq!(strerror_message(EDEADLK), "Resource deadlock avoided");
        assert_eq!(strerror_message(ETIMEDOUT), "Connection timed out");
        assert_eq!(strerror_message(0), "Success");
    }

    #[test]
    fn strerror_unknown() {
        assert_eq!(strerror_message(9999), "Unknown error");
        assert_eq!(strerror_message(-1), "Unknown error");
    }

    #[test]
    fn constants_match_libc() {
        assert_eq!(EPERM, libc::EPERM);
        assert_eq!(EINTR, libc::EINTR);
        assert_eq!(EAGAIN, libc::EAGAIN);
        assert_eq!(EBUSY, libc::EBUSY);
        assert_eq!(EINVAL, libc::EINVAL);
        assert_eq!(EDEADLK, libc::EDEADLK);
        assert_eq!(ENOSYS, libc::ENOSYS);
        assert_eq!(ETIMEDOUT, libc::ETIMEDOUT);
        assert_eq!(EOWNERDEAD, libc::EOWNERDEAD);
    }
}
