//! Typed syscall entry points used by the futex gateway.
//!
//! Everything here is a single trap with errno decoding; retry policy lives
//! with the callers.

pub mod raw;

#[cfg(target_arch = "x86_64")]
mod nr {
    pub const GETTID: usize = 186;
    pub const FUTEX: usize = 202;
    pub const CLOCK_GETTIME: usize = 228;
}

#[cfg(target_arch = "aarch64")]
mod nr {
    pub const GETTID: usize = 178;
    pub const FUTEX: usize = 98;
    pub const CLOCK_GETTIME: usize = 113;
}

/// Decode a raw trap return into `Ok(value)` or `Err(errno)`.
#[inline]
fn decode(ret: usize) -> Result<usize, i32> {
    let signed = ret as isize;
    if (-4095..0).contains(&signed) {
        Err((-signed) as i32)
    } else {
        Ok(ret)
    }
}

/// `futex(2)`.
///
/// `timeout_or_val2` is either a pointer to a kernel timespec or, for the
/// requeue ops, an integer count; the kernel interprets it per `op`.
///
/// # Safety
///
/// `uaddr` must point to a live, 4-byte aligned futex word. When `op` uses
/// them, `timeout_or_val2` (as a pointer) and `uaddr2` must be valid too.
#[inline]
pub unsafe fn sys_futex(
    uaddr: *const u32,
    op: i32,
    val: u32,
    timeout_or_val2: usize,
    uaddr2: *const u32,
    val3: u32,
) -> Result<usize, i32> {
    // SAFETY: forwarded caller contract.
    let ret = unsafe {
        raw::syscall6(
            nr::FUTEX,
            uaddr as usize,
            op as u32 as usize,
            val as usize,
            timeout_or_val2,
            uaddr2 as usize,
            val3 as usize,
        )
    };
    decode(ret)
}

/// `gettid(2)`. Cannot fail.
#[inline]
pub fn sys_gettid() -> u32 {
    // SAFETY: gettid takes no arguments and touches no user memory.
    unsafe { raw::syscall0(nr::GETTID) as u32 }
}

/// `clock_gettime(2)` into a kernel `struct timespec` (`[tv_sec, tv_nsec]`).
#[inline]
pub fn sys_clock_gettime(clock_id: i32, ts: &mut [i64; 2]) -> Result<(), i32> {
    // SAFETY: `ts` is a live, writable 16-byte buffer matching the kernel layout.
    let ret = unsafe {
        raw::syscall2(
            nr::CLOCK_GETTIME,
            clock_id as usize,
            ts.as_mut_ptr() as usize,
        )
    };
    decode(ret).map(|_| ())
}
