//! Raw Linux trap wrappers.
//!
//! Only the arities the futex, `gettid` and `clock_gettime` calls need are
//! provided. Each wrapper issues one trap (`syscall` on x86_64, `svc 0` on
//! aarch64) and hands back the raw return register: values in
//! `[-4095, -1]` (as `isize`) are negated errno codes.

use core::arch::asm;

/// Trap with no arguments.
///
/// # Safety
///
/// `nr` must be a syscall that takes no arguments and has no memory effects
/// the caller has not accounted for.
#[inline]
#[cfg(target_arch = "x86_64")]
pub unsafe fn syscall0(nr: usize) -> usize {
    let ret: usize;
    // SAFETY: `syscall` clobbers rcx/r11 only; caller vouches for `nr`.
    unsafe {
        asm!(
            "syscall",
            inlateout("rax") nr => ret,
            lateout("rcx") _,
            lateout("r11") _,
            options(nostack, preserves_flags),
        );
    }
    ret
}

/// Trap with no arguments.
///
/// # Safety
///
/// See the x86_64 variant.
#[inline]
#[cfg(target_arch = "aarch64")]
pub unsafe fn syscall0(nr: usize) -> usize {
    let ret: usize;
    // SAFETY: `svc 0` returns in x0; caller vouches for `nr`.
    unsafe {
        asm!(
            "svc 0",
            in("x8") nr,
            lateout("x0") ret,
            options(nostack),
        );
    }
    ret
}

/// Trap with two arguments.
///
/// # Safety
///
/// `nr` and its arguments must be valid for the kernel; pointer arguments
/// must reference memory that stays live for the duration of the call.
#[inline]
#[cfg(target_arch = "x86_64")]
pub unsafe fn syscall2(nr: usize, a1: usize, a2: usize) -> usize {
    let ret: usize;
    // SAFETY: caller vouches for the syscall and its arguments.
    unsafe {
        asm!(
            "syscall",
            inlateout("rax") nr => ret,
            in("rdi") a1,
            in("rsi") a2,
            lateout("rcx") _,
            lateout("r11") _,
            options(nostack, preserves_flags),
        );
    }
    ret
}

/// Trap with two arguments.
///
/// # Safety
///
/// See the x86_64 variant.
#[inline]
#[cfg(target_arch = "aarch64")]
pub unsafe fn syscall2(nr: usize, a1: usize, a2: usize) -> usize {
    let ret: usize;
    // SAFETY: caller vouches for the syscall and its arguments.
    unsafe {
        asm!(
            "svc 0",
            in("x8") nr,
            inlateout("x0") a1 => ret,
            in("x1") a2,
            options(nostack),
        );
    }
    ret
}

/// Trap with six arguments (the futex call shape).
///
/// # Safety
///
/// `nr` and its arguments must be valid for the kernel; pointer arguments
/// must reference memory that stays live for the duration of the call.
#[inline]
#[cfg(target_arch = "x86_64")]
pub unsafe fn syscall6(
    nr: usize,
    a1: usize,
    a2: usize,
    a3: usize,
    a4: usize,
    a5: usize,
    a6: usize,
) -> usize {
    let ret: usize;
    // SAFETY: caller vouches for the syscall and its arguments.
    unsafe {
        asm!(
            "syscall",
            inlateout("rax") nr => ret,
            in("rdi") a1,
            in("rsi") a2,
            in("rdx") a3,
            in("r10") a4,
            in("r8") a5,
            in("r9") a6,
            lateout("rcx") _,
            lateout("r11") _,
            options(nostack, preserves_flags),
        );
    }
    ret
}

/// Trap with six arguments (the futex call shape).
///
/// # Safety
///
/// See the x86_64 variant.
#[inline]
#[cfg(target_arch = "aarch64")]
pub unsafe fn syscall6(
    nr: usize,
    a1: usize,
    a2: usize,
    a3: usize,
    a4: usize,
    a5: usize,
    a6: usize,
) -> usize {
    let ret: usize;
    // SAFETY: caller vouches for the syscall and its arguments.
    unsafe {
        asm!(
            "svc 0",
            in("x8") nr,
            inlateout("x0") a1 => ret,
            in("x1") a2,
            in("x2") a3,
            in("x3") a4,
            in("x4") a5,
            in("x5") a6,
            options(nostack),
        );
    }
    ret
}
