//! C ABI for the PI mutex and condition variable.
//!
//! `pi_mutex_t` and `pi_cond_t` are the fixed-size objects from
//! `rtpi_core`; C callers may embed them, allocate them with the
//! `*_alloc` helpers, or place them in shared memory. Every entry point
//! returns 0 or an errno value; nothing touches the thread's `errno`.

#![allow(non_camel_case_types)]

pub mod cond_abi;
pub mod mutex_abi;

use std::ffi::c_int;

use rtpi_core::{PiCond, PiFlags, PiMutex, PiResult};

pub type pi_mutex_t = PiMutex;
pub type pi_cond_t = PiCond;

/// Init flag: the mutex is used across processes.
pub const RTPI_MUTEX_PSHARED: u32 = PiFlags::PSHARED.bits();
/// Init flag: the condition variable is used across processes.
pub const RTPI_COND_PSHARED: u32 = PiFlags::PSHARED.bits();

#[inline]
pub(crate) fn to_errno(res: PiResult<()>) -> c_int {
    match res {
        Ok(()) => 0,
        Err(err) => err.errno(),
    }
}

pub use cond_abi::{
    pi_cond_alloc, pi_cond_broadcast, pi_cond_destroy, pi_cond_free, pi_cond_init, pi_cond_signal,
    pi_cond_timedwait, pi_cond_wait,
};
pub use mutex_abi::{
    pi_mutex_alloc, pi_mutex_destroy, pi_mutex_free, pi_mutex_init, pi_mutex_lock,
    pi_mutex_trylock, pi_mutex_unlock,
};
