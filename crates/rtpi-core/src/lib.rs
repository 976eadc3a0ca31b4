//! Priority-inheritance mutex and condition variable for Linux.
//!
//! [`PiMutex`] is a futex word holding the owner's tid, driven by
//! `FUTEX_LOCK_PI`/`FUTEX_UNLOCK_PI` under contention. [`PiCond`] hands
//! woken waiters straight to the mutex with the requeue-PI futex ops, so
//! priority inheritance holds across the whole wait/wake cycle.
//!
//! Both objects are fixed-size plain data, statically initializable, and
//! usable across processes from shared memory with [`PiFlags::PSHARED`].

#![deny(unsafe_code)]

pub mod errno;
pub mod error;
pub mod flags;
pub mod futex;
#[allow(unsafe_code)]
pub mod pi;
#[allow(unsafe_code)]
pub mod syscall;
pub mod thread;
pub mod time;

pub use error::{PiError, PiResult};
pub use flags::PiFlags;
pub use futex::pi_futex_supported;
pub use pi::{CACHE_LINE, COND_SIZE, MUTEX_SIZE, PiCond, PiMutex};
pub use thread::current_tid;
pub use time::{Timespec, deadline_after, monotonic_now};
