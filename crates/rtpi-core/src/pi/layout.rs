//! Fixed object layouts.
//!
//! Both objects are plain bytes with no pointers so they can be statically
//! initialized and placed at the same offset in shared mappings. Sizes are
//! part of the C ABI (`pi_mutex_t`, `pi_cond_t`) and are checked at compile
//! time.

use core::mem::{align_of, size_of};

use super::cond::PiCond;
use super::mutex::{PiMutex, RawPiMutex};

pub const CACHE_LINE: usize = 64;

/// `pi_mutex_t`: one cache line.
pub const MUTEX_SIZE: usize = CACHE_LINE;
/// `pi_cond_t`: two cache lines.
pub const COND_SIZE: usize = 2 * CACHE_LINE;

/// Bytes in use by the 8-byte lock core.
pub(crate) const RAW_MUTEX_SIZE: usize = 8;
/// Cond fields ahead of the padding: seq, flags, private lock, wake id,
/// two counters.
pub(crate) const COND_USED: usize = 4 + 4 + RAW_MUTEX_SIZE + 4 + 4 + 4;

pub(crate) const MUTEX_RESERVED: usize = MUTEX_SIZE - RAW_MUTEX_SIZE;
pub(crate) const COND_RESERVED: usize = COND_SIZE - COND_USED;

const _: () = assert!(size_of::<RawPiMutex>() == RAW_MUTEX_SIZE);
const _: () = assert!(size_of::<PiMutex>() == MUTEX_SIZE);
const _: () = assert!(align_of::<PiMutex>() == CACHE_LINE);
const _: () = assert!(size_of::<PiCond>() == COND_SIZE);
const _: () = assert!(align_of::<PiCond>() == CACHE_LINE);
