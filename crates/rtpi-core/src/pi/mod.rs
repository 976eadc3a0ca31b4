//! The two PI synchronization objects and their fixed layouts.

pub mod cond;
pub mod layout;
pub mod mutex;

pub use cond::PiCond;
pub use layout::{CACHE_LINE, COND_SIZE, MUTEX_SIZE};
pub use mutex::PiMutex;
