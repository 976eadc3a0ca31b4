//! Per-object configuration flags.

use bitflags::bitflags;

use crate::error::{PiError, PiResult};

bitflags! {
    /// Flags accepted by mutex and condition variable initialization.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PiFlags: u32 {
        /// Cross-process operation: the object may live in shared memory
        /// and is driven with shared (non-private) futex ops.
        const PSHARED = 0x1;
    }
}

impl PiFlags {
    /// Parse raw init flags, rejecting unknown bits.
    pub const fn from_raw(raw: u32) -> PiResult<Self> {
        match Self::from_bits(raw) {
            Some(flags) => Ok(flags),
            None => Err(PiError::InvalidArgument),
        }
    }

    #[must_use]
    pub const fn is_pshared(self) -> bool {
        self.contains(Self::PSHARED)
    }

    /// Whether `FUTEX_PRIVATE_FLAG` applies to futex ops on this object.
    #[must_use]
    pub const fn futex_private(self) -> bool {
        !self.is_pshared()
    }

    /// Both objects agree on process-shared mode.
    #[must_use]
    pub const fn same_sharing(self, other: Self) -> bool {
        self.is_pshared() == other.is_pshared()
    }
}
