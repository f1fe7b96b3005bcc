//! 32-bit MCB
//!
//! The classic MCB interface, kept for file systems that address their
//! volume with 32-bit sector numbers. It is a thin shim over [`LargeMcb`]:
//! requests are widened to 64 bits on the way in and narrowed on the way
//! out.
//!
//! # NT Semantics
//!
//! - Holes are reported as LBN 0
//! - A request whose VBN or LBN range would not fit in 32 bits is refused

use super::large::LargeMcb;
use crate::pool::PoolType;
use crate::status::{McbError, McbResult};

/// MCB with 32-bit block numbers (synchronized)
#[derive(Default)]
pub struct Mcb {
    large: LargeMcb,
}

/// Narrow a value that is known to have come from 32-bit input
#[inline]
fn narrow(value: u64) -> Option<u32> {
    u32::try_from(value).ok()
}

impl Mcb {
    /// Create a new empty MCB
    pub const fn new(pool_type: PoolType) -> Self {
        Self {
            large: LargeMcb::new(pool_type),
        }
    }

    /// The underlying large MCB
    pub fn as_large(&self) -> &LargeMcb {
        &self.large
    }

    /// Add a mapping entry
    ///
    /// Fails with `InvalidParameter` if `vbn + sector_count` or
    /// `lbn + sector_count` does not fit in 32 bits.
    pub fn add_entry(&self, vbn: u32, lbn: u32, sector_count: u32) -> McbResult<()> {
        if vbn.checked_add(sector_count).is_none() || lbn.checked_add(sector_count).is_none() {
            return Err(McbError::InvalidParameter);
        }

        self.large.add_entry(vbn.into(), lbn.into(), sector_count.into())
    }

    /// Remove a range, leaving a hole
    pub fn remove_entry(&self, vbn: u32, sector_count: u32) -> McbResult<()> {
        self.large.remove_entry(vbn.into(), sector_count.into())
    }

    /// Lookup an MCB entry
    ///
    /// # Returns
    /// (lbn, sectors remaining in the run, run index), with LBN 0 for a
    /// hole, or None if the VBN is beyond the last run
    pub fn lookup(&self, vbn: u32) -> Option<(u32, u32, usize)> {
        let hit = self.large.lookup(vbn.into())?;
        let lbn = narrow(hit.lbn.unwrap_or(0))?;

        Some((lbn, narrow(hit.sector_count_from_lbn)?, hit.index))
    }

    /// Lookup the last entry in the MCB
    ///
    /// # Returns
    /// (last_vbn, last_lbn) or None if MCB is empty
    pub fn lookup_last(&self) -> Option<(u32, u32)> {
        let (vbn, lbn) = self.large.lookup_last()?;
        Some((narrow(vbn)?, narrow(lbn)?))
    }

    pub fn number_of_runs(&self) -> usize {
        self.large.number_of_runs()
    }

    /// Get a run by index
    ///
    /// # Returns
    /// (vbn, lbn, sector_count), with LBN 0 for a hole
    pub fn get_next_entry(&self, index: usize) -> Option<(u32, u32, u32)> {
        let run = self.large.get_next_entry(index)?;
        Some((
            narrow(run.vbn)?,
            narrow(run.lbn.unwrap_or(0))?,
            narrow(run.sector_count)?,
        ))
    }

    /// Truncate the MCB at a VBN
    pub fn truncate(&self, vbn: u32) {
        self.large.truncate(vbn.into());
    }
}
