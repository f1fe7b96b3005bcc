//! Mapping Control Block (MCB) Implementation
//!
//! MCBs track the mapping between Virtual Block Numbers (VBN) and
//! Logical Block Numbers (LBN) for file extents. This is essential
//! for file systems to manage file storage on disk.
//!
//! Key concepts:
//! - VBN: Virtual offset within a file (in blocks)
//! - LBN: Physical location on disk (in blocks)
//! - Run: A contiguous sequence of blocks with consecutive LBNs
//! - Hole: A run recorded as unmapped (sparse region), distinct from the
//!   VBNs beyond the last run which are simply unknown
//!
//! Example: A file with two runs and a hole:
//! - VBN 0-99 maps to LBN 500-599 (100 blocks)
//! - VBN 100-109 is a hole
//! - VBN 110-149 maps to LBN 1000-1039 (40 blocks)
//!
//! The map is stored as an array of pairs, one per run. Each pair records
//! the VBN just past its run and the run's starting LBN; the starting VBN
//! of a run is the `next_vbn` of the pair before it (0 for the first).
//!
//! ```text
//!                StartingVbn(i)                pairs[i].next_vbn
//!                       |                             |
//!                       V                             V
//!     Run-(i-1)---+ +---------Run-(i)-----------+ +---Run-(i+1)
//!                   A                         A
//!                   |                         |
//!             pairs[i].lbn               EndingLbn(i)
//! ```
//!
//! Pairs always satisfy:
//! 1. Runs are sorted, contiguous and non-overlapping from VBN 0.
//! 2. No two neighbouring runs are both holes, and no two neighbouring
//!    mapped runs are LBN-contiguous (they would have been merged).
//! 3. The pair count never exceeds the pair capacity.
//! 4. The last run is never a hole.

mod add;
mod base;
mod large;
mod lookaside;
mod mapping;
mod remove;
mod small;
mod stats;

pub use base::{BaseMcb, Runs};
pub use large::{
    LargeMcb,
    fsrtl_initialize_large_mcb, fsrtl_initialize_large_mcb_with_config,
    fsrtl_uninitialize_large_mcb,
    fsrtl_add_large_mcb_entry, fsrtl_remove_large_mcb_entry,
    fsrtl_lookup_large_mcb_entry, fsrtl_lookup_last_large_mcb_entry,
    fsrtl_lookup_last_large_mcb_entry_and_index,
    fsrtl_get_next_large_mcb_entry, fsrtl_truncate_large_mcb,
    fsrtl_reset_large_mcb, fsrtl_number_of_runs_in_large_mcb,
    fsrtl_split_large_mcb,
};
pub use small::Mcb;
pub use stats::{McbStats, fsrtl_get_mcb_stats};

/// Virtual block number (offset within the file, in sectors)
pub type Vbn = u64;

/// Logical block number (sector address on the volume)
pub type Lbn = u64;

/// A single mapping pair in the MCB
///
/// Each pair represents a run end: (VBN after run end, LBN of run start).
/// A `lbn` of `None` marks the run as a hole.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct McbPair {
    /// VBN immediately after this run ends
    pub next_vbn: Vbn,
    /// Starting LBN of this run (None for unallocated)
    pub lbn: Option<Lbn>,
}

impl McbPair {
    /// A mapped run ending just before `next_vbn`
    pub const fn mapped(next_vbn: Vbn, lbn: Lbn) -> Self {
        Self { next_vbn, lbn: Some(lbn) }
    }

    /// A hole ending just before `next_vbn`
    pub const fn hole(next_vbn: Vbn) -> Self {
        Self { next_vbn, lbn: None }
    }

    #[inline]
    pub const fn is_hole(&self) -> bool {
        self.lbn.is_none()
    }
}

/// One run as reported by enumeration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct McbRun {
    /// Starting VBN of the run
    pub vbn: Vbn,
    /// Starting LBN of the run (None for a hole)
    pub lbn: Option<Lbn>,
    /// Number of sectors in the run
    pub sector_count: u64,
}

impl McbRun {
    #[inline]
    pub const fn is_hole(&self) -> bool {
        self.lbn.is_none()
    }

    /// VBN just past the end of the run
    #[inline]
    pub const fn next_vbn(&self) -> Vbn {
        self.vbn + self.sector_count
    }
}

/// Result of translating one VBN
///
/// A snapshot: it stays valid only until the next call that mutates the
/// MCB it came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct McbLookup {
    /// LBN for the VBN (None if the VBN falls in a hole)
    pub lbn: Option<Lbn>,
    /// Sectors left in the run, counting the looked-up VBN
    pub sector_count_from_lbn: u64,
    /// Starting LBN of the run (None for a hole)
    pub starting_lbn: Option<Lbn>,
    /// Total sectors in the run
    pub sector_count_from_starting_lbn: u64,
    /// Index of the run
    pub index: usize,
}

impl McbLookup {
    #[inline]
    pub const fn is_hole(&self) -> bool {
        self.lbn.is_none()
    }
}
