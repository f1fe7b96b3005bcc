//! File System Runtime Library (FSRTL)
//!
//! FSRTL provides common utilities for file system drivers. This crate
//! carries the piece every block-based file system leans on:
//!
//! - **MCB (Mapping Control Block)**: Track VBN↔LBN extent mappings as a
//!   sorted, run-length encoded array of runs, with holes for sparse
//!   regions.
//!
//! Two layers are exposed:
//!
//! - [`BaseMcb`]: the unsynchronized core, for callers that already
//!   serialize access to the file at a coarser grain.
//! - [`LargeMcb`]: the same map behind a single mutex, for independent
//!   callers.
//!
//! [`Mcb`] is the 32-bit compatibility surface built on top of `LargeMcb`.
//!
//! This implementation is NT 5.2 (Windows Server 2003) compatible.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod mcb;
pub mod pool;
pub mod status;

// Re-export key types
pub use config::{
    McbConfig,
    INITIAL_MAXIMUM_PAIR_COUNT, MAXIMUM_PAIR_COUNT_DOUBLING,
};

pub use mcb::{
    // Types
    BaseMcb, LargeMcb, Mcb, McbLookup, McbPair, McbRun, Lbn, Vbn,
    // Large MCB functions
    fsrtl_initialize_large_mcb, fsrtl_initialize_large_mcb_with_config,
    fsrtl_uninitialize_large_mcb,
    fsrtl_add_large_mcb_entry, fsrtl_remove_large_mcb_entry,
    fsrtl_lookup_large_mcb_entry, fsrtl_lookup_last_large_mcb_entry,
    fsrtl_lookup_last_large_mcb_entry_and_index,
    fsrtl_get_next_large_mcb_entry, fsrtl_truncate_large_mcb,
    fsrtl_reset_large_mcb, fsrtl_number_of_runs_in_large_mcb,
    fsrtl_split_large_mcb,
    // Statistics
    McbStats, fsrtl_get_mcb_stats,
};

pub use pool::PoolType;

pub use status::{McbError, McbResult, NtStatus};
