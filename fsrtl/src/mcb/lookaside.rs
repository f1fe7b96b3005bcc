//! First-Mapping Lookaside List
//!
//! Most files never need more than a handful of runs, so paged MCBs take
//! their first pair array from a small cache of recycled buffers instead
//! of going to pool every time a file is opened.
//!
//! # NT Semantics
//!
//! - Only buffers of exactly [`INITIAL_MAXIMUM_PAIR_COUNT`] pairs are cached
//! - An MCB configured with any other `initial_pair_count` never touches
//!   the list; its first buffer and every later one come from pool
//! - Only paged-pool MCBs use the list
//! - Depth is fixed at [`FIRST_MAPPING_LOOKASIDE_DEPTH`]; frees beyond that
//!   go straight back to pool

use alloc::vec::Vec;

use super::mapping::allocate_pool_mapping;
use super::stats::MCB_STATS;
use super::McbPair;
use crate::config::INITIAL_MAXIMUM_PAIR_COUNT;
use crate::pool::pool_tags::TAG_MCB_FIRST_MAPPING;
use crate::status::McbResult;

/// Maximum buffers held by the lookaside
pub const FIRST_MAPPING_LOOKASIDE_DEPTH: usize = 4;

/// Cached first-mapping buffers (always empty, capacity >= initial count)
static FIRST_MAPPING_LOOKASIDE: spin::Mutex<Vec<Vec<McbPair>>> = spin::Mutex::new(Vec::new());

/// Allocate an initial-size pair array, preferring a cached buffer
pub(crate) fn allocate_first_mapping() -> McbResult<Vec<McbPair>> {
    let cached = FIRST_MAPPING_LOOKASIDE.lock().pop();

    match cached {
        Some(buffer) => {
            MCB_STATS.lookaside_hit();
            Ok(buffer)
        }
        None => {
            MCB_STATS.lookaside_miss();
            allocate_pool_mapping(INITIAL_MAXIMUM_PAIR_COUNT, TAG_MCB_FIRST_MAPPING)
        }
    }
}

/// Return an initial-size pair array to the lookaside
///
/// Returns false (and drops the buffer) if the list is already full.
pub(crate) fn free_first_mapping(mut buffer: Vec<McbPair>) -> bool {
    buffer.clear();

    if buffer.capacity() < INITIAL_MAXIMUM_PAIR_COUNT {
        return false;
    }

    let mut list = FIRST_MAPPING_LOOKASIDE.lock();
    if list.len() >= FIRST_MAPPING_LOOKASIDE_DEPTH || list.try_reserve(1).is_err() {
        return false;
    }

    list.push(buffer);
    true
}

/// Number of buffers currently cached
pub(crate) fn depth() -> usize {
    FIRST_MAPPING_LOOKASIDE.lock().len()
}
