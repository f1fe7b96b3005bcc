//! Mapping pair storage
//!
//! Owns the pair array of an MCB and every primitive that changes its
//! shape: growing the buffer, opening a gap to insert pairs, closing a gap
//! after merging pairs, and shrinking an oversized buffer.
//!
//! The buffer is not allocated until the first pair is inserted, so an
//! empty MCB costs nothing. Growth always happens before any pair is
//! rewritten, which is what lets the algorithms above fail cleanly.

use alloc::vec::Vec;
use core::iter;
use core::mem;

use super::lookaside;
use super::stats::MCB_STATS;
use super::{Lbn, McbPair, Vbn};
use crate::config::{McbConfig, INITIAL_MAXIMUM_PAIR_COUNT};
use crate::pool::{pool_tags::TAG_MCB_MAPPING, tag_chars, PoolTag};
use crate::status::{McbError, McbResult};

/// Allocate an empty pair array with room for `pair_count` pairs
pub(crate) fn allocate_pool_mapping(pair_count: usize, tag: PoolTag) -> McbResult<Vec<McbPair>> {
    let mut buffer = Vec::new();
    if buffer.try_reserve_exact(pair_count).is_err() {
        log::warn!(
            "mcb: pool allocation of {} pairs failed (tag {:?})",
            pair_count,
            tag_chars(tag)
        );
        MCB_STATS.allocation_failed();
        return Err(McbError::OutOfMemory);
    }

    MCB_STATS.mapping_allocated();
    Ok(buffer)
}

/// The pair array of one MCB
pub(crate) struct MappingArray {
    /// Pairs in use; `pairs.len()` is the pair count
    pairs: Vec<McbPair>,
    /// Logical capacity of the pair array
    max_pair_count: usize,
    /// Sizing and pool policy
    config: McbConfig,
}

impl MappingArray {
    pub(crate) const fn new(config: McbConfig) -> Self {
        Self {
            pairs: Vec::new(),
            max_pair_count: config.initial_pair_count,
            config,
        }
    }

    #[inline]
    pub(crate) fn config(&self) -> &McbConfig {
        &self.config
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    #[inline]
    pub(crate) fn max_pair_count(&self) -> usize {
        self.max_pair_count
    }

    #[inline]
    pub(crate) fn pairs(&self) -> &[McbPair] {
        &self.pairs
    }

    #[inline]
    pub(crate) fn pairs_mut(&mut self) -> &mut [McbPair] {
        &mut self.pairs
    }

    // ------------------------------------------------------------------
    // Run geometry
    // ------------------------------------------------------------------

    /// Starting VBN of the run at `index`
    #[inline]
    pub(crate) fn starting_vbn(&self, index: usize) -> Vbn {
        if index == 0 {
            0
        } else {
            self.pairs[index - 1].next_vbn
        }
    }

    /// Last VBN inside the run at `index`
    #[inline]
    pub(crate) fn ending_vbn(&self, index: usize) -> Vbn {
        self.pairs[index].next_vbn - 1
    }

    #[inline]
    pub(crate) fn starting_lbn(&self, index: usize) -> Option<Lbn> {
        self.pairs[index].lbn
    }

    /// LBN of the last sector of the run at `index`
    pub(crate) fn ending_lbn(&self, index: usize) -> Option<Lbn> {
        self.pairs[index]
            .lbn
            .map(|lbn| lbn + (self.pairs[index].next_vbn - self.starting_vbn(index)) - 1)
    }

    /// LBN of the last sector of the run before `index`
    pub(crate) fn previous_ending_lbn(&self, index: usize) -> Option<Lbn> {
        if index == 0 {
            None
        } else {
            self.ending_lbn(index - 1)
        }
    }

    /// Starting LBN of the run after `index`
    pub(crate) fn next_starting_lbn(&self, index: usize) -> Option<Lbn> {
        self.pairs.get(index + 1).and_then(|pair| pair.lbn)
    }

    /// Whether the run before `index` exists and is a hole
    #[inline]
    pub(crate) fn previous_is_hole(&self, index: usize) -> bool {
        index != 0 && self.pairs[index - 1].is_hole()
    }

    /// Whether the run after `index` exists and is a hole
    #[inline]
    pub(crate) fn next_is_hole(&self, index: usize) -> bool {
        self.pairs.get(index + 1).is_some_and(McbPair::is_hole)
    }

    #[inline]
    pub(crate) fn sectors_within_run(&self, index: usize) -> u64 {
        self.pairs[index].next_vbn - self.starting_vbn(index)
    }

    // ------------------------------------------------------------------
    // Shape primitives
    // ------------------------------------------------------------------

    /// Make sure `extra` more pairs fit, reallocating if needed
    ///
    /// On failure nothing about the array changes.
    pub(crate) fn grow_for(&mut self, extra: usize) -> McbResult<()> {
        let needed = self.pairs.len().checked_add(extra).ok_or(McbError::OutOfMemory)?;

        if needed <= self.max_pair_count {
            if self.pairs.capacity() >= needed {
                return Ok(());
            }

            // The first insert into a fresh MCB lands here
            let mut buffer = self.allocate_mapping(self.max_pair_count)?;
            buffer.extend_from_slice(&self.pairs);
            self.pairs = buffer;
            return Ok(());
        }

        let new_max = self.config.grown_pair_count(self.max_pair_count, needed);
        let mut buffer = self.allocate_mapping(new_max)?;
        buffer.extend_from_slice(&self.pairs);

        log::debug!(
            "mcb: growing pair array {} -> {} pairs ({} in use)",
            self.max_pair_count,
            new_max,
            self.pairs.len()
        );

        let old = mem::replace(&mut self.pairs, buffer);
        let old_max = mem::replace(&mut self.max_pair_count, new_max);
        self.release_mapping(old, old_max);
        MCB_STATS.grew();

        Ok(())
    }

    /// Open `count` slots at `at`, shifting `pairs[at..]` right
    ///
    /// The shifted pairs keep their values, so the pair that ends up at
    /// `at + count` still carries its own `next_vbn`. The opened slots
    /// hold copies of the pair that was at `at` and must be rewritten by
    /// the caller.
    pub(crate) fn open_gap(&mut self, at: usize, count: usize) -> McbResult<()> {
        self.grow_for(count)?;

        let fill = self.pairs.get(at).copied().unwrap_or(McbPair::hole(0));
        self.pairs.splice(at..at, iter::repeat(fill).take(count));
        Ok(())
    }

    /// Remove `count` pairs starting at `at`, shifting the rest left
    pub(crate) fn close_gap(&mut self, at: usize, count: usize) {
        self.pairs.drain(at..at + count);
    }

    /// Drop every pair at or after `len`
    pub(crate) fn truncate_pairs(&mut self, len: usize) {
        self.pairs.truncate(len);
    }

    /// Shrink an oversized buffer
    ///
    /// If the pair count has dropped below a quarter of the capacity, move
    /// the pairs into a buffer twice the pair count (never below the
    /// initial size). Failing to get the smaller buffer is harmless; the
    /// MCB keeps the one it has.
    pub(crate) fn maybe_shrink(&mut self) {
        let initial = self.config.initial_pair_count;

        if self.pairs.len() >= self.max_pair_count / 4 || self.max_pair_count <= initial {
            return;
        }

        let new_max = (self.pairs.len() * 2).max(initial);

        let mut buffer = match self.allocate_mapping(new_max) {
            Ok(buffer) => buffer,
            Err(_) => {
                log::debug!("mcb: shrink to {} pairs skipped", new_max);
                MCB_STATS.shrink_failed();
                return;
            }
        };
        buffer.extend_from_slice(&self.pairs);

        log::debug!(
            "mcb: shrinking pair array {} -> {} pairs ({} in use)",
            self.max_pair_count,
            new_max,
            self.pairs.len()
        );

        let old = mem::replace(&mut self.pairs, buffer);
        let old_max = mem::replace(&mut self.max_pair_count, new_max);
        self.release_mapping(old, old_max);
        MCB_STATS.shrank();
    }

    // ------------------------------------------------------------------
    // Buffer management
    // ------------------------------------------------------------------

    /// Whether a buffer of `pair_count` pairs belongs to the lookaside
    ///
    /// Keyed on the stock size, not `config.initial_pair_count`.
    fn uses_lookaside(&self, pair_count: usize) -> bool {
        self.config.pool_type.is_paged() && pair_count == INITIAL_MAXIMUM_PAIR_COUNT
    }

    fn allocate_mapping(&self, pair_count: usize) -> McbResult<Vec<McbPair>> {
        if !self.config.allows(pair_count) {
            log::warn!(
                "mcb: {} pairs exceeds the quota of {:?}",
                pair_count,
                self.config.pair_quota
            );
            MCB_STATS.allocation_failed();
            return Err(McbError::OutOfMemory);
        }

        if self.uses_lookaside(pair_count) {
            lookaside::allocate_first_mapping()
        } else {
            allocate_pool_mapping(pair_count, TAG_MCB_MAPPING)
        }
    }

    fn release_mapping(&self, buffer: Vec<McbPair>, pair_count: usize) {
        if buffer.capacity() == 0 {
            return;
        }

        if self.uses_lookaside(pair_count) && lookaside::free_first_mapping(buffer) {
            return;
        }

        MCB_STATS.mapping_freed();
    }

    /// Check the pair invariants
    pub(crate) fn is_well_formed(&self) -> bool {
        if self.pairs.len() > self.max_pair_count {
            return false;
        }

        let mut start = 0;
        for (index, pair) in self.pairs.iter().enumerate() {
            if pair.next_vbn <= start {
                return false;
            }
            if index > 0 {
                let previous = &self.pairs[index - 1];
                match (previous.lbn, pair.lbn) {
                    (None, None) => return false,
                    (Some(_), Some(lbn)) if self.ending_lbn(index - 1).map(|end| end + 1) == Some(lbn) => {
                        return false;
                    }
                    _ => {}
                }
            }
            start = pair.next_vbn;
        }

        self.pairs.last().map_or(true, |pair| !pair.is_hole())
    }
}

impl Drop for MappingArray {
    fn drop(&mut self) {
        let pairs = mem::take(&mut self.pairs);
        self.release_mapping(pairs, self.max_pair_count);
    }
}
