//! Base MCB (unsynchronized core)
//!
//! `BaseMcb` holds the mapping pairs and implements every MCB operation
//! without any locking. Callers that already serialize access to the file
//! (for example under the file's main resource) use it directly; everyone
//! else goes through [`LargeMcb`](super::LargeMcb).
//!
//! Insert and remove live in `add.rs` and `remove.rs`; this file carries
//! lookup, enumeration, truncation and split.

use core::fmt;
use core::iter::FusedIterator;

use super::mapping::MappingArray;
use super::{Lbn, McbLookup, McbPair, McbRun, Vbn};
use crate::config::McbConfig;
use crate::pool::PoolType;
use crate::status::{McbError, McbResult};

/// Base MCB structure (unsynchronized)
///
/// This is the core mapping storage without synchronization.
/// Use LargeMcb for thread-safe operations.
pub struct BaseMcb {
    pub(super) mapping: MappingArray,
}

impl BaseMcb {
    /// Create a new empty base MCB
    ///
    /// No memory is allocated until the first run is added.
    pub const fn new(pool_type: PoolType) -> Self {
        Self::with_config(McbConfig::new(pool_type))
    }

    /// Create a new empty base MCB with explicit sizing
    pub const fn with_config(config: McbConfig) -> Self {
        Self {
            mapping: MappingArray::new(config),
        }
    }

    /// Pool the pair array is allocated from
    pub fn pool_type(&self) -> PoolType {
        self.mapping.config().pool_type
    }

    /// Current capacity of the pair array
    pub fn max_pair_count(&self) -> usize {
        self.mapping.max_pair_count()
    }

    /// Raw view of the mapping pairs
    pub fn pairs(&self) -> &[McbPair] {
        self.mapping.pairs()
    }

    /// Find the run containing a VBN
    ///
    /// Binary search over the runs. Returns `Ok(index)` if the VBN lies
    /// inside the mapped range (holes included) and `Err(pair_count)` if it
    /// is beyond the last run.
    pub(crate) fn find_index(&self, vbn: Vbn) -> Result<usize, usize> {
        let pairs = self.mapping.pairs();
        let index = pairs.partition_point(|pair| pair.next_vbn <= vbn);

        if index < pairs.len() {
            Ok(index)
        } else {
            Err(pairs.len())
        }
    }

    /// Lookup an MCB entry
    ///
    /// Returns None if the VBN is beyond the last run. A VBN inside a hole
    /// is found, with `lbn` set to None.
    pub fn lookup(&self, vbn: Vbn) -> Option<McbLookup> {
        let index = self.find_index(vbn).ok()?;
        let m = &self.mapping;

        let run_start = m.starting_vbn(index);
        let starting_lbn = m.starting_lbn(index);

        Some(McbLookup {
            lbn: starting_lbn.map(|lbn| lbn + (vbn - run_start)),
            sector_count_from_lbn: m.ending_vbn(index) - vbn + 1,
            starting_lbn,
            sector_count_from_starting_lbn: m.sectors_within_run(index),
            index,
        })
    }

    /// Lookup the last entry in the MCB
    ///
    /// # Returns
    /// (last_vbn, last_lbn) or None if MCB is empty
    pub fn lookup_last(&self) -> Option<(Vbn, Lbn)> {
        self.lookup_last_with_index().map(|(vbn, lbn, _)| (vbn, lbn))
    }

    /// Lookup the last entry in the MCB along with the index of its run
    pub fn lookup_last_with_index(&self) -> Option<(Vbn, Lbn, usize)> {
        let index = self.mapping.len().checked_sub(1)?;
        let lbn = self.mapping.ending_lbn(index);
        debug_assert!(lbn.is_some(), "mcb ends in a hole");

        Some((self.mapping.ending_vbn(index), lbn?, index))
    }

    /// Get the number of runs in the MCB (holes count as runs)
    pub fn number_of_runs(&self) -> usize {
        self.mapping.len()
    }

    /// Get a run by index
    ///
    /// Holes are returned as runs too. Returns None once `index` reaches
    /// the number of runs, so walking indices from zero enumerates the map.
    pub fn get_next_entry(&self, index: usize) -> Option<McbRun> {
        let pair = self.mapping.pairs().get(index)?;
        let vbn = self.mapping.starting_vbn(index);

        Some(McbRun {
            vbn,
            lbn: pair.lbn,
            sector_count: pair.next_vbn - vbn,
        })
    }

    /// Iterate over all runs, holes included
    pub fn runs(&self) -> Runs<'_> {
        Runs {
            pairs: self.mapping.pairs(),
            vbn: 0,
        }
    }

    /// Truncate the MCB at a VBN
    ///
    /// Removes all mappings at or after the specified VBN. A hole left at
    /// the new end is dropped as well. If the pair array is now mostly
    /// empty it is shrunk, when memory allows.
    pub fn truncate(&mut self, vbn: Vbn) {
        if vbn == 0 {
            self.mapping.truncate_pairs(0);
        } else if let Ok(index) = self.find_index(vbn - 1) {
            if self.mapping.starting_lbn(index).is_none() {
                self.mapping.truncate_pairs(index);
            } else {
                self.mapping.truncate_pairs(index + 1);
                let pair = &mut self.mapping.pairs_mut()[index];
                if pair.next_vbn > vbn {
                    pair.next_vbn = vbn;
                }
            }
        }

        self.mapping.maybe_shrink();
        self.debug_check();
    }

    /// Remove every run without shrinking the pair array
    pub fn reset(&mut self) {
        self.mapping.truncate_pairs(0);
    }

    /// Split the MCB at a VBN, inserting a hole
    ///
    /// Every run at or after `vbn` moves up by `amount` VBNs and keeps its
    /// LBNs. Pictorially:
    ///
    /// ```text
    ///     VBN :       vbn-1 vbn                N
    ///         +-----------------+------------------+
    ///     LBN :             X    Y
    ///
    ///     VBN :       vbn-1              vbn+amount    N+amount
    ///         +-----------------+.........+------------------+
    ///     LBN :             X      hole    Y
    /// ```
    ///
    /// Fails with `OutOfRange` if `vbn` is beyond the last run.
    pub fn split(&mut self, vbn: Vbn, amount: u64) -> McbResult<()> {
        let mut index = self.find_index(vbn).map_err(|_| McbError::OutOfRange)?;

        if amount == 0 {
            return Ok(());
        }

        let last_next_vbn = self.mapping.pairs()[self.mapping.len() - 1].next_vbn;
        if last_next_vbn.checked_add(amount).is_none() {
            return Err(McbError::InvalidParameter);
        }

        let run_start = self.mapping.starting_vbn(index);

        if self.mapping.starting_lbn(index).is_none() {
            // --PreviousRun--||--IndexHole--||--FollowingRun--
            // The hole itself just gets longer
            log::trace!("mcb split: inside hole at index {}", index);
        } else if run_start == vbn && self.mapping.previous_is_hole(index) {
            // --Hole--||--IndexRun--  ==>  --Hole------||--IndexRun--
            log::trace!("mcb split: between hole and run at index {}", index);
            index -= 1;
        } else if run_start == vbn {
            // --PreviousRun--||--IndexRun--  ==>  --PreviousRun--||--NewHole--||--IndexRun--
            log::trace!("mcb split: new hole before run at index {}", index);
            self.mapping.open_gap(index, 1)?;
            self.mapping.pairs_mut()[index] = McbPair::hole(vbn + amount);
            index += 1;
        } else {
            // --IndexRun--  ==>  --SplitRun--||--NewHole--||--SplitRun--
            log::trace!("mcb split: inside run at index {}", index);
            self.mapping.open_gap(index, 2)?;

            let pairs = self.mapping.pairs_mut();
            let run_lbn = pairs[index + 2].lbn;
            pairs[index] = McbPair { next_vbn: vbn, lbn: run_lbn };
            pairs[index + 1] = McbPair::hole(vbn + amount);
            pairs[index + 2].lbn = run_lbn.map(|lbn| lbn + (vbn - run_start));
            index += 2;
        }

        for pair in &mut self.mapping.pairs_mut()[index..] {
            pair.next_vbn += amount;
        }

        self.debug_check();
        Ok(())
    }

    #[inline]
    pub(super) fn debug_check(&self) {
        debug_assert!(self.mapping.is_well_formed(), "mcb pairs corrupted: {:?}", self);
    }
}

impl Default for BaseMcb {
    fn default() -> Self {
        Self::new(PoolType::default())
    }
}

impl fmt::Debug for BaseMcb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseMcb")
            .field("pool_type", &self.pool_type())
            .field("max_pair_count", &self.max_pair_count())
            .field("runs", &self.runs())
            .finish()
    }
}

/// Iterator over the runs of a [`BaseMcb`]
#[derive(Clone)]
pub struct Runs<'a> {
    pairs: &'a [McbPair],
    vbn: Vbn,
}

impl Iterator for Runs<'_> {
    type Item = McbRun;

    fn next(&mut self) -> Option<McbRun> {
        let (pair, rest) = self.pairs.split_first()?;
        let run = McbRun {
            vbn: self.vbn,
            lbn: pair.lbn,
            sector_count: pair.next_vbn - self.vbn,
        };

        self.pairs = rest;
        self.vbn = pair.next_vbn;
        Some(run)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.pairs.len(), Some(self.pairs.len()))
    }
}

impl ExactSizeIterator for Runs<'_> {}

impl FusedIterator for Runs<'_> {}

impl fmt::Debug for Runs<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}
