//! MCB insert
//!
//! Adding a run either extends the map past its last run or fills (part
//! of) a hole. Whenever the new run touches an LBN-contiguous neighbour
//! the two are merged, so the pair array never holds two runs that could
//! be one.

use super::base::BaseMcb;
use super::{Lbn, McbPair, Vbn};
use crate::status::{McbError, McbResult};

impl BaseMcb {
    /// Add a mapping entry to the MCB
    ///
    /// Maps `sector_count` sectors starting at `vbn` to the sectors starting
    /// at `lbn`.
    ///
    /// # Returns
    /// - `Ok(())` if the run was added, or was already mapped the same way.
    ///   A request that overlaps a consistent run at its front is trimmed
    ///   to the part that is new.
    /// - `Err(ConflictingMapping)` if any of the sectors are already mapped
    ///   to different LBNs
    /// - `Err(OutOfMemory)` if the pair array could not grow
    /// - `Err(InvalidParameter)` if the range overflows
    ///
    /// On error the map is unchanged.
    pub fn add_entry(&mut self, vbn: Vbn, lbn: Lbn, sector_count: u64) -> McbResult<()> {
        if sector_count == 0 {
            return Ok(());
        }

        if vbn.checked_add(sector_count).is_none() || lbn.checked_add(sector_count).is_none() {
            return Err(McbError::InvalidParameter);
        }

        let (mut vbn, mut lbn, mut count) = (vbn, lbn, sector_count);
        let last_vbn = vbn + count - 1;

        // Cut away whatever part of the request is already mapped
        if let Ok(index) = self.find_index(vbn) {
            let m = &self.mapping;
            let run_start = m.starting_vbn(index);

            match m.starting_lbn(index) {
                Some(run_lbn) => {
                    if run_lbn + (vbn - run_start) != lbn {
                        log::trace!("mcb add: vbn {} already mapped elsewhere", vbn);
                        return Err(McbError::ConflictingMapping);
                    }

                    if last_vbn <= m.ending_vbn(index) {
                        return Ok(());
                    }

                    let next_vbn = m.pairs()[index].next_vbn;
                    lbn += next_vbn - vbn;
                    vbn = next_vbn;
                    count = last_vbn - vbn + 1;
                }
                None => {
                    if let Ok(end_index) = self.find_index(last_vbn) {
                        if end_index == index + 1 {
                            let next_start = m.starting_vbn(end_index);
                            if m.starting_lbn(end_index) != Some(lbn + (next_start - vbn)) {
                                log::trace!("mcb add: vbn {} already mapped elsewhere", next_start);
                                return Err(McbError::ConflictingMapping);
                            }
                            count = next_start - vbn;
                        }
                    }
                }
            }
        }

        match self.find_index(vbn) {
            Err(index) => self.append_run(index, vbn, lbn, count)?,
            Ok(index) => self.fill_hole(index, vbn, lbn, count)?,
        }

        self.debug_check();
        Ok(())
    }

    /// Add a run at or past the end of the current coverage
    fn append_run(&mut self, index: usize, vbn: Vbn, lbn: Lbn, count: u64) -> McbResult<()> {
        let m = &mut self.mapping;
        let coverage_end = m.starting_vbn(index);

        if coverage_end == vbn && index != 0 && m.ending_lbn(index - 1).map(|end| end + 1) == Some(lbn) {
            // --LastRun--||--NewRun--  ==>  --LastRun-----------
            log::trace!("mcb add: extend last run {}", index - 1);
            m.pairs_mut()[index - 1].next_vbn += count;
        } else if coverage_end == vbn {
            // --LastRun--||--NewRun--
            log::trace!("mcb add: append run at {}", index);
            m.open_gap(index, 1)?;
            m.pairs_mut()[index] = McbPair::mapped(vbn + count, lbn);
        } else {
            // --LastRun--||--NewHole--||--NewRun--
            log::trace!("mcb add: append hole and run at {}", index);
            m.open_gap(index, 2)?;
            let pairs = m.pairs_mut();
            pairs[index] = McbPair::hole(vbn);
            pairs[index + 1] = McbPair::mapped(vbn + count, lbn);
        }

        Ok(())
    }

    /// Add a run that lies inside the hole at `index`
    fn fill_hole(&mut self, index: usize, vbn: Vbn, lbn: Lbn, count: u64) -> McbResult<()> {
        let m = &mut self.mapping;
        let last_vbn = vbn + count - 1;

        if m.starting_lbn(index).is_some() || last_vbn > m.ending_vbn(index) {
            log::trace!("mcb add: vbns {}..={} collide with run {}", vbn, last_vbn, index);
            return Err(McbError::ConflictingMapping);
        }

        let gap_in_front = m.starting_vbn(index) < vbn;
        let gap_behind = last_vbn < m.ending_vbn(index);
        let joins_previous = m.previous_ending_lbn(index).map(|end| end + 1) == Some(lbn);
        let joins_next = m.next_starting_lbn(index) == Some(lbn + count);

        match (gap_in_front, gap_behind) {
            (true, true) => {
                // --Hole------------------  ==>  --Hole--||--NewRun--||--Hole--
                log::trace!("mcb add: split hole {}", index);
                m.open_gap(index, 2)?;
                let pairs = m.pairs_mut();
                pairs[index] = McbPair::hole(vbn);
                pairs[index + 1] = McbPair::mapped(vbn + count, lbn);
            }
            (false, true) => {
                if joins_previous {
                    // --PreviousRun--||--Hole--  ==>  --PreviousRun-----||--Hole--
                    log::trace!("mcb add: extend run {} into hole", index - 1);
                    m.pairs_mut()[index - 1].next_vbn += count;
                } else {
                    // --Hole--------  ==>  --NewRun--||--Hole--
                    log::trace!("mcb add: new run at front of hole {}", index);
                    m.open_gap(index, 1)?;
                    m.pairs_mut()[index] = McbPair::mapped(vbn + count, lbn);
                }
            }
            (true, false) => {
                if joins_next {
                    // --Hole--||--NextRun--  ==>  --Hole--||-----NextRun--
                    log::trace!("mcb add: extend run {} back into hole", index + 1);
                    let pairs = m.pairs_mut();
                    pairs[index].next_vbn = vbn;
                    pairs[index + 1].lbn = Some(lbn);
                } else {
                    // --Hole--------  ==>  --Hole--||--NewRun--
                    log::trace!("mcb add: new run at back of hole {}", index);
                    m.open_gap(index, 1)?;
                    let pairs = m.pairs_mut();
                    pairs[index] = McbPair::hole(vbn);
                    pairs[index + 1].lbn = Some(lbn);
                }
            }
            (false, false) => {
                let pairs = m.pairs_mut();
                match (joins_previous, joins_next) {
                    (true, true) => {
                        // --PreviousRun--||--NewRun--||--NextRun--  ==>  one run
                        log::trace!("mcb add: hole {} joins both neighbours", index);
                        pairs[index - 1].next_vbn = pairs[index + 1].next_vbn;
                        m.close_gap(index, 2);
                    }
                    (false, true) => {
                        log::trace!("mcb add: hole {} joins next run", index);
                        pairs[index + 1].lbn = Some(lbn);
                        m.close_gap(index, 1);
                    }
                    (true, false) => {
                        log::trace!("mcb add: hole {} joins previous run", index);
                        pairs[index - 1].next_vbn = pairs[index].next_vbn;
                        m.close_gap(index, 1);
                    }
                    (false, false) => {
                        log::trace!("mcb add: hole {} filled in place", index);
                        pairs[index].lbn = Some(lbn);
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::McbConfig;
    use crate::mcb::McbRun;
    use alloc::vec::Vec;

    fn run_list(mcb: &BaseMcb) -> Vec<(Vbn, Option<Lbn>, u64)> {
        mcb.runs().map(|run: McbRun| (run.vbn, run.lbn, run.sector_count)).collect()
    }

    #[test]
    fn test_add_round_trip() {
        let mut mcb = BaseMcb::default();
        mcb.add_entry(0, 500, 100).unwrap();
        mcb.add_entry(110, 1000, 40).unwrap();

        for k in 0..100 {
            assert_eq!(mcb.lookup(k).unwrap().lbn, Some(500 + k));
        }
        for k in 0..40 {
            assert_eq!(mcb.lookup(110 + k).unwrap().lbn, Some(1000 + k));
        }
        assert!(mcb.lookup(105).unwrap().is_hole());
        assert_eq!(mcb.number_of_runs(), 3);
    }

    #[test]
    fn test_add_coalesces_with_last_run() {
        let mut mcb = BaseMcb::default();
        mcb.add_entry(0, 100, 10).unwrap();
        mcb.add_entry(10, 110, 5).unwrap();

        assert_eq!(mcb.number_of_runs(), 1);
        assert_eq!(run_list(&mcb), [(0, Some(100), 15)]);
    }

    #[test]
    fn test_add_leaves_hole_before_run() {
        let mut mcb = BaseMcb::default();
        mcb.add_entry(5, 200, 3).unwrap();

        let hole = mcb.lookup(2).unwrap();
        assert!(hole.is_hole());
        assert_eq!(mcb.lookup(10), None);
        assert_eq!(run_list(&mcb), [(0, None, 5), (5, Some(200), 3)]);
    }

    #[test]
    fn test_add_zero_count_is_noop() {
        let mut mcb = BaseMcb::default();
        mcb.add_entry(7, 70, 0).unwrap();
        assert_eq!(mcb.number_of_runs(), 0);
    }

    #[test]
    fn test_add_overflow() {
        let mut mcb = BaseMcb::default();
        assert_eq!(mcb.add_entry(u64::MAX, 1, 1), Err(McbError::InvalidParameter));
        assert_eq!(mcb.add_entry(1, u64::MAX - 1, 2), Err(McbError::InvalidParameter));
        assert_eq!(mcb.number_of_runs(), 0);
    }

    #[test]
    fn test_add_consistent_overlap_is_noop() {
        let mut mcb = BaseMcb::default();
        mcb.add_entry(0, 100, 10).unwrap();
        mcb.add_entry(2, 102, 5).unwrap();
        assert_eq!(run_list(&mcb), [(0, Some(100), 10)]);
    }

    #[test]
    fn test_add_trims_consistent_prefix() {
        let mut mcb = BaseMcb::default();
        mcb.add_entry(0, 100, 10).unwrap();
        mcb.add_entry(5, 105, 10).unwrap();
        assert_eq!(run_list(&mcb), [(0, Some(100), 15)]);
    }

    #[test]
    fn test_add_conflict_leaves_map() {
        let mut mcb = BaseMcb::default();
        mcb.add_entry(0, 100, 10).unwrap();
        assert_eq!(mcb.add_entry(4, 900, 2), Err(McbError::ConflictingMapping));

        // Past the end of the run the trimmed remainder is new, but the
        // overlapping part must still agree
        assert_eq!(mcb.add_entry(8, 300, 10), Err(McbError::ConflictingMapping));
        assert_eq!(run_list(&mcb), [(0, Some(100), 10)]);
    }

    #[test]
    fn test_add_from_hole_into_run() {
        let mut mcb = BaseMcb::default();
        mcb.add_entry(10, 500, 10).unwrap();

        // Agrees with the run it reaches: only the hole part is new
        mcb.add_entry(6, 496, 8).unwrap();
        assert_eq!(run_list(&mcb), [(0, None, 6), (6, Some(496), 14)]);

        let mut mcb = BaseMcb::default();
        mcb.add_entry(10, 500, 10).unwrap();
        assert_eq!(mcb.add_entry(6, 100, 8), Err(McbError::ConflictingMapping));
        assert_eq!(run_list(&mcb), [(0, None, 10), (10, Some(500), 10)]);
    }

    #[test]
    fn test_add_across_several_runs_conflicts() {
        let mut mcb = BaseMcb::default();
        mcb.add_entry(0, 100, 5).unwrap();
        mcb.add_entry(10, 110, 5).unwrap();
        mcb.add_entry(20, 120, 5).unwrap();

        assert_eq!(mcb.add_entry(6, 106, 16), Err(McbError::ConflictingMapping));
        assert_eq!(mcb.number_of_runs(), 5);
    }

    #[test]
    fn test_fill_middle_of_hole() {
        let mut mcb = BaseMcb::default();
        mcb.add_entry(0, 100, 5).unwrap();
        mcb.add_entry(20, 900, 5).unwrap();
        mcb.add_entry(10, 400, 3).unwrap();

        assert_eq!(
            run_list(&mcb),
            [(0, Some(100), 5), (5, None, 5), (10, Some(400), 3), (13, None, 7), (20, Some(900), 5)]
        );
    }

    #[test]
    fn test_fill_front_of_hole() {
        let mut mcb = BaseMcb::default();
        mcb.add_entry(0, 100, 5).unwrap();
        mcb.add_entry(20, 900, 5).unwrap();

        // Contiguous with the run before the hole
        mcb.add_entry(5, 105, 3).unwrap();
        assert_eq!(run_list(&mcb), [(0, Some(100), 8), (8, None, 12), (20, Some(900), 5)]);

        // Not contiguous
        mcb.add_entry(8, 300, 2).unwrap();
        assert_eq!(
            run_list(&mcb),
            [(0, Some(100), 8), (8, Some(300), 2), (10, None, 10), (20, Some(900), 5)]
        );
    }

    #[test]
    fn test_fill_back_of_hole() {
        let mut mcb = BaseMcb::default();
        mcb.add_entry(0, 100, 5).unwrap();
        mcb.add_entry(20, 900, 5).unwrap();

        // Contiguous with the run after the hole
        mcb.add_entry(17, 897, 3).unwrap();
        assert_eq!(run_list(&mcb), [(0, Some(100), 5), (5, None, 12), (17, Some(897), 8)]);

        // Not contiguous
        mcb.add_entry(15, 50, 2).unwrap();
        assert_eq!(
            run_list(&mcb),
            [(0, Some(100), 5), (5, None, 10), (15, Some(50), 2), (17, Some(897), 8)]
        );
    }

    #[test]
    fn test_fill_whole_hole() {
        // Joins both neighbours
        let mut mcb = BaseMcb::default();
        mcb.add_entry(0, 100, 5).unwrap();
        mcb.add_entry(10, 110, 5).unwrap();
        mcb.add_entry(5, 105, 5).unwrap();
        assert_eq!(run_list(&mcb), [(0, Some(100), 15)]);

        // Joins only the next run
        let mut mcb = BaseMcb::default();
        mcb.add_entry(0, 100, 5).unwrap();
        mcb.add_entry(10, 510, 5).unwrap();
        mcb.add_entry(5, 505, 5).unwrap();
        assert_eq!(run_list(&mcb), [(0, Some(100), 5), (5, Some(505), 10)]);

        // Joins only the previous run
        let mut mcb = BaseMcb::default();
        mcb.add_entry(0, 100, 5).unwrap();
        mcb.add_entry(10, 510, 5).unwrap();
        mcb.add_entry(5, 105, 5).unwrap();
        assert_eq!(run_list(&mcb), [(0, Some(100), 10), (10, Some(510), 5)]);

        // Joins neither
        let mut mcb = BaseMcb::default();
        mcb.add_entry(0, 100, 5).unwrap();
        mcb.add_entry(10, 510, 5).unwrap();
        mcb.add_entry(5, 300, 5).unwrap();
        assert_eq!(
            run_list(&mcb),
            [(0, Some(100), 5), (5, Some(300), 5), (10, Some(510), 5)]
        );
    }

    #[test]
    fn test_fill_leading_hole() {
        let mut mcb = BaseMcb::default();
        mcb.add_entry(5, 200, 3).unwrap();
        mcb.add_entry(0, 195, 5).unwrap();
        assert_eq!(run_list(&mcb), [(0, Some(195), 8)]);
    }

    #[test]
    fn test_add_out_of_memory_leaves_map() {
        let config = McbConfig::default().with_initial_pair_count(2).with_pair_quota(2);
        let mut mcb = BaseMcb::with_config(config);
        mcb.add_entry(0, 100, 5).unwrap();
        mcb.add_entry(5, 300, 5).unwrap();

        assert_eq!(mcb.add_entry(20, 700, 5), Err(McbError::OutOfMemory));
        assert_eq!(run_list(&mcb), [(0, Some(100), 5), (5, Some(300), 5)]);

        // Coalescing needs no new pair
        mcb.add_entry(10, 305, 5).unwrap();
        assert_eq!(run_list(&mcb), [(0, Some(100), 5), (5, Some(300), 10)]);
    }

    #[test]
    fn test_add_grows_pair_array() {
        let mut mcb = BaseMcb::default();
        for i in 0..100u64 {
            mcb.add_entry(i * 3, 7_000 + i * 10, 2).unwrap();
        }

        assert_eq!(mcb.number_of_runs(), 199);
        assert!(mcb.max_pair_count() >= 199);
        assert_eq!(mcb.lookup(298).unwrap().lbn, Some(7_990 + 1));
    }
}
