//! MCB remove
//!
//! Removing a range turns it into a hole. The range is consumed one run at
//! a time: whole runs become holes and merge with neighbouring holes,
//! while a run that is only partly covered is trimmed at its front or back
//! or, when the range sits strictly inside it, split around a new hole.

use super::base::BaseMcb;
use super::{McbPair, Vbn};
use crate::status::McbResult;

impl BaseMcb {
    /// Remove a range from the MCB
    ///
    /// Sectors that are already holes, or that lie beyond the last run,
    /// are skipped. A removal that reaches the end of the map shortens it.
    ///
    /// Removing whole runs, or trimming a run next to a hole or at the end
    /// of the map, only shrinks the pair array and cannot fail. Cutting a
    /// new hole into a mapped run (front trim after a mapped run, back trim
    /// before one, or a split in the middle) needs one or two extra pairs.
    /// They are reserved before anything changes, so `OutOfMemory` is the
    /// only possible error, only for those cases, and it leaves the map
    /// untouched.
    pub fn remove_entry(&mut self, vbn: Vbn, sector_count: u64) -> McbResult<()> {
        if sector_count == 0 || self.mapping.is_empty() {
            return Ok(());
        }

        let last_next_vbn = self.mapping.pairs()[self.mapping.len() - 1].next_vbn;

        if vbn == 0 && sector_count >= last_next_vbn {
            log::trace!("mcb remove: whole map");
            self.mapping.truncate_pairs(0);
            return Ok(());
        }

        if vbn >= last_next_vbn {
            return Ok(());
        }

        let needed = self.pairs_needed_to_remove(vbn, sector_count);
        if needed > 0 {
            self.mapping.grow_for(needed)?;
        }

        let mut vbn = vbn;
        let mut remaining = sector_count;

        while remaining > 0 {
            let index = match self.find_index(vbn) {
                Ok(index) => index,
                Err(_) => break,
            };

            let m = &mut self.mapping;
            let run_start = m.starting_vbn(index);
            let run_end = m.ending_vbn(index);
            let last_vbn = vbn.saturating_add(remaining - 1);
            let is_hole = m.starting_lbn(index).is_none();

            if run_start == vbn && run_end <= last_vbn {
                // The whole run goes
                let run_length = m.sectors_within_run(index);
                vbn += run_length;
                remaining -= run_length;

                if is_hole {
                    continue;
                }

                if index + 1 == m.len() {
                    // --Run--||--LastRun--  ==>  --Run--
                    // --Hole--||--LastRun--  ==>  (nothing)
                    log::trace!("mcb remove: last run {}", index);
                    if m.previous_is_hole(index) {
                        m.close_gap(index - 1, 2);
                    } else {
                        m.close_gap(index, 1);
                    }
                    continue;
                }

                match (m.previous_is_hole(index), m.next_is_hole(index)) {
                    (false, false) => {
                        // --Run--||--IndexRun--||--Run--  ==>  --Run--||--Hole--||--Run--
                        log::trace!("mcb remove: run {} becomes hole", index);
                        m.pairs_mut()[index].lbn = None;
                    }
                    (false, true) => {
                        // --Run--||--IndexRun--||--Hole--  ==>  --Run--||--Hole------
                        log::trace!("mcb remove: run {} joins following hole", index);
                        m.close_gap(index, 1);
                    }
                    (true, false) => {
                        // --Hole--||--IndexRun--||--Run--  ==>  --Hole------||--Run--
                        log::trace!("mcb remove: run {} joins preceding hole", index);
                        m.pairs_mut()[index].lbn = None;
                        m.close_gap(index - 1, 1);
                    }
                    (true, true) => {
                        // --Hole--||--IndexRun--||--Hole--  ==>  --Hole----------
                        log::trace!("mcb remove: run {} joins holes on both sides", index);
                        m.close_gap(index - 1, 2);
                    }
                }
            } else if run_start == vbn {
                // The front of the run goes
                if !is_hole {
                    if m.previous_is_hole(index) {
                        // --Hole--||--IndexRun--  ==>  --Hole-----||--Run--
                        log::trace!("mcb remove: front of run {} into preceding hole", index);
                        let pairs = m.pairs_mut();
                        pairs[index - 1].next_vbn += remaining;
                        pairs[index].lbn = pairs[index].lbn.map(|lbn| lbn + remaining);
                    } else {
                        // --Run--||--IndexRun--  ==>  --Run--||--Hole--||--Run--
                        log::trace!("mcb remove: front of run {}", index);
                        m.open_gap(index, 1)?;
                        let pairs = m.pairs_mut();
                        pairs[index] = McbPair::hole(vbn + remaining);
                        pairs[index + 1].lbn = pairs[index + 1].lbn.map(|lbn| lbn + remaining);
                    }
                }
                remaining = 0;
            } else if run_end <= last_vbn {
                // The back of the run goes
                let amount = run_end - vbn + 1;

                if !is_hole {
                    if index + 1 == m.len() || m.next_is_hole(index) {
                        // --IndexRun--||--Hole--  ==>  --Run--||-----Hole--
                        log::trace!("mcb remove: back of run {}", index);
                        m.pairs_mut()[index].next_vbn -= amount;
                    } else {
                        // --IndexRun--||--Run--  ==>  --Run--||--Hole--||--Run--
                        log::trace!("mcb remove: back of run {} becomes hole", index);
                        m.open_gap(index + 1, 1)?;
                        let pairs = m.pairs_mut();
                        pairs[index + 1] = McbPair::hole(pairs[index].next_vbn);
                        pairs[index].next_vbn -= amount;
                    }
                }

                vbn += amount;
                remaining -= amount;
            } else {
                // The range is strictly inside the run
                if !is_hole {
                    // --IndexRun--  ==>  --Run--||--Hole--||--Run--
                    log::trace!("mcb remove: middle of run {}", index);
                    m.open_gap(index, 2)?;
                    let pairs = m.pairs_mut();
                    let run_lbn = pairs[index + 2].lbn;
                    pairs[index] = McbPair { next_vbn: vbn, lbn: run_lbn };
                    pairs[index + 1] = McbPair::hole(vbn + remaining);
                    pairs[index + 2].lbn = run_lbn.map(|lbn| lbn + (vbn + remaining - run_start));
                }
                remaining = 0;
            }
        }

        self.debug_check();
        Ok(())
    }

    /// New pairs `remove_entry` will insert for a range starting inside
    /// the map
    ///
    /// Only the run holding `vbn` can be cut into: a back trim before a
    /// mapped run, a front trim after a mapped run (or at index 0), or a
    /// middle split. Any later run the range reaches is preceded by sectors
    /// that were just removed, so trimming its front extends that hole.
    fn pairs_needed_to_remove(&self, vbn: Vbn, sector_count: u64) -> usize {
        let index = match self.find_index(vbn) {
            Ok(index) => index,
            Err(_) => return 0,
        };

        let m = &self.mapping;
        if m.starting_lbn(index).is_none() {
            return 0;
        }

        let last_vbn = vbn.saturating_add(sector_count - 1);
        let keeps_front = m.starting_vbn(index) < vbn;
        let keeps_back = last_vbn < m.ending_vbn(index);

        match (keeps_front, keeps_back) {
            (true, true) => 2,
            (true, false) => usize::from(index + 1 < m.len() && !m.next_is_hole(index)),
            (false, true) => usize::from(!m.previous_is_hole(index)),
            (false, false) => 0,
        }
    }
}
