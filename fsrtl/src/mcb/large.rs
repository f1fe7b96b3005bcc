//! Large MCB (synchronized)
//!
//! `LargeMcb` wraps a [`BaseMcb`] in a spinlock. Every operation takes the
//! lock, delegates to the base MCB, and drops the lock on the way out,
//! error paths included.
//!
//! Callers that already serialize access to the file can skip the lock
//! entirely through [`LargeMcb::get_mut`], or hold it across several calls
//! with [`LargeMcb::lock`].

use alloc::vec::Vec;

use spin::{Mutex, MutexGuard};

use super::base::BaseMcb;
use super::{Lbn, McbLookup, McbRun, Vbn};
use crate::config::McbConfig;
use crate::pool::PoolType;
use crate::status::McbResult;

/// Large MCB structure (synchronized)
///
/// Provides thread-safe access to the mapping using a spinlock.
pub struct LargeMcb {
    /// The underlying base MCB, guarded
    base: Mutex<BaseMcb>,
}

impl LargeMcb {
    /// Create a new empty large MCB
    pub const fn new(pool_type: PoolType) -> Self {
        Self::with_config(McbConfig::new(pool_type))
    }

    /// Create a new empty large MCB with explicit sizing
    pub const fn with_config(config: McbConfig) -> Self {
        Self {
            base: Mutex::new(BaseMcb::with_config(config)),
        }
    }

    /// Acquire the lock and return the base MCB
    ///
    /// Lookup results taken under the guard stay valid only until the next
    /// mutating call.
    pub fn lock(&self) -> MutexGuard<'_, BaseMcb> {
        self.base.lock()
    }

    /// Access the base MCB without locking
    ///
    /// The exclusive borrow already rules out any other caller.
    pub fn get_mut(&mut self) -> &mut BaseMcb {
        self.base.get_mut()
    }

    /// Consume the large MCB and return the base MCB
    pub fn into_inner(self) -> BaseMcb {
        self.base.into_inner()
    }

    pub fn pool_type(&self) -> PoolType {
        self.lock().pool_type()
    }

    pub fn max_pair_count(&self) -> usize {
        self.lock().max_pair_count()
    }

    /// See [`BaseMcb::add_entry`]
    pub fn add_entry(&self, vbn: Vbn, lbn: Lbn, sector_count: u64) -> McbResult<()> {
        self.lock().add_entry(vbn, lbn, sector_count)
    }

    /// See [`BaseMcb::remove_entry`]
    pub fn remove_entry(&self, vbn: Vbn, sector_count: u64) -> McbResult<()> {
        self.lock().remove_entry(vbn, sector_count)
    }

    pub fn lookup(&self, vbn: Vbn) -> Option<McbLookup> {
        self.lock().lookup(vbn)
    }

    pub fn lookup_last(&self) -> Option<(Vbn, Lbn)> {
        self.lock().lookup_last()
    }

    pub fn lookup_last_with_index(&self) -> Option<(Vbn, Lbn, usize)> {
        self.lock().lookup_last_with_index()
    }

    pub fn number_of_runs(&self) -> usize {
        self.lock().number_of_runs()
    }

    pub fn get_next_entry(&self, index: usize) -> Option<McbRun> {
        self.lock().get_next_entry(index)
    }

    /// Copy out every run under one hold of the lock
    pub fn runs(&self) -> Vec<McbRun> {
        self.lock().runs().collect()
    }

    pub fn truncate(&self, vbn: Vbn) {
        self.lock().truncate(vbn);
    }

    pub fn reset(&self) {
        self.lock().reset();
    }

    /// See [`BaseMcb::split`]
    pub fn split(&self, vbn: Vbn, amount: u64) -> McbResult<()> {
        self.lock().split(vbn, amount)
    }
}

impl Default for LargeMcb {
    fn default() -> Self {
        Self::new(PoolType::default())
    }
}

impl From<BaseMcb> for LargeMcb {
    fn from(base: BaseMcb) -> Self {
        Self { base: Mutex::new(base) }
    }
}

// ============================================================================
// Public API Functions
// ============================================================================

/// Initialize a large MCB
///
/// # Arguments
/// * `pool_type` - Pool type for allocations (Paged or NonPaged)
///
/// Nothing is allocated until the first run is added.
pub fn fsrtl_initialize_large_mcb(pool_type: PoolType) -> LargeMcb {
    LargeMcb::new(pool_type)
}

/// Initialize a large MCB with explicit sizing
pub fn fsrtl_initialize_large_mcb_with_config(config: McbConfig) -> LargeMcb {
    LargeMcb::with_config(config)
}

/// Uninitialize a large MCB and free resources
pub fn fsrtl_uninitialize_large_mcb(mcb: LargeMcb) {
    let base = mcb.into_inner();
    log::trace!("mcb: uninitialize with {} runs", base.number_of_runs());
}

/// Add a mapping entry to the MCB
///
/// # Arguments
/// * `mcb` - The MCB to modify
/// * `vbn` - Starting virtual block number
/// * `lbn` - Starting logical block number
/// * `sector_count` - Number of sectors in this run
///
/// # Returns
/// Ok if the run is now mapped, ConflictingMapping if some of the VBNs are
/// already mapped elsewhere, OutOfMemory if the pair array could not grow
pub fn fsrtl_add_large_mcb_entry(
    mcb: &LargeMcb,
    vbn: Vbn,
    lbn: Lbn,
    sector_count: u64,
) -> McbResult<()> {
    mcb.add_entry(vbn, lbn, sector_count)
}

/// Remove a range from the MCB
///
/// # Arguments
/// * `mcb` - The MCB to modify
/// * `vbn` - Starting VBN of range to remove
/// * `sector_count` - Number of sectors to remove
pub fn fsrtl_remove_large_mcb_entry(mcb: &LargeMcb, vbn: Vbn, sector_count: u64) -> McbResult<()> {
    mcb.remove_entry(vbn, sector_count)
}

/// Lookup an MCB entry
///
/// # Returns
/// The translation of `vbn` (with `lbn` None inside a hole), or None if the
/// VBN is beyond the last run
pub fn fsrtl_lookup_large_mcb_entry(mcb: &LargeMcb, vbn: Vbn) -> Option<McbLookup> {
    mcb.lookup(vbn)
}

/// Lookup the last entry in the MCB
///
/// # Returns
/// (last_vbn, last_lbn) or None if MCB is empty
pub fn fsrtl_lookup_last_large_mcb_entry(mcb: &LargeMcb) -> Option<(Vbn, Lbn)> {
    mcb.lookup_last()
}

/// Lookup the last entry in the MCB and the index of its run
pub fn fsrtl_lookup_last_large_mcb_entry_and_index(mcb: &LargeMcb) -> Option<(Vbn, Lbn, usize)> {
    mcb.lookup_last_with_index()
}

/// Get a run by index
///
/// # Arguments
/// * `mcb` - The MCB to query
/// * `index` - Run index (0-based)
///
/// # Returns
/// The run (holes included), or None if index is past the last run
pub fn fsrtl_get_next_large_mcb_entry(mcb: &LargeMcb, index: usize) -> Option<McbRun> {
    mcb.get_next_entry(index)
}

/// Truncate the MCB at a VBN
///
/// Removes all mappings at or after the specified VBN.
pub fn fsrtl_truncate_large_mcb(mcb: &LargeMcb, vbn: Vbn) {
    mcb.truncate(vbn);
}

/// Remove every run from the MCB
///
/// With `self_synchronized` the caller vouches that it already serializes
/// access to this MCB, so the lock is taken without spinning. A lock found
/// held anyway is logged and waited for. An exclusive owner can skip the
/// lock altogether with `mcb.get_mut().reset()`.
pub fn fsrtl_reset_large_mcb(mcb: &LargeMcb, self_synchronized: bool) {
    if !self_synchronized {
        mcb.reset();
        return;
    }

    match mcb.base.try_lock() {
        Some(mut base) => base.reset(),
        None => {
            log::warn!("mcb: self-synchronized reset found the lock held");
            mcb.reset();
        }
    }
}

/// Get the number of runs in the MCB
pub fn fsrtl_number_of_runs_in_large_mcb(mcb: &LargeMcb) -> usize {
    mcb.number_of_runs()
}

/// Split a run at a specified VBN
///
/// Used when inserting a hole in the middle of a file.
pub fn fsrtl_split_large_mcb(mcb: &LargeMcb, vbn: Vbn, amount: u64) -> McbResult<()> {
    mcb.split(vbn, amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::McbError;

    #[test]
    fn test_initialize_does_not_allocate() {
        static STATIC_MCB: LargeMcb = LargeMcb::new(PoolType::NonPagedPool);
        assert_eq!(STATIC_MCB.number_of_runs(), 0);
        assert_eq!(STATIC_MCB.lookup_last(), None);
        assert_eq!(STATIC_MCB.lock().pairs().len(), 0);
    }

    #[test]
    fn test_large_mcb_api() {
        let mcb = fsrtl_initialize_large_mcb(PoolType::PagedPool);
        assert_eq!(mcb.pool_type(), PoolType::PagedPool);

        fsrtl_add_large_mcb_entry(&mcb, 0, 100, 10).unwrap();
        fsrtl_add_large_mcb_entry(&mcb, 10, 110, 5).unwrap();
        assert_eq!(fsrtl_number_of_runs_in_large_mcb(&mcb), 1);

        let hit = fsrtl_lookup_large_mcb_entry(&mcb, 12).unwrap();
        assert_eq!(hit.lbn, Some(112));
        assert_eq!(hit.sector_count_from_lbn, 3);

        fsrtl_remove_large_mcb_entry(&mcb, 3, 4).unwrap();
        assert_eq!(fsrtl_number_of_runs_in_large_mcb(&mcb), 3);
        assert_eq!(
            fsrtl_get_next_large_mcb_entry(&mcb, 1),
            Some(McbRun { vbn: 3, lbn: None, sector_count: 4 })
        );
        assert_eq!(fsrtl_get_next_large_mcb_entry(&mcb, 3), None);
        assert_eq!(fsrtl_lookup_last_large_mcb_entry(&mcb), Some((14, 114)));
        assert_eq!(fsrtl_lookup_last_large_mcb_entry_and_index(&mcb), Some((14, 114, 2)));

        fsrtl_split_large_mcb(&mcb, 3, 2).unwrap();
        assert_eq!(fsrtl_lookup_last_large_mcb_entry(&mcb), Some((16, 114)));
        assert_eq!(fsrtl_split_large_mcb(&mcb, 40, 2), Err(McbError::OutOfRange));

        fsrtl_truncate_large_mcb(&mcb, 2);
        assert_eq!(mcb.runs(), [McbRun { vbn: 0, lbn: Some(100), sector_count: 2 }]);

        fsrtl_uninitialize_large_mcb(mcb);
    }

    #[test]
    fn test_reset_with_and_without_lock() {
        let mcb = LargeMcb::default();
        mcb.add_entry(0, 100, 10).unwrap();
        fsrtl_reset_large_mcb(&mcb, false);
        assert_eq!(mcb.number_of_runs(), 0);

        mcb.add_entry(5, 100, 10).unwrap();
        fsrtl_reset_large_mcb(&mcb, true);
        assert_eq!(mcb.number_of_runs(), 0);
        assert_eq!(mcb.lookup(5), None);
        assert!(mcb.base.try_lock().is_some());
    }

    #[test]
    fn test_reset_shared_mcb() {
        static SHARED_MCB: LargeMcb = LargeMcb::new(PoolType::PagedPool);
        let mcb: &'static LargeMcb = &SHARED_MCB;

        mcb.add_entry(0, 100, 10).unwrap();
        std::thread::spawn(move || fsrtl_reset_large_mcb(mcb, true))
            .join()
            .unwrap();
        assert_eq!(mcb.number_of_runs(), 0);

        mcb.add_entry(0, 300, 4).unwrap();
        let held = mcb.lock();
        let resetter = std::thread::spawn(move || fsrtl_reset_large_mcb(mcb, true));
        drop(held);
        resetter.join().unwrap();
        assert_eq!(mcb.number_of_runs(), 0);
        assert!(mcb.base.try_lock().is_some());
    }

    #[test]
    fn test_error_releases_lock() {
        let mcb = LargeMcb::default();
        mcb.add_entry(0, 100, 10).unwrap();
        assert_eq!(mcb.add_entry(5, 900, 1), Err(McbError::ConflictingMapping));

        // The lock was dropped on the error path
        assert!(mcb.base.try_lock().is_some());
        assert_eq!(mcb.number_of_runs(), 1);
    }

    #[test]
    fn test_batch_under_one_lock() {
        let mcb = LargeMcb::default();
        {
            let mut base = mcb.lock();
            base.add_entry(0, 100, 4).unwrap();
            base.add_entry(8, 300, 4).unwrap();
            assert_eq!(base.number_of_runs(), 3);
        }
        assert_eq!(mcb.lookup(9).unwrap().lbn, Some(301));
    }

    #[test]
    fn test_from_base() {
        let mut base = BaseMcb::new(PoolType::PagedPool);
        base.add_entry(0, 7, 1).unwrap();
        let mcb = LargeMcb::from(base);
        assert_eq!(mcb.lookup_last(), Some((0, 7)));
        assert_eq!(mcb.into_inner().number_of_runs(), 1);
    }
}
