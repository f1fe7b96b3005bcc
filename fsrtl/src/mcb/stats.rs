//! MCB allocation statistics

use core::sync::atomic::{AtomicU64, Ordering};

use super::lookaside;

/// Live MCB counters
pub(crate) struct McbStatistics {
    /// Pair arrays allocated from pool
    mappings_allocated: AtomicU64,
    /// Pair arrays returned to pool
    mappings_freed: AtomicU64,
    /// First mappings served from the lookaside
    lookaside_hits: AtomicU64,
    /// First mappings that missed the lookaside
    lookaside_misses: AtomicU64,
    /// Pair arrays grown
    grows: AtomicU64,
    /// Pair arrays shrunk
    shrinks: AtomicU64,
    /// Shrinks skipped because the smaller buffer could not be allocated
    shrink_failures: AtomicU64,
    /// Allocations refused (pool exhausted or quota reached)
    allocation_failures: AtomicU64,
}

/// Snapshot of the MCB counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct McbStats {
    pub mappings_allocated: u64,
    pub mappings_freed: u64,
    pub lookaside_hits: u64,
    pub lookaside_misses: u64,
    pub grows: u64,
    pub shrinks: u64,
    pub shrink_failures: u64,
    pub allocation_failures: u64,
    /// Buffers currently cached by the first-mapping lookaside
    pub lookaside_depth: u64,
}

impl McbStatistics {
    const fn new() -> Self {
        Self {
            mappings_allocated: AtomicU64::new(0),
            mappings_freed: AtomicU64::new(0),
            lookaside_hits: AtomicU64::new(0),
            lookaside_misses: AtomicU64::new(0),
            grows: AtomicU64::new(0),
            shrinks: AtomicU64::new(0),
            shrink_failures: AtomicU64::new(0),
            allocation_failures: AtomicU64::new(0),
        }
    }

    pub(crate) fn mapping_allocated(&self) {
        self.mappings_allocated.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn mapping_freed(&self) {
        self.mappings_freed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn lookaside_hit(&self) {
        self.lookaside_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn lookaside_miss(&self) {
        self.lookaside_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn grew(&self) {
        self.grows.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn shrank(&self) {
        self.shrinks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn shrink_failed(&self) {
        self.shrink_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn allocation_failed(&self) {
        self.allocation_failures.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> McbStats {
        McbStats {
            mappings_allocated: self.mappings_allocated.load(Ordering::Relaxed),
            mappings_freed: self.mappings_freed.load(Ordering::Relaxed),
            lookaside_hits: self.lookaside_hits.load(Ordering::Relaxed),
            lookaside_misses: self.lookaside_misses.load(Ordering::Relaxed),
            grows: self.grows.load(Ordering::Relaxed),
            shrinks: self.shrinks.load(Ordering::Relaxed),
            shrink_failures: self.shrink_failures.load(Ordering::Relaxed),
            allocation_failures: self.allocation_failures.load(Ordering::Relaxed),
            lookaside_depth: lookaside::depth() as u64,
        }
    }
}

/// Global MCB statistics
pub(crate) static MCB_STATS: McbStatistics = McbStatistics::new();

/// Get current MCB statistics
pub fn fsrtl_get_mcb_stats() -> McbStats {
    MCB_STATS.snapshot()
}
