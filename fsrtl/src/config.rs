//! MCB Configuration
//!
//! Sizing knobs for the mapping pair array. The defaults reproduce the
//! NT 5.2 policy: start with room for 15 pairs, double until 2048 pairs,
//! then grow linearly by 2048 pairs at a time.

use crate::pool::PoolType;

/// Pairs in a freshly initialized MCB
pub const INITIAL_MAXIMUM_PAIR_COUNT: usize = 15;

/// Capacity beyond which the pair array stops doubling
pub const MAXIMUM_PAIR_COUNT_DOUBLING: usize = 2048;

/// MCB configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct McbConfig {
    /// Pool the pair array is allocated from
    pub pool_type: PoolType,
    /// Initial (and minimum) pair capacity
    pub initial_pair_count: usize,
    /// Doubling stops here; larger arrays grow by this many pairs
    pub doubling_limit: usize,
    /// Hard cap on the pair capacity; growth past it fails as out of memory
    pub pair_quota: Option<usize>,
}

impl McbConfig {
    /// Default configuration for the given pool
    pub const fn new(pool_type: PoolType) -> Self {
        Self {
            pool_type,
            initial_pair_count: INITIAL_MAXIMUM_PAIR_COUNT,
            doubling_limit: MAXIMUM_PAIR_COUNT_DOUBLING,
            pair_quota: None,
        }
    }

    /// Set the initial pair capacity (at least one pair)
    pub const fn with_initial_pair_count(mut self, count: usize) -> Self {
        self.initial_pair_count = if count == 0 { 1 } else { count };
        self
    }

    /// Set the doubling limit (at least one pair)
    pub const fn with_doubling_limit(mut self, limit: usize) -> Self {
        self.doubling_limit = if limit == 0 { 1 } else { limit };
        self
    }

    /// Cap the pair capacity
    pub const fn with_pair_quota(mut self, quota: usize) -> Self {
        self.pair_quota = Some(quota);
        self
    }

    /// Capacity to grow to from `current` so that `needed` pairs fit
    pub(crate) fn grown_pair_count(&self, current: usize, needed: usize) -> usize {
        let mut new_max = current.max(1);
        while new_max < needed {
            new_max = if new_max < self.doubling_limit {
                new_max.saturating_mul(2)
            } else {
                new_max.saturating_add(self.doubling_limit)
            };
        }
        new_max
    }

    /// Whether a pair array of `pair_count` entries is within the quota
    pub(crate) fn allows(&self, pair_count: usize) -> bool {
        match self.pair_quota {
            Some(quota) => pair_count <= quota,
            None => true,
        }
    }
}

impl Default for McbConfig {
    fn default() -> Self {
        Self::new(PoolType::NonPagedPool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_growth_policy() {
        let config = McbConfig::default();
        assert_eq!(config.grown_pair_count(15, 16), 30);
        assert_eq!(config.grown_pair_count(15, 17), 30);
        assert_eq!(config.grown_pair_count(1920, 1921), 3840);
        assert_eq!(config.grown_pair_count(3840, 3841), 3840 + 2048);
    }

    #[test]
    fn test_builders() {
        let config = McbConfig::new(PoolType::PagedPool)
            .with_initial_pair_count(0)
            .with_doubling_limit(4)
            .with_pair_quota(8);
        assert_eq!(config.initial_pair_count, 1);
        assert_eq!(config.grown_pair_count(4, 5), 8);
        assert!(config.allows(8));
        assert!(!config.allows(9));
    }
}
