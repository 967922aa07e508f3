//! Tier boundary and maintenance configuration.

use crate::error::{Result, TreeError};

/// Branching factor used when none is given.
pub const DEFAULT_BRANCHING_FACTOR: usize = 3;
/// Number of levels kept in the hot tier by default.
pub const DEFAULT_HOT_DEPTH_LIMIT: usize = 3;
/// Insertions between lazy re-layout passes by default.
pub const DEFAULT_LAZY_REBALANCE_THRESHOLD: usize = 100;

/// Configuration for a [`NaryTree`](crate::NaryTree).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TreeConfig {
    /// Fan-out used to size the hot tier.
    pub branching_factor: usize,
    /// Nodes at a 0-based depth below this limit may live in the hot tier.
    pub hot_depth_limit: usize,
    /// Insertions between lazy re-layout passes. `0` disables the pass.
    pub lazy_rebalance_threshold: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            branching_factor: DEFAULT_BRANCHING_FACTOR,
            hot_depth_limit: DEFAULT_HOT_DEPTH_LIMIT,
            lazy_rebalance_threshold: DEFAULT_LAZY_REBALANCE_THRESHOLD,
        }
    }
}

impl TreeConfig {
    /// A layout with an unbounded hot tier: every node is array-resident.
    pub fn flat() -> Self {
        Self {
            hot_depth_limit: usize::MAX,
            ..Self::default()
        }
    }

    pub fn with_branching_factor(mut self, branching_factor: usize) -> Self {
        self.branching_factor = branching_factor;
        self
    }

    pub fn with_hot_depth_limit(mut self, hot_depth_limit: usize) -> Self {
        self.hot_depth_limit = hot_depth_limit;
        self
    }

    pub fn with_lazy_rebalance_threshold(mut self, threshold: usize) -> Self {
        self.lazy_rebalance_threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.branching_factor < 2 {
            return Err(TreeError::InvalidConfig("branching_factor must be at least 2"));
        }
        if self.hot_depth_limit == 0 {
            return Err(TreeError::InvalidConfig("hot_depth_limit must keep the root hot"));
        }
        Ok(())
    }

    /// Hot-tier capacity: `Σ_{i=0..L-1} b^i`, saturating at `usize::MAX`.
    pub fn hot_capacity(&self) -> usize {
        hot_capacity(self.branching_factor, self.hot_depth_limit)
    }
}

/// Capacity of a complete `branching_factor`-ary tree with `levels` levels.
pub fn hot_capacity(branching_factor: usize, levels: usize) -> usize {
    match branching_factor {
        0 => return levels.min(1),
        1 => return levels,
        _ => {}
    }
    let mut capacity = 0usize;
    let mut level_size = 1usize;
    for _ in 0..levels {
        capacity = capacity.saturating_add(level_size);
        if capacity == usize::MAX {
            break;
        }
        level_size = level_size.saturating_mul(branching_factor);
    }
    capacity
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity() {
        assert_eq!(hot_capacity(3, 3), 13);
        assert_eq!(hot_capacity(2, 4), 15);
        assert_eq!(hot_capacity(3, 1), 1);
        assert_eq!(hot_capacity(3, 0), 0);
        assert_eq!(TreeConfig::flat().hot_capacity(), usize::MAX);
        assert_eq!(hot_capacity(1, 5), 5);
        assert_eq!(hot_capacity(0, 5), 1);
    }

    #[test]
    fn test_validate() {
        assert!(TreeConfig::default().validate().is_ok());
        assert!(TreeConfig::default().with_branching_factor(1).validate().is_err());
        assert!(TreeConfig::default().with_hot_depth_limit(0).validate().is_err());
    }
}
