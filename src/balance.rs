//! Full depth-optimal reconstruction.
//!
//! Balancing collects every payload in level order, works out how many
//! children each position gets, and replays the insertions into a fresh
//! [`Storage`]. The old storage stays installed until the new one is fully
//! built, so a failed rebuild leaves the tree untouched.

use crate::config::DEFAULT_BRANCHING_FACTOR;
use crate::error::{Result, TreeError};
use crate::tree::{NaryTree, Storage};

/// `floor(log_b(n))` for `n >= 1`.
pub(crate) fn floor_log(n: usize, b: usize) -> usize {
    debug_assert!(n >= 1 && b >= 2);
    let mut k = 0;
    let mut power = b;
    while power <= n {
        k += 1;
        power = match power.checked_mul(b) {
            Some(next) => next,
            None => break,
        };
    }
    k
}

/// `ceil(log_b(n))` for `n >= 1`.
pub(crate) fn ceil_log(n: usize, b: usize) -> usize {
    debug_assert!(n >= 1 && b >= 2);
    let mut k = 0;
    let mut power = 1usize;
    while power < n {
        k += 1;
        power = power.saturating_mul(b);
    }
    k
}

/// Child count for every level-order position of an `n`-node tree.
///
/// Each level takes as many of the remaining nodes as its open parents can
/// hold (`b` per parent). They are spread with `base = placed / parents`,
/// `extra = placed % parents`: the first `extra` parents get `base + 1`.
pub(crate) fn level_shape(n: usize, b: usize) -> Result<Vec<usize>> {
    let mut counts = Vec::new();
    counts.try_reserve_exact(n)?;
    counts.resize(n, 0);

    let mut level_start = 0;
    let mut level_len = n.min(1);
    let mut placed = level_len;
    while placed < n {
        let children = (n - placed).min(level_len.saturating_mul(b));
        let base = children / level_len;
        let extra = children % level_len;
        for (offset, count) in counts[level_start..level_start + level_len]
            .iter_mut()
            .enumerate()
        {
            *count = base + usize::from(offset < extra);
        }
        level_start += level_len;
        level_len = children;
        placed += children;
    }
    Ok(counts)
}

impl<T> NaryTree<T> {
    /// Depth heuristic with the default branching factor of 3.
    ///
    /// See [`needs_rebalancing_for`](Self::needs_rebalancing_for).
    pub fn needs_rebalancing(&self) -> bool {
        self.needs_rebalancing_for(DEFAULT_BRANCHING_FACTOR)
    }

    /// Whether the tree is more than twice as deep as a `b`-ary tree of the
    /// same size would be (`optimal = floor(log_b(size)) + 1`).
    ///
    /// This is a trigger heuristic, not a bound: a tree just under the
    /// threshold can still be far from optimal.
    pub fn needs_rebalancing_for(&self, b: usize) -> bool {
        let size = self.size();
        if size <= 1 || b < 2 {
            return false;
        }
        let optimal = floor_log(size, b) + 1;
        self.depth() > 2 * optimal
    }
}

impl<T: Clone> NaryTree<T> {
    /// Rebuild the tree so that `depth <= ceil(log_b(size)) + 1`.
    ///
    /// Level-order payload sequence is preserved, so balancing twice with the
    /// same `b` gives the same shape. All handles are invalidated. A no-op on
    /// an empty tree.
    pub fn balance_tree(&mut self, b: usize) -> Result<()> {
        if b < 2 {
            return Err(TreeError::InvalidBranchingFactor(b));
        }
        if self.is_empty() {
            return Ok(());
        }

        let size = self.size();
        let depth_before = self.depth();
        let mut payloads = Vec::new();
        payloads.try_reserve_exact(size)?;
        payloads.extend(self.iter_breadth_first().map(|visit| visit.payload.clone()));

        let storage = self.rebuild(payloads, b)?;
        self.install(storage);
        debug_assert!(self.depth() <= ceil_log(size, b) + 1);

        tracing::debug!(
            size,
            branching_factor = b,
            depth_before,
            depth_after = self.depth(),
            hot = self.hot_len(),
            cold = self.cold_len(),
            "tree rebalanced"
        );
        Ok(())
    }

    /// Rebalance with `b` when [`needs_rebalancing`](Self::needs_rebalancing)
    /// says so. Returns whether a rebuild happened.
    pub fn auto_balance_if_needed(&mut self, b: usize) -> Result<bool> {
        if !self.needs_rebalancing() {
            return Ok(false);
        }
        self.balance_tree(b)?;
        Ok(true)
    }

    /// Replay level-ordered `payloads` into fresh storage with shape `b`.
    fn rebuild(&self, payloads: Vec<T>, b: usize) -> Result<Storage<T>> {
        let n = payloads.len();
        let shape = level_shape(n, b)?;

        let mut storage = Storage::new();
        storage.slots.try_reserve_exact(n)?;
        storage.hot.try_reserve(n.min(self.hot_capacity()))?;

        let mut payloads = payloads.into_iter();
        let Some(root) = payloads.next() else {
            return Ok(storage);
        };
        storage.push_root(root);

        // Positions are assigned in level order, so a parent's logical id is
        // its level-order position.
        for (parent, &count) in shape.iter().enumerate() {
            for payload in payloads.by_ref().take(count) {
                storage.insert_child(parent as u32, payload, self.config(), self.hot_capacity())?;
            }
        }
        debug_assert_eq!(storage.len(), n);
        Ok(storage)
    }
}
