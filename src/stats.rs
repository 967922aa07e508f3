//! Memory, shape and layout diagnostics.

use std::mem::size_of;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::cold::{ColdRoot, PointerNode};
use crate::hot::ArrayNode;
use crate::tree::{NaryTree, Slot};

/// Bookkeeping bytes per hot slot, excluding the payload.
pub const HOT_RECORD_OVERHEAD: usize = size_of::<ArrayNode>() + size_of::<Slot>();

/// Bookkeeping bytes per cold node, excluding the payload.
pub fn cold_record_overhead<T>() -> usize {
    size_of::<PointerNode<T>>() - size_of::<T>() + size_of::<Slot>()
}

/// Estimated memory footprint.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MemoryStats {
    /// Link records and the id table for both tiers, vacated hot slots
    /// included.
    pub node_memory_bytes: usize,
    /// `size_of::<T>()` per stored payload, vacated hot slots included.
    pub data_memory_estimate: usize,
    pub total_estimated_bytes: usize,
    /// `0.0` for an empty tree.
    pub memory_per_node: f64,
}

/// Shape summary.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TreeStatistics {
    pub total_nodes: usize,
    pub leaf_nodes: usize,
    pub internal_nodes: usize,
    /// Number of levels, same as [`NaryTree::depth`].
    pub max_depth: usize,
    /// Mean child count over internal nodes.
    pub avg_children_per_node: f64,
    pub max_children: usize,
    /// Smallest child count over internal nodes, 0 when there are none.
    pub min_children: usize,
}

/// Tier occupancy.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HybridStats {
    pub hot_nodes: usize,
    pub cold_nodes: usize,
    /// Hot slots with at least one cold child.
    pub cold_roots: usize,
    /// Tallest cold subtree, in levels.
    pub cold_height: usize,
    pub hot_capacity: usize,
    pub hot_depth_limit: usize,
    /// Invalid hot slots: left behind or reserved as slack by run
    /// relocation. Reclaimed by the next re-layout.
    pub vacated_slots: usize,
    /// `hot_nodes / hot_capacity`.
    pub hot_fill_ratio: f64,
}

impl<T> NaryTree<T> {
    pub fn get_memory_stats(&self) -> MemoryStats {
        let storage = &self.storage;
        let hot_slots = storage.hot.slots();
        let cold_nodes = storage.cold.len();

        let node_memory_bytes = hot_slots * HOT_RECORD_OVERHEAD
            + cold_nodes * cold_record_overhead::<T>()
            + storage.cold.roots().len() * size_of::<ColdRoot>();
        let data_memory_estimate = (hot_slots + cold_nodes) * size_of::<T>();
        let total_estimated_bytes = node_memory_bytes + data_memory_estimate;
        let memory_per_node = if self.is_empty() {
            0.0
        } else {
            total_estimated_bytes as f64 / self.size() as f64
        };

        MemoryStats {
            node_memory_bytes,
            data_memory_estimate,
            total_estimated_bytes,
            memory_per_node,
        }
    }

    /// Heap bytes actually held by both tiers and the id table.
    pub fn memory_usage(&self) -> usize {
        let storage = &self.storage;
        storage.hot.memory_usage()
            + storage.cold.memory_usage()
            + storage.slots.capacity() * size_of::<Slot>()
    }

    pub fn get_statistics(&self) -> TreeStatistics {
        let n = self.size();
        if n == 0 {
            return TreeStatistics::default();
        }

        // Every non-root node adds one to its parent's count.
        let mut counts = vec![0usize; n];
        for id in 1..n as u32 {
            if let Some(parent) = self.storage.parent(id) {
                counts[parent as usize] += 1;
            }
        }

        let mut stats = TreeStatistics {
            total_nodes: n,
            max_depth: self.depth(),
            ..TreeStatistics::default()
        };
        let mut children = 0;
        let mut min_children = usize::MAX;
        for &count in &counts {
            if count == 0 {
                stats.leaf_nodes += 1;
                continue;
            }
            stats.internal_nodes += 1;
            children += count;
            stats.max_children = stats.max_children.max(count);
            min_children = min_children.min(count);
        }
        if stats.internal_nodes > 0 {
            stats.min_children = min_children;
            stats.avg_children_per_node = children as f64 / stats.internal_nodes as f64;
        }
        stats
    }

    pub fn hybrid_stats(&self) -> HybridStats {
        let storage = &self.storage;
        let hot_nodes = storage.hot.len();
        let hot_capacity = self.hot_capacity();
        HybridStats {
            hot_nodes,
            cold_nodes: storage.cold.len(),
            cold_roots: storage.cold.roots().len(),
            cold_height: storage.cold.height(),
            hot_capacity,
            hot_depth_limit: self.config().hot_depth_limit,
            vacated_slots: storage.hot.vacated(),
            hot_fill_ratio: if hot_capacity == 0 {
                0.0
            } else {
                hot_nodes as f64 / hot_capacity as f64
            },
        }
    }

    /// How close each hot parent's children sit to the slot right after it,
    /// in `(0, 1]`. Higher is better; `1.0` when there is nothing to compare.
    ///
    /// Per parent with children: `1 / (1 + distance / 10)` where
    /// `distance = |first_child - (parent + 1)|`, then `1` per further
    /// child in a valid slot and `0.5` per gap. Normalized by the number of
    /// terms.
    pub fn locality_score(&self) -> f64 {
        let records = self.storage.hot.records();
        let mut score = 0.0;
        let mut comparisons = 0usize;

        for (index, record) in records.iter().enumerate() {
            if !record.valid || record.child_count == 0 {
                continue;
            }
            let first = record.first_child as usize;
            let distance = first.abs_diff(index + 1) as f64;
            score += 1.0 / (1.0 + distance / 10.0);
            comparisons += 1;

            for j in 1..record.child_count as usize {
                let consecutive = records.get(first + j).is_some_and(|child| child.valid);
                score += if consecutive { 1.0 } else { 0.5 };
                comparisons += 1;
            }
        }

        if comparisons == 0 {
            1.0
        } else {
            score / comparisons as f64
        }
    }
}
