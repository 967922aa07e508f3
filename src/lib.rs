//! # narytree
//!
//! A self-balancing N-ary tree with a two-tier physical layout.
//!
//! Shallow levels live in a contiguous hot tier (parallel payload and link
//! columns, each parent's children in one run). Nodes below the hot depth
//! limit, or past the hot tier's capacity, live in a pointer-linked cold
//! tier hanging off hot slots. A full rebuild ([`NaryTree::balance_tree`])
//! brings depth back to `ceil(log_b(n)) + 1`; a cheaper lazy pass keeps hot
//! runs compact in breadth-first order.
//!
//! ## Example
//!
//! ```rust
//! use narytree::{NaryTree, Order, TreeConfig};
//!
//! let mut tree = NaryTree::with_config(TreeConfig::default()).unwrap();
//! let mut cursor = tree.set_root(0u32);
//! for i in 1..10 {
//!     cursor = tree.add_child(cursor, i).unwrap();
//! }
//! assert_eq!(tree.depth(), 10);
//!
//! tree.balance_tree(3).unwrap();
//! assert!(tree.depth() <= 4);
//!
//! let mut level_order = Vec::new();
//! tree.for_each(Order::BreadthFirst, |visit| level_order.push(*visit.payload));
//! assert_eq!(level_order, (0..10).collect::<Vec<_>>());
//!
//! let encoded = tree.encode_succinct().unwrap();
//! assert_eq!(encoded.bit_len(), 20);
//! let decoded = encoded.decode().unwrap();
//! assert_eq!(decoded.size(), 10);
//! ```

#![deny(unsafe_op_in_unsafe_fn)]

mod balance;
mod cold;
mod config;
mod error;
mod hot;
mod scan;
mod stats;
mod succinct;
mod traverse;
mod tree;

pub use cold::{ColdParent, ColdRoot, PointerNode, SubtreeStore};
pub use config::{
    hot_capacity, TreeConfig, DEFAULT_BRANCHING_FACTOR, DEFAULT_HOT_DEPTH_LIMIT,
    DEFAULT_LAZY_REBALANCE_THRESHOLD,
};
pub use error::{Result, TreeError};
pub use hot::{Appended, ArrayNode, NodeStore, Relocation, INVALID_INDEX};
pub use scan::{find_exact_u32, find_exact_u32_scalar, HotScan};
pub use stats::{cold_record_overhead, HybridStats, MemoryStats, TreeStatistics, HOT_RECORD_OVERHEAD};
pub use succinct::SuccinctEncoding;
pub use traverse::{BreadthFirst, Order, Preorder, Visit};
pub use tree::{NaryTree, NodeId, Tier};

#[cfg(test)]
mod proptests;
