//! Error types for tree operations.

use std::collections::TryReserveError;

use thiserror::Error;

/// Result type alias using [`TreeError`].
pub type Result<T> = std::result::Result<T, TreeError>;

/// Errors returned by tree operations.
///
/// Operations on an empty tree are not errors: `depth`, traversal and
/// `balance_tree` simply return zero or nothing.
#[derive(Debug, Error)]
pub enum TreeError {
    /// A hot-tier index or logical node index is out of range, or names a
    /// vacated hot-tier slot.
    #[error("invalid index {index} (len {len})")]
    InvalidIndex { index: usize, len: usize },

    /// The handle was minted before the last structural rebuild.
    #[error("stale node handle {index}: minted at epoch {epoch}, tree is at epoch {current}")]
    InvalidParent { index: u32, epoch: u32, current: u32 },

    #[error("branching factor must be at least 2, got {0}")]
    InvalidBranchingFactor(usize),

    #[error("invalid tree configuration: {0}")]
    InvalidConfig(&'static str),

    /// Reserving storage for a rebuild failed. The previous tree is intact.
    #[error("allocation failed: {0}")]
    AllocationFailure(#[from] TryReserveError),

    #[error("malformed succinct encoding at bit {bit}: {reason}")]
    MalformedEncoding { bit: usize, reason: &'static str },
}
