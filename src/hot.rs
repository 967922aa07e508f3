//! Hot tier: array-resident node records.
//!
//! Payloads and link records are parallel columns addressed by the same
//! physical slot index, so the payload column is a plain `&[T]` that can be
//! scanned with vector compares. Slot layout invariants:
//!
//! - The children of a slot occupy `[first_child, first_child + child_count)`.
//! - Runs of different parents never overlap.
//! - The root is always slot 0.
//!
//! A run grows in place when the slot right after it is free: either the tail,
//! or an invalid slot. Otherwise the whole run moves to the tail, its old
//! slots are marked invalid, and as many invalid slack slots as the run had
//! children are reserved behind it, so repeated growth of the same run costs
//! amortized O(1) copies. [`NodeStore::relayout`] compacts invalid slots away.

use std::collections::TryReserveError;
use std::ops::Range;

use smallvec::SmallVec;

use crate::error::{Result, TreeError};

/// Sentinel for "no slot" in parent / first-child links.
pub const INVALID_INDEX: u32 = u32::MAX;

/// Link record for one hot-tier slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArrayNode {
    pub parent: u32,
    pub first_child: u32,
    pub child_count: u32,
    /// 0-based level.
    pub depth: u32,
    /// Logical id of the node held in this slot.
    pub id: u32,
    pub valid: bool,
}

impl ArrayNode {
    #[inline]
    fn new(parent: u32, depth: u32, id: u32) -> Self {
        Self {
            parent,
            first_child: INVALID_INDEX,
            child_count: 0,
            depth,
            id,
            valid: true,
        }
    }

    /// An invalid slot outside every run.
    #[inline]
    fn vacant() -> Self {
        Self {
            parent: INVALID_INDEX,
            first_child: INVALID_INDEX,
            child_count: 0,
            depth: 0,
            id: INVALID_INDEX,
            valid: false,
        }
    }

    #[inline]
    pub fn children(&self) -> Range<u32> {
        if self.child_count == 0 {
            return 0..0;
        }
        self.first_child..self.first_child + self.child_count
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent == INVALID_INDEX
    }
}

/// A slot moved to the tail while growing its parent's run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Relocation {
    pub from: u32,
    pub to: u32,
    pub id: u32,
}

/// Result of [`NodeStore::append`].
#[derive(Debug)]
pub struct Appended {
    pub index: u32,
    pub relocated: SmallVec<[Relocation; 4]>,
}

/// Contiguous storage for shallow nodes.
#[derive(Clone)]
pub struct NodeStore<T> {
    payloads: Vec<T>,
    records: Vec<ArrayNode>,
    live: usize,
}

impl<T> NodeStore<T> {
    pub fn new() -> Self {
        Self {
            payloads: Vec::new(),
            records: Vec::new(),
            live: 0,
        }
    }

    /// Make room for `capacity` slots in total.
    pub fn reserve(&mut self, capacity: usize) {
        let additional = capacity.saturating_sub(self.records.len());
        self.payloads.reserve(additional);
        self.records.reserve(additional);
    }

    pub fn try_reserve(&mut self, capacity: usize) -> std::result::Result<(), TryReserveError> {
        let additional = capacity.saturating_sub(self.records.len());
        self.payloads.try_reserve(additional)?;
        self.records.try_reserve(additional)
    }

    /// Number of valid slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of slots, including vacated and slack ones.
    #[inline]
    pub fn slots(&self) -> usize {
        self.records.len()
    }

    #[inline]
    pub fn vacated(&self) -> usize {
        self.records.len() - self.live
    }

    #[inline]
    pub fn is_valid(&self, index: u32) -> bool {
        self.records
            .get(index as usize)
            .map_or(false, |record| record.valid)
    }

    pub fn record(&self, index: u32) -> Result<&ArrayNode> {
        match self.records.get(index as usize) {
            Some(record) if record.valid => Ok(record),
            _ => Err(TreeError::InvalidIndex {
                index: index as usize,
                len: self.records.len(),
            }),
        }
    }

    pub fn get(&self, index: u32) -> Result<&T> {
        self.record(index)?;
        Ok(&self.payloads[index as usize])
    }

    pub fn get_mut(&mut self, index: u32) -> Result<&mut T> {
        self.record(index)?;
        Ok(&mut self.payloads[index as usize])
    }

    #[inline]
    pub fn records(&self) -> &[ArrayNode] {
        &self.records
    }

    /// Payload column, vacated slots included.
    #[inline]
    pub fn payloads(&self) -> &[T] {
        &self.payloads
    }

    pub fn clear(&mut self) {
        self.payloads.clear();
        self.records.clear();
        self.live = 0;
    }

    pub fn shrink_to_fit(&mut self) {
        self.payloads.shrink_to_fit();
        self.records.shrink_to_fit();
    }

    pub fn memory_usage(&self) -> usize {
        self.payloads.capacity() * std::mem::size_of::<T>()
            + self.records.capacity() * std::mem::size_of::<ArrayNode>()
    }

    /// Start a fresh store with `payload` as the root in slot 0.
    pub fn push_root(&mut self, payload: T, id: u32) -> u32 {
        self.clear();
        self.payloads.push(payload);
        self.records.push(ArrayNode::new(INVALID_INDEX, 0, id));
        self.live = 1;
        0
    }

    /// Where the next child of `parent` can go without breaking run
    /// contiguity. `None` means the run has to move first.
    fn growth_slot(&self, parent: u32) -> Option<Growth> {
        let record = &self.records[parent as usize];
        if record.child_count == 0 {
            return Some(Growth::Tail);
        }
        let end = (record.first_child + record.child_count) as usize;
        match self.records.get(end) {
            None => Some(Growth::Tail),
            Some(next) if !next.valid => Some(Growth::InPlace(end as u32)),
            Some(_) => None,
        }
    }

    fn next_index(&self) -> Result<u32> {
        match u32::try_from(self.records.len()) {
            Ok(index) if index != INVALID_INDEX => Ok(index),
            _ => Err(TreeError::InvalidIndex {
                index: self.records.len(),
                len: INVALID_INDEX as usize,
            }),
        }
    }

    /// Rewrite slots in breadth-first order starting from the root.
    ///
    /// Every parent's run ends up right behind the runs of the parents that
    /// precede it, and vacated slots disappear. Returns the old-to-new slot
    /// map (`INVALID_INDEX` for slots that were vacated).
    pub fn relayout(&mut self) -> Vec<u32> {
        let mut old_to_new = vec![INVALID_INDEX; self.records.len()];
        if self.live == 0 {
            self.clear();
            return old_to_new;
        }
        debug_assert!(self.records[0].valid && self.records[0].is_root());

        let old_records = std::mem::take(&mut self.records);
        let mut old_payloads: Vec<Option<T>> = std::mem::take(&mut self.payloads)
            .into_iter()
            .map(Some)
            .collect();

        // New slot order equals BFS queue order, so `order` doubles as the queue.
        let mut order: Vec<u32> = Vec::with_capacity(self.live);
        let mut records: Vec<ArrayNode> = Vec::with_capacity(self.live);
        order.push(0);
        old_to_new[0] = 0;

        let mut head = 0usize;
        while head < order.len() {
            let old = old_records[order[head] as usize];
            let first_child = order.len() as u32;
            for child in old.children() {
                old_to_new[child as usize] = order.len() as u32;
                order.push(child);
            }

            let parent = if old.is_root() {
                INVALID_INDEX
            } else {
                old_to_new[old.parent as usize]
            };
            records.push(ArrayNode {
                parent,
                first_child: if old.child_count == 0 {
                    INVALID_INDEX
                } else {
                    first_child
                },
                ..old
            });
            head += 1;
        }
        debug_assert_eq!(order.len(), self.live);

        let mut payloads = Vec::with_capacity(order.len());
        for &old in &order {
            if let Some(payload) = old_payloads[old as usize].take() {
                payloads.push(payload);
            }
        }

        self.records = records;
        self.payloads = payloads;
        old_to_new
    }
}

impl<T: Clone> NodeStore<T> {
    /// Append a node under `parent` (`INVALID_INDEX` for the root).
    ///
    /// Exceeding the planned capacity is allowed here; callers route overflow
    /// to the cold tier themselves.
    pub fn append(&mut self, payload: T, parent: u32, id: u32) -> Result<Appended> {
        let mut relocated = SmallVec::new();
        let (depth, growth) = if parent == INVALID_INDEX {
            (0, Growth::Tail)
        } else {
            let depth = self.record(parent)?.depth + 1;
            let growth = match self.growth_slot(parent) {
                Some(growth) => growth,
                None => Growth::InPlace(self.relocate_run(parent, &mut relocated)?),
            };
            (depth, growth)
        };

        let index = match growth {
            Growth::Tail => {
                let index = self.next_index()?;
                self.payloads.push(payload);
                self.records.push(ArrayNode::new(parent, depth, id));
                index
            }
            Growth::InPlace(index) => {
                self.payloads[index as usize] = payload;
                self.records[index as usize] = ArrayNode::new(parent, depth, id);
                index
            }
        };
        self.live += 1;

        if parent != INVALID_INDEX {
            let record = &mut self.records[parent as usize];
            if record.child_count == 0 {
                record.first_child = index;
            }
            record.child_count += 1;
        }

        Ok(Appended { index, relocated })
    }

    /// Move the children of `parent` to the tail, vacating their old slots,
    /// and reserve one slack slot per moved child behind the run. Returns the
    /// first slack slot.
    fn relocate_run(&mut self, parent: u32, out: &mut SmallVec<[Relocation; 4]>) -> Result<u32> {
        let run = self.records[parent as usize].children();
        let len = run.len();
        let start = self.next_index()?;
        tracing::trace!(parent, from = run.start, to = start, len, "relocating hot run");
        self.payloads.try_reserve(2 * len)?;
        self.records.try_reserve(2 * len)?;

        for from in run {
            let to = self.next_index()?;
            let moved = self.records[from as usize];
            let payload = self.payloads[from as usize].clone();

            let vacated = &mut self.records[from as usize];
            vacated.valid = false;
            vacated.child_count = 0;
            vacated.first_child = INVALID_INDEX;

            self.payloads.push(payload);
            self.records.push(moved);
            for grandchild in moved.children() {
                self.records[grandchild as usize].parent = to;
            }
            out.push(Relocation {
                from,
                to,
                id: moved.id,
            });
        }

        self.records[parent as usize].first_child = start;

        let slack = self.next_index()?;
        let filler = self.payloads[start as usize].clone();
        self.payloads.resize(self.payloads.len() + len, filler);
        self.records.resize(self.records.len() + len, ArrayNode::vacant());
        Ok(slack)
    }
}

/// Placement of a new hot child.
enum Growth {
    Tail,
    /// An invalid slot directly after the parent's run.
    InPlace(u32),
}

impl<T> Default for NodeStore<T> {
    fn default() -> Self {
        Self::new()
    }
}
