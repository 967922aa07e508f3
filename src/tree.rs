//! Tree engine: node handles, tier routing and lazy re-layout.

use crate::cold::{ColdParent, SubtreeStore};
use crate::config::TreeConfig;
use crate::error::{Result, TreeError};
use crate::hot::{NodeStore, INVALID_INDEX};
use crate::scan::HotScan;

/// Upper bound on the up-front hot-tier reservation.
const MAX_INITIAL_RESERVE: usize = 4096;

/// Handle to a node.
///
/// The index is a logical id that survives hot-tier relocation and the lazy
/// re-layout pass. The epoch ties the handle to one build of the tree:
/// `set_root`, `clear`, `balance_tree` and decoding start a new epoch, after
/// which older handles are rejected with [`TreeError::InvalidParent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    epoch: u32,
}

impl NodeId {
    #[inline]
    pub fn index(self) -> u32 {
        self.index
    }
}

/// Physical tier a node lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tier {
    Hot,
    Cold,
}

/// Where a logical id currently lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Slot {
    Hot(u32),
    /// Index into the cold arena.
    Cold(u32),
}

/// Both tiers plus the logical id table. Rebuilt wholesale by balancing.
pub(crate) struct Storage<T> {
    pub(crate) hot: NodeStore<T>,
    pub(crate) cold: SubtreeStore<T>,
    pub(crate) slots: Vec<Slot>,
}

impl<T> Storage<T> {
    pub(crate) fn new() -> Self {
        Self {
            hot: NodeStore::new(),
            cold: SubtreeStore::new(),
            slots: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn clear(&mut self) {
        self.hot.clear();
        self.cold.clear();
        self.slots.clear();
    }

    pub(crate) fn push_root(&mut self, payload: T) {
        self.clear();
        let index = self.hot.push_root(payload, 0);
        self.slots.push(Slot::Hot(index));
    }

    fn next_id(&self) -> Result<u32> {
        match u32::try_from(self.slots.len()) {
            Ok(id) if id != INVALID_INDEX => Ok(id),
            _ => Err(TreeError::InvalidIndex {
                index: self.slots.len(),
                len: INVALID_INDEX as usize,
            }),
        }
    }

    pub(crate) fn payload(&self, id: u32) -> Result<&T> {
        match self.slots[id as usize] {
            Slot::Hot(index) => self.hot.get(index),
            Slot::Cold(index) => self
                .cold
                .get(index)
                .map(|node| node.payload())
                .ok_or(TreeError::InvalidIndex {
                    index: id as usize,
                    len: self.slots.len(),
                }),
        }
    }

    pub(crate) fn payload_mut(&mut self, id: u32) -> Result<&mut T> {
        let len = self.slots.len();
        match self.slots[id as usize] {
            Slot::Hot(index) => self.hot.get_mut(index),
            Slot::Cold(index) => self
                .cold
                .get_mut(index)
                .map(|node| node.payload_mut())
                .ok_or(TreeError::InvalidIndex {
                    index: id as usize,
                    len,
                }),
        }
    }

    pub(crate) fn parent(&self, id: u32) -> Option<u32> {
        match self.slots[id as usize] {
            Slot::Hot(index) => {
                let parent = self.hot.records()[index as usize].parent;
                (parent != INVALID_INDEX).then(|| self.hot.records()[parent as usize].id)
            }
            Slot::Cold(index) => self.cold.get(index).map(|node| node.parent()),
        }
    }

    pub(crate) fn children(&self, id: u32) -> Vec<u32> {
        match self.slots[id as usize] {
            Slot::Hot(index) => {
                let records = self.hot.records();
                let mut children: Vec<u32> = records[index as usize]
                    .children()
                    .map(|child| records[child as usize].id)
                    .collect();
                if let Some(root) = self.cold.find_root(index) {
                    let group = &self.cold.roots()[root as usize];
                    let nodes = self.cold.nodes();
                    children.extend(group.children().iter().map(|&node| nodes[node as usize].id()));
                }
                children
            }
            Slot::Cold(index) => self
                .cold
                .get(index)
                .map(|node| {
                    node.children()
                        .iter()
                        .map(|&child| self.cold.nodes()[child as usize].id())
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// 0-based level of a node.
    pub(crate) fn node_depth(&self, id: u32) -> usize {
        match self.slots[id as usize] {
            Slot::Hot(index) => self.hot.records()[index as usize].depth as usize,
            Slot::Cold(index) => {
                let node = &self.cold.nodes()[index as usize];
                self.cold_depth(node.root(), node.level())
            }
        }
    }

    pub(crate) fn cold_depth(&self, root: u32, level: u32) -> usize {
        let attach = self.cold.roots()[root as usize].attach_index();
        self.hot.records()[attach as usize].depth as usize + level as usize
    }

    /// Number of levels, 0 when empty.
    pub(crate) fn depth(&self) -> usize {
        let hot = self
            .hot
            .records()
            .iter()
            .filter(|record| record.valid)
            .map(|record| record.depth as usize + 1)
            .max()
            .unwrap_or(0);
        let cold = self
            .cold
            .nodes()
            .iter()
            .map(|node| self.cold_depth(node.root(), node.level()) + 1)
            .max()
            .unwrap_or(0);
        hot.max(cold)
    }

    /// Re-lay the hot tier breadth-first and fix every index that moved.
    pub(crate) fn relayout(&mut self) {
        let old_to_new = self.hot.relayout();
        for (index, record) in self.hot.records().iter().enumerate() {
            self.slots[record.id as usize] = Slot::Hot(index as u32);
        }
        self.cold.reattach(&old_to_new);
    }
}

impl<T: Clone> Storage<T> {
    /// Add a child under logical id `parent`, routing it to a tier.
    ///
    /// A child goes hot iff the hot parent sits above the last hot level and
    /// the hot tier still has capacity. Otherwise it hangs in the cold tier
    /// from the parent, or from the parent's cold group.
    pub(crate) fn insert_child(&mut self, parent: u32, payload: T, config: &TreeConfig, hot_capacity: usize) -> Result<u32> {
        let id = self.next_id()?;
        let slot = match self.slots[parent as usize] {
            Slot::Hot(index) => {
                let depth = self.hot.record(index)?.depth as usize;
                if depth.saturating_add(1) < config.hot_depth_limit && self.hot.len() < hot_capacity {
                    let appended = self.hot.append(payload, index, id)?;
                    for moved in &appended.relocated {
                        self.slots[moved.id as usize] = Slot::Hot(moved.to);
                        self.cold.reattach_one(moved.from, moved.to);
                    }
                    Slot::Hot(appended.index)
                } else {
                    let group = self.cold.find_or_create_root(index);
                    let node = self.cold.add_child(ColdParent::Group(group), payload, id, parent)?;
                    Slot::Cold(node)
                }
            }
            Slot::Cold(index) => {
                let node = self.cold.add_child(ColdParent::Node(index), payload, id, parent)?;
                Slot::Cold(node)
            }
        };
        self.slots.push(slot);
        Ok(id)
    }
}

/// A self-balancing N-ary tree with a hot array tier and a cold pointer tier.
///
/// ## Example
///
/// ```rust
/// use narytree::NaryTree;
///
/// let mut tree = NaryTree::new();
/// let root = tree.set_root("root");
/// let a = tree.add_child(root, "a").unwrap();
/// tree.add_child(a, "b").unwrap();
///
/// assert_eq!(tree.size(), 3);
/// assert_eq!(tree.depth(), 3);
/// assert_eq!(tree.get(a).unwrap(), &"a");
/// ```
pub struct NaryTree<T> {
    config: TreeConfig,
    hot_capacity: usize,
    pub(crate) storage: Storage<T>,
    epoch: u32,
    ops_since_relayout: usize,
}

impl<T> NaryTree<T> {
    pub fn new() -> Self {
        let config = TreeConfig::default();
        Self {
            hot_capacity: config.hot_capacity(),
            config,
            storage: Storage::new(),
            epoch: 0,
            ops_since_relayout: 0,
        }
    }

    pub fn with_config(config: TreeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            hot_capacity: config.hot_capacity(),
            config,
            storage: Storage::new(),
            epoch: 0,
            ops_since_relayout: 0,
        })
    }

    #[inline]
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Number of nodes across both tiers.
    #[inline]
    pub fn size(&self) -> usize {
        self.storage.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.storage.len() == 0
    }

    #[inline]
    pub fn hot_len(&self) -> usize {
        self.storage.hot.len()
    }

    #[inline]
    pub fn cold_len(&self) -> usize {
        self.storage.cold.len()
    }

    #[inline]
    pub fn hot_capacity(&self) -> usize {
        self.hot_capacity
    }

    /// Insertions since the last lazy re-layout.
    #[inline]
    pub fn pending_operations(&self) -> usize {
        self.ops_since_relayout
    }

    pub fn root(&self) -> Option<NodeId> {
        (!self.is_empty()).then(|| self.handle(0))
    }

    #[inline]
    pub(crate) fn handle(&self, index: u32) -> NodeId {
        NodeId {
            index,
            epoch: self.epoch,
        }
    }

    fn check(&self, id: NodeId) -> Result<u32> {
        if id.epoch != self.epoch {
            return Err(TreeError::InvalidParent {
                index: id.index,
                epoch: id.epoch,
                current: self.epoch,
            });
        }
        if id.index as usize >= self.storage.len() {
            return Err(TreeError::InvalidIndex {
                index: id.index as usize,
                len: self.storage.len(),
            });
        }
        Ok(id.index)
    }

    /// Start a new epoch: every outstanding handle becomes stale.
    pub(crate) fn begin_epoch(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.ops_since_relayout = 0;
    }

    pub(crate) fn install(&mut self, storage: Storage<T>) {
        self.storage = storage;
        self.begin_epoch();
    }

    /// Replace the whole tree with a single root.
    pub fn set_root(&mut self, payload: T) -> NodeId {
        self.begin_epoch();
        self.storage.push_root(payload);
        self.storage.hot.reserve(self.hot_capacity.min(MAX_INITIAL_RESERVE));
        self.handle(0)
    }

    pub fn clear(&mut self) {
        self.storage.clear();
        self.begin_epoch();
    }

    pub fn get(&self, id: NodeId) -> Result<&T> {
        let index = self.check(id)?;
        self.storage.payload(index)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Result<&mut T> {
        let index = self.check(id)?;
        self.storage.payload_mut(index)
    }

    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        let index = self.check(id)?;
        Ok(self.storage.parent(index).map(|parent| self.handle(parent)))
    }

    /// Children in insertion order.
    pub fn children(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let index = self.check(id)?;
        Ok(self
            .storage
            .children(index)
            .into_iter()
            .map(|child| self.handle(child))
            .collect())
    }

    pub fn child_count(&self, id: NodeId) -> Result<usize> {
        let index = self.check(id)?;
        Ok(self.storage.children(index).len())
    }

    /// 0-based level of a node.
    pub fn node_depth(&self, id: NodeId) -> Result<usize> {
        let index = self.check(id)?;
        Ok(self.storage.node_depth(index))
    }

    pub fn tier(&self, id: NodeId) -> Result<Tier> {
        let index = self.check(id)?;
        Ok(match self.storage.slots[index as usize] {
            Slot::Hot(_) => Tier::Hot,
            Slot::Cold(_) => Tier::Cold,
        })
    }

    /// Number of levels; 0 for an empty tree, 1 for a lone root.
    pub fn depth(&self) -> usize {
        self.storage.depth()
    }

    /// Run the breadth-first hot-tier re-layout now.
    ///
    /// Handles stay valid: only physical slots move.
    pub fn optimize_layout(&mut self) {
        let vacated = self.storage.hot.vacated();
        self.storage.relayout();
        self.ops_since_relayout = 0;
        tracing::debug!(hot = self.storage.hot.len(), vacated, "hot tier re-laid out");
    }

    pub fn shrink_to_fit(&mut self) {
        self.storage.hot.shrink_to_fit();
        self.storage.cold.shrink_to_fit();
        self.storage.slots.shrink_to_fit();
    }
}

impl<T: Clone> NaryTree<T> {
    /// Append a child under `parent`, returning its handle.
    pub fn add_child(&mut self, parent: NodeId, payload: T) -> Result<NodeId> {
        let parent = self.check(parent)?;
        let child = self
            .storage
            .insert_child(parent, payload, &self.config, self.hot_capacity)?;

        self.ops_since_relayout += 1;
        let threshold = self.config.lazy_rebalance_threshold;
        if threshold != 0 && self.ops_since_relayout >= threshold {
            self.optimize_layout();
        }
        Ok(self.handle(child))
    }
}

impl<T: PartialEq> NaryTree<T> {
    /// First node in breadth-first order holding `needle`.
    pub fn find(&self, needle: &T) -> Option<NodeId> {
        self.iter_breadth_first()
            .find(|visit| visit.payload == needle)
            .map(|visit| visit.id)
    }
}

impl<T: HotScan> NaryTree<T> {
    /// Scan only the hot tier for `needle`, lowest slot first.
    ///
    /// 32-bit integer payloads take the vectorized compare path.
    pub fn scan_hot(&self, needle: &T) -> Option<NodeId> {
        let payloads = self.storage.hot.payloads();
        let records = self.storage.hot.records();
        let mut offset = 0;
        while let Some(hit) = T::scan(&payloads[offset..], needle) {
            let slot = offset + hit;
            if records[slot].valid {
                return Some(self.handle(records[slot].id));
            }
            offset = slot + 1;
        }
        None
    }

    /// [`scan_hot`](Self::scan_hot) restricted to hot nodes at 0-based
    /// `depth`. Each maximal stretch of slots on that level is scanned as
    /// one slice; after a re-layout the whole level is a single stretch.
    pub fn scan_hot_level(&self, depth: usize, needle: &T) -> Option<NodeId> {
        let payloads = self.storage.hot.payloads();
        let records = self.storage.hot.records();
        let on_level = |slot: usize| records[slot].valid && records[slot].depth as usize == depth;

        let mut start = 0;
        while start < records.len() {
            if !on_level(start) {
                start += 1;
                continue;
            }
            let mut end = start + 1;
            while end < records.len() && on_level(end) {
                end += 1;
            }
            if let Some(hit) = T::scan(&payloads[start..end], needle) {
                return Some(self.handle(records[start + hit].id));
            }
            start = end;
        }
        None
    }
}

impl<T> Default for NaryTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for NaryTree<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.iter_preorder().map(|visit| visit.payload))
            .finish()
    }
}
