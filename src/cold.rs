//! Cold tier: pointer-linked subtrees hanging off hot-tier slots.
//!
//! Each [`ColdRoot`] groups the cold children of one hot slot (its attach
//! index). Nodes live in one arena owned by the store and link to their
//! children by arena index; the only link back up is the parent's logical id,
//! which the engine resolves through its id table.

use crate::error::{Result, TreeError};

/// A cold-tier node.
#[derive(Debug)]
pub struct PointerNode<T> {
    payload: T,
    id: u32,
    /// Logical id of the parent. Non-owning.
    parent: u32,
    /// Group this node hangs under.
    root: u32,
    /// 1 for a direct child of the group.
    level: u32,
    /// Arena indices, in insertion order.
    children: Vec<u32>,
}

impl<T> PointerNode<T> {
    #[inline]
    pub fn payload(&self) -> &T {
        &self.payload
    }

    #[inline]
    pub fn payload_mut(&mut self) -> &mut T {
        &mut self.payload
    }

    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub fn parent(&self) -> u32 {
        self.parent
    }

    #[inline]
    pub fn root(&self) -> u32 {
        self.root
    }

    /// Levels below the attach slot.
    #[inline]
    pub fn level(&self) -> u32 {
        self.level
    }

    #[inline]
    pub fn children(&self) -> &[u32] {
        &self.children
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// The cold children of one hot-tier slot.
#[derive(Debug)]
pub struct ColdRoot {
    attach_index: u32,
    children: Vec<u32>,
}

impl ColdRoot {
    /// Hot-tier slot this group hangs from.
    #[inline]
    pub fn attach_index(&self) -> u32 {
        self.attach_index
    }

    /// Arena indices of the group's direct children.
    #[inline]
    pub fn children(&self) -> &[u32] {
        &self.children
    }
}

/// Where a new cold node is attached.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColdParent {
    /// Directly under a group.
    Group(u32),
    /// Under the cold node at this arena index.
    Node(u32),
}

/// Owner of every cold node of a tree.
pub struct SubtreeStore<T> {
    nodes: Vec<PointerNode<T>>,
    roots: Vec<ColdRoot>,
}

impl<T> SubtreeStore<T> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            roots: Vec::new(),
        }
    }

    /// Number of cold nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[inline]
    pub fn roots(&self) -> &[ColdRoot] {
        &self.roots
    }

    /// Every cold node, in insertion order.
    #[inline]
    pub fn nodes(&self) -> &[PointerNode<T>] {
        &self.nodes
    }

    /// Linear scan for the group attached to `attach_index`.
    pub fn find_root(&self, attach_index: u32) -> Option<u32> {
        self.roots
            .iter()
            .position(|root| root.attach_index == attach_index)
            .map(|i| i as u32)
    }

    pub fn find_or_create_root(&mut self, attach_index: u32) -> u32 {
        if let Some(root) = self.find_root(attach_index) {
            return root;
        }
        let root = self.roots.len() as u32;
        tracing::trace!(attach_index, root, "creating cold root");
        self.roots.push(ColdRoot {
            attach_index,
            children: Vec::new(),
        });
        root
    }

    /// Append a child under `at`, returning its arena index.
    pub fn add_child(&mut self, at: ColdParent, payload: T, id: u32, parent: u32) -> Result<u32> {
        let index = u32::try_from(self.nodes.len()).map_err(|_| TreeError::InvalidIndex {
            index: self.nodes.len(),
            len: u32::MAX as usize,
        })?;
        let (root, level) = match at {
            ColdParent::Group(root) => {
                let len = self.roots.len();
                let group = self.roots.get_mut(root as usize).ok_or(TreeError::InvalidIndex {
                    index: root as usize,
                    len,
                })?;
                group.children.push(index);
                (root, 1)
            }
            ColdParent::Node(at) => {
                let len = self.nodes.len();
                let node = self.nodes.get_mut(at as usize).ok_or(TreeError::InvalidIndex {
                    index: at as usize,
                    len,
                })?;
                node.children.push(index);
                (node.root, node.level + 1)
            }
        };
        self.nodes.push(PointerNode {
            payload,
            id,
            parent,
            root,
            level,
            children: Vec::new(),
        });
        Ok(index)
    }

    #[inline]
    pub fn get(&self, index: u32) -> Option<&PointerNode<T>> {
        self.nodes.get(index as usize)
    }

    #[inline]
    pub fn get_mut(&mut self, index: u32) -> Option<&mut PointerNode<T>> {
        self.nodes.get_mut(index as usize)
    }

    /// Point every group at its attach slot's new index after a hot re-layout.
    pub fn reattach(&mut self, old_to_new: &[u32]) {
        for root in &mut self.roots {
            root.attach_index = old_to_new[root.attach_index as usize];
        }
    }

    /// Follow a single hot slot that moved.
    pub fn reattach_one(&mut self, from: u32, to: u32) {
        if let Some(root) = self.roots.iter_mut().find(|root| root.attach_index == from) {
            root.attach_index = to;
        }
    }

    /// Number of levels in the tallest subtree below any group.
    pub fn height(&self) -> usize {
        self.nodes
            .iter()
            .map(|node| node.level as usize)
            .max()
            .unwrap_or(0)
    }

    pub fn memory_usage(&self) -> usize {
        let links = std::mem::size_of::<u32>();
        self.nodes.capacity() * std::mem::size_of::<PointerNode<T>>()
            + self.roots.capacity() * std::mem::size_of::<ColdRoot>()
            + self
                .nodes
                .iter()
                .map(|node| node.children.capacity() * links)
                .sum::<usize>()
            + self
                .roots
                .iter()
                .map(|root| root.children.capacity() * links)
                .sum::<usize>()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
    }

    pub fn shrink_to_fit(&mut self) {
        self.nodes.shrink_to_fit();
        self.roots.shrink_to_fit();
    }
}

impl<T> Default for SubtreeStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_or_create_root() {
        let mut s: SubtreeStore<u32> = SubtreeStore::new();
        let a = s.find_or_create_root(4);
        let b = s.find_or_create_root(9);
        assert_eq!(s.find_or_create_root(4), a);
        assert_ne!(a, b);
        assert_eq!(s.roots().len(), 2);
        assert_eq!(s.find_root(9), Some(1));
        assert_eq!(s.find_root(5), None);
        assert!(s.is_empty());
    }

    #[test]
    fn test_nested_children() {
        let mut s: SubtreeStore<&str> = SubtreeStore::new();
        let group = s.find_or_create_root(2);
        let x = s.add_child(ColdParent::Group(group), "x", 10, 2).unwrap();
        let y = s.add_child(ColdParent::Group(group), "y", 11, 2).unwrap();
        let x0 = s.add_child(ColdParent::Node(x), "x0", 12, 10).unwrap();

        assert_eq!(s.len(), 3);
        assert_eq!(s.roots()[group as usize].children(), &[x, y]);
        assert_eq!(s.get(x0).map(|n| *n.payload()), Some("x0"));
        assert_eq!(s.get(x0).map(|n| n.parent()), Some(10));
        assert_eq!(s.get(x0).map(|n| n.level()), Some(2));
        assert_eq!(s.get(x0).map(|n| n.root()), Some(group));
        assert_eq!(s.get(x).map(|n| n.children()), Some(&[x0][..]));
        assert!(s.get(y).unwrap().is_leaf());
        assert_eq!(s.height(), 2);

        *s.get_mut(y).unwrap().payload_mut() = "why";
        assert_eq!(s.get(y).map(|n| *n.payload()), Some("why"));
    }

    #[test]
    fn test_bad_parent() {
        let mut s: SubtreeStore<u32> = SubtreeStore::new();
        s.find_or_create_root(0);
        assert!(matches!(
            s.add_child(ColdParent::Node(3), 1, 1, 0),
            Err(TreeError::InvalidIndex { index: 3, len: 0 })
        ));
        assert!(matches!(
            s.add_child(ColdParent::Group(7), 1, 1, 0),
            Err(TreeError::InvalidIndex { index: 7, len: 1 })
        ));
        assert_eq!(s.len(), 0);
    }

    #[test]
    fn test_reattach() {
        let mut s: SubtreeStore<u32> = SubtreeStore::new();
        s.find_or_create_root(3);
        s.find_or_create_root(5);
        s.reattach(&[0, 1, 2, 1, 4, 2]);
        assert_eq!(s.roots()[0].attach_index(), 1);
        assert_eq!(s.roots()[1].attach_index(), 2);
        s.reattach_one(2, 8);
        assert_eq!(s.find_root(8), Some(1));
    }

    #[test]
    fn test_deep_chain_links_by_index() {
        let mut s: SubtreeStore<u32> = SubtreeStore::new();
        let group = s.find_or_create_root(0);
        let mut at = s.add_child(ColdParent::Group(group), 0, 1, 0).unwrap();
        for i in 1..200_000u32 {
            at = s.add_child(ColdParent::Node(at), i, i + 1, i).unwrap();
        }
        assert_eq!(s.len(), 200_000);
        assert_eq!(s.height(), 200_000);
        assert_eq!(s.get(at).map(|n| n.level()), Some(200_000));
        assert_eq!(s.get(at - 1).map(|n| n.children()), Some(&[at][..]));
        s.clear();
        assert!(s.is_empty());
        assert!(s.roots().is_empty());
    }
}
