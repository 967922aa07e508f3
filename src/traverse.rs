//! Breadth-first and preorder traversal across both tiers.
//!
//! A hot node's children are its hot run followed by the cold children of
//! its group, which is also the order they were added in.

use std::collections::VecDeque;

use crate::hot::INVALID_INDEX;
use crate::tree::{NaryTree, NodeId, Storage};

/// Traversal order for [`NaryTree::for_each`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    /// Level by level, siblings left to right.
    BreadthFirst,
    /// Node before its children, children left to right.
    Preorder,
    /// Physical storage order: hot slots lowest first, then cold nodes in
    /// insertion order. Not a tree order.
    Sequential,
}

/// A node yielded by a traversal.
#[derive(Debug)]
pub struct Visit<'a, T> {
    pub id: NodeId,
    pub payload: &'a T,
    /// 0-based level.
    pub depth: usize,
}

#[derive(Clone, Copy)]
enum Cursor {
    Hot(u32),
    /// Cold arena index.
    Cold(u32),
}

/// Shared state of both iterators.
struct Walker<'a, T> {
    tree: &'a NaryTree<T>,
    /// Hot slot -> cold group index, `INVALID_INDEX` when none.
    groups: Vec<u32>,
}

impl<'a, T> Walker<'a, T> {
    fn new(tree: &'a NaryTree<T>) -> Self {
        let storage: &Storage<T> = &tree.storage;
        let mut groups = vec![INVALID_INDEX; storage.hot.slots()];
        for (i, root) in storage.cold.roots().iter().enumerate() {
            groups[root.attach_index() as usize] = i as u32;
        }
        Self { tree, groups }
    }

    fn visit(&self, cursor: Cursor, depth: usize) -> Visit<'a, T> {
        let storage = &self.tree.storage;
        match cursor {
            Cursor::Hot(slot) => Visit {
                id: self.tree.handle(storage.hot.records()[slot as usize].id),
                payload: &storage.hot.payloads()[slot as usize],
                depth,
            },
            Cursor::Cold(index) => {
                let node = &storage.cold.nodes()[index as usize];
                Visit {
                    id: self.tree.handle(node.id()),
                    payload: node.payload(),
                    depth,
                }
            }
        }
    }

    fn children(&self, cursor: Cursor, mut f: impl FnMut(Cursor)) {
        let storage: &'a Storage<T> = &self.tree.storage;
        match cursor {
            Cursor::Hot(slot) => {
                for child in storage.hot.records()[slot as usize].children() {
                    f(Cursor::Hot(child));
                }
                let group = self.groups[slot as usize];
                if group != INVALID_INDEX {
                    for &node in storage.cold.roots()[group as usize].children() {
                        f(Cursor::Cold(node));
                    }
                }
            }
            Cursor::Cold(index) => {
                for &child in storage.cold.nodes()[index as usize].children() {
                    f(Cursor::Cold(child));
                }
            }
        }
    }
}

/// Level-order iterator.
pub struct BreadthFirst<'a, T> {
    walker: Walker<'a, T>,
    queue: VecDeque<(Cursor, usize)>,
}

impl<'a, T> Iterator for BreadthFirst<'a, T> {
    type Item = Visit<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        let (cursor, depth) = self.queue.pop_front()?;
        let queue = &mut self.queue;
        self.walker
            .children(cursor, |child| queue.push_back((child, depth + 1)));
        Some(self.walker.visit(cursor, depth))
    }
}

/// Preorder iterator.
pub struct Preorder<'a, T> {
    walker: Walker<'a, T>,
    stack: Vec<(Cursor, usize)>,
}

impl<'a, T> Iterator for Preorder<'a, T> {
    type Item = Visit<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        let (cursor, depth) = self.stack.pop()?;
        let mark = self.stack.len();
        let stack = &mut self.stack;
        self.walker
            .children(cursor, |child| stack.push((child, depth + 1)));
        self.stack[mark..].reverse();
        Some(self.walker.visit(cursor, depth))
    }
}

impl<T> NaryTree<T> {
    pub fn iter_breadth_first(&self) -> BreadthFirst<'_, T> {
        let mut queue = VecDeque::new();
        if !self.is_empty() {
            queue.push_back((Cursor::Hot(0), 0));
        }
        BreadthFirst {
            walker: Walker::new(self),
            queue,
        }
    }

    pub fn iter_preorder(&self) -> Preorder<'_, T> {
        let mut stack = Vec::new();
        if !self.is_empty() {
            stack.push((Cursor::Hot(0), 0));
        }
        Preorder {
            walker: Walker::new(self),
            stack,
        }
    }

    /// Every node in physical storage order, skipping vacated hot slots.
    pub fn iter_sequential(&self) -> impl Iterator<Item = Visit<'_, T>> + '_ {
        let storage = &self.storage;
        let hot = storage
            .hot
            .records()
            .iter()
            .zip(storage.hot.payloads())
            .filter(|(record, _)| record.valid)
            .map(move |(record, payload)| Visit {
                id: self.handle(record.id),
                payload,
                depth: record.depth as usize,
            });
        let cold = storage.cold.nodes().iter().map(move |node| Visit {
            id: self.handle(node.id()),
            payload: node.payload(),
            depth: storage.cold_depth(node.root(), node.level()),
        });
        hot.chain(cold)
    }

    /// Visit every node once in `order`.
    pub fn for_each<F>(&self, order: Order, mut visitor: F)
    where
        F: FnMut(Visit<'_, T>),
    {
        match order {
            Order::BreadthFirst => self.iter_breadth_first().for_each(&mut visitor),
            Order::Preorder => self.iter_preorder().for_each(&mut visitor),
            Order::Sequential => self.iter_sequential().for_each(&mut visitor),
        }
    }

    pub fn for_each_breadth_first<F>(&self, visitor: F)
    where
        F: FnMut(Visit<'_, T>),
    {
        self.for_each(Order::BreadthFirst, visitor);
    }

    pub fn for_each_preorder<F>(&self, visitor: F)
    where
        F: FnMut(Visit<'_, T>),
    {
        self.for_each(Order::Preorder, visitor);
    }

    pub fn for_each_sequential<F>(&self, visitor: F)
    where
        F: FnMut(Visit<'_, T>),
    {
        self.for_each(Order::Sequential, visitor);
    }
}
