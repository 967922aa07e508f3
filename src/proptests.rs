use crate::{NaryTree, NodeId, Order, Tier, TreeConfig};

use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;

use crate::balance::ceil_log;
use crate::config::DEFAULT_BRANCHING_FACTOR;
use crate::hot::INVALID_INDEX;
use crate::tree::Slot;

/// Check every structural invariant of both tiers and the id table.
fn validate_tree<T>(t: &NaryTree<T>) {
    let storage = &t.storage;
    let records = storage.hot.records();
    let config = t.config();

    assert_eq!(
        storage.hot.len() + storage.cold.len(),
        t.size(),
        "tier sizes must add up to the node count"
    );
    assert!(storage.hot.len() <= t.hot_capacity(), "hot tier over capacity");
    assert_eq!(
        records.iter().filter(|r| r.valid).count(),
        storage.hot.len(),
        "live hot count must match valid slots"
    );
    if t.is_empty() {
        assert!(records.is_empty());
        assert!(storage.cold.roots().is_empty());
        return;
    }
    assert!(records[0].valid && records[0].is_root(), "root must sit in slot 0");
    assert_eq!(records[0].id, 0, "root must have logical id 0");

    // Runs: in bounds, disjoint, and covering every valid non-root slot.
    let mut owner = vec![INVALID_INDEX; records.len()];
    for (index, record) in records.iter().enumerate() {
        if !record.valid {
            continue;
        }
        assert!(
            (record.depth as usize) < config.hot_depth_limit,
            "hot node below the depth limit"
        );
        for child in record.children() {
            let child = child as usize;
            assert!(child < records.len(), "run out of bounds");
            assert_eq!(owner[child], INVALID_INDEX, "runs overlap at slot {child}");
            owner[child] = index as u32;
            assert!(records[child].valid, "run covers a vacated slot");
            assert_eq!(records[child].parent, index as u32);
            assert_eq!(records[child].depth, record.depth + 1);
        }
    }
    for (index, record) in records.iter().enumerate().skip(1) {
        if record.valid {
            assert_ne!(owner[index], INVALID_INDEX, "orphan hot slot {index}");
        }
    }

    // Cold groups: distinct valid attach slots, back-links consistent.
    let mut attached = vec![false; records.len()];
    let mut cold_seen = 0usize;
    for root in storage.cold.roots() {
        let attach = root.attach_index() as usize;
        assert!(attach < records.len() && records[attach].valid, "dangling attach index");
        assert!(!attached[attach], "two groups on slot {attach}");
        attached[attach] = true;

        let attach_record = records[attach];
        if !root.children().is_empty() && (attach_record.depth as usize) + 1 < config.hot_depth_limit {
            assert_eq!(
                storage.hot.len(),
                t.hot_capacity(),
                "cold child of a shallow hot node while the hot tier has room"
            );
        }

        let mut stack: Vec<_> = root
            .children()
            .iter()
            .map(|&index| (index, attach_record.id, 1))
            .collect();
        while let Some((index, parent, level)) = stack.pop() {
            cold_seen += 1;
            let node = &storage.cold.nodes()[index as usize];
            assert_eq!(node.parent(), parent, "cold back-link mismatch");
            assert_eq!(node.level(), level, "cold level mismatch");
            assert_eq!(storage.slots[node.id() as usize], Slot::Cold(index));
            stack.extend(node.children().iter().map(|&child| (child, node.id(), level + 1)));
        }
    }
    assert_eq!(cold_seen, storage.cold.len(), "cold count must match reachable nodes");

    // Id table points at the node carrying that id.
    for (id, slot) in storage.slots.iter().enumerate() {
        match *slot {
            Slot::Hot(index) => {
                let record = records[index as usize];
                assert!(record.valid);
                assert_eq!(record.id as usize, id);
            }
            Slot::Cold(index) => {
                let node = storage.cold.get(index).expect("cold slot must resolve");
                assert_eq!(node.id() as usize, id);
            }
        }
    }
}

/// Plain reference tree: node `i` holds `payloads[i]` and `children[i]`.
#[derive(Clone, Debug, Default)]
struct Model {
    payloads: Vec<u32>,
    children: Vec<Vec<usize>>,
}

impl Model {
    fn add(&mut self, parent: Option<usize>, payload: u32) -> usize {
        let id = self.payloads.len();
        self.payloads.push(payload);
        self.children.push(Vec::new());
        if let Some(parent) = parent {
            self.children[parent].push(id);
        }
        id
    }

    fn breadth_first(&self) -> Vec<(u32, usize)> {
        let mut out = Vec::new();
        let mut queue = VecDeque::new();
        if !self.payloads.is_empty() {
            queue.push_back((0, 0));
        }
        while let Some((node, depth)) = queue.pop_front() {
            out.push((self.payloads[node], depth));
            queue.extend(self.children[node].iter().map(|&c| (c, depth + 1)));
        }
        out
    }

    fn preorder(&self) -> Vec<(u32, usize)> {
        let mut out = Vec::new();
        let mut stack = Vec::new();
        if !self.payloads.is_empty() {
            stack.push((0, 0));
        }
        while let Some((node, depth)) = stack.pop() {
            out.push((self.payloads[node], depth));
            stack.extend(self.children[node].iter().rev().map(|&c| (c, depth + 1)));
        }
        out
    }

    /// Mirror a tree, returning the handle of every model node.
    fn mirror(t: &NaryTree<u32>) -> (Model, Vec<NodeId>) {
        let mut model = Model::default();
        let mut handles = Vec::new();
        let mut queue = VecDeque::new();
        if let Some(root) = t.root() {
            queue.push_back((root, None));
        }
        while let Some((id, parent)) = queue.pop_front() {
            let node = model.add(parent, *t.get(id).unwrap());
            handles.push(id);
            for child in t.children(id).unwrap() {
                queue.push_back((child, Some(node)));
            }
        }
        (model, handles)
    }
}

fn snapshot(t: &NaryTree<u32>, order: Order) -> Vec<(u32, usize)> {
    let mut out = Vec::new();
    t.for_each(order, |visit| out.push((*visit.payload, visit.depth)));
    out
}

#[derive(Clone, Debug)]
enum Op {
    AddChild(usize, u32),
    SetPayload(usize, u32),
    Relayout,
    Balance(usize),
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    let op = prop_oneof![
        70 => (any::<usize>(), any::<u32>()).prop_map(|(p, v)| Op::AddChild(p, v)),
        15 => (any::<usize>(), any::<u32>()).prop_map(|(p, v)| Op::SetPayload(p, v)),
        5 => Just(Op::Relayout),
        10 => (2usize..6).prop_map(Op::Balance),
    ];
    prop::collection::vec(op, 0..=400)
}

fn config_strategy() -> impl Strategy<Value = TreeConfig> {
    (2usize..5, 1usize..5, prop_oneof![Just(0usize), Just(1), Just(7), Just(100)]).prop_map(
        |(b, limit, threshold)| {
            TreeConfig::default()
                .with_branching_factor(b)
                .with_hot_depth_limit(limit)
                .with_lazy_rebalance_threshold(threshold)
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(config in config_strategy(), root in any::<u32>(), ops in ops_strategy()) {
        let mut t: NaryTree<u32> = NaryTree::with_config(config).unwrap();
        let mut m = Model::default();
        let mut handles = vec![t.set_root(root)];
        m.add(None, root);

        for op in ops {
            match op {
                Op::AddChild(pick, payload) => {
                    let parent = pick % handles.len();
                    handles.push(t.add_child(handles[parent], payload).unwrap());
                    m.add(Some(parent), payload);
                }
                Op::SetPayload(pick, payload) => {
                    let node = pick % handles.len();
                    *t.get_mut(handles[node]).unwrap() = payload;
                    m.payloads[node] = payload;
                }
                Op::Relayout => t.optimize_layout(),
                Op::Balance(b) => {
                    let before = m.breadth_first();
                    t.balance_tree(b).unwrap();
                    let after = snapshot(&t, Order::BreadthFirst);
                    let payloads = |s: &[(u32, usize)]| s.iter().map(|&(p, _)| p).collect::<Vec<_>>();
                    prop_assert_eq!(payloads(&after[..]), payloads(&before[..]));
                    prop_assert!(t.depth() <= ceil_log(t.size(), b) + 1);
                    prop_assert!(t.get(handles[0]).is_err());
                    (m, handles) = Model::mirror(&t);
                    prop_assert!(m.children.iter().all(|c| c.len() <= b));
                }
            }
            prop_assert_eq!(t.size(), m.payloads.len());
        }

        validate_tree(&t);
        prop_assert_eq!(snapshot(&t, Order::BreadthFirst), m.breadth_first());
        prop_assert_eq!(snapshot(&t, Order::Preorder), m.preorder());
        prop_assert_eq!(t.depth(), m.breadth_first().last().map_or(0, |&(_, d)| d + 1));
        let mut sequential = snapshot(&t, Order::Sequential);
        let mut level_order = m.breadth_first();
        sequential.sort_unstable();
        level_order.sort_unstable();
        prop_assert_eq!(sequential, level_order);
        for (node, &id) in handles.iter().enumerate() {
            prop_assert_eq!(*t.get(id).unwrap(), m.payloads[node]);
            prop_assert_eq!(t.child_count(id).unwrap(), m.children[node].len());
        }

        let stats = t.get_statistics();
        prop_assert_eq!(stats.total_nodes, t.size());
        prop_assert_eq!(stats.leaf_nodes + stats.internal_nodes, t.size());
        let locality = t.locality_score();
        prop_assert!(locality > 0.0 && locality <= 1.0);
    }

    #[test]
    fn prop_succinct_round_trip(config in config_strategy(), ops in ops_strategy()) {
        let mut t: NaryTree<u32> = NaryTree::with_config(config).unwrap();
        let mut handles = vec![t.set_root(0)];
        for op in ops {
            if let Op::AddChild(pick, payload) = op {
                handles.push(t.add_child(handles[pick % handles.len()], payload).unwrap());
            }
        }

        let encoded = t.encode_succinct().unwrap();
        prop_assert_eq!(encoded.bit_len(), 2 * t.size());
        prop_assert_eq!(encoded.bits().filter(|&b| b).count(), t.size());

        let decoded = encoded.decode_with(config).unwrap();
        validate_tree(&decoded);
        prop_assert_eq!(snapshot(&decoded, Order::Preorder), snapshot(&t, Order::Preorder));
        prop_assert_eq!(decoded.encode_succinct().unwrap(), encoded);
    }

    #[test]
    fn prop_balance_idempotent(config in config_strategy(), ops in ops_strategy(), b in 2usize..6) {
        let mut t: NaryTree<u32> = NaryTree::with_config(config).unwrap();
        let mut handles = vec![t.set_root(0)];
        for op in ops {
            if let Op::AddChild(pick, payload) = op {
                handles.push(t.add_child(handles[pick % handles.len()], payload).unwrap());
            }
        }

        t.balance_tree(b).unwrap();
        validate_tree(&t);
        prop_assert!(!t.needs_rebalancing_for(b));
        if b == DEFAULT_BRANCHING_FACTOR {
            prop_assert!(!t.needs_rebalancing());
        }
        let once = snapshot(&t, Order::Preorder);
        t.balance_tree(b).unwrap();
        validate_tree(&t);
        prop_assert_eq!(snapshot(&t, Order::Preorder), once);
    }
}

#[test]
fn randomized_bulk_insert_with_rebalancing() {
    let mut rng = StdRng::seed_from_u64(0x6e61_7279);
    let mut t: NaryTree<u32> = NaryTree::new();
    let mut m = Model::default();
    let mut handles = vec![t.set_root(0)];
    m.add(None, 0);

    for i in 1..20_000u32 {
        // Bias toward recent nodes so the tree grows deep.
        let back = rng.gen_range(0..handles.len().min(8));
        let parent = handles.len() - 1 - back;
        handles.push(t.add_child(handles[parent], i).unwrap());
        m.add(Some(parent), i);

        if i % 5_000 == 0 && t.auto_balance_if_needed(3).unwrap() {
            (m, handles) = Model::mirror(&t);
        }
    }

    validate_tree(&t);
    assert_eq!(t.size(), 20_000);
    assert_eq!(snapshot(&t, Order::Preorder), m.preorder());

    t.balance_tree(4).unwrap();
    validate_tree(&t);
    assert!(t.depth() <= ceil_log(20_000, 4) + 1);
    assert_eq!(t.hybrid_stats().hot_nodes, t.hot_capacity().min(t.size()));
}

#[test]
fn scan_hot_matches_find_for_hot_nodes() {
    let mut rng = StdRng::seed_from_u64(7);
    let config = TreeConfig::default().with_hot_depth_limit(4);
    let mut t: NaryTree<u32> = NaryTree::with_config(config).unwrap();
    let mut handles = vec![t.set_root(0)];
    for i in 1..200u32 {
        let parent = handles[rng.gen_range(0..handles.len())];
        handles.push(t.add_child(parent, i).unwrap());
    }
    for &id in &handles {
        let value = *t.get(id).unwrap();
        let depth = t.node_depth(id).unwrap();
        match t.tier(id).unwrap() {
            Tier::Hot => {
                assert_eq!(t.scan_hot(&value), Some(id));
                assert_eq!(t.scan_hot_level(depth, &value), Some(id));
                assert_eq!(t.scan_hot_level(depth + 1, &value), None);
            }
            Tier::Cold => {
                assert_eq!(t.scan_hot(&value), None);
                assert_eq!(t.scan_hot_level(depth, &value), None);
            }
        }
        assert_eq!(t.find(&value), Some(id));
    }
}
