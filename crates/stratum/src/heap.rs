//! The recompute heap: a height-indexed bucket queue with O(1)
//! membership tests.
//!
//! Each bucket is a FIFO of nodes at one height; a hash index from node id
//! to bucket position makes removal and height fix-up cheap. The
//! stabilizer drains the heap minimum-height first, which guarantees a
//! node is recomputed only after all of its dependencies.

use std::collections::{HashMap, VecDeque};

use crate::ident::NodeId;
use crate::incr::NodeRef;

pub(crate) struct RecomputeHeap {
    /// The smallest bucket index that has nodes.
    min_height: usize,
    /// The largest bucket index that has nodes.
    max_height: usize,
    /// Buckets indexed by node height. Grown on demand; heights are
    /// unbounded as graphs deepen.
    buckets: Vec<VecDeque<NodeRef>>,
    /// Membership index: node id to the bucket it currently sits in.
    lookup: HashMap<NodeId, usize, ahash::RandomState>,
}

impl RecomputeHeap {
    pub(crate) fn new(initial_heights: usize) -> Self {
        RecomputeHeap {
            min_height: 0,
            max_height: 0,
            buckets: (0..initial_heights).map(|_| VecDeque::new()).collect(),
            lookup: HashMap::default(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.lookup.len()
    }

    #[allow(dead_code)]
    pub(crate) fn is_empty(&self) -> bool {
        self.lookup.is_empty()
    }

    #[allow(dead_code)]
    pub(crate) fn min_height(&self) -> usize {
        self.min_height
    }

    #[allow(dead_code)]
    pub(crate) fn max_height(&self) -> usize {
        self.max_height
    }

    pub(crate) fn has(&self, id: NodeId) -> bool {
        self.lookup.contains_key(&id)
    }

    /// Insert a node at its current height. Idempotent: a node already
    /// present is moved, which keeps at-most-one membership even when
    /// `set` runs repeatedly between stabilizations and heights move in
    /// the meantime.
    pub(crate) fn add(&mut self, node: NodeRef) {
        let id = node.meta().id();
        if let Some(height) = self.lookup.remove(&id) {
            self.remove_from_bucket(id, height);
        }
        self.add_at_current_height(node);
    }

    /// Remove a specific node. Returns false if it was not present.
    pub(crate) fn remove(&mut self, id: NodeId) -> bool {
        let Some(height) = self.lookup.remove(&id) else {
            return false;
        };
        self.remove_from_bucket(id, height);
        true
    }

    /// Pop one node from the minimum non-empty bucket.
    pub(crate) fn remove_min(&mut self) -> Option<NodeRef> {
        if self.lookup.is_empty() {
            return None;
        }
        let node = self.buckets[self.min_height].pop_front()?;
        self.lookup.remove(&node.meta().id());
        if self.buckets[self.min_height].is_empty() {
            self.advance_min_height();
        }
        Some(node)
    }

    /// Pop every node at the minimum height at once, as a snapshot.
    #[allow(dead_code)]
    pub(crate) fn remove_min_height(&mut self) -> Vec<NodeRef> {
        if self.lookup.is_empty() {
            return Vec::new();
        }
        let drained: Vec<NodeRef> = self.buckets[self.min_height].drain(..).collect();
        for node in &drained {
            self.lookup.remove(&node.meta().id());
        }
        self.advance_min_height();
        drained
    }

    /// Re-bucket a node whose height changed while it was enqueued.
    pub(crate) fn fix(&mut self, node: &NodeRef) {
        let id = node.meta().id();
        let Some(&height) = self.lookup.get(&id) else {
            return;
        };
        if height == node.meta().height() {
            return;
        }
        self.lookup.remove(&id);
        self.remove_from_bucket(id, height);
        self.add_at_current_height(node.clone());
    }

    //
    // utils
    //

    fn add_at_current_height(&mut self, node: NodeRef) {
        let id = node.meta().id();
        let height = node.meta().height();
        if self.lookup.is_empty() {
            self.min_height = height;
            self.max_height = height;
        } else {
            self.min_height = self.min_height.min(height);
            self.max_height = self.max_height.max(height);
        }
        if self.buckets.len() <= height {
            self.buckets.resize_with(height + 1, VecDeque::new);
        }
        self.buckets[height].push_back(node);
        self.lookup.insert(id, height);
    }

    fn remove_from_bucket(&mut self, id: NodeId, height: usize) {
        self.buckets[height].retain(|n| n.meta().id() != id);
        if height == self.min_height && self.buckets[height].is_empty() {
            self.advance_min_height();
        }
    }

    /// Move `min_height` to the next non-empty bucket, or reset to zero
    /// when the heap drained.
    fn advance_min_height(&mut self) {
        if self.lookup.is_empty() {
            self.min_height = 0;
            self.max_height = 0;
            return;
        }
        for height in self.min_height..=self.max_height {
            if !self.buckets[height].is_empty() {
                self.min_height = height;
                return;
            }
        }
        self.min_height = 0;
        self.max_height = 0;
    }

    /// Validate the bucket index of every live entry against its node's
    /// current height. Used by tests.
    #[cfg(test)]
    fn sanity_check(&self) {
        let mut total = 0;
        for (height, bucket) in self.buckets.iter().enumerate() {
            total += bucket.len();
            for node in bucket {
                assert_eq!(
                    node.meta().height(),
                    height,
                    "bucket {} holds node at height {}",
                    height,
                    node.meta().height()
                );
                assert_eq!(self.lookup.get(&node.meta().id()), Some(&height));
            }
        }
        assert_eq!(total, self.lookup.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{map, var, Graph};

    fn nodes_at_heights(heights: &[usize]) -> (Graph, Vec<NodeRef>) {
        let g = Graph::new();
        let nodes = heights
            .iter()
            .map(|&h| {
                let node = var(&g, 0u64).incr().erased().clone();
                node.meta().set_height(h);
                node
            })
            .collect();
        (g, nodes)
    }

    #[test]
    fn test_add_remove_min() {
        let (_g, nodes) = nodes_at_heights(&[2, 0, 1, 0]);
        let mut heap = RecomputeHeap::new(4);
        for n in &nodes {
            heap.add(n.clone());
        }
        heap.sanity_check();
        assert_eq!(heap.len(), 4);
        assert_eq!(heap.min_height(), 0);
        assert_eq!(heap.max_height(), 2);

        // FIFO within a bucket: the two height-0 nodes pop in insertion order
        let first = heap.remove_min().unwrap();
        assert_eq!(first.meta().id(), nodes[1].meta().id());
        let second = heap.remove_min().unwrap();
        assert_eq!(second.meta().id(), nodes[3].meta().id());
        assert_eq!(heap.min_height(), 1);

        let third = heap.remove_min().unwrap();
        assert_eq!(third.meta().id(), nodes[2].meta().id());
        let fourth = heap.remove_min().unwrap();
        assert_eq!(fourth.meta().id(), nodes[0].meta().id());
        assert!(heap.remove_min().is_none());
        assert_eq!(heap.min_height(), 0);
        heap.sanity_check();
    }

    #[test]
    fn test_add_is_idempotent() {
        let (_g, nodes) = nodes_at_heights(&[1]);
        let mut heap = RecomputeHeap::new(4);
        heap.add(nodes[0].clone());
        heap.add(nodes[0].clone());
        assert_eq!(heap.len(), 1);
        heap.sanity_check();
    }

    #[test]
    fn test_remove_advances_min_height() {
        let (_g, nodes) = nodes_at_heights(&[0, 3]);
        let mut heap = RecomputeHeap::new(4);
        heap.add(nodes[0].clone());
        heap.add(nodes[1].clone());
        assert!(heap.remove(nodes[0].meta().id()));
        assert_eq!(heap.min_height(), 3);
        assert!(!heap.remove(nodes[0].meta().id()));
        assert!(heap.remove(nodes[1].meta().id()));
        assert!(heap.is_empty());
        assert_eq!(heap.min_height(), 0);
        heap.sanity_check();
    }

    #[test]
    fn test_remove_min_height_pops_whole_level() {
        let (_g, nodes) = nodes_at_heights(&[1, 1, 1, 2]);
        let mut heap = RecomputeHeap::new(4);
        for n in &nodes {
            heap.add(n.clone());
        }
        let level = heap.remove_min_height();
        assert_eq!(level.len(), 3);
        assert_eq!(heap.len(), 1);
        assert_eq!(heap.min_height(), 2);
        heap.sanity_check();
    }

    #[test]
    fn test_fix_rebuckets_on_height_change() {
        let (_g, nodes) = nodes_at_heights(&[1, 1]);
        let mut heap = RecomputeHeap::new(4);
        heap.add(nodes[0].clone());
        heap.add(nodes[1].clone());

        nodes[0].meta().set_height(5);
        heap.fix(&nodes[0]);
        heap.sanity_check();
        assert_eq!(heap.max_height(), 5);

        let first = heap.remove_min().unwrap();
        assert_eq!(first.meta().id(), nodes[1].meta().id());
        let second = heap.remove_min().unwrap();
        assert_eq!(second.meta().id(), nodes[0].meta().id());
    }

    #[test]
    fn test_buckets_grow_past_initial_capacity() {
        let (_g, nodes) = nodes_at_heights(&[40]);
        let mut heap = RecomputeHeap::new(4);
        heap.add(nodes[0].clone());
        assert_eq!(heap.min_height(), 40);
        assert_eq!(heap.len(), 1);
        heap.sanity_check();
    }

    #[test]
    fn test_graph_heap_integration() {
        let g = Graph::new();
        let v = var(&g, 1u64);
        let m = map(&g, &v, |x: &u64| x + 1);
        let _o = g.observe(&m).unwrap();
        // the map and the observer are stale; the untouched var is not
        assert_eq!(g.recompute_heap_len(), 2);
        g.stabilize().unwrap();
        assert_eq!(g.recompute_heap_len(), 0);
        v.set(2);
        assert_eq!(g.recompute_heap_len(), 1);
    }
}
