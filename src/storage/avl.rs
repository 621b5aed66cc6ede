//! Height-balanced binary search tree ordered by `(score, secondary index)`.
//!
//! Nodes live in a slot arena and link to each other by [`NodeId`]. The
//! parent link is only used to walk back towards the root while rebalancing
//! and when stepping to a successor or predecessor. Every node caches its
//! height and subtree size; both are recomputed on the path from a mutated
//! node up to the root.
//!
//! The secondary index orders members that share a score. Its comparator is
//! chosen per tree (see [`AvlTree::with_comparator`]) and must be a strict
//! total order under which only equal indices compare `Equal`.
//!
//! A `NodeId` is valid until the next mutation of the tree: deleting a node
//! with two children moves its successor's payload into it.

use std::cmp::Ordering;

pub type NodeId = usize;

/// Orders two secondary indices that share a score
pub type Comparator<K> = fn(&K, &K) -> Ordering;

#[derive(Debug, Clone)]
struct Node<K> {
    key: K,
    score: f32,
    height: u32,
    size: usize,
    left: Option<NodeId>,
    right: Option<NodeId>,
    parent: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct AvlTree<K> {
    slots: Vec<Option<Node<K>>>,
    free: Vec<NodeId>,
    root: Option<NodeId>,
    cmp: Comparator<K>,
}

impl<K: Ord> AvlTree<K> {
    pub fn new() -> Self {
        Self::with_comparator(<K as Ord>::cmp)
    }
}

impl<K: Ord> Default for AvlTree<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> AvlTree<K> {
    pub fn with_comparator(cmp: Comparator<K>) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: None,
            cmp,
        }
    }

    pub fn len(&self) -> usize {
        self.size(self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn key(&self, id: NodeId) -> &K {
        &self.node(id).key
    }

    pub fn score(&self, id: NodeId) -> f32 {
        self.node(id).score
    }

    fn node(&self, id: NodeId) -> &Node<K> {
        self.slots[id].as_ref().expect("tree link points at a free slot")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node<K> {
        self.slots[id].as_mut().expect("tree link points at a free slot")
    }

    fn height(&self, id: Option<NodeId>) -> u32 {
        id.map_or(0, |id| self.node(id).height)
    }

    fn size(&self, id: Option<NodeId>) -> usize {
        id.map_or(0, |id| self.node(id).size)
    }

    fn order(&self, score: f32, key: &K, id: NodeId) -> Ordering {
        let node = self.node(id);
        score
            .total_cmp(&node.score)
            .then_with(|| (self.cmp)(key, &node.key))
    }

    fn alloc(&mut self, node: Node<K>) -> NodeId {
        match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(node);
                id
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        }
    }

    fn release(&mut self, id: NodeId) {
        self.slots[id] = None;
        self.free.push(id);
    }

    fn update(&mut self, id: NodeId) {
        let (left, right) = {
            let node = self.node(id);
            (node.left, node.right)
        };
        let height = 1 + self.height(left).max(self.height(right));
        let size = 1 + self.size(left) + self.size(right);
        let node = self.node_mut(id);
        node.height = height;
        node.size = size;
    }

    /// Point `parent`'s link (or the root) that referenced `old` at `new`
    fn replace_child(&mut self, parent: Option<NodeId>, old: NodeId, new: Option<NodeId>) {
        match parent {
            None => self.root = new,
            Some(p) => {
                let node = self.node_mut(p);
                if node.left == Some(old) {
                    node.left = new;
                } else {
                    node.right = new;
                }
            }
        }
    }

    fn rotate_left(&mut self, x: NodeId) -> NodeId {
        let y = self.node(x).right.expect("rotate_left without right child");
        let inner = self.node(y).left;
        let parent = self.node(x).parent;

        self.node_mut(x).right = inner;
        if let Some(inner) = inner {
            self.node_mut(inner).parent = Some(x);
        }

        self.node_mut(y).parent = parent;
        self.replace_child(parent, x, Some(y));

        self.node_mut(y).left = Some(x);
        self.node_mut(x).parent = Some(y);

        self.update(x);
        self.update(y);
        y
    }

    fn rotate_right(&mut self, x: NodeId) -> NodeId {
        let y = self.node(x).left.expect("rotate_right without left child");
        let inner = self.node(y).right;
        let parent = self.node(x).parent;

        self.node_mut(x).left = inner;
        if let Some(inner) = inner {
            self.node_mut(inner).parent = Some(x);
        }

        self.node_mut(y).parent = parent;
        self.replace_child(parent, x, Some(y));

        self.node_mut(y).right = Some(x);
        self.node_mut(x).parent = Some(y);

        self.update(x);
        self.update(y);
        y
    }

    /// Restore the balance of the subtree rooted at `id`, returning its new root
    fn rebalance(&mut self, id: NodeId) -> NodeId {
        self.update(id);
        let (left, right) = {
            let node = self.node(id);
            (node.left, node.right)
        };
        let balance = self.height(left) as i64 - self.height(right) as i64;

        if balance > 1 {
            let left = left.expect("left-heavy node without left child");
            let (ll, lr) = (self.node(left).left, self.node(left).right);
            if self.height(ll) < self.height(lr) {
                self.rotate_left(left);
            }
            return self.rotate_right(id);
        }

        if balance < -1 {
            let right = right.expect("right-heavy node without right child");
            let (rl, rr) = (self.node(right).left, self.node(right).right);
            if self.height(rr) < self.height(rl) {
                self.rotate_right(right);
            }
            return self.rotate_left(id);
        }

        id
    }

    fn fix_upwards(&mut self, start: Option<NodeId>) {
        let mut cur = start;
        while let Some(id) = cur {
            let top = self.rebalance(id);
            cur = self.node(top).parent;
        }
    }

    /// Insert `(key, score)`. An identical pair already in the tree is left
    /// alone and its node returned.
    pub fn insert(&mut self, key: K, score: f32) -> NodeId {
        let mut parent = None;
        let mut go_left = false;
        let mut cur = self.root;

        while let Some(id) = cur {
            match self.order(score, &key, id) {
                Ordering::Less => {
                    parent = Some(id);
                    go_left = true;
                    cur = self.node(id).left;
                }
                Ordering::Greater => {
                    parent = Some(id);
                    go_left = false;
                    cur = self.node(id).right;
                }
                Ordering::Equal => return id,
            }
        }

        let id = self.alloc(Node {
            key,
            score,
            height: 1,
            size: 1,
            left: None,
            right: None,
            parent,
        });

        match parent {
            None => self.root = Some(id),
            Some(p) if go_left => self.node_mut(p).left = Some(id),
            Some(p) => self.node_mut(p).right = Some(id),
        }

        self.fix_upwards(parent);
        id
    }

    /// Locate the node holding exactly `(key, score)`
    pub fn find(&self, key: &K, score: f32) -> Option<NodeId> {
        let mut cur = self.root;
        while let Some(id) = cur {
            cur = match self.order(score, key, id) {
                Ordering::Less => self.node(id).left,
                Ordering::Greater => self.node(id).right,
                Ordering::Equal => return Some(id),
            };
        }
        None
    }

    /// Remove `(key, score)`; returns whether it was present
    pub fn delete(&mut self, key: &K, score: f32) -> bool {
        let Some(id) = self.find(key, score) else {
            return false;
        };

        let target = match (self.node(id).left, self.node(id).right) {
            (Some(_), Some(right)) => {
                let successor = self.leftmost(right);
                self.swap_payload(id, successor);
                successor
            }
            _ => id,
        };

        let (child, parent) = {
            let node = self.node(target);
            (node.left.or(node.right), node.parent)
        };
        if let Some(child) = child {
            self.node_mut(child).parent = parent;
        }
        self.replace_child(parent, target, child);
        self.release(target);

        self.fix_upwards(parent);
        true
    }

    fn swap_payload(&mut self, a: NodeId, b: NodeId) {
        let (lo, hi) = (a.min(b), a.max(b));
        let (head, tail) = self.slots.split_at_mut(hi);
        let first = head[lo].as_mut().expect("tree link points at a free slot");
        let second = tail[0].as_mut().expect("tree link points at a free slot");
        std::mem::swap(&mut first.key, &mut second.key);
        std::mem::swap(&mut first.score, &mut second.score);
    }

    fn leftmost(&self, mut id: NodeId) -> NodeId {
        while let Some(left) = self.node(id).left {
            id = left;
        }
        id
    }

    fn rightmost(&self, mut id: NodeId) -> NodeId {
        while let Some(right) = self.node(id).right {
            id = right;
        }
        id
    }

    pub fn first(&self) -> Option<NodeId> {
        self.root.map(|root| self.leftmost(root))
    }

    pub fn last(&self) -> Option<NodeId> {
        self.root.map(|root| self.rightmost(root))
    }

    /// First node in order whose score equals `score`
    pub fn search_by_score(&self, score: f32) -> Option<NodeId> {
        self.first_at_or_above(score)
            .filter(|&id| self.node(id).score.total_cmp(&score) == Ordering::Equal)
    }

    /// First node in order whose score is `>= score`
    pub fn first_at_or_above(&self, score: f32) -> Option<NodeId> {
        let mut best = None;
        let mut cur = self.root;
        while let Some(id) = cur {
            let node = self.node(id);
            if node.score.total_cmp(&score) != Ordering::Less {
                best = Some(id);
                cur = node.left;
            } else {
                cur = node.right;
            }
        }
        best
    }

    /// Last node in order whose score is `<= score`
    pub fn last_at_or_below(&self, score: f32) -> Option<NodeId> {
        let mut best = None;
        let mut cur = self.root;
        while let Some(id) = cur {
            let node = self.node(id);
            if node.score.total_cmp(&score) != Ordering::Greater {
                best = Some(id);
                cur = node.right;
            } else {
                cur = node.left;
            }
        }
        best
    }

    pub fn successor(&self, id: NodeId) -> Option<NodeId> {
        if let Some(right) = self.node(id).right {
            return Some(self.leftmost(right));
        }
        let mut child = id;
        let mut parent = self.node(id).parent;
        while let Some(p) = parent {
            if self.node(p).right != Some(child) {
                return Some(p);
            }
            child = p;
            parent = self.node(p).parent;
        }
        None
    }

    pub fn predecessor(&self, id: NodeId) -> Option<NodeId> {
        if let Some(left) = self.node(id).left {
            return Some(self.rightmost(left));
        }
        let mut child = id;
        let mut parent = self.node(id).parent;
        while let Some(p) = parent {
            if self.node(p).left != Some(child) {
                return Some(p);
            }
            child = p;
            parent = self.node(p).parent;
        }
        None
    }

    /// Zero-based position of `id` in ascending order
    pub fn rank(&self, id: NodeId) -> usize {
        let mut rank = self.size(self.node(id).left);
        let mut child = id;
        let mut parent = self.node(id).parent;
        while let Some(p) = parent {
            let node = self.node(p);
            if node.right == Some(child) {
                rank += self.size(node.left) + 1;
            }
            child = p;
            parent = node.parent;
        }
        rank
    }

    /// Drop every node
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.root = None;
    }

    /// Ascending `(key, score)` iteration
    pub fn iter(&self) -> Iter<'_, K> {
        Iter {
            tree: self,
            cur: self.first(),
        }
    }

    /// Check every structural invariant, returning the in-order node count
    #[cfg(test)]
    pub(crate) fn assert_invariants(&self) -> usize {
        fn walk<K>(tree: &AvlTree<K>, id: NodeId, parent: Option<NodeId>) -> (u32, usize) {
            let node = tree.node(id);
            assert_eq!(node.parent, parent, "parent link mismatch at {}", id);
            let (lh, ls) = node.left.map_or((0, 0), |l| walk(tree, l, Some(id)));
            let (rh, rs) = node.right.map_or((0, 0), |r| walk(tree, r, Some(id)));
            assert!((lh as i64 - rh as i64).abs() <= 1, "unbalanced at {}", id);
            assert_eq!(node.height, 1 + lh.max(rh), "stale height at {}", id);
            assert_eq!(node.size, 1 + ls + rs, "stale size at {}", id);
            (node.height, node.size)
        }

        let count = self.root.map_or(0, |root| walk(self, root, None).1);

        let mut prev: Option<NodeId> = None;
        let mut cur = self.first();
        let mut seen = 0;
        while let Some(id) = cur {
            if let Some(p) = prev {
                let prev_node = self.node(p);
                assert_eq!(
                    self.order(prev_node.score, &prev_node.key, id),
                    Ordering::Less,
                    "in-order traversal is not strictly increasing"
                );
            }
            prev = Some(id);
            cur = self.successor(id);
            seen += 1;
        }
        assert_eq!(seen, count);
        count
    }
}

pub struct Iter<'a, K> {
    tree: &'a AvlTree<K>,
    cur: Option<NodeId>,
}

impl<'a, K> Iterator for Iter<'a, K> {
    type Item = (&'a K, f32);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cur?;
        self.cur = self.tree.successor(id);
        let node = self.tree.node(id);
        Some((&node.key, node.score))
    }
}
