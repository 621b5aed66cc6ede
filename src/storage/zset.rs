use super::avl::{AvlTree, Comparator, NodeId};
use super::hash_table::HashTable;
use bytes::Bytes;

/// Members ordered by score.
///
/// `scores` answers point lookups, `tree` answers ordered walks. Every
/// mutation updates both before returning, so a member is in one iff it is
/// in the other with the same score.
#[derive(Debug, Clone)]
pub struct SortedSet {
    scores: HashTable<f32>,
    tree: AvlTree<Bytes>,
}

impl SortedSet {
    pub fn new() -> Self {
        Self::with_comparator(<Bytes as Ord>::cmp)
    }

    /// Use `cmp` to order members that share a score
    pub fn with_comparator(cmp: Comparator<Bytes>) -> Self {
        Self {
            scores: HashTable::new(),
            tree: AvlTree::with_comparator(cmp),
        }
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Add or re-score `member`. Returns true when the member is new.
    pub fn add(&mut self, member: impl Into<Bytes>, score: f32) -> bool {
        debug_assert!(!score.is_nan(), "NaN scores are rejected before reaching the set");
        let member = member.into();

        match self.scores.get(&member).copied() {
            Some(old) if old.to_bits() == score.to_bits() => false,
            Some(old) => {
                self.tree.delete(&member, old);
                self.tree.insert(member.clone(), score);
                self.scores.insert(member, score);
                false
            }
            None => {
                self.tree.insert(member.clone(), score);
                self.scores.insert(member, score);
                true
            }
        }
    }

    pub fn remove(&mut self, member: &[u8]) -> bool {
        match self.scores.remove_entry(member) {
            Some((member, score)) => {
                self.tree.delete(&member, score);
                true
            }
            None => false,
        }
    }

    pub fn score(&self, member: &[u8]) -> Option<f32> {
        self.scores.get(member).copied()
    }

    /// Zero-based ascending position of `member`
    pub fn rank(&self, member: &[u8]) -> Option<usize> {
        let score = self.score(member)?;
        self.tree
            .find(&Bytes::copy_from_slice(member), score)
            .map(|id| self.tree.rank(id))
    }

    /// Up to `count` members ascending, starting at the first score `>= min`
    pub fn range(&self, min: f32, count: usize) -> Vec<(Bytes, f32)> {
        self.walk(self.tree.first_at_or_above(min), count, |tree, id| {
            tree.successor(id)
        })
    }

    /// Up to `count` members descending, starting at the last score `<= max`
    pub fn rev_range(&self, max: f32, count: usize) -> Vec<(Bytes, f32)> {
        self.walk(self.tree.last_at_or_below(max), count, |tree, id| {
            tree.predecessor(id)
        })
    }

    fn walk(
        &self,
        start: Option<NodeId>,
        count: usize,
        step: impl Fn(&AvlTree<Bytes>, NodeId) -> Option<NodeId>,
    ) -> Vec<(Bytes, f32)> {
        let mut out = Vec::with_capacity(count.min(self.len()));
        let mut cur = start;
        while let Some(id) = cur {
            if out.len() == count {
                break;
            }
            out.push((self.tree.key(id).clone(), self.tree.score(id)));
            cur = step(&self.tree, id);
        }
        out
    }

    /// Ascending `(member, score)` iteration
    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, f32)> {
        self.tree.iter()
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        assert_eq!(self.tree.assert_invariants(), self.scores.len());
        for (member, score) in self.tree.iter() {
            assert_eq!(self.scores.get(member), Some(&score));
        }
    }
}

impl Default for SortedSet {
    fn default() -> Self {
        Self::new()
    }
}
