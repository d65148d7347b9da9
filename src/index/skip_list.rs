//! Randomized skip list over `BsonValue` keys, arena-backed by a `Vec` of
//! nodes (indices stand in for the page-resident `PageAddress` the pager
//! would use once index pages are wired through the buffer pool — see
//! `IndexNode::data` for the payload address that *does* round-trip through
//! a live page).
//!
//! Grounded directly on the index-node shape named by spec §3/§4.4: no
//! existing Rust skip list in the pack to imitate, so the level-generation
//! and traversal rules follow the spec's own description.

use rand::Rng;
use std::cmp::Ordering;

use crate::bson::BsonValue;
use crate::common::config::{MAX_INDEX_KEY_LENGTH, MAX_SKIP_LIST_LEVEL};
use crate::common::{Collation, Error, PageAddress, Result};

/// Forward/backward neighbor at one level of a node.
#[derive(Debug, Clone, Copy, Default)]
struct IndexNodeLevel {
    prev: Option<usize>,
    next: Option<usize>,
}

/// One key in the skip list.
#[derive(Debug, Clone)]
pub struct IndexNode {
    pub key: BsonValue,
    pub data: PageAddress,
    levels: Vec<IndexNodeLevel>,
}

impl IndexNode {
    pub fn level(&self) -> usize {
        self.levels.len()
    }
}

/// Pick a level via repeated coin flips (geometric distribution, base 2),
/// capped at `MAX_SKIP_LIST_LEVEL`.
fn random_level(rng: &mut impl Rng) -> usize {
    let mut level = 1;
    while level < MAX_SKIP_LIST_LEVEL && rng.gen_bool(0.5) {
        level += 1;
    }
    level
}

fn key_size(key: &BsonValue) -> usize {
    match key {
        BsonValue::String(s) => s.len(),
        BsonValue::Binary(b) => b.len(),
        BsonValue::Vector(v) => v.len() * 4,
        _ => std::mem::size_of::<BsonValue>(),
    }
}

/// A single skip-list index: a sentinel head node plus an arena of real
/// nodes, ordered by `key` under the index's collation.
pub struct SkipList {
    collation: Collation,
    unique: bool,
    nodes: Vec<Option<IndexNode>>,
    head_levels: Vec<Option<usize>>,
    len: usize,
}

impl SkipList {
    pub fn new(collation: Collation, unique: bool) -> Self {
        Self {
            collation,
            unique,
            nodes: Vec::new(),
            head_levels: vec![None; MAX_SKIP_LIST_LEVEL],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn compare(&self, a: &BsonValue, b: &BsonValue) -> Ordering {
        a.compare(b, &self.collation)
    }

    fn node(&self, idx: usize) -> &IndexNode {
        self.nodes[idx].as_ref().expect("dangling skip-list index")
    }

    fn node_mut(&mut self, idx: usize) -> &mut IndexNode {
        self.nodes[idx].as_mut().expect("dangling skip-list index")
    }

    /// For each level, the rightmost node whose key is strictly less than
    /// `key` (the standard skip-list search), returned highest level first.
    fn find_predecessors(&self, key: &BsonValue) -> Vec<Option<usize>> {
        let mut preds = vec![None; MAX_SKIP_LIST_LEVEL];
        let mut current: Option<usize> = None;

        for level in (0..MAX_SKIP_LIST_LEVEL).rev() {
            let mut cursor = current;
            loop {
                let next = match cursor {
                    Some(idx) => self.node(idx).levels.get(level).and_then(|l| l.next),
                    None => self.head_levels[level],
                };
                match next {
                    Some(idx) if self.compare(&self.node(idx).key, key) == Ordering::Less => {
                        cursor = Some(idx);
                    }
                    _ => break,
                }
            }
            preds[level] = cursor;
            current = cursor;
        }
        preds
    }

    fn next_at(&self, of: Option<usize>, level: usize) -> Option<usize> {
        match of {
            Some(idx) => self.node(idx).levels.get(level).and_then(|l| l.next),
            None => self.head_levels.get(level).copied().flatten(),
        }
    }

    /// Find the first node matching `key` exactly, if any.
    pub fn find(&self, key: &BsonValue) -> Option<&IndexNode> {
        let preds = self.find_predecessors(key);
        let candidate = self.next_at(preds[0], 0)?;
        if self.compare(&self.node(candidate).key, key) == Ordering::Equal {
            Some(self.node(candidate))
        } else {
            None
        }
    }

    /// Insert a new key/data pair. Rejects keys over
    /// `MAX_INDEX_KEY_LENGTH` bytes, and duplicates when `unique` is set.
    pub fn insert(&mut self, key: BsonValue, data: PageAddress, rng: &mut impl Rng) -> Result<usize> {
        let size = key_size(&key);
        if size > MAX_INDEX_KEY_LENGTH {
            return Err(Error::IndexKeyTooLong(size, MAX_INDEX_KEY_LENGTH));
        }
        if self.unique {
            if let Some(existing) = self.find(&key) {
                return Err(Error::IndexKeyAlreadyExists(format!("{existing:?}", existing = existing.key)));
            }
        }

        let level = random_level(rng);
        let preds = self.find_predecessors(&key);

        let new_idx = self.nodes.len();
        self.nodes.push(Some(IndexNode {
            key,
            data,
            levels: vec![IndexNodeLevel::default(); level],
        }));

        for l in 0..level {
            let pred = preds[l];
            let next = self.next_at(pred, l);

            self.node_mut(new_idx).levels[l] = IndexNodeLevel { prev: pred, next };

            if let Some(next_idx) = next {
                if let Some(level_slot) = self.node_mut(next_idx).levels.get_mut(l) {
                    level_slot.prev = Some(new_idx);
                }
            }
            match pred {
                Some(pred_idx) => self.node_mut(pred_idx).levels[l].next = Some(new_idx),
                None => self.head_levels[l] = Some(new_idx),
            }
        }

        self.len += 1;
        Ok(new_idx)
    }

    /// Remove every node whose key compares equal to `key` under this
    /// index's collation. Returns how many nodes were removed (normally 0
    /// or 1, more if a non-unique index holds several identical keys).
    pub fn delete(&mut self, key: &BsonValue) -> usize {
        let mut removed = 0;
        loop {
            let preds = self.find_predecessors(key);
            let Some(target) = self.next_at(preds[0], 0) else {
                break;
            };
            if self.compare(&self.node(target).key, key) != Ordering::Equal {
                break;
            }
            self.unlink(target);
            removed += 1;
        }
        removed
    }

    /// Remove the one node whose key compares equal to `key` *and* whose
    /// stored address is `addr`, leaving every other node with the same
    /// key untouched. This is the form a document update/delete needs: a
    /// non-unique index can hold several nodes sharing a key, and only the
    /// one belonging to this document's address should go. Returns
    /// whether a matching node was found.
    pub fn delete_address(&mut self, key: &BsonValue, addr: PageAddress) -> bool {
        let preds = self.find_predecessors(key);
        let mut cursor = self.next_at(preds[0], 0);
        while let Some(idx) = cursor {
            let node = self.node(idx);
            if self.compare(&node.key, key) != Ordering::Equal {
                break;
            }
            if node.data == addr {
                self.unlink(idx);
                return true;
            }
            cursor = self.next_at(Some(idx), 0);
        }
        false
    }

    fn unlink(&mut self, idx: usize) {
        let level = self.node(idx).level();
        for l in 0..level {
            let IndexNodeLevel { prev, next } = self.node(idx).levels[l];
            match prev {
                Some(p) => self.node_mut(p).levels[l].next = next,
                None => self.head_levels[l] = next,
            }
            if let Some(n) = next {
                self.node_mut(n).levels[l].prev = prev;
            }
        }
        self.nodes[idx] = None;
        self.len -= 1;
    }

    /// In-order keys from `from` to `to`, `inclusive` controlling whether
    /// the endpoints themselves are included.
    pub fn range(&self, from: &BsonValue, to: &BsonValue, inclusive: (bool, bool)) -> Vec<&IndexNode> {
        let preds = self.find_predecessors(from);
        let mut cursor = self.next_at(preds[0], 0);
        let mut out = Vec::new();

        while let Some(idx) = cursor {
            let node = self.node(idx);
            let cmp_from = self.compare(&node.key, from);
            let cmp_to = self.compare(&node.key, to);

            let below_from = cmp_from == Ordering::Less
                || (cmp_from == Ordering::Equal && !inclusive.0);
            if below_from {
                cursor = self.next_at(Some(idx), 0);
                continue;
            }

            let past_to = cmp_to == Ordering::Greater
                || (cmp_to == Ordering::Equal && !inclusive.1);
            if past_to {
                break;
            }

            out.push(node);
            cursor = self.next_at(Some(idx), 0);
        }
        out
    }

    /// All keys in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = &IndexNode> {
        std::iter::successors(self.next_at(None, 0), move |idx| self.next_at(Some(*idx), 0))
            .map(move |idx| self.node(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> impl Rng {
        rand::rngs::StdRng::seed_from_u64(42)
    }

    fn addr(n: u32) -> PageAddress {
        PageAddress::new(crate::common::PageId::new(n), 0)
    }

    #[test]
    fn test_insert_and_find() {
        let mut list = SkipList::new(Collation::Binary, false);
        let mut r = rng();
        list.insert(BsonValue::Int32(5), addr(1), &mut r).unwrap();
        list.insert(BsonValue::Int32(2), addr(2), &mut r).unwrap();
        list.insert(BsonValue::Int32(9), addr(3), &mut r).unwrap();

        assert_eq!(list.find(&BsonValue::Int32(2)).unwrap().data, addr(2));
        assert!(list.find(&BsonValue::Int32(100)).is_none());
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_iter_is_sorted() {
        let mut list = SkipList::new(Collation::Binary, false);
        let mut r = rng();
        for v in [5, 1, 9, 3, 7] {
            list.insert(BsonValue::Int32(v), addr(v as u32), &mut r).unwrap();
        }
        let keys: Vec<i32> = list
            .iter()
            .map(|n| match n.key {
                BsonValue::Int32(v) => v,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(keys, vec![1, 3, 5, 7, 9]);
    }

    #[test]
    fn test_unique_rejects_duplicate() {
        let mut list = SkipList::new(Collation::Binary, true);
        let mut r = rng();
        list.insert(BsonValue::Int32(1), addr(1), &mut r).unwrap();
        let err = list.insert(BsonValue::Int32(1), addr(2), &mut r).unwrap_err();
        assert!(matches!(err, Error::IndexKeyAlreadyExists(_)));
    }

    #[test]
    fn test_non_unique_allows_duplicate() {
        let mut list = SkipList::new(Collation::Binary, false);
        let mut r = rng();
        list.insert(BsonValue::Int32(1), addr(1), &mut r).unwrap();
        list.insert(BsonValue::Int32(1), addr(2), &mut r).unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_key_too_long_rejected() {
        let mut list = SkipList::new(Collation::Binary, false);
        let mut r = rng();
        let long_string = "x".repeat(MAX_INDEX_KEY_LENGTH + 1);
        let err = list
            .insert(BsonValue::String(long_string), addr(1), &mut r)
            .unwrap_err();
        assert!(matches!(err, Error::IndexKeyTooLong(_, _)));
    }

    #[test]
    fn test_delete_removes_node() {
        let mut list = SkipList::new(Collation::Binary, false);
        let mut r = rng();
        list.insert(BsonValue::Int32(1), addr(1), &mut r).unwrap();
        list.insert(BsonValue::Int32(2), addr(2), &mut r).unwrap();
        assert_eq!(list.delete(&BsonValue::Int32(1)), 1);
        assert!(list.find(&BsonValue::Int32(1)).is_none());
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_delete_address_only_removes_matching_node() {
        let mut list = SkipList::new(Collation::Binary, false);
        let mut r = rng();
        list.insert(BsonValue::Int32(1), addr(1), &mut r).unwrap();
        list.insert(BsonValue::Int32(1), addr(2), &mut r).unwrap();
        list.insert(BsonValue::Int32(1), addr(3), &mut r).unwrap();

        assert!(list.delete_address(&BsonValue::Int32(1), addr(2)));
        assert_eq!(list.len(), 2);

        let remaining: Vec<PageAddress> = list.iter().map(|n| n.data).collect();
        assert!(remaining.contains(&addr(1)));
        assert!(remaining.contains(&addr(3)));
        assert!(!remaining.contains(&addr(2)));
    }

    #[test]
    fn test_delete_address_missing_returns_false() {
        let mut list = SkipList::new(Collation::Binary, false);
        let mut r = rng();
        list.insert(BsonValue::Int32(1), addr(1), &mut r).unwrap();
        assert!(!list.delete_address(&BsonValue::Int32(1), addr(99)));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_range_inclusive_and_exclusive() {
        let mut list = SkipList::new(Collation::Binary, false);
        let mut r = rng();
        for v in 1..=10 {
            list.insert(BsonValue::Int32(v), addr(v as u32), &mut r).unwrap();
        }
        let inclusive = list.range(&BsonValue::Int32(3), &BsonValue::Int32(6), (true, true));
        assert_eq!(inclusive.len(), 4);

        let exclusive = list.range(&BsonValue::Int32(3), &BsonValue::Int32(6), (false, false));
        assert_eq!(exclusive.len(), 2);
    }
}
