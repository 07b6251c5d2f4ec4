//! Implicit-key treap: an array with `O(log n)` range operations
//!
//! Positions are never stored. A node's index is the size of everything to its
//! left, so inserting or deleting shifts every later element for free.
//!
//! Every public operation, queries included, follows the same shape: split the
//! affected range out, operate on its root, merge the pieces back. The
//! sequence holds exactly one root between calls.

use std::fmt;
use std::ops::{Bound, RangeBounds};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::arena::{Link, Tag};
use crate::element::{Element, Summary};
use crate::error::TreapError;
use crate::treap::{oriented, Criterion, Iter, Treap};
use crate::TreapBuilder;

/// A sequence of elements supporting range updates and range aggregates
///
/// Indices are 0-based and ranges are ordinary Rust ranges.
///
/// ```
/// use fhq_treap::Sequence;
///
/// let mut seq = Sequence::new();
/// seq.extend([1, 2, 3, 4, 5]).unwrap();
/// seq.range_reverse(1..4).unwrap();
/// assert_eq!(seq.to_vec(), vec![1, 4, 3, 2, 5]);
/// seq.range_add(1..4, 10).unwrap();
/// assert_eq!(seq.range_sum(..).unwrap(), 45);
/// ```
pub struct Sequence<T> {
    pub(crate) tree: Treap<T>,
    pub(crate) root: Link,
}

impl<T: Element> Sequence<T> {
    /// Create an empty sequence seeded from system entropy
    pub fn new() -> Self {
        Self::from_tree(Treap::new(StdRng::from_entropy(), None))
    }

    /// Create a new builder for a seeded or capacity-bounded sequence
    pub fn builder() -> TreapBuilder {
        TreapBuilder::new()
    }

    pub(crate) fn from_tree(tree: Treap<T>) -> Self {
        Sequence { tree, root: None }
    }

    pub fn len(&self) -> usize {
        self.tree.size(self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Read-only view of the current contents
    pub fn view(&self) -> SequenceView<'_, T> {
        SequenceView {
            tree: &self.tree,
            root: self.root,
        }
    }

    /// Aggregate over the whole sequence, `None` when empty
    pub fn summary(&self) -> Option<Summary<T>> {
        self.tree.summary(self.root)
    }

    pub fn iter(&self) -> Iter<'_, T> {
        self.tree.iter(self.root)
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    pub fn clear(&mut self) {
        self.root = None;
        self.tree.clear();
    }

    /// Insert `value` so that it ends up at `index`
    pub fn insert_at(&mut self, index: usize, value: T) -> Result<(), TreapError> {
        let len = self.len();
        if index > len {
            return Err(TreapError::IndexOutOfRange { index, len });
        }
        self.tree.transact(&mut self.root, |tree, root| {
            let leaf = tree.leaf(value)?;
            let (left, right) = tree.split(root, Criterion::First(index))?;
            let root = tree.merge(left, Some(leaf))?;
            Ok((tree.merge(root, right)?, ()))
        })
    }

    pub fn push_front(&mut self, value: T) -> Result<(), TreapError> {
        self.insert_at(0, value)
    }

    pub fn push_back(&mut self, value: T) -> Result<(), TreapError> {
        self.insert_at(self.len(), value)
    }

    /// Append every element of `values`, stopping at the first error
    pub fn extend<I>(&mut self, values: I) -> Result<(), TreapError>
    where
        I: IntoIterator<Item = T>,
    {
        for value in values {
            self.push_back(value)?;
        }
        Ok(())
    }

    /// Remove and return the element at `index`
    pub fn delete_at(&mut self, index: usize) -> Result<T, TreapError> {
        self.check_index(index)?;
        let len = self.len();
        self.tree
            .transact(&mut self.root, |tree, root| {
                let (left, target, right) = isolate(tree, root, index, index + 1)?;
                let value = target.map(|id| tree.node(id).key);
                if let Some(id) = target {
                    tree.release(id);
                }
                Ok((tree.merge(left, right)?, value))
            })?
            .ok_or(TreapError::IndexOutOfRange { index, len })
    }

    /// The element at `index`
    pub fn get(&mut self, index: usize) -> Result<T, TreapError> {
        self.check_index(index)?;
        let summary = self.query(index, index + 1)?;
        Ok(summary.min)
    }

    /// Overwrite the element at `index`
    pub fn set(&mut self, index: usize, value: T) -> Result<(), TreapError> {
        self.check_index(index)?;
        self.update(index, index + 1, Tag::assign(value))
    }

    /// Add `delta` to every element in `range`
    pub fn range_add<R>(&mut self, range: R, delta: T) -> Result<(), TreapError>
    where
        R: RangeBounds<usize>,
    {
        let (start, end) = self.bounds(range)?;
        self.update(start, end, Tag::add(delta))
    }

    /// Overwrite every element in `range` with `value`
    pub fn range_assign<R>(&mut self, range: R, value: T) -> Result<(), TreapError>
    where
        R: RangeBounds<usize>,
    {
        let (start, end) = self.bounds(range)?;
        self.update(start, end, Tag::assign(value))
    }

    /// Reverse the order of the elements in `range`
    pub fn range_reverse<R>(&mut self, range: R) -> Result<(), TreapError>
    where
        R: RangeBounds<usize>,
    {
        let (start, end) = self.bounds(range)?;
        self.update(start, end, Tag::reverse())
    }

    /// Count, sum, minimum and maximum of `range`
    ///
    /// Returns [`TreapError::EmptyRange`] for an empty range.
    pub fn range_query<R>(&mut self, range: R) -> Result<Summary<T>, TreapError>
    where
        R: RangeBounds<usize>,
    {
        let (start, end) = self.bounds(range)?;
        self.query(start, end)
    }

    pub fn range_sum<R>(&mut self, range: R) -> Result<T, TreapError>
    where
        R: RangeBounds<usize>,
    {
        self.range_query(range).map(|s| s.sum)
    }

    pub fn range_min<R>(&mut self, range: R) -> Result<T, TreapError>
    where
        R: RangeBounds<usize>,
    {
        self.range_query(range).map(|s| s.min)
    }

    pub fn range_max<R>(&mut self, range: R) -> Result<T, TreapError>
    where
        R: RangeBounds<usize>,
    {
        self.range_query(range).map(|s| s.max)
    }

    /// Move the elements in `range` to the start of the sequence, keeping their order
    pub fn move_to_front<R>(&mut self, range: R) -> Result<(), TreapError>
    where
        R: RangeBounds<usize>,
    {
        let (start, end) = self.bounds(range)?;
        if start == end {
            return Ok(());
        }
        self.tree.transact(&mut self.root, |tree, root| {
            let (left, mid, right) = isolate(tree, root, start, end)?;
            let root = tree.merge(mid, left)?;
            Ok((tree.merge(root, right)?, ()))
        })
    }

    /// Move the elements in `range` to the end of the sequence, keeping their order
    pub fn move_to_back<R>(&mut self, range: R) -> Result<(), TreapError>
    where
        R: RangeBounds<usize>,
    {
        let (start, end) = self.bounds(range)?;
        if start == end {
            return Ok(());
        }
        self.tree.transact(&mut self.root, |tree, root| {
            let (left, mid, right) = isolate(tree, root, start, end)?;
            let root = tree.merge(left, right)?;
            Ok((tree.merge(root, mid)?, ()))
        })
    }

    fn update(&mut self, start: usize, end: usize, tag: Tag<T>) -> Result<(), TreapError> {
        if start == end {
            return Ok(());
        }
        self.tree.transact(&mut self.root, |tree, root| {
            let (left, mid, right) = isolate(tree, root, start, end)?;
            let mid = tree.apply(mid, &tag)?;
            Ok((reattach(tree, left, mid, right)?, ()))
        })
    }

    fn query(&mut self, start: usize, end: usize) -> Result<Summary<T>, TreapError> {
        if start == end {
            return Err(TreapError::EmptyRange);
        }
        self.tree.transact(&mut self.root, |tree, root| {
            let (left, mid, right) = isolate(tree, root, start, end)?;
            let summary = tree.summary(mid);
            let root = reattach(tree, left, mid, right)?;
            Ok((root, summary.ok_or(TreapError::EmptyRange)?))
        })
    }

    fn check_index(&self, index: usize) -> Result<(), TreapError> {
        let len = self.len();
        if index >= len {
            return Err(TreapError::IndexOutOfRange { index, len });
        }
        Ok(())
    }

    fn bounds<R: RangeBounds<usize>>(&self, range: R) -> Result<(usize, usize), TreapError> {
        let len = self.len();
        let start = match range.start_bound() {
            Bound::Included(&start) => start,
            Bound::Excluded(&start) => start.saturating_add(1),
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&end) => end.saturating_add(1),
            Bound::Excluded(&end) => end,
            Bound::Unbounded => len,
        };
        if start > end || end > len {
            return Err(TreapError::InvalidRange { start, end, len });
        }
        Ok((start, end))
    }
}

// Cut `root` into [0, start), [start, end) and [end, len)
fn isolate<T: Element>(
    tree: &mut Treap<T>,
    root: Link,
    start: usize,
    end: usize,
) -> Result<(Link, Link, Link), TreapError> {
    let (rest, right) = tree.split(root, Criterion::First(end))?;
    let (left, mid) = tree.split(rest, Criterion::First(start))?;
    Ok((left, mid, right))
}

fn reattach<T: Element>(
    tree: &mut Treap<T>,
    left: Link,
    mid: Link,
    right: Link,
) -> Result<Link, TreapError> {
    let root = tree.merge(left, mid)?;
    tree.merge(root, right)
}

impl<T: Element> Default for Sequence<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> fmt::Debug for Sequence<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Read-only access to a sequence that never restructures it
///
/// Pending range updates are resolved on the fly along each path.
#[derive(Clone, Copy)]
pub struct SequenceView<'a, T> {
    tree: &'a Treap<T>,
    root: Link,
}

impl<'a, T: Element> SequenceView<'a, T> {
    pub(crate) fn new(tree: &'a Treap<T>, root: Link) -> Self {
        SequenceView { tree, root }
    }

    pub fn len(&self) -> usize {
        self.tree.size(self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn summary(&self) -> Option<Summary<T>> {
        self.tree.summary(self.root)
    }

    /// The element at `index`, `None` if out of range
    pub fn get(&self, index: usize) -> Option<T> {
        let mut index = index;
        let mut link = self.root;
        let mut outer = Tag::identity();
        while let Some(id) = link {
            let node = self.tree.node(id);
            let (first, second) = oriented(node, &outer);
            let before = self.tree.size(first);
            if index == before {
                return Some(outer.resolve(node.key));
            }
            outer = node.tag.then(&outer);
            if index < before {
                link = first;
            } else {
                index -= before + 1;
                link = second;
            }
        }
        None
    }

    pub fn iter(&self) -> Iter<'a, T> {
        self.tree.iter(self.root)
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(values: &[i64]) -> Sequence<i64> {
        TreapBuilder::new()
            .seed(42)
            .sequence_from(values.iter().copied())
            .unwrap()
    }

    fn check(seq: &Sequence<i64>) -> Vec<i64> {
        let got = seq.tree.check(seq.root);
        assert_eq!(got, seq.to_vec());
        got
    }

    #[test]
    fn test_insert_and_delete_at() {
        let mut seq = seeded(&[]);
        seq.insert_at(0, 2).unwrap();
        seq.insert_at(0, 1).unwrap();
        seq.insert_at(2, 4).unwrap();
        seq.insert_at(2, 3).unwrap();
        assert_eq!(check(&seq), vec![1, 2, 3, 4]);

        assert_eq!(
            seq.insert_at(9, 0),
            Err(TreapError::IndexOutOfRange { index: 9, len: 4 })
        );
        assert_eq!(seq.delete_at(1).unwrap(), 2);
        assert_eq!(check(&seq), vec![1, 3, 4]);
        assert_eq!(
            seq.delete_at(3),
            Err(TreapError::IndexOutOfRange { index: 3, len: 3 })
        );
        assert_eq!(seq.tree.node_count(), 3);
    }

    #[test]
    fn test_get_and_set() {
        let mut seq = seeded(&[5, 6, 7]);
        assert_eq!(seq.get(0).unwrap(), 5);
        assert_eq!(seq.get(2).unwrap(), 7);
        assert!(seq.get(3).is_err());
        seq.set(1, -1).unwrap();
        assert_eq!(check(&seq), vec![5, -1, 7]);
    }

    #[test]
    fn test_reverse_twice_restores() {
        let mut seq = seeded(&[1, 2, 3, 4, 5]);
        seq.range_reverse(1..4).unwrap();
        assert_eq!(check(&seq), vec![1, 4, 3, 2, 5]);
        seq.range_reverse(1..=3).unwrap();
        assert_eq!(check(&seq), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_add_then_point_query() {
        let mut seq = seeded(&[1, 2, 3, 4, 5]);
        seq.range_add(1..4, 10).unwrap();
        // point query straight after the tagged update
        assert_eq!(seq.get(2).unwrap(), 13);
        assert_eq!(check(&seq), vec![1, 12, 13, 14, 5]);
        assert_eq!(seq.range_sum(..).unwrap(), 45);
        assert_eq!(seq.range_max(0..2).unwrap(), 12);
        assert_eq!(seq.range_min(3..).unwrap(), 5);
    }

    #[test]
    fn test_assign_overrides_pending_add() {
        let mut seq = seeded(&(0..10).collect::<Vec<_>>());
        seq.range_add(.., 100).unwrap();
        seq.range_assign(2..8, 7).unwrap();
        seq.range_add(4..6, 1).unwrap();
        assert_eq!(
            check(&seq),
            vec![100, 101, 7, 7, 8, 8, 7, 7, 108, 109]
        );
        let s = seq.range_query(2..8).unwrap();
        assert_eq!((s.len, s.sum, s.min, s.max), (6, 44, 7, 8));
    }

    #[test]
    fn test_mixed_tags_then_split() {
        let mut seq = seeded(&(1..=8).collect::<Vec<_>>());
        seq.range_reverse(..).unwrap();
        seq.range_add(2..6, 10).unwrap();
        seq.range_reverse(1..7).unwrap();
        // [8, 7, 16, 15, 14, 13, 2, 1] reversed on 1..7
        assert_eq!(check(&seq), vec![8, 2, 13, 14, 15, 16, 7, 1]);
        assert_eq!(seq.view().get(2), Some(13));
        seq.insert_at(3, 0).unwrap();
        assert_eq!(check(&seq), vec![8, 2, 13, 0, 14, 15, 16, 7, 1]);
    }

    #[test]
    fn test_move_ranges() {
        let mut seq = seeded(&[1, 2, 3, 4, 5, 6]);
        seq.move_to_front(3..5).unwrap();
        assert_eq!(check(&seq), vec![4, 5, 1, 2, 3, 6]);
        seq.move_to_back(0..2).unwrap();
        assert_eq!(check(&seq), vec![1, 2, 3, 6, 4, 5]);
        seq.move_to_back(2..2).unwrap();
        assert_eq!(check(&seq), vec![1, 2, 3, 6, 4, 5]);
    }

    #[test]
    fn test_range_errors() {
        let mut seq = seeded(&[1, 2, 3]);
        assert_eq!(seq.range_sum(1..1), Err(TreapError::EmptyRange));
        assert_eq!(
            seq.range_sum(2..5),
            Err(TreapError::InvalidRange { start: 2, end: 5, len: 3 })
        );
        #[allow(clippy::reversed_empty_ranges)]
        let backwards = seq.range_add(2..1, 1);
        assert!(backwards.is_err());
        // empty updates are accepted and change nothing
        seq.range_add(3..3, 1).unwrap();
        assert_eq!(check(&seq), vec![1, 2, 3]);
    }

    #[test]
    fn test_view_get_matches_get() {
        let mut seq = seeded(&(0..25).collect::<Vec<_>>());
        seq.range_reverse(3..20).unwrap();
        seq.range_add(10.., -4).unwrap();
        let expected = seq.to_vec();
        for (i, want) in expected.iter().enumerate() {
            assert_eq!(seq.view().get(i), Some(*want));
        }
        assert_eq!(seq.view().get(25), None);
        for (i, want) in expected.iter().enumerate() {
            assert_eq!(seq.get(i).unwrap(), *want);
        }
    }

    #[test]
    fn test_capacity_error_leaves_sequence_intact() {
        let mut seq: Sequence<i32> = TreapBuilder::new()
            .seed(3)
            .capacity(2)
            .sequence()
            .unwrap();
        seq.extend([1, 2]).unwrap();
        assert_eq!(
            seq.push_back(3),
            Err(TreapError::CapacityExceeded { capacity: 2 })
        );
        assert_eq!(seq.to_vec(), vec![1, 2]);
        seq.range_reverse(..).unwrap();
        assert_eq!(seq.tree.check(seq.root), vec![2, 1]);
    }
}
