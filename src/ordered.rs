//! Value-keyed treap with order statistics
//!
//! Elements are kept sorted. Besides membership, the tree answers rank and
//! select queries in expected `O(log n)` time by accumulating subtree sizes
//! while descending. How equal keys are stored is decided by a
//! [`DuplicatePolicy`].

use std::fmt;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::arena::Link;
use crate::element::Element;
use crate::error::TreapError;
use crate::treap::{Criterion, Iter, Treap};
use crate::TreapBuilder;

/// How an [`OrderedSet`] stores a key that is inserted more than once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// One node per distinct key, carrying a frequency counter
    #[default]
    Count,
    /// One node per inserted element; equal keys sit next to each other
    Separate,
    /// Set semantics: inserting a present key changes nothing
    Ignore,
}

/// A sorted multiset of elements
///
/// ```
/// use fhq_treap::OrderedSet;
///
/// let mut set = OrderedSet::new();
/// for v in [5, 3, 8, 1] {
///     set.insert(v).unwrap();
/// }
/// assert_eq!(set.rank(&5), Some(3));
/// assert_eq!(set.select(1), Some(1));
/// assert_eq!(set.successor(&5), Some(8));
/// ```
pub struct OrderedSet<T> {
    pub(crate) tree: Treap<T>,
    pub(crate) root: Link,
    policy: DuplicatePolicy,
}

impl<T: Element> OrderedSet<T> {
    /// Create an empty set that counts duplicates, seeded from system entropy
    pub fn new() -> Self {
        Self::from_parts(
            Treap::new(StdRng::from_entropy(), None),
            DuplicatePolicy::default(),
        )
    }

    /// Create a new builder for a seeded or capacity-bounded set
    pub fn builder() -> TreapBuilder {
        TreapBuilder::new()
    }

    pub(crate) fn from_parts(tree: Treap<T>, policy: DuplicatePolicy) -> Self {
        OrderedSet {
            tree,
            root: None,
            policy,
        }
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Number of elements, duplicates included
    pub fn len(&self) -> usize {
        self.tree.size(self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Read-only view of the current contents
    pub fn view(&self) -> OrderedView<'_, T> {
        OrderedView {
            tree: &self.tree,
            root: self.root,
        }
    }

    /// Insert an element
    ///
    /// Returns `false` only when the policy is [`DuplicatePolicy::Ignore`] and
    /// the key was already present.
    pub fn insert(&mut self, value: T) -> Result<bool, TreapError> {
        let present = self.contains(&value);
        let policy = self.policy;
        if present && policy == DuplicatePolicy::Ignore {
            return Ok(false);
        }
        self.tree.transact(&mut self.root, |tree, root| {
            // allocate before anything is split so a full arena leaves the tree as it was
            let fresh = match (policy, present) {
                (DuplicatePolicy::Count, true) => None,
                _ => Some(tree.leaf(value)?),
            };
            let (lt, rest) = tree.split(root, Criterion::Below(value))?;
            let (eq, gt) = tree.split(rest, Criterion::AtMost(value))?;
            let eq = match (eq, fresh) {
                (Some(id), None) => {
                    let count = tree.node(id).count + 1;
                    Some(tree.set_count(id, count)?)
                }
                (eq, fresh) => tree.merge(eq, fresh)?,
            };
            let root = join(tree, lt, eq)?;
            Ok((join(tree, root, gt)?, true))
        })
    }

    /// Insert every element of `values`, stopping at the first error
    pub fn extend<I>(&mut self, values: I) -> Result<(), TreapError>
    where
        I: IntoIterator<Item = T>,
    {
        for value in values {
            self.insert(value)?;
        }
        Ok(())
    }

    /// Remove one occurrence of `value`, returning whether it was present
    pub fn delete(&mut self, value: &T) -> Result<bool, TreapError> {
        if !self.contains(value) {
            return Ok(false);
        }
        let value = *value;
        self.tree.transact(&mut self.root, |tree, root| {
            let (lt, rest) = tree.split(root, Criterion::Below(value))?;
            let (eq, gt) = tree.split(rest, Criterion::AtMost(value))?;
            let eq = match eq {
                Some(id) if tree.node(id).count > 1 => {
                    let count = tree.node(id).count - 1;
                    Some(tree.set_count(id, count)?)
                }
                Some(id) => {
                    // drop the root of the run and close the gap
                    let id = tree.touch(id)?;
                    tree.push_down(id)?;
                    let (left, right) = (tree.node(id).left, tree.node(id).right);
                    tree.release(id);
                    tree.merge(left, right)?
                }
                None => None,
            };
            let root = join(tree, lt, eq)?;
            Ok((join(tree, root, gt)?, true))
        })
    }

    /// Keep only the elements for which `f` returns true, visiting keys in order
    pub fn retain<F>(&mut self, mut f: F) -> Result<(), TreapError>
    where
        F: FnMut(&T) -> bool,
    {
        self.tree
            .transact(&mut self.root, |tree, root| Ok((tree.retain(root, &mut f)?, ())))
    }

    pub fn clear(&mut self) {
        self.root = None;
        self.tree.clear();
    }

    pub fn contains(&self, value: &T) -> bool {
        self.view().contains(value)
    }

    /// Number of occurrences of `value`
    pub fn count(&self, value: &T) -> usize {
        self.view().count(value)
    }

    /// Number of elements strictly smaller than `value`
    pub fn count_less(&self, value: &T) -> usize {
        self.view().count_less(value)
    }

    /// 1-based position of the first occurrence of `value`, `None` if absent
    pub fn rank(&self, value: &T) -> Option<usize> {
        self.view().rank(value)
    }

    /// The `k`-th smallest element, 1-based
    pub fn select(&self, k: usize) -> Option<T> {
        self.view().select(k)
    }

    /// Largest element strictly smaller than `value`
    pub fn predecessor(&self, value: &T) -> Option<T> {
        self.view().predecessor(value)
    }

    /// Smallest element strictly greater than `value`
    pub fn successor(&self, value: &T) -> Option<T> {
        self.view().successor(value)
    }

    pub fn first(&self) -> Option<T> {
        self.view().first()
    }

    pub fn last(&self) -> Option<T> {
        self.view().last()
    }

    /// Elements in ascending order, duplicates repeated
    pub fn iter(&self) -> Iter<'_, T> {
        self.tree.iter(self.root)
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }
}

// Merge two key ranges that must not overlap
fn join<T: Element>(tree: &mut Treap<T>, left: Link, right: Link) -> Result<Link, TreapError> {
    debug_assert!(
        match (tree.summary(left), tree.summary(right)) {
            (Some(l), Some(r)) => l.max <= r.min,
            _ => true,
        },
        "merging trees with overlapping key ranges"
    );
    tree.merge(left, right)
}

impl<T: Element> Default for OrderedSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> fmt::Debug for OrderedSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Read-only queries over a value-keyed tree
///
/// Views borrow the tree immutably and never restructure it, so a view of a
/// sealed version can be shared between threads.
#[derive(Clone, Copy)]
pub struct OrderedView<'a, T> {
    tree: &'a Treap<T>,
    root: Link,
}

impl<'a, T: Element> OrderedView<'a, T> {
    pub(crate) fn new(tree: &'a Treap<T>, root: Link) -> Self {
        OrderedView { tree, root }
    }

    pub fn len(&self) -> usize {
        self.tree.size(self.root)
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn contains(&self, value: &T) -> bool {
        let mut link = self.root;
        while let Some(id) = link {
            let node = self.tree.node(id);
            link = match value.cmp(&node.key) {
                std::cmp::Ordering::Less => node.left,
                std::cmp::Ordering::Greater => node.right,
                std::cmp::Ordering::Equal => return true,
            };
        }
        false
    }

    pub fn count(&self, value: &T) -> usize {
        self.count_at_most(value) - self.count_less(value)
    }

    pub fn count_less(&self, value: &T) -> usize {
        self.count_where(|key| key < value)
    }

    fn count_at_most(&self, value: &T) -> usize {
        self.count_where(|key| key <= value)
    }

    // Count the prefix of keys satisfying `below`, which must be monotone
    fn count_where(&self, below: impl Fn(&T) -> bool) -> usize {
        let mut acc = 0;
        let mut link = self.root;
        while let Some(id) = link {
            let node = self.tree.node(id);
            debug_assert!(node.tag.is_identity(), "value-keyed trees carry no tags");
            if below(&node.key) {
                acc += self.tree.size(node.left) + node.count;
                link = node.right;
            } else {
                link = node.left;
            }
        }
        acc
    }

    pub fn rank(&self, value: &T) -> Option<usize> {
        self.contains(value).then(|| self.count_less(value) + 1)
    }

    pub fn select(&self, k: usize) -> Option<T> {
        if k == 0 || k > self.len() {
            return None;
        }
        let mut k = k;
        let mut link = self.root;
        while let Some(id) = link {
            let node = self.tree.node(id);
            let left = self.tree.size(node.left);
            if k <= left {
                link = node.left;
            } else if k > left + node.count {
                k -= left + node.count;
                link = node.right;
            } else {
                return Some(node.key);
            }
        }
        None
    }

    pub fn predecessor(&self, value: &T) -> Option<T> {
        let mut best = None;
        let mut link = self.root;
        while let Some(id) = link {
            let node = self.tree.node(id);
            if node.key < *value {
                best = Some(node.key);
                link = node.right;
            } else {
                link = node.left;
            }
        }
        best
    }

    pub fn successor(&self, value: &T) -> Option<T> {
        let mut best = None;
        let mut link = self.root;
        while let Some(id) = link {
            let node = self.tree.node(id);
            if node.key > *value {
                best = Some(node.key);
                link = node.left;
            } else {
                link = node.right;
            }
        }
        best
    }

    pub fn first(&self) -> Option<T> {
        self.tree.summary(self.root).map(|s| s.min)
    }

    pub fn last(&self) -> Option<T> {
        self.tree.summary(self.root).map(|s| s.max)
    }

    pub fn iter(&self) -> Iter<'a, T> {
        self.tree.iter(self.root)
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }
}
