//! The split/merge treap engine shared by every collection in this crate
//!
//! A treap maintains both BST order (by key, or by position for sequences) and
//! max-heap order on random priorities. Instead of rotations, every structural
//! change is expressed with two primitives:
//!
//! - [`Treap::split`] cuts a tree in two by value or by position
//! - [`Treap::merge`] joins two trees whose contents are already in order
//!
//! Range updates are recorded as lazy [`Tag`]s and pushed one level down
//! whenever a node's children are about to be read or reparented. A node's own
//! key and summary always include its own tag.
//!
//! ## Copy-on-write
//!
//! Once persistence is enabled, any node whose fields must change is first
//! copied into a fresh arena slot, unless it was allocated during the current
//! epoch. Callers start a new epoch at the beginning of every public
//! operation, so nodes reachable from an older root are never written to.

use rand::rngs::StdRng;
use rand::Rng;

use crate::arena::{Arena, Link, Node, NodeId, Tag};
use crate::element::{Element, Summary};
use crate::error::TreapError;

/// Where to cut a tree
#[derive(Debug, Clone, Copy)]
pub(crate) enum Criterion<T> {
    /// The first `k` elements go left
    First(usize),
    /// Keys `<= v` go left
    AtMost(T),
    /// Keys `< v` go left
    Below(T),
}

pub(crate) struct Treap<T> {
    arena: Arena<T>,
    rng: StdRng,
    persistent: bool,
    epoch: u64,
}

impl<T: Element> Treap<T> {
    pub fn new(rng: StdRng, capacity: Option<usize>) -> Self {
        Treap {
            arena: Arena::new(capacity),
            rng,
            persistent: false,
            epoch: 0,
        }
    }

    pub fn node(&self, id: NodeId) -> &Node<T> {
        &self.arena[id]
    }

    pub fn size(&self, link: Link) -> usize {
        link.map_or(0, |id| self.arena[id].size())
    }

    pub fn summary(&self, link: Link) -> Option<Summary<T>> {
        link.map(|id| self.arena[id].summary)
    }

    /// Slots in use, including garbage left behind by copy-on-write
    pub fn node_count(&self) -> usize {
        self.arena.len()
    }

    /// Switch to copy-on-write; every existing node becomes shared
    pub fn enable_persistence(&mut self) {
        self.persistent = true;
        self.epoch += 1;
    }

    /// Mark the start of a public operation
    pub fn begin(&mut self) {
        if self.persistent {
            self.epoch += 1;
        }
    }

    /// Run one public operation against the tree rooted at `root`
    ///
    /// `op` receives the current root and returns the new one. If it fails,
    /// `root` is left untouched and still describes a whole tree: persistent
    /// trees never wrote to it, and in-place trees only fail while
    /// allocating, which every operation does before restructuring.
    pub fn transact<R, F>(&mut self, root: &mut Link, op: F) -> Result<R, TreapError>
    where
        F: FnOnce(&mut Self, Link) -> Result<(Link, R), TreapError>,
    {
        self.begin();
        let (new_root, out) = op(self, *root)?;
        *root = new_root;
        Ok(out)
    }

    /// Drop every node. Persistent arenas are left alone: old versions may still use them.
    pub fn clear(&mut self) {
        if !self.persistent {
            self.arena.clear();
        }
    }

    pub fn compact(&mut self, roots: &mut [Link]) -> usize {
        self.arena.compact(roots)
    }

    /// Allocate a single-node tree with a fresh random priority
    pub fn leaf(&mut self, key: T) -> Result<NodeId, TreapError> {
        let priority = self.rng.gen();
        self.arena.alloc(Node::new(key, priority, self.epoch))
    }

    /// Give a detached node back to the arena
    pub fn release(&mut self, id: NodeId) {
        if !self.persistent {
            self.arena.release(id);
        }
    }

    /// Return a node that may be written to, copying it if it could be shared
    pub fn touch(&mut self, id: NodeId) -> Result<NodeId, TreapError> {
        if !self.persistent || self.arena[id].epoch == self.epoch {
            return Ok(id);
        }
        let mut copy = self.arena[id].clone();
        copy.epoch = self.epoch;
        self.arena.alloc(copy)
    }

    // Recompute a node's summary from its children. The node's tag must be empty.
    fn pull(&mut self, id: NodeId) {
        let node = &self.arena[id];
        debug_assert!(node.tag.is_identity(), "pull on a node with a pending tag");
        let summary = Summary::join(
            self.summary(node.left),
            Summary::of(node.key, node.count),
            self.summary(node.right),
        );
        self.arena[id].summary = summary;
    }

    /// Record `tag` on the root of `link`
    pub fn apply(&mut self, link: Link, tag: &Tag<T>) -> Result<Link, TreapError> {
        let Some(id) = link else {
            return Ok(None);
        };
        let id = self.touch(id)?;
        self.arena[id].apply(tag);
        Ok(Some(id))
    }

    /// Hand a node's pending tag to its children. `id` must be writable.
    pub fn push_down(&mut self, id: NodeId) -> Result<(), TreapError> {
        let tag = self.arena[id].tag;
        if tag.is_identity() {
            return Ok(());
        }
        if let Some(child) = self.arena[id].left {
            let child = self.touch(child)?;
            self.arena[child].apply(&tag);
            self.arena[id].left = Some(child);
        }
        if let Some(child) = self.arena[id].right {
            let child = self.touch(child)?;
            self.arena[child].apply(&tag);
            self.arena[id].right = Some(child);
        }
        self.arena[id].tag = Tag::identity();
        Ok(())
    }

    /// Change the duplicate count of a root node
    pub fn set_count(&mut self, id: NodeId, count: usize) -> Result<NodeId, TreapError> {
        debug_assert!(count > 0);
        let id = self.touch(id)?;
        self.push_down(id)?;
        self.arena[id].count = count;
        self.pull(id);
        Ok(id)
    }

    /// Split `link` into the part matching `by` and the rest
    pub fn split(&mut self, link: Link, by: Criterion<T>) -> Result<(Link, Link), TreapError> {
        let Some(id) = link else {
            return Ok((None, None));
        };
        let id = self.touch(id)?;
        // the children are about to be read
        self.push_down(id)?;

        let node = &self.arena[id];
        let (goes_left, rest) = match by {
            Criterion::First(k) => {
                let before = self.size(node.left) + node.count;
                if before <= k {
                    (true, Criterion::First(k - before))
                } else {
                    (false, by)
                }
            }
            Criterion::AtMost(v) => (node.key <= v, by),
            Criterion::Below(v) => (node.key < v, by),
        };

        if goes_left {
            let right = node.right;
            let (mid, rest) = self.split(right, rest)?;
            self.arena[id].right = mid;
            self.pull(id);
            Ok((Some(id), rest))
        } else {
            let left = node.left;
            let (rest, mid) = self.split(left, rest)?;
            self.arena[id].left = mid;
            self.pull(id);
            Ok((rest, Some(id)))
        }
    }

    /// Merge two subtrees. Everything in `left` must precede everything in `right`.
    pub fn merge(&mut self, left: Link, right: Link) -> Result<Link, TreapError> {
        match (left, right) {
            (None, right) => Ok(right),
            (left, None) => Ok(left),
            (Some(l), Some(r)) => {
                if self.arena[l].priority > self.arena[r].priority {
                    let l = self.touch(l)?;
                    self.push_down(l)?;
                    let inner = self.arena[l].right;
                    let merged = self.merge(inner, Some(r))?;
                    self.arena[l].right = merged;
                    self.pull(l);
                    Ok(Some(l))
                } else {
                    let r = self.touch(r)?;
                    self.push_down(r)?;
                    let inner = self.arena[r].left;
                    let merged = self.merge(Some(l), inner)?;
                    self.arena[r].left = merged;
                    self.pull(r);
                    Ok(Some(r))
                }
            }
        }
    }

    /// Remove every node whose key fails `f`, visiting keys in order
    pub fn retain<F>(&mut self, link: Link, f: &mut F) -> Result<Link, TreapError>
    where
        F: FnMut(&T) -> bool,
    {
        let Some(id) = link else {
            return Ok(None);
        };
        let id = self.touch(id)?;
        self.push_down(id)?;

        let (left, key, right) = {
            let node = &self.arena[id];
            (node.left, node.key, node.right)
        };
        let left = self.retain(left, f)?;
        let keep = f(&key);
        let right = self.retain(right, f)?;

        if keep {
            let node = &mut self.arena[id];
            node.left = left;
            node.right = right;
            self.pull(id);
            Ok(Some(id))
        } else {
            // Remove this node by merging its subtrees
            self.release(id);
            self.merge(left, right)
        }
    }

    /// In-order iterator that reads through pending tags without pushing them
    pub fn iter(&self, link: Link) -> Iter<'_, T> {
        let mut iter = Iter {
            arena: &self.arena,
            stack: Vec::new(),
            current: None,
            remaining: self.size(link),
        };
        iter.descend(link, Tag::identity());
        iter
    }

    /// Walk the whole subtree, asserting every structural invariant, and return its elements
    #[cfg(test)]
    pub fn check(&self, link: Link) -> Vec<T> {
        let mut out = Vec::new();
        self.check_node(link, Tag::identity(), &mut out);
        out
    }

    #[cfg(test)]
    fn check_node(&self, link: Link, outer: Tag<T>, out: &mut Vec<T>) -> Option<Summary<T>> {
        let id = link?;
        let node = &self.arena[id];
        assert!(node.count >= 1, "node with zero count");
        for child in [node.left, node.right].into_iter().flatten() {
            assert!(
                self.arena[child].priority <= node.priority,
                "heap order violated"
            );
        }
        let (first, second) = oriented(node, &outer);
        let inner = node.tag.then(&outer);
        let before = self.check_node(first, inner, out);
        let key = outer.resolve(node.key);
        out.extend(std::iter::repeat(key).take(node.count));
        let after = self.check_node(second, inner, out);

        let truth = Summary::join(before, Summary::of(key, node.count), after);
        assert_eq!(
            outer.resolve_summary(node.summary),
            truth,
            "stored summary does not match subtree"
        );
        Some(truth)
    }
}

// A node's children in logical order, given a tag not yet applied to the node
pub(crate) fn oriented<T>(node: &Node<T>, outer: &Tag<T>) -> (Link, Link) {
    if outer.reverse {
        (node.right, node.left)
    } else {
        (node.left, node.right)
    }
}

/// In-order iterator over a subtree, repeating duplicated keys
pub struct Iter<'a, T> {
    arena: &'a Arena<T>,
    // nodes whose left side has been queued, with the tag still owed to them
    stack: Vec<(NodeId, Tag<T>)>,
    current: Option<(T, usize)>,
    remaining: usize,
}

impl<T: Element> Iter<'_, T> {
    fn descend(&mut self, mut link: Link, mut outer: Tag<T>) {
        let arena = self.arena;
        while let Some(id) = link {
            let node = &arena[id];
            self.stack.push((id, outer));
            link = oriented(node, &outer).0;
            outer = node.tag.then(&outer);
        }
    }
}

impl<T: Element> Iterator for Iter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if let Some((key, left)) = self.current.as_mut() {
            if *left > 0 {
                *left -= 1;
                self.remaining -= 1;
                return Some(*key);
            }
        }
        let (id, outer) = self.stack.pop()?;
        let node = &self.arena[id];
        debug_assert!(node.count > 0);
        let key = outer.resolve(node.key);
        let next = oriented(node, &outer).1;
        let inner = node.tag.then(&outer);
        self.current = Some((key, node.count - 1));
        self.descend(next, inner);
        self.remaining -= 1;
        Some(key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T: Element> ExactSizeIterator for Iter<'_, T> {}
