//! Node storage
//!
//! Every tree owns one arena. Children are referenced by [`NodeId`], an index
//! into the arena, so a copy-on-write "clone" of a node is just a new slot
//! holding the same fields.

use std::mem;
use std::num::NonZeroU32;
use std::ops::{Index, IndexMut};

use rustc_hash::FxHashMap;

use crate::element::{Element, Summary};
use crate::error::TreapError;

/// Opaque handle to a node in a tree's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(NonZeroU32);

impl NodeId {
    // callers guarantee `idx < u32::MAX`
    fn from_index(idx: usize) -> Self {
        NodeId(NonZeroU32::MIN.saturating_add(idx as u32))
    }

    fn index(self) -> usize {
        self.0.get() as usize - 1
    }
}

/// A possibly empty subtree
pub(crate) type Link = Option<NodeId>;

/// A pending range update
///
/// Semantics are "assign (if any), then add", with reversal commuting with both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Tag<T> {
    pub assign: Option<T>,
    pub add: T,
    pub reverse: bool,
}

impl<T: Element> Tag<T> {
    pub fn identity() -> Self {
        Tag {
            assign: None,
            add: T::ZERO,
            reverse: false,
        }
    }

    pub fn add(delta: T) -> Self {
        Tag {
            add: delta,
            ..Self::identity()
        }
    }

    pub fn assign(value: T) -> Self {
        Tag {
            assign: Some(value),
            ..Self::identity()
        }
    }

    pub fn reverse() -> Self {
        Tag {
            reverse: true,
            ..Self::identity()
        }
    }

    pub fn is_identity(&self) -> bool {
        self.assign.is_none() && self.add == T::ZERO && !self.reverse
    }

    /// The tag equivalent to applying `self` and then `outer`
    pub fn then(self, outer: &Tag<T>) -> Self {
        let reverse = self.reverse ^ outer.reverse;
        match outer.assign {
            // an assignment wipes out everything pending beneath it
            Some(value) => Tag {
                assign: Some(value),
                add: outer.add,
                reverse,
            },
            None => Tag {
                assign: self.assign,
                add: self.add.add(outer.add),
                reverse,
            },
        }
    }

    /// `value` as it reads once this tag has been applied to it
    pub fn resolve(&self, value: T) -> T {
        self.assign.unwrap_or(value).add(self.add)
    }

    #[cfg(test)]
    pub fn resolve_summary(&self, mut summary: Summary<T>) -> Summary<T> {
        if let Some(value) = self.assign {
            summary.fill(value);
        }
        summary.shift(self.add);
        summary
    }
}

/// A node in the treap
#[derive(Debug, Clone)]
pub(crate) struct Node<T> {
    pub key: T,
    /// Duplicate frequency; always 1 for sequence nodes
    pub count: usize,
    pub priority: u64,
    pub left: Link,
    pub right: Link,
    pub summary: Summary<T>,
    /// Pending for the children; already reflected in `key` and `summary`
    pub tag: Tag<T>,
    /// Epoch the node was allocated in
    pub epoch: u64,
}

impl<T: Element> Node<T> {
    pub fn new(key: T, priority: u64, epoch: u64) -> Self {
        Node {
            key,
            count: 1,
            priority,
            left: None,
            right: None,
            summary: Summary::of(key, 1),
            tag: Tag::identity(),
            epoch,
        }
    }

    pub fn size(&self) -> usize {
        self.summary.len
    }

    /// Apply `tag` to this node's own state and queue it for the children
    pub fn apply(&mut self, tag: &Tag<T>) {
        if let Some(value) = tag.assign {
            self.key = value;
            self.summary.fill(value);
        }
        if tag.add != T::ZERO {
            self.key = self.key.add(tag.add);
            self.summary.shift(tag.add);
        }
        if tag.reverse {
            mem::swap(&mut self.left, &mut self.right);
        }
        self.tag = self.tag.then(tag);
    }
}

pub(crate) struct Arena<T> {
    slots: Vec<Node<T>>,
    free: Vec<NodeId>,
    capacity: Option<usize>,
}

impl<T: Element> Arena<T> {
    pub fn new(capacity: Option<usize>) -> Self {
        Arena {
            slots: Vec::new(),
            free: Vec::new(),
            capacity,
        }
    }

    /// Number of slots holding a node, reachable or not
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn alloc(&mut self, node: Node<T>) -> Result<NodeId, TreapError> {
        if let Some(capacity) = self.capacity {
            if self.len() >= capacity {
                log::warn!("treap arena is full at {capacity} nodes");
                return Err(TreapError::CapacityExceeded { capacity });
            }
        }
        if let Some(id) = self.free.pop() {
            self[id] = node;
            return Ok(id);
        }
        if self.slots.len() >= u32::MAX as usize {
            return Err(TreapError::CapacityExceeded {
                capacity: self.slots.len(),
            });
        }
        Ok(self.push(node))
    }

    fn push(&mut self, node: Node<T>) -> NodeId {
        let id = NodeId::from_index(self.slots.len());
        self.slots.push(node);
        id
    }

    /// Return a slot to the free list
    pub fn release(&mut self, id: NodeId) {
        debug_assert!(!self.free.contains(&id), "double release of {id:?}");
        self.free.push(id);
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }

    /// Rebuild the arena keeping only nodes reachable from `roots`
    ///
    /// Shared subtrees stay shared. Every surviving node is reset to epoch 0.
    /// Returns the number of slots reclaimed.
    pub fn compact(&mut self, roots: &mut [Link]) -> usize {
        let before = self.len();
        let mut fresh = Arena::new(self.capacity);
        fresh.slots.reserve(before);
        let mut remap: FxHashMap<NodeId, NodeId> = FxHashMap::default();
        for root in roots.iter_mut() {
            *root = root.map(|id| self.relocate(id, &mut fresh, &mut remap));
        }
        *self = fresh;
        before - self.len()
    }

    fn relocate(
        &self,
        id: NodeId,
        fresh: &mut Arena<T>,
        remap: &mut FxHashMap<NodeId, NodeId>,
    ) -> NodeId {
        if let Some(&moved) = remap.get(&id) {
            return moved;
        }
        let mut node = self[id].clone();
        node.left = node.left.map(|child| self.relocate(child, fresh, remap));
        node.right = node.right.map(|child| self.relocate(child, fresh, remap));
        node.epoch = 0;
        let moved = fresh.push(node);
        remap.insert(id, moved);
        moved
    }
}

impl<T> Index<NodeId> for Arena<T> {
    type Output = Node<T>;

    fn index(&self, id: NodeId) -> &Node<T> {
        &self.slots[id.index()]
    }
}

impl<T> IndexMut<NodeId> for Arena<T> {
    fn index_mut(&mut self, id: NodeId) -> &mut Node<T> {
        &mut self.slots[id.index()]
    }
}
