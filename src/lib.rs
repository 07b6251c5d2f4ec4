//! Randomized balanced search trees built from **split** and **merge** instead of rotations
//!
//! Every collection in this crate is a treap: a binary search tree whose nodes
//! also carry random priorities kept in max-heap order, which bounds the
//! expected height by `O(log n)`. All restructuring goes through two
//! primitives, split and merge, so the same engine serves as
//!
//! - an ordered multiset with rank/select queries ([`OrderedSet`]),
//! - an array with range add/assign/reverse and range aggregates ([`Sequence`]),
//! - a versioned history of either, sharing structure between versions ([`Versioned`]).
//!
//! Nodes live in an arena owned by each collection, so independent trees never
//! share state.

mod arena;
mod element;
mod error;
mod ordered;
mod sequence;
mod treap;
mod versioned;

#[cfg(test)]
mod proptests;

pub use crate::element::{Element, Summary};
pub use crate::error::TreapError;
pub use crate::ordered::{DuplicatePolicy, OrderedSet, OrderedView};
pub use crate::sequence::{Sequence, SequenceView};
pub use crate::treap::Iter;
pub use crate::versioned::{Persist, VersionId, Versioned};

use crate::treap::Treap;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// Builder for constructing treap collections with validation and defaults
///
/// # Examples
///
/// ```
/// use fhq_treap::{DuplicatePolicy, OrderedSet, Sequence, TreapBuilder};
///
/// // Using defaults (entropy seed, unbounded arena, counted duplicates)
/// let set: OrderedSet<i64> = TreapBuilder::new().ordered_set().unwrap();
///
/// // Reproducible priorities and a bounded arena
/// let seq: Sequence<i32> = TreapBuilder::new()
///     .seed(42)
///     .capacity(10_000)
///     .sequence_from([3, 1, 4, 1, 5])
///     .unwrap();
///
/// // One node per inserted element
/// let set: OrderedSet<u32> = OrderedSet::<u32>::builder()
///     .duplicates(DuplicatePolicy::Separate)
///     .ordered_set()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct TreapBuilder {
    seed: Option<u64>,
    capacity: Option<usize>,
    duplicates: Option<DuplicatePolicy>,
}

impl TreapBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the priority generator
    ///
    /// Trees built from the same seed and the same operations have the same
    /// shape. Without a seed, priorities are drawn from system entropy.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Bound the number of arena slots
    ///
    /// Once the arena is full, operations that need a new node fail with
    /// [`TreapError::CapacityExceeded`]. Under versioning every operation
    /// copies nodes, so the bound covers history and garbage as well.
    ///
    /// Must be greater than 0.
    pub fn capacity(mut self, nodes: usize) -> Self {
        self.capacity = Some(nodes);
        self
    }

    /// Set how an [`OrderedSet`] stores repeated keys. Ignored by [`Sequence`].
    pub fn duplicates(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicates = Some(policy);
        self
    }

    fn engine<T: Element>(&self) -> Result<Treap<T>, TreapError> {
        if self.capacity == Some(0) {
            return Err(TreapError::InvalidConfig(
                "capacity must be greater than 0",
            ));
        }
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Treap::new(rng, self.capacity))
    }

    /// Build an empty [`OrderedSet`]
    pub fn ordered_set<T: Element>(self) -> Result<OrderedSet<T>, TreapError> {
        let tree = self.engine()?;
        Ok(OrderedSet::from_parts(
            tree,
            self.duplicates.unwrap_or_default(),
        ))
    }

    /// Build an empty [`Sequence`]
    pub fn sequence<T: Element>(self) -> Result<Sequence<T>, TreapError> {
        Ok(Sequence::from_tree(self.engine()?))
    }

    /// Build a [`Sequence`] holding `values` in order
    pub fn sequence_from<T, I>(self, values: I) -> Result<Sequence<T>, TreapError>
    where
        T: Element,
        I: IntoIterator<Item = T>,
    {
        let mut seq = self.sequence()?;
        seq.extend(values)?;
        Ok(seq)
    }
}
