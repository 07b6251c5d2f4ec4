//! Copy-on-write versions of a treap collection
//!
//! Wrapping a collection in [`Versioned`] switches its engine to copy-on-write.
//! From then on an operation copies the `O(log n)` nodes on the paths it
//! restructures and shares everything else, so sealing a version is just
//! recording the current root.

use std::fmt;

use crate::arena::NodeId;
use crate::element::Element;
use crate::error::TreapError;
use crate::ordered::{OrderedSet, OrderedView};
use crate::sequence::{Sequence, SequenceView};

/// Identifier of a sealed version, in sealing order starting at 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionId(usize);

impl VersionId {
    pub fn new(index: usize) -> Self {
        VersionId(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

mod private {
    pub trait Sealed {}
}

/// A collection that can be wrapped in [`Versioned`]
///
/// Implemented for [`OrderedSet`] and [`Sequence`]; cannot be implemented outside this crate.
pub trait Persist: private::Sealed {
    /// Read-only access to one version
    type View<'a>
    where
        Self: 'a;

    #[doc(hidden)]
    fn root(&self) -> Option<NodeId>;
    #[doc(hidden)]
    fn set_root(&mut self, root: Option<NodeId>);
    #[doc(hidden)]
    fn enable_persistence(&mut self);
    #[doc(hidden)]
    fn compact(&mut self, roots: &mut [Option<NodeId>]) -> usize;
    #[doc(hidden)]
    fn node_count(&self) -> usize;
    #[doc(hidden)]
    fn view_at(&self, root: Option<NodeId>) -> Self::View<'_>;
}

macro_rules! impl_persist {
    ($collection:ident, $view:ident) => {
        impl<T: Element> private::Sealed for $collection<T> {}

        impl<T: Element> Persist for $collection<T> {
            type View<'a>
                = $view<'a, T>
            where
                Self: 'a;

            fn root(&self) -> Option<NodeId> {
                self.root
            }

            fn set_root(&mut self, root: Option<NodeId>) {
                self.root = root;
            }

            fn enable_persistence(&mut self) {
                self.tree.enable_persistence();
            }

            fn compact(&mut self, roots: &mut [Option<NodeId>]) -> usize {
                self.tree.compact(roots)
            }

            fn node_count(&self) -> usize {
                self.tree.node_count()
            }

            fn view_at(&self, root: Option<NodeId>) -> Self::View<'_> {
                $view::new(&self.tree, root)
            }
        }
    };
}

impl_persist!(OrderedSet, OrderedView);
impl_persist!(Sequence, SequenceView);

/// A collection plus the table of its sealed versions
///
/// The live collection is reached through [`Versioned::current_mut`] and
/// behaves exactly as it would unwrapped. Sealed versions never change.
///
/// ```
/// use fhq_treap::{Sequence, Versioned};
///
/// let mut seq = Sequence::new();
/// seq.extend([1, 2, 3]).unwrap();
/// let mut history = Versioned::new(seq);
/// let v0 = history.seal();
///
/// history.current_mut().range_add(.., 10).unwrap();
/// assert_eq!(history.current().to_vec(), vec![11, 12, 13]);
/// assert_eq!(history.snapshot(v0).unwrap().to_vec(), vec![1, 2, 3]);
/// ```
pub struct Versioned<C> {
    live: C,
    versions: Vec<Option<NodeId>>,
}

impl<C: Persist> Versioned<C> {
    /// Start versioning `live`; its current contents become shared with every future version
    pub fn new(mut live: C) -> Self {
        live.enable_persistence();
        Versioned {
            live,
            versions: Vec::new(),
        }
    }

    pub fn current(&self) -> &C {
        &self.live
    }

    pub fn current_mut(&mut self) -> &mut C {
        &mut self.live
    }

    /// Record the live contents as a new version. `O(1)`.
    pub fn seal(&mut self) -> VersionId {
        let id = VersionId(self.versions.len());
        self.versions.push(self.live.root());
        log::debug!("sealed version {id}");
        id
    }

    pub fn version_count(&self) -> usize {
        self.versions.len()
    }

    /// The most recently sealed version
    pub fn latest(&self) -> Option<VersionId> {
        self.versions.len().checked_sub(1).map(VersionId)
    }

    fn root_of(&self, version: VersionId) -> Result<Option<NodeId>, TreapError> {
        self.versions
            .get(version.0)
            .copied()
            .ok_or(TreapError::UnknownVersion(version))
    }

    /// Run `f` against the collection as it was at `version`
    ///
    /// `f` may use any operation, including ones that restructure or modify
    /// the tree; whatever it builds is thrown away afterwards and neither the
    /// sealed version nor the live collection changes.
    pub fn query_at<R, F>(&mut self, version: VersionId, f: F) -> Result<R, TreapError>
    where
        F: FnOnce(&mut C) -> R,
    {
        let root = self.root_of(version)?;
        let live = self.live.root();
        self.live.set_root(root);
        let out = f(&mut self.live);
        self.live.set_root(live);
        Ok(out)
    }

    /// Read-only view of a sealed version
    pub fn snapshot(&self, version: VersionId) -> Result<C::View<'_>, TreapError> {
        let root = self.root_of(version)?;
        Ok(self.live.view_at(root))
    }

    /// Replace the live contents with a sealed version
    ///
    /// Unsealed changes to the live collection are dropped. Versions sealed
    /// afterwards are appended to the table as usual.
    pub fn checkout(&mut self, version: VersionId) -> Result<(), TreapError> {
        let root = self.root_of(version)?;
        self.live.set_root(root);
        log::debug!("checked out version {version}");
        Ok(())
    }

    /// Arena slots in use, including garbage not yet reclaimed by [`Versioned::compact`]
    pub fn node_count(&self) -> usize {
        self.live.node_count()
    }

    /// Reclaim every node unreachable from the live collection or a sealed version
    ///
    /// Returns the number of slots freed.
    pub fn compact(&mut self) -> usize {
        let mut roots = Vec::with_capacity(self.versions.len() + 1);
        roots.push(self.live.root());
        roots.extend_from_slice(&self.versions);
        let freed = self.live.compact(&mut roots);

        self.live.set_root(roots[0]);
        self.versions.copy_from_slice(&roots[1..]);
        log::debug!(
            "compacted {} versions: {} nodes freed, {} kept",
            self.versions.len(),
            freed,
            self.live.node_count()
        );
        freed
    }
}
