use thiserror::Error;

use crate::versioned::VersionId;

/// Errors surfaced by treap operations
///
/// None of these are fatal: the collection an operation was called on is left
/// exactly as it was before the call.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TreapError {
    #[error("index {index} is out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("range {start}..{end} is invalid for length {len}")]
    InvalidRange { start: usize, end: usize, len: usize },
    #[error("range is empty")]
    EmptyRange,
    #[error("unknown version {0}")]
    UnknownVersion(VersionId),
    #[error("node arena is full (capacity {capacity})")]
    CapacityExceeded { capacity: usize },
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}
