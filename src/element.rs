//! Values stored in a treap and the aggregate kept over every subtree

use std::fmt::Debug;

/// A value that can be stored in a treap
///
/// Arithmetic wraps on overflow: range updates and sums never panic.
pub trait Element: Copy + Ord + Debug {
    /// The additive identity
    const ZERO: Self;

    /// Wrapping addition
    fn add(self, rhs: Self) -> Self;

    /// Wrapping multiplication by an element count
    fn times(self, n: usize) -> Self;
}

macro_rules! impl_element {
    ($($t:ty),* $(,)?) => {
        $(
            impl Element for $t {
                const ZERO: Self = 0;

                #[inline]
                fn add(self, rhs: Self) -> Self {
                    self.wrapping_add(rhs)
                }

                #[inline]
                fn times(self, n: usize) -> Self {
                    // truncating `n` is exact under modular arithmetic
                    self.wrapping_mul(n as $t)
                }
            }
        )*
    };
}

impl_element!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

/// Aggregate over a non-empty run of elements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Summary<T> {
    /// Number of elements, duplicates included
    pub len: usize,
    pub sum: T,
    pub min: T,
    pub max: T,
}

impl<T: Element> Summary<T> {
    /// Summary of `count` copies of `value`
    pub(crate) fn of(value: T, count: usize) -> Self {
        Summary {
            len: count,
            sum: value.times(count),
            min: value,
            max: value,
        }
    }

    /// Combine the summaries of a node's left subtree, the node itself, and its right subtree
    pub(crate) fn join(left: Option<Self>, mid: Self, right: Option<Self>) -> Self {
        let mut out = mid;
        for side in [left, right].into_iter().flatten() {
            out.len += side.len;
            out.sum = out.sum.add(side.sum);
            out.min = out.min.min(side.min);
            out.max = out.max.max(side.max);
        }
        out
    }

    /// Add `delta` to every element
    pub(crate) fn shift(&mut self, delta: T) {
        self.sum = self.sum.add(delta.times(self.len));
        self.min = self.min.add(delta);
        self.max = self.max.add(delta);
    }

    /// Overwrite every element with `value`
    pub(crate) fn fill(&mut self, value: T) {
        *self = Summary::of(value, self.len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join() {
        let left = Summary::of(3i64, 2);
        let right = Summary::of(-1i64, 1);
        let s = Summary::join(Some(left), Summary::of(5, 1), Some(right));
        assert_eq!(s.len, 4);
        assert_eq!(s.sum, 10);
        assert_eq!(s.min, -1);
        assert_eq!(s.max, 5);
    }

    #[test]
    fn test_shift_and_fill() {
        let mut s = Summary::join(None, Summary::of(2u32, 1), Some(Summary::of(7u32, 1)));
        s.shift(10);
        assert_eq!((s.sum, s.min, s.max), (29, 12, 17));
        s.fill(4);
        assert_eq!((s.len, s.sum, s.min, s.max), (2, 8, 4, 4));
    }

    #[test]
    fn test_wrapping() {
        assert_eq!(i8::MAX.add(1), i8::MIN);
        assert_eq!(200u8.times(2), 144);
    }
}
